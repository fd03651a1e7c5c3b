//! `Content-Disposition` header construction (spec.md §4.6): `attachment`
//! for download ops, `inline` for view; Firefox always gets the RFC 5987
//! `filename*=` extended form (and so does any attachment, regardless of
//! UA), everyone else gets a plain `filename="..."`.

pub fn build(name: &str, attachment: bool, firefox: bool) -> String {
    let kind = if attachment { "attachment" } else { "inline" };
    if attachment || firefox {
        format!("{kind}; filename*=utf-8''{}", percent_encode(name))
    } else {
        format!("{kind}; filename=\"{}\"", escape_quoted(name))
    }
}

fn escape_quoted(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

fn percent_encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for byte in s.as_bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(*byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_filename_for_non_firefox_view() {
        assert_eq!(build("notes.txt", false, false), "inline; filename=\"notes.txt\"");
    }

    #[test]
    fn attachment_always_uses_extended_form() {
        assert_eq!(build("a b.txt", true, false), "attachment; filename*=utf-8''a%20b.txt");
    }

    #[test]
    fn firefox_view_uses_extended_form() {
        assert_eq!(build("notes.txt", false, true), "inline; filename*=utf-8''notes.txt");
    }

    #[test]
    fn plain_filename_escapes_embedded_quotes() {
        assert_eq!(
            build("say \"hi\".txt", false, false),
            "inline; filename=\"say \\\"hi\\\".txt\""
        );
    }
}
