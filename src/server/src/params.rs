//! Query-string shapes accepted by the data-plane endpoints.

use serde::Deserialize;

/// `/files/{token}/{filename}?dl=1` forces an `attachment` disposition;
/// absent (or `0`) is `view` (`inline`).
#[derive(Debug, Deserialize, Default)]
pub struct FileQuery {
    #[serde(default)]
    pub dl: Option<u8>,
}

impl FileQuery {
    pub fn wants_attachment(&self) -> bool {
        matches!(self.dl, Some(n) if n != 0)
    }
}

/// The payload a multi-select zip token's `obj-id` carries, per
/// spec.md §4.6 ("the token's object payload contains
/// `{parent_dir, file_list[]}`").
#[derive(Debug, Deserialize)]
pub struct ZipSelection {
    pub parent_dir: String,
    pub file_list: Vec<String>,
}

/// `multipart/form-data` fields for `/upload-api` and `/upload-aj`
/// (spec.md §4.5 step 2), parsed out of the multipart stream field by
/// field rather than via `web::Form` since the body also carries file
/// parts. `Content-Range` is a request header, not a form field, and is
/// read separately.
#[derive(Debug, Default)]
pub struct UploadFields {
    pub parent_dir: Option<String>,
    pub relative_path: Option<String>,
    pub replace: bool,
}
