//! Tree mutator (C2): pure-ish functions that, given a root directory id
//! and a path, return a new root id with an entry inserted/replaced or a
//! batch of entries appended. Every mutation rewrites every directory on
//! the path and persists intermediate directory objects through
//! [`FsStore`]; sibling subtrees are preserved by reference (P4).

use crate::constants::MAX_UNIQUE_NAME_ATTEMPTS;
use crate::error::{Result, ThicketError};
use crate::model::{Dirent, Directory};
use crate::store::FsStore;
use std::future::Future;
use std::pin::Pin;

fn split_path(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Split `name` into `(stem, ext)` at the *first* `.`, matching the
/// unique-name rule's `stem[.ext]` convention (a leading dot, as in
/// `.gitignore`, has no stem and is left whole).
fn split_stem_ext(name: &str) -> (&str, Option<&str>) {
    match name.find('.') {
        Some(idx) if idx > 0 => (&name[..idx], Some(&name[idx..])),
        _ => (name, None),
    }
}

/// Disambiguate `name` against `dir`'s existing entries by trying
/// `stem (i)[.ext]` for `i = 1..=100`. Fails once all 100 attempts
/// collide (P7).
pub fn unique_name(dir: &Directory, name: &str) -> Result<String> {
    if dir.find(name).is_none() {
        return Ok(name.to_string());
    }
    let (stem, ext) = split_stem_ext(name);
    for i in 1..=MAX_UNIQUE_NAME_ATTEMPTS {
        let candidate = match ext {
            Some(ext) => format!("{stem} ({i}){ext}"),
            None => format!("{stem} ({i})"),
        };
        if dir.find(&candidate).is_none() {
            return Ok(candidate);
        }
    }
    Err(ThicketError::internal("failed to generate unique name"))
}

/// Validate an uploaded/inserted name per C2's input-rejection rule:
/// non-UTF-8 is impossible once it's a Rust `&str`, so this checks length
/// and the `/` exclusion (non-UTF-8 bytes are rejected
/// further upstream, at the multipart boundary, before a name ever
/// becomes a `&str`).
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() >= crate::constants::MAX_FILE_NAME_LEN {
        return Err(ThicketError::bad_request(format!(
            "invalid file name length: {name:?}"
        )));
    }
    if name.contains('/') {
        return Err(ThicketError::bad_request(format!(
            "file name may not contain '/': {name:?}"
        )));
    }
    Ok(())
}

type BoxFut<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Insert or replace `dirent` in the directory found at `path` under
/// `root_id`. If `must_exist` is set (the directory-pointer-update mode
/// C4 and replace-mode uploads use), a missing leaf name is a
/// [`ThicketError::NotFound`] rather than an insert.
pub fn put_file<'a>(
    fs: &'a dyn FsStore,
    store_id: &'a str,
    root_id: &'a str,
    path: &'a str,
    dirent: Dirent,
    must_exist: bool,
    now: i64,
) -> BoxFut<'a, String> {
    Box::pin(async move {
        let segments = split_path(path);
        put_file_rec(fs, store_id, root_id, &segments, dirent, must_exist, now).await
    })
}

fn put_file_rec<'a>(
    fs: &'a dyn FsStore,
    store_id: &'a str,
    dir_id: &'a str,
    segments: &'a [&'a str],
    dirent: Dirent,
    must_exist: bool,
    now: i64,
) -> BoxFut<'a, String> {
    Box::pin(async move {
        let dir = fs
            .get_dir(store_id, dir_id)
            .await?
            .ok_or_else(|| ThicketError::not_found(format!("directory {dir_id}")))?;

        if segments.is_empty() {
            let mut entries = dir.entries.clone();
            match entries.iter().position(|e| e.name == dirent.name) {
                Some(idx) => {
                    let mut updated = dirent;
                    updated.mtime = now;
                    entries[idx] = updated;
                }
                None => {
                    if must_exist {
                        return Err(ThicketError::not_found(format!(
                            "entry {:?} not found for replace",
                            dirent.name
                        )));
                    }
                    let mut inserted = dirent;
                    inserted.mtime = now;
                    entries.push(inserted);
                }
            }
            let new_dir = Directory::new_sorted(entries);
            return fs.save_dir(store_id, &new_dir).await;
        }

        let head = segments[0];
        let rest = &segments[1..];
        let child = dir
            .find(head)
            .ok_or_else(|| ThicketError::not_found(format!("path segment {head:?}")))?
            .clone();
        if !child.is_dir() {
            return Err(ThicketError::bad_request(format!("{head:?} is not a directory")));
        }

        let new_child_id = put_file_rec(fs, store_id, &child.id, rest, dirent, must_exist, now).await?;

        let mut entries = dir.entries.clone();
        let idx = entries.iter().position(|e| e.name == head).unwrap();
        entries[idx].id = new_child_id;
        entries[idx].mtime = now;
        let new_dir = Directory::new_sorted(entries);
        fs.save_dir(store_id, &new_dir).await
    })
}

/// Append a batch of dirents to the directory at `path`, returning the
/// new root id and (via the return value, in input order) the final
/// names used after disambiguation/replacement.
pub async fn post_multi_files(
    fs: &dyn FsStore,
    store_id: &str,
    root_id: &str,
    path: &str,
    dirents: Vec<Dirent>,
    replace: bool,
    now: i64,
) -> Result<(String, Vec<String>)> {
    let segments = split_path(path);
    post_multi_files_rec(fs, store_id, root_id, &segments, dirents, replace, now).await
}

fn post_multi_files_rec<'a>(
    fs: &'a dyn FsStore,
    store_id: &'a str,
    dir_id: &'a str,
    segments: &'a [&'a str],
    dirents: Vec<Dirent>,
    replace: bool,
    now: i64,
) -> BoxFut<'a, (String, Vec<String>)> {
    Box::pin(async move {
        let dir = fs
            .get_dir(store_id, dir_id)
            .await?
            .ok_or_else(|| ThicketError::not_found(format!("directory {dir_id}")))?;

        // Recursion must happen when the path segment equals the current
        // dirent's name, not on inequality.
        if segments.is_empty() {
            let mut entries = dir.entries.clone();
            let mut names_out = Vec::with_capacity(dirents.len());

            for mut dirent in dirents {
                dirent.mtime = now;
                if replace {
                    if let Some(idx) = entries.iter().position(|e| e.name == dirent.name) {
                        names_out.push(dirent.name.clone());
                        entries[idx] = dirent;
                        continue;
                    }
                }
                let scratch = Directory {
                    version: 1,
                    entries: entries.clone(),
                };
                let final_name = unique_name(&scratch, &dirent.name)?;
                dirent.name = final_name.clone();
                names_out.push(final_name);
                entries.push(dirent);
            }

            let new_dir = Directory::new_sorted(entries);
            let new_id = fs.save_dir(store_id, &new_dir).await?;
            return Ok((new_id, names_out));
        }

        let head = segments[0];
        let rest = &segments[1..];
        let child = dir
            .find(head)
            .ok_or_else(|| ThicketError::not_found(format!("path segment {head:?}")))?
            .clone();
        if !child.is_dir() {
            return Err(ThicketError::bad_request(format!("{head:?} is not a directory")));
        }

        let (new_child_id, names_out) =
            post_multi_files_rec(fs, store_id, &child.id, rest, dirents, replace, now).await?;

        let mut entries = dir.entries.clone();
        let idx = entries.iter().position(|e| e.name == head).unwrap();
        entries[idx].id = new_child_id;
        entries[idx].mtime = now;
        let new_dir = Directory::new_sorted(entries);
        let new_id = fs.save_dir(store_id, &new_dir).await?;
        Ok((new_id, names_out))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::object::MODE_FILE;
    use crate::store::local::LocalObjectStore;

    fn file_dirent(name: &str) -> Dirent {
        Dirent {
            name: name.to_string(),
            id: "0".repeat(40),
            mode: MODE_FILE,
            mtime: 0,
            size: 0,
            modifier: "tester".into(),
        }
    }

    #[tokio::test]
    async fn unique_name_disambiguates_up_to_100() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path());
        let mut root = Directory::empty();
        let root_id = store.save_dir("r", &root).await.unwrap();
        root = Directory::empty();
        let _ = root;

        let mut current_root = root_id;
        for _ in 0..100 {
            let (new_root, names) = post_multi_files(
                &store,
                "r",
                &current_root,
                "/",
                vec![file_dirent("a.txt")],
                false,
                0,
            )
            .await
            .unwrap();
            current_root = new_root;
            assert_eq!(names.len(), 1);
        }

        let result = post_multi_files(
            &store,
            "r",
            &current_root,
            "/",
            vec![file_dirent("a.txt")],
            false,
            0,
        )
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn put_file_replaces_existing_unconditionally() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path());
        let root = Directory::empty();
        let root_id = store.save_dir("r", &root).await.unwrap();

        let (root_id, _) =
            post_multi_files(&store, "r", &root_id, "/", vec![file_dirent("a.txt")], false, 0)
                .await
                .unwrap();

        let mut replacement = file_dirent("a.txt");
        replacement.id = "1".repeat(40);
        let new_root = put_file(&store, "r", &root_id, "/", replacement, true, 5)
            .await
            .unwrap();

        let dir = store.get_dir("r", &new_root).await.unwrap().unwrap();
        let entry = dir.find("a.txt").unwrap();
        assert_eq!(entry.id, "1".repeat(40));
        assert_eq!(entry.mtime, 5);
    }

    #[tokio::test]
    async fn put_file_must_exist_fails_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path());
        let root = Directory::empty();
        let root_id = store.save_dir("r", &root).await.unwrap();

        let result = put_file(&store, "r", &root_id, "/", file_dirent("missing.txt"), true, 0).await;
        assert!(result.is_err());
    }
}
