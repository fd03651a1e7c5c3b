//! Zip archive assembly for `download-dir[-link]` / `download-multi[-link]`.
//!
//! Collecting member bytes is async (block/dir reads go through the
//! storage traits); writing the archive itself is synchronous because
//! `zip::ZipWriter` wants a plain `Write`. Per the concurrency model, the
//! synchronous part is meant to run on a blocking task
//! (`actix_web::web::block` in the server crate) with the resulting
//! buffer forwarded to the response over a channel — [`write_zip`] is
//! that synchronous half.

use crate::download::decrypt_block;
use crate::error::{Result, ThicketError};
use crate::model::Directory;
use crate::store::{BlockStore, FsStore};
use std::future::Future;
use std::io::Cursor;
use std::pin::Pin;

/// One file's worth of already-decrypted bytes plus the archive member
/// name and mtime it should carry.
pub struct ZipEntry {
    pub name: String,
    pub mtime: i64,
    pub bytes: Vec<u8>,
}

type BoxFut<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Recursively walk the directory object `dir_id` and collect every file
/// underneath it. Member names are the POSIX join of `prefix` and each
/// entry's path, with any leading `/` stripped.
pub fn collect_directory_entries<'a>(
    fs: &'a dyn FsStore,
    blocks: &'a dyn BlockStore,
    store_id: &'a str,
    dir_id: &'a str,
    prefix: &'a str,
    key: Option<(&'a [u8], &'a [u8])>,
) -> BoxFut<'a, Vec<ZipEntry>> {
    Box::pin(async move {
        let dir = fs
            .get_dir(store_id, dir_id)
            .await?
            .ok_or_else(|| ThicketError::not_found(format!("directory {dir_id}")))?;

        let mut out = Vec::new();
        for entry in &dir.entries {
            let member_path = join_member(prefix, &entry.name);
            if entry.is_dir() {
                let nested =
                    collect_directory_entries(fs, blocks, store_id, &entry.id, &member_path, key).await?;
                out.extend(nested);
            } else {
                let file = fs
                    .get_file(store_id, &entry.id)
                    .await?
                    .ok_or_else(|| ThicketError::not_found(format!("file {}", entry.id)))?;
                let bytes = read_whole(blocks, store_id, &file, key).await?;
                out.push(ZipEntry {
                    name: member_path,
                    mtime: entry.mtime,
                    bytes,
                });
            }
        }
        Ok(out)
    })
}

/// Resolve each name in `file_list` against `parent_dir`'s directory
/// entries and collect it (recursing if the name names a subdirectory).
/// Fails with `NotFound` on an unknown name, per spec.
pub async fn collect_multi_select_entries(
    fs: &dyn FsStore,
    blocks: &dyn BlockStore,
    store_id: &str,
    root_id: &str,
    parent_dir: &str,
    file_list: &[String],
    key: Option<(&[u8], &[u8])>,
) -> Result<Vec<ZipEntry>> {
    let dir = fs
        .get_dir_by_path(store_id, root_id, parent_dir)
        .await?
        .ok_or_else(|| ThicketError::not_found(format!("directory {parent_dir}")))?;

    let mut out = Vec::new();
    for name in file_list {
        let entry = dir
            .find(name)
            .ok_or_else(|| ThicketError::bad_request(format!("unknown file in selection: {name}")))?;
        if entry.is_dir() {
            let nested = collect_directory_entries(fs, blocks, store_id, &entry.id, name, key).await?;
            out.extend(nested);
        } else {
            let file = fs
                .get_file(store_id, &entry.id)
                .await?
                .ok_or_else(|| ThicketError::not_found(format!("file {}", entry.id)))?;
            let bytes = read_whole(blocks, store_id, &file, key).await?;
            out.push(ZipEntry {
                name: name.clone(),
                mtime: entry.mtime,
                bytes,
            });
        }
    }
    Ok(out)
}

async fn read_whole(
    blocks: &dyn BlockStore,
    store_id: &str,
    file: &crate::model::FileObject,
    key: Option<(&[u8], &[u8])>,
) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(file.file_size as usize);
    for block_id in &file.block_ids {
        let bytes = blocks.read(store_id, block_id).await?;
        let bytes = match key {
            Some((k, iv)) => decrypt_block(&bytes, k, iv)?,
            None => bytes,
        };
        out.extend_from_slice(&bytes);
    }
    Ok(out)
}

fn join_member(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", prefix.trim_matches('/'), name)
    }
}

/// Build a deflate zip archive in memory from `entries`. Synchronous by
/// design — call this from a blocking task in the HTTP layer.
pub fn write_zip(entries: &[ZipEntry]) -> Result<Vec<u8>> {
    use ::zip::write::FileOptions;
    use ::zip::{DateTime, ZipWriter};
    use chrono::{Datelike, Timelike};

    let cursor = Cursor::new(Vec::new());
    let mut writer = ZipWriter::new(cursor);

    for entry in entries {
        let dt = crate::util::time::unix_to_datetime(entry.mtime);
        let zip_dt = DateTime::from_date_and_time(
            dt.year() as u16,
            dt.month() as u8,
            dt.day() as u8,
            dt.hour() as u8,
            dt.minute() as u8,
            dt.second() as u8,
        )
        .unwrap_or_default();

        let options = FileOptions::default()
            .compression_method(::zip::CompressionMethod::Deflated)
            .last_modified_time(zip_dt);

        writer
            .start_file(entry.name.clone(), options)
            .map_err(|e| ThicketError::internal(format!("zip start_file: {e}")))?;
        std::io::Write::write_all(&mut writer, &entry.bytes)
            .map_err(|e| ThicketError::internal(format!("zip write: {e}")))?;
    }

    let cursor = writer
        .finish()
        .map_err(|e| ThicketError::internal(format!("zip finish: {e}")))?;
    Ok(cursor.into_inner())
}

/// Default archive name for a multi-select zip: `documents-export-YYYY-M-D.zip`.
pub fn default_multi_zip_name(now: i64) -> String {
    use chrono::Datelike;
    let dt = crate::util::time::unix_to_datetime(now);
    format!("documents-export-{}-{}-{}.zip", dt.year(), dt.month(), dt.day())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::object::{sha1_hex, Dirent, FileObject, MODE_DIR, MODE_FILE};
    use crate::store::local::LocalObjectStore;

    async fn seed_small_tree(fs: &LocalObjectStore, blocks: &LocalObjectStore) -> String {
        let data = b"hello world".to_vec();
        let block_id = sha1_hex(&data);
        blocks.write("repo1", &block_id, &data).await.unwrap();
        let file = FileObject::new(vec![block_id], data.len() as u64);
        let file_id = fs.save_file("repo1", &file).await.unwrap();

        let inner_dirent = Dirent {
            name: "readme.txt".into(),
            id: file_id,
            mode: MODE_FILE,
            mtime: 1000,
            size: data.len() as u64,
            modifier: "alice".into(),
        };
        let inner_dir = Directory::new_sorted(vec![inner_dirent]);
        let inner_dir_id = fs.save_dir("repo1", &inner_dir).await.unwrap();

        let sub_dirent = Dirent {
            name: "docs".into(),
            id: inner_dir_id,
            mode: MODE_DIR,
            mtime: 1000,
            size: 0,
            modifier: "alice".into(),
        };
        let root = Directory::new_sorted(vec![sub_dirent]);
        fs.save_dir("repo1", &root).await.unwrap()
    }

    #[tokio::test]
    async fn directory_walk_collects_nested_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path());
        let root_id = seed_small_tree(&store, &store).await;

        let entries = collect_directory_entries(&store, &store, "repo1", &root_id, "", None)
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "docs/readme.txt");
        assert_eq!(entries[0].bytes, b"hello world");
    }

    #[tokio::test]
    async fn write_zip_produces_nonempty_archive() {
        let entries = vec![ZipEntry {
            name: "a.txt".into(),
            mtime: 0,
            bytes: b"content".to_vec(),
        }];
        let bytes = write_zip(&entries).unwrap();
        assert!(bytes.starts_with(b"PK"));
    }

    #[tokio::test]
    async fn multi_select_rejects_unknown_name() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path());
        let root_id = seed_small_tree(&store, &store).await;

        let err = collect_multi_select_entries(
            &store,
            &store,
            "repo1",
            &root_id,
            "/",
            &["nonexistent".to_string()],
            None,
        )
        .await;
        assert!(err.is_err());
    }
}
