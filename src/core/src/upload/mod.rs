//! Upload pipeline (C5): resumable/whole-file ingest, fixed-size
//! chunking with parallel hashing/encryption, and the quota → index →
//! commit flow.

pub mod resumable;

use crate::constants::{BLOCK_SIZE, MASTER_BRANCH};
use crate::core::tree::{post_multi_files, put_file, validate_name};
use crate::core::{gen_new_commit, CommitRequest};
use crate::error::{Result, ThicketError};
use crate::model::object::{sha1_hex, MODE_DIR, MODE_FILE};
use crate::model::{Dirent, Directory, EncryptionInfo, FileObject};
use crate::store::{BlockStore, CommitStore, FsStore, RepoRegistry};
use futures_util::future::try_join_all;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncSeekExt};

/// A single uploaded file payload sitting on local disk, fully assembled
/// (the resumable branch has already reassembled all chunks by the time
/// this is built).
pub struct PendingFile {
    pub name: String,
    pub temp_path: PathBuf,
    pub size: u64,
}

/// Caller-supplied request context; everything the HTTP layer parsed out
/// of the multipart body and the resolved access token before calling
/// into this module.
pub struct UploadRequest<'a> {
    pub repo_id: &'a str,
    pub store_id: &'a str,
    pub parent_dir: &'a str,
    pub relative_path: Option<&'a str>,
    pub replace: bool,
    pub user: &'a str,
    pub encryption_key: Option<(&'a [u8], &'a [u8])>,
    pub max_upload_size: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadedFileInfo {
    pub name: String,
    pub id: String,
    pub size: u64,
}

/// Split `path` into fixed `BLOCK_SIZE` chunks, hash (and optionally
/// AES-CBC-encrypt) each one concurrently, and persist a `FileObject`
/// whose `block_ids` preserve byte order. One task per block, joined via
/// `try_join_all` — the "bounded fan-out with order-preserving join"
/// shape the concurrency model calls for (the driver writes each result
/// into its index, not append-on-completion).
pub async fn index_file(
    blocks: &dyn BlockStore,
    fs: &dyn FsStore,
    store_id: &str,
    path: &Path,
    size: u64,
    encryption_key: Option<(&[u8], &[u8])>,
) -> Result<(String, u64)> {
    let block_count = if size == 0 {
        0
    } else {
        ((size + BLOCK_SIZE - 1) / BLOCK_SIZE) as usize
    };

    let mut tasks = Vec::with_capacity(block_count);
    for idx in 0..block_count {
        let offset = idx as u64 * BLOCK_SIZE;
        let len = BLOCK_SIZE.min(size - offset);
        let path = path.to_path_buf();
        let key = encryption_key.map(|(k, iv)| (k.to_vec(), iv.to_vec()));

        tasks.push(async move {
            let bytes = read_slice(&path, offset, len).await?;
            let stored = match &key {
                Some((key, iv)) => encrypt_block(&bytes, key, iv)?,
                None => bytes,
            };
            Result::Ok((idx, stored))
        });
    }

    let mut results = try_join_all(tasks).await?;
    results.sort_by_key(|(idx, _)| *idx);

    let mut block_ids = Vec::with_capacity(results.len());
    for (_, bytes) in results {
        let id = sha1_hex(&bytes);
        if !blocks.exists(store_id, &id).await? {
            blocks.write(store_id, &id, &bytes).await?;
        }
        block_ids.push(id);
    }

    let file = FileObject::new(block_ids, size);
    let file_id = fs.save_file(store_id, &file).await?;
    Ok((file_id, size))
}

async fn read_slice(path: &Path, offset: u64, len: u64) -> Result<Vec<u8>> {
    let mut file = tokio::fs::File::open(path).await?;
    file.seek(std::io::SeekFrom::Start(offset)).await?;
    let mut buf = vec![0u8; len as usize];
    file.read_exact(&mut buf).await?;
    Ok(buf)
}

fn encrypt_block(plain: &[u8], key: &[u8], iv: &[u8]) -> Result<Vec<u8>> {
    use aes::Aes256;
    use cbc::cipher::block_padding::Pkcs7;
    use cbc::cipher::{BlockEncryptMut, KeyIvInit};

    type Encryptor = cbc::Encryptor<Aes256>;
    let encryptor = Encryptor::new_from_slices(key, iv)
        .map_err(|e| ThicketError::internal(format!("bad key/iv: {e}")))?;
    Ok(encryptor.encrypt_padded_vec_mut::<Pkcs7>(plain))
}

/// Materialize any missing ancestor directories along `parent_dir` +
/// `relative_path`'s directory portion, starting from the deepest
/// existing ancestor, inserting placeholder (`ZERO_OBJECT_ID`) dirents
/// via C2 and returning the new root id plus a commit description when
/// any directory was actually created.
pub async fn materialize_path<'a>(
    fs: &'a dyn FsStore,
    store_id: &'a str,
    root_id: &'a str,
    dir_path: &'a str,
    user: &'a str,
    now: i64,
) -> Result<(String, Option<String>)> {
    let segments: Vec<&str> = dir_path.split('/').filter(|s| !s.is_empty()).collect();
    let mut current_root = root_id.to_string();
    let mut created_from: Option<usize> = None;

    for (depth, segment) in segments.iter().enumerate() {
        let parent_path = format!("/{}", segments[..depth].join("/"));
        let parent_dir = fs
            .get_dir_by_path(store_id, &current_root, &parent_path)
            .await?
            .unwrap_or_else(Directory::empty);

        if parent_dir.find(segment).is_some() {
            continue;
        }

        created_from.get_or_insert(depth);
        let dirent = Dirent {
            name: segment.to_string(),
            id: crate::constants::ZERO_OBJECT_ID.to_string(),
            mode: MODE_DIR,
            mtime: now,
            size: 0,
            modifier: user.to_string(),
        };
        current_root = put_file(fs, store_id, &current_root, &parent_path, dirent, false, now).await?;
    }

    let desc = created_from.map(|depth| format!("Added directory \"{}\"", segments[depth..].join("/")));
    Ok((current_root, desc))
}

/// Step 7 (indexing) + step 8 (commit) of the upload pipeline: hash/
/// persist every pending file, append their dirents at `parent_dir`
/// (disambiguating names per the unique-name rule unless `replace` is
/// set), and drive the commit engine.
#[allow(clippy::too_many_arguments)]
pub async fn commit_uploaded_files(
    registry: &dyn RepoRegistry,
    blocks: &dyn BlockStore,
    fs: &dyn FsStore,
    commits: &dyn CommitStore,
    req: &UploadRequest<'_>,
    files: Vec<PendingFile>,
    repo_name: &str,
    repo_desc: &str,
    encryption: EncryptionInfo,
    now: i64,
) -> Result<Vec<UploadedFileInfo>> {
    for file in &files {
        validate_name(&file.name)?;
        if let Some(limit) = req.max_upload_size {
            if file.size > limit {
                return Err(ThicketError::TooLarge {
                    size: file.size,
                    limit,
                });
            }
        }
    }

    let branch = registry
        .get_branch(req.repo_id, MASTER_BRANCH)
        .await?
        .ok_or_else(|| ThicketError::internal(format!("no master branch for {}", req.repo_id)))?;
    let base_commit_id = branch.commit_id;
    let base_commit = commits
        .load(req.store_id, &base_commit_id)
        .await?
        .ok_or_else(|| ThicketError::not_found(format!("commit {base_commit_id}")))?;

    let target_dir = match req.relative_path {
        Some(rel) if !rel.is_empty() => format!("{}/{}", req.parent_dir.trim_end_matches('/'), rel),
        _ => req.parent_dir.to_string(),
    };

    let (mut root_id, materialize_desc) =
        materialize_path(fs, req.store_id, &base_commit.root_id, &target_dir, req.user, now).await?;

    let mut base_for_upload = base_commit_id.clone();
    if let Some(desc) = materialize_desc {
        base_for_upload = gen_new_commit(
            registry,
            fs,
            commits,
            CommitRequest {
                repo_id: req.repo_id,
                store_id: req.store_id,
                creator_id: req.user,
                creator_name: req.user,
                desc: &desc,
                repo_name,
                repo_desc,
                encryption: encryption.clone(),
            },
            &base_commit_id,
            &root_id,
            now,
        )
        .await?;
    }

    let mut dirents = Vec::with_capacity(files.len());
    let mut ids = Vec::with_capacity(files.len());
    let mut sizes = Vec::with_capacity(files.len());
    for file in &files {
        let (file_id, size) = index_file(
            blocks,
            fs,
            req.store_id,
            &file.temp_path,
            file.size,
            req.encryption_key,
        )
        .await?;
        dirents.push(Dirent {
            name: file.name.clone(),
            id: file_id.clone(),
            mode: MODE_FILE,
            mtime: now,
            size,
            modifier: req.user.to_string(),
        });
        ids.push(file_id);
        sizes.push(size);
    }

    let (new_root, names_out) =
        post_multi_files(fs, req.store_id, &root_id, &target_dir, dirents, req.replace, now).await?;
    root_id = new_root;

    let desc = match names_out.as_slice() {
        [] => return Err(ThicketError::bad_request("no files to upload")),
        [only] => format!("Added \"{only}\"."),
        [first, rest @ ..] => format!("Added \"{first}\" and {} more files.", rest.len()),
    };

    gen_new_commit(
        registry,
        fs,
        commits,
        CommitRequest {
            repo_id: req.repo_id,
            store_id: req.store_id,
            creator_id: req.user,
            creator_name: req.user,
            desc: &desc,
            repo_name,
            repo_desc,
            encryption,
        },
        &base_for_upload,
        &root_id,
        now,
    )
    .await?;

    Ok(names_out
        .into_iter()
        .zip(ids)
        .zip(sizes)
        .map(|((name, id), size)| UploadedFileInfo { name, id, size })
        .collect())
}
