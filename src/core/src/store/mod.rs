//! Capability-interface boundary to the external collaborators listed in
//! spec.md §6 ("Storage contract"): block/fs/commit stores and the repo
//! registry. The core calls only these trait methods; concrete backends
//! (local disk, S3, a real relational database, ...) live outside this
//! crate. [`local`] ships one reference implementation so the crate is
//! buildable and testable standalone.

pub mod local;

use crate::error::Result;
use crate::model::{Branch, Commit, Directory, FileObject, RepoFileCount, RepoInfo, RepoSize, VirtualRepo};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Opaque byte-addressed block storage. Blocks are written once under
/// their content id and never modified.
#[async_trait]
pub trait BlockStore: Send + Sync {
    async fn exists(&self, store_id: &str, block_id: &str) -> Result<bool>;
    async fn stat(&self, store_id: &str, block_id: &str) -> Result<u64>;
    async fn read(&self, store_id: &str, block_id: &str) -> Result<Vec<u8>>;
    async fn write(&self, store_id: &str, block_id: &str, bytes: &[u8]) -> Result<()>;
}

/// File and directory object storage, plus the small set of derived
/// lookups (by-path resolution, recursive size/file-count) the core
/// needs repeatedly.
#[async_trait]
pub trait FsStore: Send + Sync {
    async fn get_file(&self, store_id: &str, id: &str) -> Result<Option<FileObject>>;
    async fn get_dir(&self, store_id: &str, id: &str) -> Result<Option<Directory>>;
    async fn save_file(&self, store_id: &str, file: &FileObject) -> Result<String>;
    async fn save_dir(&self, store_id: &str, dir: &Directory) -> Result<String>;

    /// Resolve `path` (POSIX-style, leading `/`) starting from `root`,
    /// returning the directory found there, if any.
    async fn get_dir_by_path(
        &self,
        store_id: &str,
        root: &str,
        path: &str,
    ) -> Result<Option<Directory>>;

    /// As [`FsStore::get_dir_by_path`] but returns only the id.
    async fn get_dir_id_by_path(
        &self,
        store_id: &str,
        root: &str,
        path: &str,
    ) -> Result<Option<String>>;

    /// Recursively sum `(size, file_count)` under `root` at `path`. Used
    /// by the background size worker (C7) for cold (no prior head)
    /// computation.
    async fn file_count_info(
        &self,
        store_id: &str,
        root: &str,
        path: &str,
    ) -> Result<(u64, u64)>;
}

#[async_trait]
pub trait CommitStore: Send + Sync {
    async fn load(&self, store_id: &str, id: &str) -> Result<Option<Commit>>;
    async fn save(&self, store_id: &str, commit: &Commit) -> Result<()>;
}

/// A resolved, registry-level view of a repository: identity, the object
/// store partition it lives in (its own for an origin repo, its origin's
/// for a virtual repo), and virtual-repo linkage if any.
#[derive(Debug, Clone)]
pub struct Repo {
    pub id: String,
    pub store_id: String,
    pub version: u32,
    pub head_commit_id: Option<String>,
    pub info: RepoInfo,
    pub virtual_info: Option<VirtualRepo>,
}

/// The relational tables (`Branch`, `RepoInfo`, `RepoSize`,
/// `RepoFileCount`, `VirtualRepo`) plus the upload temp-file map, behind
/// the transactional CAS semantics spec.md §3 invariant 4 requires.
#[async_trait]
pub trait RepoRegistry: Send + Sync {
    async fn get(&self, repo_id: &str) -> Result<Repo>;
    async fn is_virtual(&self, repo_id: &str) -> Result<bool>;
    async fn get_virtual_info_by_origin(&self, origin_repo_id: &str) -> Result<Vec<VirtualRepo>>;
    async fn set_virtual_repo_base_commit_path(
        &self,
        repo_id: &str,
        base_commit: &str,
        path: &str,
    ) -> Result<()>;
    async fn del_virtual_repo(&self, repo_id: &str) -> Result<()>;
    async fn rename_repo(&self, repo_id: &str, new_name: &str) -> Result<()>;

    async fn get_branch(&self, repo_id: &str, name: &str) -> Result<Option<Branch>>;

    /// Advance `name`'s commit id from `old_commit_id` to `new_commit_id`
    /// iff the row's current value is still `old_commit_id` — the CAS
    /// branch update (spec.md §3 invariant 4, §4.3 step 3). Returns
    /// whether the swap succeeded.
    async fn cas_branch(
        &self,
        repo_id: &str,
        name: &str,
        old_commit_id: &str,
        new_commit_id: &str,
    ) -> Result<bool>;

    async fn get_repo_size(&self, repo_id: &str) -> Result<RepoSize>;
    async fn set_repo_size(&self, repo_id: &str, size: RepoSize) -> Result<()>;
    async fn get_repo_file_count(&self, repo_id: &str) -> Result<RepoFileCount>;
    async fn set_repo_file_count(&self, repo_id: &str, count: RepoFileCount) -> Result<()>;

    /// The process-local upload-temp-file map keyed by `(repo_id,
    /// absolute_path)`, used by the resumable-upload branch of C5.
    async fn get_upload_tmp_file(&self, repo_id: &str, abs_path: &str) -> Result<Option<PathBuf>>;
    async fn add_upload_tmp_file(
        &self,
        repo_id: &str,
        abs_path: &str,
        tmp_path: &Path,
    ) -> Result<()>;
    async fn del_upload_tmp_file(&self, repo_id: &str, abs_path: &str) -> Result<()>;
}
