//! A single, self-contained implementation of the storage contract:
//! content-addressed objects live as files under a data directory (two
//! level hex fan-out, the way most content-addressed stores in the pack
//! lay blocks out), and the relational tables are an in-memory map behind
//! a mutex. Good enough to build and test this core standalone; a real
//! deployment swaps these out for a database-backed registry and a
//! networked block store.

use super::{BlockStore, CommitStore, FsStore, Repo, RepoRegistry};
use crate::error::{Result, ThicketError};
use crate::model::{Branch, Commit, Directory, FileObject, RepoFileCount, RepoInfo, RepoSize, RepoStatus, VirtualRepo};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn fan_out_path(root: &Path, kind: &str, id: &str) -> PathBuf {
    let (a, b) = id.split_at(2);
    root.join(kind).join(a).join(b)
}

/// On-disk, content-addressed store for blocks/files/dirs/commits rooted
/// at `data_dir`. One instance is shared (via `Arc`) across all repos;
/// `store_id` namespaces each repo's objects into its own subtree so
/// virtual repos (which share their origin's `store_id`) see the same
/// objects as their origin without copying.
#[derive(Clone)]
pub struct LocalObjectStore {
    data_dir: PathBuf,
}

impl LocalObjectStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        LocalObjectStore {
            data_dir: data_dir.into(),
        }
    }

    fn root_for(&self, store_id: &str) -> PathBuf {
        self.data_dir.join("stores").join(store_id)
    }

    async fn write_object(&self, store_id: &str, kind: &str, id: &str, bytes: Vec<u8>) -> Result<()> {
        let path = fan_out_path(&self.root_for(store_id), kind, id);
        tokio::fs::create_dir_all(path.parent().unwrap()).await?;
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            tokio::fs::write(&path, bytes).await?;
        }
        Ok(())
    }

    async fn read_object(&self, store_id: &str, kind: &str, id: &str) -> Result<Option<Vec<u8>>> {
        let path = fan_out_path(&self.root_for(store_id), kind, id);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl BlockStore for LocalObjectStore {
    async fn exists(&self, store_id: &str, block_id: &str) -> Result<bool> {
        Ok(fan_out_path(&self.root_for(store_id), "blocks", block_id).exists())
    }

    async fn stat(&self, store_id: &str, block_id: &str) -> Result<u64> {
        let path = fan_out_path(&self.root_for(store_id), "blocks", block_id);
        let meta = tokio::fs::metadata(&path)
            .await
            .map_err(|_| ThicketError::not_found(format!("block {block_id}")))?;
        Ok(meta.len())
    }

    async fn read(&self, store_id: &str, block_id: &str) -> Result<Vec<u8>> {
        self.read_object(store_id, "blocks", block_id)
            .await?
            .ok_or_else(|| ThicketError::not_found(format!("block {block_id}")))
    }

    async fn write(&self, store_id: &str, block_id: &str, bytes: &[u8]) -> Result<()> {
        self.write_object(store_id, "blocks", block_id, bytes.to_vec()).await
    }
}

#[async_trait]
impl FsStore for LocalObjectStore {
    async fn get_file(&self, store_id: &str, id: &str) -> Result<Option<FileObject>> {
        match self.read_object(store_id, "files", id).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn get_dir(&self, store_id: &str, id: &str) -> Result<Option<Directory>> {
        match self.read_object(store_id, "dirs", id).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn save_file(&self, store_id: &str, file: &FileObject) -> Result<String> {
        let id = file.compute_id();
        self.write_object(store_id, "files", &id, file.canonical_bytes()).await?;
        Ok(id)
    }

    async fn save_dir(&self, store_id: &str, dir: &Directory) -> Result<String> {
        let id = dir.compute_id();
        self.write_object(store_id, "dirs", &id, dir.canonical_bytes()).await?;
        Ok(id)
    }

    async fn get_dir_by_path(
        &self,
        store_id: &str,
        root: &str,
        path: &str,
    ) -> Result<Option<Directory>> {
        let Some(id) = self.get_dir_id_by_path(store_id, root, path).await? else {
            return Ok(None);
        };
        self.get_dir(store_id, &id).await
    }

    async fn get_dir_id_by_path(
        &self,
        store_id: &str,
        root: &str,
        path: &str,
    ) -> Result<Option<String>> {
        let mut current = root.to_string();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            let Some(dir) = self.get_dir(store_id, &current).await? else {
                return Ok(None);
            };
            let Some(entry) = dir.find(segment) else {
                return Ok(None);
            };
            if !entry.is_dir() {
                return Ok(None);
            }
            current = entry.id.clone();
        }
        Ok(Some(current))
    }

    async fn file_count_info(&self, store_id: &str, root: &str, path: &str) -> Result<(u64, u64)> {
        let Some(dir_id) = self.get_dir_id_by_path(store_id, root, path).await? else {
            return Ok((0, 0));
        };
        self.sum_tree(store_id, &dir_id).await
    }
}

impl LocalObjectStore {
    fn sum_tree<'a>(
        &'a self,
        store_id: &'a str,
        dir_id: &'a str,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(u64, u64)>> + Send + 'a>> {
        Box::pin(async move {
            let Some(dir) = self.get_dir(store_id, dir_id).await? else {
                return Ok((0, 0));
            };
            let mut total_size = 0u64;
            let mut total_files = 0u64;
            for entry in &dir.entries {
                if entry.is_dir() {
                    let (s, f) = self.sum_tree(store_id, &entry.id).await?;
                    total_size += s;
                    total_files += f;
                } else {
                    total_size += entry.size;
                    total_files += 1;
                }
            }
            Ok((total_size, total_files))
        })
    }
}

#[async_trait]
impl CommitStore for LocalObjectStore {
    async fn load(&self, store_id: &str, id: &str) -> Result<Option<Commit>> {
        match self.read_object(store_id, "commits", id).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, store_id: &str, commit: &Commit) -> Result<()> {
        self.write_object(store_id, "commits", &commit.commit_id, commit.canonical_bytes())
            .await
    }
}

#[derive(Default)]
struct RegistryState {
    repos: HashMap<String, Repo>,
    branches: HashMap<(String, String), Branch>,
    sizes: HashMap<String, RepoSize>,
    file_counts: HashMap<String, RepoFileCount>,
    virtual_by_origin: HashMap<String, Vec<String>>,
    upload_tmp: HashMap<(String, String), PathBuf>,
}

/// In-memory registry standing in for the relational database spec.md
/// assumes the core is given. Branch advancement is a single mutex
/// critical section, giving the compare-and-swap semantics invariant 4
/// requires even though there's no real transaction underneath.
pub struct LocalRegistry {
    state: Arc<Mutex<RegistryState>>,
}

impl LocalRegistry {
    pub fn new() -> Self {
        LocalRegistry {
            state: Arc::new(Mutex::new(RegistryState::default())),
        }
    }

    /// Test/bootstrap helper: register a brand-new origin repo with an
    /// empty root directory and an initial commit, returning the repo id.
    pub fn create_repo(&self, repo_id: &str, name: &str, root_id: &str, commit: &Commit) {
        let mut state = self.state.lock();
        state.repos.insert(
            repo_id.to_string(),
            Repo {
                id: repo_id.to_string(),
                store_id: repo_id.to_string(),
                version: 1,
                head_commit_id: Some(commit.commit_id.clone()),
                info: RepoInfo {
                    repo_id: repo_id.to_string(),
                    name: name.to_string(),
                    update_time: commit.ctime,
                    version: 1,
                    is_encrypted: commit.encryption.encrypted,
                    last_modifier: commit.creator_id.clone(),
                    status: RepoStatus::Normal,
                },
                virtual_info: None,
            },
        );
        state.branches.insert(
            (repo_id.to_string(), crate::constants::MASTER_BRANCH.to_string()),
            Branch {
                repo_id: repo_id.to_string(),
                name: crate::constants::MASTER_BRANCH.to_string(),
                commit_id: commit.commit_id.clone(),
            },
        );
        let _ = root_id;
    }

    pub fn create_virtual_repo(&self, repo_id: &str, name: &str, origin_repo: &str, path: &str, commit: &Commit) {
        self.create_repo(repo_id, name, "", commit);
        let mut state = self.state.lock();
        if let Some(repo) = state.repos.get_mut(repo_id) {
            repo.store_id = origin_repo.to_string();
            repo.virtual_info = Some(VirtualRepo {
                repo_id: repo_id.to_string(),
                origin_repo: origin_repo.to_string(),
                path: path.to_string(),
                base_commit: commit.commit_id.clone(),
            });
        }
        state
            .virtual_by_origin
            .entry(origin_repo.to_string())
            .or_default()
            .push(repo_id.to_string());
    }

    pub fn set_head(&self, repo_id: &str, commit_id: &str) {
        let mut state = self.state.lock();
        if let Some(repo) = state.repos.get_mut(repo_id) {
            repo.head_commit_id = Some(commit_id.to_string());
        }
        if let Some(branch) = state
            .branches
            .get_mut(&(repo_id.to_string(), crate::constants::MASTER_BRANCH.to_string()))
        {
            branch.commit_id = commit_id.to_string();
        }
    }
}

impl Default for LocalRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RepoRegistry for LocalRegistry {
    async fn get(&self, repo_id: &str) -> Result<Repo> {
        self.state
            .lock()
            .repos
            .get(repo_id)
            .cloned()
            .ok_or_else(|| ThicketError::not_found(format!("repo {repo_id}")))
    }

    async fn is_virtual(&self, repo_id: &str) -> Result<bool> {
        Ok(self
            .state
            .lock()
            .repos
            .get(repo_id)
            .map(|r| r.virtual_info.is_some())
            .unwrap_or(false))
    }

    async fn get_virtual_info_by_origin(&self, origin_repo_id: &str) -> Result<Vec<VirtualRepo>> {
        let state = self.state.lock();
        let ids = state
            .virtual_by_origin
            .get(origin_repo_id)
            .cloned()
            .unwrap_or_default();
        Ok(ids
            .into_iter()
            .filter_map(|id| state.repos.get(&id).and_then(|r| r.virtual_info.clone()))
            .collect())
    }

    async fn set_virtual_repo_base_commit_path(
        &self,
        repo_id: &str,
        base_commit: &str,
        path: &str,
    ) -> Result<()> {
        let mut state = self.state.lock();
        if let Some(repo) = state.repos.get_mut(repo_id) {
            if let Some(vi) = repo.virtual_info.as_mut() {
                vi.base_commit = base_commit.to_string();
                vi.path = path.to_string();
            }
        }
        Ok(())
    }

    async fn del_virtual_repo(&self, repo_id: &str) -> Result<()> {
        let mut state = self.state.lock();
        if let Some(repo) = state.repos.get_mut(repo_id) {
            let origin = repo.virtual_info.take().map(|v| v.origin_repo);
            if let Some(origin) = origin {
                if let Some(list) = state.virtual_by_origin.get_mut(&origin) {
                    list.retain(|id| id != repo_id);
                }
            }
        }
        Ok(())
    }

    async fn rename_repo(&self, repo_id: &str, new_name: &str) -> Result<()> {
        let mut state = self.state.lock();
        if let Some(repo) = state.repos.get_mut(repo_id) {
            repo.info.name = new_name.to_string();
        }
        Ok(())
    }

    async fn get_branch(&self, repo_id: &str, name: &str) -> Result<Option<Branch>> {
        Ok(self
            .state
            .lock()
            .branches
            .get(&(repo_id.to_string(), name.to_string()))
            .cloned())
    }

    async fn cas_branch(
        &self,
        repo_id: &str,
        name: &str,
        old_commit_id: &str,
        new_commit_id: &str,
    ) -> Result<bool> {
        let mut state = self.state.lock();
        let key = (repo_id.to_string(), name.to_string());
        match state.branches.get_mut(&key) {
            Some(branch) if branch.commit_id == old_commit_id => {
                branch.commit_id = new_commit_id.to_string();
                if let Some(repo) = state.repos.get_mut(repo_id) {
                    repo.head_commit_id = Some(new_commit_id.to_string());
                }
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(ThicketError::not_found(format!("branch {repo_id}/{name}"))),
        }
    }

    async fn get_repo_size(&self, repo_id: &str) -> Result<RepoSize> {
        Ok(self.state.lock().sizes.get(repo_id).cloned().unwrap_or_default())
    }

    async fn set_repo_size(&self, repo_id: &str, size: RepoSize) -> Result<()> {
        self.state.lock().sizes.insert(repo_id.to_string(), size);
        Ok(())
    }

    async fn get_repo_file_count(&self, repo_id: &str) -> Result<RepoFileCount> {
        Ok(self
            .state
            .lock()
            .file_counts
            .get(repo_id)
            .copied()
            .unwrap_or_default())
    }

    async fn set_repo_file_count(&self, repo_id: &str, count: RepoFileCount) -> Result<()> {
        self.state.lock().file_counts.insert(repo_id.to_string(), count);
        Ok(())
    }

    async fn get_upload_tmp_file(&self, repo_id: &str, abs_path: &str) -> Result<Option<PathBuf>> {
        Ok(self
            .state
            .lock()
            .upload_tmp
            .get(&(repo_id.to_string(), abs_path.to_string()))
            .cloned())
    }

    async fn add_upload_tmp_file(&self, repo_id: &str, abs_path: &str, tmp_path: &Path) -> Result<()> {
        self.state
            .lock()
            .upload_tmp
            .insert((repo_id.to_string(), abs_path.to_string()), tmp_path.to_path_buf());
        Ok(())
    }

    async fn del_upload_tmp_file(&self, repo_id: &str, abs_path: &str) -> Result<()> {
        self.state
            .lock()
            .upload_tmp
            .remove(&(repo_id.to_string(), abs_path.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::object::{sha1_hex, Dirent, MODE_FILE};

    #[tokio::test]
    async fn block_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path());
        let bytes = b"hello world".to_vec();
        let id = sha1_hex(&bytes);
        store.write("repo1", &id, &bytes).await.unwrap();
        assert!(store.exists("repo1", &id).await.unwrap());
        assert_eq!(store.read("repo1", &id).await.unwrap(), bytes);
        assert_eq!(store.stat("repo1", &id).await.unwrap(), bytes.len() as u64);
    }

    #[tokio::test]
    async fn dir_by_path_walks_nested_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path());

        let leaf = Directory::empty();
        let leaf_id = store.save_dir("repo1", &leaf).await.unwrap();

        let mid = Directory::new_sorted(vec![Dirent {
            name: "inner".into(),
            id: leaf_id.clone(),
            mode: crate::model::object::MODE_DIR,
            mtime: 0,
            size: 0,
            modifier: "u".into(),
        }]);
        let mid_id = store.save_dir("repo1", &mid).await.unwrap();

        let found = store
            .get_dir_by_path("repo1", &mid_id, "/inner")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.compute_id(), leaf_id);
        let _ = MODE_FILE;
    }
}
