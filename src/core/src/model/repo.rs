//! Mutable relational state: branches, repo metadata, size caches, and
//! virtual-repo anchors (spec.md §3 "Mutable state").

use serde::{Deserialize, Serialize};

/// A named pointer to a commit. `"master"` is the only branch this core
/// reads or writes (see [`crate::constants::MASTER_BRANCH`]).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Branch {
    pub repo_id: String,
    pub name: String,
    pub commit_id: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RepoStatus {
    Normal,
    ReadOnly,
    Deleted,
}

/// Repository metadata row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RepoInfo {
    pub repo_id: String,
    pub name: String,
    pub update_time: i64,
    pub version: u32,
    pub is_encrypted: bool,
    pub last_modifier: String,
    pub status: RepoStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct RepoSize {
    pub size: u64,
    /// The commit these numbers were last computed against, if any.
    pub head_id: Option<HeadId>,
}

/// Newtype so `RepoSize.head_id == None` and "never computed" aren't
/// confused with the empty-string commit id.
pub type HeadId = String;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct RepoFileCount {
    pub file_count: u64,
}

/// A virtual library's current anchor in its origin (spec.md §3 invariant
/// 5: `base_commit` is an ancestor of the origin's head that contains
/// `path` with directory id equal to this repo's base root).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VirtualRepo {
    pub repo_id: String,
    pub origin_repo: String,
    pub path: String,
    pub base_commit: String,
}

/// Decrypt key material for an encrypted repository, as returned by the
/// key oracle (hex-encoded in transit, raw bytes once decoded).
#[derive(Debug, Clone)]
pub struct DecryptKey {
    pub key: Vec<u8>,
    pub iv: Vec<u8>,
}
