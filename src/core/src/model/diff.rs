//! Diff entries as emitted by the (externally supplied) diff engine —
//! spec.md §1 lists the diff engine as an external collaborator assumed
//! to emit these four entry kinds.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiffStatus {
    Added,
    Deleted,
    Modified,
    DirRenamed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffEntry {
    pub status: DiffStatus,
    pub path: PathBuf,
    /// For `DirRenamed`, the new name/path this entry's `path` became.
    pub renamed_to: Option<PathBuf>,
    /// Size at the "old" side of the diff, used for MODIFIED delta math
    /// (`±size ± origin_size` in the background size worker, C7).
    pub origin_size: u64,
    /// Size at the "new" side of the diff.
    pub size: u64,
    pub is_dir: bool,
}
