//! Three-way tree merge, shared by the commit engine (C3, merging a
//! losing commit's new root against the concurrent winner) and the
//! virtual-repo synchronizer (C4 case d, merging divergent origin/virtual
//! subtrees).
//!
//! Because object ids are content hashes, two subtrees with the same id
//! are structurally identical — so "unchanged since base" is just an id
//! comparison, no recursive diff needed. Only genuine three-way
//! divergence recurses into directory contents.

use crate::error::Result;
use crate::model::{Dirent, Directory};
use crate::store::FsStore;
use std::future::Future;
use std::pin::Pin;

pub struct MergeResult {
    pub root_id: String,
    pub conflict: bool,
    /// Paths (relative to the merge root) where both sides diverged from
    /// base without a clean resolution. Empty for a trivial merge; used
    /// to derive the merge commit's description.
    pub conflict_paths: Vec<String>,
}

type BoxFut<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Merge `ours` and `theirs` against their common `base`, recursing into
/// directories that genuinely diverged on both sides. File-level (or
/// file/dir type) divergence has no byte-level merge available here:
/// `ours` wins and the result is flagged `conflict = true`, mirroring the
/// commit engine's `conflict` bit on the resulting merge commit.
pub fn merge_trees<'a>(
    fs: &'a dyn FsStore,
    store_id: &'a str,
    base_id: Option<&'a str>,
    ours_id: &'a str,
    theirs_id: &'a str,
    now: i64,
) -> BoxFut<'a, MergeResult> {
    merge_trees_at(fs, store_id, base_id, ours_id, theirs_id, now, String::new())
}

fn merge_trees_at<'a>(
    fs: &'a dyn FsStore,
    store_id: &'a str,
    base_id: Option<&'a str>,
    ours_id: &'a str,
    theirs_id: &'a str,
    now: i64,
    prefix: String,
) -> BoxFut<'a, MergeResult> {
    Box::pin(async move {
        if ours_id == theirs_id {
            return Ok(MergeResult {
                root_id: ours_id.to_string(),
                conflict: false,
                conflict_paths: Vec::new(),
            });
        }
        if let Some(base_id) = base_id {
            if base_id == ours_id {
                return Ok(MergeResult {
                    root_id: theirs_id.to_string(),
                    conflict: false,
                    conflict_paths: Vec::new(),
                });
            }
            if base_id == theirs_id {
                return Ok(MergeResult {
                    root_id: ours_id.to_string(),
                    conflict: false,
                    conflict_paths: Vec::new(),
                });
            }
        }

        let base_dir = match base_id {
            Some(id) => fs.get_dir(store_id, id).await?.unwrap_or_else(Directory::empty),
            None => Directory::empty(),
        };
        let ours_dir = fs
            .get_dir(store_id, ours_id)
            .await?
            .unwrap_or_else(Directory::empty);
        let theirs_dir = fs
            .get_dir(store_id, theirs_id)
            .await?
            .unwrap_or_else(Directory::empty);

        let mut names: Vec<&str> = Vec::new();
        for dir in [&base_dir, &ours_dir, &theirs_dir] {
            for entry in &dir.entries {
                if !names.contains(&entry.name.as_str()) {
                    names.push(entry.name.as_str());
                }
            }
        }

        let mut conflict = false;
        let mut conflict_paths = Vec::new();
        let mut entries: Vec<Dirent> = Vec::new();

        for name in names {
            let b = base_dir.find(name);
            let o = ours_dir.find(name);
            let t = theirs_dir.find(name);
            let child_path = format!("{prefix}/{name}");

            if same(o, t) {
                if let Some(entry) = o {
                    entries.push(entry.clone());
                }
                continue;
            }
            if same(o, b) {
                if let Some(entry) = t {
                    entries.push(entry.clone());
                }
                continue;
            }
            if same(t, b) {
                if let Some(entry) = o {
                    entries.push(entry.clone());
                }
                continue;
            }

            match (o, t) {
                (Some(o_entry), Some(t_entry)) if o_entry.is_dir() && t_entry.is_dir() => {
                    let sub_base = b.filter(|e| e.is_dir()).map(|e| e.id.as_str());
                    let sub = merge_trees_at(
                        fs,
                        store_id,
                        sub_base,
                        &o_entry.id,
                        &t_entry.id,
                        now,
                        child_path,
                    )
                    .await?;
                    conflict |= sub.conflict;
                    conflict_paths.extend(sub.conflict_paths);
                    let mut merged = o_entry.clone();
                    merged.id = sub.root_id;
                    merged.mtime = now;
                    entries.push(merged);
                }
                (Some(o_entry), _) => {
                    conflict = true;
                    conflict_paths.push(child_path);
                    entries.push(o_entry.clone());
                }
                (None, Some(t_entry)) => {
                    conflict = true;
                    conflict_paths.push(child_path);
                    entries.push(t_entry.clone());
                }
                (None, None) => {}
            }
        }

        let merged_dir = Directory::new_sorted(entries);
        let merged_id = fs.save_dir(store_id, &merged_dir).await?;
        Ok(MergeResult {
            root_id: merged_id,
            conflict,
            conflict_paths,
        })
    })
}

fn same(a: Option<&Dirent>, b: Option<&Dirent>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => a.id == b.id,
        _ => false,
    }
}
