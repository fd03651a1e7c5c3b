//! Virtual-repo synchronizer (C4): keeps a virtual library's root in sync
//! with its origin's sub-path, bidirectionally, and heals the mount when
//! the path is renamed or removed upstream.

use super::commit_engine::{gen_new_commit, CommitRequest};
use super::merge::merge_trees;
use super::tree::put_file;
use crate::constants::MASTER_BRANCH;
use crate::error::{Result, ThicketError};
use crate::model::{Commit, DiffEntry, DiffStatus, Dirent, EncryptionInfo};
use crate::model::object::MODE_DIR;
use crate::store::{CommitStore, FsStore, RepoRegistry};
use std::path::{Path, PathBuf};

/// One round of C4 for a single virtual repo `repo_id`. Returns `true` if
/// any state changed (a sync happened, a heal happened, or the virtual
/// repo was tombstoned); `false` for the no-op case.
///
/// `diff_origin_head_vs_parent` supplies the diff engine's output for
/// `head_O.parent → head_O`, used only by the missing-path healing path;
/// callers that have no diff available (e.g. tests against an origin
/// with no prior commit) may pass an empty slice, in which case healing
/// degenerates straight to tombstoning.
pub async fn sync_virtual_repo(
    registry: &dyn RepoRegistry,
    fs: &dyn FsStore,
    commits: &dyn CommitStore,
    repo_id: &str,
    diff_origin_head_vs_parent: &[DiffEntry],
    now: i64,
) -> Result<bool> {
    let repo = registry.get(repo_id).await?;
    let virtual_info = repo
        .virtual_info
        .clone()
        .ok_or_else(|| ThicketError::bad_request(format!("{repo_id} is not a virtual repo")))?;

    let origin = registry.get(&virtual_info.origin_repo).await?;
    let origin_branch = registry
        .get_branch(&origin.id, MASTER_BRANCH)
        .await?
        .ok_or_else(|| ThicketError::internal(format!("no master branch for {}", origin.id)))?;
    let origin_head = commits
        .load(&origin.store_id, &origin_branch.commit_id)
        .await?
        .ok_or_else(|| ThicketError::not_found(format!("commit {}", origin_branch.commit_id)))?;

    let repo_branch = registry
        .get_branch(repo_id, MASTER_BRANCH)
        .await?
        .ok_or_else(|| ThicketError::internal(format!("no master branch for {repo_id}")))?;
    let repo_head = commits
        .load(&repo.store_id, &repo_branch.commit_id)
        .await?
        .ok_or_else(|| ThicketError::not_found(format!("commit {}", repo_branch.commit_id)))?;

    let base_commit = commits
        .load(&origin.store_id, &virtual_info.base_commit)
        .await?
        .ok_or_else(|| ThicketError::not_found(format!("commit {}", virtual_info.base_commit)))?;

    let root_at_path = fs
        .get_dir_id_by_path(&origin.store_id, &origin_head.root_id, &virtual_info.path)
        .await?;

    let Some(root_o_at_p) = root_at_path else {
        return heal_missing_path(
            registry,
            fs,
            commits,
            &repo,
            &origin,
            &virtual_info,
            &origin_head,
            diff_origin_head_vs_parent,
            now,
        )
        .await;
    };

    // Case (a): already in sync.
    if repo_head.root_id == root_o_at_p {
        return Ok(false);
    }

    let base_root_at_p = fs
        .get_dir_id_by_path(&origin.store_id, &base_commit.root_id, &virtual_info.path)
        .await?;

    // Case (b): only the origin changed.
    if base_root_at_p.as_deref() == Some(repo_head.root_id.as_str()) {
        let commit_id = gen_new_commit(
            registry,
            fs,
            commits,
            CommitRequest {
                repo_id: &repo.id,
                store_id: &repo.store_id,
                creator_id: &origin_head.creator_id,
                creator_name: &origin_head.creator_name,
                desc: "Sync with origin library",
                repo_name: &repo.info.name,
                repo_desc: &repo.info.name,
                encryption: EncryptionInfo::default(),
            },
            &repo_head.commit_id,
            &root_o_at_p,
            now,
        )
        .await?;
        registry
            .set_virtual_repo_base_commit_path(&repo.id, &origin_head.commit_id, &virtual_info.path)
            .await?;
        let _ = commit_id;
        return Ok(true);
    }

    // Case (c): only the virtual repo changed; splice it back into the origin.
    if base_root_at_p.as_deref() == Some(root_o_at_p.as_str()) {
        let dirent = Dirent {
            name: leaf_name(&virtual_info.path),
            id: repo_head.root_id.clone(),
            mode: MODE_DIR,
            mtime: now,
            size: 0,
            modifier: repo_head.creator_id.clone(),
        };
        let parent_path = parent_of(&virtual_info.path);
        let new_origin_root = put_file(fs, &origin.store_id, &origin_head.root_id, &parent_path, dirent, true, now)
            .await?;
        let new_origin_commit_id = gen_new_commit(
            registry,
            fs,
            commits,
            CommitRequest {
                repo_id: &origin.id,
                store_id: &origin.store_id,
                creator_id: &repo_head.creator_id,
                creator_name: &repo_head.creator_name,
                desc: &format!("Sync from virtual library \"{}\"", repo.info.name),
                repo_name: &origin.info.name,
                repo_desc: &origin.info.name,
                encryption: EncryptionInfo::default(),
            },
            &origin_head.commit_id,
            &new_origin_root,
            now,
        )
        .await?;
        registry
            .set_virtual_repo_base_commit_path(&repo.id, &new_origin_commit_id, &virtual_info.path)
            .await?;
        recurse_sibling_virtuals(registry, fs, commits, &origin.id, repo_id, now).await?;
        return Ok(true);
    }

    // Case (d): both sides diverged; three-way merge and write the result
    // into both the virtual repo (at its root) and the origin (at its
    // mount path).
    let base_root = fs
        .get_dir_id_by_path(&origin.store_id, &base_commit.root_id, &virtual_info.path)
        .await?;
    let merged = merge_trees(
        fs,
        &origin.store_id,
        base_root.as_deref(),
        &repo_head.root_id,
        &root_o_at_p,
        now,
    )
    .await?;

    let dirent = Dirent {
        name: leaf_name(&virtual_info.path),
        id: merged.root_id.clone(),
        mode: MODE_DIR,
        mtime: now,
        size: 0,
        modifier: repo_head.creator_id.clone(),
    };
    let parent_path = parent_of(&virtual_info.path);
    let new_origin_root = put_file(fs, &origin.store_id, &origin_head.root_id, &parent_path, dirent, true, now)
        .await?;
    let new_origin_commit_id = gen_new_commit(
        registry,
        fs,
        commits,
        CommitRequest {
            repo_id: &origin.id,
            store_id: &origin.store_id,
            creator_id: &repo_head.creator_id,
            creator_name: &repo_head.creator_name,
            desc: "Auto merge by system",
            repo_name: &origin.info.name,
            repo_desc: &origin.info.name,
            encryption: EncryptionInfo::default(),
        },
        &origin_head.commit_id,
        &new_origin_root,
        now,
    )
    .await?;

    gen_new_commit(
        registry,
        fs,
        commits,
        CommitRequest {
            repo_id: &repo.id,
            store_id: &repo.store_id,
            creator_id: &repo_head.creator_id,
            creator_name: &repo_head.creator_name,
            desc: "Auto merge by system",
            repo_name: &repo.info.name,
            repo_desc: &repo.info.name,
            encryption: EncryptionInfo::default(),
        },
        &repo_head.commit_id,
        &merged.root_id,
        now,
    )
    .await?;

    registry
        .set_virtual_repo_base_commit_path(&repo.id, &new_origin_commit_id, &virtual_info.path)
        .await?;
    recurse_sibling_virtuals(registry, fs, commits, &origin.id, repo_id, now).await?;
    Ok(true)
}

async fn recurse_sibling_virtuals(
    registry: &dyn RepoRegistry,
    fs: &dyn FsStore,
    commits: &dyn CommitStore,
    origin_repo_id: &str,
    just_synced: &str,
    now: i64,
) -> Result<()> {
    let siblings = registry.get_virtual_info_by_origin(origin_repo_id).await?;
    for sibling in siblings {
        if sibling.repo_id == just_synced {
            continue;
        }
        Box::pin(sync_virtual_repo(registry, fs, commits, &sibling.repo_id, &[], now)).await?;
    }
    Ok(())
}

/// Missing-path healing (§4.4/4.5): the mount path no longer resolves in
/// the origin's current root. Walk the diff emitted for
/// `head_O.parent → head_O`, looking for a `DIR_RENAMED` entry whose
/// source matches an ancestor of `path`; if found, the mount follows the
/// rename. Otherwise the virtual repo is tombstoned.
async fn heal_missing_path(
    registry: &dyn RepoRegistry,
    fs: &dyn FsStore,
    commits: &dyn CommitStore,
    repo: &crate::store::Repo,
    origin: &crate::store::Repo,
    virtual_info: &crate::model::VirtualRepo,
    origin_head: &Commit,
    diff: &[DiffEntry],
    now: i64,
) -> Result<bool> {
    let mut path = PathBuf::from(&virtual_info.path);
    let mut suffix = PathBuf::new();

    let Some(parent_id) = &origin_head.parent_id else {
        registry.del_virtual_repo(&repo.id).await?;
        return Ok(true);
    };

    loop {
        let old_dir_id = fs
            .get_dir_id_by_path(&origin.store_id, parent_id, &path_str(&path))
            .await?;

        if old_dir_id.is_some() {
            if let Some(renamed_to) = diff.iter().find_map(|entry| {
                if entry.status == DiffStatus::DirRenamed && dir_entry_matches(&path, entry) {
                    entry.renamed_to.clone()
                } else {
                    None
                }
            }) {
                let new_path = renamed_to.join(&suffix);
                let new_path_str = path_str(&new_path);
                let is_top_level = parent_of(&path_str(&path)) == "/";

                registry
                    .set_virtual_repo_base_commit_path(&repo.id, &origin_head.commit_id, &new_path_str)
                    .await?;

                if is_top_level {
                    let new_name = renamed_to
                        .file_name()
                        .map(|n| n.to_string_lossy().to_string())
                        .unwrap_or_else(|| virtual_info.path.clone());
                    registry.rename_repo(&repo.id, &new_name).await?;
                    let repo_branch = registry
                        .get_branch(&repo.id, MASTER_BRANCH)
                        .await?
                        .ok_or_else(|| ThicketError::internal("missing master branch"))?;
                    let repo_head_commit = commits
                        .load(&repo.store_id, &repo_branch.commit_id)
                        .await?
                        .ok_or_else(|| ThicketError::not_found(format!("commit {}", repo_branch.commit_id)))?;
                    gen_new_commit(
                        registry,
                        fs,
                        commits,
                        CommitRequest {
                            repo_id: &repo.id,
                            store_id: &repo.store_id,
                            creator_id: &origin_head.creator_id,
                            creator_name: &origin_head.creator_name,
                            desc: "Changed library name",
                            repo_name: &new_name,
                            repo_desc: &repo.info.name,
                            encryption: EncryptionInfo::default(),
                        },
                        &repo_branch.commit_id,
                        &repo_head_commit.root_id,
                        now,
                    )
                    .await?;
                }
                return Ok(true);
            }
        }

        let Some(parent) = path.parent().map(Path::to_path_buf) else {
            break;
        };
        if parent.as_os_str().is_empty() {
            break;
        }
        let Some(segment) = path.file_name() else {
            break;
        };
        suffix = PathBuf::from(segment).join(&suffix);
        path = parent;
    }

    registry.del_virtual_repo(&repo.id).await?;
    Ok(true)
}

/// Does `entry` describe the rename of the ancestor currently at `path`?
/// The diff engine identifies renamed directories by path, not id, so the
/// walked path (normalized the same way `path_str` does) must match
/// `entry.path` exactly — matching on `entry.is_dir` alone would pick
/// whichever `DIR_RENAMED` entry happens to come first in the diff.
fn dir_entry_matches(path: &Path, entry: &DiffEntry) -> bool {
    entry.is_dir && path_str(&entry.path) == path_str(path)
}

fn leaf_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

fn parent_of(path: &str) -> String {
    match Path::new(path).parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_string_lossy().to_string(),
        _ => "/".to_string(),
    }
}

fn path_str(path: &Path) -> String {
    let s = path.to_string_lossy().to_string();
    if s.starts_with('/') {
        s
    } else {
        format!("/{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::object::MODE_FILE;
    use crate::model::Directory;
    use crate::store::local::{LocalObjectStore, LocalRegistry};

    fn dirent(name: &str, id: &str, mode: u32) -> Dirent {
        Dirent {
            name: name.to_string(),
            id: id.to_string(),
            mode,
            mtime: 0,
            size: 0,
            modifier: "u".into(),
        }
    }

    async fn make_commit(
        store: &LocalObjectStore,
        repo_id: &str,
        root_id: &str,
        parent: Option<String>,
        desc: &str,
        ctime: i64,
    ) -> Commit {
        let commit = Commit {
            commit_id: Commit::compute_id(root_id, "u0", "User", desc, ctime),
            repo_id: repo_id.to_string(),
            root_id: root_id.to_string(),
            parent_id: parent,
            second_parent_id: None,
            creator_id: "u0".into(),
            creator_name: "User".into(),
            desc: desc.to_string(),
            ctime,
            repo_name: repo_id.to_string(),
            repo_desc: "".into(),
            encryption: EncryptionInfo::default(),
            new_merge: false,
            conflict: false,
        };
        store.save(repo_id, &commit).await.unwrap();
        commit
    }

    #[tokio::test]
    async fn case_a_no_op_when_already_in_sync() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path());
        let registry = LocalRegistry::new();

        let sub = Directory::new_sorted(vec![dirent("f.txt", &"1".repeat(40), MODE_FILE)]);
        let sub_id = store.save_dir("origin", &sub).await.unwrap();
        let origin_root = Directory::new_sorted(vec![dirent("src", &sub_id, MODE_DIR)]);
        let origin_root_id = store.save_dir("origin", &origin_root).await.unwrap();
        let origin_commit = make_commit(&store, "origin", &origin_root_id, None, "Created", 0).await;
        registry.create_repo("origin", "origin", &origin_root_id, &origin_commit);

        let virt_commit = make_commit(&store, "origin", &sub_id, None, "Created", 0).await;
        registry.create_virtual_repo("virt", "src", "origin", "/src", &virt_commit);

        let changed = sync_virtual_repo(&registry, &store, &store, "virt", &[], 100)
            .await
            .unwrap();
        assert!(!changed);
    }

    #[tokio::test]
    async fn case_b_origin_changed_pulls_into_virtual() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path());
        let registry = LocalRegistry::new();

        let sub = Directory::new_sorted(vec![dirent("f.txt", &"1".repeat(40), MODE_FILE)]);
        let sub_id = store.save_dir("origin", &sub).await.unwrap();
        let origin_root = Directory::new_sorted(vec![dirent("src", &sub_id, MODE_DIR)]);
        let origin_root_id = store.save_dir("origin", &origin_root).await.unwrap();
        let base_commit = make_commit(&store, "origin", &origin_root_id, None, "Created", 0).await;
        registry.create_repo("origin", "origin", &origin_root_id, &base_commit);

        registry.create_virtual_repo("virt", "src", "origin", "/src", &base_commit);
        let virt_head = make_commit(&store, "origin", &sub_id, None, "Created", 0).await;
        registry.set_head("virt", &virt_head.commit_id);

        // Origin changes /src/f.txt.
        let sub2 = Directory::new_sorted(vec![dirent("f.txt", &"2".repeat(40), MODE_FILE)]);
        let sub2_id = store.save_dir("origin", &sub2).await.unwrap();
        let origin_root2 = Directory::new_sorted(vec![dirent("src", &sub2_id, MODE_DIR)]);
        let origin_root2_id = store.save_dir("origin", &origin_root2).await.unwrap();
        let origin_head2 = make_commit(
            &store,
            "origin",
            &origin_root2_id,
            Some(base_commit.commit_id.clone()),
            "Edited f.txt",
            10,
        )
        .await;
        registry.set_head("origin", &origin_head2.commit_id);

        let changed = sync_virtual_repo(&registry, &store, &store, "virt", &[], 20)
            .await
            .unwrap();
        assert!(changed);

        let branch = registry.get_branch("virt", MASTER_BRANCH).await.unwrap().unwrap();
        let commit = store.load("origin", &branch.commit_id).await.unwrap().unwrap();
        assert_eq!(commit.root_id, sub2_id);
    }

    #[tokio::test]
    async fn case_c_virtual_changed_splices_into_origin() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path());
        let registry = LocalRegistry::new();

        let sub = Directory::new_sorted(vec![dirent("f.txt", &"1".repeat(40), MODE_FILE)]);
        let sub_id = store.save_dir("origin", &sub).await.unwrap();
        let origin_root = Directory::new_sorted(vec![dirent("src", &sub_id, MODE_DIR)]);
        let origin_root_id = store.save_dir("origin", &origin_root).await.unwrap();
        let base_commit = make_commit(&store, "origin", &origin_root_id, None, "Created", 0).await;
        registry.create_repo("origin", "origin", &origin_root_id, &base_commit);
        registry.create_virtual_repo("virt", "src", "origin", "/src", &base_commit);

        // Virtual repo changes /src/f.txt; origin stays at the base commit.
        let sub2 = Directory::new_sorted(vec![dirent("f.txt", &"2".repeat(40), MODE_FILE)]);
        let sub2_id = store.save_dir("origin", &sub2).await.unwrap();
        let virt_head = make_commit(&store, "origin", &sub2_id, None, "Edited f.txt", 10).await;
        registry.set_head("virt", &virt_head.commit_id);

        let changed = sync_virtual_repo(&registry, &store, &store, "virt", &[], 20)
            .await
            .unwrap();
        assert!(changed);

        let origin_branch = registry.get_branch("origin", MASTER_BRANCH).await.unwrap().unwrap();
        let origin_commit = store.load("origin", &origin_branch.commit_id).await.unwrap().unwrap();
        let new_src_id = store
            .get_dir_id_by_path("origin", &origin_commit.root_id, "/src")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(new_src_id, sub2_id);
    }

    #[tokio::test]
    async fn case_d_both_diverged_merges_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path());
        let registry = LocalRegistry::new();

        let sub = Directory::new_sorted(vec![
            dirent("f.txt", &"1".repeat(40), MODE_FILE),
            dirent("g.txt", &"2".repeat(40), MODE_FILE),
        ]);
        let sub_id = store.save_dir("origin", &sub).await.unwrap();
        let origin_root = Directory::new_sorted(vec![dirent("src", &sub_id, MODE_DIR)]);
        let origin_root_id = store.save_dir("origin", &origin_root).await.unwrap();
        let base_commit = make_commit(&store, "origin", &origin_root_id, None, "Created", 0).await;
        registry.create_repo("origin", "origin", &origin_root_id, &base_commit);
        registry.create_virtual_repo("virt", "src", "origin", "/src", &base_commit);

        // Virtual repo changes f.txt.
        let sub_virt = Directory::new_sorted(vec![
            dirent("f.txt", &"3".repeat(40), MODE_FILE),
            dirent("g.txt", &"2".repeat(40), MODE_FILE),
        ]);
        let sub_virt_id = store.save_dir("origin", &sub_virt).await.unwrap();
        let virt_head = make_commit(&store, "origin", &sub_virt_id, None, "Edited f.txt", 10).await;
        registry.set_head("virt", &virt_head.commit_id);

        // Origin independently changes g.txt.
        let sub_origin = Directory::new_sorted(vec![
            dirent("f.txt", &"1".repeat(40), MODE_FILE),
            dirent("g.txt", &"4".repeat(40), MODE_FILE),
        ]);
        let sub_origin_id = store.save_dir("origin", &sub_origin).await.unwrap();
        let origin_root2 = Directory::new_sorted(vec![dirent("src", &sub_origin_id, MODE_DIR)]);
        let origin_root2_id = store.save_dir("origin", &origin_root2).await.unwrap();
        let origin_head2 = make_commit(
            &store,
            "origin",
            &origin_root2_id,
            Some(base_commit.commit_id.clone()),
            "Edited g.txt",
            10,
        )
        .await;
        registry.set_head("origin", &origin_head2.commit_id);

        let changed = sync_virtual_repo(&registry, &store, &store, "virt", &[], 20)
            .await
            .unwrap();
        assert!(changed);

        let origin_branch = registry.get_branch("origin", MASTER_BRANCH).await.unwrap().unwrap();
        let origin_commit = store.load("origin", &origin_branch.commit_id).await.unwrap().unwrap();
        let merged_src = store
            .get_dir("origin", &store.get_dir_id_by_path("origin", &origin_commit.root_id, "/src").await.unwrap().unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(merged_src.find("f.txt").unwrap().id, "3".repeat(40));
        assert_eq!(merged_src.find("g.txt").unwrap().id, "4".repeat(40));

        let virt_branch = registry.get_branch("virt", MASTER_BRANCH).await.unwrap().unwrap();
        let virt_commit = store.load("origin", &virt_branch.commit_id).await.unwrap().unwrap();
        let merged_virt = store.get_dir("origin", &virt_commit.root_id).await.unwrap().unwrap();
        assert_eq!(merged_virt.find("f.txt").unwrap().id, "3".repeat(40));
        assert_eq!(merged_virt.find("g.txt").unwrap().id, "4".repeat(40));
    }

    #[tokio::test]
    async fn heal_follows_the_rename_matching_the_mount_path() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path());
        let registry = LocalRegistry::new();

        let sub = Directory::new_sorted(vec![dirent("f.txt", &"1".repeat(40), MODE_FILE)]);
        let sub_id = store.save_dir("origin", &sub).await.unwrap();
        let unrelated = Directory::new_sorted(vec![]);
        let unrelated_id = store.save_dir("origin", &unrelated).await.unwrap();

        let origin_root = Directory::new_sorted(vec![
            dirent("old", &sub_id, MODE_DIR),
            dirent("keep", &unrelated_id, MODE_DIR),
        ]);
        let origin_root_id = store.save_dir("origin", &origin_root).await.unwrap();
        let base_commit = make_commit(&store, "origin", &origin_root_id, None, "Created", 0).await;
        registry.create_repo("origin", "origin", &origin_root_id, &base_commit);
        registry.create_virtual_repo("virt", "old", "origin", "/old", &base_commit);

        // Origin renames both "/old" -> "/new" and "/keep" -> "/kept".
        let origin_root2 = Directory::new_sorted(vec![
            dirent("new", &sub_id, MODE_DIR),
            dirent("kept", &unrelated_id, MODE_DIR),
        ]);
        let origin_root2_id = store.save_dir("origin", &origin_root2).await.unwrap();
        let origin_head2 = make_commit(
            &store,
            "origin",
            &origin_root2_id,
            Some(base_commit.commit_id.clone()),
            "Renamed directories",
            10,
        )
        .await;
        registry.set_head("origin", &origin_head2.commit_id);

        // The unrelated rename sorts first in the diff, so a healer that
        // matches on `is_dir` alone (ignoring path) would follow it
        // instead of the rename that actually applies to this mount.
        let diff = vec![
            DiffEntry {
                status: DiffStatus::DirRenamed,
                path: PathBuf::from("/keep"),
                renamed_to: Some(PathBuf::from("/kept")),
                origin_size: 0,
                size: 0,
                is_dir: true,
            },
            DiffEntry {
                status: DiffStatus::DirRenamed,
                path: PathBuf::from("/old"),
                renamed_to: Some(PathBuf::from("/new")),
                origin_size: 0,
                size: 0,
                is_dir: true,
            },
        ];

        let changed = sync_virtual_repo(&registry, &store, &store, "virt", &diff, 20)
            .await
            .unwrap();
        assert!(changed);

        let repo = registry.get("virt").await.unwrap();
        assert_eq!(repo.virtual_info.unwrap().path, "/new");
    }

    #[tokio::test]
    async fn heal_tombstones_when_no_rename_matches() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path());
        let registry = LocalRegistry::new();

        let sub = Directory::new_sorted(vec![dirent("f.txt", &"1".repeat(40), MODE_FILE)]);
        let sub_id = store.save_dir("origin", &sub).await.unwrap();
        let origin_root = Directory::new_sorted(vec![dirent("old", &sub_id, MODE_DIR)]);
        let origin_root_id = store.save_dir("origin", &origin_root).await.unwrap();
        let base_commit = make_commit(&store, "origin", &origin_root_id, None, "Created", 0).await;
        registry.create_repo("origin", "origin", &origin_root_id, &base_commit);
        registry.create_virtual_repo("virt", "old", "origin", "/old", &base_commit);

        // Origin deletes "/old" outright; no DIR_RENAMED entry covers it.
        let origin_root2 = Directory::new_sorted(vec![]);
        let origin_root2_id = store.save_dir("origin", &origin_root2).await.unwrap();
        let origin_head2 = make_commit(
            &store,
            "origin",
            &origin_root2_id,
            Some(base_commit.commit_id.clone()),
            "Deleted /old",
            10,
        )
        .await;
        registry.set_head("origin", &origin_head2.commit_id);

        let diff = vec![DiffEntry {
            status: DiffStatus::Deleted,
            path: PathBuf::from("/old"),
            renamed_to: None,
            origin_size: 0,
            size: 0,
            is_dir: true,
        }];

        let changed = sync_virtual_repo(&registry, &store, &store, "virt", &diff, 20)
            .await
            .unwrap();
        assert!(changed);

        let repo = registry.get("virt").await.unwrap();
        assert!(repo.virtual_info.is_none());
    }
}
