//! Commit engine (C3): builds a commit, attempts the CAS branch advance,
//! and falls back to a three-way merge-and-retry loop on contention.

use super::merge::merge_trees;
use crate::constants::{
    COMMIT_RETRY_BACKOFF_MAX_MS, COMMIT_RETRY_BACKOFF_MIN_MS, MASTER_BRANCH, MAX_COMMIT_RETRIES,
};
use crate::error::{Result, ThicketError};
use crate::model::{Commit, EncryptionInfo};
use crate::store::{CommitStore, FsStore, RepoRegistry};
use rand::Rng;

/// Everything about the repo/commit that doesn't change across retries:
/// identity, encryption metadata, and the author/description of the
/// commit being proposed.
pub struct CommitRequest<'a> {
    pub repo_id: &'a str,
    pub store_id: &'a str,
    pub creator_id: &'a str,
    pub creator_name: &'a str,
    pub desc: &'a str,
    pub repo_name: &'a str,
    pub repo_desc: &'a str,
    pub encryption: EncryptionInfo,
}

/// Create a new commit on top of `base_commit_id` whose tree is
/// `new_root`, retrying through a three-way merge when a concurrent
/// writer has already advanced the branch. Returns the id of whichever
/// commit (`C_new` or a merge commit) ends up as the new head.
pub async fn gen_new_commit(
    registry: &dyn RepoRegistry,
    fs: &dyn FsStore,
    commits: &dyn CommitStore,
    req: CommitRequest<'_>,
    base_commit_id: &str,
    new_root: &str,
    now: i64,
) -> Result<String> {
    let base_commit = commits
        .load(req.store_id, base_commit_id)
        .await?
        .ok_or_else(|| ThicketError::not_found(format!("commit {base_commit_id}")))?;

    let new_commit = Commit {
        commit_id: Commit::compute_id(new_root, req.creator_id, req.creator_name, req.desc, now),
        repo_id: req.repo_id.to_string(),
        root_id: new_root.to_string(),
        parent_id: Some(base_commit_id.to_string()),
        second_parent_id: None,
        creator_id: req.creator_id.to_string(),
        creator_name: req.creator_name.to_string(),
        desc: req.desc.to_string(),
        ctime: now,
        repo_name: req.repo_name.to_string(),
        repo_desc: req.repo_desc.to_string(),
        encryption: req.encryption.clone(),
        new_merge: false,
        conflict: false,
    };
    commits.save(req.store_id, &new_commit).await?;

    for attempt in 0..=MAX_COMMIT_RETRIES {
        let head = registry
            .get_branch(req.repo_id, MASTER_BRANCH)
            .await?
            .ok_or_else(|| ThicketError::internal(format!("no master branch for {}", req.repo_id)))?;

        if head.commit_id == base_commit_id {
            if registry
                .cas_branch(req.repo_id, MASTER_BRANCH, &head.commit_id, &new_commit.commit_id)
                .await?
            {
                return Ok(new_commit.commit_id);
            }
            // Someone else advanced the branch between the read above and
            // the CAS; fall through to the merge path on the next loop
            // iteration using the now-stale `head` we just observed.
        } else {
            let head_commit = commits
                .load(req.store_id, &head.commit_id)
                .await?
                .ok_or_else(|| ThicketError::not_found(format!("commit {}", head.commit_id)))?;

            let merged = merge_trees(
                fs,
                req.store_id,
                Some(&base_commit.root_id),
                &head_commit.root_id,
                new_root,
                now,
            )
            .await?;

            let desc = if merged.conflict_paths.is_empty() {
                "Auto merge by system".to_string()
            } else {
                format!(
                    "Auto merge by system (conflicts: {})",
                    merged.conflict_paths.join(", ")
                )
            };

            let merge_commit = Commit {
                commit_id: Commit::compute_id(
                    &merged.root_id,
                    req.creator_id,
                    req.creator_name,
                    &desc,
                    now,
                ),
                repo_id: req.repo_id.to_string(),
                root_id: merged.root_id,
                parent_id: Some(head.commit_id.clone()),
                second_parent_id: Some(new_commit.commit_id.clone()),
                creator_id: req.creator_id.to_string(),
                creator_name: req.creator_name.to_string(),
                desc,
                ctime: now,
                repo_name: req.repo_name.to_string(),
                repo_desc: req.repo_desc.to_string(),
                encryption: req.encryption.clone(),
                new_merge: true,
                conflict: merged.conflict,
            };
            commits.save(req.store_id, &merge_commit).await?;

            if registry
                .cas_branch(req.repo_id, MASTER_BRANCH, &head.commit_id, &merge_commit.commit_id)
                .await?
            {
                return Ok(merge_commit.commit_id);
            }
        }

        if attempt < MAX_COMMIT_RETRIES {
            let backoff_ms = rand::thread_rng().gen_range(COMMIT_RETRY_BACKOFF_MIN_MS..=COMMIT_RETRY_BACKOFF_MAX_MS);
            tokio::time::sleep(std::time::Duration::from_millis(backoff_ms)).await;
        }
    }

    Err(ThicketError::Conflict(MAX_COMMIT_RETRIES))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Dirent, Directory, RepoInfo, RepoStatus};
    use crate::model::object::MODE_FILE;
    use crate::store::local::{LocalObjectStore, LocalRegistry};

    fn file_dirent(name: &str, id: &str) -> Dirent {
        Dirent {
            name: name.to_string(),
            id: id.to_string(),
            mode: MODE_FILE,
            mtime: 0,
            size: 0,
            modifier: "u".into(),
        }
    }

    fn base_request<'a>() -> CommitRequest<'a> {
        CommitRequest {
            repo_id: "repo1",
            store_id: "repo1",
            creator_id: "u1",
            creator_name: "User",
            desc: "test commit",
            repo_name: "repo",
            repo_desc: "",
            encryption: EncryptionInfo::default(),
        }
    }

    async fn seed(store: &LocalObjectStore, registry: &LocalRegistry) -> String {
        let root = Directory::empty();
        let root_id = store.save_dir("repo1", &root).await.unwrap();
        let commit = Commit {
            commit_id: Commit::compute_id(&root_id, "u0", "init", "Created", 0),
            repo_id: "repo1".into(),
            root_id: root_id.clone(),
            parent_id: None,
            second_parent_id: None,
            creator_id: "u0".into(),
            creator_name: "init".into(),
            desc: "Created".into(),
            ctime: 0,
            repo_name: "repo".into(),
            repo_desc: "".into(),
            encryption: EncryptionInfo::default(),
            new_merge: false,
            conflict: false,
        };
        store.save("repo1", &commit).await.unwrap();
        registry.create_repo("repo1", "repo", &root_id, &commit);
        let _ = RepoInfo {
            repo_id: "repo1".into(),
            name: "repo".into(),
            update_time: 0,
            version: 1,
            is_encrypted: false,
            last_modifier: "u0".into(),
            status: RepoStatus::Normal,
        };
        commit.commit_id
    }

    #[tokio::test]
    async fn fast_path_commit_advances_branch() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path());
        let registry = LocalRegistry::new();
        let base_commit_id = seed(&store, &registry).await;

        let base = registry.get_branch("repo1", MASTER_BRANCH).await.unwrap().unwrap();
        let base_commit = store.load("repo1", &base.commit_id).await.unwrap().unwrap();

        let (new_root, _) = super::super::tree::post_multi_files(
            &store,
            "repo1",
            &base_commit.root_id,
            "/",
            vec![file_dirent("a.txt", &"1".repeat(40))],
            false,
            10,
        )
        .await
        .unwrap();

        let new_commit_id = gen_new_commit(
            &registry,
            &store,
            &store,
            base_request(),
            &base_commit_id,
            &new_root,
            10,
        )
        .await
        .unwrap();

        let branch = registry.get_branch("repo1", MASTER_BRANCH).await.unwrap().unwrap();
        assert_eq!(branch.commit_id, new_commit_id);
    }

    #[tokio::test]
    async fn concurrent_writers_produce_a_merge_commit() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path());
        let registry = LocalRegistry::new();
        let base_commit_id = seed(&store, &registry).await;
        let base_commit = store.load("repo1", &base_commit_id).await.unwrap().unwrap();

        let (root_a, _) = super::super::tree::post_multi_files(
            &store,
            "repo1",
            &base_commit.root_id,
            "/",
            vec![file_dirent("a.txt", &"1".repeat(40))],
            false,
            10,
        )
        .await
        .unwrap();
        let (root_b, _) = super::super::tree::post_multi_files(
            &store,
            "repo1",
            &base_commit.root_id,
            "/",
            vec![file_dirent("b.txt", &"2".repeat(40))],
            false,
            10,
        )
        .await
        .unwrap();

        let commit_a = gen_new_commit(
            &registry,
            &store,
            &store,
            base_request(),
            &base_commit_id,
            &root_a,
            10,
        )
        .await
        .unwrap();

        let commit_b = gen_new_commit(
            &registry,
            &store,
            &store,
            base_request(),
            &base_commit_id,
            &root_b,
            11,
        )
        .await
        .unwrap();

        assert_ne!(commit_a, commit_b);
        let branch = registry.get_branch("repo1", MASTER_BRANCH).await.unwrap().unwrap();
        assert_eq!(branch.commit_id, commit_b);

        let final_commit = store.load("repo1", &commit_b).await.unwrap().unwrap();
        assert!(final_commit.new_merge);
        let final_root = store.get_dir("repo1", &final_commit.root_id).await.unwrap().unwrap();
        assert!(final_root.find("a.txt").is_some());
        assert!(final_root.find("b.txt").is_some());
    }
}
