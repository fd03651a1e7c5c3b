//! Background size worker (C7): a bounded job queue feeding a small pool
//! of workers that recompute `(size, file_count)` for a repo, either
//! incrementally (diffing against the previously recorded head) or by a
//! full tree walk when there's no prior head to diff against.

use crate::constants::SIZE_QUEUE_CAPACITY;
use crate::error::Result;
use crate::model::{DiffEntry, DiffStatus, RepoFileCount, RepoSize};
use crate::store::{CommitStore, FsStore, RepoRegistry};
use log::warn;
use std::sync::Arc;
use tokio::sync::mpsc;

/// One unit of work: recompute size/file_count for `repo_id` against its
/// current head. `diff` is the externally-supplied diff between the
/// previously recorded head and the current one; empty forces a full
/// tree walk.
pub struct SizeJob {
    pub repo_id: String,
    pub diff: Vec<DiffEntry>,
}

/// A handle to the running worker pool's job queue. Cloning shares the
/// same bounded channel; `enqueue` never blocks the HTTP handler thread
/// for long since the queue is drained continuously, but will apply
/// backpressure once `SIZE_QUEUE_CAPACITY` jobs are in flight.
#[derive(Clone)]
pub struct SizeWorkerHandle {
    sender: mpsc::Sender<SizeJob>,
}

impl SizeWorkerHandle {
    pub async fn enqueue(&self, job: SizeJob) {
        if self.sender.send(job).await.is_err() {
            warn!("size worker queue closed, dropping job for a repo");
        }
    }
}

/// Spawn the worker pool. Returns a handle for enqueuing jobs; the worker
/// task runs until the handle (and every clone) is dropped.
pub fn spawn(
    registry: Arc<dyn RepoRegistry>,
    fs: Arc<dyn FsStore>,
    commits: Arc<dyn CommitStore>,
) -> SizeWorkerHandle {
    let (sender, mut receiver) = mpsc::channel::<SizeJob>(SIZE_QUEUE_CAPACITY);

    tokio::spawn(async move {
        while let Some(job) = receiver.recv().await {
            if let Err(err) = process_job(registry.as_ref(), fs.as_ref(), commits.as_ref(), job).await {
                warn!("size worker job failed: {err}");
            }
        }
    });

    SizeWorkerHandle { sender }
}

async fn process_job(
    registry: &dyn RepoRegistry,
    fs: &dyn FsStore,
    commits: &dyn CommitStore,
    job: SizeJob,
) -> Result<()> {
    let repo = registry.get(&job.repo_id).await?;
    let Some(head_commit_id) = repo.head_commit_id.clone() else {
        return Ok(());
    };

    let current_size = registry.get_repo_size(&job.repo_id).await?;
    if current_size.head_id.as_deref() == Some(head_commit_id.as_str()) {
        return Ok(());
    }

    let head = commits
        .load(&repo.store_id, &head_commit_id)
        .await?
        .ok_or_else(|| crate::error::ThicketError::not_found(format!("commit {head_commit_id}")))?;

    let (size, file_count) = match &current_size.head_id {
        Some(_) if !job.diff.is_empty() => {
            let current_count = registry.get_repo_file_count(&job.repo_id).await?;
            apply_diff(current_size.size, current_count.file_count, &job.diff)
        }
        _ => fs.file_count_info(&repo.store_id, &head.root_id, "/").await?,
    };

    registry
        .set_repo_size(
            &job.repo_id,
            RepoSize {
                size,
                head_id: Some(head_commit_id),
            },
        )
        .await?;
    registry
        .set_repo_file_count(&job.repo_id, RepoFileCount { file_count })
        .await?;
    Ok(())
}

fn apply_diff(current_size: u64, current_files: u64, diff: &[DiffEntry]) -> (u64, u64) {
    let mut size = current_size as i64;
    let mut files = current_files as i64;

    for entry in diff {
        if entry.is_dir {
            continue;
        }
        match entry.status {
            DiffStatus::Added => {
                size += entry.size as i64;
                files += 1;
            }
            DiffStatus::Deleted => {
                size -= entry.origin_size as i64;
                files -= 1;
            }
            DiffStatus::Modified => {
                size += entry.size as i64 - entry.origin_size as i64;
            }
            DiffStatus::DirRenamed => {}
        }
    }

    (size.max(0) as u64, files.max(0) as u64)
}
