//! The four content/version-control subsystems (C1 lives in [`crate::model`]):
//! tree mutation, the commit engine, tree merging, the virtual-repo
//! synchronizer, and the background size worker.

pub mod commit_engine;
pub mod merge;
pub mod size_worker;
pub mod tree;
pub mod virtual_repo;

pub use commit_engine::{gen_new_commit, CommitRequest};
pub use merge::{merge_trees, MergeResult};
pub use size_worker::{spawn as spawn_size_worker, SizeJob, SizeWorkerHandle};
pub use tree::{post_multi_files, put_file, unique_name, validate_name};
pub use virtual_repo::sync_virtual_repo;
