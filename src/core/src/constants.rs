//! Constants used throughout thicket-core.
//!

/// Crate version, re-exported for server banners.
pub const THICKET_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Fixed block size used by the chunking pipeline (C5).
pub const BLOCK_SIZE: u64 = 1024 * 1024;

/// The only branch this core reads or writes.
pub const MASTER_BRANCH: &str = "master";

/// 40 zero characters: the placeholder id used for empty-content entries,
/// e.g. directory dirents created during intermediate-path materialization.
pub const ZERO_OBJECT_ID: &str = "0000000000000000000000000000000000000000";

/// Maximum filename length (bytes), matching the upload validation rule.
pub const MAX_FILE_NAME_LEN: usize = 256;

/// Upper bound on disambiguation attempts for the unique-name rule.
pub const MAX_UNIQUE_NAME_ATTEMPTS: u32 = 100;

/// Branch CAS retry bound.
pub const MAX_COMMIT_RETRIES: u32 = 3;

/// Backoff bounds (milliseconds) for CAS retries.
pub const COMMIT_RETRY_BACKOFF_MIN_MS: u64 = 100;
pub const COMMIT_RETRY_BACKOFF_MAX_MS: u64 = 1000;

/// Bound on the background size-recomputation job queue.
pub const SIZE_QUEUE_CAPACITY: usize = 10;

/// Directory name under `abs_data_dir` for resumable-upload temp files.
pub const HTTP_TEMP_DIR: &str = "httptemp";
/// Subdirectory shared across a cluster for resumable-upload temp files.
pub const CLUSTER_SHARED_TEMP_DIR: &str = "cluster-shared";

/// Default fallback charset for text content types (configurable per (d)
/// in the design notes; this is only the default, not a hardcoded value).
pub const DEFAULT_TEXT_CHARSET: &str = "utf-8";

pub const STATUS_SUCCESS: &str = "success";
pub const STATUS_ERROR: &str = "error";

pub const MSG_RESOURCE_CREATED: &str = "resource_created";
