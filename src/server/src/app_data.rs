//! Process-wide application state: handles to the storage/RPC
//! collaborators, the size-worker queue, and static configuration.

use std::path::PathBuf;
use std::sync::Arc;
use thicket::core::SizeWorkerHandle;
use thicket::store::{BlockStore, CommitStore, FsStore, RepoRegistry};
use thicket::rpc::{EventBus, KeyOracle, QuotaOracle, TokenOracle};

#[derive(Clone)]
pub struct AppData {
    pub blocks: Arc<dyn BlockStore>,
    pub fs: Arc<dyn FsStore>,
    pub commits: Arc<dyn CommitStore>,
    pub registry: Arc<dyn RepoRegistry>,

    pub tokens: Arc<dyn TokenOracle>,
    pub keys: Arc<dyn KeyOracle>,
    pub quota: Arc<dyn QuotaOracle>,
    pub events: Arc<dyn EventBus>,

    pub size_worker: SizeWorkerHandle,

    pub config: ServerConfig,
}

/// Static configuration (spec.md §6 "Configuration").
#[derive(Clone)]
pub struct ServerConfig {
    /// Root for resumable-upload temp files (`httptemp/`,
    /// `httptemp/cluster-shared/` live under here).
    pub abs_data_dir: PathBuf,
    /// Absent means unlimited.
    pub max_upload_size: Option<u64>,
    /// Fallback charset for `text/*` content types; configurable per
    /// design note (d) rather than hardcoded.
    pub text_charset: String,
    /// Affects whether virtual-repo teardown on a missing mount happens
    /// eagerly.
    pub cloud_mode: bool,
}
