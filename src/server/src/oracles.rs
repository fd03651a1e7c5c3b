//! Stand-in implementations of the RPC oracles (§6) this system treats as
//! external collaborators. A real deployment points `AppData` at whatever
//! service actually owns tokens/keys/quota/stats; these in-memory/no-op
//! versions exist so the binary runs standalone, the same way `main.rs`'s
//! `init_queue` falls back to an in-memory queue when Redis isn't
//! reachable.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use thicket::model::{AccessToken, DecryptKey};
use thicket::rpc::{EventBus, KeyOracle, QuotaOracle, TokenOracle};
use thicket::Result;

/// Tokens registered up front (e.g. by an admin CLI command, not modeled
/// here) and looked up on each request. Swap for an HTTP-backed oracle
/// once a real token-issuing service is available.
#[derive(Default)]
pub struct InMemoryTokenOracle {
    tokens: Mutex<HashMap<String, AccessToken>>,
}

impl InMemoryTokenOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, token: impl Into<String>, access: AccessToken) {
        self.tokens.lock().insert(token.into(), access);
    }
}

#[async_trait]
impl TokenOracle for InMemoryTokenOracle {
    async fn query_access_token(&self, token: &str) -> Result<Option<AccessToken>> {
        Ok(self.tokens.lock().get(token).cloned())
    }
}

/// Keyed by repo id; one fixed key/iv pair per encrypted repo, set up
/// out of band. A real deployment derives these per-user from a KMS.
#[derive(Default)]
pub struct InMemoryKeyOracle {
    keys: Mutex<HashMap<String, DecryptKey>>,
}

impl InMemoryKeyOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, repo_id: impl Into<String>, key: DecryptKey) {
        self.keys.lock().insert(repo_id.into(), key);
    }
}

#[async_trait]
impl KeyOracle for InMemoryKeyOracle {
    async fn get_decrypt_key(&self, repo_id: &str, user: &str) -> Result<DecryptKey> {
        self.keys.lock().get(repo_id).cloned().ok_or_else(|| {
            thicket::ThicketError::not_found(format!("no decrypt key for {repo_id} (user {user})"))
        })
    }
}

/// Always reports under quota. Fine for local/dev deployments; a
/// production one wires this to the account/billing service.
pub struct AlwaysUnderQuotaOracle;

#[async_trait]
impl QuotaOracle for AlwaysUnderQuotaOracle {
    async fn check_quota(&self, _repo_id: &str, _delta: i64) -> Result<bool> {
        Ok(false)
    }
}

/// Publishes events to the log rather than a real stats pipeline.
pub struct LoggingEventBus;

#[async_trait]
impl EventBus for LoggingEventBus {
    async fn publish(&self, channel: &str, payload: String) {
        log::info!("event[{channel}]: {payload}");
    }
}
