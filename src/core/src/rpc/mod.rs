//! External RPC collaborators (§6): the token oracle, the decrypt-key
//! oracle, the quota oracle, and the stats event bus. This core only
//! calls these traits; a real deployment wires them to whatever service
//! actually owns tokens/keys/quota/stats.

use crate::error::Result;
use crate::model::{AccessToken, DecryptKey, Operation, ResolvedAccess};
use async_trait::async_trait;

/// Resolves an opaque token to the `{repo-id, obj-id, op, username}`
/// record it was minted for.
#[async_trait]
pub trait TokenOracle: Send + Sync {
    async fn query_access_token(&self, token: &str) -> Result<Option<AccessToken>>;
}

/// Fetches the AES key/iv pair for an encrypted repo on behalf of `user`.
#[async_trait]
pub trait KeyOracle: Send + Sync {
    async fn get_decrypt_key(&self, repo_id: &str, user: &str) -> Result<DecryptKey>;
}

/// `check_quota`: returns `true` when `delta` additional bytes would put
/// `repo_id` over quota.
#[async_trait]
pub trait QuotaOracle: Send + Sync {
    async fn check_quota(&self, repo_id: &str, delta: i64) -> Result<bool>;
}

/// `publish_event`: fire-and-forget stats/event publication
/// (`web-file-upload`, `link-file-upload`, ...).
#[async_trait]
pub trait EventBus: Send + Sync {
    async fn publish(&self, channel: &str, payload: String);
}

/// C8: validate that `url_op` (the operation the request is actually
/// performing) is consistent with the token's bound `op`. The rule is a
/// *prefix* match, not equality: the URL operation string must start
/// with the token's operation string once `upload-link` has been
/// normalized to `upload` on both sides (so a `download` token also
/// covers `download-dir`/`download-link`/etc., but not vice versa).
/// Fails with `BadRequest` (mapped to HTTP 400 "Bad access token" by the
/// server) on any mismatch or missing token.
pub async fn resolve_access(
    oracle: &dyn TokenOracle,
    token: &str,
    url_op: Operation,
) -> Result<ResolvedAccess> {
    let access = oracle
        .query_access_token(token)
        .await?
        .ok_or_else(|| crate::error::ThicketError::bad_request("bad access token"))?;

    let token_op = access.op.normalized();
    let url_op = url_op.normalized();
    if !url_op.as_str().starts_with(token_op.as_str()) {
        return Err(crate::error::ThicketError::bad_request(format!(
            "token bound to op {:?}, request is {:?}",
            token_op, url_op
        )));
    }

    Ok(ResolvedAccess {
        repo_id: access.repo_id,
        obj_id: access.obj_id,
        op: access.op,
        user: access.username,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct FakeOracle {
        tokens: Mutex<HashMap<String, AccessToken>>,
    }

    #[async_trait]
    impl TokenOracle for FakeOracle {
        async fn query_access_token(&self, token: &str) -> Result<Option<AccessToken>> {
            Ok(self.tokens.lock().unwrap().get(token).cloned())
        }
    }

    #[tokio::test]
    async fn upload_link_normalizes_to_upload() {
        let mut tokens = HashMap::new();
        tokens.insert(
            "tok1".to_string(),
            AccessToken {
                repo_id: "r1".into(),
                obj_id: "o1".into(),
                op: Operation::UploadLink,
                username: "alice".into(),
            },
        );
        let oracle = FakeOracle {
            tokens: Mutex::new(tokens),
        };

        let resolved = resolve_access(&oracle, "tok1", Operation::Upload).await.unwrap();
        assert_eq!(resolved.user, "alice");
    }

    #[tokio::test]
    async fn mismatched_op_is_rejected() {
        let mut tokens = HashMap::new();
        tokens.insert(
            "tok1".to_string(),
            AccessToken {
                repo_id: "r1".into(),
                obj_id: "o1".into(),
                op: Operation::Download,
                username: "alice".into(),
            },
        );
        let oracle = FakeOracle {
            tokens: Mutex::new(tokens),
        };

        let result = resolve_access(&oracle, "tok1", Operation::Upload).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn unknown_token_is_rejected() {
        let oracle = FakeOracle {
            tokens: Mutex::new(HashMap::new()),
        };
        let result = resolve_access(&oracle, "missing", Operation::View).await;
        assert!(result.is_err());
    }
}
