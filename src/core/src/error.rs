//! Domain errors for thicket-core.
//!
//! Keeps a domain error enum separate from its HTTP-facing mapping:
//! `ThicketError` carries *why*, the server crate's `ResponseError` impl
//! decides *what status code*.

use std::path::PathBuf;
use thiserror::Error;

/// Error kinds propagated out of thicket-core. Each variant maps to one
/// HTTP status/user-message pair at the server boundary.
#[derive(Error, Debug)]
pub enum ThicketError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("contention: branch advance failed after {0} retries")]
    Conflict(u32),

    #[error("range not satisfiable, resource size {size}")]
    RangeNotSatisfiable { size: u64 },

    #[error("quota exceeded")]
    QuotaExceeded,

    #[error("file too large: {size} bytes exceeds limit of {limit} bytes")]
    TooLarge { size: u64, limit: u64 },

    #[error("internal error: {0}")]
    Internal(String),

    #[error("partial response: connection aborted mid-stream")]
    PartialResponse,
}

impl ThicketError {
    pub fn internal(msg: impl Into<String>) -> Self {
        ThicketError::Internal(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        ThicketError::NotFound(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        ThicketError::BadRequest(msg.into())
    }
}

impl From<std::io::Error> for ThicketError {
    fn from(err: std::io::Error) -> Self {
        ThicketError::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for ThicketError {
    fn from(err: serde_json::Error) -> Self {
        ThicketError::Internal(err.to_string())
    }
}

/// Failure reading/writing an on-disk path; kept distinct from io::Error
/// so call sites can attach the path without losing the original cause.
#[derive(Error, Debug)]
#[error("io error at {path:?}: {source}")]
pub struct PathIoError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

pub type Result<T> = std::result::Result<T, ThicketError>;
