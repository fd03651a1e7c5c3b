//! Token/access model (C8).

use serde::{Deserialize, Serialize};
use std::fmt;

/// The set of operations an access token may authorize. `UploadLink` is
/// normalized to `Upload` when matching against the URL's operation
/// segment (spec.md §4.8 / §4.5 step 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Operation {
    View,
    Download,
    DownloadLink,
    DownloadDir,
    DownloadDirLink,
    DownloadMulti,
    DownloadMultiLink,
    Downloadblks,
    Upload,
    UploadLink,
}

impl Operation {
    pub fn from_str_loose(s: &str) -> Option<Operation> {
        match s {
            "view" => Some(Operation::View),
            "download" => Some(Operation::Download),
            "download-link" => Some(Operation::DownloadLink),
            "download-dir" => Some(Operation::DownloadDir),
            "download-dir-link" => Some(Operation::DownloadDirLink),
            "download-multi" => Some(Operation::DownloadMulti),
            "download-multi-link" => Some(Operation::DownloadMultiLink),
            "downloadblks" => Some(Operation::Downloadblks),
            "upload" => Some(Operation::Upload),
            "upload-link" => Some(Operation::UploadLink),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::View => "view",
            Operation::Download => "download",
            Operation::DownloadLink => "download-link",
            Operation::DownloadDir => "download-dir",
            Operation::DownloadDirLink => "download-dir-link",
            Operation::DownloadMulti => "download-multi",
            Operation::DownloadMultiLink => "download-multi-link",
            Operation::Downloadblks => "downloadblks",
            Operation::Upload => "upload",
            Operation::UploadLink => "upload-link",
        }
    }

    /// `upload-link` is treated as `upload` everywhere this core compares
    /// a token's declared op against the URL's operation segment.
    pub fn normalized(&self) -> Operation {
        match self {
            Operation::UploadLink => Operation::Upload,
            other => *other,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The resolved shape of an opaque access token, as returned by the token
/// oracle: `{repo-id, obj-id, op, username}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessToken {
    #[serde(rename = "repo-id")]
    pub repo_id: String,
    #[serde(rename = "obj-id")]
    pub obj_id: String,
    pub op: Operation,
    pub username: String,
}

/// `(repo, object, op, user)` attached to a request once the token has
/// been resolved and validated against the URL operation (C8 contract).
#[derive(Debug, Clone)]
pub struct ResolvedAccess {
    pub repo_id: String,
    pub obj_id: String,
    pub op: Operation,
    pub user: String,
}
