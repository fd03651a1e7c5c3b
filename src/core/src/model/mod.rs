//! Core data types: content-addressed objects, relational state, tokens,
//! and diff entries.

pub mod diff;
pub mod object;
pub mod repo;
pub mod token;

pub use diff::{DiffEntry, DiffStatus};
pub use object::{Commit, Dirent, EncryptionInfo, FileObject, Directory, MODE_DIR, MODE_FILE};
pub use repo::{Branch, DecryptKey, HeadId, RepoFileCount, RepoInfo, RepoSize, RepoStatus, VirtualRepo};
pub use token::{AccessToken, Operation, ResolvedAccess};
