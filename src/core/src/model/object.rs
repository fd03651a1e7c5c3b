//! Content-addressed object kinds (C1): Block, File, Directory, Commit.
//!
//! Ids are always lowercase 40-hex SHA-1. Files/Directories/Commits hash
//! a canonical byte form; Blocks hash their stored (possibly encrypted)
//! bytes directly — see [`sha1_hex`] and [`Commit::compute_id`].

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

/// POSIX-style mode bits for dirents. Only the bits this core cares about
/// are modeled; the directory bit mirrors `S_IFDIR`.
pub const MODE_DIR: u32 = 0o040000;
pub const MODE_FILE: u32 = 0o100644;

pub fn is_dir_mode(mode: u32) -> bool {
    mode & 0o170000 == MODE_DIR
}

/// SHA-1 of arbitrary bytes, lowercase hex.
pub fn sha1_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// An entry inside a [`Directory`]: a name bound to a child object id plus
/// the metadata needed to rebuild a filesystem view (mode, mtime, size,
/// modifier) without re-reading the child.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Dirent {
    pub name: String,
    pub id: String,
    pub mode: u32,
    pub mtime: i64,
    pub size: u64,
    pub modifier: String,
}

impl Dirent {
    pub fn is_dir(&self) -> bool {
        is_dir_mode(self.mode)
    }
}

/// A directory object: a lex-sorted, name-unique set of dirents.
///
/// `entries` MUST be kept sorted by `name` before serialization — that's
/// what makes [`Directory::compute_id`] stable regardless of the order
/// entries were inserted in (P1: permuting inputs yields the same id).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Directory {
    pub version: u32,
    pub entries: Vec<Dirent>,
}

impl Directory {
    pub fn empty() -> Self {
        Directory {
            version: 1,
            entries: Vec::new(),
        }
    }

    /// Returns a new `Directory` with `entries` sorted by name. Construct
    /// directories through this rather than setting the field directly.
    pub fn new_sorted(mut entries: Vec<Dirent>) -> Self {
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Directory { version: 1, entries }
    }

    pub fn find(&self, name: &str) -> Option<&Dirent> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn find_index(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.name == name)
    }

    /// Canonical serialization: JSON of the sorted-entry form.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self).expect("Directory serialization cannot fail")
    }

    pub fn compute_id(&self) -> String {
        sha1_hex(&self.canonical_bytes())
    }
}

/// A file object: the ordered list of block ids whose concatenation is the
/// file's bytes, plus the total size.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileObject {
    pub version: u32,
    pub file_size: u64,
    pub block_ids: Vec<String>,
}

impl FileObject {
    pub fn new(block_ids: Vec<String>, file_size: u64) -> Self {
        FileObject {
            version: 1,
            file_size,
            block_ids,
        }
    }

    pub fn canonical_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self).expect("FileObject serialization cannot fail")
    }

    pub fn compute_id(&self) -> String {
        sha1_hex(&self.canonical_bytes())
    }
}

/// Encryption metadata carried on a commit for encrypted repositories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct EncryptionInfo {
    pub encrypted: bool,
    pub enc_version: u32,
    pub magic: Option<String>,
    pub random_key: Option<String>,
    pub salt: Option<String>,
}

/// An immutable, content-addressed commit. `commit_id` is computed by
/// [`Commit::compute_id`] over exactly six fields, in
/// that order, with no separators — NOT over the whole canonical JSON
/// (unlike File/Directory). Changing any of those six fields changes the
/// id (P2); every other field may vary freely without affecting it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Commit {
    pub commit_id: String,
    pub repo_id: String,
    pub root_id: String,
    pub parent_id: Option<String>,
    pub second_parent_id: Option<String>,
    pub creator_id: String,
    pub creator_name: String,
    pub desc: String,
    pub ctime: i64,
    pub repo_name: String,
    pub repo_desc: String,
    pub encryption: EncryptionInfo,
    pub new_merge: bool,
    pub conflict: bool,
}

impl Commit {
    /// SHA-1 of `root_id ‖ creator_id ‖ creator_name ‖ desc ‖
    /// big-endian-u64(ctime)`, with no separators between fields.
    pub fn compute_id(
        root_id: &str,
        creator_id: &str,
        creator_name: &str,
        desc: &str,
        ctime: i64,
    ) -> String {
        let mut buf = Vec::new();
        buf.extend_from_slice(root_id.as_bytes());
        buf.extend_from_slice(creator_id.as_bytes());
        buf.extend_from_slice(creator_name.as_bytes());
        buf.extend_from_slice(desc.as_bytes());
        buf.extend_from_slice(&(ctime as u64).to_be_bytes());
        sha1_hex(&buf)
    }

    pub fn canonical_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self).expect("Commit serialization cannot fail")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_id_is_order_independent() {
        let a = Dirent {
            name: "a.txt".into(),
            id: "0".repeat(40),
            mode: MODE_FILE,
            mtime: 0,
            size: 0,
            modifier: "u".into(),
        };
        let b = Dirent {
            name: "b.txt".into(),
            id: "1".repeat(40),
            mode: MODE_FILE,
            mtime: 0,
            size: 0,
            modifier: "u".into(),
        };
        let d1 = Directory::new_sorted(vec![a.clone(), b.clone()]);
        let d2 = Directory::new_sorted(vec![b, a]);
        assert_eq!(d1.compute_id(), d2.compute_id());
    }

    #[test]
    fn commit_id_depends_only_on_the_six_fields() {
        let id1 = Commit::compute_id("root", "u1", "User", "msg", 1000);
        let id2 = Commit::compute_id("root", "u1", "User", "msg", 1000);
        assert_eq!(id1, id2);

        let id3 = Commit::compute_id("root", "u1", "User", "different msg", 1000);
        assert_ne!(id1, id3);
    }

    #[test]
    fn mode_dir_bit() {
        assert!(is_dir_mode(MODE_DIR));
        assert!(!is_dir_mode(MODE_FILE));
    }
}
