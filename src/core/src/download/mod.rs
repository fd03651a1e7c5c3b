//! Download & zip streamer (C6): byte-range resolution across blocks,
//! on-the-fly AES-CBC decryption, and deflate zip streaming.

pub mod zip;

use crate::error::{Result, ThicketError};
use crate::model::FileObject;
use crate::store::{BlockStore, FsStore};

/// A resolved, inclusive byte range against a file's total size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Parse a `Range: bytes=...` header value against a resource of
/// `size` bytes. Supports `A-B`, `A-` and `-N` forms; `B` is clamped to
/// `size - 1`. Returns `RangeNotSatisfiable` for anything malformed or
/// with `A > B`.
pub fn parse_range(header: &str, size: u64) -> Result<ByteRange> {
    let spec = header
        .strip_prefix("bytes=")
        .ok_or_else(|| ThicketError::RangeNotSatisfiable { size })?;

    if let Some(suffix_len) = spec.strip_prefix('-') {
        let n: u64 = suffix_len
            .parse()
            .map_err(|_| ThicketError::RangeNotSatisfiable { size })?;
        if n == 0 || size == 0 {
            return Err(ThicketError::RangeNotSatisfiable { size });
        }
        let n = n.min(size);
        return Ok(ByteRange {
            start: size - n,
            end: size - 1,
        });
    }

    let (a, b) = spec
        .split_once('-')
        .ok_or_else(|| ThicketError::RangeNotSatisfiable { size })?;
    let start: u64 = a.parse().map_err(|_| ThicketError::RangeNotSatisfiable { size })?;

    let end = if b.is_empty() {
        size.saturating_sub(1)
    } else {
        b.parse().map_err(|_| ThicketError::RangeNotSatisfiable { size })?
    };
    let end = end.min(size.saturating_sub(1));

    if start > end || start >= size {
        return Err(ThicketError::RangeNotSatisfiable { size });
    }

    Ok(ByteRange { start, end })
}

/// Which blocks (in order) a byte range touches, along with the
/// within-block `[from, to)` slice for the first and last block (and the
/// implicit "whole block" for everything in between).
struct BlockSpan {
    index: usize,
    from: u64,
    to: u64,
}

fn block_spans(file: &FileObject, range: ByteRange) -> Vec<BlockSpan> {
    let mut spans = Vec::new();
    let mut offset = 0u64;
    for (index, _) in file.block_ids.iter().enumerate() {
        let block_size = block_size_at(file, index);
        let block_start = offset;
        let block_end = offset + block_size; // exclusive
        offset = block_end;

        if block_end <= range.start || block_start > range.end {
            continue;
        }
        let from = range.start.saturating_sub(block_start);
        let to = (range.end + 1).saturating_sub(block_start).min(block_size);
        spans.push(BlockSpan { index, from, to });
    }
    spans
}

fn block_size_at(file: &FileObject, index: usize) -> u64 {
    let consumed = index as u64 * crate::constants::BLOCK_SIZE;
    let remaining = file.file_size.saturating_sub(consumed);
    remaining.min(crate::constants::BLOCK_SIZE)
}

/// Read and concatenate exactly the bytes covered by `range` out of
/// `file`'s blocks, decrypting first if `key` is supplied. Only called
/// for non-encrypted files per spec (`Range` is unsupported for
/// encrypted repos), but the decrypt path is kept general so callers
/// don't need a second code path for small encrypted reads (e.g. a
/// range request against an encrypted repo that a caller chooses to
/// reject before ever calling this).
pub async fn read_range(
    blocks: &dyn BlockStore,
    store_id: &str,
    file: &FileObject,
    range: ByteRange,
    key: Option<(&[u8], &[u8])>,
) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(range.len() as usize);
    for span in block_spans(file, range) {
        let block_id = &file.block_ids[span.index];
        let bytes = blocks.read(store_id, block_id).await?;
        let bytes = match key {
            Some((k, iv)) => decrypt_block(&bytes, k, iv)?,
            None => bytes,
        };
        out.extend_from_slice(&bytes[span.from as usize..span.to as usize]);
    }
    Ok(out)
}

/// Read every block of `file` in order, decrypting as it goes if `key`
/// is supplied, and hand each plaintext block to `sink` as it becomes
/// available (a single in-memory `Vec` per the single-file download path
/// of §4.6, since the response writer streams block-by-block already).
pub async fn read_whole_file(
    blocks: &dyn BlockStore,
    store_id: &str,
    file: &FileObject,
    key: Option<(&[u8], &[u8])>,
    mut sink: impl FnMut(Vec<u8>) -> Result<()>,
) -> Result<()> {
    for block_id in &file.block_ids {
        let bytes = blocks.read(store_id, block_id).await?;
        let bytes = match key {
            Some((k, iv)) => decrypt_block(&bytes, k, iv)?,
            None => bytes,
        };
        sink(bytes)?;
    }
    Ok(())
}

pub(crate) fn decrypt_block(ciphertext: &[u8], key: &[u8], iv: &[u8]) -> Result<Vec<u8>> {
    use aes::Aes256;
    use cbc::cipher::block_padding::Pkcs7;
    use cbc::cipher::{BlockDecryptMut, KeyIvInit};

    type Decryptor = cbc::Decryptor<Aes256>;
    let decryptor =
        Decryptor::new_from_slices(key, iv).map_err(|e| ThicketError::internal(format!("bad key/iv: {e}")))?;
    decryptor
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| ThicketError::internal("block decryption failed"))
}

/// Resolve a file object via the FS store for a download handler; a thin
/// convenience wrapper so controllers don't reach into `FsStore`
/// directly for this one lookup.
pub async fn load_file(fs: &dyn FsStore, store_id: &str, file_id: &str) -> Result<FileObject> {
    fs.get_file(store_id, file_id)
        .await?
        .ok_or_else(|| ThicketError::not_found(format!("file {file_id}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::BLOCK_SIZE;
    use crate::store::local::LocalObjectStore;

    async fn three_block_file(store: &LocalObjectStore) -> FileObject {
        let mut block_ids = Vec::new();
        let sizes = [BLOCK_SIZE as usize, BLOCK_SIZE as usize, 512];
        for (idx, size) in sizes.iter().enumerate() {
            let bytes = vec![idx as u8; *size];
            let id = crate::model::object::sha1_hex(&bytes);
            store.write("repo1", &id, &bytes).await.unwrap();
            block_ids.push(id);
        }
        let total = sizes.iter().sum::<usize>() as u64;
        FileObject::new(block_ids, total)
    }

    #[tokio::test]
    async fn scenario_1_small_range_spans_two_blocks() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path());
        let file = three_block_file(&store).await;

        let range = parse_range("bytes=1048575-1048577", file.file_size).unwrap();
        assert_eq!(range.len(), 3);

        let bytes = read_range(&store, "repo1", &file, range, None).await.unwrap();
        assert_eq!(bytes, vec![0u8, 1, 1]);
    }

    #[tokio::test]
    async fn scenario_2_suffix_range_reads_last_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path());
        let file = three_block_file(&store).await;

        let range = parse_range("bytes=-100", file.file_size).unwrap();
        assert_eq!(range.len(), 100);
        assert_eq!(range.start, file.file_size - 100);

        let bytes = read_range(&store, "repo1", &file, range, None).await.unwrap();
        assert_eq!(bytes, vec![2u8; 100]);
    }

    #[test]
    fn malformed_range_is_rejected() {
        assert!(parse_range("bytes=500-100", 1000).is_err());
        assert!(parse_range("nonsense", 1000).is_err());
    }

    #[test]
    fn open_ended_range_clamps_to_size() {
        let range = parse_range("bytes=900-", 1000).unwrap();
        assert_eq!(range.start, 900);
        assert_eq!(range.end, 999);
    }
}
