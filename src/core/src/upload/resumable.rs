//! Resumable chunked uploads (C5 step 3): `Content-Range: bytes
//! FIRST-LAST/TOTAL` assembly against the process-wide upload temp-file
//! map, keyed by `(repo_id, absolute_path)`.

use crate::constants::{CLUSTER_SHARED_TEMP_DIR, HTTP_TEMP_DIR};
use crate::error::{Result, ThicketError};
use crate::store::RepoRegistry;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncSeekExt, AsyncWriteExt};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentRange {
    pub first: u64,
    pub last: u64,
    pub total: u64,
}

impl ContentRange {
    pub fn is_final_chunk(&self) -> bool {
        self.last + 1 == self.total
    }
}

/// Parse a `Content-Range: bytes FIRST-LAST/TOTAL` header value.
/// Malformed or logically inconsistent (`FIRST > LAST` or `LAST >=
/// TOTAL`) ranges are rejected with `BadRequest`.
pub fn parse_content_range(header: &str) -> Result<ContentRange> {
    let rest = header
        .strip_prefix("bytes ")
        .ok_or_else(|| ThicketError::bad_request("malformed Content-Range"))?;
    let (range, total) = rest
        .split_once('/')
        .ok_or_else(|| ThicketError::bad_request("malformed Content-Range"))?;
    let (first, last) = range
        .split_once('-')
        .ok_or_else(|| ThicketError::bad_request("malformed Content-Range"))?;

    let first: u64 = first.parse().map_err(|_| ThicketError::bad_request("bad range start"))?;
    let last: u64 = last.parse().map_err(|_| ThicketError::bad_request("bad range end"))?;
    let total: u64 = total.parse().map_err(|_| ThicketError::bad_request("bad range total"))?;

    if first > last || last >= total {
        return Err(ThicketError::bad_request("inconsistent Content-Range"));
    }

    Ok(ContentRange { first, last, total })
}

/// Write `chunk` at `range.first` into the temp file tracked for
/// `(repo_id, abs_path)`, creating it under
/// `abs_data_dir/httptemp/cluster-shared/` on first use. Returns the temp
/// path once the chunk carrying `LAST == TOTAL-1` completes the file;
/// `None` while more chunks are still expected.
pub async fn write_chunk(
    registry: &dyn RepoRegistry,
    abs_data_dir: &Path,
    repo_id: &str,
    abs_path: &str,
    range: ContentRange,
    chunk: &[u8],
) -> Result<Option<PathBuf>> {
    let temp_path = match registry.get_upload_tmp_file(repo_id, abs_path).await? {
        Some(path) => path,
        None => {
            let dir = abs_data_dir.join(HTTP_TEMP_DIR).join(CLUSTER_SHARED_TEMP_DIR);
            tokio::fs::create_dir_all(&dir).await?;
            let file_name = format!("{repo_id}-{}", crate::model::object::sha1_hex(abs_path.as_bytes()));
            let path = dir.join(file_name);
            tokio::fs::File::create(&path).await?;
            registry.add_upload_tmp_file(repo_id, abs_path, &path).await?;
            path
        }
    };

    let mut file = tokio::fs::OpenOptions::new().write(true).open(&temp_path).await?;
    file.seek(std::io::SeekFrom::Start(range.first)).await?;
    file.write_all(chunk).await?;
    file.flush().await?;

    if range.is_final_chunk() {
        registry.del_upload_tmp_file(repo_id, abs_path).await?;
        Ok(Some(temp_path))
    } else {
        Ok(None)
    }
}
