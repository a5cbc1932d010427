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


//! Cross-process mutual exclusion for mutating repository operations
//! (spec.md §5: "the commit graph, reference list, and HEAD ... are not
//! safe for concurrent mutation from multiple operations").
//!
//! Grounded on the lineage repo's lock module, which holds an exclusively
//! locked file for the operation's duration and removes it on `Drop`. This
//! implementation uses an exclusive-create lock file rather than an OS
//! advisory file lock, so it needs nothing beyond a stable filesystem
//! `create_new` — portable across the targets this crate supports without
//! depending on a specific Rust edition's file-locking stabilization.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
#[error("failed to acquire lock at {path}: {message}")]
pub struct FileLockError {
    pub path: PathBuf,
    pub message: &'static str,
    #[source]
    pub err: io::Error,
}

/// An exclusive lock on a repository's commondir, held for the duration of a
/// mutating operation.
pub struct FileLock {
    path: PathBuf,
}

impl FileLock {
    /// Acquires the lock, retrying with backoff until `timeout` elapses.
    pub async fn lock(path: PathBuf, timeout: Duration) -> Result<Self, FileLockError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            match std::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
            {
                Ok(_file) => return Ok(Self { path }),
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                    if tokio::time::Instant::now() >= deadline {
                        return Err(FileLockError {
                            path,
                            message: "timed out waiting for lock",
                            err,
                        });
                    }
                    tokio::time::sleep(Duration::from_millis(20)).await;
                }
                Err(err) => {
                    return Err(FileLockError {
                        path,
                        message: "failed to create lock file",
                        err,
                    });
                }
            }
        }
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        // Not strictly necessary for correctness beyond unblocking waiters,
        // but removing it reduces confusion for anyone inspecting the
        // commondir between operations.
        let _ = std::fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_lock_waits_for_first_drop() {
        let dir = tempfile::tempdir().unwrap();
        let lock_path = dir.path().join("repo.lock");
        let first = FileLock::lock(lock_path.clone(), Duration::from_secs(1))
            .await
            .unwrap();
        drop(first);
        let second = FileLock::lock(lock_path, Duration::from_secs(1)).await;
        assert!(second.is_ok());
    }
}
