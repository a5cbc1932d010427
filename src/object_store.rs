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


//! The object store collaborator contract (spec.md §4.E) plus one concrete,
//! filesystem-backed implementation so the engine is runnable end-to-end.
//!
//! spec.md treats the object database's bulk read/write of a single blob,
//! and the JSON persistence layout of commits/refs, as out-of-scope
//! collaborators "assumed to round-trip". [`FileObjectStore`] is that
//! assumption made concrete: content-addressed blobs under `objects/`,
//! commits/refs/HEAD/log/index as JSON, following the teacher's
//! content-addressed temp-file-then-persist pattern
//! (`file_util::persist_content_addressed_temp_file` in the lineage repo).

use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;

use crate::commit::{Commit, Head, LogEntry, Reference};
use crate::error::{GlacierError, IoResultExt as _, Result};
use crate::index::Index;
use crate::io_context::IoContext;

/// The operations an object store must support. Out of scope per spec.md
/// §1/§4.E: only this interface is contracted; [`FileObjectStore`] below is
/// this crate's own concrete choice, not a mandated implementation.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn write_blob(&self, src: &Path, ioctx: &IoContext) -> Result<String>;
    async fn read_blob(&self, hash: &str, dst: &Path, ioctx: &IoContext) -> Result<()>;

    fn write_commit(&self, commit: &Commit) -> Result<()>;
    fn read_commits(&self) -> Result<Vec<Commit>>;

    fn write_reference(&self, reference: &Reference) -> Result<()>;
    fn delete_reference(&self, reference: &Reference) -> Result<()>;
    fn read_references(&self) -> Result<Vec<Reference>>;

    fn write_head_reference(&self, head: &Head) -> Result<()>;
    fn read_head_reference(&self) -> Result<Option<String>>;

    fn append_log(&self, entry: &LogEntry) -> Result<()>;
    fn read_log(&self) -> Result<Vec<LogEntry>>;

    fn write_index(&self, index: &Index) -> Result<()>;
    fn read_index(&self, id: &str) -> Result<Option<Index>>;
    fn read_all_indexes(&self) -> Result<Vec<Index>>;
}

/// A plain-directory, JSON-and-content-addressed-blob object store rooted at
/// a commondir.
#[derive(Debug, Clone)]
pub struct FileObjectStore {
    root: PathBuf,
}

impl FileObjectStore {
    /// Creates the on-disk layout (`objects/`, `commits/`, `refs/`,
    /// `index/`) under `commondir`.
    pub fn create(commondir: &Path) -> Result<Self> {
        for sub in ["objects", "commits", "refs", "index"] {
            fs::create_dir_all(commondir.join(sub)).context(commondir)?;
        }
        Ok(Self {
            root: commondir.to_path_buf(),
        })
    }

    /// Opens an already-initialized store.
    pub fn open(commondir: &Path) -> Result<Self> {
        if !commondir.is_dir() {
            return Err(GlacierError::InvalidCommondir(format!(
                "{} is not a directory",
                commondir.display()
            )));
        }
        Ok(Self {
            root: commondir.to_path_buf(),
        })
    }

    fn blob_path(&self, hash: &str) -> PathBuf {
        self.root
            .join("objects")
            .join(&hash[..2.min(hash.len())])
            .join(hash)
    }

    fn commit_path(&self, hash: &str) -> PathBuf {
        self.root.join("commits").join(format!("{hash}.json"))
    }

    fn reference_path(&self, name: &str) -> PathBuf {
        self.root.join("refs").join(format!("{name}.json"))
    }

    fn head_path(&self) -> PathBuf {
        self.root.join("HEAD")
    }

    fn log_path(&self) -> PathBuf {
        self.root.join("log.jsonl")
    }

    fn index_path(&self, id: &str) -> PathBuf {
        let name = if id.is_empty() { "main" } else { id };
        self.root.join("index").join(format!("{name}.json"))
    }
}

#[async_trait]
impl ObjectStore for FileObjectStore {
    async fn write_blob(&self, src: &Path, ioctx: &IoContext) -> Result<String> {
        let hash = hash_for_blob_name(src).await?;
        let dst = self.blob_path(&hash);
        if dst.exists() {
            return Ok(hash);
        }
        if let Some(parent) = dst.parent() {
            tokio::fs::create_dir_all(parent).await.context(parent)?;
        }
        ioctx.copy_file(src, &dst).await?;
        Ok(hash)
    }

    async fn read_blob(&self, hash: &str, dst: &Path, ioctx: &IoContext) -> Result<()> {
        let src = self.blob_path(hash);
        if !src.exists() {
            return Err(GlacierError::ObjectNotFound(hash.to_string()));
        }
        if let Some(parent) = dst.parent() {
            tokio::fs::create_dir_all(parent).await.context(parent)?;
        }
        ioctx.copy_file(&src, dst).await
    }

    fn write_commit(&self, commit: &Commit) -> Result<()> {
        write_json_atomic(&self.root, &self.commit_path(&commit.hash), commit)
    }

    fn read_commits(&self) -> Result<Vec<Commit>> {
        let dir = self.root.join("commits");
        let mut out = Vec::new();
        for entry in fs::read_dir(&dir).context(&dir)? {
            let entry = entry.context(&dir)?;
            if entry.path().extension().and_then(|e| e.to_str()) == Some("json") {
                out.push(read_json(&entry.path())?);
            }
        }
        Ok(out)
    }

    fn write_reference(&self, reference: &Reference) -> Result<()> {
        write_json_atomic(&self.root, &self.reference_path(&reference.name), reference)
    }

    fn delete_reference(&self, reference: &Reference) -> Result<()> {
        let path = self.reference_path(&reference.name);
        if path.exists() {
            fs::remove_file(&path).context(&path)?;
        }
        Ok(())
    }

    fn read_references(&self) -> Result<Vec<Reference>> {
        let dir = self.root.join("refs");
        let mut out = Vec::new();
        for entry in fs::read_dir(&dir).context(&dir)? {
            let entry = entry.context(&dir)?;
            if entry.path().extension().and_then(|e| e.to_str()) == Some("json") {
                out.push(read_json(&entry.path())?);
            }
        }
        Ok(out)
    }

    fn write_head_reference(&self, head: &Head) -> Result<()> {
        let contents = if head.is_detached() {
            head.hash.clone().unwrap_or_default()
        } else {
            head.name.clone()
        };
        let path = self.head_path();
        fs::write(&path, contents).context(&path)
    }

    fn read_head_reference(&self) -> Result<Option<String>> {
        let path = self.head_path();
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&path).context(&path)?;
        let trimmed = contents.trim();
        if trimmed.is_empty() {
            Ok(None)
        } else {
            Ok(Some(trimmed.to_string()))
        }
    }

    fn append_log(&self, entry: &LogEntry) -> Result<()> {
        let path = self.log_path();
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .context(&path)?;
        let line = serde_json::to_string(entry)
            .map_err(std::io::Error::other)
            .context(&path)?;
        writeln!(file, "{line}").context(&path)?;
        file.sync_all().context(&path)?;
        Ok(())
    }

    fn read_log(&self) -> Result<Vec<LogEntry>> {
        let path = self.log_path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let contents = fs::read_to_string(&path).context(&path)?;
        let mut out = Vec::new();
        for line in contents.lines() {
            if line.trim().is_empty() {
                continue;
            }
            let entry: LogEntry = serde_json::from_str(line)
                .map_err(std::io::Error::other)
                .context(&path)?;
            out.push(entry);
        }
        Ok(out)
    }

    fn write_index(&self, index: &Index) -> Result<()> {
        write_json_atomic(&self.root, &self.index_path(&index.id), index)
    }

    fn read_index(&self, id: &str) -> Result<Option<Index>> {
        let path = self.index_path(id);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(read_json(&path)?))
    }

    fn read_all_indexes(&self) -> Result<Vec<Index>> {
        let dir = self.root.join("index");
        let mut out = Vec::new();
        for entry in fs::read_dir(&dir).context(&dir)? {
            let entry = entry.context(&dir)?;
            if entry.path().extension().and_then(|e| e.to_str()) == Some("json") {
                out.push(read_json(&entry.path())?);
            }
        }
        Ok(out)
    }
}

async fn hash_for_blob_name(src: &Path) -> Result<String> {
    crate::hash::hash_file(src.to_path_buf())
        .await
        .map(|h| h.filehash)
}

fn write_json_atomic<T: serde::Serialize>(dir_root: &Path, path: &Path, value: &T) -> Result<()> {
    let parent = path.parent().unwrap_or(dir_root);
    fs::create_dir_all(parent).context(parent)?;
    let mut temp = NamedTempFile::new_in(parent).context(parent)?;
    let bytes = serde_json::to_vec_pretty(value)
        .map_err(std::io::Error::other)
        .context(path)?;
    temp.write_all(&bytes).context(path)?;
    persist_content_addressed_temp_file(temp, path).context(path)?;
    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = fs::read(path).context(path)?;
    serde_json::from_slice(&contents)
        .map_err(std::io::Error::other)
        .context(path)
}

/// Like `NamedTempFile::persist`, but also succeeds if the target already
/// exists (two writers racing to persist the same content is not an error).
fn persist_content_addressed_temp_file(
    temp_file: NamedTempFile,
    new_path: &Path,
) -> std::io::Result<()> {
    match temp_file.persist(new_path) {
        Ok(_file) => Ok(()),
        Err(err) => {
            if new_path.exists() {
                Ok(())
            } else {
                Err(err.error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_path_shards_by_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileObjectStore::create(dir.path()).unwrap();
        let path = store.blob_path("abcdef0123456789");
        assert!(path.starts_with(dir.path().join("objects").join("ab")));
    }

    #[test]
    fn head_round_trips_detached_and_attached() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileObjectStore::create(dir.path()).unwrap();
        store
            .write_head_reference(&Head::detached(Some("deadbeef".to_string())))
            .unwrap();
        assert_eq!(store.read_head_reference().unwrap().as_deref(), Some("deadbeef"));

        store
            .write_head_reference(&Head {
                name: "Main".to_string(),
                hash: Some("deadbeef".to_string()),
            })
            .unwrap();
        assert_eq!(store.read_head_reference().unwrap().as_deref(), Some("Main"));
    }
}
