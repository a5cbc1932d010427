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


//! The index: accumulated add/delete intents not yet bundled into a commit
//! (spec.md §3, §4.F).

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

use rand::Rng as _;
use serde::{Deserialize, Serialize};

use crate::error::{GlacierError, IoResultExt as _, Result};
use crate::io_context::IoContext;
use crate::object_store::ObjectStore;
use crate::tree::{file_ctime, to_datetime, FileInfo};

/// An in-progress set of add/delete intents. `id == ""` denotes the main
/// index, auto-created on demand; there may be several per repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Index {
    pub id: String,
    pub add_rel_paths: BTreeSet<String>,
    pub delete_rel_paths: BTreeSet<String>,
    pub processed_map: BTreeMap<String, FileInfo>,
    pub valid: bool,
}

impl Index {
    /// Creates the main index (`id == ""`).
    pub fn main() -> Self {
        Self {
            id: String::new(),
            add_rel_paths: BTreeSet::new(),
            delete_rel_paths: BTreeSet::new(),
            processed_map: BTreeMap::new(),
            valid: true,
        }
    }

    /// Creates a non-main index with a fresh random 6-hex-char id.
    pub fn create_ext() -> Self {
        let id: u32 = rand::rng().random_range(0..0x0100_0000);
        Self {
            id: format!("{id:06x}"),
            add_rel_paths: BTreeSet::new(),
            delete_rel_paths: BTreeSet::new(),
            processed_map: BTreeMap::new(),
            valid: true,
        }
    }

    fn ensure_valid(&self) -> Result<()> {
        if self.valid {
            Ok(())
        } else {
            Err(GlacierError::IndexInvalidated)
        }
    }

    /// Marks `relpath` to be added on the next commit.
    pub fn add(&mut self, relpath: impl Into<String>) -> Result<()> {
        self.ensure_valid()?;
        let relpath = relpath.into();
        self.delete_rel_paths.remove(&relpath);
        self.add_rel_paths.insert(relpath);
        Ok(())
    }

    /// Marks `relpath` to be removed on the next commit.
    pub fn remove(&mut self, relpath: impl Into<String>) -> Result<()> {
        self.ensure_valid()?;
        let relpath = relpath.into();
        self.add_rel_paths.remove(&relpath);
        self.delete_rel_paths.insert(relpath);
        Ok(())
    }

    /// Hashes every path in `add_rel_paths`, writes its blob into `store`,
    /// and records the resulting [`FileInfo`] in `processed_map`.
    pub async fn write_files(
        &mut self,
        workdir: &Path,
        store: &Arc<dyn ObjectStore>,
        ioctx: &IoContext,
    ) -> Result<()> {
        self.ensure_valid()?;
        let paths: Vec<String> = self.add_rel_paths.iter().cloned().collect();
        for relpath in paths {
            let abs_path = workdir.join(&relpath);
            let metadata = tokio::fs::metadata(&abs_path).await.context(&abs_path)?;
            let hash = store.write_blob(&abs_path, ioctx).await?;
            let mtime = metadata
                .modified()
                .map(to_datetime)
                .unwrap_or_else(|_| chrono::Utc::now());
            let info = FileInfo {
                hash,
                size: metadata.len(),
                atime: metadata
                    .accessed()
                    .map(to_datetime)
                    .unwrap_or_else(|_| chrono::Utc::now()),
                mtime,
                ctime: file_ctime(&metadata).unwrap_or(mtime),
            };
            self.processed_map.insert(relpath, info);
        }
        Ok(())
    }

    /// Persists the index then marks it `valid = false`. Every public
    /// mutator rejects calls on an invalidated index.
    pub fn invalidate(&mut self, store: &dyn ObjectStore) -> Result<()> {
        store.write_index(self)?;
        self.valid = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_remove_are_mutually_exclusive() {
        let mut index = Index::main();
        index.add("a.txt").unwrap();
        index.remove("a.txt").unwrap();
        assert!(!index.add_rel_paths.contains("a.txt"));
        assert!(index.delete_rel_paths.contains("a.txt"));
    }

    #[test]
    fn mutators_reject_after_invalidate() {
        let mut index = Index::main();
        index.valid = false;
        assert!(index.add("a.txt").is_err());
        assert!(index.remove("a.txt").is_err());
    }

    #[test]
    fn create_ext_produces_six_hex_chars() {
        let index = Index::create_ext();
        assert_eq!(index.id.len(), 6);
        assert!(index.id.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
