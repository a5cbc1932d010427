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


//! Tree data model (spec.md §3): `FileInfo`, `TreeFile`, `TreeDir`, and the
//! helper that assembles a `TreeDir` from a flat map of relative paths.
//!
//! spec.md treats both the directory walk (`osWalk`) and the tree-
//! construction helper as out-of-scope collaborators, contracted only by
//! their interface. This crate still ships one concrete implementation of
//! each — [`walk_dir`] and [`build_tree_dir`] — the same way it ships a
//! concrete [`crate::object_store::FileObjectStore`] alongside the
//! `ObjectStore` trait, so the engine is runnable end-to-end.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{IoResultExt as _, Result};
use crate::hash::{hash_file, FileHash};
use crate::ignore::IgnoreMatcher;
use crate::path_util;

/// Metadata captured at hash time, consumed by [`build_tree_dir`] and
/// discarded once a commit is written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub hash: String,
    pub size: u64,
    pub atime: DateTime<Utc>,
    pub mtime: DateTime<Utc>,
    pub ctime: DateTime<Utc>,
}

/// A single file as it appears inside a commit's tree. Immutable once a
/// commit exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeFile {
    pub path: String,
    pub hash: String,
    pub size: u64,
    pub mtime: DateTime<Utc>,
    pub ctime: DateTime<Utc>,
}

impl TreeFile {
    /// Fast-path modification check: compares size and mtime/ctime before
    /// falling back to content hashing (spec.md §4.G checkout step 7).
    pub async fn is_file_modified(&self, abs_path: &Path) -> Result<bool> {
        let metadata = tokio::fs::metadata(abs_path).await.context(abs_path)?;
        if metadata.len() != self.size {
            return Ok(true);
        }
        let mtime: DateTime<Utc> = metadata.modified().context(abs_path)?.into();
        let ctime_matches = file_ctime(&metadata)
            .map(|ctime| ctime == self.ctime)
            .unwrap_or(true);
        if mtime != self.mtime || !ctime_matches {
            // The cheap fields disagree: the fast path can't rule out a real
            // change, but a rewrite that restores identical bytes is still
            // unmodified.
            let actual = hash_file(abs_path.to_path_buf()).await?;
            return Ok(actual.filehash != self.hash);
        }
        Ok(false)
    }
}

/// A directory snapshot: a path plus its ordered children. Each commit has
/// exactly one root `TreeDir`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeDir {
    pub path: String,
    pub children: Vec<TreeEntry>,
}

/// One entry of a [`TreeDir`]: either a file or a nested directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum TreeEntry {
    File(TreeFile),
    Dir(TreeDir),
}

impl TreeDir {
    /// Flattens the tree into a map of relative path -> [`TreeFile`],
    /// discarding directory structure. Used by status/checkout, which only
    /// ever care about files.
    pub fn flatten_files(&self) -> BTreeMap<String, TreeFile> {
        let mut out = BTreeMap::new();
        self.flatten_into(&mut out);
        out
    }

    fn flatten_into(&self, out: &mut BTreeMap<String, TreeFile>) {
        for entry in &self.children {
            match entry {
                TreeEntry::File(f) => {
                    out.insert(f.path.clone(), f.clone());
                }
                TreeEntry::Dir(d) => d.flatten_into(out),
            }
        }
    }

    /// Removes `relpath` from the tree if present, pruning now-empty parent
    /// directories. Used to apply `index.deleteRelPaths` when building a
    /// commit.
    pub fn remove_path(&mut self, relpath: &str) {
        let segments: Vec<&str> = relpath.split('/').collect();
        self.remove_segments(&segments);
    }

    fn remove_segments(&mut self, segments: &[&str]) -> bool {
        let Some((head, rest)) = segments.split_first() else {
            return false;
        };
        let mut removed_index = None;
        for (i, entry) in self.children.iter_mut().enumerate() {
            match entry {
                TreeEntry::File(f) if rest.is_empty() && f.path.rsplit('/').next() == Some(*head) => {
                    removed_index = Some(i);
                    break;
                }
                TreeEntry::Dir(d) if d.path.rsplit('/').next() == Some(*head) => {
                    if rest.is_empty() {
                        removed_index = Some(i);
                    } else {
                        d.remove_segments(rest);
                        if d.children.is_empty() {
                            removed_index = Some(i);
                        }
                    }
                    break;
                }
                _ => {}
            }
        }
        if let Some(i) = removed_index {
            self.children.remove(i);
            true
        } else {
            false
        }
    }
}

/// Walks `dir`, returning every regular file's path relative to `dir`
/// (forward-slash normalized). Hidden entries are included; callers filter
/// with [`IgnoreMatcher`] as needed (spec.md's `osWalk` collaborator).
pub fn walk_dir(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for entry in walkdir::WalkDir::new(dir).into_iter() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| dir.to_path_buf());
                return Err(std::io::Error::other(e)).context(&path).map_err(Into::into);
            }
        };
        if entry.file_type().is_file() {
            if let Ok(rel) = entry.path().strip_prefix(dir) {
                out.push(rel.to_path_buf());
            }
        }
    }
    Ok(out)
}

/// Lists working-tree file relpaths under `dir`, filtered through `ignore`.
pub fn list_tracked_files(dir: &Path, ignore: &IgnoreMatcher) -> Result<Vec<String>> {
    let all = walk_dir(dir)?;
    Ok(all
        .into_iter()
        .map(|p| path_util::to_slash(&p))
        .filter(|relpath| !ignore.ignored(relpath))
        .collect())
}

/// Builds a `TreeDir` rooted at `workdir` from a flat map of relpath ->
/// [`FileInfo`], nesting entries into directories by path segment.
pub fn build_tree_dir(processed: &BTreeMap<String, FileInfo>) -> TreeDir {
    let mut root = TreeDir {
        path: String::new(),
        children: Vec::new(),
    };
    for (relpath, info) in processed {
        insert_file(&mut root, relpath, info);
    }
    root
}

fn insert_file(root: &mut TreeDir, relpath: &str, info: &FileInfo) {
    let segments: Vec<&str> = relpath.split('/').collect();
    insert_segments(root, &segments, relpath, info);
}

fn insert_segments(dir: &mut TreeDir, segments: &[&str], full_path: &str, info: &FileInfo) {
    let Some((head, rest)) = segments.split_first() else {
        return;
    };
    if rest.is_empty() {
        dir.children.retain(|e| entry_basename(e) != *head);
        dir.children.push(TreeEntry::File(TreeFile {
            path: full_path.to_string(),
            hash: info.hash.clone(),
            size: info.size,
            mtime: info.mtime,
            ctime: info.ctime,
        }));
        return;
    }
    let child_path = path_util::join(&dir.path, head);
    if let Some(TreeEntry::Dir(child)) = dir
        .children
        .iter_mut()
        .find(|e| matches!(e, TreeEntry::Dir(d) if d.path == child_path))
    {
        insert_segments(child, rest, full_path, info);
        return;
    }
    let mut child = TreeDir {
        path: child_path,
        children: Vec::new(),
    };
    insert_segments(&mut child, rest, full_path, info);
    dir.children.push(TreeEntry::Dir(child));
}

fn entry_basename(entry: &TreeEntry) -> &str {
    let path = match entry {
        TreeEntry::File(f) => &f.path,
        TreeEntry::Dir(d) => &d.path,
    };
    path.rsplit('/').next().unwrap_or(path)
}

#[cfg(unix)]
pub(crate) fn file_ctime(metadata: &std::fs::Metadata) -> Option<DateTime<Utc>> {
    use std::os::unix::fs::MetadataExt as _;
    let secs = metadata.ctime();
    let nanos = metadata.ctime_nsec() as u32;
    DateTime::<Utc>::from_timestamp(secs, nanos)
}

#[cfg(not(unix))]
pub(crate) fn file_ctime(_metadata: &std::fs::Metadata) -> Option<DateTime<Utc>> {
    None
}

/// Converts a [`SystemTime`] read from filesystem metadata into the
/// `DateTime<Utc>` representation used throughout the data model.
pub fn to_datetime(time: SystemTime) -> DateTime<Utc> {
    DateTime::<Utc>::from(time)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(hash: &str) -> FileInfo {
        let now = Utc::now();
        FileInfo {
            hash: hash.to_string(),
            size: 0,
            atime: now,
            mtime: now,
            ctime: now,
        }
    }

    #[test]
    fn builds_nested_tree() {
        let mut map = BTreeMap::new();
        map.insert("a/b/c.bin".to_string(), info("h1"));
        map.insert("a/d.bin".to_string(), info("h2"));
        let tree = build_tree_dir(&map);
        let flat = tree.flatten_files();
        assert_eq!(flat.len(), 2);
        assert_eq!(flat["a/b/c.bin"].hash, "h1");
        assert_eq!(flat["a/d.bin"].hash, "h2");
    }

    #[test]
    fn remove_path_prunes_empty_dirs() {
        let mut map = BTreeMap::new();
        map.insert("a/b/c.bin".to_string(), info("h1"));
        let mut tree = build_tree_dir(&map);
        tree.remove_path("a/b/c.bin");
        assert!(tree.flatten_files().is_empty());
        assert!(tree.children.is_empty());
    }
}
