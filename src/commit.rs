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


//! Commits, references, and HEAD (spec.md §3).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tree::TreeDir;

/// An immutable snapshot of a `TreeDir` plus metadata. Append-only: never
/// mutated or deleted after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub hash: String,
    pub message: String,
    pub date: DateTime<Utc>,
    pub root: TreeDir,
    pub parents: Vec<String>,
    pub tags: Vec<String>,
    #[serde(default)]
    pub user_data: BTreeMap<String, Value>,
}

impl Commit {
    /// Derives this commit's content-addressed id from everything but the
    /// id itself, so the hash is stable across re-serialization.
    pub fn compute_hash(
        message: &str,
        date: &DateTime<Utc>,
        root: &TreeDir,
        parents: &[String],
    ) -> String {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(message.as_bytes());
        hasher.update(date.to_rfc3339().as_bytes());
        hasher.update(parents.join(",").as_bytes());
        let root_json = serde_json::to_vec(root).unwrap_or_default();
        hasher.update(&root_json);
        hex::encode(hasher.finalize())
    }

    /// Walks `other`'s first-parent chain looking for `self`, using
    /// `commits` (the repository's hash-keyed commit store) to resolve each
    /// parent hash. Used internally by `findCommitByHash`'s `HEAD~N~M` walk
    /// and exposed publicly since every other VCS in the pack offers an
    /// equivalent ancestry check.
    pub fn is_ancestor_of(&self, other: &Commit, commits: &IndexMap<String, Commit>) -> bool {
        let mut current = other;
        loop {
            if current.hash == self.hash {
                return true;
            }
            let Some(parent_hash) = current.parents.first() else {
                return false;
            };
            let Some(parent) = commits.get(parent_hash) else {
                return false;
            };
            current = parent;
        }
    }
}

/// The kind of a [`Reference`]. Only `Branch` exists today (spec.md
/// GLOSSARY).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferenceType {
    Branch,
}

/// A named, mutable pointer to a commit. Names are unique within a
/// repository and case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    #[serde(rename = "type")]
    pub reference_type: ReferenceType,
    pub name: String,
    pub hash: String,
    pub start: String,
    #[serde(default)]
    pub user_data: BTreeMap<String, Value>,
}

/// `HEAD`: a distinguished reference whose `name` is either a real
/// reference's name (attached) or the literal `"HEAD"` (detached).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Head {
    pub name: String,
    pub hash: Option<String>,
}

impl Head {
    pub fn detached(hash: Option<String>) -> Self {
        Self {
            name: "HEAD".to_string(),
            hash,
        }
    }

    pub fn is_detached(&self) -> bool {
        self.name == "HEAD"
    }
}

/// One entry of the append-only operation log (spec.md §6's "log";
/// supplemented reader in SPEC_FULL.md).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub date: DateTime<Utc>,
    pub operation: String,
    pub detail: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commit(hash: &str, parents: Vec<String>) -> Commit {
        Commit {
            hash: hash.to_string(),
            message: String::new(),
            date: Utc::now(),
            root: TreeDir {
                path: String::new(),
                children: Vec::new(),
            },
            parents,
            tags: Vec::new(),
            user_data: BTreeMap::new(),
        }
    }

    #[test]
    fn is_ancestor_of_walks_first_parent_chain() {
        let root = commit("a", vec![]);
        let middle = commit("b", vec!["a".to_string()]);
        let tip = commit("c", vec!["b".to_string()]);
        let mut commits = IndexMap::new();
        commits.insert(root.hash.clone(), root.clone());
        commits.insert(middle.hash.clone(), middle.clone());
        commits.insert(tip.hash.clone(), tip.clone());

        assert!(root.is_ancestor_of(&tip, &commits));
        assert!(!tip.is_ancestor_of(&root, &commits));
        assert!(tip.is_ancestor_of(&tip, &commits));
    }
}
