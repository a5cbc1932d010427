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


//! Commit graph, references, HEAD, and the checkout/status/commit
//! algorithms (spec.md §4.G — the largest component in the system).
//!
//! The commit graph, reference table, and HEAD together form the cyclic
//! structure spec.md §9 calls out ("Repository <-> Reference <-> Commit").
//! This crate sidesteps it the way spec.md's design note suggests, just
//! without needing an explicit arena type: every link (`Reference::hash`,
//! `Commit::parents`, `Head::hash`) is a content-derived `String` hash, not
//! an object reference, so there is no ownership cycle to break in the
//! first place. `commits` is an [`indexmap::IndexMap`] keyed by that hash,
//! which is simultaneously the ordered `commits[]` list and the
//! `commitMap` spec.md's invariant 1 requires stay in lockstep — they are
//! the same structure here, so the invariant holds by construction.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use indexmap::IndexMap;
use serde_json::Value;

use crate::commit::{Commit, Head, LogEntry, Reference, ReferenceType};
use crate::error::{GlacierError, IoResultExt as _, Result};
use crate::ignore::IgnoreMatcher;
use crate::index::Index;
use crate::io_context::IoContext;
use crate::lock::FileLock;
use crate::object_store::{FileObjectStore, ObjectStore};
use crate::status::{ResetFlags, StatusEntry, StatusFilter, StatusFlags};
use crate::tree::{build_tree_dir, list_tracked_files, walk_dir, FileInfo, TreeDir, TreeFile};

const SNOW_ENTRY: &str = ".snow";
const LOCK_TIMEOUT: Duration = Duration::from_secs(30);

/// Options controlling [`Repository::init_ext`].
#[derive(Debug, Clone, Default)]
pub struct InitOptions {
    /// An external commondir. Must not be a prefix of the workdir (spec.md
    /// §4.G step 1).
    pub commondir: Option<PathBuf>,
}

/// Options controlling [`Repository::create_commit`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CommitOptions {
    pub allow_empty: bool,
}

/// How to resolve the target of a [`Repository::checkout`].
#[derive(Debug, Clone)]
pub enum CheckoutTarget {
    ReferenceName(String),
    Hash(String),
    Reference(Reference),
    Commit(Commit),
}

/// Holds the commit graph, references, HEAD, and known indexes for one
/// repository.
pub struct Repository {
    workdir: PathBuf,
    commondir: PathBuf,
    store: Arc<dyn ObjectStore>,
    ioctx: Arc<IoContext>,
    ignore: IgnoreMatcher,
    commits: IndexMap<String, Commit>,
    references: IndexMap<String, Reference>,
    head: Head,
    indexes: BTreeMap<String, Index>,
}

impl Repository {
    /// Initializes a brand new repository at `workdir`.
    #[tracing::instrument(skip(opts))]
    pub async fn init_ext(workdir: &Path, opts: InitOptions) -> Result<Self> {
        if let Some(commondir) = &opts.commondir {
            if commondir.starts_with(workdir) {
                return Err(GlacierError::InvalidCommondir(
                    "commondir must not be inside the working directory".to_string(),
                ));
            }
        }

        tokio::fs::create_dir_all(workdir).await.context(workdir)?;

        let commondir = match &opts.commondir {
            Some(external) => {
                tokio::fs::create_dir_all(external).await.context(external)?;
                let snow_marker = workdir.join(SNOW_ENTRY);
                let absolute = dunce::canonicalize(external)
                    .unwrap_or_else(|_| external.clone());
                tokio::fs::write(&snow_marker, absolute.to_string_lossy().as_bytes())
                    .await
                    .context(&snow_marker)?;
                external.clone()
            }
            None => workdir.join(SNOW_ENTRY),
        };

        let store: Arc<dyn ObjectStore> = Arc::new(FileObjectStore::create(&commondir)?);
        let ioctx = Arc::new(IoContext::init().await?);

        let mut repo = Self {
            workdir: workdir.to_path_buf(),
            commondir,
            store,
            ioctx,
            ignore: IgnoreMatcher::new()?,
            commits: IndexMap::new(),
            references: IndexMap::new(),
            head: Head::detached(None),
            indexes: BTreeMap::new(),
        };
        repo.load_user_ignore_file();

        let mut main_index = Index::main();
        repo.create_commit(
            &mut main_index,
            "Created Project",
            CommitOptions { allow_empty: true },
            None,
            None,
        )
        .await?;

        Ok(repo)
    }

    /// Opens an existing repository by walking up from `workdir` to find a
    /// `.snow` entry.
    #[tracing::instrument]
    pub async fn open(workdir: &Path) -> Result<Self> {
        let found_at = find_snow_entry(workdir)
            .ok_or_else(|| GlacierError::NotARepository(workdir.to_path_buf()))?;
        let snow_path = found_at.join(SNOW_ENTRY);

        let commondir = if snow_path.is_file() {
            let contents = tokio::fs::read_to_string(&snow_path)
                .await
                .context(&snow_path)?;
            PathBuf::from(contents.trim())
        } else {
            snow_path.clone()
        };

        if !commondir.is_dir() {
            return Err(GlacierError::InvalidCommondir(format!(
                "{} is not a directory",
                commondir.display()
            )));
        }

        let store: Arc<dyn ObjectStore> = Arc::new(FileObjectStore::open(&commondir)?);
        let ioctx = Arc::new(IoContext::init().await?);

        let mut commits_vec = store.read_commits()?;
        commits_vec.sort_by_key(|c| c.date);
        let mut commits = IndexMap::new();
        for commit in commits_vec {
            commits.insert(commit.hash.clone(), commit);
        }

        let mut references = IndexMap::new();
        for reference in store.read_references()? {
            references.insert(reference.name.clone(), reference);
        }

        let head_value = store.read_head_reference()?;
        let head = match head_value {
            Some(value) => {
                if let Some(reference) = references.get(&value) {
                    Head {
                        name: reference.name.clone(),
                        hash: Some(reference.hash.clone()),
                    }
                } else {
                    Head::detached(Some(value))
                }
            }
            None => {
                if let Some((_, first)) = references.first() {
                    Head {
                        name: first.name.clone(),
                        hash: Some(first.hash.clone()),
                    }
                } else {
                    return Err(GlacierError::NoHead);
                }
            }
        };

        let mut indexes = BTreeMap::new();
        for index in store.read_all_indexes()? {
            indexes.insert(index.id.clone(), index);
        }

        let mut repo = Self {
            workdir: workdir.to_path_buf(),
            commondir,
            store,
            ioctx,
            ignore: IgnoreMatcher::new()?,
            commits,
            references,
            head,
            indexes,
        };
        repo.load_user_ignore_file();
        Ok(repo)
    }

    fn load_user_ignore_file(&mut self) {
        let ignore_path = self.workdir.join(".snowignore");
        if ignore_path.is_file() {
            if let Err(err) = self.ignore.load_file(&ignore_path) {
                tracing::warn!(%err, "failed to load .snowignore");
            }
        }
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    pub fn commondir(&self) -> &Path {
        &self.commondir
    }

    pub fn head(&self) -> &Head {
        &self.head
    }

    pub fn commit_count(&self) -> usize {
        self.commits.len()
    }

    pub fn head_commit(&self) -> Option<&Commit> {
        self.head.hash.as_ref().and_then(|h| self.commits.get(h))
    }

    /// Returns a copy of the named index (the main index if `id` is empty),
    /// creating a fresh one if none has been persisted yet. Callers mutate
    /// their copy and pass it to [`Self::create_commit`], which re-caches it
    /// on success — this keeps the index's lifetime independent of
    /// `Repository`'s own borrow, since `createCommit` needs `&mut self` and
    /// `&mut Index` simultaneously.
    pub fn load_index(&self, id: &str) -> Index {
        self.indexes.get(id).cloned().unwrap_or_else(|| {
            if id.is_empty() {
                Index::main()
            } else {
                Index::create_ext()
            }
        })
    }

    /// Returns the repository's append-only operation log.
    pub fn log(&self) -> Result<Vec<LogEntry>> {
        self.store.read_log()
    }

    async fn acquire_lock(&self) -> Result<FileLock> {
        let lock_path = self.commondir.join("repo.lock");
        Ok(FileLock::lock(lock_path, LOCK_TIMEOUT).await?)
    }

    fn append_log(&self, operation: &str, detail: impl Into<String>) -> Result<()> {
        self.store.append_log(&LogEntry {
            date: Utc::now(),
            operation: operation.to_string(),
            detail: detail.into(),
        })
    }

    /// Builds a new commit from `index`'s accumulated intents (spec.md §4.G
    /// `createCommit`).
    #[tracing::instrument(skip(self, index, tags, user_data))]
    pub async fn create_commit(
        &mut self,
        index: &mut Index,
        message: &str,
        opts: CommitOptions,
        tags: Option<Vec<String>>,
        user_data: Option<BTreeMap<String, Value>>,
    ) -> Result<Commit> {
        let _lock = self.acquire_lock().await?;

        if !opts.allow_empty && index.add_rel_paths.is_empty() && index.delete_rel_paths.is_empty() {
            return Err(GlacierError::NothingToCommit);
        }

        index.write_files(&self.workdir, &self.store, &self.ioctx).await?;

        let mut processed_map: BTreeMap<String, FileInfo> = index.processed_map.clone();
        if let Some(head_commit) = self.head_commit() {
            for (path, file) in head_commit.root.flatten_files() {
                processed_map.entry(path).or_insert_with(|| file_info_from_tree_file(&file));
            }
        }

        let mut root: TreeDir = build_tree_dir(&processed_map);
        for relpath in &index.delete_rel_paths {
            root.remove_path(relpath);
        }

        index.invalidate(self.store.as_ref())?;
        self.indexes.insert(index.id.clone(), index.clone());

        let date = Utc::now();
        let parents: Vec<String> = self
            .head
            .hash
            .clone()
            .into_iter()
            .collect();
        let hash = Commit::compute_hash(message, &date, &root, &parents);
        let commit = Commit {
            hash: hash.clone(),
            message: message.to_string(),
            date,
            root,
            parents,
            tags: tags.unwrap_or_default(),
            user_data: user_data.unwrap_or_default(),
        };

        let is_first_commit = self.commits.is_empty();
        self.commits.insert(commit.hash.clone(), commit.clone());

        let advanced_ref = if is_first_commit {
            let main_ref = Reference {
                reference_type: ReferenceType::Branch,
                name: "Main".to_string(),
                hash: commit.hash.clone(),
                start: commit.hash.clone(),
                user_data: BTreeMap::new(),
            };
            self.references.insert(main_ref.name.clone(), main_ref.clone());
            self.head = Head {
                name: main_ref.name.clone(),
                hash: Some(commit.hash.clone()),
            };
            Some(main_ref)
        } else if !self.head.is_detached() {
            let name = self.head.name.clone();
            if let Some(reference) = self.references.get_mut(&name) {
                reference.hash = commit.hash.clone();
            }
            self.head.hash = Some(commit.hash.clone());
            self.references.get(&name).cloned()
        } else {
            self.head.hash = Some(commit.hash.clone());
            None
        };

        self.store.write_commit(&commit)?;
        self.store.write_head_reference(&self.head)?;
        if let Some(reference) = &advanced_ref {
            self.store.write_reference(reference)?;
        }
        self.append_log("commit", format!("{} {}", commit.hash, commit.message))?;

        Ok(commit)
    }

    /// Resolves `HEAD~N~M~…` ancestor expressions or a literal commit hash.
    pub fn find_commit_by_hash(&self, expr: &str) -> Result<Commit> {
        if let Some(rest) = expr.strip_prefix("HEAD") {
            let mut current = self
                .head_commit()
                .cloned()
                .ok_or(GlacierError::NoHead)?;
            if rest.is_empty() {
                return Ok(current);
            }
            for segment in rest.split('~').skip(1) {
                let steps: usize = segment
                    .parse()
                    .map_err(|_| GlacierError::InvalidHashSyntax(expr.to_string()))?;
                for _ in 0..steps {
                    let parent_hash = current
                        .parents
                        .first()
                        .ok_or(GlacierError::OutOfHistory)?
                        .clone();
                    current = self
                        .commits
                        .get(&parent_hash)
                        .cloned()
                        .ok_or(GlacierError::OutOfHistory)?;
                }
            }
            return Ok(current);
        }
        self.commits
            .get(expr)
            .cloned()
            .ok_or_else(|| GlacierError::UnknownTarget(expr.to_string()))
    }

    /// Returns the named reference itself, distinct from
    /// [`Self::find_commit_by_reference_name`] which resolves straight
    /// through to the commit it points at.
    pub fn resolve_reference(&self, name: &str) -> Result<Reference> {
        self.references
            .get(name)
            .cloned()
            .ok_or_else(|| GlacierError::RefNotFound(name.to_string()))
    }

    /// Looks up the commit a named reference currently points at.
    pub fn find_commit_by_reference_name(
        &self,
        _reference_type: ReferenceType,
        name: &str,
    ) -> Result<Commit> {
        let reference = self
            .references
            .get(name)
            .ok_or_else(|| GlacierError::RefNotFound(name.to_string()))?;
        self.commits
            .get(&reference.hash)
            .cloned()
            .ok_or_else(|| GlacierError::UnknownTarget(reference.hash.clone()))
    }

    fn references_pointing_at(&self, hash: &str) -> Vec<&Reference> {
        self.references.values().filter(|r| r.hash == hash).collect()
    }

    fn resolve_target(&self, target: &CheckoutTarget) -> Result<(Commit, Option<Reference>)> {
        match target {
            CheckoutTarget::ReferenceName(name) => {
                let reference = self
                    .references
                    .get(name)
                    .ok_or_else(|| GlacierError::UnknownTarget(name.clone()))?;
                let commit = self
                    .commits
                    .get(&reference.hash)
                    .cloned()
                    .ok_or_else(|| GlacierError::UnknownTarget(reference.hash.clone()))?;
                Ok((commit, Some(reference.clone())))
            }
            CheckoutTarget::Hash(hash) => {
                let commit = self.find_commit_by_hash(hash)?;
                let matches = self.references_pointing_at(&commit.hash);
                let target_ref = match matches.as_slice() {
                    [single] => Some((*single).clone()),
                    _ => None,
                };
                Ok((commit, target_ref))
            }
            CheckoutTarget::Reference(reference) => {
                let commit = self
                    .commits
                    .get(&reference.hash)
                    .cloned()
                    .ok_or_else(|| GlacierError::UnknownTarget(reference.hash.clone()))?;
                Ok((commit, Some(reference.clone())))
            }
            CheckoutTarget::Commit(commit) => {
                let matches = self.references_pointing_at(&commit.hash);
                let target_ref = match matches.as_slice() {
                    [single] => Some((*single).clone()),
                    _ => None,
                };
                Ok((commit.clone(), target_ref))
            }
        }
    }

    /// Reconciles the working tree with `target` (spec.md §4.G `checkout`).
    #[tracing::instrument(skip(self, target))]
    pub async fn checkout(&mut self, target: CheckoutTarget, reset: ResetFlags) -> Result<()> {
        let _lock = self.acquire_lock().await?;

        let (target_commit, target_ref) = self.resolve_target(&target)?;

        let current_files: std::collections::BTreeSet<String> =
            list_tracked_files(&self.workdir, &self.ignore)?.into_iter().collect();
        let old_files = target_commit.root.flatten_files();

        self.head = Head {
            name: if reset.contains(ResetFlags::DETACH) || target_ref.is_none() {
                "HEAD".to_string()
            } else {
                target_ref.as_ref().unwrap().name.clone()
            },
            hash: Some(target_commit.hash.clone()),
        };
        self.store.write_head_reference(&self.head)?;

        if reset.contains(ResetFlags::DELETE_NEW_FILES) {
            for relpath in current_files.iter().filter(|p| !old_files.contains_key(*p)) {
                let abs = self.workdir.join(relpath);
                self.ioctx.put_to_trash(&abs).await?;
            }
        }

        if reset.contains(ResetFlags::RESTORE_DELETED_FILES) {
            for (relpath, file) in old_files.iter().filter(|(p, _)| !current_files.contains(*p)) {
                let abs = self.workdir.join(relpath);
                self.store.read_blob(&file.hash, &abs, &self.ioctx).await?;
            }
        }

        if reset.contains(ResetFlags::DELETE_MODIFIED_FILES) {
            for relpath in current_files.intersection(&old_files.keys().cloned().collect()) {
                let file = &old_files[relpath];
                let abs = self.workdir.join(relpath);
                if file.is_file_modified(&abs).await? {
                    self.store.read_blob(&file.hash, &abs, &self.ioctx).await?;
                }
            }
        }

        self.append_log("checkout", target_commit.hash.clone())?;
        Ok(())
    }

    /// Diffs the working tree against `commit` (or HEAD) (spec.md §4.G
    /// `getStatus`).
    pub async fn get_status(
        &self,
        filter: StatusFilter,
        commit: Option<&Commit>,
    ) -> Result<Vec<StatusEntry>> {
        let base_commit = match commit {
            Some(c) => c.clone(),
            None => self.head_commit().cloned().ok_or(GlacierError::NoHead)?,
        };
        let old_files = base_commit.root.flatten_files();

        let all_paths = walk_dir(&self.workdir)?;
        let mut current_files = std::collections::BTreeSet::new();
        for path in &all_paths {
            current_files.insert(crate::path_util::to_slash(path));
        }

        let mut entries = Vec::new();

        if filter.contains(StatusFilter::INCLUDE_UNTRACKED) {
            for relpath in current_files.iter().filter(|p| !old_files.contains_key(*p)) {
                if self.ignore.ignored(relpath) && !filter.contains(StatusFilter::INCLUDE_IGNORED) {
                    continue;
                }
                let status = if self.ignore.ignored(relpath) {
                    StatusFlags::IGNORED
                } else {
                    StatusFlags::WT_NEW
                };
                entries.push(StatusEntry {
                    path: relpath.clone(),
                    status,
                    is_dir: false,
                });
            }
        }

        for relpath in old_files.keys().filter(|p| !current_files.contains(*p)) {
            if self.ignore.ignored(relpath) {
                continue;
            }
            entries.push(StatusEntry {
                path: relpath.clone(),
                status: StatusFlags::WT_DELETED,
                is_dir: false,
            });
        }

        for relpath in current_files.intersection(&old_files.keys().cloned().collect()) {
            if self.ignore.ignored(relpath) {
                continue;
            }
            let file = &old_files[relpath];
            let abs = self.workdir.join(relpath);
            let modified = file.is_file_modified(&abs).await?;
            if modified {
                entries.push(StatusEntry {
                    path: relpath.clone(),
                    status: StatusFlags::WT_MODIFIED,
                    is_dir: false,
                });
            } else if filter.contains(StatusFilter::INCLUDE_UNMODIFIED) {
                entries.push(StatusEntry {
                    path: relpath.clone(),
                    status: StatusFlags::UNMODIFIED,
                    is_dir: false,
                });
            }
        }

        if filter.contains(StatusFilter::INCLUDE_DIRECTORIES) {
            for entry in walkdir::WalkDir::new(&self.workdir).into_iter().flatten() {
                if entry.file_type().is_dir() && entry.path() != self.workdir {
                    if let Ok(rel) = entry.path().strip_prefix(&self.workdir) {
                        let relpath = crate::path_util::to_slash(rel);
                        if !self.ignore.ignored(&relpath) || filter.contains(StatusFilter::INCLUDE_IGNORED) {
                            entries.push(StatusEntry {
                                path: relpath,
                                status: StatusFlags::NONE,
                                is_dir: true,
                            });
                        }
                    }
                }
            }
        }

        Ok(entries)
    }

    /// Creates a new named reference at `start_point` (a literal hash or
    /// `HEAD~N` expression).
    pub fn create_new_reference(
        &mut self,
        reference_type: ReferenceType,
        name: &str,
        start_point: &str,
        user_data: Option<BTreeMap<String, Value>>,
    ) -> Result<Reference> {
        if self.references.contains_key(name) {
            return Err(GlacierError::RefExists(name.to_string()));
        }
        let start_commit = self
            .find_commit_by_hash(start_point)
            .map_err(|_| GlacierError::InvalidStartPoint(start_point.to_string()))?;
        let reference = Reference {
            reference_type,
            name: name.to_string(),
            hash: start_commit.hash.clone(),
            start: start_commit.hash,
            user_data: user_data.unwrap_or_default(),
        };
        self.store.write_reference(&reference)?;
        self.references.insert(name.to_string(), reference.clone());
        Ok(reference)
    }

    /// Deletes a reference; refuses if HEAD is attached to it.
    pub fn delete_reference(&mut self, name: &str) -> Result<()> {
        if self.head.name == name {
            return Err(GlacierError::CannotDeleteCheckedOutRef(name.to_string()));
        }
        let reference = self
            .references
            .shift_remove(name)
            .ok_or_else(|| GlacierError::RefNotFound(name.to_string()))?;
        self.store.delete_reference(&reference)
    }

    /// Attaches HEAD to the named reference.
    pub fn set_head(&mut self, name: &str) -> Result<()> {
        let reference = self
            .references
            .get(name)
            .ok_or_else(|| GlacierError::RefNotFound(name.to_string()))?;
        self.head = Head {
            name: reference.name.clone(),
            hash: Some(reference.hash.clone()),
        };
        self.store.write_head_reference(&self.head)
    }

    /// Detaches HEAD at `hash`.
    pub fn set_head_detached(&mut self, hash: &str) -> Result<()> {
        if !self.commits.contains_key(hash) {
            return Err(GlacierError::UnknownTarget(hash.to_string()));
        }
        self.head = Head::detached(Some(hash.to_string()));
        self.store.write_head_reference(&self.head)
    }

    pub fn references(&self) -> impl Iterator<Item = &Reference> {
        self.references.values()
    }

    /// True iff the commit named `ancestor_hash` lies on `descendant_hash`'s
    /// first-parent chain (or is the same commit).
    pub fn is_ancestor(&self, ancestor_hash: &str, descendant_hash: &str) -> bool {
        let (Some(ancestor), Some(descendant)) = (
            self.commits.get(ancestor_hash),
            self.commits.get(descendant_hash),
        ) else {
            return false;
        };
        ancestor.is_ancestor_of(descendant, &self.commits)
    }
}

fn file_info_from_tree_file(file: &TreeFile) -> FileInfo {
    FileInfo {
        hash: file.hash.clone(),
        size: file.size,
        atime: file.mtime,
        mtime: file.mtime,
        ctime: file.ctime,
    }
}

fn find_snow_entry(start: &Path) -> Option<PathBuf> {
    let mut current = Some(start.to_path_buf());
    while let Some(dir) = current {
        if dir.join(SNOW_ENTRY).exists() {
            return Some(dir);
        }
        current = dir.parent().map(|p| p.to_path_buf());
    }
    None
}
