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


//! Path normalization shared by every component that emits or consumes
//! relative paths (spec.md §4.A).
//!
//! All paths handled by this crate outside the OS boundary use forward
//! slashes regardless of platform, so that status/checkout output and
//! `TreeFile::path` are portable between a repository created on Windows and
//! one read back on Linux.

use std::path::{Component, Path, PathBuf};

/// Normalizes `path` to forward-slash form: strips a trailing separator
/// (except on a bare root), collapses `.` segments, and maps `""`/`"."` to
/// `""`.
///
/// This does not resolve `..` against the filesystem (no symlink awareness);
/// it only rewrites the textual form, matching spec.md's description of a
/// pure string operation.
pub fn normalize(path: &str) -> String {
    if path.is_empty() || path == "." {
        return String::new();
    }
    let is_absolute = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            _ => parts.push(segment),
        }
    }
    if parts.is_empty() {
        return if is_absolute { "/".to_string() } else { String::new() };
    }
    let joined = parts.join("/");
    if is_absolute {
        format!("/{joined}")
    } else {
        joined
    }
}

/// Joins `base` and `rel` using platform path semantics, then normalizes the
/// result to forward-slash form.
pub fn join(base: &str, rel: &str) -> String {
    if base.is_empty() {
        return normalize(rel);
    }
    if rel.is_empty() {
        return normalize(base);
    }
    normalize(&format!("{base}/{rel}"))
}

/// Returns the normalized parent of `path`, or `""` if `path` has no parent.
pub fn dirname(path: &str) -> String {
    let normalized = normalize(path);
    match normalized.rsplit_once('/') {
        Some((parent, _)) if parent.is_empty() && normalized.starts_with('/') => "/".to_string(),
        Some((parent, _)) => parent.to_string(),
        None => String::new(),
    }
}

/// Turns an absolute OS path into a forward-slash relative path rooted at
/// `base`, normalizing both first.
pub fn relative(base: &Path, target: &Path) -> PathBuf {
    pathdiff(base, target)
}

fn pathdiff(base: &Path, target: &Path) -> PathBuf {
    let mut base_components: Vec<Component> = base.components().collect();
    let mut target_components: Vec<Component> = target.components().collect();
    let mut common = 0;
    while common < base_components.len()
        && common < target_components.len()
        && base_components[common] == target_components[common]
    {
        common += 1;
    }
    base_components.drain(..common);
    target_components.drain(..common);
    let mut result = PathBuf::new();
    for _ in &base_components {
        result.push("..");
    }
    for c in &target_components {
        result.push(c.as_os_str());
    }
    result
}

/// Resolves `path` against `base` if `path` is relative, then canonicalizes
/// the textual form (not the filesystem — no symlink resolution), returning
/// a forward-slash relative path when `path` is already under `base`.
pub fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Converts an OS path to its forward-slash string form without altering
/// which segments are present (no `.`/`..` collapsing beyond what
/// [`normalize`] does).
pub fn to_slash(path: &Path) -> String {
    normalize(&path.to_string_lossy().replace('\\', "/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_empty_and_dot() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("."), "");
    }

    #[test]
    fn normalize_preserves_root() {
        assert_eq!(normalize("/"), "/");
        assert_eq!(normalize("/foo/"), "/foo");
    }

    #[test]
    fn normalize_strips_trailing_separator() {
        assert_eq!(normalize("foo/bar/"), "foo/bar");
        assert_eq!(normalize("foo/bar"), "foo/bar");
    }

    #[test]
    fn normalize_is_idempotent() {
        for p in ["", ".", "/", "/a/b/", "a/./b", "a//b/"] {
            let once = normalize(p);
            let twice = normalize(&once);
            assert_eq!(once, twice, "not idempotent for {p:?}");
        }
    }

    #[test]
    fn normalize_backslashes() {
        assert_eq!(normalize("a\\b\\c"), "a/b/c");
    }

    #[test]
    fn join_basic() {
        assert_eq!(join("a/b", "c"), "a/b/c");
        assert_eq!(join("", "c"), "c");
        assert_eq!(join("a/b", ""), "a/b");
    }

    #[test]
    fn dirname_basic() {
        assert_eq!(dirname("a/b/c"), "a/b");
        assert_eq!(dirname("a"), "");
        assert_eq!(dirname("/a"), "/");
    }
}
