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


//! Glob-based, negation-aware path filter (spec.md §4.B).
//!
//! Two independent [`globset::GlobSet`]s are compiled: one for patterns that
//! mark a path as ignored, one for `!`-prefixed patterns that re-include a
//! path an ignore pattern matched. This is the glob-based semantics spec.md
//! §9 calls out as "the active one" among two historical implementations.

use std::fs;
use std::path::Path;

use globset::{Glob, GlobBuilder, GlobSet, GlobSetBuilder};

use crate::error::{GlacierError, IoResultExt as _, Result};

/// Patterns matched unconditionally unless overridden by a `!pattern` user
/// pattern (spec.md §4.B).
const BUILTIN_PATTERNS: &[&str] = &[
    "**/.DS_Store",
    "**/thumbs.db",
    "**/.git",
    "**/.git/**",
    "**/.snowignore",
    "**/backup/**",
    "**/*.bkp",
    "**/tmp/**",
    "**/cache/**",
    "**/*.lnk",
    "**/*.log",
    "**/.idea/**",
    "**/.Spotlight-V100",
    "**/*.blend[0-9]+",
    "**/.Trashes",
    "**/desktop.ini",
    "**/*.tmp",
];

/// Decides whether a relative path is ignored.
///
/// Patterns accumulate as raw [`Glob`]s rather than pre-built [`GlobSet`]s,
/// since `GlobSet` itself offers no incremental `add`; the two sets are
/// recompiled at the end of every [`Self::load_str`]/[`Self::load_file`]
/// call, keeping [`Self::ignored`] itself allocation-free.
pub struct IgnoreMatcher {
    ignore_globs: Vec<Glob>,
    include_globs: Vec<Glob>,
    ignore: GlobSet,
    include: GlobSet,
}

impl IgnoreMatcher {
    /// Builds a matcher from the built-in patterns only.
    pub fn new() -> Result<Self> {
        let mut matcher = Self {
            ignore_globs: Vec::new(),
            include_globs: Vec::new(),
            ignore: empty_set(),
            include: empty_set(),
        };
        for pattern in BUILTIN_PATTERNS {
            matcher.ignore_globs.push(compile(pattern).map_err(|e| {
                GlacierError::Other(format!("invalid built-in pattern {pattern:?}: {e}"))
            })?);
        }
        matcher.rebuild()?;
        Ok(matcher)
    }

    /// Appends patterns read from a `.snowignore`-style file at `path`.
    pub fn load_file(&mut self, path: &Path) -> Result<()> {
        let contents = fs::read_to_string(path).context(path)?;
        self.load_str(&contents)
    }

    /// Same as [`Self::load_file`] but from an in-memory string.
    ///
    /// Each non-empty, non-comment line is compiled. A line starting with `!`
    /// is added to the negated "include" set instead (with the `!`
    /// stripped). Every line also gains an implicit `<line>/**` sibling
    /// (trailing `/` stripped first) so files inside a directory-style
    /// pattern match too — `globset` treats a bare `build/` as matching only
    /// the literal path `build/`, never anything under it. `//` line
    /// comments and `/* ... */` block comments are stripped first.
    pub fn load_str(&mut self, contents: &str) -> Result<()> {
        for raw_line in strip_block_comments(contents).lines() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with("//") {
                continue;
            }
            let (negated, pattern) = match line.strip_prefix('!') {
                Some(rest) => (true, rest),
                None => (false, line),
            };
            if pattern.is_empty() {
                continue;
            }
            let trimmed = pattern.trim_end_matches('/');
            let patterns = [trimmed.to_string(), format!("{trimmed}/**")];
            for p in patterns {
                match compile(&p) {
                    Ok(glob) => {
                        if negated {
                            self.include_globs.push(glob);
                        } else {
                            self.ignore_globs.push(glob);
                        }
                    }
                    Err(err) => {
                        tracing::warn!(pattern = %p, %err, "skipping malformed ignore pattern");
                    }
                }
            }
        }
        self.rebuild()
    }

    /// Returns true iff `relpath` (forward-slash, relative to the working
    /// directory) is ignored: matched by an ignore pattern and not
    /// re-included by a negation pattern.
    pub fn ignored(&self, relpath: &str) -> bool {
        self.ignore.is_match(relpath) && !self.include.is_match(relpath)
    }

    fn rebuild(&mut self) -> Result<()> {
        self.ignore = build_set(&self.ignore_globs)?;
        self.include = build_set(&self.include_globs)?;
        Ok(())
    }
}

impl Default for IgnoreMatcher {
    fn default() -> Self {
        Self::new().expect("built-in ignore patterns must compile")
    }
}

fn compile(pattern: &str) -> std::result::Result<Glob, globset::Error> {
    GlobBuilder::new(pattern)
        .case_insensitive(true)
        .literal_separator(false)
        .build()
}

fn build_set(globs: &[Glob]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for glob in globs {
        builder.add(glob.clone());
    }
    builder
        .build()
        .map_err(|e| GlacierError::Other(format!("invalid glob set: {e}")))
}

fn empty_set() -> GlobSet {
    GlobSetBuilder::new().build().expect("empty glob set always compiles")
}

fn strip_block_comments(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '/' && chars.peek() == Some(&'*') {
            chars.next();
            loop {
                match chars.next() {
                    None => break,
                    Some('*') if chars.peek() == Some(&'/') => {
                        chars.next();
                        break;
                    }
                    Some(_) => {}
                }
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_patterns_match() {
        let matcher = IgnoreMatcher::new().unwrap();
        assert!(matcher.ignored("foo/.DS_Store"));
        assert!(matcher.ignored(".git"));
        assert!(matcher.ignored("src/.git/HEAD"));
        assert!(!matcher.ignored("src/main.rs"));
    }

    #[test]
    fn user_pattern_with_implicit_dir_match() {
        let mut matcher = IgnoreMatcher::new().unwrap();
        matcher.load_str("build\n").unwrap();
        assert!(matcher.ignored("build/output.bin"));
    }

    #[test]
    fn negation_overrides_builtin() {
        let mut matcher = IgnoreMatcher::new().unwrap();
        matcher.load_str("!*.log\n").unwrap();
        assert!(!matcher.ignored("app.log"));
    }

    #[test]
    fn line_comments_stripped() {
        let mut matcher = IgnoreMatcher::new().unwrap();
        matcher.load_str("// another\nbuild/\n").unwrap();
        assert!(matcher.ignored("build/x"));
        assert!(!matcher.ignored("// another"));
    }
}
