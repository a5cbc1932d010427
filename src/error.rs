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


//! Crate-wide error type.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::lock::FileLockError;

/// Wraps an I/O failure with the path that caused it.
///
/// Mirrors the convention used throughout this crate: every syscall failure
/// is attributed to the path it was performed on before it is allowed to
/// propagate.
#[derive(Debug, Error)]
#[error("cannot access {path}")]
pub struct PathError {
    pub path: PathBuf,
    #[source]
    pub error: io::Error,
}

pub(crate) trait IoResultExt<T> {
    fn context(self, path: impl Into<PathBuf>) -> Result<T, PathError>;
}

impl<T> IoResultExt<T> for io::Result<T> {
    fn context(self, path: impl Into<PathBuf>) -> Result<T, PathError> {
        self.map_err(|error| PathError {
            path: path.into(),
            error,
        })
    }
}

/// A single write-lock violation: `path` is held open for writing by another
/// process.
#[derive(Debug, Error)]
#[error("{path} is being written by another process{}", process_name.as_deref().map(|n| format!(" ({n})")).unwrap_or_default())]
pub struct FileWrittenByAnotherProcess {
    pub path: PathBuf,
    pub process_name: Option<String>,
}

/// All error kinds surfaced by the core engine (spec.md §7).
#[derive(Debug, Error)]
pub enum GlacierError {
    #[error("not a repository (no .snow found above {0})")]
    NotARepository(PathBuf),

    #[error("repository has no HEAD")]
    NoHead,

    #[error("invalid commondir: {0}")]
    InvalidCommondir(String),

    #[error("nothing to commit")]
    NothingToCommit,

    #[error("a reference named {0:?} already exists")]
    RefExists(String),

    #[error("no reference named {0:?}")]
    RefNotFound(String),

    #[error("cannot delete reference {0:?}: HEAD is attached to it")]
    CannotDeleteCheckedOutRef(String),

    #[error("invalid start point: {0:?} is not a known commit")]
    InvalidStartPoint(String),

    #[error("unknown checkout target: {0:?}")]
    UnknownTarget(String),

    #[error("invalid ancestor expression: {0:?}")]
    InvalidHashSyntax(String),

    #[error("walked past the root commit")]
    OutOfHistory,

    #[error("unsupported platform")]
    UnsupportedPlatform,

    #[error("helper executable not found: {0:?}")]
    HelperNotFound(String),

    #[error("helper exited with code {code}{}", stderr.as_deref().map(|s| format!(": {s}")).unwrap_or_default())]
    HelperExitNonZero {
        code: i32,
        stderr: Option<String>,
    },

    #[error("{} path(s) are being written by another process", errors.len())]
    WriteLockViolation {
        errors: Vec<FileWrittenByAnotherProcess>,
    },

    #[error("index has been invalidated and can no longer be mutated")]
    IndexInvalidated,

    #[error("object {0} not found in store")]
    ObjectNotFound(String),

    #[error(transparent)]
    Io(#[from] PathError),

    #[error(transparent)]
    Lock(#[from] FileLockError),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, GlacierError>;
