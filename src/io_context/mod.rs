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


//! I/O context: mounted-volume discovery, same-drive detection,
//! filesystem-aware copy dispatch, and write-lock detection (spec.md §4.D).
//!
//! Platform dispatch is a closed enum selected once in [`IoContext::init`]
//! and never re-dispatched per call, per spec.md §9's "Platform dispatch"
//! design note.

mod helper;
#[cfg(unix)]
mod unix;
#[cfg(windows)]
mod windows;

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

pub use helper::{find_helper, run_helper, set_trash_executable_override};

use crate::error::Result;

/// Filesystem kind backing a mountpoint, classified per spec.md §4.D.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filesystem {
    Refs,
    Ntfs,
    Fat32,
    Fat16,
    Apfs,
    Other,
}

/// A mounted volume.
#[derive(Debug, Clone)]
pub struct Drive {
    pub display_name: String,
    pub filesystem: Filesystem,
}

/// Mounted-volume inventory and platform-specific copy/lock-check dispatch.
///
/// Read-only after [`IoContext::init`]; safe to share across concurrently
/// running operations (spec.md §5's "shared resources").
pub enum IoContext {
    #[cfg(unix)]
    Unix(unix::UnixIoContext),
    #[cfg(windows)]
    Windows(windows::WindowsIoContext),
}

impl IoContext {
    /// Enumerates connected block devices, building the mountpoint set and
    /// `mountpoint -> Drive` map, filtering system-reserved mountpoints
    /// (macOS `/System/...`).
    #[tracing::instrument]
    pub async fn init() -> Result<Self> {
        #[cfg(unix)]
        {
            Ok(Self::Unix(unix::UnixIoContext::init().await?))
        }
        #[cfg(windows)]
        {
            Ok(Self::Windows(windows::WindowsIoContext::init().await?))
        }
        #[cfg(not(any(unix, windows)))]
        {
            Err(crate::error::GlacierError::UnsupportedPlatform)
        }
    }

    fn mountpoints(&self) -> &HashSet<PathBuf> {
        match self {
            #[cfg(unix)]
            Self::Unix(ctx) => &ctx.mountpoints,
            #[cfg(windows)]
            Self::Windows(ctx) => &ctx.mountpoints,
        }
    }

    fn drive_for(&self, mountpoint: &Path) -> Option<&Drive> {
        match self {
            #[cfg(unix)]
            Self::Unix(ctx) => ctx.mounts.get(mountpoint),
            #[cfg(windows)]
            Self::Windows(ctx) => ctx.mounts.get(mountpoint),
        }
    }

    /// Coarse heuristic: counts the mountpoints that are a prefix of `a` and
    /// of `b`, returning true iff the two counts are equal.
    ///
    /// This also returns true when neither path is under any known
    /// mountpoint, and when both resolve under the same deepest mountpoint;
    /// spec.md §9 leaves the intended semantics for the former case
    /// undocumented, so this crate does not special-case it further.
    pub fn are_files_on_same_drive(&self, a: &Path, b: &Path) -> bool {
        let count_matches = |p: &Path| -> usize {
            self.mountpoints()
                .iter()
                .filter(|mp| p.starts_with(mp))
                .count()
        };
        count_matches(a) == count_matches(b)
    }

    fn deepest_mountpoint(&self, path: &Path) -> Option<PathBuf> {
        self.mountpoints()
            .iter()
            .filter(|mp| path.starts_with(mp))
            .max_by_key(|mp| mp.as_os_str().len())
            .cloned()
    }

    /// Copies `src` to `dst`, choosing a copy-on-write reflink strategy when
    /// both paths are on the same APFS (macOS) or ReFS (Windows) volume, and
    /// falling back to a portable copy elsewhere.
    #[tracing::instrument(skip(self))]
    pub async fn copy_file(&self, src: &Path, dst: &Path) -> Result<()> {
        match self {
            #[cfg(unix)]
            Self::Unix(ctx) => ctx.copy_file(self, src, dst).await,
            #[cfg(windows)]
            Self::Windows(ctx) => ctx.copy_file(self, src, dst).await,
        }
    }

    /// Pre-flight check: does any path in `rel_paths` (relative to `dir`)
    /// appear to be open for writing by another process?
    #[tracing::instrument(skip(self, rel_paths))]
    pub async fn perform_write_lock_checks(&self, dir: &Path, rel_paths: &[PathBuf]) -> Result<()> {
        match self {
            #[cfg(unix)]
            Self::Unix(ctx) => ctx.perform_write_lock_checks(dir, rel_paths).await,
            #[cfg(windows)]
            Self::Windows(ctx) => ctx.perform_write_lock_checks(dir, rel_paths).await,
        }
    }

    /// Moves `path` to the platform recycle bin via a bundled helper
    /// executable.
    #[tracing::instrument(skip(self))]
    pub async fn put_to_trash(&self, path: &Path) -> Result<()> {
        if !path.exists() {
            use crate::error::IoResultExt as _;
            let not_found = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
            return Err(not_found).context(path).map_err(Into::into);
        }
        match self {
            #[cfg(unix)]
            Self::Unix(ctx) => ctx.put_to_trash(path).await,
            #[cfg(windows)]
            Self::Windows(ctx) => ctx.put_to_trash(path).await,
        }
    }
}

/// Shared fallback copy: a best-effort reflink via `reflink_copy`-style
/// syscalls where the platform supports it, transparently falling back to a
/// byte-for-byte copy when the kernel or filesystem rejects the reflink.
pub(crate) async fn portable_copy(src: PathBuf, dst: PathBuf) -> Result<()> {
    use crate::error::IoResultExt as _;
    let src2 = src.clone();
    let dst2 = dst.clone();
    tokio::task::spawn_blocking(move || {
        if reflink_or_plain_copy(&src2, &dst2).is_ok() {
            return Ok(());
        }
        std::fs::copy(&src2, &dst2).map(|_| ()).context(dst2.clone())
    })
    .await
    .map_err(|e| crate::error::GlacierError::Other(format!("copy task panicked: {e}")))?
}

fn reflink_or_plain_copy(src: &Path, dst: &Path) -> std::io::Result<()> {
    #[cfg(target_os = "linux")]
    {
        if let Ok(()) = rustix::fs::ioctl_ficlone(
            &std::fs::File::create(dst)?,
            &std::fs::File::open(src)?,
        ) {
            return Ok(());
        }
    }
    std::fs::copy(src, dst).map(|_| ())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CopySize {
    Small,
    Large,
}

pub(crate) fn classify_size(metadata_len: u64) -> CopySize {
    const ONE_MB: u64 = 1024 * 1024;
    if metadata_len < ONE_MB {
        CopySize::Small
    } else {
        CopySize::Large
    }
}
