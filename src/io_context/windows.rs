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


//! Windows volume enumeration, filesystem classification, copy dispatch and
//! write-lock detection (spec.md §4.D).

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use same_file::Handle;

use crate::error::{FileWrittenByAnotherProcess, GlacierError, IoResultExt as _, Result};

use super::{classify_size, portable_copy, run_helper, CopySize, Drive, Filesystem, IoContext};

pub struct WindowsIoContext {
    pub mountpoints: HashSet<PathBuf>,
    pub mounts: HashMap<PathBuf, Drive>,
}

impl WindowsIoContext {
    pub async fn init() -> Result<Self> {
        let (mountpoints, mounts) = tokio::task::spawn_blocking(enumerate_drives)
            .await
            .map_err(|e| GlacierError::Other(format!("drive enumeration task panicked: {e}")))??;
        Ok(Self { mountpoints, mounts })
    }

    pub async fn copy_file(&self, ctx: &IoContext, src: &Path, dst: &Path) -> Result<()> {
        let same_drive = ctx.are_files_on_same_drive(src, dst);
        let drive = ctx
            .deepest_mountpoint(src)
            .and_then(|mp| ctx.drive_for(&mp).cloned());

        let size = tokio::fs::metadata(src).await.context(src)?.len();

        if same_drive && matches!(drive.as_ref().map(|d| d.filesystem), Some(Filesystem::Refs)) {
            return match classify_size(size) {
                CopySize::Small => reflink_copy(src, dst).await,
                CopySize::Large => block_clone_copy(src, dst).await,
            };
        }
        portable_copy(src.to_path_buf(), dst.to_path_buf()).await
    }

    pub async fn perform_write_lock_checks(&self, dir: &Path, rel_paths: &[PathBuf]) -> Result<()> {
        // A junction or hardlink can put two different relpaths on the same
        // underlying file; sample each underlying file once, keyed by
        // handle identity rather than path text.
        let mut seen_handles: HashSet<Handle> = HashSet::new();
        let mut sizes_before = HashMap::new();
        for rel in rel_paths {
            let abs = dir.join(rel);
            if let Ok(handle) = Handle::from_path(&abs) {
                if !seen_handles.insert(handle) {
                    continue;
                }
            }
            if let Ok(meta) = tokio::fs::metadata(&abs).await {
                sizes_before.insert(rel.clone(), meta.len());
            }
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
        let mut errors = Vec::new();
        for rel in rel_paths {
            let abs = dir.join(rel);
            if let Ok(meta) = tokio::fs::metadata(&abs).await {
                if sizes_before.get(rel).is_some_and(|before| *before != meta.len()) {
                    errors.push(FileWrittenByAnotherProcess {
                        path: abs,
                        process_name: None,
                    });
                }
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(GlacierError::WriteLockViolation { errors })
        }
    }

    pub async fn put_to_trash(&self, path: &Path) -> Result<()> {
        let helper = super::find_helper("recycle-bin.exe")?;
        run_helper(&helper, &[&path.to_string_lossy()]).await?;
        Ok(())
    }
}

async fn reflink_copy(src: &Path, dst: &Path) -> Result<()> {
    portable_copy(src.to_path_buf(), dst.to_path_buf()).await
}

/// Invokes the bundled `Clone-FileViaBlockClone.ps1` script; falls back to a
/// reflink-style copy if the script resource cannot be located.
async fn block_clone_copy(src: &Path, dst: &Path) -> Result<()> {
    match super::find_helper("Clone-FileViaBlockClone.ps1") {
        Ok(script) => {
            run_helper(
                Path::new("powershell.exe"),
                &[
                    "-NoProfile",
                    "-ExecutionPolicy",
                    "Bypass",
                    "-File",
                    &script.to_string_lossy(),
                    "-Source",
                    &src.to_string_lossy(),
                    "-Destination",
                    &dst.to_string_lossy(),
                ],
            )
            .await?;
            Ok(())
        }
        Err(_) => reflink_copy(src, dst).await,
    }
}

fn enumerate_drives() -> Result<(HashSet<PathBuf>, HashMap<PathBuf, Drive>)> {
    let mut mountpoints = HashSet::new();
    let mut mounts = HashMap::new();
    for letter in b'A'..=b'Z' {
        let root = format!("{}:\\", letter as char);
        let path = PathBuf::from(&root);
        if !path.exists() {
            continue;
        }
        let filesystem = classify_filesystem(&root).unwrap_or(Filesystem::Other);
        mountpoints.insert(path.clone());
        mounts.insert(
            path,
            Drive {
                display_name: root,
                filesystem,
            },
        );
    }
    Ok((mountpoints, mounts))
}

/// Runs `fsutil fsinfo volumeinfo <drive>` and parses the "File System Name"
/// line, mapping it to the closed `Filesystem` set.
fn classify_filesystem(drive_root: &str) -> Option<Filesystem> {
    let output = std::process::Command::new("fsutil")
        .args(["fsinfo", "volumeinfo", drive_root])
        .output()
        .ok()?;
    let text = String::from_utf8_lossy(&output.stdout);
    let line = text.lines().find(|l| l.contains("File System Name"))?;
    let name = line.split(':').nth(1)?.trim().to_uppercase();
    Some(match name.as_str() {
        "REFS" => Filesystem::Refs,
        "NTFS" => Filesystem::Ntfs,
        "FAT32" => Filesystem::Fat32,
        "FAT16" | "FAT" => Filesystem::Fat16,
        _ => Filesystem::Other,
    })
}
