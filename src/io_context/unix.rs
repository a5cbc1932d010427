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


//! macOS and Linux mount enumeration, filesystem classification, copy
//! dispatch and write-lock detection (spec.md §4.D).

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{FileWrittenByAnotherProcess, GlacierError, IoResultExt as _, Result};

use super::{classify_size, portable_copy, run_helper, CopySize, Drive, Filesystem, IoContext};

const SYSTEM_RESERVED_PREFIX: &str = "/System/";

pub struct UnixIoContext {
    pub mountpoints: HashSet<PathBuf>,
    pub mounts: HashMap<PathBuf, Drive>,
}

impl UnixIoContext {
    pub async fn init() -> Result<Self> {
        let (mountpoints, mounts) = tokio::task::spawn_blocking(enumerate_mounts)
            .await
            .map_err(|e| GlacierError::Other(format!("mount enumeration task panicked: {e}")))??;
        Ok(Self { mountpoints, mounts })
    }

    pub async fn copy_file(&self, ctx: &IoContext, src: &Path, dst: &Path) -> Result<()> {
        let same_drive = ctx.are_files_on_same_drive(src, dst);
        let drive = ctx
            .deepest_mountpoint(src)
            .and_then(|mp| ctx.drive_for(&mp).cloned());

        let size = tokio::fs::metadata(src).await.context(src)?.len();

        #[cfg(target_os = "macos")]
        if same_drive && matches!(drive.as_ref().map(|d| d.filesystem), Some(Filesystem::Apfs)) {
            // Small-file reflinks measure higher overhead than a plain copy
            // on APFS; the crossover is empirical, not a filesystem limit.
            return match classify_size(size) {
                CopySize::Small => portable_copy(src.to_path_buf(), dst.to_path_buf()).await,
                CopySize::Large => apfs_clone_copy(src, dst).await,
            };
        }
        let _ = drive;
        portable_copy(src.to_path_buf(), dst.to_path_buf()).await
    }

    pub async fn perform_write_lock_checks(&self, dir: &Path, rel_paths: &[PathBuf]) -> Result<()> {
        let dir = dir.to_path_buf();
        let handles = list_open_file_handles(&dir).await?;
        let rel_set: HashSet<&PathBuf> = rel_paths.iter().collect();
        let mut errors = Vec::new();
        for handle in handles {
            let Ok(rel) = handle.filepath.strip_prefix(&dir) else {
                tracing::debug!(path = %handle.filepath.display(), "open-files record outside scanned dir, skipping");
                continue;
            };
            let rel = rel.to_path_buf();
            if !rel_set.contains(&rel) {
                continue;
            }
            if matches!(handle.lock_type.as_str(), "W" | "w" | "u") {
                errors.push(FileWrittenByAnotherProcess {
                    path: handle.filepath.clone(),
                    process_name: Some(handle.processname.clone()),
                });
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(GlacierError::WriteLockViolation { errors })
        }
    }

    pub async fn put_to_trash(&self, path: &Path) -> Result<()> {
        let helper = super::find_helper("trash")?;
        run_helper(&helper, &[&path.to_string_lossy()]).await?;
        Ok(())
    }
}

#[cfg(target_os = "macos")]
async fn apfs_clone_copy(src: &Path, dst: &Path) -> Result<()> {
    let output = tokio::process::Command::new("cp")
        .arg("-c")
        .arg(src)
        .arg(dst)
        .output()
        .await
        .context(Path::new("cp"))?;
    if output.status.success() {
        Ok(())
    } else {
        portable_copy(src.to_path_buf(), dst.to_path_buf()).await
    }
}

fn enumerate_mounts() -> Result<(HashSet<PathBuf>, HashMap<PathBuf, Drive>)> {
    let mut mountpoints = HashSet::new();
    let mut mounts = HashMap::new();

    #[cfg(target_os = "linux")]
    {
        let contents = std::fs::read_to_string("/proc/mounts").context(Path::new("/proc/mounts"))?;
        for line in contents.lines() {
            let mut fields = line.split_whitespace();
            let Some(device) = fields.next() else { continue };
            let Some(mountpoint) = fields.next() else { continue };
            if mountpoint.starts_with(SYSTEM_RESERVED_PREFIX) {
                continue;
            }
            let path = PathBuf::from(mountpoint);
            mountpoints.insert(path.clone());
            mounts.insert(
                path,
                Drive {
                    display_name: device.to_string(),
                    filesystem: Filesystem::Other,
                },
            );
        }
    }

    #[cfg(target_os = "macos")]
    {
        let output = std::process::Command::new("mount")
            .output()
            .context(Path::new("mount"))?;
        let text = String::from_utf8_lossy(&output.stdout);
        for line in text.lines() {
            // Typical line: "/dev/disk1s1 on / (apfs, local, journaled)"
            let Some((device_and_rest, paren)) = line.split_once(" on ") else { continue };
            let device = device_and_rest.trim();
            let Some((mountpoint, options)) = paren.split_once(" (") else { continue };
            if mountpoint.starts_with(SYSTEM_RESERVED_PREFIX) {
                continue;
            }
            let filesystem = if options.to_lowercase().contains("apfs") {
                Filesystem::Apfs
            } else {
                Filesystem::Other
            };
            let path = PathBuf::from(mountpoint);
            mountpoints.insert(path.clone());
            mounts.insert(
                path,
                Drive {
                    display_name: device.to_string(),
                    filesystem,
                },
            );
        }
    }

    Ok((mountpoints, mounts))
}

struct FileHandle {
    #[allow(dead_code)]
    pid: u32,
    processname: String,
    lock_type: String,
    filepath: PathBuf,
}

/// Invokes `lsof` scoped to `dir`, parsing its field-prefixed output
/// (`-F pcLat`: process id, command, login, lock/access mode, file name)
/// into per-file [`FileHandle`]s.
async fn list_open_file_handles(dir: &Path) -> Result<Vec<FileHandle>> {
    let output = tokio::process::Command::new("lsof")
        .arg("-F")
        .arg("pcan")
        .arg("+D")
        .arg(dir)
        .output()
        .await;
    let output = match output {
        Ok(o) => o,
        Err(err) => {
            tracing::debug!(%err, "lsof unavailable, assuming no write locks");
            return Ok(Vec::new());
        }
    };
    let text = String::from_utf8_lossy(&output.stdout);
    Ok(parse_lsof_field_output(&text))
}

fn parse_lsof_field_output(text: &str) -> Vec<FileHandle> {
    let mut handles = Vec::new();
    let mut pid = 0u32;
    let mut command = String::new();
    let mut access = String::new();
    for line in text.lines() {
        let Some((tag, rest)) = line.split_at_checked(1) else { continue };
        match tag {
            "p" => pid = rest.parse().unwrap_or(0),
            "c" => command = rest.to_string(),
            "a" => access = rest.to_string(),
            "n" => handles.push(FileHandle {
                pid,
                processname: command.clone(),
                lock_type: access.clone(),
                filepath: PathBuf::from(rest),
            }),
            _ => {}
        }
    }
    handles
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_lsof_field_output() {
        let text = "p1234\ncbash\naw\nn/tmp/example/file.bin\n";
        let handles = parse_lsof_field_output(text);
        assert_eq!(handles.len(), 1);
        assert_eq!(handles[0].pid, 1234);
        assert_eq!(handles[0].processname, "bash");
        assert_eq!(handles[0].filepath, PathBuf::from("/tmp/example/file.bin"));
    }
}
