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


//! Discovery and invocation of bundled helper executables (spec.md §6, §4.D
//! `putToTrash`).
//!
//! Search order: `<executable-dir>/resources/<name>`, then
//! `<module-root>/resources/<name>`. A process-wide override can replace the
//! search entirely, guarded by a one-shot [`OnceCell`] per spec.md §9's
//! "single optional value guarded by a one-shot setter" — prefer threading
//! the override through construction; this exists for callers that can't.

use std::path::{Path, PathBuf};
use std::process::Output;

use once_cell::sync::OnceCell;

use crate::error::{GlacierError, IoResultExt as _, Result};

static TRASH_EXEC_OVERRIDE: OnceCell<PathBuf> = OnceCell::new();

/// Overrides the path used to locate the `trash`/`recycle-bin.exe` helper.
/// May be called at most once per process; subsequent calls are no-ops.
pub fn set_trash_executable_override(path: impl Into<PathBuf>) {
    let _ = TRASH_EXEC_OVERRIDE.set(path.into());
}

/// Locates a bundled helper executable by name.
pub fn find_helper(name: &str) -> Result<PathBuf> {
    if name == "trash" || name == "recycle-bin.exe" {
        if let Some(path) = TRASH_EXEC_OVERRIDE.get() {
            if path.is_file() {
                return Ok(path.clone());
            }
        }
    }

    let candidates = candidate_roots()
        .into_iter()
        .map(|root| root.join("resources").join(name));
    for candidate in candidates {
        if candidate.is_file() {
            return Ok(candidate);
        }
    }
    Err(GlacierError::HelperNotFound(name.to_string()))
}

fn candidate_roots() -> Vec<PathBuf> {
    let mut roots = Vec::new();
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            roots.push(dir.to_path_buf());
        }
    }
    #[cfg(windows)]
    roots.extend(registry_search_root());
    roots.push(module_root());
    roots
}

fn module_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
}

/// Reads an extra helper search root from the registry, consulted only when
/// the executable-relative and module-relative roots above don't have it and
/// no explicit override was set via [`set_trash_executable_override`].
#[cfg(windows)]
fn registry_search_root() -> Option<PathBuf> {
    use winreg::enums::HKEY_CURRENT_USER;
    use winreg::RegKey;

    let hkcu = RegKey::predef(HKEY_CURRENT_USER);
    let key = hkcu.open_subkey(r"Software\Glacier").ok()?;
    let root: String = key.get_value("ResourcesRoot").ok()?;
    Some(PathBuf::from(root))
}

/// Runs `program` with `args`, logging the invocation at `debug` and mapping
/// a non-zero exit code to [`GlacierError::HelperExitNonZero`].
#[tracing::instrument(skip(args))]
pub async fn run_helper(program: &Path, args: &[&str]) -> Result<Output> {
    tracing::debug!(program = %program.display(), ?args, "running helper");
    let output = tokio::process::Command::new(program)
        .args(args)
        .output()
        .await
        .context(program)?;
    if !output.status.success() {
        return Err(GlacierError::HelperExitNonZero {
            code: output.status.code().unwrap_or(-1),
            stderr: Some(String::from_utf8_lossy(&output.stderr).into_owned()),
        });
    }
    Ok(output)
}
