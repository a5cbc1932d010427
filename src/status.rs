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


//! Status flags and the status engine (spec.md §4.G `getStatus`, §4.H).
//!
//! A thin orchestrator on top of [`crate::repository::Repository`] that
//! composes the ignore matcher, the directory walk, and per-file
//! modification detection; the code lives here but the entry point is
//! `Repository::get_status`, matching spec.md's description of the status
//! engine as a composition rather than an independent owner of state.

use std::ops::{BitOr, BitOrAssign};

/// Per-entry status bitmask (spec.md §3 `StatusEntry.status`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusFlags(u32);

impl StatusFlags {
    pub const NONE: Self = Self(0);
    pub const WT_NEW: Self = Self(1 << 0);
    pub const WT_MODIFIED: Self = Self(1 << 1);
    pub const WT_DELETED: Self = Self(1 << 2);
    pub const UNMODIFIED: Self = Self(1 << 3);
    pub const IGNORED: Self = Self(1 << 4);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for StatusFlags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for StatusFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Input filter bitmask controlling what [`crate::repository::Repository::get_status`]
/// reports (spec.md §4.G).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusFilter(u32);

impl StatusFilter {
    pub const NONE: Self = Self(0);
    pub const INCLUDE_DIRECTORIES: Self = Self(1 << 0);
    pub const INCLUDE_UNTRACKED: Self = Self(1 << 1);
    pub const INCLUDE_UNMODIFIED: Self = Self(1 << 2);
    pub const INCLUDE_IGNORED: Self = Self(1 << 3);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn default_filter() -> Self {
        Self::INCLUDE_UNTRACKED
    }
}

impl BitOr for StatusFilter {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// One reported entry from `get_status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    pub path: String,
    pub status: StatusFlags,
    pub is_dir: bool,
}

/// Flags controlling `checkout`'s reconciliation algorithm (spec.md §4.G).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetFlags(u32);

impl ResetFlags {
    pub const NONE: Self = Self(0);
    pub const DELETE_MODIFIED_FILES: Self = Self(1 << 0);
    pub const DELETE_NEW_FILES: Self = Self(1 << 1);
    pub const RESTORE_DELETED_FILES: Self = Self(1 << 2);
    pub const DETACH: Self = Self(1 << 3);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// `DELETE_MODIFIED_FILES | DELETE_NEW_FILES | RESTORE_DELETED_FILES`.
    pub fn default_reset() -> Self {
        Self::DELETE_MODIFIED_FILES | Self::DELETE_NEW_FILES | Self::RESTORE_DELETED_FILES
    }
}

impl BitOr for ResetFlags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_reset_is_three_flags() {
        let flags = ResetFlags::default_reset();
        assert!(flags.contains(ResetFlags::DELETE_MODIFIED_FILES));
        assert!(flags.contains(ResetFlags::DELETE_NEW_FILES));
        assert!(flags.contains(ResetFlags::RESTORE_DELETED_FILES));
        assert!(!flags.contains(ResetFlags::DETACH));
    }
}
