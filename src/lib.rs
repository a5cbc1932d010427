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


//! A content-addressed version control engine purpose-built for large
//! binary asset trees: chunked hashing, a commit/reference/HEAD state
//! machine, checkout/status reconciliation, ignore-pattern filtering, and
//! platform-aware copy/trash/write-lock I/O.

pub mod commit;
pub mod error;
pub mod hash;
pub mod ignore;
pub mod index;
pub mod io_context;
pub mod lock;
pub mod object_store;
pub mod path_util;
pub mod repository;
pub mod status;
pub mod tree;

pub use commit::{Commit, Head, LogEntry, Reference, ReferenceType};
pub use error::{GlacierError, Result};
pub use hash::{FileHash, HashBlock};
pub use ignore::IgnoreMatcher;
pub use index::Index;
pub use io_context::IoContext;
pub use object_store::{FileObjectStore, ObjectStore};
pub use repository::{CheckoutTarget, CommitOptions, InitOptions, Repository};
pub use status::{ResetFlags, StatusEntry, StatusFilter, StatusFlags};
