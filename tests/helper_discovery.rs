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


//! Exercises bundled-helper discovery/invocation (spec.md §6) against the
//! `fake-helper` stand-in, avoiding any dependency on a real platform trash
//! or recycle-bin executable being present in the test environment.

#![cfg(feature = "test-fakes")]

use glacier::io_context::{run_helper, set_trash_executable_override};
use glacier::status::ResetFlags;
use glacier::{CheckoutTarget, CommitOptions, InitOptions, Repository};

#[tokio::test]
async fn override_is_honored_and_deleted_target_disappears() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("doomed.bin");
    std::fs::write(&target, b"gone soon").unwrap();

    set_trash_executable_override(env!("CARGO_BIN_EXE_fake-helper"));

    let helper = glacier::io_context::find_helper("trash").unwrap();
    run_helper(&helper, &[&target.to_string_lossy()]).await.unwrap();

    assert!(!target.exists());
}

#[tokio::test]
async fn nonzero_exit_surfaces_as_helper_exit_non_zero() {
    let helper = std::path::PathBuf::from(env!("CARGO_BIN_EXE_fake-helper"));
    let result = run_helper(&helper, &["--exit-code", "3", "--stderr-message", "boom"]).await;
    assert!(matches!(
        result,
        Err(glacier::GlacierError::HelperExitNonZero { code: 3, .. })
    ));
}

/// Exercises the checkout-triggered trash/restore round trip (spec.md §8
/// scenario 5): a file committed only on `feat` is trashed when switching to
/// `Main` (it looks "new" relative to `Main`'s tree) and restored with its
/// original bytes when switching back to `feat`.
#[tokio::test]
async fn checkout_trashes_new_file_and_restores_it_on_switch_back() {
    set_trash_executable_override(env!("CARGO_BIN_EXE_fake-helper"));

    let dir = tempfile::tempdir().unwrap();
    let mut repo = Repository::init_ext(dir.path(), InitOptions::default()).await.unwrap();

    let head_hash = repo.head().hash.clone().unwrap();
    repo.create_new_reference(glacier::ReferenceType::Branch, "feat", &head_hash, None)
        .unwrap();
    repo.set_head("feat").unwrap();

    let path = dir.path().join("a.txt");
    std::fs::write(&path, b"hi").unwrap();
    let mut index = repo.load_index("");
    index.add("a.txt").unwrap();
    repo.create_commit(&mut index, "on feat", CommitOptions::default(), None, None)
        .await
        .unwrap();

    repo.checkout(
        CheckoutTarget::ReferenceName("Main".to_string()),
        ResetFlags::default_reset(),
    )
    .await
    .unwrap();
    assert!(!path.exists());

    repo.checkout(
        CheckoutTarget::ReferenceName("feat".to_string()),
        ResetFlags::default_reset(),
    )
    .await
    .unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), b"hi");
}
