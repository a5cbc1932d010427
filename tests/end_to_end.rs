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


//! End-to-end scenarios mirroring the documented invariants: init/open,
//! a large all-zero file's block hashing, modify + status, checkout
//! restore, branch create/checkout/trash round-trip, and `HEAD~N`
//! resolution.

use std::path::Path;

use sha2::Digest as _;

use glacier::status::{ResetFlags, StatusFilter, StatusFlags};
use glacier::{CheckoutTarget, Commit, CommitOptions, InitOptions, Repository};

async fn init_repo(dir: &Path) -> Repository {
    Repository::init_ext(dir, InitOptions::default()).await.unwrap()
}

fn write_file(dir: &Path, relpath: &str, bytes: &[u8]) {
    let path = dir.join(relpath);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, bytes).unwrap();
}

#[tokio::test]
async fn init_then_open_round_trips_created_project_commit() {
    let dir = tempfile::tempdir().unwrap();
    {
        let repo = init_repo(dir.path()).await;
        assert_eq!(repo.commit_count(), 1);
        assert_eq!(repo.head_commit().unwrap().message, "Created Project");
        assert_eq!(repo.head().name, "Main");
    }

    let reopened = Repository::open(dir.path()).await.unwrap();
    assert_eq!(reopened.commit_count(), 1);
    assert_eq!(reopened.head_commit().unwrap().message, "Created Project");
    assert_eq!(reopened.head().name, "Main");

    let main_ref = reopened.resolve_reference("Main").unwrap();
    assert_eq!(main_ref.hash, reopened.head().hash.clone().unwrap());
}

#[tokio::test]
async fn fifty_megabyte_zero_file_commits_with_one_block() {
    let dir = tempfile::tempdir().unwrap();
    let mut repo = init_repo(dir.path()).await;

    let size = 50_000_000usize;
    write_file(dir.path(), "zero.bin", &vec![0u8; size]);

    let mut index = repo.load_index("");
    index.add("zero.bin").unwrap();
    repo.create_commit(&mut index, "z", CommitOptions::default(), None, None)
        .await
        .unwrap();

    drop(repo);
    let reopened = Repository::open(dir.path()).await.unwrap();
    let commit: Commit = reopened
        .find_commit_by_reference_name(glacier::ReferenceType::Branch, "Main")
        .unwrap();
    let files = commit.root.flatten_files();
    let zero = files.get("zero.bin").expect("zero.bin tracked in commit");
    assert_eq!(zero.size, size as u64);

    let expected_block = hex::encode(sha2::Sha256::digest(vec![0u8; size]));
    let folded = hex::encode(sha2::Sha256::digest(expected_block.as_bytes()));
    assert_eq!(zero.hash, folded);
}

#[tokio::test]
async fn overwriting_tracked_file_reports_modified_status() {
    let dir = tempfile::tempdir().unwrap();
    let mut repo = init_repo(dir.path()).await;

    let size = 50_000_000usize;
    write_file(dir.path(), "zero.bin", &vec![0u8; size]);
    let mut index = repo.load_index("");
    index.add("zero.bin").unwrap();
    repo.create_commit(&mut index, "z", CommitOptions::default(), None, None)
        .await
        .unwrap();

    write_file(dir.path(), "zero.bin", &vec![0xFFu8; size]);

    let filter = StatusFilter::INCLUDE_UNTRACKED | StatusFilter::INCLUDE_UNMODIFIED;
    let entries = repo.get_status(filter, None).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].path, "zero.bin");
    assert_eq!(entries[0].status, StatusFlags::WT_MODIFIED);
}

#[tokio::test]
async fn checkout_restores_overwritten_file_to_committed_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let mut repo = init_repo(dir.path()).await;

    let size = 1_000_000usize;
    write_file(dir.path(), "zero.bin", &vec![0u8; size]);
    let mut index = repo.load_index("");
    index.add("zero.bin").unwrap();
    repo.create_commit(&mut index, "z", CommitOptions::default(), None, None)
        .await
        .unwrap();

    write_file(dir.path(), "zero.bin", &vec![0xFFu8; size]);

    repo.checkout(
        CheckoutTarget::ReferenceName("Main".to_string()),
        ResetFlags::default_reset(),
    )
    .await
    .unwrap();

    let restored = std::fs::read(dir.path().join("zero.bin")).unwrap();
    assert_eq!(restored, vec![0u8; size]);

    let filter = StatusFilter::INCLUDE_UNTRACKED | StatusFilter::INCLUDE_UNMODIFIED;
    let entries = repo.get_status(filter, None).await.unwrap();
    assert!(entries.iter().all(|e| e.status == StatusFlags::UNMODIFIED));
}

#[tokio::test]
async fn head_n_resolves_ancestors_and_reports_out_of_history() {
    let dir = tempfile::tempdir().unwrap();
    let mut repo = init_repo(dir.path()).await;

    write_file(dir.path(), "a.txt", b"hi");
    let mut index = repo.load_index("");
    index.add("a.txt").unwrap();
    repo.create_commit(&mut index, "second", CommitOptions::default(), None, None)
        .await
        .unwrap();

    let first = repo.find_commit_by_hash("HEAD~1").unwrap();
    assert_eq!(first.message, "Created Project");

    let out_of_history = repo.find_commit_by_hash("HEAD~2");
    assert!(matches!(
        out_of_history,
        Err(glacier::GlacierError::OutOfHistory)
    ));

    let malformed = repo.find_commit_by_hash("HEAD~x");
    assert!(matches!(
        malformed,
        Err(glacier::GlacierError::InvalidHashSyntax(_))
    ));

    assert!(repo.is_ancestor(&first.hash, &repo.head().hash.clone().unwrap()));
    assert!(!repo.is_ancestor(&repo.head().hash.clone().unwrap(), &first.hash));
}

/// Covers branch creation and the checked-out-ref delete guard. The
/// checkout-triggered trash/restore round trip itself (spec.md §8 scenario
/// 5) is covered separately in `tests/helper_discovery.rs`, where a fake
/// trash helper can stand in for the real platform one.
#[tokio::test]
async fn branch_create_commit_and_delete_guard() {
    let dir = tempfile::tempdir().unwrap();
    let mut repo = init_repo(dir.path()).await;

    let head_hash = repo.head().hash.clone().unwrap();
    repo.create_new_reference(
        glacier::ReferenceType::Branch,
        "feat",
        &head_hash,
        None,
    )
    .unwrap();

    repo.set_head("feat").unwrap();
    write_file(dir.path(), "a.txt", b"hi");
    let mut index = repo.load_index("");
    index.add("a.txt").unwrap();
    repo.create_commit(&mut index, "on feat", CommitOptions::default(), None, None)
        .await
        .unwrap();

    let main_commit = repo.find_commit_by_reference_name(glacier::ReferenceType::Branch, "Main").unwrap();
    assert!(!main_commit.root.flatten_files().contains_key("a.txt"));

    let delete_failure = repo.delete_reference("feat");
    assert!(matches!(
        delete_failure,
        Err(glacier::GlacierError::CannotDeleteCheckedOutRef(_))
    ));
}

#[tokio::test]
async fn empty_working_tree_commits_with_allow_empty() {
    let dir = tempfile::tempdir().unwrap();
    let mut repo = init_repo(dir.path()).await;
    let mut index = repo.load_index("");
    let result = repo
        .create_commit(&mut index, "noop", CommitOptions { allow_empty: true }, None, None)
        .await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn create_commit_without_changes_fails_nothing_to_commit() {
    let dir = tempfile::tempdir().unwrap();
    let mut repo = init_repo(dir.path()).await;
    let mut index = repo.load_index("");
    let result = repo
        .create_commit(&mut index, "noop", CommitOptions::default(), None, None)
        .await;
    assert!(matches!(result, Err(glacier::GlacierError::NothingToCommit)));
}

#[tokio::test]
async fn ignore_negation_overrides_builtin_log_pattern() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), ".snowignore", b"!*.log\n");
    let repo = init_repo(dir.path()).await;

    write_file(dir.path(), "app.log", b"not ignored here");
    let entries = repo
        .get_status(StatusFilter::INCLUDE_UNTRACKED, None)
        .await
        .unwrap();
    assert!(entries.iter().any(|e| e.path == "app.log" && e.status == StatusFlags::WT_NEW));
}
