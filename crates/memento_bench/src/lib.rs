//! Benchmark utilities.

#![warn(missing_docs)]

use memento_core::Entity;
use memento_store::MemoryStore;
use memento_testkit::Memo;
use rand::distributions::Alphanumeric;
use rand::Rng;

/// Generate a random string of `len` alphanumeric characters.
pub fn random_text(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Generate memos with identifiers `0..count` and contents of
/// `contents_len` characters.
pub fn generate_memos(count: usize, contents_len: usize) -> Vec<Memo> {
    (0..count)
        .map(|id| Memo::new(id as i64, random_text(8), random_text(contents_len)))
        .collect()
}

/// Create a memory store holding `memos`.
pub fn seeded_store(memos: &[Memo]) -> MemoryStore {
    MemoryStore::with_rows(memos.iter().map(|memo| (memo.key(), memo.to_row())))
        .expect("Generated memos have distinct ids")
}
