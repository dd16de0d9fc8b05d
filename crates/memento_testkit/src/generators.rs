//! Property-based test generators using proptest.
//!
//! Provides strategies for memos and for edits applied to managed memos.

use crate::fixtures::Memo;
use proptest::prelude::*;

/// Strategy for generating user names.
pub fn username_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Z][a-z]{0,11}").expect("Invalid regex")
}

/// Strategy for generating memo contents.
pub fn contents_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z ]{0,40}").expect("Invalid regex")
}

/// Strategy for generating a memo with an identifier in `ids`.
pub fn memo_strategy(ids: std::ops::Range<i64>) -> impl Strategy<Value = Memo> {
    (ids, username_strategy(), contents_strategy())
        .prop_map(|(id, username, contents)| Memo::new(id, username, contents))
}

/// Strategy for generating memos with distinct identifiers.
pub fn memos_strategy(max: usize) -> impl Strategy<Value = Vec<Memo>> {
    prop::collection::btree_map(0i64..1000, (username_strategy(), contents_strategy()), 0..max)
        .prop_map(|memos| {
            memos
                .into_iter()
                .map(|(id, (username, contents))| Memo::new(id, username, contents))
                .collect()
        })
}

/// A field change applied to a managed memo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoEdit {
    /// Replace the user name.
    Rename(String),
    /// Replace the contents.
    Rewrite(String),
}

impl MemoEdit {
    /// Applies the edit.
    pub fn apply(&self, memo: &mut Memo) {
        match self {
            Self::Rename(username) => memo.username.clone_from(username),
            Self::Rewrite(contents) => memo.contents.clone_from(contents),
        }
    }
}

/// Strategy for generating a single edit.
pub fn edit_strategy() -> impl Strategy<Value = MemoEdit> {
    prop_oneof![
        username_strategy().prop_map(MemoEdit::Rename),
        contents_strategy().prop_map(MemoEdit::Rewrite),
    ]
}

/// Strategy for generating a sequence of edits.
pub fn edits_strategy(max: usize) -> impl Strategy<Value = Vec<MemoEdit>> {
    prop::collection::vec(edit_strategy(), 0..max)
}
