//! Property tests for the persistence context.

use crate::fixtures::Memo;
use crate::generators::{edits_strategy, memo_strategy, memos_strategy};
use crate::recording::RecordingStore;
use memento_core::{ActionKind, ContextConfig, ContextFactory, Entity, WriteAction};
use memento_store::MemoryStore;
use proptest::prelude::*;
use std::sync::Arc;

fn recording_over(memos: &[Memo]) -> (RecordingStore, ContextFactory) {
    let seed =
        MemoryStore::with_rows(memos.iter().map(|memo| (memo.key(), memo.to_row()))).unwrap();
    let store = RecordingStore::wrap(seed);
    let factory = ContextFactory::new(Arc::new(store.clone()), ContextConfig::default());
    (store, factory)
}

fn count(actions: &[WriteAction], kind: ActionKind) -> usize {
    actions.iter().filter(|action| action.kind() == kind).count()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn find_returns_the_same_instance(memos in memos_strategy(12)) {
        let (store, factory) = recording_over(&memos);
        let mut ctx = factory.create_context().unwrap();

        for memo in &memos {
            let first = ctx.find::<Memo>(memo.id).unwrap().unwrap();
            let second = ctx.find::<Memo>(memo.id).unwrap().unwrap();
            prop_assert_eq!(first, second);
            prop_assert_eq!(ctx.get(&first).unwrap(), memo);
        }
        prop_assert_eq!(store.recording().loads.len(), memos.len());
    }

    #[test]
    fn second_flush_without_changes_writes_nothing(
        memo in memo_strategy(0..100),
        edits in edits_strategy(6),
    ) {
        let (store, factory) = recording_over(std::slice::from_ref(&memo));
        let mut ctx = factory.create_context().unwrap();
        ctx.begin().unwrap();

        let handle = ctx.find::<Memo>(memo.id).unwrap().unwrap();
        for edit in &edits {
            edit.apply(ctx.get_mut(&handle).unwrap());
        }
        let edited = ctx.get(&handle).unwrap().clone();

        ctx.flush().unwrap();
        prop_assert_eq!(ctx.flush().unwrap(), 0);
        ctx.commit().unwrap();

        let actions = store.recording().actions();
        let expected = usize::from(edited != memo);
        prop_assert_eq!(count(&actions, ActionKind::Update), expected);
        prop_assert_eq!(store.row(&memo.key()), Some(edited.to_row()));
    }

    #[test]
    fn merged_instance_is_tracked_not_the_argument(
        memos in memos_strategy(8),
        incoming in memo_strategy(0..1000),
    ) {
        let (store, factory) = recording_over(&memos);
        let mut ctx = factory.create_context().unwrap();
        ctx.begin().unwrap();

        let mut argument = incoming.clone();
        let merged = ctx.merge(&argument).unwrap();
        prop_assert!(ctx.contains(&merged).unwrap());

        argument.contents.push_str(" (changed after merge)");
        prop_assert_eq!(ctx.get(&merged).unwrap(), &incoming);

        ctx.commit().unwrap();
        prop_assert_eq!(store.row(&incoming.key()), Some(incoming.to_row()));

        let existed = memos.iter().any(|memo| memo.id == incoming.id);
        let inserts = count(&store.recording().actions(), ActionKind::Insert);
        prop_assert_eq!(inserts, usize::from(!existed));
    }

    #[test]
    fn detached_changes_are_never_written(
        memo in memo_strategy(0..100),
        edits in edits_strategy(6),
    ) {
        let (store, factory) = recording_over(std::slice::from_ref(&memo));
        let mut ctx = factory.create_context().unwrap();
        ctx.begin().unwrap();

        let handle = ctx.find::<Memo>(memo.id).unwrap().unwrap();
        let mut detached = ctx.detach(handle).unwrap();
        for edit in &edits {
            edit.apply(&mut detached);
        }

        prop_assert_eq!(ctx.flush().unwrap(), 0);
        let again = ctx.find::<Memo>(memo.id).unwrap().unwrap();
        prop_assert_eq!(ctx.get(&again).unwrap(), &memo);
        ctx.commit().unwrap();

        prop_assert!(store.recording().batches.is_empty());
        prop_assert_eq!(store.row(&memo.key()), Some(memo.to_row()));
    }

    #[test]
    fn rolled_back_actions_never_reach_apply(
        memos in memos_strategy(8),
        fresh in memos_strategy(8),
        edits in edits_strategy(4),
    ) {
        let (store, factory) = recording_over(&memos);
        let mut ctx = factory.create_context().unwrap();
        ctx.begin().unwrap();

        for memo in &memos {
            let handle = ctx.find::<Memo>(memo.id).unwrap().unwrap();
            for edit in &edits {
                edit.apply(ctx.get_mut(&handle).unwrap());
            }
            if memo.id % 2 == 0 {
                ctx.remove(&handle).unwrap();
            }
        }
        for memo in fresh.iter().filter(|memo| !memos.iter().any(|m| m.id == memo.id)) {
            ctx.save(memo.clone()).unwrap();
        }
        ctx.rollback().unwrap();

        prop_assert!(store.recording().batches.is_empty());
        prop_assert_eq!(ctx.managed_count(), 0);
        for memo in &memos {
            prop_assert_eq!(store.row(&memo.key()), Some(memo.to_row()));
        }
        prop_assert_eq!(store.inner().len(), memos.len());
    }
}
