//! End-to-end scenarios over real stores.

use crate::fixtures::{sample_memos, with_file_factory, Memo, TestFactory};
use crate::logging::init_tracing;
use crate::recording::RecordingStore;
use memento_core::{
    ActionKind, ContextConfig, ContextFactory, CoreError, Entity, EntityState, Row, WriteAction,
};
use memento_store::MemoryStore;
use std::sync::Arc;
use tempfile::tempdir;

fn seeded_recording() -> (RecordingStore, ContextFactory) {
    let seed =
        MemoryStore::with_rows(sample_memos().iter().map(|memo| (memo.key(), memo.to_row())))
            .unwrap();
    let store = RecordingStore::wrap(seed);
    let factory = ContextFactory::new(Arc::new(store.clone()), ContextConfig::default());
    (store, factory)
}

#[test]
fn saved_memo_is_found_by_a_fresh_context() {
    init_tracing();
    for fixture in [TestFactory::memory(), TestFactory::file()] {
        let mut ctx = fixture.create_context().unwrap();
        ctx.begin().unwrap();
        ctx.save(Memo::new(1, "Robbie", "hello")).unwrap();
        ctx.commit().unwrap();
        ctx.close().unwrap();

        let mut fresh = fixture.create_context().unwrap();
        let memo = fresh.find::<Memo>(1).unwrap().unwrap();
        assert_eq!(fresh.get(&memo).unwrap().username, "Robbie");
    }
}

#[test]
fn modified_memo_is_written_without_explicit_update() {
    init_tracing();
    let (store, factory) = seeded_recording();

    let mut ctx = factory.create_context().unwrap();
    ctx.begin().unwrap();
    let memo = ctx.find::<Memo>(1).unwrap().unwrap();
    ctx.get_mut(&memo).unwrap().username = "Update".into();
    ctx.commit().unwrap();

    assert_eq!(
        store.recording().batches,
        vec![vec![WriteAction::update(
            Memo::key_for(1),
            Row::new().with("username", "Update")
        )]]
    );

    let mut fresh = factory.create_context().unwrap();
    let memo = fresh.find::<Memo>(1).unwrap().unwrap();
    assert_eq!(fresh.get(&memo).unwrap().username, "Update");
}

#[test]
fn merge_of_unsaved_memo_inserts_it() {
    init_tracing();
    let (store, factory) = seeded_recording();

    let mut ctx = factory.create_context().unwrap();
    ctx.begin().unwrap();
    ctx.merge(&Memo::new(3, "X", "Y")).unwrap();
    ctx.commit().unwrap();

    let kinds: Vec<ActionKind> = store
        .recording()
        .actions()
        .iter()
        .map(WriteAction::kind)
        .collect();
    assert_eq!(kinds, vec![ActionKind::Insert]);

    let mut fresh = factory.create_context().unwrap();
    let memo = fresh.find::<Memo>(3).unwrap().unwrap();
    assert_eq!(fresh.get(&memo).unwrap().username, "X");
}

#[test]
fn merge_returns_a_distinct_managed_instance() {
    init_tracing();
    let (store, factory) = seeded_recording();

    let mut ctx = factory.create_context().unwrap();
    ctx.begin().unwrap();
    let original = ctx.find::<Memo>(2).unwrap().unwrap();
    let mut detached = ctx.detach(original).unwrap();
    detached.contents = "rewritten".into();

    let merged = ctx.merge(&detached).unwrap();
    assert_ne!(merged, original);
    assert!(ctx.contains(&merged).unwrap());
    assert!(!ctx.contains(&original).unwrap());
    assert_eq!(ctx.state(&original).unwrap(), EntityState::Detached);

    // The argument stays untracked.
    detached.contents = "after merge".into();
    assert_eq!(ctx.get(&merged).unwrap().contents, "rewritten");

    ctx.commit().unwrap();
    assert_eq!(
        store.row(&Memo::key_for(2)).unwrap().text("contents"),
        Some("rewritten")
    );
}

#[test]
fn removed_memo_is_gone_inside_and_after_the_transaction() {
    init_tracing();
    let (store, factory) = seeded_recording();

    let mut ctx = factory.create_context().unwrap();
    ctx.begin().unwrap();
    let memo = ctx.find::<Memo>(2).unwrap().unwrap();
    ctx.remove(&memo).unwrap();
    assert!(ctx.find::<Memo>(2).unwrap().is_none());
    ctx.commit().unwrap();

    assert_eq!(store.recording().loads, vec![Memo::key_for(2)]);

    let mut fresh = factory.create_context().unwrap();
    assert!(fresh.find::<Memo>(2).unwrap().is_none());
}

#[test]
fn closed_context_rejects_find() {
    init_tracing();
    let fixture = TestFactory::memory_with(&sample_memos());
    let mut ctx = fixture.create_context().unwrap();
    ctx.close().unwrap();

    let result = ctx.find::<Memo>(1);
    assert!(matches!(result, Err(CoreError::InvalidContextState { .. })));
}

#[test]
fn repeated_find_loads_once() {
    let (store, factory) = seeded_recording();
    let mut ctx = factory.create_context().unwrap();

    let first = ctx.find::<Memo>(1).unwrap().unwrap();
    let second = ctx.find::<Memo>(1).unwrap().unwrap();
    assert_eq!(first, second);
    assert_eq!(store.recording().loads.len(), 1);
    assert_eq!(factory.stats().cache_hits, 1);
}

#[test]
fn one_flush_sends_inserts_then_updates_then_deletes() {
    let (store, factory) = seeded_recording();
    let mut ctx = factory.create_context().unwrap();
    ctx.begin().unwrap();

    let first = ctx.find::<Memo>(1).unwrap().unwrap();
    let second = ctx.find::<Memo>(2).unwrap().unwrap();
    ctx.remove(&second).unwrap();
    ctx.save(Memo::new(3, "c", "three")).unwrap();
    ctx.get_mut(&first).unwrap().contents = "edited".into();
    ctx.save(Memo::new(4, "d", "four")).unwrap();
    ctx.commit().unwrap();

    let batches = store.recording().batches;
    assert_eq!(batches.len(), 1);
    let order: Vec<(ActionKind, i64)> = batches[0]
        .iter()
        .map(|action| (action.kind(), action.key().id().as_i64()))
        .collect();
    assert_eq!(
        order,
        vec![
            (ActionKind::Insert, 3),
            (ActionKind::Insert, 4),
            (ActionKind::Update, 1),
            (ActionKind::Delete, 2),
        ]
    );
}

#[test]
fn failed_flush_can_be_retried() {
    let (store, factory) = seeded_recording();
    let mut ctx = factory.create_context().unwrap();
    ctx.begin().unwrap();

    let memo = ctx.find::<Memo>(1).unwrap().unwrap();
    ctx.get_mut(&memo).unwrap().username = "Retry".into();
    ctx.save(Memo::new(5, "e", "five")).unwrap();

    store.fail_next_applies(1);
    assert!(matches!(ctx.commit(), Err(CoreError::StoreFailure(_))));
    assert!(ctx.is_active());
    assert_eq!(ctx.pending_writes().len(), 1);

    ctx.commit().unwrap();
    let actions = store.recording().actions();
    assert_eq!(actions.len(), 2);
    assert_eq!(store.row(&Memo::key_for(1)).unwrap().text("username"), Some("Retry"));
    assert!(store.row(&Memo::key_for(5)).is_some());
}

#[test]
fn rollback_sends_nothing() {
    let (store, factory) = seeded_recording();
    let mut ctx = factory.create_context().unwrap();

    let result: Result<(), CoreError> = ctx.transaction(|ctx| {
        ctx.save(Memo::new(6, "f", "six"))?;
        let memo = ctx.find::<Memo>(1)?.ok_or(CoreError::TransactionRequired)?;
        ctx.get_mut(&memo)?.contents = "never".into();
        Err(CoreError::invalid_context_state("caller aborted"))
    });

    assert!(result.is_err());
    let recording = store.recording();
    assert!(recording.batches.is_empty());
    assert_eq!(recording.rollbacks, 1);
    assert_eq!(recording.commits, 0);
    assert!(store.row(&Memo::key_for(6)).is_none());
}

#[test]
fn concurrent_contexts_conflict_at_commit() {
    let fixture = TestFactory::memory();
    let mut first = fixture.create_context().unwrap();
    let mut second = fixture.create_context().unwrap();

    first.begin().unwrap();
    second.begin().unwrap();
    first.save(Memo::new(7, "first", "x")).unwrap();
    second.save(Memo::new(7, "second", "y")).unwrap();

    first.commit().unwrap();
    assert!(matches!(second.commit(), Err(CoreError::StoreFailure(_))));
    second.rollback().unwrap();

    assert_eq!(fixture.stored_memo(7).unwrap().username, "first");
}

#[test]
fn journal_survives_reopen() {
    init_tracing();
    let temp = tempdir().unwrap();
    let path = temp.path().join("memo.journal");

    {
        let fixture = TestFactory::file_at(&path);
        let mut ctx = fixture.create_context().unwrap();
        ctx.transaction(|ctx| {
            ctx.save(Memo::new(1, "Robbie", "hello"))?;
            ctx.save(Memo::new(2, "Robbert", "bye"))?;
            Ok(())
        })
        .unwrap();
        ctx.transaction(|ctx| {
            let memo = ctx.find::<Memo>(1)?.ok_or(CoreError::TransactionRequired)?;
            ctx.get_mut(&memo)?.username = "Update".into();
            let gone = ctx.find::<Memo>(2)?.ok_or(CoreError::TransactionRequired)?;
            ctx.remove(&gone)
        })
        .unwrap();
    }

    let reopened = TestFactory::file_at(&path);
    assert_eq!(reopened.len(), 1);
    assert_eq!(reopened.stored_memo(1), Some(Memo::new(1, "Update", "hello")));
}

#[test]
fn file_store_scenario_round_trip() {
    with_file_factory(|fixture| {
        let mut ctx = fixture.create_context().unwrap();
        ctx.transaction(|ctx| ctx.merge(&Memo::new(3, "X", "Y")))
            .unwrap();

        let mut fresh = fixture.create_context().unwrap();
        let memo = fresh.find::<Memo>(3).unwrap().unwrap();
        assert_eq!(fresh.get(&memo).unwrap(), &Memo::new(3, "X", "Y"));
    });
}
