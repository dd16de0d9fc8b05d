//! Committed rows and batch planning.

use crate::action::WriteAction;
use crate::error::{StoreError, StoreResult};
use crate::key::EntityKey;
use crate::row::Row;
use std::collections::HashMap;

/// The outcome of a batch: final state per touched key (`None` = deleted).
pub(crate) type Plan = HashMap<EntityKey, Option<Row>>;

/// Computes the effect of `actions` without modifying anything.
///
/// `lookup` returns the state of a key before the batch. Actions are
/// validated in order against that state plus the effect of earlier
/// actions in the same batch, so the whole batch either plans or fails.
pub(crate) fn plan<F>(actions: &[WriteAction], mut lookup: F) -> StoreResult<Plan>
where
    F: FnMut(&EntityKey) -> Option<Row>,
{
    let mut plan = Plan::new();

    for action in actions {
        let key = action.key();
        let current = match plan.get(key) {
            Some(state) => state.clone(),
            None => lookup(key),
        };

        let next = match action {
            WriteAction::Insert { row, .. } => {
                if current.is_some() {
                    return Err(StoreError::DuplicateKey(key.clone()));
                }
                Some(row.clone())
            }
            WriteAction::Update { changes, .. } => {
                let mut row = current.ok_or_else(|| StoreError::MissingRow(key.clone()))?;
                row.overlay(changes);
                Some(row)
            }
            WriteAction::Delete { .. } => {
                if current.is_none() {
                    return Err(StoreError::MissingRow(key.clone()));
                }
                None
            }
        };

        plan.insert(key.clone(), next);
    }

    Ok(plan)
}

/// Committed rows, keyed by identity.
#[derive(Debug, Default)]
pub(crate) struct Tables {
    rows: HashMap<EntityKey, Row>,
}

impl Tables {
    pub(crate) fn get(&self, key: &EntityKey) -> Option<&Row> {
        self.rows.get(key)
    }

    pub(crate) fn len(&self) -> usize {
        self.rows.len()
    }

    /// Writes a validated plan.
    pub(crate) fn commit(&mut self, plan: Plan) {
        for (key, state) in plan {
            match state {
                Some(row) => {
                    self.rows.insert(key, row);
                }
                None => {
                    self.rows.remove(&key);
                }
            }
        }
    }

    /// Validates and writes a batch in one step.
    pub(crate) fn apply(&mut self, actions: &[WriteAction]) -> StoreResult<()> {
        let batch = plan(actions, |key| self.rows.get(key).cloned())?;
        self.commit(batch);
        Ok(())
    }
}
