//! Insert / update / no-op decisions for one import batch.
//!
//! The engine works against a snapshot of the stored entities whose natural
//! keys occur in the batch, loaded once before the first row. Rows are applied
//! strictly in file order:
//!
//! ```text
//! row ──validate──▶ draft ──lookup key──┬─ in snapshot ──▶ merge tracked fields ─┬─ changed ─▶ Updated
//!   │                 │                 │                                        └─ same ────▶ Unchanged
//!   ▼                 ▼                 ├─ new, first time ─▶ create ─▶ Inserted
//! Failed            Failed              └─ new, seen earlier in batch ─▶ Failed (duplicate)
//! ```
//!
//! The snapshot only avoids per-row lookups. Two concurrent imports can still
//! both decide to insert the same key; the store's unique index settles that
//! at commit time.

use std::collections::{HashMap, HashSet};

use super::clock::Clock;
use super::Importable;
use crate::parser::{CsvRow, RowError};

/// What happened to one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOutcome {
    Inserted,
    Updated,
    /// Matched a stored entity with identical values. Not counted.
    Unchanged,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowOutcome {
    pub row: usize,
    pub outcome: ImportOutcome,
}

/// Everything the engine decided for a batch.
#[derive(Debug, Clone)]
pub struct Reconciliation<E> {
    /// New entities, in the order their rows appeared.
    pub inserts: Vec<E>,
    /// Stored entities with at least one changed field, each listed once.
    pub updates: Vec<E>,
    /// One entry per data row, in file order.
    pub outcomes: Vec<RowOutcome>,
}

/// Row-by-row reconciliation state for one batch.
pub struct Reconciler<'c, E: Importable> {
    clock: &'c dyn Clock,
    snapshot: HashMap<String, E>,
    /// Snapshot keys whose entity changed, in first-change order.
    changed: Vec<String>,
    changed_set: HashSet<String>,
    /// Keys inserted by this batch, with the row that inserted them.
    seen_new: HashMap<String, usize>,
    inserts: Vec<E>,
    outcomes: Vec<RowOutcome>,
}

impl<'c, E: Importable> Reconciler<'c, E> {
    pub fn new(snapshot: HashMap<String, E>, clock: &'c dyn Clock) -> Self {
        Self {
            clock,
            snapshot,
            changed: Vec::new(),
            changed_set: HashSet::new(),
            seen_new: HashMap::new(),
            inserts: Vec::new(),
            outcomes: Vec::new(),
        }
    }

    /// Apply one decoded row and record its outcome.
    pub fn apply(&mut self, row: &CsvRow) -> &ImportOutcome {
        let outcome = match self.decide(row) {
            Ok(outcome) => outcome,
            Err(reason) => ImportOutcome::Failed(reason),
        };
        self.push(row.number, outcome)
    }

    /// Record a row that never made it through the decoder.
    pub fn reject(&mut self, error: RowError) -> &ImportOutcome {
        self.push(error.number, ImportOutcome::Failed(error.message))
    }

    fn push(&mut self, row: usize, outcome: ImportOutcome) -> &ImportOutcome {
        self.outcomes.push(RowOutcome { row, outcome });
        &self.outcomes[self.outcomes.len() - 1].outcome
    }

    fn decide(&mut self, row: &CsvRow) -> Result<ImportOutcome, String> {
        if let Some(reason) = E::validate(row) {
            return Err(reason);
        }
        let draft = E::draft(row)?;
        let key = E::row_key(row);

        if let Some(existing) = self.snapshot.get_mut(key) {
            let mut changed = false;
            for field in E::tracked_fields() {
                // Every field is applied; no short-circuit.
                changed |= (field.merge)(existing, &draft);
            }
            if !changed {
                return Ok(ImportOutcome::Unchanged);
            }
            existing.touch(self.clock.now());
            if self.changed_set.insert(key.to_string()) {
                self.changed.push(key.to_string());
            }
            return Ok(ImportOutcome::Updated);
        }

        if let Some(first_row) = self.seen_new.get(key) {
            return Err(format!(
                "Duplicate {} '{}' (already imported from row {})",
                E::KEY_COLUMN,
                key,
                first_row
            ));
        }

        self.seen_new.insert(key.to_string(), row.number);
        self.inserts.push(E::create(draft, self.clock.now()));
        Ok(ImportOutcome::Inserted)
    }

    pub fn finish(mut self) -> Reconciliation<E> {
        let updates = self
            .changed
            .iter()
            .filter_map(|key| self.snapshot.remove(key))
            .collect();

        Reconciliation {
            inserts: self.inserts,
            updates,
            outcomes: self.outcomes,
        }
    }
}

/// Reconcile a full batch against `snapshot`.
pub fn reconcile<E, I>(rows: I, snapshot: HashMap<String, E>, clock: &dyn Clock) -> Reconciliation<E>
where
    E: Importable,
    I: IntoIterator<Item = Result<CsvRow, RowError>>,
{
    let mut reconciler = Reconciler::new(snapshot, clock);
    for row in rows {
        match row {
            Ok(row) => {
                reconciler.apply(&row);
            }
            Err(error) => {
                reconciler.reject(error);
            }
        }
    }
    reconciler.finish()
}
