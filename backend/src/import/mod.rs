//! CSV upsert pipeline.
//!
//! - [`clock`]: injectable time source
//! - [`reconcile`]: insert / update / no-op decisions against a key snapshot
//! - [`report`]: per-row outcomes folded into an [`ImportResult`]
//! - [`pipeline`]: decode → snapshot → reconcile → commit, as one call
//!
//! Entity types plug in by implementing [`Importable`].

pub mod clock;
pub mod pipeline;
pub mod reconcile;
pub mod report;

pub use clock::{Clock, FixedClock, SystemClock};
pub use pipeline::ImportService;
pub use reconcile::{reconcile, ImportOutcome, Reconciliation, Reconciler, RowOutcome};
pub use report::{ImportReport, ImportResult};

use chrono::{DateTime, Utc};

use crate::models::EntityKind;
use crate::parser::{Column, CsvRow};

/// A mutable field that takes part in change detection.
///
/// `merge` copies the incoming value onto the stored entity when they differ
/// and reports whether it did.
pub struct TrackedField<E, D> {
    pub name: &'static str,
    pub merge: fn(&mut E, &D) -> bool,
}

/// Overwrite `slot` with `incoming` if they differ by value.
pub fn assign<T: PartialEq + Clone>(slot: &mut T, incoming: &T) -> bool {
    if slot == incoming {
        false
    } else {
        *slot = incoming.clone();
        true
    }
}

/// An entity type that can be upserted from CSV rows.
pub trait Importable: Clone + Send + Sync + 'static {
    /// Typed values of one row, before they become an entity.
    type Draft;

    const KIND: EntityKind;

    /// Expected CSV layout.
    const COLUMNS: &'static [Column];

    /// Header of the natural-key column.
    const KEY_COLUMN: &'static str;

    /// Mutable fields compared on update, in the order they are applied.
    fn tracked_fields() -> &'static [TrackedField<Self, Self::Draft>];

    /// First violated rule, if any.
    fn validate(row: &CsvRow) -> Option<String>;

    /// Convert the raw cells into typed values.
    fn draft(row: &CsvRow) -> Result<Self::Draft, String>;

    /// Build a not-yet-persisted entity stamped with `now`.
    fn create(draft: Self::Draft, now: DateTime<Utc>) -> Self;

    /// Record that a tracked field changed at `now`.
    fn touch(&mut self, now: DateTime<Utc>);

    /// Natural key as it appears in a raw row.
    fn row_key(row: &CsvRow) -> &str {
        row.get(Self::KEY_COLUMN)
    }
}
