//! Persistence gateway.
//!
//! The import pipeline talks to storage only through [`EntityStore`]: one
//! batch lookup by natural key before reconciliation, and one atomic
//! [`commit`](EntityStore::commit) of a [`Changeset`] afterwards. Read
//! endpoints use [`list`](EntityStore::list) and
//! [`find_by_id`](EntityStore::find_by_id).
//!
//! Natural-key uniqueness is enforced by the store (unique indexes), not by the
//! snapshot the pipeline holds in memory.

pub mod sqlite;
mod records;

pub use records::SqliteRecord;
pub use sqlite::{Database, SqliteStore};

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::StoreResult;

/// Staged writes for one import.
#[derive(Debug, Clone)]
pub struct Changeset<E> {
    pub inserts: Vec<E>,
    pub updates: Vec<E>,
}

impl<E> Changeset<E> {
    pub fn new() -> Self {
        Self { inserts: Vec::new(), updates: Vec::new() }
    }

    /// Stage new entities.
    pub fn insert_all(&mut self, entities: impl IntoIterator<Item = E>) {
        self.inserts.extend(entities);
    }

    /// Stage modified entities.
    pub fn update_all(&mut self, entities: impl IntoIterator<Item = E>) {
        self.updates.extend(entities);
    }

    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.updates.is_empty()
    }
}

impl<E> Default for Changeset<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// Rows written by a commit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitSummary {
    pub inserted: usize,
    pub updated: usize,
}

/// Keyed storage for one entity type.
#[async_trait]
pub trait EntityStore<E>: Send + Sync {
    /// Stored entities whose natural key is in `keys`, keyed by that key.
    async fn find_by_keys(&self, keys: &[String]) -> StoreResult<HashMap<String, E>>;

    /// Persist all staged inserts and updates, or none of them.
    async fn commit(&self, changes: Changeset<E>) -> StoreResult<CommitSummary>;

    /// All entities, newest first.
    async fn list(&self) -> StoreResult<Vec<E>>;

    async fn find_by_id(&self, id: i64) -> StoreResult<Option<E>>;
}
