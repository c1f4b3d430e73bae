//! SQLite-backed [`EntityStore`].
//!
//! One connection is shared by every store handle and guarded by a mutex, so
//! writes from concurrent imports are serialised. Each commit is a single
//! transaction: a unique-index violation on any row rolls back the whole batch.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::{params_from_iter, Connection, OptionalExtension};
use tokio::task;
use tracing::debug;

use super::records::SqliteRecord;
use super::{Changeset, CommitSummary, EntityStore};
use crate::error::{StoreError, StoreResult};
use crate::models::{Contact, Product};

/// Busy timeout applied to every connection.
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Keys per `IN (...)` lookup statement.
const LOOKUP_CHUNK: usize = 500;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS contacts (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT NOT NULL,
    email       TEXT NOT NULL,
    phone       TEXT NOT NULL DEFAULT '',
    address     TEXT NOT NULL DEFAULT '',
    created_at  TEXT NOT NULL,
    updated_at  TEXT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS ix_contacts_email ON contacts (email);

CREATE TABLE IF NOT EXISTS products (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    product_code  TEXT NOT NULL,
    name          TEXT NOT NULL,
    description   TEXT NULL,
    price         TEXT NOT NULL,
    cost          TEXT NOT NULL,
    stock         INTEGER NOT NULL,
    min_stock     INTEGER NOT NULL,
    image_url     TEXT NULL,
    is_active     INTEGER NOT NULL DEFAULT 1,
    created_at    TEXT NOT NULL,
    updated_at    TEXT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS ix_products_product_code ON products (product_code);
CREATE INDEX IF NOT EXISTS ix_products_name ON products (name);
"#;

/// A shared SQLite connection with the service schema applied.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the database file at `path`.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Self::from_connection(Connection::open(path)?)
    }

    /// A private in-memory database.
    pub fn in_memory() -> StoreResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> StoreResult<Self> {
        conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    pub fn contacts(&self) -> SqliteStore<Contact> {
        SqliteStore::new(self.clone())
    }

    pub fn products(&self) -> SqliteStore<Product> {
        SqliteStore::new(self.clone())
    }

    fn with_conn<T>(&self, f: impl FnOnce(&mut Connection) -> StoreResult<T>) -> StoreResult<T> {
        let mut guard = self
            .conn
            .lock()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        f(&mut guard)
    }
}

/// Store handle for one entity type.
pub struct SqliteStore<E> {
    db: Database,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for SqliteStore<E> {
    fn clone(&self) -> Self {
        Self { db: self.db.clone(), _entity: PhantomData }
    }
}

impl<E: SqliteRecord> SqliteStore<E> {
    pub fn new(db: Database) -> Self {
        Self { db, _entity: PhantomData }
    }

    /// Run `f` on the blocking pool so lock waits and SQLite I/O stay off
    /// the async workers.
    async fn blocking<T, F>(&self, f: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Self) -> StoreResult<T> + Send + 'static,
    {
        let store = self.clone();
        task::spawn_blocking(move || f(&store))
            .await
            .map_err(|e| StoreError::Unavailable(format!("store task failed: {}", e)))?
    }

    fn find_by_keys_sync(&self, keys: &[String]) -> StoreResult<HashMap<String, E>> {
        self.db.with_conn(|conn| {
            let mut found = HashMap::with_capacity(keys.len());
            for chunk in keys.chunks(LOOKUP_CHUNK) {
                let placeholders = vec!["?"; chunk.len()].join(", ");
                let sql = format!(
                    "SELECT {} FROM {} WHERE {} IN ({})",
                    E::SELECT,
                    E::TABLE,
                    E::KEY_COLUMN,
                    placeholders
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(params_from_iter(chunk.iter()), E::from_row)?;
                for row in rows {
                    let entity = row?;
                    found.insert(entity.key().to_string(), entity);
                }
            }
            Ok(found)
        })
    }

    fn commit_sync(&self, changes: Changeset<E>) -> StoreResult<CommitSummary> {
        self.db.with_conn(|conn| {
            let tx = conn.transaction()?;
            let mut summary = CommitSummary::default();

            for entity in &changes.inserts {
                entity.insert(&tx)?;
                summary.inserted += 1;
            }
            for entity in &changes.updates {
                let id = entity.id().ok_or_else(|| {
                    StoreError::Database(format!(
                        "cannot update {} '{}' without an id",
                        E::TABLE,
                        entity.key()
                    ))
                })?;
                if entity.update(&tx)? == 0 {
                    return Err(StoreError::Database(format!(
                        "{} row {} disappeared before commit",
                        E::TABLE,
                        id
                    )));
                }
                summary.updated += 1;
            }

            tx.commit()?;
            debug!(
                table = E::TABLE,
                inserted = summary.inserted,
                updated = summary.updated,
                "committed changeset"
            );
            Ok(summary)
        })
    }

    fn list_sync(&self) -> StoreResult<Vec<E>> {
        self.db.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM {} ORDER BY created_at DESC, id DESC",
                E::SELECT,
                E::TABLE
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([], E::from_row)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
    }

    fn find_by_id_sync(&self, id: i64) -> StoreResult<Option<E>> {
        self.db.with_conn(|conn| {
            let sql = format!("SELECT {} FROM {} WHERE id = ?1", E::SELECT, E::TABLE);
            Ok(conn.query_row(&sql, [id], E::from_row).optional()?)
        })
    }
}

#[async_trait]
impl<E: SqliteRecord> EntityStore<E> for SqliteStore<E> {
    async fn find_by_keys(&self, keys: &[String]) -> StoreResult<HashMap<String, E>> {
        let keys = keys.to_vec();
        self.blocking(move |store| store.find_by_keys_sync(&keys)).await
    }

    async fn commit(&self, changes: Changeset<E>) -> StoreResult<CommitSummary> {
        if changes.is_empty() {
            return Ok(CommitSummary::default());
        }
        self.blocking(move |store| store.commit_sync(changes)).await
    }

    async fn list(&self) -> StoreResult<Vec<E>> {
        self.blocking(|store| store.list_sync()).await
    }

    async fn find_by_id(&self, id: i64) -> StoreResult<Option<E>> {
        self.blocking(move |store| store.find_by_id_sync(id)).await
    }
}
