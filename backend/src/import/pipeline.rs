//! High-level import API.
//!
//! [`ImportService::import_bytes`] runs one upload end to end:
//!
//! 1. Reject an empty upload without touching the store
//! 2. Decode the CSV against the entity's column layout
//! 3. Load the snapshot of stored entities for every key in the file
//! 4. Reconcile rows against the snapshot
//! 5. Commit all inserts and updates in one transaction (skipped when empty)
//! 6. Fold row outcomes into an [`ImportResult`]
//!
//! Steps 2, 3 and 5 can fail the import as a whole; the result then has
//! `success = false` and nothing has been written.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use csv_upsert::{Database, ImportService, SystemClock};
//!
//! let db = Database::open("csv-import.db")?;
//! let contacts = ImportService::new(Arc::new(db.contacts()), Arc::new(SystemClock));
//! let result = contacts.import_bytes(&bytes, "people.csv").await;
//! println!("{}", result.message);
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::clock::Clock;
use super::reconcile::reconcile;
use super::report::{ImportReport, ImportResult};
use super::Importable;
use crate::api::logs::{log_error, log_info, log_info_indent, log_success, log_warning};
use crate::error::{ImportError, StoreResult};
use crate::parser::{self, CsvRow, RowError};
use crate::store::{Changeset, EntityStore};

/// Errors shown in the live log before the list is truncated.
const MAX_LOGGED_ERRORS: usize = 5;

/// Import and read operations for one entity type.
pub struct ImportService<E> {
    store: Arc<dyn EntityStore<E>>,
    clock: Arc<dyn Clock>,
}

impl<E> Clone for ImportService<E> {
    fn clone(&self) -> Self {
        Self { store: Arc::clone(&self.store), clock: Arc::clone(&self.clock) }
    }
}

impl<E: Importable> ImportService<E> {
    pub fn new(store: Arc<dyn EntityStore<E>>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Import an uploaded CSV. Never fails: whole-import failures are
    /// reported through `success = false`.
    pub async fn import_bytes(&self, bytes: &[u8], file_name: &str) -> ImportResult {
        let import_id = Uuid::new_v4();
        let span = info_span!("import", %import_id, kind = %E::KIND, file = file_name);

        async {
            if bytes.is_empty() {
                log_warning(format!("{}: file is empty", file_name));
                return ImportResult::empty_file();
            }

            log_info(format!("📄 Importing {} ({} bytes) into {}", file_name, bytes.len(), E::KIND));

            match self.run(bytes).await {
                Ok(result) => {
                    info!(
                        imported = result.records_imported,
                        updated = result.records_updated,
                        failed = result.records_failed,
                        "import committed"
                    );
                    log_success(format!(
                        "Successfully imported {} new records and updated {} records from {}",
                        result.records_imported, result.records_updated, file_name
                    ));
                    result
                }
                Err(e) => {
                    error!(error = %e, "import aborted");
                    log_error(format!("Error importing CSV: {}", e));
                    ImportResult::failure(e)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn run(&self, bytes: &[u8]) -> Result<ImportResult, ImportError> {
        let decoded = parser::decode(bytes, E::COLUMNS)?;
        log_info_indent(
            format!(
                "encoding {}, delimiter '{}', columns: {}",
                decoded.encoding,
                format_delimiter(decoded.delimiter),
                decoded.headers.join(", ")
            ),
            1,
        );

        let rows: Vec<Result<CsvRow, RowError>> = decoded.collect();
        let keys = distinct_keys::<E>(&rows);
        log_info_indent(format!("{} rows, {} distinct keys", rows.len(), keys.len()), 1);

        let snapshot = self.store.find_by_keys(&keys).await?;
        log_info_indent(format!("{} keys already stored", snapshot.len()), 1);

        let reconciliation = reconcile::<E, _>(rows, snapshot, self.clock.as_ref());
        let report = ImportReport::from_outcomes(&reconciliation.outcomes);

        let mut changes = Changeset::new();
        changes.insert_all(reconciliation.inserts);
        changes.update_all(reconciliation.updates);
        if !changes.is_empty() {
            self.store.commit(changes).await?;
        }

        let result = report.finish();
        if !result.errors.is_empty() {
            warn!(failed = result.records_failed, "rows rejected");
            for err in result.errors.iter().take(MAX_LOGGED_ERRORS) {
                log_info_indent(err.clone(), 1);
            }
            if result.errors.len() > MAX_LOGGED_ERRORS {
                log_info_indent(format!("... and {} more", result.errors.len() - MAX_LOGGED_ERRORS), 1);
            }
        }
        log_info(result.message.clone());
        Ok(result)
    }

    /// All stored entities, newest first.
    pub async fn list(&self) -> StoreResult<Vec<E>> {
        self.store.list().await
    }

    pub async fn get(&self, id: i64) -> StoreResult<Option<E>> {
        self.store.find_by_id(id).await
    }
}

/// Non-blank natural keys of the decoded rows, first occurrence order.
fn distinct_keys<E: Importable>(rows: &[Result<CsvRow, RowError>]) -> Vec<String> {
    let mut seen = HashSet::new();
    rows.iter()
        .filter_map(|r| r.as_ref().ok())
        .map(E::row_key)
        .filter(|k| !k.trim().is_empty())
        .filter(|k| seen.insert(k.to_string()))
        .map(str::to_string)
        .collect()
}

fn format_delimiter(d: char) -> &'static str {
    match d {
        ';' => ";",
        ',' => ",",
        '\t' => "TAB",
        '|' => "|",
        _ => "?",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::import::clock::FixedClock;
    use crate::models::{Contact, Product};
    use crate::store::{CommitSummary, Database};
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone, Utc};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn clock() -> Arc<FixedClock> {
        Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2026, 1, 28, 15, 0, 0).unwrap()))
    }

    fn contacts(db: &Database, clock: Arc<FixedClock>) -> ImportService<Contact> {
        ImportService::new(Arc::new(db.contacts()), clock)
    }

    /// Counts calls and fails on commit.
    #[derive(Default)]
    struct BrokenStore {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EntityStore<Contact> for BrokenStore {
        async fn find_by_keys(&self, _keys: &[String]) -> StoreResult<HashMap<String, Contact>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(HashMap::new())
        }

        async fn commit(&self, _changes: Changeset<Contact>) -> StoreResult<CommitSummary> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::UniqueViolation("UNIQUE constraint failed: contacts.email".into()))
        }

        async fn list(&self) -> StoreResult<Vec<Contact>> {
            Ok(Vec::new())
        }

        async fn find_by_id(&self, _id: i64) -> StoreResult<Option<Contact>> {
            Ok(None)
        }
    }

    /// Records every lookup and commit; stores nothing.
    #[derive(Default)]
    struct RecordingStore {
        lookups: Mutex<Vec<Vec<String>>>,
        commits: Mutex<Vec<Changeset<Contact>>>,
    }

    #[async_trait]
    impl EntityStore<Contact> for RecordingStore {
        async fn find_by_keys(&self, keys: &[String]) -> StoreResult<HashMap<String, Contact>> {
            self.lookups.lock().unwrap().push(keys.to_vec());
            Ok(HashMap::new())
        }

        async fn commit(&self, changes: Changeset<Contact>) -> StoreResult<CommitSummary> {
            let summary = CommitSummary { inserted: changes.inserts.len(), updated: changes.updates.len() };
            self.commits.lock().unwrap().push(changes);
            Ok(summary)
        }

        async fn list(&self) -> StoreResult<Vec<Contact>> {
            Ok(Vec::new())
        }

        async fn find_by_id(&self, _id: i64) -> StoreResult<Option<Contact>> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn test_single_lookup_with_distinct_keys() {
        let store = Arc::new(RecordingStore::default());
        let service = ImportService::<Contact>::new(store.clone(), clock());
        let csv = "Name,Email\nAnn,ann@example.com\nBob,bob@example.com\nAnn again,ann@example.com\n,\n";

        let result = service.import_bytes(csv.as_bytes(), "people.csv").await;

        assert!(result.success);
        assert_eq!(
            *store.lookups.lock().unwrap(),
            vec![vec!["ann@example.com".to_string(), "bob@example.com".to_string()]]
        );
        let commits = store.commits.lock().unwrap();
        assert_eq!(commits.len(), 1);
        assert_eq!(commits[0].inserts.len(), 2);
        assert!(commits[0].updates.is_empty());
    }

    #[tokio::test]
    async fn test_all_invalid_batch_writes_nothing() {
        let store = Arc::new(RecordingStore::default());
        let service = ImportService::<Contact>::new(store.clone(), clock());
        let csv = "Name,Email\n,ann@example.com\nBob,not-an-email\n";

        let result = service.import_bytes(csv.as_bytes(), "people.csv").await;

        assert!(result.success);
        assert_eq!(result.records_failed, 2);
        assert_eq!(store.lookups.lock().unwrap().len(), 1);
        assert!(store.commits.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_mixed_batch() {
        let db = Database::in_memory().unwrap();
        let service = contacts(&db, clock());

        let csv = "Name,Email,Phone,Address\nAnn,ann@example.com,555,1 Rd\n,bad-email,,\n";
        let result = service.import_bytes(csv.as_bytes(), "people.csv").await;

        assert!(result.success);
        assert_eq!(result.records_imported, 1);
        assert_eq!(result.records_updated, 0);
        assert_eq!(result.records_failed, 1);
        assert_eq!(result.errors, vec!["Row 3: Name is required"]);
        assert_eq!(result.message, "Import completed: 1 new, 0 updated, 1 failed");
    }

    #[tokio::test]
    async fn test_empty_upload_skips_store() {
        let store = Arc::new(BrokenStore::default());
        let service = ImportService::<Contact>::new(store.clone(), clock());

        let result = service.import_bytes(b"", "empty.csv").await;

        assert!(!result.success);
        assert_eq!(result.message, "File is empty");
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_required_column_fails_whole_import() {
        let store = Arc::new(BrokenStore::default());
        let service = ImportService::<Contact>::new(store.clone(), clock());

        let result = service.import_bytes(b"Name,Phone\nAnn,555\n", "people.csv").await;

        assert!(!result.success);
        assert_eq!(result.message, "Error importing CSV: Missing required column: Email");
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_commit_failure_is_reported() {
        let store = Arc::new(BrokenStore::default());
        let service = ImportService::<Contact>::new(store, clock());

        let result = service
            .import_bytes(b"Name,Email\nAnn,ann@example.com\n", "people.csv")
            .await;

        assert!(!result.success);
        assert_eq!(result.records_imported, 0);
        assert!(result.message.starts_with("Error importing CSV: Unique constraint violated"));
        assert_eq!(result.errors.len(), 1);
    }

    #[tokio::test]
    async fn test_reimport_is_idempotent() {
        let db = Database::in_memory().unwrap();
        let clock = clock();
        let service = contacts(&db, clock.clone());
        let csv = b"Name,Email,Phone,Address\nAnn,ann@example.com,555,1 Rd\nBob,bob@example.com,,\n";

        let first = service.import_bytes(csv, "people.csv").await;
        assert_eq!(first.records_imported, 2);

        clock.advance(Duration::hours(1));
        let second = service.import_bytes(csv, "people.csv").await;
        assert!(second.success);
        assert_eq!(second.records_imported, 0);
        assert_eq!(second.records_updated, 0);
        assert_eq!(second.records_failed, 0);

        for contact in service.list().await.unwrap() {
            assert_eq!(contact.updated_at, None);
        }
    }

    #[tokio::test]
    async fn test_products_with_bad_numbers() {
        let db = Database::in_memory().unwrap();
        let service = ImportService::<Product>::new(Arc::new(db.products()), clock());
        let csv = "ProductCode,Name,Price,Cost,Stock,MinStock\n\
                   P-1,Widget,10.50,4,12,3\n\
                   P-2,Gadget,abc,4,1,1\n\
                   ,Nameless,1,1,1,1\n";

        let result = service.import_bytes(csv.as_bytes(), "catalog.csv").await;

        assert!(result.success);
        assert_eq!(result.records_imported, 1);
        assert_eq!(
            result.errors,
            vec![
                "Row 3: Invalid Price 'abc': expected a decimal number",
                "Row 4: ProductCode is required",
            ]
        );
    }

    #[test]
    fn test_distinct_keys_skip_blank_and_repeats() {
        let columns = <Contact as Importable>::COLUMNS;
        let row = |n: usize, email: &str| {
            Ok(CsvRow::new(n, columns, vec!["x".into(), email.into(), "".into(), "".into()]))
        };
        let rows = vec![
            row(2, "a@x.io"),
            row(3, ""),
            row(4, "a@x.io"),
            Err(RowError { number: 5, message: "bad".into() }),
            row(6, "b@x.io"),
        ];
        assert_eq!(distinct_keys::<Contact>(&rows), vec!["a@x.io", "b@x.io"]);
    }
}
