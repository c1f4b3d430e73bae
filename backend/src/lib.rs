//! # CSV Upsert - bulk import of contacts and products
//!
//! Upserts CSV uploads into a SQLite store keyed by natural key (contact
//! email, product code): new keys are inserted, changed rows update the
//! stored entity, identical rows are left alone. Bad rows are reported and
//! skipped without aborting the batch.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  CSV bytes  │────▶│   Decoder   │────▶│  Reconcile  │────▶│   Commit    │
//! │  (any enc)  │     │  (auto-enc) │     │ (snapshot)  │     │  (SQLite)   │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//!                                                │
//!                                                ▼
//!                                         ImportResult
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use csv_upsert::{Database, ImportService, SystemClock};
//!
//! #[tokio::main]
//! async fn main() {
//!     let db = Database::open("csv-import.db").unwrap();
//!     let contacts = ImportService::new(Arc::new(db.contacts()), Arc::new(SystemClock));
//!     let result = contacts.import_bytes(b"Name,Email\nAnn,ann@example.com\n", "people.csv").await;
//!     println!("{}", result.message);
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Layered error types
//! - [`models`] - Contact and Product
//! - [`parser`] - CSV decoding with encoding and delimiter detection
//! - [`validation`] - Per-row validation rules
//! - [`import`] - Reconciliation, reporting and the import service
//! - [`store`] - SQLite persistence gateway
//! - [`api`] - HTTP API server
//! - [`config`] - Server and store settings
//! - [`logging`] - Tracing setup

// Core modules
pub mod error;
pub mod models;

// Parsing & validation
pub mod parser;
pub mod validation;

// Import pipeline
pub mod import;

// Persistence
pub mod store;

// HTTP API
pub mod api;

// Runtime
pub mod config;
pub mod logging;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{CsvError, ImportError, ServerError, StoreError};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{Contact, ContactDraft, EntityKind, Product, ProductDraft};

// =============================================================================
// Re-exports - CSV Decoding
// =============================================================================

pub use parser::{decode, decode_content, detect_delimiter, detect_encoding, Column, CsvRow, CsvRows, RowError};

// =============================================================================
// Re-exports - Validation
// =============================================================================

pub use validation::{is_valid_email, validate_contact, validate_product};

// =============================================================================
// Re-exports - Import
// =============================================================================

pub use import::{
    reconcile, Clock, FixedClock, ImportOutcome, ImportReport, ImportResult, ImportService, Importable,
    Reconciliation, SystemClock,
};

// =============================================================================
// Re-exports - Store
// =============================================================================

pub use store::{Changeset, CommitSummary, Database, EntityStore, SqliteStore};

// =============================================================================
// Re-exports - API
// =============================================================================

pub use api::{router, start_server, AppState};
pub use config::{ServerConfig, StoreConfig};
