//! Domain models.
//!
//! - [`Contact`] - a person keyed by email address
//! - [`Product`] - a catalog entry keyed by product code
//! - [`EntityKind`] - which of the two an import or route targets

mod contact;
mod product;

pub use contact::{Contact, ContactDraft};
pub use product::{Product, ProductDraft};

use serde::{Deserialize, Serialize};

// =============================================================================
// Entity Kind
// =============================================================================

/// The entity types the service can import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Contact,
    Product,
}

impl EntityKind {
    /// URL segment and table name.
    pub fn collection(&self) -> &'static str {
        match self {
            Self::Contact => "contacts",
            Self::Product => "products",
        }
    }

    /// Message returned when a lookup by id misses.
    pub fn not_found_message(&self) -> &'static str {
        match self {
            Self::Contact => "Record not found",
            Self::Product => "Product not found",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.collection())
    }
}

/// Blank cells become `None`.
pub(crate) fn non_blank(value: &str) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
