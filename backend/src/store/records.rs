//! Row mapping between the domain models and their SQLite tables.

use std::str::FromStr;

use bigdecimal::BigDecimal;
use rusqlite::types::Type;
use rusqlite::{params, Row, Transaction};

use crate::models::{Contact, Product};

/// An entity with a table of its own.
pub trait SqliteRecord: Sized + Send + Sync + 'static {
    const TABLE: &'static str;
    /// Column holding the natural key (unique index).
    const KEY_COLUMN: &'static str;
    /// Select list, in the order [`from_row`](Self::from_row) reads it.
    const SELECT: &'static str;

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;

    fn key(&self) -> &str;

    fn id(&self) -> Option<i64>;

    /// Insert and return the new row id.
    fn insert(&self, tx: &Transaction<'_>) -> rusqlite::Result<i64>;

    /// Overwrite the stored row with this entity's fields.
    fn update(&self, tx: &Transaction<'_>) -> rusqlite::Result<usize>;
}

fn decimal_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<BigDecimal> {
    let raw: String = row.get(idx)?;
    BigDecimal::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

// =============================================================================
// Contacts
// =============================================================================

impl SqliteRecord for Contact {
    const TABLE: &'static str = "contacts";
    const KEY_COLUMN: &'static str = "email";
    const SELECT: &'static str = "id, name, email, phone, address, created_at, updated_at";

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            name: row.get(1)?,
            email: row.get(2)?,
            phone: row.get(3)?,
            address: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }

    fn key(&self) -> &str {
        &self.email
    }

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn insert(&self, tx: &Transaction<'_>) -> rusqlite::Result<i64> {
        tx.prepare_cached(
            "INSERT INTO contacts (name, email, phone, address, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?
        .execute(params![
            self.name,
            self.email,
            self.phone,
            self.address,
            self.created_at,
            self.updated_at,
        ])?;
        Ok(tx.last_insert_rowid())
    }

    fn update(&self, tx: &Transaction<'_>) -> rusqlite::Result<usize> {
        tx.prepare_cached(
            "UPDATE contacts SET name = ?1, phone = ?2, address = ?3, updated_at = ?4
             WHERE id = ?5",
        )?
        .execute(params![self.name, self.phone, self.address, self.updated_at, self.id])
    }
}

// =============================================================================
// Products
// =============================================================================

impl SqliteRecord for Product {
    const TABLE: &'static str = "products";
    const KEY_COLUMN: &'static str = "product_code";
    const SELECT: &'static str = "id, product_code, name, description, price, cost, stock, \
                                  min_stock, image_url, is_active, created_at, updated_at";

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            product_code: row.get(1)?,
            name: row.get(2)?,
            description: row.get(3)?,
            price: decimal_column(row, 4)?,
            cost: decimal_column(row, 5)?,
            stock: row.get(6)?,
            min_stock: row.get(7)?,
            image_url: row.get(8)?,
            is_active: row.get(9)?,
            created_at: row.get(10)?,
            updated_at: row.get(11)?,
        })
    }

    fn key(&self) -> &str {
        &self.product_code
    }

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn insert(&self, tx: &Transaction<'_>) -> rusqlite::Result<i64> {
        tx.prepare_cached(
            "INSERT INTO products (product_code, name, description, price, cost, stock,
                                   min_stock, image_url, is_active, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        )?
        .execute(params![
            self.product_code,
            self.name,
            self.description,
            self.price.to_string(),
            self.cost.to_string(),
            self.stock,
            self.min_stock,
            self.image_url,
            self.is_active,
            self.created_at,
            self.updated_at,
        ])?;
        Ok(tx.last_insert_rowid())
    }

    fn update(&self, tx: &Transaction<'_>) -> rusqlite::Result<usize> {
        tx.prepare_cached(
            "UPDATE products SET name = ?1, description = ?2, price = ?3, cost = ?4, stock = ?5,
                                 min_stock = ?6, image_url = ?7, updated_at = ?8
             WHERE id = ?9",
        )?
        .execute(params![
            self.name,
            self.description,
            self.price.to_string(),
            self.cost.to_string(),
            self.stock,
            self.min_stock,
            self.image_url,
            self.updated_at,
            self.id,
        ])
    }
}
