use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{non_blank, EntityKind};
use crate::import::{assign, Importable, TrackedField};
use crate::parser::{Column, CsvRow};
use crate::validation::validate_product;

/// A catalog entry. Product code is the natural key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    /// Store-assigned identifier; `None` until the first commit.
    pub id: Option<i64>,
    pub product_code: String,
    pub name: String,
    pub description: Option<String>,
    pub price: BigDecimal,
    pub cost: BigDecimal,
    pub stock: i32,
    pub min_stock: i32,
    pub image_url: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    /// Set only when an import actually changes a field.
    pub updated_at: Option<DateTime<Utc>>,
}

/// Values read from one product row.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductDraft {
    pub product_code: String,
    pub name: String,
    pub description: Option<String>,
    pub price: BigDecimal,
    pub cost: BigDecimal,
    pub stock: i32,
    pub min_stock: i32,
    pub image_url: Option<String>,
}

const COLUMNS: &[Column] = &[
    Column::required("ProductCode"),
    Column::required("Name"),
    Column::optional("Description"),
    Column::required("Price"),
    Column::required("Cost"),
    Column::required("Stock"),
    Column::required("MinStock"),
    Column::optional("ImageUrl"),
];

const TRACKED: &[TrackedField<Product, ProductDraft>] = &[
    TrackedField { name: "name", merge: |p, d| assign(&mut p.name, &d.name) },
    TrackedField { name: "description", merge: |p, d| assign(&mut p.description, &d.description) },
    TrackedField { name: "price", merge: |p, d| assign(&mut p.price, &d.price) },
    TrackedField { name: "cost", merge: |p, d| assign(&mut p.cost, &d.cost) },
    TrackedField { name: "stock", merge: |p, d| assign(&mut p.stock, &d.stock) },
    TrackedField { name: "min_stock", merge: |p, d| assign(&mut p.min_stock, &d.min_stock) },
    TrackedField { name: "image_url", merge: |p, d| assign(&mut p.image_url, &d.image_url) },
];

fn parse_decimal(row: &CsvRow, column: &str) -> Result<BigDecimal, String> {
    let raw = row.get(column);
    BigDecimal::from_str(raw)
        .map_err(|_| format!("Invalid {} '{}': expected a decimal number", column, raw))
}

fn parse_count(row: &CsvRow, column: &str) -> Result<i32, String> {
    let raw = row.get(column);
    raw.parse::<i32>()
        .map_err(|_| format!("Invalid {} '{}': expected a whole number", column, raw))
}

impl Importable for Product {
    type Draft = ProductDraft;

    const KIND: EntityKind = EntityKind::Product;
    const COLUMNS: &'static [Column] = COLUMNS;
    const KEY_COLUMN: &'static str = "ProductCode";

    fn tracked_fields() -> &'static [TrackedField<Self, Self::Draft>] {
        TRACKED
    }

    fn validate(row: &CsvRow) -> Option<String> {
        validate_product(row.get("ProductCode"))
    }

    fn draft(row: &CsvRow) -> Result<ProductDraft, String> {
        Ok(ProductDraft {
            product_code: row.get("ProductCode").to_string(),
            name: row.get("Name").to_string(),
            description: non_blank(row.get("Description")),
            price: parse_decimal(row, "Price")?,
            cost: parse_decimal(row, "Cost")?,
            stock: parse_count(row, "Stock")?,
            min_stock: parse_count(row, "MinStock")?,
            image_url: non_blank(row.get("ImageUrl")),
        })
    }

    fn create(draft: ProductDraft, now: DateTime<Utc>) -> Self {
        Self {
            id: None,
            product_code: draft.product_code,
            name: draft.name,
            description: draft.description,
            price: draft.price,
            cost: draft.cost,
            stock: draft.stock,
            min_stock: draft.min_stock,
            image_url: draft.image_url,
            is_active: true,
            created_at: now,
            updated_at: None,
        }
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(values: [&str; 8]) -> CsvRow {
        CsvRow::new(2, COLUMNS, values.iter().map(|v| v.to_string()).collect())
    }

    #[test]
    fn test_draft_parses_numbers() {
        let draft = Product::draft(&row(["P-1", "Widget", "", "10.50", "4", "12", "3", ""])).unwrap();

        assert_eq!(draft.price, BigDecimal::from_str("10.5").unwrap());
        assert_eq!(draft.stock, 12);
        assert_eq!(draft.min_stock, 3);
        assert_eq!(draft.description, None);
        assert_eq!(draft.image_url, None);
    }

    #[test]
    fn test_bad_number_is_reported() {
        let err = Product::draft(&row(["P-1", "Widget", "", "ten", "4", "12", "3", ""])).unwrap_err();
        assert_eq!(err, "Invalid Price 'ten': expected a decimal number");

        let err = Product::draft(&row(["P-1", "Widget", "", "1", "4", "1.5", "3", ""])).unwrap_err();
        assert_eq!(err, "Invalid Stock '1.5': expected a whole number");
    }

    #[test]
    fn test_blank_price_is_not_zero() {
        assert!(Product::draft(&row(["P-1", "Widget", "", "", "4", "1", "1", ""])).is_err());
    }

    #[test]
    fn test_new_products_are_active() {
        let draft = Product::draft(&row(["P-1", "Widget", "Blue", "1", "1", "1", "1", "http://img"])).unwrap();
        let product = Product::create(draft, Utc::now());
        assert!(product.is_active);
        assert_eq!(product.description.as_deref(), Some("Blue"));
    }

    #[test]
    fn test_price_change_detected_by_value() {
        let draft = Product::draft(&row(["P-1", "Widget", "", "10.5", "4", "1", "1", ""])).unwrap();
        let mut product = Product::create(draft, Utc::now());

        let same_value = Product::draft(&row(["P-1", "Widget", "", "10.50", "4.0", "1", "1", ""])).unwrap();
        let changed = Product::tracked_fields()
            .iter()
            .fold(false, |acc, f| (f.merge)(&mut product, &same_value) | acc);
        assert!(!changed);
    }
}
