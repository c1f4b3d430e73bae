use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::EntityKind;
use crate::import::{assign, Importable, TrackedField};
use crate::parser::{Column, CsvRow};
use crate::validation::validate_contact;

/// A contact record. Email is the natural key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    /// Store-assigned identifier; `None` until the first commit.
    pub id: Option<i64>,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub created_at: DateTime<Utc>,
    /// Set only when an import actually changes a field.
    pub updated_at: Option<DateTime<Utc>>,
}

/// Values read from one contact row.
#[derive(Debug, Clone, PartialEq)]
pub struct ContactDraft {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
}

const COLUMNS: &[Column] = &[
    Column::required("Name"),
    Column::required("Email"),
    Column::optional("Phone"),
    Column::optional("Address"),
];

const TRACKED: &[TrackedField<Contact, ContactDraft>] = &[
    TrackedField { name: "name", merge: |c, d| assign(&mut c.name, &d.name) },
    TrackedField { name: "phone", merge: |c, d| assign(&mut c.phone, &d.phone) },
    TrackedField { name: "address", merge: |c, d| assign(&mut c.address, &d.address) },
];

impl Importable for Contact {
    type Draft = ContactDraft;

    const KIND: EntityKind = EntityKind::Contact;
    const COLUMNS: &'static [Column] = COLUMNS;
    const KEY_COLUMN: &'static str = "Email";

    fn tracked_fields() -> &'static [TrackedField<Self, Self::Draft>] {
        TRACKED
    }

    fn validate(row: &CsvRow) -> Option<String> {
        validate_contact(row.get("Name"), row.get("Email"))
    }

    fn draft(row: &CsvRow) -> Result<ContactDraft, String> {
        Ok(ContactDraft {
            name: row.get("Name").to_string(),
            email: row.get("Email").to_string(),
            phone: row.get("Phone").to_string(),
            address: row.get("Address").to_string(),
        })
    }

    fn create(draft: ContactDraft, now: DateTime<Utc>) -> Self {
        Self {
            id: None,
            name: draft.name,
            email: draft.email,
            phone: draft.phone,
            address: draft.address,
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
    use chrono::TimeZone;

    fn row(values: [&str; 4]) -> CsvRow {
        CsvRow::new(2, COLUMNS, values.iter().map(|v| v.to_string()).collect())
    }

    #[test]
    fn test_create_from_row() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        let draft = Contact::draft(&row(["Ann", "ann@example.com", "555", "1 Rd"])).unwrap();
        let contact = Contact::create(draft, now);

        assert_eq!(contact.id, None);
        assert_eq!(contact.email, "ann@example.com");
        assert_eq!(contact.address, "1 Rd");
        assert_eq!(contact.created_at, now);
        assert_eq!(contact.updated_at, None);
    }

    #[test]
    fn test_serializes_camel_case() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        let draft = Contact::draft(&row(["Ann", "ann@example.com", "", ""])).unwrap();
        let json = serde_json::to_value(Contact::create(draft, now)).unwrap();

        assert!(json.get("createdAt").is_some());
        assert!(json["updatedAt"].is_null());
    }

    #[test]
    fn test_email_is_not_tracked() {
        assert!(Contact::tracked_fields().iter().all(|f| f.name != "email"));
    }
}
