//! Import report: per-row outcomes folded into counts and messages.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

use super::reconcile::{ImportOutcome, RowOutcome};

/// Aggregate result of one import, returned to API callers as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResult {
    /// `false` only when the import failed as a whole.
    pub success: bool,
    pub records_imported: usize,
    pub records_updated: usize,
    pub records_failed: usize,
    pub message: String,
    /// `"Row {n}: {reason}"` entries in file order.
    pub errors: Vec<String>,
}

impl ImportResult {
    /// The upload had no bytes.
    pub fn empty_file() -> Self {
        Self::aborted("File is empty", Vec::new())
    }

    /// The import could not complete (decoder header failure, store fault).
    pub fn failure(cause: impl Display) -> Self {
        let cause = cause.to_string();
        Self::aborted(format!("Error importing CSV: {}", cause), vec![cause])
    }

    fn aborted(message: impl Into<String>, errors: Vec<String>) -> Self {
        Self {
            success: false,
            records_imported: 0,
            records_updated: 0,
            records_failed: 0,
            message: message.into(),
            errors,
        }
    }
}

/// Accumulates row outcomes.
#[derive(Debug, Default)]
pub struct ImportReport {
    imported: usize,
    updated: usize,
    failed: usize,
    errors: Vec<String>,
}

impl ImportReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, outcome: &RowOutcome) {
        match &outcome.outcome {
            ImportOutcome::Inserted => self.imported += 1,
            ImportOutcome::Updated => self.updated += 1,
            ImportOutcome::Unchanged => {}
            ImportOutcome::Failed(reason) => {
                self.failed += 1;
                self.errors.push(format!("Row {}: {}", outcome.row, reason));
            }
        }
    }

    pub fn from_outcomes<'a>(outcomes: impl IntoIterator<Item = &'a RowOutcome>) -> Self {
        let mut report = Self::new();
        for outcome in outcomes {
            report.record(outcome);
        }
        report
    }

    pub fn summary(&self) -> String {
        format!(
            "Import completed: {} new, {} updated, {} failed",
            self.imported, self.updated, self.failed
        )
    }

    /// Final result for a batch whose commit succeeded.
    pub fn finish(self) -> ImportResult {
        ImportResult {
            success: true,
            message: self.summary(),
            records_imported: self.imported,
            records_updated: self.updated,
            records_failed: self.failed,
            errors: self.errors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(row: usize, outcome: ImportOutcome) -> RowOutcome {
        RowOutcome { row, outcome }
    }

    #[test]
    fn test_counts_and_messages() {
        let outcomes = vec![
            outcome(2, ImportOutcome::Inserted),
            outcome(3, ImportOutcome::Failed("Name is required".into())),
            outcome(4, ImportOutcome::Updated),
            outcome(5, ImportOutcome::Unchanged),
            outcome(6, ImportOutcome::Failed("Email format is invalid".into())),
        ];
        let result = ImportReport::from_outcomes(&outcomes).finish();

        assert!(result.success);
        assert_eq!(result.records_imported, 1);
        assert_eq!(result.records_updated, 1);
        assert_eq!(result.records_failed, 2);
        assert_eq!(result.message, "Import completed: 1 new, 1 updated, 2 failed");
        assert_eq!(
            result.errors,
            vec!["Row 3: Name is required", "Row 6: Email format is invalid"]
        );
    }

    #[test]
    fn test_row_failures_do_not_clear_success() {
        let result = ImportReport::from_outcomes(&[outcome(2, ImportOutcome::Failed("x".into()))]).finish();
        assert!(result.success);
    }

    #[test]
    fn test_failure_result() {
        let result = ImportResult::failure("Unique constraint violated: contacts.email");
        assert!(!result.success);
        assert_eq!(
            result.message,
            "Error importing CSV: Unique constraint violated: contacts.email"
        );
        assert_eq!(result.errors, vec!["Unique constraint violated: contacts.email"]);
    }

    #[test]
    fn test_json_shape() {
        let json = serde_json::to_value(ImportResult::empty_file()).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["message"], "File is empty");
        assert_eq!(json["recordsImported"], 0);
        assert!(json["errors"].as_array().unwrap().is_empty());
    }
}
