//! Per-row validation rules.
//!
//! Every rule set is a pure function returning the *first* violated rule as a
//! human-readable reason, or `None` when the row passes. Rules never look at
//! the store.
//!
//! # Contacts
//!
//! Checked in this order:
//!
//! 1. `Name` is not blank
//! 2. `Email` is not blank
//! 3. `Email` is a plausible address (`local@domain`, one `@`, no spaces)
//! 4. `Name` is at most [`MAX_TEXT_LENGTH`] characters
//! 5. `Email` is at most [`MAX_TEXT_LENGTH`] characters
//!
//! # Products
//!
//! Only `ProductCode` is required. Prices and stock levels are deliberately
//! not range-checked; a value that does not parse fails later, when the row is
//! converted.

use once_cell::sync::Lazy;
use regex::Regex;

/// Maximum length of contact names and email addresses.
pub const MAX_TEXT_LENGTH: usize = 255;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s.]+(\.[^@\s.]+)*$").expect("email pattern compiles")
});

/// Whether `email` looks like `local@domain`.
///
/// This is intentionally narrower than RFC 5322: quoted local parts, comments
/// and IP literals are rejected.
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

fn too_long(value: &str) -> bool {
    value.chars().count() > MAX_TEXT_LENGTH
}

/// Validate the fields of a contact row.
pub fn validate_contact(name: &str, email: &str) -> Option<String> {
    if is_blank(name) {
        return Some("Name is required".to_string());
    }
    if is_blank(email) {
        return Some("Email is required".to_string());
    }
    if !is_valid_email(email) {
        return Some("Email format is invalid".to_string());
    }
    if too_long(name) {
        return Some(format!("Name is too long (max {} characters)", MAX_TEXT_LENGTH));
    }
    if too_long(email) {
        return Some(format!("Email is too long (max {} characters)", MAX_TEXT_LENGTH));
    }
    None
}

/// Validate the fields of a product row.
pub fn validate_product(product_code: &str) -> Option<String> {
    if is_blank(product_code) {
        return Some("ProductCode is required".to_string());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_contact() {
        assert_eq!(validate_contact("Ann", "ann@example.com"), None);
    }

    #[test]
    fn test_name_checked_before_email() {
        assert_eq!(
            validate_contact("", "bad-email").as_deref(),
            Some("Name is required")
        );
        assert_eq!(
            validate_contact("   ", "").as_deref(),
            Some("Name is required")
        );
    }

    #[test]
    fn test_email_required_then_format() {
        assert_eq!(validate_contact("Ann", " ").as_deref(), Some("Email is required"));
        assert_eq!(
            validate_contact("Ann", "ann.example.com").as_deref(),
            Some("Email format is invalid")
        );
    }

    #[test]
    fn test_length_limits() {
        let long_name = "x".repeat(256);
        assert_eq!(
            validate_contact(&long_name, "a@b.co").as_deref(),
            Some("Name is too long (max 255 characters)")
        );
        assert_eq!(validate_contact(&"x".repeat(255), "a@b.co"), None);

        let long_email = format!("{}@example.com", "a".repeat(250));
        assert_eq!(
            validate_contact("Ann", &long_email).as_deref(),
            Some("Email is too long (max 255 characters)")
        );
    }

    #[test]
    fn test_length_counts_characters_not_bytes() {
        let name = "é".repeat(200);
        assert_eq!(validate_contact(&name, "a@b.co"), None);
    }

    #[test]
    fn test_email_grammar() {
        for ok in ["a@b.co", "first.last+tag@sub.example.org", "root@localhost"] {
            assert!(is_valid_email(ok), "{ok} should be accepted");
        }
        for bad in [
            "plain",
            "@example.com",
            "ann@",
            "ann@@example.com",
            "a@b@c.com",
            "ann @example.com",
            "ann@.com",
            "ann@example..com",
            "ann@example.com.",
        ] {
            assert!(!is_valid_email(bad), "{bad} should be rejected");
        }
    }

    #[test]
    fn test_product_code_required() {
        assert_eq!(
            validate_product("  ").as_deref(),
            Some("ProductCode is required")
        );
        assert_eq!(validate_product("SKU-1"), None);
    }
}
