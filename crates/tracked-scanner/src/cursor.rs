//! Pagination cursor handling.
//!
//! The listing API is inconsistent about how it says "no more pages": it may
//! omit `nextPageCursor`, send JSON `null`, or send the strings `"null"`,
//! `"undefined"` or `""`. All of these mean the listing is exhausted, and
//! [`Cursor::from_wire`] is the only place that decides it.

use serde_json::Value;
use std::fmt;

/// Values of `nextPageCursor` that mean "no further pages".
const EXHAUSTED_SENTINELS: [&str; 3] = ["", "null", "undefined"];

/// Opaque continuation token for the next page of a listing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Cursor(String);

impl Cursor {
    /// Interpret a raw string, returning `None` for exhaustion sentinels.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if EXHAUSTED_SENTINELS.contains(&trimmed) {
            None
        } else {
            Some(Self(raw.to_string()))
        }
    }

    /// Interpret the `nextPageCursor` field of a listing payload.
    ///
    /// Absent fields and non-string values are treated as exhaustion.
    #[must_use]
    pub fn from_wire(value: Option<&Value>) -> Option<Self> {
        match value {
            Some(Value::String(raw)) => Self::parse(raw),
            _ => None,
        }
    }

    /// The raw token.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_valid_cursor() {
        let value = json!("eyJrZXkiOiJ2YWx1ZSJ9");
        let cursor = Cursor::from_wire(Some(&value)).expect("cursor present");
        assert_eq!(cursor.as_str(), "eyJrZXkiOiJ2YWx1ZSJ9");
    }

    #[test]
    fn test_exhaustion_sentinels() {
        assert_eq!(Cursor::from_wire(None), None);
        assert_eq!(Cursor::from_wire(Some(&Value::Null)), None);
        assert_eq!(Cursor::from_wire(Some(&json!(""))), None);
        assert_eq!(Cursor::from_wire(Some(&json!("null"))), None);
        assert_eq!(Cursor::from_wire(Some(&json!("undefined"))), None);
        assert_eq!(Cursor::from_wire(Some(&json!("  "))), None);
    }

    #[test]
    fn test_non_string_values_are_exhaustion() {
        assert_eq!(Cursor::from_wire(Some(&json!(42))), None);
        assert_eq!(Cursor::from_wire(Some(&json!({"next": "abc"}))), None);
        assert_eq!(Cursor::from_wire(Some(&json!(false))), None);
    }
}
