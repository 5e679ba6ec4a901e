//! Field-level validation errors.

use std::collections::BTreeMap;
use std::fmt;

/// Reason used when a required attribute is missing or empty.
pub const UNDEFINED_ATTRIBUTE: &str = "undefined attribute";

/// Reason used when a numeric attribute is negative.
pub const NEGATIVE_ATTRIBUTE: &str = "negative attribute";

/// Every failing field of a validated value, keyed by field name.
///
/// Fields are kept sorted so the rendered message is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure for `field`; a later failure for the same field
    /// replaces the earlier one.
    pub fn insert(&mut self, field: impl Into<String>, reason: impl fmt::Display) {
        self.0.insert(field.into(), reason.to_string());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    /// Merge another error set under `prefix`.
    pub fn nest(&mut self, prefix: &str, other: FieldErrors) {
        for (field, reason) in other.0 {
            self.0.insert(format!("{prefix}.{field}"), reason);
        }
    }

    /// `Ok(())` when nothing failed.
    ///
    /// # Errors
    ///
    /// Returns `self` when at least one field failed.
    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self.0.len();
        write!(f, "{count} error{} occurred:", if count == 1 { "" } else { "s" })?;
        for (field, reason) in &self.0 {
            write!(f, " {field}: {reason};")?;
        }
        Ok(())
    }
}

impl std::error::Error for FieldErrors {}
