//! Value types for the VM Request context.

use serde::{Deserialize, Serialize};
use vmforge_core::error::DomainError;

/// A syntactically plausible email address.
///
/// Parsing is deliberately lenient — a single `@` with non-empty local and
/// domain parts and no whitespace. A requester record with an address this
/// cannot parse still gets its VM; it just gets no notification emails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailAddress(String);

impl EmailAddress {
    /// Parses an email address.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the input is not of the form
    /// `local@domain` with non-empty parts and no whitespace.
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let raw = raw.trim();
        if raw.chars().any(char::is_whitespace) {
            return Err(DomainError::Validation(
                "email address must not contain whitespace".into(),
            ));
        }
        match raw.split_once('@') {
            Some((local, domain))
                if !local.is_empty() && !domain.is_empty() && !domain.contains('@') =>
            {
                Ok(Self(raw.to_owned()))
            }
            _ => Err(DomainError::Validation(format!(
                "not a valid email address: {raw}"
            ))),
        }
    }

    /// Returns the address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// An opaque VM size category (e.g. "S", "M", "XL").
///
/// Catalogs, pricing and resource dimensions live outside this context;
/// only non-emptiness is enforced here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeCategory(String);

impl SizeCategory {
    /// Creates a size category.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the category is empty.
    pub fn new(raw: &str) -> Result<Self, DomainError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(DomainError::Validation(
                "size category must not be empty".into(),
            ));
        }
        Ok(Self(raw.to_owned()))
    }

    /// Returns the category as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SizeCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
