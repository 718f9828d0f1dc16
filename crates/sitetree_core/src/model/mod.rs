//! Domain model for buildings and their location hierarchy.
//!
//! # Responsibility
//! - Define the records persisted by the hierarchy store.
//! - Own field-level validation shared by create and update paths.
//!
//! # Invariants
//! - Identifiers are server-assigned SQLite row ids and never reused.
//! - Structural invariants (existence, acyclicity) live in services, not here.

pub mod building;
pub mod location;

use std::error::Error;
use std::fmt::{Display, Formatter};

/// Field-level validation failure for buildings and locations.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Required text field is empty after trim.
    BlankField(&'static str),
    /// Area must be a finite number greater than zero.
    NonPositiveArea(f64),
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankField(field) => write!(f, "{field} must not be blank"),
            Self::NonPositiveArea(value) => write!(f, "area must be positive, got {value}"),
        }
    }
}

impl Error for ValidationError {}

pub(crate) fn require_text(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::BlankField(field));
    }
    Ok(())
}
