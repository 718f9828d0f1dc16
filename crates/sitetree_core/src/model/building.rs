//! Building domain model.

use super::location::Location;
use super::{require_text, ValidationError};
use serde::{Deserialize, Serialize};

/// Server-assigned building identifier.
pub type BuildingId = i64;

/// Root-level container scoping a set of locations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Building {
    pub id: BuildingId,
    pub name: String,
}

impl Building {
    /// Checks field-level constraints before persistence.
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("name", &self.name)
    }
}

/// Partial building update; `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildingPatch {
    pub name: Option<String>,
}

/// Building read model with its locations populated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildingDetail {
    #[serde(flatten)]
    pub building: Building,
    pub locations: Vec<Location>,
}
