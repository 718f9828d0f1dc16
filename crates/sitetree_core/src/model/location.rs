//! Location domain model.
//!
//! # Responsibility
//! - Define the persisted location record and its create/update inputs.
//! - Validate scalar fields (`name`, `area`, `location_code`).
//!
//! # Invariants
//! - `building_id` is mandatory; `parent_id` is optional.
//! - Children are never stored on the record; they are derived from
//!   `parent_id` by the store.

use super::building::BuildingId;
use super::{require_text, ValidationError};
use serde::{Deserialize, Serialize};

/// Server-assigned location identifier.
pub type LocationId = i64;

/// Node in a building's spatial hierarchy (room, floor, area).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub id: LocationId,
    pub name: String,
    pub area: f64,
    /// Application-level code; not required to be unique.
    pub location_code: String,
    /// `None` means root-level location.
    pub parent_id: Option<LocationId>,
    pub building_id: BuildingId,
}

impl Location {
    /// Checks field-level constraints before persistence.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_fields(&self.name, self.area, &self.location_code)
    }
}

/// Input for creating one location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLocation {
    pub name: String,
    pub area: f64,
    pub location_code: String,
    pub building_id: BuildingId,
    #[serde(default)]
    pub parent_id: Option<LocationId>,
}

impl NewLocation {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_fields(&self.name, self.area, &self.location_code)
    }

    /// Returns a copy with text fields trimmed.
    pub fn normalized(&self) -> Self {
        Self {
            name: self.name.trim().to_string(),
            location_code: self.location_code.trim().to_string(),
            ..self.clone()
        }
    }
}

/// Partial location update.
///
/// `parent_id` distinguishes three cases:
/// - `None`: parent untouched.
/// - `Some(None)`: detach, the location becomes a root.
/// - `Some(Some(id))`: re-parent under `id` (cycle-checked).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocationPatch {
    pub name: Option<String>,
    pub area: Option<f64>,
    pub location_code: Option<String>,
    pub building_id: Option<BuildingId>,
    pub parent_id: Option<Option<LocationId>>,
}

impl LocationPatch {
    /// Applies provided scalar fields onto `location`.
    ///
    /// Reference fields (`parent_id`, `building_id`) are applied by the
    /// service after their existence checks.
    pub fn apply_scalars(&self, location: &mut Location) {
        if let Some(name) = &self.name {
            location.name = name.trim().to_string();
        }
        if let Some(area) = self.area {
            location.area = area;
        }
        if let Some(code) = &self.location_code {
            location.location_code = code.trim().to_string();
        }
    }
}

/// Location read model with parent and direct children populated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationDetail {
    #[serde(flatten)]
    pub location: Location,
    pub parent: Option<Location>,
    pub children: Vec<Location>,
}

fn validate_fields(name: &str, area: f64, location_code: &str) -> Result<(), ValidationError> {
    require_text("name", name)?;
    require_text("location_code", location_code)?;
    if !area.is_finite() || area <= 0.0 {
        return Err(ValidationError::NonPositiveArea(area));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{Location, LocationPatch, NewLocation};
    use crate::model::ValidationError;

    fn sample() -> Location {
        Location {
            id: 1,
            name: "Floor 1".to_string(),
            area: 120.0,
            location_code: "F1".to_string(),
            parent_id: None,
            building_id: 7,
        }
    }

    #[test]
    fn validate_rejects_blank_name_and_code() {
        let mut location = sample();
        location.name = "   ".to_string();
        assert_eq!(location.validate(), Err(ValidationError::BlankField("name")));

        let mut location = sample();
        location.location_code = String::new();
        assert_eq!(
            location.validate(),
            Err(ValidationError::BlankField("location_code"))
        );
    }

    #[test]
    fn validate_rejects_non_positive_or_nan_area() {
        for area in [0.0, -3.5, f64::NAN, f64::INFINITY] {
            let mut location = sample();
            location.area = area;
            assert!(matches!(
                location.validate(),
                Err(ValidationError::NonPositiveArea(_))
            ));
        }
    }

    #[test]
    fn patch_applies_only_provided_scalars() {
        let mut location = sample();
        let patch = LocationPatch {
            name: Some("  Lobby ".to_string()),
            ..LocationPatch::default()
        };
        patch.apply_scalars(&mut location);

        assert_eq!(location.name, "Lobby");
        assert_eq!(location.area, 120.0);
        assert_eq!(location.location_code, "F1");
        assert_eq!(location.building_id, 7);
    }

    #[test]
    fn new_location_deserializes_camel_case_without_parent() {
        let input: NewLocation = serde_json::from_str(
            r#"{"name":"Room","area":12.5,"locationCode":"R-1","buildingId":3}"#,
        )
        .expect("valid payload");
        assert_eq!(input.parent_id, None);
        assert_eq!(input.building_id, 3);
        assert_eq!(input.location_code, "R-1");
    }
}
