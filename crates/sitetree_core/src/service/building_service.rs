//! Building use-case service.
//!
//! # Invariants
//! - A building that still owns locations cannot be deleted.
//! - Updates replace only provided fields.

use super::{log_failure, ErrorKind};
use crate::model::building::{Building, BuildingDetail, BuildingId, BuildingPatch};
use crate::model::ValidationError;
use crate::repo::building_repo::BuildingRepository;
use crate::repo::location_repo::LocationRepository;
use crate::repo::RepoError;
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};

const MODULE: &str = "building";

/// Errors from building service operations.
#[derive(Debug)]
pub enum BuildingServiceError {
    /// Field failed validation.
    Validation(ValidationError),
    /// Target building does not exist.
    BuildingNotFound(BuildingId),
    /// Building still owns locations and cannot be deleted.
    BuildingInUse {
        building_id: BuildingId,
        location_count: usize,
    },
    /// Repository-level failure.
    Repo(RepoError),
}

impl BuildingServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::BuildingNotFound(_) => ErrorKind::NotFound,
            Self::Validation(_) | Self::BuildingInUse { .. } => ErrorKind::InvalidArgument,
            Self::Repo(_) => ErrorKind::StoreFailure,
        }
    }
}

impl Display for BuildingServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::BuildingNotFound(id) => write!(f, "building not found: {id}"),
            Self::BuildingInUse {
                building_id,
                location_count,
            } => write!(
                f,
                "building {building_id} still has {location_count} location(s)"
            ),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for BuildingServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for BuildingServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Validation(err) => Self::Validation(err),
            RepoError::BuildingNotFound(id) => Self::BuildingNotFound(id),
            other => Self::Repo(other),
        }
    }
}

/// Building service facade.
pub struct BuildingService<B: BuildingRepository, L: LocationRepository> {
    buildings: B,
    locations: L,
}

impl<B: BuildingRepository, L: LocationRepository> BuildingService<B, L> {
    /// Creates service from repositories sharing one connection.
    pub fn new(buildings: B, locations: L) -> Self {
        Self {
            buildings,
            locations,
        }
    }

    pub fn create(&self, name: &str) -> Result<Building, BuildingServiceError> {
        let result = self
            .buildings
            .create_building(name)
            .map_err(BuildingServiceError::from);
        match &result {
            Ok(building) => info!(
                "event=building_create module={MODULE} status=ok building_id={}",
                building.id
            ),
            Err(err) => log_failure("building_create", MODULE, &"new", err.kind(), err),
        }
        result
    }

    /// Lists all buildings with their locations.
    pub fn list(&self) -> Result<Vec<BuildingDetail>, BuildingServiceError> {
        let result: Result<Vec<BuildingDetail>, BuildingServiceError> = self
            .buildings
            .list_buildings()
            .map_err(BuildingServiceError::from)
            .and_then(|buildings| {
                buildings
                    .into_iter()
                    .map(|building| self.populate(building))
                    .collect::<Result<Vec<_>, _>>()
            });
        if let Err(err) = &result {
            log_failure("building_list", MODULE, &"all", err.kind(), err);
        }
        result
    }

    /// Loads one building with its locations.
    pub fn find(&self, id: BuildingId) -> Result<BuildingDetail, BuildingServiceError> {
        let result = self
            .buildings
            .get_building(id)
            .map_err(BuildingServiceError::from)
            .and_then(|found| found.ok_or(BuildingServiceError::BuildingNotFound(id)))
            .and_then(|building| self.populate(building));
        if let Err(err) = &result {
            log_failure("building_get", MODULE, &id, err.kind(), err);
        }
        result
    }

    /// Replaces provided fields of one building.
    pub fn update(&self, id: BuildingId, patch: &BuildingPatch) -> Result<(), BuildingServiceError> {
        let result = self.locations.in_write_tx(|| {
            let mut building = self
                .buildings
                .get_building(id)?
                .ok_or(BuildingServiceError::BuildingNotFound(id))?;
            if let Some(name) = &patch.name {
                building.name = name.trim().to_string();
            }
            self.buildings
                .update_building(&building)
                .map_err(BuildingServiceError::from)
        });
        match &result {
            Ok(()) => info!("event=building_update module={MODULE} status=ok building_id={id}"),
            Err(err) => log_failure("building_update", MODULE, &id, err.kind(), err),
        }
        result
    }

    /// Deletes one building that owns no locations.
    pub fn delete(&self, id: BuildingId) -> Result<(), BuildingServiceError> {
        let result = self.locations.in_write_tx(|| {
            let location_count = self.locations.count_in_building(id)?;
            if location_count > 0 {
                return Err(BuildingServiceError::BuildingInUse {
                    building_id: id,
                    location_count,
                });
            }
            match self.buildings.delete_building(id)? {
                0 => Err(BuildingServiceError::BuildingNotFound(id)),
                _ => Ok(()),
            }
        });
        match &result {
            Ok(()) => info!("event=building_delete module={MODULE} status=ok building_id={id}"),
            Err(err) => log_failure("building_delete", MODULE, &id, err.kind(), err),
        }
        result
    }

    fn populate(&self, building: Building) -> Result<BuildingDetail, BuildingServiceError> {
        let locations = self.locations.list_in_building(building.id)?;
        Ok(BuildingDetail {
            building,
            locations,
        })
    }
}
