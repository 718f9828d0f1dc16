//! Location use-case service and re-parenting validator.
//!
//! # Responsibility
//! - Validate building/parent references on create and update.
//! - Reject re-parenting that would make a location its own ancestor.
//! - Provide detail, listing, descendant, and delete operations.
//!
//! # Invariants
//! - A location is never its own parent, directly or transitively.
//! - Create and update run inside one write transaction; a rejected call
//!   persists nothing.
//! - Descendant walks terminate even when stored data already loops.

use super::{log_failure, ErrorKind};
use crate::model::building::BuildingId;
use crate::model::location::{
    Location, LocationDetail, LocationId, LocationPatch, NewLocation,
};
use crate::model::ValidationError;
use crate::repo::building_repo::BuildingRepository;
use crate::repo::location_repo::{LocationListQuery, LocationRepository};
use crate::repo::RepoError;
use log::{debug, info};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

const MODULE: &str = "location";

/// Errors from location service operations.
#[derive(Debug)]
pub enum LocationServiceError {
    /// Scalar field failed validation.
    Validation(ValidationError),
    /// Target location does not exist.
    LocationNotFound(LocationId),
    /// Requested parent location does not exist.
    ParentNotFound(LocationId),
    /// Referenced building does not exist.
    BuildingNotFound(BuildingId),
    /// Location was asked to become its own parent.
    SelfParent(LocationId),
    /// Requested parent is a descendant of the location.
    CycleDetected {
        location_id: LocationId,
        parent_id: LocationId,
    },
    /// Repository-level failure.
    Repo(RepoError),
}

impl LocationServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::LocationNotFound(_) | Self::ParentNotFound(_) | Self::BuildingNotFound(_) => {
                ErrorKind::NotFound
            }
            Self::Validation(_) | Self::SelfParent(_) | Self::CycleDetected { .. } => {
                ErrorKind::InvalidArgument
            }
            Self::Repo(_) => ErrorKind::StoreFailure,
        }
    }
}

impl Display for LocationServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::LocationNotFound(id) => write!(f, "location not found: {id}"),
            Self::ParentNotFound(id) => write!(f, "parent location not found: {id}"),
            Self::BuildingNotFound(id) => write!(f, "building not found: {id}"),
            Self::SelfParent(id) => write!(f, "location {id} cannot be its own parent"),
            Self::CycleDetected {
                location_id,
                parent_id,
            } => write!(
                f,
                "cycle: cannot re-parent location {location_id} under its descendant {parent_id}"
            ),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for LocationServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for LocationServiceError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<RepoError> for LocationServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Validation(err) => Self::Validation(err),
            RepoError::LocationNotFound(id) => Self::LocationNotFound(id),
            other => Self::Repo(other),
        }
    }
}

/// Location service facade.
pub struct LocationService<B: BuildingRepository, L: LocationRepository> {
    buildings: B,
    locations: L,
}

impl<B: BuildingRepository, L: LocationRepository> LocationService<B, L> {
    /// Creates service from repositories sharing one connection.
    pub fn new(buildings: B, locations: L) -> Self {
        Self {
            buildings,
            locations,
        }
    }

    /// Creates one location under a building and optional parent.
    pub fn create(&self, input: &NewLocation) -> Result<Location, LocationServiceError> {
        let result = self.locations.in_write_tx(|| {
            let input = input.normalized();
            input.validate()?;
            self.ensure_building_exists(input.building_id)?;
            if let Some(parent_id) = input.parent_id {
                self.ensure_parent_exists(parent_id)?;
            }
            self.locations
                .create_location(&input)
                .map_err(LocationServiceError::from)
        });

        match &result {
            Ok(location) => info!(
                "event=location_create module={MODULE} status=ok location_id={} building_id={} parent_id={:?}",
                location.id, location.building_id, location.parent_id
            ),
            Err(err) => log_failure(
                "location_create",
                MODULE,
                &input.building_id,
                err.kind(),
                err,
            ),
        }
        result
    }

    /// Loads one location with its parent and, optionally, direct children.
    pub fn find_location(
        &self,
        id: LocationId,
        include_children: bool,
    ) -> Result<LocationDetail, LocationServiceError> {
        let result = self.load_detail(id, include_children);
        if let Err(err) = &result {
            log_failure("location_get", MODULE, &id, err.kind(), err);
        }
        result
    }

    /// Lists one page of locations with parent and children populated.
    pub fn list(
        &self,
        query: &LocationListQuery,
    ) -> Result<Vec<LocationDetail>, LocationServiceError> {
        let result: Result<Vec<LocationDetail>, LocationServiceError> = self
            .locations
            .list_locations(query)
            .map_err(LocationServiceError::from)
            .and_then(|page| {
                page.into_iter()
                    .map(|location| self.populate(location, true))
                    .collect::<Result<Vec<_>, _>>()
            });
        if let Err(err) = &result {
            log_failure("location_list", MODULE, &query.skip, err.kind(), err);
        }
        result
    }

    /// Applies a partial update, validating parent and building references.
    ///
    /// # Errors
    /// - `LocationNotFound` when `id` does not exist.
    /// - `ParentNotFound` / `BuildingNotFound` for dangling references.
    /// - `SelfParent` / `CycleDetected` when the new parent is `id` itself or
    ///   one of its descendants.
    pub fn update(&self, id: LocationId, patch: &LocationPatch) -> Result<(), LocationServiceError> {
        let result = self.locations.in_write_tx(|| self.apply_update(id, patch));
        match &result {
            Ok(()) => info!("event=location_update module={MODULE} status=ok location_id={id}"),
            Err(err) => log_failure("location_update", MODULE, &id, err.kind(), err),
        }
        result
    }

    /// Deletes one location. Direct children become root locations.
    pub fn delete(&self, id: LocationId) -> Result<(), LocationServiceError> {
        let result = self
            .locations
            .delete_location(id)
            .map_err(LocationServiceError::from)
            .and_then(|affected| match affected {
                0 => Err(LocationServiceError::LocationNotFound(id)),
                _ => Ok(()),
            });
        match &result {
            Ok(()) => info!("event=location_delete module={MODULE} status=ok location_id={id}"),
            Err(err) => log_failure("location_delete", MODULE, &id, err.kind(), err),
        }
        result
    }

    /// Returns every location transitively below `id`, excluding `id`.
    ///
    /// Order is unspecified.
    pub fn descendants_of(&self, id: LocationId) -> Result<Vec<Location>, LocationServiceError> {
        let result = self
            .locations
            .get_location(id)
            .map_err(LocationServiceError::from)
            .and_then(|found| found.ok_or(LocationServiceError::LocationNotFound(id)))
            .and_then(|_| self.collect_descendants(id));
        if let Err(err) = &result {
            log_failure("location_descendants", MODULE, &id, err.kind(), err);
        }
        result
    }

    fn apply_update(
        &self,
        id: LocationId,
        patch: &LocationPatch,
    ) -> Result<(), LocationServiceError> {
        let mut location = self
            .locations
            .get_location(id)?
            .ok_or(LocationServiceError::LocationNotFound(id))?;

        match patch.parent_id {
            None => {}
            Some(None) => location.parent_id = None,
            Some(Some(parent_id)) => {
                self.ensure_parent_allowed(id, parent_id)?;
                location.parent_id = Some(parent_id);
            }
        }

        if let Some(building_id) = patch.building_id {
            self.ensure_building_exists(building_id)?;
            location.building_id = building_id;
        }

        patch.apply_scalars(&mut location);
        location.validate()?;
        self.locations.update_location(&location)?;
        Ok(())
    }

    fn ensure_parent_allowed(
        &self,
        id: LocationId,
        parent_id: LocationId,
    ) -> Result<(), LocationServiceError> {
        // The descendant set excludes the node itself.
        if parent_id == id {
            return Err(LocationServiceError::SelfParent(id));
        }
        self.ensure_parent_exists(parent_id)?;

        let is_descendant = self
            .collect_descendants(id)?
            .iter()
            .any(|descendant| descendant.id == parent_id);
        if is_descendant {
            return Err(LocationServiceError::CycleDetected {
                location_id: id,
                parent_id,
            });
        }
        Ok(())
    }

    fn ensure_parent_exists(&self, parent_id: LocationId) -> Result<(), LocationServiceError> {
        self.locations
            .get_location(parent_id)?
            .ok_or(LocationServiceError::ParentNotFound(parent_id))?;
        Ok(())
    }

    fn ensure_building_exists(&self, building_id: BuildingId) -> Result<(), LocationServiceError> {
        self.buildings
            .get_building(building_id)?
            .ok_or(LocationServiceError::BuildingNotFound(building_id))?;
        Ok(())
    }

    fn collect_descendants(&self, root: LocationId) -> Result<Vec<Location>, LocationServiceError> {
        let mut visited = HashSet::from([root]);
        let mut pending = vec![root];
        let mut descendants = Vec::new();

        while let Some(current) = pending.pop() {
            for child in self.locations.list_children(current)? {
                if visited.insert(child.id) {
                    pending.push(child.id);
                    descendants.push(child);
                }
            }
        }

        debug!(
            "event=location_descendants module={MODULE} status=ok location_id={root} count={}",
            descendants.len()
        );
        Ok(descendants)
    }

    fn load_detail(
        &self,
        id: LocationId,
        include_children: bool,
    ) -> Result<LocationDetail, LocationServiceError> {
        let location = self
            .locations
            .get_location(id)?
            .ok_or(LocationServiceError::LocationNotFound(id))?;
        self.populate(location, include_children)
    }

    fn populate(
        &self,
        location: Location,
        include_children: bool,
    ) -> Result<LocationDetail, LocationServiceError> {
        let parent = match location.parent_id {
            Some(parent_id) => self.locations.get_location(parent_id)?,
            None => None,
        };
        let children = if include_children {
            self.locations.list_children(location.id)?
        } else {
            Vec::new()
        };
        Ok(LocationDetail {
            location,
            parent,
            children,
        })
    }
}
