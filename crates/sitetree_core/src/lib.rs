//! Core domain logic for SiteTree: buildings and their location hierarchy.
//! This crate is the single source of truth for hierarchy invariants.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::building::{Building, BuildingDetail, BuildingId, BuildingPatch};
pub use model::location::{Location, LocationDetail, LocationId, LocationPatch, NewLocation};
pub use model::ValidationError;
pub use repo::building_repo::{BuildingRepository, SqliteBuildingRepository};
pub use repo::location_repo::{
    normalize_page_limit, LocationListQuery, LocationRepository, SqliteLocationRepository,
    DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE,
};
pub use repo::{RepoError, RepoResult};
pub use service::building_service::{BuildingService, BuildingServiceError};
pub use service::location_service::{LocationService, LocationServiceError};
pub use service::ErrorKind;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
