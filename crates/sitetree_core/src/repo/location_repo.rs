//! Location repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Persist location rows and answer parent/children adjacency queries.
//! - Provide the write-transaction scope services use to make
//!   validate-then-save atomic.
//!
//! # Invariants
//! - Child and page listings are deterministic: `id ASC`.
//! - `parent_id` uses `ON DELETE SET NULL`: deleting a location detaches its
//!   direct children.
//! - Reference existence is checked by services; the schema's foreign keys
//!   are the last line, surfacing as `RepoError::Db`.

use super::{ensure_connection_ready, RepoError, RepoResult};
use crate::model::building::BuildingId;
use crate::model::location::{Location, LocationId, NewLocation};
use rusqlite::{params, Connection, Row, Transaction, TransactionBehavior};

/// Page size used when a listing omits `limit` (or passes `0`).
pub const DEFAULT_PAGE_SIZE: u32 = 10;
/// Upper bound applied to requested page sizes.
pub const MAX_PAGE_SIZE: u32 = 100;

const LOCATION_SELECT_SQL: &str = "SELECT
    id,
    name,
    area,
    location_code,
    parent_id,
    building_id
FROM locations";

/// Skip/limit pagination for location listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LocationListQuery {
    pub skip: u32,
    pub limit: Option<u32>,
}

/// Normalizes a requested page size against default and max.
pub fn normalize_page_limit(limit: Option<u32>) -> u32 {
    match limit {
        Some(0) | None => DEFAULT_PAGE_SIZE,
        Some(value) if value > MAX_PAGE_SIZE => MAX_PAGE_SIZE,
        Some(value) => value,
    }
}

/// Repository interface for location persistence and adjacency queries.
pub trait LocationRepository {
    /// Inserts one location and returns its persisted state.
    fn create_location(&self, input: &NewLocation) -> RepoResult<Location>;
    fn get_location(&self, id: LocationId) -> RepoResult<Option<Location>>;
    /// Lists direct children of `parent_id`.
    fn list_children(&self, parent_id: LocationId) -> RepoResult<Vec<Location>>;
    /// Lists one page of locations.
    fn list_locations(&self, query: &LocationListQuery) -> RepoResult<Vec<Location>>;
    /// Lists all locations of one building.
    fn list_in_building(&self, building_id: BuildingId) -> RepoResult<Vec<Location>>;
    /// Counts locations referencing `building_id`.
    fn count_in_building(&self, building_id: BuildingId) -> RepoResult<usize>;
    /// Replaces stored fields of an existing location.
    fn update_location(&self, location: &Location) -> RepoResult<()>;
    /// Deletes one location and returns the number of affected rows.
    fn delete_location(&self, id: LocationId) -> RepoResult<usize>;
    /// Runs `op` inside one write transaction.
    ///
    /// Commits when `op` returns `Ok`; rolls back when it returns `Err`.
    fn in_write_tx<T, E, F>(&self, op: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: From<RepoError>;
}

/// SQLite-backed location repository.
pub struct SqliteLocationRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteLocationRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(
            conn,
            "locations",
            &[
                "id",
                "name",
                "area",
                "location_code",
                "parent_id",
                "building_id",
            ],
        )?;
        Ok(Self { conn })
    }

    fn query_locations(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> RepoResult<Vec<Location>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params)?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_location_row(row)?);
        }
        Ok(items)
    }
}

impl LocationRepository for SqliteLocationRepository<'_> {
    fn create_location(&self, input: &NewLocation) -> RepoResult<Location> {
        let input = input.normalized();
        input.validate()?;

        self.conn.execute(
            "INSERT INTO locations (
                name,
                area,
                location_code,
                parent_id,
                building_id
            ) VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                input.name.as_str(),
                input.area,
                input.location_code.as_str(),
                input.parent_id,
                input.building_id,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_location(id)?
            .ok_or(RepoError::LocationNotFound(id))
    }

    fn get_location(&self, id: LocationId) -> RepoResult<Option<Location>> {
        let mut items =
            self.query_locations(&format!("{LOCATION_SELECT_SQL} WHERE id = ?1;"), [id])?;
        Ok(items.pop())
    }

    fn list_children(&self, parent_id: LocationId) -> RepoResult<Vec<Location>> {
        self.query_locations(
            &format!("{LOCATION_SELECT_SQL} WHERE parent_id = ?1 ORDER BY id ASC;"),
            [parent_id],
        )
    }

    fn list_locations(&self, query: &LocationListQuery) -> RepoResult<Vec<Location>> {
        let limit = normalize_page_limit(query.limit);
        self.query_locations(
            &format!("{LOCATION_SELECT_SQL} ORDER BY id ASC LIMIT ?1 OFFSET ?2;"),
            params![i64::from(limit), i64::from(query.skip)],
        )
    }

    fn list_in_building(&self, building_id: BuildingId) -> RepoResult<Vec<Location>> {
        self.query_locations(
            &format!("{LOCATION_SELECT_SQL} WHERE building_id = ?1 ORDER BY id ASC;"),
            [building_id],
        )
    }

    fn count_in_building(&self, building_id: BuildingId) -> RepoResult<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM locations WHERE building_id = ?1;",
            [building_id],
            |row| row.get(0),
        )?;
        usize::try_from(count)
            .map_err(|_| RepoError::InvalidData(format!("negative location count `{count}`")))
    }

    fn update_location(&self, location: &Location) -> RepoResult<()> {
        location.validate()?;

        let changed = self.conn.execute(
            "UPDATE locations
             SET name = ?2,
                 area = ?3,
                 location_code = ?4,
                 parent_id = ?5,
                 building_id = ?6,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![
                location.id,
                location.name.trim(),
                location.area,
                location.location_code.trim(),
                location.parent_id,
                location.building_id,
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::LocationNotFound(location.id));
        }
        Ok(())
    }

    fn delete_location(&self, id: LocationId) -> RepoResult<usize> {
        let changed = self
            .conn
            .execute("DELETE FROM locations WHERE id = ?1;", [id])?;
        Ok(changed)
    }

    fn in_write_tx<T, E, F>(&self, op: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: From<RepoError>,
    {
        // IMMEDIATE takes the write lock before the first read, so two
        // writers cannot both pass validation on a stale tree.
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)
            .map_err(RepoError::from)?;
        let value = op()?;
        tx.commit().map_err(RepoError::from)?;
        Ok(value)
    }
}

fn parse_location_row(row: &Row<'_>) -> RepoResult<Location> {
    let location = Location {
        id: row.get("id")?,
        name: row.get("name")?,
        area: row.get("area")?,
        location_code: row.get("location_code")?,
        parent_id: row.get("parent_id")?,
        building_id: row.get("building_id")?,
    };
    location.validate().map_err(|err| {
        RepoError::InvalidData(format!("location {} in locations: {err}", location.id))
    })?;
    Ok(location)
}
