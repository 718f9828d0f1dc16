//! Building repository contract and SQLite implementation.

use super::{ensure_connection_ready, RepoError, RepoResult};
use crate::model::building::{Building, BuildingId};
use rusqlite::{params, Connection, Row};

const BUILDING_SELECT_SQL: &str = "SELECT id, name FROM buildings";

/// Repository interface for building CRUD operations.
pub trait BuildingRepository {
    /// Inserts one building and returns its persisted state.
    fn create_building(&self, name: &str) -> RepoResult<Building>;
    fn get_building(&self, id: BuildingId) -> RepoResult<Option<Building>>;
    /// Lists all buildings ordered by id.
    fn list_buildings(&self) -> RepoResult<Vec<Building>>;
    /// Replaces stored fields of an existing building.
    fn update_building(&self, building: &Building) -> RepoResult<()>;
    /// Deletes one building and returns the number of affected rows.
    fn delete_building(&self, id: BuildingId) -> RepoResult<usize>;
}

/// SQLite-backed building repository.
pub struct SqliteBuildingRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteBuildingRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, "buildings", &["id", "name"])?;
        Ok(Self { conn })
    }
}

impl BuildingRepository for SqliteBuildingRepository<'_> {
    fn create_building(&self, name: &str) -> RepoResult<Building> {
        let draft = Building {
            id: 0,
            name: name.trim().to_string(),
        };
        draft.validate()?;

        self.conn.execute(
            "INSERT INTO buildings (name) VALUES (?1);",
            [draft.name.as_str()],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_building(id)?
            .ok_or(RepoError::BuildingNotFound(id))
    }

    fn get_building(&self, id: BuildingId) -> RepoResult<Option<Building>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{BUILDING_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_building_row(row)?));
        }
        Ok(None)
    }

    fn list_buildings(&self) -> RepoResult<Vec<Building>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{BUILDING_SELECT_SQL} ORDER BY id ASC;"))?;
        let mut rows = stmt.query([])?;
        let mut buildings = Vec::new();
        while let Some(row) = rows.next()? {
            buildings.push(parse_building_row(row)?);
        }
        Ok(buildings)
    }

    fn update_building(&self, building: &Building) -> RepoResult<()> {
        building.validate()?;

        let changed = self.conn.execute(
            "UPDATE buildings
             SET name = ?2,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![building.id, building.name.trim()],
        )?;
        if changed == 0 {
            return Err(RepoError::BuildingNotFound(building.id));
        }
        Ok(())
    }

    fn delete_building(&self, id: BuildingId) -> RepoResult<usize> {
        let changed = self
            .conn
            .execute("DELETE FROM buildings WHERE id = ?1;", [id])?;
        Ok(changed)
    }
}

fn parse_building_row(row: &Row<'_>) -> RepoResult<Building> {
    let building = Building {
        id: row.get("id")?,
        name: row.get("name")?,
    };
    building.validate().map_err(|err| {
        RepoError::InvalidData(format!("building {} in buildings: {err}", building.id))
    })?;
    Ok(building)
}
