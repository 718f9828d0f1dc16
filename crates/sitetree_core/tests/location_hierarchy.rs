use rusqlite::Connection;
use sitetree_core::db::{open_db, open_db_in_memory};
use sitetree_core::{
    BuildingId, BuildingRepository, ErrorKind, Location, LocationId, LocationPatch,
    LocationService, LocationServiceError, NewLocation, SqliteBuildingRepository,
    SqliteLocationRepository,
};
use std::collections::HashSet;
use std::time::Duration;

type Service<'conn> =
    LocationService<SqliteBuildingRepository<'conn>, SqliteLocationRepository<'conn>>;

fn setup() -> Connection {
    open_db_in_memory().unwrap()
}

fn service(conn: &Connection) -> Service<'_> {
    LocationService::new(
        SqliteBuildingRepository::try_new(conn).unwrap(),
        SqliteLocationRepository::try_new(conn).unwrap(),
    )
}

fn building(conn: &Connection, name: &str) -> BuildingId {
    SqliteBuildingRepository::try_new(conn)
        .unwrap()
        .create_building(name)
        .unwrap()
        .id
}

fn location(
    service: &Service<'_>,
    building_id: BuildingId,
    name: &str,
    parent_id: Option<LocationId>,
) -> Location {
    service
        .create(&NewLocation {
            name: name.to_string(),
            area: 50.0,
            location_code: format!("{name}-code"),
            building_id,
            parent_id,
        })
        .unwrap()
}

fn reparent(parent_id: Option<LocationId>) -> LocationPatch {
    LocationPatch {
        parent_id: Some(parent_id),
        ..LocationPatch::default()
    }
}

fn ids(locations: &[Location]) -> HashSet<LocationId> {
    locations.iter().map(|location| location.id).collect()
}

fn location_count(conn: &Connection) -> i64 {
    conn.query_row("SELECT COUNT(*) FROM locations;", [], |row| row.get(0))
        .unwrap()
}

#[test]
fn update_rejects_self_parenting() {
    let conn = setup();
    let service = service(&conn);
    let hq = building(&conn, "HQ");
    let floor = location(&service, hq, "Floor1", None);

    let err = service
        .update(floor.id, &reparent(Some(floor.id)))
        .unwrap_err();
    assert!(matches!(err, LocationServiceError::SelfParent(id) if id == floor.id));
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[test]
fn update_rejects_direct_and_transitive_descendant_parent() {
    let conn = setup();
    let service = service(&conn);
    let hq = building(&conn, "HQ");
    let a = location(&service, hq, "A", None);
    let b = location(&service, hq, "B", Some(a.id));
    let c = location(&service, hq, "C", Some(b.id));

    for descendant in [b.id, c.id] {
        let err = service
            .update(a.id, &reparent(Some(descendant)))
            .unwrap_err();
        assert!(matches!(
            err,
            LocationServiceError::CycleDetected {
                location_id,
                parent_id,
            } if location_id == a.id && parent_id == descendant
        ));
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    let detail = service.find_location(a.id, false).unwrap();
    assert_eq!(detail.location.parent_id, None);
}

#[test]
fn update_reparents_between_unrelated_locations() {
    let conn = setup();
    let service = service(&conn);
    let hq = building(&conn, "HQ");
    let a = location(&service, hq, "A", None);
    let b = location(&service, hq, "B", None);

    service.update(a.id, &reparent(Some(b.id))).unwrap();

    let detail = service.find_location(a.id, true).unwrap();
    assert_eq!(detail.location.parent_id, Some(b.id));
    assert_eq!(detail.parent.map(|parent| parent.id), Some(b.id));

    let parent_detail = service.find_location(b.id, true).unwrap();
    assert_eq!(ids(&parent_detail.children), HashSet::from([a.id]));
}

#[test]
fn update_with_missing_parent_keeps_existing_parent() {
    let conn = setup();
    let service = service(&conn);
    let hq = building(&conn, "HQ");
    let root = location(&service, hq, "Root", None);
    let child = location(&service, hq, "Child", Some(root.id));

    let err = service
        .update(child.id, &reparent(Some(999_999)))
        .unwrap_err();
    assert!(matches!(err, LocationServiceError::ParentNotFound(999_999)));
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let detail = service.find_location(child.id, false).unwrap();
    assert_eq!(detail.location.parent_id, Some(root.id));
}

#[test]
fn create_with_missing_building_persists_nothing() {
    let conn = setup();
    let service = service(&conn);

    let err = service
        .create(&NewLocation {
            name: "Ghost".to_string(),
            area: 10.0,
            location_code: "G-1".to_string(),
            building_id: 999_999,
            parent_id: None,
        })
        .unwrap_err();
    assert!(matches!(err, LocationServiceError::BuildingNotFound(999_999)));
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(location_count(&conn), 0);
}

#[test]
fn create_with_missing_parent_persists_nothing() {
    let conn = setup();
    let service = service(&conn);
    let hq = building(&conn, "HQ");

    let err = service
        .create(&NewLocation {
            name: "Room".to_string(),
            area: 10.0,
            location_code: "R-1".to_string(),
            building_id: hq,
            parent_id: Some(31_337),
        })
        .unwrap_err();
    assert!(matches!(err, LocationServiceError::ParentNotFound(31_337)));
    assert_eq!(location_count(&conn), 0);
}

#[test]
fn partial_update_preserves_untouched_fields() {
    let conn = setup();
    let service = service(&conn);
    let hq = building(&conn, "HQ");
    let root = location(&service, hq, "Root", None);
    let room = location(&service, hq, "Room", Some(root.id));

    service
        .update(
            room.id,
            &LocationPatch {
                name: Some("X".to_string()),
                ..LocationPatch::default()
            },
        )
        .unwrap();

    let updated = service.find_location(room.id, false).unwrap().location;
    assert_eq!(updated.name, "X");
    assert_eq!(updated.area, room.area);
    assert_eq!(updated.location_code, room.location_code);
    assert_eq!(updated.parent_id, Some(root.id));
    assert_eq!(updated.building_id, hq);
}

#[test]
fn update_moves_location_to_existing_building_and_rejects_missing_one() {
    let conn = setup();
    let service = service(&conn);
    let hq = building(&conn, "HQ");
    let annex = building(&conn, "Annex");
    let room = location(&service, hq, "Room", None);

    let err = service
        .update(
            room.id,
            &LocationPatch {
                building_id: Some(777),
                ..LocationPatch::default()
            },
        )
        .unwrap_err();
    assert!(matches!(err, LocationServiceError::BuildingNotFound(777)));

    service
        .update(
            room.id,
            &LocationPatch {
                building_id: Some(annex),
                ..LocationPatch::default()
            },
        )
        .unwrap();
    let updated = service.find_location(room.id, false).unwrap().location;
    assert_eq!(updated.building_id, annex);
}

#[test]
fn rejected_update_rolls_back_every_field() {
    let conn = setup();
    let service = service(&conn);
    let hq = building(&conn, "HQ");
    let a = location(&service, hq, "A", None);
    let b = location(&service, hq, "B", Some(a.id));

    let err = service
        .update(
            a.id,
            &LocationPatch {
                name: Some("Renamed".to_string()),
                area: Some(999.0),
                parent_id: Some(Some(b.id)),
                ..LocationPatch::default()
            },
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    let stored = service.find_location(a.id, false).unwrap().location;
    assert_eq!(stored, a);
}

#[test]
fn update_rejects_invalid_scalar_values() {
    let conn = setup();
    let service = service(&conn);
    let hq = building(&conn, "HQ");
    let room = location(&service, hq, "Room", None);

    let err = service
        .update(
            room.id,
            &LocationPatch {
                area: Some(0.0),
                ..LocationPatch::default()
            },
        )
        .unwrap_err();
    assert!(matches!(err, LocationServiceError::Validation(_)));
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[test]
fn update_unknown_location_is_not_found() {
    let conn = setup();
    let service = service(&conn);

    let err = service
        .update(42, &LocationPatch::default())
        .unwrap_err();
    assert!(matches!(err, LocationServiceError::LocationNotFound(42)));
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn descendants_cover_whole_subtree_excluding_root() {
    let conn = setup();
    let service = service(&conn);
    let hq = building(&conn, "HQ");
    let a = location(&service, hq, "A", None);
    let b = location(&service, hq, "B", Some(a.id));
    let c = location(&service, hq, "C", Some(b.id));

    assert_eq!(
        ids(&service.descendants_of(a.id).unwrap()),
        HashSet::from([b.id, c.id])
    );
    assert_eq!(
        ids(&service.descendants_of(b.id).unwrap()),
        HashSet::from([c.id])
    );
    assert!(service.descendants_of(c.id).unwrap().is_empty());
}

#[test]
fn descendants_include_every_branch() {
    let conn = setup();
    let service = service(&conn);
    let hq = building(&conn, "HQ");
    let root = location(&service, hq, "Root", None);
    let left = location(&service, hq, "Left", Some(root.id));
    let right = location(&service, hq, "Right", Some(root.id));
    let leaf = location(&service, hq, "Leaf", Some(right.id));
    let _other = location(&service, hq, "Other", None);

    assert_eq!(
        ids(&service.descendants_of(root.id).unwrap()),
        HashSet::from([left.id, right.id, leaf.id])
    );
}

#[test]
fn descendants_terminate_on_already_cyclic_data() {
    let conn = setup();
    let service = service(&conn);
    let hq = building(&conn, "HQ");
    let a = location(&service, hq, "A", None);
    let b = location(&service, hq, "B", Some(a.id));
    let c = location(&service, hq, "C", Some(b.id));
    conn.execute(
        "UPDATE locations SET parent_id = ?1 WHERE id = ?2;",
        [c.id, a.id],
    )
    .unwrap();

    assert_eq!(
        ids(&service.descendants_of(a.id).unwrap()),
        HashSet::from([b.id, c.id])
    );
}

#[test]
fn descendants_of_unknown_location_is_not_found() {
    let conn = setup();
    let service = service(&conn);

    let err = service.descendants_of(5).unwrap_err();
    assert!(matches!(err, LocationServiceError::LocationNotFound(5)));
}

#[test]
fn swapping_roles_requires_detach_first() {
    let conn = setup();
    let service = service(&conn);
    let hq = building(&conn, "HQ");
    let floor = location(&service, hq, "Floor1", None);
    let room = location(&service, hq, "Room101", Some(floor.id));

    let err = service
        .update(floor.id, &reparent(Some(room.id)))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    service.update(room.id, &reparent(None)).unwrap();
    service.update(floor.id, &reparent(Some(room.id))).unwrap();

    let floor_detail = service.find_location(floor.id, false).unwrap();
    assert_eq!(floor_detail.location.parent_id, Some(room.id));
    let room_detail = service.find_location(room.id, true).unwrap();
    assert_eq!(room_detail.location.parent_id, None);
    assert_eq!(ids(&room_detail.children), HashSet::from([floor.id]));
}

#[test]
fn concurrent_writer_is_blocked_until_lock_is_released() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sitetree.db");
    let holder = open_db(&path).unwrap();
    let writer = open_db(&path).unwrap();
    writer.busy_timeout(Duration::from_millis(50)).unwrap();

    let service = service(&writer);
    let hq = building(&writer, "HQ");
    let a = location(&service, hq, "A", None);
    let b = location(&service, hq, "B", None);

    holder.execute_batch("BEGIN IMMEDIATE;").unwrap();
    let err = service.update(a.id, &reparent(Some(b.id))).unwrap_err();
    assert!(matches!(err, LocationServiceError::Repo(_)));
    assert_eq!(err.kind(), ErrorKind::StoreFailure);
    holder.execute_batch("ROLLBACK;").unwrap();

    assert_eq!(
        service.find_location(a.id, false).unwrap().location.parent_id,
        None
    );

    service.update(a.id, &reparent(Some(b.id))).unwrap();
    let err = service.update(b.id, &reparent(Some(a.id))).unwrap_err();
    assert!(matches!(
        err,
        LocationServiceError::CycleDetected {
            location_id,
            parent_id,
        } if location_id == b.id && parent_id == a.id
    ));
}
