use chrono::Utc;
use tempfile::TempDir;
use uuid::Uuid;

use fieldserve::error::Error;
use fieldserve::store::{SqliteStore, Store};
use fieldserve::types::{
    ContractConfig, Location, LocationImportRow, PhotoPhase, Role, Service, ServiceRecord, Unit,
    User,
};

fn open_store() -> (TempDir, SqliteStore) {
    let dir = TempDir::new().expect("create temp dir");
    let store = SqliteStore::new(dir.path().join("test.db")).expect("open store");
    store.initialize().expect("initialize schema");
    (dir, store)
}

fn seed_catalog(store: &SqliteStore) -> (Unit, Service) {
    let unit = Unit {
        id: Uuid::new_v4().to_string(),
        name: "Metros Quadrados".to_string(),
        symbol: "m²".to_string(),
    };
    store.create_unit(&unit).unwrap();

    let service = Service {
        id: Uuid::new_v4().to_string(),
        name: "Roçada".to_string(),
        unit_id: unit.id.clone(),
    };
    store.create_service(&service).unwrap();

    (unit, service)
}

fn make_user(store: &SqliteStore, email: &str, assignments: &str) -> User {
    let now = Utc::now();
    let user = User {
        id: Uuid::new_v4().to_string(),
        email: email.to_string(),
        name: "Operator".to_string(),
        password_hash: "$argon2id$fake".to_string(),
        role: Role::Operator,
        assignments: assignments.to_string(),
        version: 0,
        reset_token: None,
        reset_token_expires: None,
        created_at: now,
        updated_at: now,
    };
    store.create_user(&user).unwrap();
    user
}

fn make_location(store: &SqliteStore, city: &str, name: &str) -> Location {
    let location = Location {
        id: Uuid::new_v4().to_string(),
        city: city.to_string(),
        name: name.to_string(),
        lat: None,
        lng: None,
        observations: None,
        is_group: false,
        parent_id: None,
    };
    store.create_location(&location, &[]).unwrap();
    location
}

fn make_config(store: &SqliteStore, group: &str) {
    store
        .upsert_contract_configs(&[(group.to_string(), 5)])
        .unwrap();
}

fn make_record(store: &SqliteStore, service: &Service, group: &str) -> ServiceRecord {
    let record = ServiceRecord {
        id: Uuid::new_v4().to_string(),
        operator_id: None,
        operator_name: "Operator".to_string(),
        service_id: service.id.clone(),
        contract_group: group.to_string(),
        location_name: "Rua A".to_string(),
        location_area: 120.0,
        override_measurement: None,
        gps_used: false,
        start_time: Utc::now(),
        end_time: None,
        before_photos: Vec::new(),
        after_photos: Vec::new(),
        location_id: None,
    };
    store.create_record(&record).unwrap();
    record
}

fn configs_for(store: &SqliteStore, group: &str) -> Vec<ContractConfig> {
    store
        .list_contract_configs()
        .unwrap()
        .into_iter()
        .filter(|c| c.contract_group == group)
        .collect()
}

fn cities(store: &SqliteStore) -> Vec<String> {
    store
        .list_locations()
        .unwrap()
        .into_iter()
        .map(|l| l.location.city)
        .collect()
}

// One location, one config, two records and one user reference the old name;
// all of them must carry the new name afterwards.
#[test]
fn rename_updates_every_reference() {
    let (_dir, store) = open_store();
    let (_unit, service) = seed_catalog(&store);

    make_location(&store, "Bairro Centro", "Praça Central");
    make_config(&store, "Bairro Centro");
    make_record(&store, &service, "Bairro Centro");
    make_record(&store, &service, "Bairro Centro");
    let user = make_user(
        &store,
        "op@example.com",
        r#"[{"contractGroup":"Bairro Centro","role":"lead"},{"contractGroup":"Other"}]"#,
    );

    let outcome = store
        .rename_contract_group("Bairro Centro", "Centro Novo")
        .unwrap();
    assert_eq!(outcome.locations, 1);
    assert_eq!(outcome.configs, 1);
    assert_eq!(outcome.records, 2);
    assert_eq!(outcome.users, 1);

    assert_eq!(cities(&store), vec!["Centro Novo".to_string()]);
    assert!(configs_for(&store, "Bairro Centro").is_empty());
    assert_eq!(configs_for(&store, "Centro Novo").len(), 1);
    for detail in store.list_records().unwrap() {
        assert_eq!(detail.record.contract_group, "Centro Novo");
    }

    let updated = store.get_user(&user.id).unwrap().unwrap();
    assert_eq!(
        updated.assignments,
        r#"[{"contractGroup":"Centro Novo","role":"lead"},{"contractGroup":"Other"}]"#
    );
    assert_eq!(updated.version, 1);
}

#[test]
fn rename_leaves_unrelated_users_untouched() {
    let (_dir, store) = open_store();

    make_location(&store, "Zona Sul", "Praça");
    let raw = r#"[{"contractGroup":"Other","role":"lead"}]"#;
    let user = make_user(&store, "other@example.com", raw);

    let outcome = store.rename_contract_group("Zona Sul", "Zona Norte").unwrap();
    assert_eq!(outcome.users, 0);

    let after = store.get_user(&user.id).unwrap().unwrap();
    // Byte-for-byte: the stored column was never rewritten.
    assert_eq!(after.assignments, raw);
    assert_eq!(after.version, 0);
}

#[test]
fn rename_merges_into_existing_group() {
    let (_dir, store) = open_store();

    make_location(&store, "Old", "Rua 1");
    make_location(&store, "New", "Rua 2");
    make_config(&store, "Old");

    store.rename_contract_group("Old", "New").unwrap();

    let mut all = cities(&store);
    all.sort();
    assert_eq!(all, vec!["New".to_string(), "New".to_string()]);
    assert_eq!(configs_for(&store, "New").len(), 1);
    assert!(configs_for(&store, "Old").is_empty());
}

#[test]
fn delete_refused_while_records_reference_the_group() {
    let (_dir, store) = open_store();
    let (_unit, service) = seed_catalog(&store);

    make_location(&store, "Zona Sul", "Praça");
    make_config(&store, "Zona Sul");
    for _ in 0..3 {
        make_record(&store, &service, "Zona Sul");
    }
    let user = make_user(
        &store,
        "op@example.com",
        r#"[{"contractGroup":"Zona Sul"}]"#,
    );

    let err = store.delete_contract_group("Zona Sul").unwrap_err();
    match err {
        Error::ContractGroupInUse(count) => assert_eq!(count, 3),
        other => panic!("expected ContractGroupInUse, got {other:?}"),
    }

    // Nothing was altered by the refused delete.
    assert_eq!(cities(&store), vec!["Zona Sul".to_string()]);
    assert_eq!(configs_for(&store, "Zona Sul").len(), 1);
    let unchanged = store.get_user(&user.id).unwrap().unwrap();
    assert_eq!(unchanged.assignments, r#"[{"contractGroup":"Zona Sul"}]"#);
    assert_eq!(unchanged.version, 0);
}

#[test]
fn delete_cascade_removes_group_everywhere() {
    let (_dir, store) = open_store();

    let kept = make_location(&store, "Keep", "Rua K");
    make_location(&store, "Gone", "Rua G");
    make_config(&store, "Gone");
    make_config(&store, "Keep");
    let user = make_user(
        &store,
        "op@example.com",
        r#"[{"contractGroup":"Gone","role":"lead"},{"contractGroup":"Keep"},{"contractGroup":"Gone"}]"#,
    );

    let outcome = store.delete_contract_group("Gone").unwrap();
    assert_eq!(outcome.locations, 1);
    assert_eq!(outcome.configs, 1);
    assert_eq!(outcome.users, 1);

    assert_eq!(cities(&store), vec!["Keep".to_string()]);
    assert!(configs_for(&store, "Gone").is_empty());
    assert_eq!(configs_for(&store, "Keep").len(), 1);
    assert!(store.get_location(&kept.id).unwrap().is_some());

    // Matching entries are stripped; the survivor keeps its position.
    let after = store.get_user(&user.id).unwrap().unwrap();
    assert_eq!(after.assignments, r#"[{"contractGroup":"Keep"}]"#);
    assert_eq!(after.version, 1);
}

#[test]
fn delete_cascade_drops_measurements_with_their_locations() {
    let (_dir, store) = open_store();
    let (_unit, service) = seed_catalog(&store);

    let location = Location {
        id: Uuid::new_v4().to_string(),
        city: "Gone".to_string(),
        name: "Praça".to_string(),
        lat: None,
        lng: None,
        observations: None,
        is_group: false,
        parent_id: None,
    };
    store
        .create_location(&location, &[(service.id.clone(), 55.0)])
        .unwrap();

    store.delete_contract_group("Gone").unwrap();

    assert!(store.list_locations().unwrap().is_empty());
}

fn import_rows() -> Vec<LocationImportRow> {
    let data = "\
cidade,bairro,rua,lat,lng,observacoes
Maringa,Centro,,-23.42,-51.93,
Maringa,Centro,,,,duplicate group row
Maringa,Centro,Rua A,,,
Maringa,Centro,Rua B,,,
Maringa,Jardim,Rua C,,,orphan member
Sarandi,Centro,,,,same label other city
";
    let mut reader = csv::Reader::from_reader(data.as_bytes());
    reader
        .deserialize()
        .collect::<Result<Vec<LocationImportRow>, _>>()
        .unwrap()
}

#[test]
fn import_builds_two_level_tree() {
    let (_dir, store) = open_store();

    let summary = store.replace_location_tree(&import_rows()).unwrap();
    assert_eq!(summary.groups_created, 2); // (Maringa, Centro) and (Sarandi, Centro)
    assert_eq!(summary.members_created, 2);
    assert_eq!(summary.skipped.len(), 1);
    assert_eq!(summary.skipped[0].1, "Jardim");

    let locations = store.list_locations().unwrap();
    let groups: Vec<_> = locations
        .iter()
        .filter(|l| l.location.is_group)
        .collect();
    assert_eq!(groups.len(), 2);
    assert!(groups.iter().all(|g| g.location.parent_id.is_none()));

    let maringa_group = groups
        .iter()
        .find(|g| g.location.city == "Maringa")
        .unwrap();
    for member in locations.iter().filter(|l| !l.location.is_group) {
        assert_eq!(member.location.city, "Maringa");
        assert_eq!(
            member.location.parent_id.as_deref(),
            Some(maringa_group.location.id.as_str())
        );
    }

    // The orphan's group was not conjured into existence.
    assert!(!locations.iter().any(|l| l.location.name == "Jardim"));
    assert!(!locations.iter().any(|l| l.location.name == "Rua C"));
}

#[test]
fn import_twice_yields_identical_tree() {
    let (_dir, store) = open_store();
    let rows = import_rows();

    store.replace_location_tree(&rows).unwrap();
    let summary = store.replace_location_tree(&rows).unwrap();
    assert_eq!(summary.groups_created, 2);
    assert_eq!(summary.members_created, 2);

    let locations = store.list_locations().unwrap();
    assert_eq!(locations.len(), 4);

    let mut names: Vec<_> = locations
        .iter()
        .map(|l| (l.location.city.clone(), l.location.name.clone()))
        .collect();
    names.sort();
    assert_eq!(
        names,
        vec![
            ("Maringa".to_string(), "Centro".to_string()),
            ("Maringa".to_string(), "Rua A".to_string()),
            ("Maringa".to_string(), "Rua B".to_string()),
            ("Sarandi".to_string(), "Centro".to_string()),
        ]
    );
}

#[test]
fn photo_attach_is_append_only() {
    let (_dir, store) = open_store();
    let (_unit, service) = seed_catalog(&store);
    let record = make_record(&store, &service, "Zona Sul");

    store
        .append_photos(
            &record.id,
            PhotoPhase::Before,
            &["/uploads/before-1.jpg".to_string()],
        )
        .unwrap();
    let updated = store
        .append_photos(
            &record.id,
            PhotoPhase::Before,
            &[
                "/uploads/before-2.jpg".to_string(),
                "/uploads/before-3.jpg".to_string(),
            ],
        )
        .unwrap();

    assert_eq!(
        updated.before_photos,
        vec![
            "/uploads/before-1.jpg".to_string(),
            "/uploads/before-2.jpg".to_string(),
            "/uploads/before-3.jpg".to_string(),
        ]
    );
    assert!(updated.end_time.is_none());
}

#[test]
fn after_photos_stamp_end_time() {
    let (_dir, store) = open_store();
    let (_unit, service) = seed_catalog(&store);
    let record = make_record(&store, &service, "Zona Sul");

    let updated = store
        .append_photos(
            &record.id,
            PhotoPhase::After,
            &["/uploads/after-1.jpg".to_string()],
        )
        .unwrap();

    assert!(updated.end_time.is_some());

    let reread = store.get_record(&record.id).unwrap().unwrap();
    assert_eq!(reread.after_photos, vec!["/uploads/after-1.jpg".to_string()]);
    assert!(reread.end_time.is_some());
}

#[test]
fn photo_attach_on_missing_record_is_not_found() {
    let (_dir, store) = open_store();

    let err = store
        .append_photos("missing", PhotoPhase::Before, &["/uploads/x.jpg".to_string()])
        .unwrap_err();
    assert!(matches!(err, Error::NotFound));
}

#[test]
fn unit_delete_guarded_by_service_references() {
    let (_dir, store) = open_store();
    let (unit, service) = seed_catalog(&store);

    let err = store.delete_unit(&unit.id).unwrap_err();
    assert!(matches!(err, Error::UnitInUse(1)));

    store.delete_service(&service.id).unwrap();
    assert!(store.delete_unit(&unit.id).unwrap());
}

#[test]
fn location_update_replaces_service_set() {
    let (_dir, store) = open_store();
    let (unit, service) = seed_catalog(&store);

    let other = Service {
        id: Uuid::new_v4().to_string(),
        name: "Varrição Manual".to_string(),
        unit_id: unit.id.clone(),
    };
    store.create_service(&other).unwrap();

    let location = Location {
        id: Uuid::new_v4().to_string(),
        city: "Zona Sul".to_string(),
        name: "Praça".to_string(),
        lat: None,
        lng: None,
        observations: None,
        is_group: false,
        parent_id: None,
    };
    store
        .create_location(&location, &[(service.id.clone(), 10.0)])
        .unwrap();

    store
        .update_location(&location, &[(other.id.clone(), 99.0)])
        .unwrap();

    let listed = store.list_locations().unwrap();
    let found = listed
        .iter()
        .find(|l| l.location.id == location.id)
        .unwrap();
    assert_eq!(found.services.len(), 1);
    assert_eq!(found.services[0].service_id, other.id);
    assert_eq!(found.services[0].measurement, 99.0);
}

#[test]
fn override_measurement_sets_and_clears() {
    let (_dir, store) = open_store();
    let (_unit, service) = seed_catalog(&store);
    let record = make_record(&store, &service, "Zona Sul");

    store
        .set_override_measurement(&record.id, Some(42.5))
        .unwrap();
    let with_override = store.get_record(&record.id).unwrap().unwrap();
    assert_eq!(with_override.override_measurement, Some(42.5));
    assert_eq!(with_override.effective_measurement(), 42.5);

    store.set_override_measurement(&record.id, None).unwrap();
    let cleared = store.get_record(&record.id).unwrap().unwrap();
    assert_eq!(cleared.override_measurement, None);
    assert_eq!(cleared.effective_measurement(), 120.0);
}

#[test]
fn deleting_operator_keeps_record_name() {
    let (_dir, store) = open_store();
    let (_unit, service) = seed_catalog(&store);
    let operator = make_user(&store, "op@example.com", "[]");

    let record = ServiceRecord {
        id: Uuid::new_v4().to_string(),
        operator_id: Some(operator.id.clone()),
        operator_name: operator.name.clone(),
        service_id: service.id.clone(),
        contract_group: "Zona Sul".to_string(),
        location_name: "Rua A".to_string(),
        location_area: 120.0,
        override_measurement: None,
        gps_used: false,
        start_time: Utc::now(),
        end_time: None,
        before_photos: Vec::new(),
        after_photos: Vec::new(),
        location_id: None,
    };
    store.create_record(&record).unwrap();

    store.delete_user(&operator.id).unwrap();

    let after = store.get_record(&record.id).unwrap().unwrap();
    assert_eq!(after.operator_id, None);
    assert_eq!(after.operator_name, operator.name);
}
