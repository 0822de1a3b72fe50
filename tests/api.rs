use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use chrono::Utc;
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;

use fieldserve::auth::Credentials;
use fieldserve::mail::LogMailer;
use fieldserve::photos::PhotoStore;
use fieldserve::server::{AppState, create_router};
use fieldserve::store::{SqliteStore, Store};
use fieldserve::types::{Location, Role, Service, ServiceRecord, Unit, User};

const ADMIN_EMAIL: &str = "admin@example.com";
const ADMIN_PASSWORD: &str = "secret123";

struct TestApp {
    _dir: TempDir,
    router: Router,
    store: Arc<SqliteStore>,
}

fn make_app() -> TestApp {
    let dir = TempDir::new().expect("create temp dir");
    let store = Arc::new(SqliteStore::new(dir.path().join("test.db")).expect("open store"));
    store.initialize().expect("initialize schema");

    seed_user(&store, ADMIN_EMAIL, ADMIN_PASSWORD, Role::Admin);

    let state = Arc::new(AppState {
        store: store.clone(),
        photos: PhotoStore::new(dir.path()),
        mailer: Arc::new(LogMailer),
        frontend_url: None,
    });

    TestApp {
        _dir: dir,
        router: create_router(state),
        store,
    }
}

fn seed_user(store: &SqliteStore, email: &str, password: &str, role: Role) -> User {
    let now = Utc::now();
    let user = User {
        id: Uuid::new_v4().to_string(),
        email: email.to_string(),
        name: "Test User".to_string(),
        password_hash: Credentials::new().hash(password).unwrap(),
        role,
        assignments: "[]".to_string(),
        version: 0,
        reset_token: None,
        reset_token_expires: None,
        created_at: now,
        updated_at: now,
    };
    store.create_user(&user).unwrap();
    user
}

fn seed_service(store: &SqliteStore) -> Service {
    let unit = Unit {
        id: Uuid::new_v4().to_string(),
        name: "Metros Quadrados".to_string(),
        symbol: "m²".to_string(),
    };
    store.create_unit(&unit).unwrap();

    let service = Service {
        id: Uuid::new_v4().to_string(),
        name: "Roçada".to_string(),
        unit_id: unit.id,
    };
    store.create_service(&service).unwrap();
    service
}

fn seed_location(store: &SqliteStore, city: &str, name: &str) -> Location {
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

fn seed_record(store: &SqliteStore, service: &Service, group: &str) -> ServiceRecord {
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

async fn send(
    router: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }

    let request = match body {
        Some(json_body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&json_body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), 10 * 1024 * 1024)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn login(router: &Router, email: &str, password: &str) -> String {
    let (status, body) = send(
        router,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({"email": email, "password": password})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login failed: {body}");
    body["data"]["access_token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn health_works() {
    let app = make_app();
    let (status, _) = send(&app.router, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn login_rejects_bad_credentials() {
    let app = make_app();

    let (status, _) = send(
        &app.router,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({"email": ADMIN_EMAIL, "password": "wrong"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn login_and_me_flow() {
    let app = make_app();
    let token = login(&app.router, ADMIN_EMAIL, ADMIN_PASSWORD).await;

    let (status, body) = send(&app.router, "GET", "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["email"], ADMIN_EMAIL);
    assert_eq!(body["data"]["role"], "ADMIN");
}

#[tokio::test]
async fn endpoints_require_auth() {
    let app = make_app();

    let (status, _) = send(&app.router, "GET", "/api/locations", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn operators_cannot_rename_contract_groups() {
    let app = make_app();
    seed_user(&app.store, "op@example.com", "op-pass", Role::Operator);
    let token = login(&app.router, "op@example.com", "op-pass").await;

    let (status, _) = send(
        &app.router,
        "PUT",
        "/api/contract-groups/Old",
        Some(&token),
        Some(json!({"newName": "New"})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn rename_cascade_via_endpoint() {
    let app = make_app();
    let service = seed_service(&app.store);
    seed_location(&app.store, "Bairro Centro", "Praça");
    seed_record(&app.store, &service, "Bairro Centro");

    let token = login(&app.router, ADMIN_EMAIL, ADMIN_PASSWORD).await;

    let (status, body) = send(
        &app.router,
        "PUT",
        "/api/contract-groups/Bairro%20Centro",
        Some(&token),
        Some(json!({"newName": "Centro Novo"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "rename failed: {body}");

    let locations = app.store.list_locations().unwrap();
    assert_eq!(locations[0].location.city, "Centro Novo");
    let records = app.store.list_records().unwrap();
    assert_eq!(records[0].record.contract_group, "Centro Novo");

    // An audit entry landed for the rename.
    let (status, body) = send(&app.router, "GET", "/api/auditlog", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["action"], "CONTRACT_GROUP_RENAMED");
}

#[tokio::test]
async fn rename_rejects_blank_target() {
    let app = make_app();
    let token = login(&app.router, ADMIN_EMAIL, ADMIN_PASSWORD).await;

    let (status, _) = send(
        &app.router,
        "PUT",
        "/api/contract-groups/Old",
        Some(&token),
        Some(json!({"newName": "   "})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn delete_contract_group_requires_password() {
    let app = make_app();
    seed_location(&app.store, "Zona Sul", "Praça");
    let token = login(&app.router, ADMIN_EMAIL, ADMIN_PASSWORD).await;

    let (status, _) = send(
        &app.router,
        "DELETE",
        "/api/contract-groups/Zona%20Sul",
        Some(&token),
        Some(json!({"password": "wrong"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Nothing deleted.
    assert_eq!(app.store.list_locations().unwrap().len(), 1);
}

#[tokio::test]
async fn delete_contract_group_blocked_by_records() {
    let app = make_app();
    let service = seed_service(&app.store);
    seed_location(&app.store, "Zona Sul", "Praça");
    for _ in 0..3 {
        seed_record(&app.store, &service, "Zona Sul");
    }

    let token = login(&app.router, ADMIN_EMAIL, ADMIN_PASSWORD).await;

    let (status, body) = send(
        &app.router,
        "DELETE",
        "/api/contract-groups/Zona%20Sul",
        Some(&token),
        Some(json!({"password": ADMIN_PASSWORD})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains('3'), "body: {body}");

    assert_eq!(app.store.list_locations().unwrap().len(), 1);
}

#[tokio::test]
async fn delete_contract_group_succeeds_without_records() {
    let app = make_app();
    seed_location(&app.store, "Zona Sul", "Praça");
    let token = login(&app.router, ADMIN_EMAIL, ADMIN_PASSWORD).await;

    let (status, _) = send(
        &app.router,
        "DELETE",
        "/api/contract-groups/Zona%20Sul",
        Some(&token),
        Some(json!({"password": ADMIN_PASSWORD})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(app.store.list_locations().unwrap().is_empty());
}

#[tokio::test]
async fn locations_expose_contract_group_field() {
    let app = make_app();
    let token = login(&app.router, ADMIN_EMAIL, ADMIN_PASSWORD).await;

    let (status, body) = send(
        &app.router,
        "POST",
        "/api/locations",
        Some(&token),
        Some(json!({"contractGroup": "Zona Sul", "name": "Praça", "services": []})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create failed: {body}");

    let (status, body) = send(&app.router, "GET", "/api/locations", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let first = &body["data"][0];
    assert_eq!(first["contractGroup"], "Zona Sul");
    assert!(first.get("city").is_none());
}

#[tokio::test]
async fn create_record_rejects_unknown_operator() {
    let app = make_app();
    let service = seed_service(&app.store);
    let token = login(&app.router, ADMIN_EMAIL, ADMIN_PASSWORD).await;

    let (status, _) = send(
        &app.router,
        "POST",
        "/api/records",
        Some(&token),
        Some(json!({
            "operatorId": "missing",
            "serviceId": service.id,
            "contractGroup": "Zona Sul",
            "locationName": "Rua A",
            "locationArea": 100.0,
            "startTime": "2026-08-01T08:00:00Z",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn create_record_with_inline_location() {
    let app = make_app();
    let service = seed_service(&app.store);
    let operator = seed_user(&app.store, "op@example.com", "op-pass", Role::Operator);
    let token = login(&app.router, "op@example.com", "op-pass").await;

    let (status, body) = send(
        &app.router,
        "POST",
        "/api/records",
        Some(&token),
        Some(json!({
            "operatorId": operator.id,
            "serviceId": service.id,
            "contractGroup": "Zona Sul",
            "locationName": "Rua Nova",
            "locationArea": 80.0,
            "startTime": "2026-08-01T08:00:00Z",
            "newLocationInfo": {
                "contractGroup": "Zona Sul",
                "name": "Rua Nova",
                "services": [{"serviceId": service.id, "measurement": 80.0}]
            }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create failed: {body}");

    let location_id = body["data"]["locationId"].as_str().unwrap();
    assert!(app.store.get_location(location_id).unwrap().is_some());
    assert_eq!(body["data"]["operatorName"], "Test User");
}

#[tokio::test]
async fn create_record_rejects_dangling_location() {
    let app = make_app();
    let service = seed_service(&app.store);
    let operator = seed_user(&app.store, "op@example.com", "op-pass", Role::Operator);
    let token = login(&app.router, "op@example.com", "op-pass").await;

    let (status, _) = send(
        &app.router,
        "POST",
        "/api/records",
        Some(&token),
        Some(json!({
            "operatorId": operator.id,
            "serviceId": service.id,
            "contractGroup": "Zona Sul",
            "locationName": "Rua A",
            "locationArea": 100.0,
            "startTime": "2026-08-01T08:00:00Z",
            "locationId": "does-not-exist",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(app.store.list_records().unwrap().is_empty());
}

fn multipart_body(boundary: &str, phase: &str, files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"phase\"\r\n\r\n{phase}\r\n"
        )
        .as_bytes(),
    );
    for (name, data) in files {
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"files\"; \
                 filename=\"{name}\"\r\nContent-Type: image/jpeg\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    body
}

async fn upload(
    router: &Router,
    uri: &str,
    token: &str,
    phase: &str,
    files: &[(&str, &[u8])],
) -> (StatusCode, Value) {
    let boundary = "test-boundary";
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(multipart_body(boundary, phase, files)))
        .unwrap();

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), 10 * 1024 * 1024)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn photo_uploads_append_across_calls() {
    let app = make_app();
    let service = seed_service(&app.store);
    let record = seed_record(&app.store, &service, "Zona Sul");
    let token = login(&app.router, ADMIN_EMAIL, ADMIN_PASSWORD).await;

    let uri = format!("/api/records/{}/photos", record.id);
    let (status, body) = upload(
        &app.router,
        &uri,
        &token,
        "BEFORE",
        &[("one.jpg", b"first")],
    )
    .await;
    assert_eq!(status, StatusCode::OK, "upload failed: {body}");
    assert_eq!(body["data"]["beforePhotos"].as_array().unwrap().len(), 1);

    let (status, body) = upload(
        &app.router,
        &uri,
        &token,
        "BEFORE",
        &[("two.jpg", b"second")],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let photos = body["data"]["beforePhotos"].as_array().unwrap();
    assert_eq!(photos.len(), 2);

    // AFTER upload stamps the completion time.
    let (status, body) = upload(
        &app.router,
        &uri,
        &token,
        "AFTER",
        &[("done.jpg", b"after")],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["endTime"].is_string());
}

#[tokio::test]
async fn photo_upload_missing_record_cleans_up() {
    let app = make_app();
    let token = login(&app.router, ADMIN_EMAIL, ADMIN_PASSWORD).await;

    let (status, _) = upload(
        &app.router,
        "/api/records/missing/photos",
        &token,
        "BEFORE",
        &[("one.jpg", b"data")],
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let uploads_dir = app._dir.path().join("uploads");
    let leftover = std::fs::read_dir(&uploads_dir)
        .map(|entries| entries.count())
        .unwrap_or(0);
    assert_eq!(leftover, 0);
}

#[tokio::test]
async fn photo_upload_rejects_bad_phase() {
    let app = make_app();
    let service = seed_service(&app.store);
    let record = seed_record(&app.store, &service, "Zona Sul");
    let token = login(&app.router, ADMIN_EMAIL, ADMIN_PASSWORD).await;

    let uri = format!("/api/records/{}/photos", record.id);
    let (status, _) = upload(&app.router, &uri, &token, "DURING", &[("x.jpg", b"d")]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn override_measurement_flow() {
    let app = make_app();
    let service = seed_service(&app.store);
    let record = seed_record(&app.store, &service, "Zona Sul");
    let token = login(&app.router, ADMIN_EMAIL, ADMIN_PASSWORD).await;

    let uri = format!("/api/records/{}/measurement", record.id);

    // Missing field is rejected.
    let (status, _) = send(&app.router, "PUT", &uri, Some(&token), Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Set an override.
    let (status, body) = send(
        &app.router,
        "PUT",
        &uri,
        Some(&token),
        Some(json!({"overrideMeasurement": 42.5})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["overrideMeasurement"], 42.5);

    // Explicit null clears it.
    let (status, body) = send(
        &app.router,
        "PUT",
        &uri,
        Some(&token),
        Some(json!({"overrideMeasurement": null})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"].get("overrideMeasurement").is_none());

    let stored = app.store.get_record(&record.id).unwrap().unwrap();
    assert_eq!(stored.override_measurement, None);
}

#[tokio::test]
async fn record_delete_removes_photo_files() {
    let app = make_app();
    let service = seed_service(&app.store);
    let record = seed_record(&app.store, &service, "Zona Sul");
    let token = login(&app.router, ADMIN_EMAIL, ADMIN_PASSWORD).await;

    let uri = format!("/api/records/{}/photos", record.id);
    upload(&app.router, &uri, &token, "BEFORE", &[("a.jpg", b"x")]).await;
    upload(&app.router, &uri, &token, "AFTER", &[("b.jpg", b"y")]).await;

    let uploads_dir = app._dir.path().join("uploads");
    assert_eq!(std::fs::read_dir(&uploads_dir).unwrap().count(), 2);

    let (status, _) = send(
        &app.router,
        "DELETE",
        &format!("/api/records/{}", record.id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    assert!(app.store.get_record(&record.id).unwrap().is_none());
    assert_eq!(std::fs::read_dir(&uploads_dir).unwrap().count(), 0);
}
