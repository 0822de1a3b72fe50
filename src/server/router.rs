use std::sync::Arc;
use std::time::Instant;

use axum::extract::{DefaultBodyLimit, Request};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{delete, get, post, put};
use axum::Router;

use super::{
    audit, auth, contract_configs, contract_groups, goals, locations, records, reports, services,
    units, users,
};
use crate::mail::Mailer;
use crate::photos::PhotoStore;
use crate::store::Store;

const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

pub struct AppState {
    pub store: Arc<dyn Store>,
    pub photos: PhotoStore,
    pub mailer: Arc<dyn Mailer>,
    /// Base URL of the frontend, used to build password-reset links.
    pub frontend_url: Option<String>,
}

async fn health() -> &'static str {
    "OK"
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status();

    tracing::info!(
        "{} {} {} {}ms",
        method,
        uri.path(),
        status.as_u16(),
        latency.as_millis()
    );

    response
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        // Auth
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/me", get(auth::me))
        .route("/api/auth/forgot-password", post(auth::forgot_password))
        .route("/api/auth/reset-password", post(auth::reset_password))
        // Users
        .route("/api/users", get(users::list_users))
        .route("/api/users", post(users::create_user))
        .route("/api/users/{id}", put(users::update_user))
        .route("/api/users/{id}", delete(users::delete_user))
        // Units
        .route("/api/units", get(units::list_units))
        .route("/api/units", post(units::create_unit))
        .route("/api/units/{id}", put(units::update_unit))
        .route("/api/units/{id}", delete(units::delete_unit))
        // Services
        .route("/api/services", get(services::list_services))
        .route("/api/services", post(services::create_service))
        .route("/api/services/{id}", put(services::update_service))
        .route("/api/services/{id}", delete(services::delete_service))
        // Locations
        .route("/api/locations", get(locations::list_locations))
        .route("/api/locations", post(locations::create_location))
        .route("/api/locations/{id}", put(locations::update_location))
        .route("/api/locations/{id}", delete(locations::delete_location))
        // Contract groups (rename / guarded delete cascades)
        .route(
            "/api/contract-groups/{name}",
            put(contract_groups::rename_contract_group),
        )
        .route(
            "/api/contract-groups/{name}",
            delete(contract_groups::delete_contract_group),
        )
        // Contract configs
        .route("/api/contract-configs", get(contract_configs::list_configs))
        .route(
            "/api/contract-configs",
            post(contract_configs::upsert_configs),
        )
        // Records
        .route("/api/records", get(records::list_records))
        .route("/api/records", post(records::create_record))
        .route("/api/records/{id}", get(records::get_record))
        .route("/api/records/{id}", put(records::update_record))
        .route("/api/records/{id}", delete(records::delete_record))
        .route(
            "/api/records/{id}/measurement",
            put(records::override_measurement),
        )
        .route("/api/records/{id}/photos", post(records::upload_photos))
        // Goals
        .route("/api/goals", get(goals::list_goals))
        .route("/api/goals", post(goals::create_goal))
        .route("/api/goals/{id}", put(goals::update_goal))
        .route("/api/goals/{id}", delete(goals::delete_goal))
        // Audit log
        .route("/api/auditlog", get(audit::list_entries))
        .route("/api/auditlog", post(audit::create_entry))
        // Reports
        .route(
            "/api/reports/performance-graph",
            get(reports::performance_graph),
        )
        // Stored photo evidence
        .route("/uploads/{file}", get(records::serve_photo))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}
