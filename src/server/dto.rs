//! Request and response shapes for the HTTP API.
//!
//! The external contract is camelCase and renames the internal `city` column
//! to `contractGroup`. That mapping happens here and nowhere else, so every
//! endpoint returns the same canonical shape per entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::types::{Location, LocationWithServices, Role, Service, ServiceMeasurement, Unit, User};

// ---- auth ----

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub user: UserResponse,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
}

// ---- users ----

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub assignments: Value,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The one place a stored user row becomes an API user.
pub fn user_to_response(user: &User) -> UserResponse {
    let assignments =
        serde_json::from_str(&user.assignments).unwrap_or_else(|_| Value::Array(Vec::new()));
    UserResponse {
        id: user.id.clone(),
        email: user.email.clone(),
        name: user.name.clone(),
        role: user.role,
        assignments,
        version: user.version,
        created_at: user.created_at,
        updated_at: user.updated_at,
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub name: String,
    pub password: String,
    pub role: Role,
    #[serde(default)]
    pub assignments: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub assignments: Option<Value>,
}

// ---- catalog ----

#[derive(Debug, Deserialize)]
pub struct UnitRequest {
    pub name: String,
    pub symbol: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRequest {
    pub name: String,
    #[serde(alias = "unit_id")]
    pub unit_id: String,
}

#[derive(Debug, Serialize)]
pub struct ServiceResponse {
    pub id: String,
    pub name: String,
    pub unit: Unit,
}

pub fn service_to_response(service: Service, unit: Unit) -> ServiceResponse {
    ServiceResponse {
        id: service.id,
        name: service.name,
        unit,
    }
}

// ---- locations ----

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceMeasurementInput {
    #[serde(alias = "service_id")]
    pub service_id: String,
    pub measurement: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationRequest {
    #[serde(alias = "city")]
    pub contract_group: String,
    pub name: String,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
    #[serde(default)]
    pub observations: Option<String>,
    pub services: Vec<ServiceMeasurementInput>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationResponse {
    pub id: String,
    /// External name for the internal `city` column.
    pub contract_group: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lng: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observations: Option<String>,
    pub is_group: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub services: Vec<ServiceMeasurement>,
}

pub fn location_to_response(location: Location, services: Vec<ServiceMeasurement>) -> LocationResponse {
    LocationResponse {
        id: location.id,
        contract_group: location.city,
        name: location.name,
        lat: location.lat,
        lng: location.lng,
        observations: location.observations,
        is_group: location.is_group,
        parent_id: location.parent_id,
        services,
    }
}

impl From<LocationWithServices> for LocationResponse {
    fn from(value: LocationWithServices) -> Self {
        location_to_response(value.location, value.services)
    }
}

// ---- contract groups / configs ----

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameContractGroupRequest {
    pub new_name: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteContractGroupRequest {
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractConfigInput {
    pub contract_group: String,
    pub cycle_start_day: i64,
}

#[derive(Debug, Deserialize)]
pub struct UpsertContractConfigsRequest {
    pub configs: Vec<ContractConfigInput>,
}

// ---- records ----

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLocationInfo {
    #[serde(alias = "city")]
    pub contract_group: String,
    pub name: String,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
    #[serde(default)]
    pub observations: Option<String>,
    #[serde(default)]
    pub services: Vec<ServiceMeasurementInput>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRecordRequest {
    pub operator_id: String,
    pub service_id: String,
    pub contract_group: String,
    pub location_name: String,
    pub location_area: f64,
    #[serde(default)]
    pub gps_used: bool,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub location_id: Option<String>,
    #[serde(default)]
    pub new_location_info: Option<NewLocationInfo>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRecordRequest {
    #[serde(default)]
    pub service_id: Option<String>,
    #[serde(default)]
    pub contract_group: Option<String>,
    #[serde(default)]
    pub location_name: Option<String>,
    #[serde(default)]
    pub location_area: Option<f64>,
    #[serde(default)]
    pub gps_used: Option<bool>,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub before_photos: Option<Vec<String>>,
    #[serde(default)]
    pub after_photos: Option<Vec<String>>,
}

/// Distinguishes an absent field (reject) from an explicit null (clear).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverrideMeasurementRequest {
    #[serde(default, deserialize_with = "double_option")]
    pub override_measurement: Option<Option<f64>>,
}

fn double_option<'de, D>(deserializer: D) -> Result<Option<Option<f64>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::deserialize(deserializer).map(Some)
}

// ---- goals ----

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalRequest {
    pub contract_group: String,
    pub month: String,
    pub target_area: f64,
    #[serde(alias = "service_id")]
    pub service_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalResponse {
    pub id: String,
    pub contract_group: String,
    pub month: String,
    pub target_area: f64,
    pub service_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<Service>,
}

// ---- audit ----

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAuditEntryRequest {
    pub action: String,
    #[serde(default)]
    pub record_id: Option<String>,
    pub details: String,
}

// ---- reports ----

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceGraphParams {
    pub start_date: String,
    pub end_date: String,
    /// Comma-separated list of contract-group labels.
    pub contract_groups: String,
}

#[derive(Debug, Serialize)]
pub struct ReportDataset {
    pub label: String,
    pub data: Vec<f64>,
}

#[derive(Debug, Serialize)]
pub struct PerformanceGraphResponse {
    pub labels: Vec<String>,
    pub datasets: Vec<ReportDataset>,
}
