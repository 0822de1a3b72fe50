use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Role;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    #[serde(skip)]
    pub password_hash: String,
    pub role: Role,
    /// Raw JSON array of assignment objects, e.g.
    /// `[{"contractGroup":"Zona Sul","role":"lead"}]`. Stored verbatim so that
    /// untouched rows stay byte-identical across contract-group cascades.
    #[serde(skip)]
    pub assignments: String,
    /// Incremented on every assignments rewrite.
    pub version: i64,
    #[serde(skip)]
    pub reset_token: Option<String>,
    #[serde(skip)]
    pub reset_token_expires: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub token_hash: String,
    pub token_lookup: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Unit {
    pub id: String,
    pub name: String,
    pub symbol: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub id: String,
    pub name: String,
    pub unit_id: String,
}

/// A location row. Groups (`is_group = true`) are top-level; members carry a
/// `parent_id` pointing at a group of the same city.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    pub id: String,
    /// Contract-group label. Exposed to API callers as `contractGroup`.
    pub city: String,
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
}

/// One (location, service) measurement pair, joined with service and unit
/// detail for the nested read view.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceMeasurement {
    pub service_id: String,
    pub name: String,
    pub measurement: f64,
    pub unit: Unit,
}

#[derive(Debug, Clone, Serialize)]
pub struct LocationWithServices {
    pub location: Location,
    pub services: Vec<ServiceMeasurement>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRecord {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operator_id: Option<String>,
    pub operator_name: String,
    pub service_id: String,
    pub contract_group: String,
    pub location_name: String,
    pub location_area: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub override_measurement: Option<f64>,
    pub gps_used: bool,
    pub start_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    pub before_photos: Vec<String>,
    pub after_photos: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_id: Option<String>,
}

impl ServiceRecord {
    /// Override wins over the measured area when present.
    #[must_use]
    pub fn effective_measurement(&self) -> f64 {
        self.override_measurement.unwrap_or(self.location_area)
    }
}

/// Photo upload phase. Attaching AFTER photos stamps the record's end time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhotoPhase {
    #[serde(rename = "BEFORE")]
    Before,
    #[serde(rename = "AFTER")]
    After,
}

impl std::str::FromStr for PhotoPhase {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BEFORE" => Ok(PhotoPhase::Before),
            "AFTER" => Ok(PhotoPhase::After),
            other => Err(crate::error::Error::Validation(format!(
                "phase must be BEFORE or AFTER, got '{other}'"
            ))),
        }
    }
}

/// A record joined with its location's observations for read views.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordDetail {
    #[serde(flatten)]
    pub record: ServiceRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observations: Option<String>,
}

/// Minimal projection used by the performance report aggregation.
#[derive(Debug, Clone)]
pub struct ReportRow {
    pub start_time: DateTime<Utc>,
    pub contract_group: String,
    pub location_area: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractConfig {
    pub id: String,
    pub contract_group: String,
    pub cycle_start_day: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    pub id: String,
    pub contract_group: String,
    /// "YYYY-MM".
    pub month: String,
    pub target_area: f64,
    pub service_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub id: String,
    pub admin_id: String,
    pub admin_username: String,
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,
    pub details: String,
    pub timestamp: DateTime<Utc>,
}

/// Row counts touched by a contract-group rename.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct RenameOutcome {
    pub locations: usize,
    pub configs: usize,
    pub records: usize,
    pub users: usize,
}

/// Row counts removed by a contract-group delete.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct DeleteOutcome {
    pub locations: usize,
    pub configs: usize,
    pub users: usize,
}

/// One row of the bulk location import file.
#[derive(Debug, Clone, Deserialize)]
pub struct LocationImportRow {
    #[serde(alias = "cidade")]
    pub city: String,
    /// Group label (neighborhood).
    #[serde(default)]
    pub bairro: Option<String>,
    /// Member label (street).
    #[serde(default)]
    pub rua: Option<String>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
    #[serde(default, alias = "observacoes")]
    pub observations: Option<String>,
}

impl LocationImportRow {
    #[must_use]
    pub fn group_label(&self) -> Option<&str> {
        self.bairro.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    #[must_use]
    pub fn member_label(&self) -> Option<&str> {
        self.rua.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportSummary {
    pub groups_created: usize,
    pub members_created: usize,
    /// (city, group, member) triples whose group was absent from the input.
    pub skipped: Vec<(String, String, String)>,
}
