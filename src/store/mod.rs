pub mod assignments;
mod schema;
mod sqlite;

pub use sqlite::SqliteStore;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::*;

/// Store defines the database interface.
pub trait Store: Send + Sync {
    fn initialize(&self) -> Result<()>;

    // User operations
    fn create_user(&self, user: &User) -> Result<()>;
    fn get_user(&self, id: &str) -> Result<Option<User>>;
    fn get_user_by_email(&self, email: &str) -> Result<Option<User>>;
    fn get_user_by_reset_token(&self, token: &str) -> Result<Option<User>>;
    fn list_users(&self) -> Result<Vec<User>>;
    fn update_user(&self, user: &User) -> Result<()>;
    fn update_password(&self, user_id: &str, password_hash: &str) -> Result<()>;
    fn set_reset_token(
        &self,
        user_id: &str,
        token: Option<&str>,
        expires: Option<DateTime<Utc>>,
    ) -> Result<()>;
    fn delete_user(&self, id: &str) -> Result<bool>;

    // Session operations
    fn create_session(&self, session: &Session) -> Result<()>;
    fn get_session_by_lookup(&self, lookup: &str) -> Result<Option<Session>>;
    fn update_session_last_used(&self, id: &str) -> Result<()>;
    fn delete_session(&self, id: &str) -> Result<bool>;

    // Unit operations
    fn create_unit(&self, unit: &Unit) -> Result<()>;
    fn get_unit(&self, id: &str) -> Result<Option<Unit>>;
    fn list_units(&self) -> Result<Vec<Unit>>;
    fn update_unit(&self, unit: &Unit) -> Result<()>;
    /// Fails with [`crate::error::Error::UnitInUse`] while any service
    /// references the unit.
    fn delete_unit(&self, id: &str) -> Result<bool>;

    // Service operations
    fn create_service(&self, service: &Service) -> Result<()>;
    fn get_service(&self, id: &str) -> Result<Option<Service>>;
    fn list_services(&self) -> Result<Vec<Service>>;
    fn update_service(&self, service: &Service) -> Result<()>;
    fn delete_service(&self, id: &str) -> Result<bool>;

    // Location operations. Creation and update take the full measurement set;
    // update replaces the prior set wholesale in one transaction.
    fn create_location(&self, location: &Location, services: &[(String, f64)]) -> Result<()>;
    fn get_location(&self, id: &str) -> Result<Option<Location>>;
    fn list_locations(&self) -> Result<Vec<LocationWithServices>>;
    fn update_location(&self, location: &Location, services: &[(String, f64)]) -> Result<()>;
    fn delete_location(&self, id: &str) -> Result<bool>;
    /// Destructive two-pass bulk import: clears every location (and cascaded
    /// measurement row), then rebuilds the group/member tree from `rows`.
    fn replace_location_tree(&self, rows: &[LocationImportRow]) -> Result<ImportSummary>;

    // Contract-group cascades. Both run as a single transaction; delete
    // performs its record-count guard inside that same transaction.
    fn rename_contract_group(&self, old_name: &str, new_name: &str) -> Result<RenameOutcome>;
    fn delete_contract_group(&self, name: &str) -> Result<DeleteOutcome>;

    // Contract config operations
    fn list_contract_configs(&self) -> Result<Vec<ContractConfig>>;
    fn upsert_contract_configs(&self, configs: &[(String, i64)]) -> Result<()>;

    // Record operations
    fn create_record(&self, record: &ServiceRecord) -> Result<()>;
    fn get_record(&self, id: &str) -> Result<Option<ServiceRecord>>;
    fn get_record_detail(&self, id: &str) -> Result<Option<RecordDetail>>;
    fn list_records(&self) -> Result<Vec<RecordDetail>>;
    fn update_record(&self, record: &ServiceRecord) -> Result<()>;
    fn set_override_measurement(&self, id: &str, value: Option<f64>) -> Result<()>;
    /// Appends photo paths to the given phase's sequence. AFTER uploads also
    /// stamp `end_time`. Returns the updated record.
    fn append_photos(&self, id: &str, phase: PhotoPhase, paths: &[String])
    -> Result<ServiceRecord>;
    fn delete_record(&self, id: &str) -> Result<bool>;
    fn list_report_rows(
        &self,
        groups: &[String],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ReportRow>>;

    // Goal operations
    fn create_goal(&self, goal: &Goal) -> Result<()>;
    fn get_goal(&self, id: &str) -> Result<Option<Goal>>;
    fn list_goals(&self) -> Result<Vec<Goal>>;
    fn update_goal(&self, goal: &Goal) -> Result<()>;
    fn delete_goal(&self, id: &str) -> Result<bool>;

    // Audit operations
    fn append_audit(&self, entry: &AuditEntry) -> Result<()>;
    fn list_audit(&self) -> Result<Vec<AuditEntry>>;
}
