use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};

use super::Store;
use super::assignments;
use super::schema::SCHEMA;
use crate::error::{Error, Result};
use crate::types::*;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // Handle SQLite's default datetime format: "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            tracing::error!("Invalid datetime in database: '{}' - {}", s, e);
            Utc::now()
        })
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn parse_photos(s: &str) -> Vec<String> {
    serde_json::from_str(s).unwrap_or_else(|e| {
        tracing::error!("Invalid photo list in database: '{}' - {}", s, e);
        Vec::new()
    })
}

fn photos_json(paths: &[String]) -> String {
    serde_json::to_string(paths).unwrap_or_else(|_| "[]".to_string())
}

fn role_from_sql(idx: usize, s: String) -> rusqlite::Result<Role> {
    s.parse().map_err(|_| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            format!("invalid role '{s}'").into(),
        )
    })
}

const USER_COLUMNS: &str = "id, email, name, password_hash, role, assignments, version, \
                            reset_token, reset_token_expires, created_at, updated_at";

fn user_from_row(row: &rusqlite::Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        name: row.get(2)?,
        password_hash: row.get(3)?,
        role: role_from_sql(4, row.get::<_, String>(4)?)?,
        assignments: row.get(5)?,
        version: row.get(6)?,
        reset_token: row.get(7)?,
        reset_token_expires: row.get::<_, Option<String>>(8)?.map(|s| parse_datetime(&s)),
        created_at: parse_datetime(&row.get::<_, String>(9)?),
        updated_at: parse_datetime(&row.get::<_, String>(10)?),
    })
}

const RECORD_COLUMNS: &str = "id, operator_id, operator_name, service_id, contract_group, \
                              location_name, location_area, override_measurement, gps_used, \
                              start_time, end_time, before_photos, after_photos, location_id";

fn record_from_row(row: &rusqlite::Row) -> rusqlite::Result<ServiceRecord> {
    Ok(ServiceRecord {
        id: row.get(0)?,
        operator_id: row.get(1)?,
        operator_name: row.get(2)?,
        service_id: row.get(3)?,
        contract_group: row.get(4)?,
        location_name: row.get(5)?,
        location_area: row.get(6)?,
        override_measurement: row.get(7)?,
        gps_used: row.get(8)?,
        start_time: parse_datetime(&row.get::<_, String>(9)?),
        end_time: row.get::<_, Option<String>>(10)?.map(|s| parse_datetime(&s)),
        before_photos: parse_photos(&row.get::<_, String>(11)?),
        after_photos: parse_photos(&row.get::<_, String>(12)?),
        location_id: row.get(13)?,
    })
}

const LOCATION_COLUMNS: &str = "id, city, name, lat, lng, observations, is_group, parent_id";

fn location_from_row(row: &rusqlite::Row) -> rusqlite::Result<Location> {
    Ok(Location {
        id: row.get(0)?,
        city: row.get(1)?,
        name: row.get(2)?,
        lat: row.get(3)?,
        lng: row.get(4)?,
        observations: row.get(5)?,
        is_group: row.get(6)?,
        parent_id: row.get(7)?,
    })
}

/// Rewrites assignment arrays for every user matched by `rewrite`, inside the
/// caller's transaction. Users whose array is untouched are not written at
/// all, so their stored bytes and version stay as they were.
fn rewrite_user_assignments<F>(tx: &rusqlite::Transaction, rewrite: F) -> Result<usize>
where
    F: Fn(&str) -> Result<Option<String>>,
{
    let users: Vec<(String, String)> = {
        let mut stmt = tx.prepare("SELECT id, assignments FROM users")?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        rows.collect::<std::result::Result<Vec<_>, _>>()?
    };

    let now = format_datetime(&Utc::now());
    let mut written = 0;
    for (id, raw) in users {
        if let Some(updated) = rewrite(&raw)? {
            tx.execute(
                "UPDATE users SET assignments = ?1, version = version + 1, updated_at = ?2
                 WHERE id = ?3",
                params![updated, now, id],
            )?;
            written += 1;
        }
    }
    Ok(written)
}

impl Store for SqliteStore {
    fn initialize(&self) -> Result<()> {
        self.conn().execute_batch(SCHEMA)?;
        Ok(())
    }

    // User operations

    fn create_user(&self, user: &User) -> Result<()> {
        self.conn().execute(
            &format!("INSERT INTO users ({USER_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"),
            params![
                user.id,
                user.email,
                user.name,
                user.password_hash,
                user.role.as_str(),
                user.assignments,
                user.version,
                user.reset_token,
                user.reset_token_expires.as_ref().map(format_datetime),
                format_datetime(&user.created_at),
                format_datetime(&user.updated_at),
            ],
        )?;
        Ok(())
    }

    fn get_user(&self, id: &str) -> Result<Option<User>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
            params![id],
            user_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
            params![email],
            user_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_user_by_reset_token(&self, token: &str) -> Result<Option<User>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE reset_token = ?1"),
            params![token],
            user_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_users(&self) -> Result<Vec<User>> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY name"))?;

        let rows = stmt.query_map([], user_from_row)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn update_user(&self, user: &User) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE users SET email = ?1, name = ?2, password_hash = ?3, role = ?4,
                 assignments = ?5, version = ?6, updated_at = ?7
             WHERE id = ?8",
            params![
                user.email,
                user.name,
                user.password_hash,
                user.role.as_str(),
                user.assignments,
                user.version,
                format_datetime(&Utc::now()),
                user.id,
            ],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn update_password(&self, user_id: &str, password_hash: &str) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE users SET password_hash = ?1, reset_token = NULL,
                 reset_token_expires = NULL, updated_at = ?2
             WHERE id = ?3",
            params![password_hash, format_datetime(&Utc::now()), user_id],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn set_reset_token(
        &self,
        user_id: &str,
        token: Option<&str>,
        expires: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE users SET reset_token = ?1, reset_token_expires = ?2, updated_at = ?3
             WHERE id = ?4",
            params![
                token,
                expires.as_ref().map(format_datetime),
                format_datetime(&Utc::now()),
                user_id,
            ],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn delete_user(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM users WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    // Session operations

    fn create_session(&self, session: &Session) -> Result<()> {
        self.conn().execute(
            "INSERT INTO sessions (id, token_hash, token_lookup, user_id, created_at, expires_at, last_used_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                session.id,
                session.token_hash,
                session.token_lookup,
                session.user_id,
                format_datetime(&session.created_at),
                session.expires_at.as_ref().map(format_datetime),
                session.last_used_at.as_ref().map(format_datetime),
            ],
        )?;
        Ok(())
    }

    fn get_session_by_lookup(&self, lookup: &str) -> Result<Option<Session>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, token_hash, token_lookup, user_id, created_at, expires_at, last_used_at
             FROM sessions WHERE token_lookup = ?1",
            params![lookup],
            |row| {
                Ok(Session {
                    id: row.get(0)?,
                    token_hash: row.get(1)?,
                    token_lookup: row.get(2)?,
                    user_id: row.get(3)?,
                    created_at: parse_datetime(&row.get::<_, String>(4)?),
                    expires_at: row.get::<_, Option<String>>(5)?.map(|s| parse_datetime(&s)),
                    last_used_at: row.get::<_, Option<String>>(6)?.map(|s| parse_datetime(&s)),
                })
            },
        )
        .optional()
        .map_err(Error::from)
    }

    fn update_session_last_used(&self, id: &str) -> Result<()> {
        self.conn().execute(
            "UPDATE sessions SET last_used_at = ?1 WHERE id = ?2",
            params![format_datetime(&Utc::now()), id],
        )?;
        Ok(())
    }

    fn delete_session(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM sessions WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    // Unit operations

    fn create_unit(&self, unit: &Unit) -> Result<()> {
        self.conn().execute(
            "INSERT INTO units (id, name, symbol) VALUES (?1, ?2, ?3)",
            params![unit.id, unit.name, unit.symbol],
        )?;
        Ok(())
    }

    fn get_unit(&self, id: &str) -> Result<Option<Unit>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, name, symbol FROM units WHERE id = ?1",
            params![id],
            |row| {
                Ok(Unit {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    symbol: row.get(2)?,
                })
            },
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_units(&self) -> Result<Vec<Unit>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT id, name, symbol FROM units ORDER BY name")?;

        let rows = stmt.query_map([], |row| {
            Ok(Unit {
                id: row.get(0)?,
                name: row.get(1)?,
                symbol: row.get(2)?,
            })
        })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn update_unit(&self, unit: &Unit) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE units SET name = ?1, symbol = ?2 WHERE id = ?3",
            params![unit.name, unit.symbol, unit.id],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn delete_unit(&self, id: &str) -> Result<bool> {
        let conn = self.conn();
        let referenced: i64 = conn.query_row(
            "SELECT COUNT(*) FROM services WHERE unit_id = ?1",
            params![id],
            |row| row.get(0),
        )?;

        if referenced > 0 {
            return Err(Error::UnitInUse(referenced));
        }

        let rows = conn.execute("DELETE FROM units WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    // Service operations

    fn create_service(&self, service: &Service) -> Result<()> {
        self.conn().execute(
            "INSERT INTO services (id, name, unit_id) VALUES (?1, ?2, ?3)",
            params![service.id, service.name, service.unit_id],
        )?;
        Ok(())
    }

    fn get_service(&self, id: &str) -> Result<Option<Service>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, name, unit_id FROM services WHERE id = ?1",
            params![id],
            |row| {
                Ok(Service {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    unit_id: row.get(2)?,
                })
            },
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_services(&self) -> Result<Vec<Service>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT id, name, unit_id FROM services ORDER BY name")?;

        let rows = stmt.query_map([], |row| {
            Ok(Service {
                id: row.get(0)?,
                name: row.get(1)?,
                unit_id: row.get(2)?,
            })
        })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn update_service(&self, service: &Service) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE services SET name = ?1, unit_id = ?2 WHERE id = ?3",
            params![service.name, service.unit_id, service.id],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn delete_service(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM services WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    // Location operations

    fn create_location(&self, location: &Location, services: &[(String, f64)]) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        tx.execute(
            &format!("INSERT INTO locations ({LOCATION_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"),
            params![
                location.id,
                location.city,
                location.name,
                location.lat,
                location.lng,
                location.observations,
                location.is_group,
                location.parent_id,
            ],
        )?;

        for (service_id, measurement) in services {
            tx.execute(
                "INSERT INTO location_services (location_id, service_id, measurement)
                 VALUES (?1, ?2, ?3)",
                params![location.id, service_id, measurement],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    fn get_location(&self, id: &str) -> Result<Option<Location>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {LOCATION_COLUMNS} FROM locations WHERE id = ?1"),
            params![id],
            location_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_locations(&self) -> Result<Vec<LocationWithServices>> {
        let conn = self.conn();

        let locations: Vec<Location> = {
            let mut stmt =
                conn.prepare(&format!("SELECT {LOCATION_COLUMNS} FROM locations ORDER BY name"))?;
            let rows = stmt.query_map([], location_from_row)?;
            rows.collect::<std::result::Result<Vec<_>, _>>()?
        };

        let mut by_location: HashMap<String, Vec<ServiceMeasurement>> = HashMap::new();
        {
            let mut stmt = conn.prepare(
                "SELECT ls.location_id, ls.service_id, s.name, ls.measurement,
                        u.id, u.name, u.symbol
                 FROM location_services ls
                 JOIN services s ON s.id = ls.service_id
                 JOIN units u ON u.id = s.unit_id",
            )?;
            let rows = stmt.query_map([], |row| {
                let location_id: String = row.get(0)?;
                Ok((
                    location_id,
                    ServiceMeasurement {
                        service_id: row.get(1)?,
                        name: row.get(2)?,
                        measurement: row.get(3)?,
                        unit: Unit {
                            id: row.get(4)?,
                            name: row.get(5)?,
                            symbol: row.get(6)?,
                        },
                    },
                ))
            })?;
            for row in rows {
                let (location_id, measurement) = row?;
                by_location.entry(location_id).or_default().push(measurement);
            }
        }

        Ok(locations
            .into_iter()
            .map(|location| {
                let services = by_location.remove(&location.id).unwrap_or_default();
                LocationWithServices { location, services }
            })
            .collect())
    }

    fn update_location(&self, location: &Location, services: &[(String, f64)]) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let rows = tx.execute(
            "UPDATE locations SET city = ?1, name = ?2, lat = ?3, lng = ?4, observations = ?5
             WHERE id = ?6",
            params![
                location.city,
                location.name,
                location.lat,
                location.lng,
                location.observations,
                location.id,
            ],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }

        tx.execute(
            "DELETE FROM location_services WHERE location_id = ?1",
            params![location.id],
        )?;

        for (service_id, measurement) in services {
            tx.execute(
                "INSERT INTO location_services (location_id, service_id, measurement)
                 VALUES (?1, ?2, ?3)",
                params![location.id, service_id, measurement],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    fn delete_location(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM locations WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    fn replace_location_tree(&self, rows: &[LocationImportRow]) -> Result<ImportSummary> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        tx.execute("DELETE FROM location_services", [])?;
        tx.execute("DELETE FROM locations", [])?;

        let mut summary = ImportSummary::default();
        let mut group_ids: HashMap<(String, String), String> = HashMap::new();

        // Pass 1: group rows only, deduplicated on (city, group).
        for row in rows {
            let (Some(group), None) = (row.group_label(), row.member_label()) else {
                continue;
            };
            let key = (row.city.trim().to_string(), group.to_string());
            if group_ids.contains_key(&key) {
                continue;
            }

            let id = uuid::Uuid::new_v4().to_string();
            tx.execute(
                &format!("INSERT INTO locations ({LOCATION_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, NULL)"),
                params![id, key.0, key.1, row.lat, row.lng, row.observations],
            )?;
            group_ids.insert(key, id);
            summary.groups_created += 1;
        }

        // Pass 2: member rows, linked through the index built above.
        for row in rows {
            let (Some(group), Some(member)) = (row.group_label(), row.member_label()) else {
                continue;
            };
            let city = row.city.trim().to_string();
            let Some(parent_id) = group_ids.get(&(city.clone(), group.to_string())) else {
                tracing::warn!(
                    "import: member '{}' references missing group '{}' in '{}', skipping",
                    member,
                    group,
                    city
                );
                summary
                    .skipped
                    .push((city, group.to_string(), member.to_string()));
                continue;
            };

            tx.execute(
                &format!("INSERT INTO locations ({LOCATION_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7)"),
                params![
                    uuid::Uuid::new_v4().to_string(),
                    city,
                    member,
                    row.lat,
                    row.lng,
                    row.observations,
                    parent_id,
                ],
            )?;
            summary.members_created += 1;
        }

        tx.commit()?;
        Ok(summary)
    }

    // Contract-group cascades

    fn rename_contract_group(&self, old_name: &str, new_name: &str) -> Result<RenameOutcome> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let locations = tx.execute(
            "UPDATE locations SET city = ?1 WHERE city = ?2",
            params![new_name, old_name],
        )?;
        let configs = tx.execute(
            "UPDATE contract_configs SET contract_group = ?1 WHERE contract_group = ?2",
            params![new_name, old_name],
        )?;
        let records = tx.execute(
            "UPDATE records SET contract_group = ?1 WHERE contract_group = ?2",
            params![new_name, old_name],
        )?;

        let users =
            rewrite_user_assignments(&tx, |raw| assignments::rename_group(raw, old_name, new_name))?;

        tx.commit()?;
        Ok(RenameOutcome {
            locations,
            configs,
            records,
            users,
        })
    }

    fn delete_contract_group(&self, name: &str) -> Result<DeleteOutcome> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        // Guard and deletes share the transaction, so a record landing after
        // the count cannot slip past the check.
        let linked: i64 = tx.query_row(
            "SELECT COUNT(*) FROM records WHERE contract_group = ?1",
            params![name],
            |row| row.get(0),
        )?;
        if linked > 0 {
            return Err(Error::ContractGroupInUse(linked));
        }

        let locations = tx.execute("DELETE FROM locations WHERE city = ?1", params![name])?;
        let configs = tx.execute(
            "DELETE FROM contract_configs WHERE contract_group = ?1",
            params![name],
        )?;

        let users = rewrite_user_assignments(&tx, |raw| assignments::remove_group(raw, name))?;

        tx.commit()?;
        Ok(DeleteOutcome {
            locations,
            configs,
            users,
        })
    }

    // Contract config operations

    fn list_contract_configs(&self) -> Result<Vec<ContractConfig>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, contract_group, cycle_start_day FROM contract_configs
             ORDER BY contract_group",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(ContractConfig {
                id: row.get(0)?,
                contract_group: row.get(1)?,
                cycle_start_day: row.get(2)?,
            })
        })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn upsert_contract_configs(&self, configs: &[(String, i64)]) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        for (contract_group, cycle_start_day) in configs {
            tx.execute(
                "INSERT INTO contract_configs (id, contract_group, cycle_start_day)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(contract_group) DO UPDATE SET cycle_start_day = excluded.cycle_start_day",
                params![
                    uuid::Uuid::new_v4().to_string(),
                    contract_group,
                    cycle_start_day,
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    // Record operations

    fn create_record(&self, record: &ServiceRecord) -> Result<()> {
        self.conn().execute(
            &format!("INSERT INTO records ({RECORD_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"),
            params![
                record.id,
                record.operator_id,
                record.operator_name,
                record.service_id,
                record.contract_group,
                record.location_name,
                record.location_area,
                record.override_measurement,
                record.gps_used,
                format_datetime(&record.start_time),
                record.end_time.as_ref().map(format_datetime),
                photos_json(&record.before_photos),
                photos_json(&record.after_photos),
                record.location_id,
            ],
        )?;
        Ok(())
    }

    fn get_record(&self, id: &str) -> Result<Option<ServiceRecord>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {RECORD_COLUMNS} FROM records WHERE id = ?1"),
            params![id],
            record_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_record_detail(&self, id: &str) -> Result<Option<RecordDetail>> {
        let conn = self.conn();
        conn.query_row(
            &format!(
                "SELECT {}, l.observations FROM records r
                 LEFT JOIN locations l ON l.id = r.location_id
                 WHERE r.id = ?1",
                record_columns_qualified()
            ),
            params![id],
            |row| {
                Ok(RecordDetail {
                    record: record_from_row(row)?,
                    observations: row.get(14)?,
                })
            },
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_records(&self) -> Result<Vec<RecordDetail>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {}, l.observations FROM records r
             LEFT JOIN locations l ON l.id = r.location_id
             ORDER BY r.start_time DESC",
            record_columns_qualified()
        ))?;

        let rows = stmt.query_map([], |row| {
            Ok(RecordDetail {
                record: record_from_row(row)?,
                observations: row.get(14)?,
            })
        })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn update_record(&self, record: &ServiceRecord) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE records SET operator_name = ?1, service_id = ?2, contract_group = ?3,
                 location_name = ?4, location_area = ?5, override_measurement = ?6,
                 gps_used = ?7, start_time = ?8, end_time = ?9, before_photos = ?10,
                 after_photos = ?11, location_id = ?12
             WHERE id = ?13",
            params![
                record.operator_name,
                record.service_id,
                record.contract_group,
                record.location_name,
                record.location_area,
                record.override_measurement,
                record.gps_used,
                format_datetime(&record.start_time),
                record.end_time.as_ref().map(format_datetime),
                photos_json(&record.before_photos),
                photos_json(&record.after_photos),
                record.location_id,
                record.id,
            ],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn set_override_measurement(&self, id: &str, value: Option<f64>) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE records SET override_measurement = ?1 WHERE id = ?2",
            params![value, id],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn append_photos(
        &self,
        id: &str,
        phase: PhotoPhase,
        paths: &[String],
    ) -> Result<ServiceRecord> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let mut record = tx
            .query_row(
                &format!("SELECT {RECORD_COLUMNS} FROM records WHERE id = ?1"),
                params![id],
                record_from_row,
            )
            .optional()?
            .ok_or(Error::NotFound)?;

        match phase {
            PhotoPhase::Before => {
                record.before_photos.extend(paths.iter().cloned());
                tx.execute(
                    "UPDATE records SET before_photos = ?1 WHERE id = ?2",
                    params![photos_json(&record.before_photos), id],
                )?;
            }
            PhotoPhase::After => {
                record.after_photos.extend(paths.iter().cloned());
                record.end_time = Some(Utc::now());
                tx.execute(
                    "UPDATE records SET after_photos = ?1, end_time = ?2 WHERE id = ?3",
                    params![
                        photos_json(&record.after_photos),
                        record.end_time.as_ref().map(format_datetime),
                        id,
                    ],
                )?;
            }
        }

        tx.commit()?;
        Ok(record)
    }

    fn delete_record(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM records WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    fn list_report_rows(
        &self,
        groups: &[String],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ReportRow>> {
        if groups.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; groups.len()].join(", ");
        let sql = format!(
            "SELECT start_time, contract_group, location_area FROM records
             WHERE contract_group IN ({placeholders})
               AND start_time >= ? AND start_time <= ?
               AND location_area > 0
             ORDER BY start_time"
        );

        let mut values: Vec<String> = groups.to_vec();
        values.push(format_datetime(&start));
        values.push(format_datetime(&end));

        let conn = self.conn();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), |row| {
            Ok(ReportRow {
                start_time: parse_datetime(&row.get::<_, String>(0)?),
                contract_group: row.get(1)?,
                location_area: row.get(2)?,
            })
        })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    // Goal operations

    fn create_goal(&self, goal: &Goal) -> Result<()> {
        self.conn().execute(
            "INSERT INTO goals (id, contract_group, month, target_area, service_id)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                goal.id,
                goal.contract_group,
                goal.month,
                goal.target_area,
                goal.service_id,
            ],
        )?;
        Ok(())
    }

    fn get_goal(&self, id: &str) -> Result<Option<Goal>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, contract_group, month, target_area, service_id FROM goals WHERE id = ?1",
            params![id],
            |row| {
                Ok(Goal {
                    id: row.get(0)?,
                    contract_group: row.get(1)?,
                    month: row.get(2)?,
                    target_area: row.get(3)?,
                    service_id: row.get(4)?,
                })
            },
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_goals(&self) -> Result<Vec<Goal>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, contract_group, month, target_area, service_id FROM goals
             ORDER BY month DESC",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(Goal {
                id: row.get(0)?,
                contract_group: row.get(1)?,
                month: row.get(2)?,
                target_area: row.get(3)?,
                service_id: row.get(4)?,
            })
        })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn update_goal(&self, goal: &Goal) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE goals SET contract_group = ?1, month = ?2, target_area = ?3, service_id = ?4
             WHERE id = ?5",
            params![
                goal.contract_group,
                goal.month,
                goal.target_area,
                goal.service_id,
                goal.id,
            ],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn delete_goal(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM goals WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    // Audit operations

    fn append_audit(&self, entry: &AuditEntry) -> Result<()> {
        self.conn().execute(
            "INSERT INTO audit_log (id, admin_id, admin_username, action, record_id, details, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                entry.id,
                entry.admin_id,
                entry.admin_username,
                entry.action,
                entry.record_id,
                entry.details,
                format_datetime(&entry.timestamp),
            ],
        )?;
        Ok(())
    }

    fn list_audit(&self) -> Result<Vec<AuditEntry>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, admin_id, admin_username, action, record_id, details, timestamp
             FROM audit_log ORDER BY timestamp DESC",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(AuditEntry {
                id: row.get(0)?,
                admin_id: row.get(1)?,
                admin_username: row.get(2)?,
                action: row.get(3)?,
                record_id: row.get(4)?,
                details: row.get(5)?,
                timestamp: parse_datetime(&row.get::<_, String>(6)?),
            })
        })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }
}

fn record_columns_qualified() -> String {
    RECORD_COLUMNS
        .split(", ")
        .map(|c| format!("r.{}", c.trim()))
        .collect::<Vec<_>>()
        .join(", ")
}
