pub const SCHEMA: &str = r#"
-- Accounts. Assignments are a JSON array of objects carrying at least a
-- "contractGroup" key; the column is rewritten wholesale by the contract
-- cascades and `version` is bumped on every rewrite.
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    email TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    password_hash TEXT NOT NULL,      -- argon2id hash with embedded salt
    role TEXT NOT NULL DEFAULT 'OPERATOR' CHECK (role IN ('ADMIN', 'OPERATOR')),
    assignments TEXT NOT NULL DEFAULT '[]',
    version INTEGER NOT NULL DEFAULT 0,
    reset_token TEXT,
    reset_token_expires TEXT,
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now'))
);

-- Bearer sessions issued on login
CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY,
    token_hash TEXT NOT NULL,
    token_lookup TEXT NOT NULL,        -- first 8 chars of the raw token id
    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    created_at TEXT DEFAULT (datetime('now')),
    expires_at TEXT,                   -- NULL = never
    last_used_at TEXT
);

CREATE TABLE IF NOT EXISTS units (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    symbol TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS services (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    unit_id TEXT NOT NULL REFERENCES units(id)
);

-- Two-level location tree: groups (is_group = 1, parent_id NULL) and members
-- pointing at a group of the same city. `city` is the contract-group label.
CREATE TABLE IF NOT EXISTS locations (
    id TEXT PRIMARY KEY,
    city TEXT NOT NULL,
    name TEXT NOT NULL,
    lat REAL,
    lng REAL,
    observations TEXT,
    is_group INTEGER NOT NULL DEFAULT 0,
    parent_id TEXT REFERENCES locations(id) ON DELETE SET NULL
);

CREATE TABLE IF NOT EXISTS location_services (
    location_id TEXT NOT NULL REFERENCES locations(id) ON DELETE CASCADE,
    service_id TEXT NOT NULL REFERENCES services(id) ON DELETE CASCADE,
    measurement REAL NOT NULL,
    PRIMARY KEY (location_id, service_id)
);

-- Work evidence. operator_name and contract_group are denormalized copies so
-- a record stays meaningful after operator deletion or label drift.
CREATE TABLE IF NOT EXISTS records (
    id TEXT PRIMARY KEY,
    operator_id TEXT REFERENCES users(id) ON DELETE SET NULL,
    operator_name TEXT NOT NULL,
    service_id TEXT NOT NULL REFERENCES services(id),
    contract_group TEXT NOT NULL,
    location_name TEXT NOT NULL,
    location_area REAL NOT NULL DEFAULT 0,
    override_measurement REAL,
    gps_used INTEGER NOT NULL DEFAULT 0,
    start_time TEXT NOT NULL,
    end_time TEXT,
    before_photos TEXT NOT NULL DEFAULT '[]',
    after_photos TEXT NOT NULL DEFAULT '[]',
    location_id TEXT REFERENCES locations(id) ON DELETE SET NULL
);

CREATE TABLE IF NOT EXISTS contract_configs (
    id TEXT PRIMARY KEY,
    contract_group TEXT NOT NULL UNIQUE,
    cycle_start_day INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS goals (
    id TEXT PRIMARY KEY,
    contract_group TEXT NOT NULL,
    month TEXT NOT NULL,               -- "YYYY-MM"
    target_area REAL NOT NULL,
    service_id TEXT NOT NULL REFERENCES services(id)
);

-- Append-only
CREATE TABLE IF NOT EXISTS audit_log (
    id TEXT PRIMARY KEY,
    admin_id TEXT NOT NULL,
    admin_username TEXT NOT NULL,
    action TEXT NOT NULL,
    record_id TEXT,
    details TEXT NOT NULL,
    timestamp TEXT DEFAULT (datetime('now'))
);

-- Create indexes
CREATE UNIQUE INDEX IF NOT EXISTS idx_sessions_lookup ON sessions(token_lookup);
CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id);
CREATE INDEX IF NOT EXISTS idx_locations_city ON locations(city);
CREATE INDEX IF NOT EXISTS idx_locations_parent ON locations(parent_id);
CREATE INDEX IF NOT EXISTS idx_location_services_service ON location_services(service_id);
CREATE INDEX IF NOT EXISTS idx_records_contract_group ON records(contract_group);
CREATE INDEX IF NOT EXISTS idx_records_operator ON records(operator_id);
CREATE INDEX IF NOT EXISTS idx_records_start_time ON records(start_time);
CREATE INDEX IF NOT EXISTS idx_goals_contract_group ON goals(contract_group);
CREATE INDEX IF NOT EXISTS idx_audit_log_timestamp ON audit_log(timestamp);
"#;
