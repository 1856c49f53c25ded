pub const SCHEMA: &str = r#"
-- Roles group access rules; names are the lookup key used by rules
CREATE TABLE IF NOT EXISTS roles (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    description TEXT,
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now'))
);

-- Users are created on first sign-in through the identity provider
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    external_id TEXT NOT NULL UNIQUE,
    first_name TEXT,
    last_name TEXT,
    email TEXT,
    phone TEXT,
    -- Not a foreign key: a dangling role reference degrades to the default role
    role_id TEXT,
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now'))
);

-- Route capabilities per role, matched by longest endpoint prefix
CREATE TABLE IF NOT EXISTS endpoint_access (
    role TEXT NOT NULL,
    endpoint TEXT NOT NULL,
    viewer INTEGER NOT NULL DEFAULT 0,
    contributor INTEGER NOT NULL DEFAULT 0,
    admin INTEGER NOT NULL DEFAULT 0,
    created_at TEXT DEFAULT (datetime('now')),
    PRIMARY KEY (role, endpoint)
);

-- Named data pulls; looked up by name when recording history
CREATE TABLE IF NOT EXISTS pipelines (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    enabled INTEGER NOT NULL DEFAULT 1,
    created_at TEXT DEFAULT (datetime('now'))
);

-- One row per execution; status only moves running -> completed|error
CREATE TABLE IF NOT EXISTS pipeline_history (
    execution_id TEXT PRIMARY KEY,
    pipeline_id TEXT NOT NULL REFERENCES pipelines(id),
    dataset_id TEXT NOT NULL,
    status TEXT NOT NULL CHECK (status IN ('running', 'completed', 'error')),
    user_id TEXT NOT NULL,
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now'))
);

-- Ordered history reference list of each pipeline
CREATE TABLE IF NOT EXISTS pipeline_history_refs (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    pipeline_id TEXT NOT NULL REFERENCES pipelines(id),
    execution_id TEXT NOT NULL UNIQUE
);

-- Raw dataset rows (JSON encoded)
CREATE TABLE IF NOT EXISTS datasets (
    id TEXT PRIMARY KEY,
    rows_json TEXT NOT NULL,
    columns_json TEXT NOT NULL,
    record_count INTEGER NOT NULL DEFAULT 0,
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now'))
);

-- Catalogue metadata for datasets
CREATE TABLE IF NOT EXISTS dataset_information (
    id TEXT PRIMARY KEY,
    dataset_id TEXT NOT NULL,
    dataset_name TEXT NOT NULL,
    file_id TEXT,
    description TEXT NOT NULL DEFAULT '',
    tags_json TEXT NOT NULL DEFAULT '[]',
    dataset_type TEXT NOT NULL DEFAULT '',
    permissions TEXT NOT NULL DEFAULT 'public',
    is_spatial INTEGER NOT NULL DEFAULT 0,
    is_temporal INTEGER NOT NULL DEFAULT 0,
    temporal_granularities_json TEXT NOT NULL DEFAULT '[]',
    spatial_granularities_json TEXT NOT NULL DEFAULT '[]',
    location_columns_json TEXT NOT NULL DEFAULT '[]',
    time_columns_json TEXT NOT NULL DEFAULT '[]',
    pulled_from_pipeline INTEGER NOT NULL DEFAULT 0,
    pipeline_id TEXT,
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now'))
);

-- Owner set of a dataset information record
CREATE TABLE IF NOT EXISTS dataset_owners (
    info_id TEXT NOT NULL REFERENCES dataset_information(id) ON DELETE CASCADE,
    user_id TEXT NOT NULL,
    added_at TEXT DEFAULT (datetime('now')),
    PRIMARY KEY (info_id, user_id)
);

-- Create indexes
CREATE INDEX IF NOT EXISTS idx_users_role ON users(role_id);
CREATE INDEX IF NOT EXISTS idx_history_pipeline ON pipeline_history(pipeline_id);
CREATE INDEX IF NOT EXISTS idx_history_refs_pipeline ON pipeline_history_refs(pipeline_id);
CREATE INDEX IF NOT EXISTS idx_dataset_info_dataset ON dataset_information(dataset_id);
CREATE INDEX IF NOT EXISTS idx_dataset_info_name ON dataset_information(dataset_name);
CREATE INDEX IF NOT EXISTS idx_dataset_owners_user ON dataset_owners(user_id);
"#;
