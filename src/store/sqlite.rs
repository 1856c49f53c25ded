use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::Store;
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
        conn.busy_timeout(std::time::Duration::from_secs(5))?;

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

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(Error::from)
}

fn json_column<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

/// Maps a unique-constraint failure to `AlreadyExists`.
fn insert_result(result: rusqlite::Result<usize>) -> Result<()> {
    match result {
        Ok(_) => Ok(()),
        Err(e) if is_constraint_violation(&e) => Err(Error::AlreadyExists),
        Err(e) => Err(Error::from(e)),
    }
}

/// Builds a LIKE pattern matching `needle` anywhere, with wildcards escaped.
fn contains_pattern(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len() + 2);
    escaped.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

const USER_COLUMNS: &str =
    "id, external_id, first_name, last_name, email, phone, role_id, created_at, updated_at";

fn row_to_user(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        external_id: row.get(1)?,
        first_name: row.get(2)?,
        last_name: row.get(3)?,
        email: row.get(4)?,
        phone: row.get(5)?,
        role_id: row.get(6)?,
        created_at: parse_datetime(&row.get::<_, String>(7)?),
        updated_at: parse_datetime(&row.get::<_, String>(8)?),
    })
}

const ROLE_COLUMNS: &str = "id, name, description, is_active, created_at, updated_at";

fn row_to_role(row: &Row<'_>) -> rusqlite::Result<Role> {
    Ok(Role {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        is_active: row.get(3)?,
        created_at: parse_datetime(&row.get::<_, String>(4)?),
        updated_at: parse_datetime(&row.get::<_, String>(5)?),
    })
}

const RULE_COLUMNS: &str = "role, endpoint, viewer, contributor, admin, created_at";

fn row_to_rule(row: &Row<'_>) -> rusqlite::Result<AccessRule> {
    Ok(AccessRule {
        role: row.get(0)?,
        endpoint: row.get(1)?,
        capabilities: Capabilities::new(row.get(2)?, row.get(3)?, row.get(4)?),
        created_at: parse_datetime(&row.get::<_, String>(5)?),
    })
}

const HISTORY_COLUMNS: &str =
    "execution_id, pipeline_id, dataset_id, status, user_id, created_at, updated_at";

fn row_to_history(row: &Row<'_>) -> rusqlite::Result<ExecutionHistoryEntry> {
    let status: String = row.get(3)?;
    Ok(ExecutionHistoryEntry {
        execution_id: row.get(0)?,
        pipeline_id: row.get(1)?,
        dataset_id: row.get(2)?,
        status: status
            .parse()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))?,
        user_id: row.get(4)?,
        created_at: parse_datetime(&row.get::<_, String>(5)?),
        updated_at: parse_datetime(&row.get::<_, String>(6)?),
    })
}

const INFO_COLUMNS: &str = "id, dataset_id, dataset_name, file_id, description, tags_json, \
     dataset_type, permissions, is_spatial, is_temporal, temporal_granularities_json, \
     spatial_granularities_json, location_columns_json, time_columns_json, \
     pulled_from_pipeline, pipeline_id, created_at, updated_at";

/// Maps an information row; the owner set is loaded separately.
fn row_to_info(row: &Row<'_>) -> rusqlite::Result<DatasetInformation> {
    Ok(DatasetInformation {
        id: row.get(0)?,
        dataset_id: row.get(1)?,
        dataset_name: row.get(2)?,
        file_id: row.get(3)?,
        description: row.get(4)?,
        tags: json_column(row, 5)?,
        dataset_type: row.get(6)?,
        permissions: row.get(7)?,
        is_spatial: row.get(8)?,
        is_temporal: row.get(9)?,
        temporal_granularities: json_column(row, 10)?,
        spatial_granularities: json_column(row, 11)?,
        location_columns: json_column(row, 12)?,
        time_columns: json_column(row, 13)?,
        pulled_from_pipeline: row.get(14)?,
        pipeline_id: row.get(15)?,
        owner_ids: Vec::new(),
        created_at: parse_datetime(&row.get::<_, String>(16)?),
        updated_at: parse_datetime(&row.get::<_, String>(17)?),
    })
}

fn load_history_refs(conn: &Connection, pipeline_id: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT execution_id FROM pipeline_history_refs WHERE pipeline_id = ?1 ORDER BY seq",
    )?;
    let rows = stmt.query_map(params![pipeline_id], |row| row.get(0))?;
    rows.collect::<std::result::Result<Vec<_>, _>>()
        .map_err(Error::from)
}

fn load_owners(conn: &Connection, info_id: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT user_id FROM dataset_owners WHERE info_id = ?1 ORDER BY rowid",
    )?;
    let rows = stmt.query_map(params![info_id], |row| row.get(0))?;
    rows.collect::<std::result::Result<Vec<_>, _>>()
        .map_err(Error::from)
}

fn pipeline_with_history(conn: &Connection, row: (String, String, bool, String)) -> Result<Pipeline> {
    let (id, name, enabled, created_at) = row;
    let history = load_history_refs(conn, &id)?;
    Ok(Pipeline {
        id,
        name,
        enabled,
        history,
        created_at: parse_datetime(&created_at),
    })
}

fn info_with_owners(conn: &Connection, mut info: DatasetInformation) -> Result<DatasetInformation> {
    info.owner_ids = load_owners(conn, &info.id)?;
    Ok(info)
}

impl Store for SqliteStore {
    fn initialize(&self) -> Result<()> {
        self.conn().execute_batch(SCHEMA)?;
        Ok(())
    }

    // User operations

    fn create_user(&self, user: &User) -> Result<()> {
        insert_result(self.conn().execute(
            "INSERT INTO users (id, external_id, first_name, last_name, email, phone, role_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                user.id,
                user.external_id,
                user.first_name,
                user.last_name,
                user.email,
                user.phone,
                user.role_id,
                format_datetime(&user.created_at),
                format_datetime(&user.updated_at),
            ],
        ))
    }

    fn get_user(&self, id: &str) -> Result<Option<User>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
            params![id],
            row_to_user,
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_user_by_external_id(&self, external_id: &str) -> Result<Option<User>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE external_id = ?1"),
            params![external_id],
            row_to_user,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_users(&self, cursor: &str, limit: i32) -> Result<Vec<User>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id > ?1 ORDER BY id LIMIT ?2"
        ))?;

        let rows = stmt.query_map(params![cursor, limit], row_to_user)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn update_user_role(&self, id: &str, role_id: &str) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE users SET role_id = ?1, updated_at = ?2 WHERE id = ?3",
            params![role_id, format_datetime(&Utc::now()), id],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    // Role operations

    fn create_role(&self, role: &Role) -> Result<()> {
        insert_result(self.conn().execute(
            "INSERT INTO roles (id, name, description, is_active, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                role.id,
                role.name,
                role.description,
                role.is_active,
                format_datetime(&role.created_at),
                format_datetime(&role.updated_at),
            ],
        ))
    }

    fn get_role(&self, id: &str) -> Result<Option<Role>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {ROLE_COLUMNS} FROM roles WHERE id = ?1"),
            params![id],
            row_to_role,
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_role_by_name(&self, name: &str) -> Result<Option<Role>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {ROLE_COLUMNS} FROM roles WHERE name = ?1"),
            params![name],
            row_to_role,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_roles(&self) -> Result<Vec<Role>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!("SELECT {ROLE_COLUMNS} FROM roles ORDER BY name"))?;
        let rows = stmt.query_map([], row_to_role)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    // Access rule operations

    fn insert_access_rule_if_absent(&self, rule: &AccessRule) -> Result<bool> {
        let rows = self.conn().execute(
            "INSERT INTO endpoint_access (role, endpoint, viewer, contributor, admin, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT (role, endpoint) DO NOTHING",
            params![
                rule.role,
                rule.endpoint,
                rule.capabilities.viewer,
                rule.capabilities.contributor,
                rule.capabilities.admin,
                format_datetime(&rule.created_at),
            ],
        )?;
        Ok(rows > 0)
    }

    fn get_access_rule(&self, role: &str, endpoint: &str) -> Result<Option<AccessRule>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {RULE_COLUMNS} FROM endpoint_access WHERE role = ?1 AND endpoint = ?2"),
            params![role, endpoint],
            row_to_rule,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_access_rules(&self, role: &str) -> Result<Vec<AccessRule>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {RULE_COLUMNS} FROM endpoint_access WHERE role = ?1 ORDER BY rowid"
        ))?;
        let rows = stmt.query_map(params![role], row_to_rule)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn list_all_access_rules(&self) -> Result<Vec<AccessRule>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {RULE_COLUMNS} FROM endpoint_access ORDER BY role, endpoint"
        ))?;
        let rows = stmt.query_map([], row_to_rule)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn upsert_access_rule(&self, rule: &AccessRule) -> Result<()> {
        self.conn().execute(
            "INSERT INTO endpoint_access (role, endpoint, viewer, contributor, admin, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT (role, endpoint) DO UPDATE SET
                viewer = excluded.viewer,
                contributor = excluded.contributor,
                admin = excluded.admin",
            params![
                rule.role,
                rule.endpoint,
                rule.capabilities.viewer,
                rule.capabilities.contributor,
                rule.capabilities.admin,
                format_datetime(&rule.created_at),
            ],
        )?;
        Ok(())
    }

    fn delete_access_rule(&self, role: &str, endpoint: &str) -> Result<bool> {
        let rows = self.conn().execute(
            "DELETE FROM endpoint_access WHERE role = ?1 AND endpoint = ?2",
            params![role, endpoint],
        )?;
        Ok(rows > 0)
    }

    // Pipeline operations

    fn create_pipeline(&self, pipeline: &Pipeline) -> Result<()> {
        insert_result(self.conn().execute(
            "INSERT INTO pipelines (id, name, enabled, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                pipeline.id,
                pipeline.name,
                pipeline.enabled,
                format_datetime(&pipeline.created_at),
            ],
        ))
    }

    fn get_pipeline(&self, id: &str) -> Result<Option<Pipeline>> {
        let conn = self.conn();
        let row: Option<(String, String, bool, String)> = conn
            .query_row(
                "SELECT id, name, enabled, created_at FROM pipelines WHERE id = ?1",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()?;
        row.map(|r| pipeline_with_history(&conn, r)).transpose()
    }

    fn get_pipeline_by_name(&self, name: &str) -> Result<Option<Pipeline>> {
        let conn = self.conn();
        let row: Option<(String, String, bool, String)> = conn
            .query_row(
                "SELECT id, name, enabled, created_at FROM pipelines WHERE name = ?1",
                params![name],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()?;
        row.map(|r| pipeline_with_history(&conn, r)).transpose()
    }

    fn list_pipelines(&self, name_filter: Option<&str>) -> Result<Vec<Pipeline>> {
        let conn = self.conn();
        let pattern = contains_pattern(name_filter.unwrap_or(""));
        let rows: Vec<(String, String, bool, String)> = {
            let mut stmt = conn.prepare(
                r"SELECT id, name, enabled, created_at FROM pipelines
                  WHERE name LIKE ?1 ESCAPE '\' ORDER BY name",
            )?;
            let rows = stmt.query_map(params![pattern], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            })?;
            rows.collect::<std::result::Result<Vec<_>, _>>()?
        };

        rows.into_iter()
            .map(|r| pipeline_with_history(&conn, r))
            .collect()
    }

    fn set_pipeline_enabled(&self, id: &str, enabled: bool) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE pipelines SET enabled = ?1 WHERE id = ?2",
            params![enabled, id],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    // Execution history operations

    fn create_history_entry(&self, entry: &ExecutionHistoryEntry) -> Result<()> {
        insert_result(self.conn().execute(
            "INSERT INTO pipeline_history (execution_id, pipeline_id, dataset_id, status, user_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                entry.execution_id,
                entry.pipeline_id,
                entry.dataset_id,
                entry.status.as_str(),
                entry.user_id,
                format_datetime(&entry.created_at),
                format_datetime(&entry.updated_at),
            ],
        ))
    }

    fn append_pipeline_history(&self, pipeline_id: &str, execution_id: &str) -> Result<()> {
        self.conn().execute(
            "INSERT INTO pipeline_history_refs (pipeline_id, execution_id) VALUES (?1, ?2)
             ON CONFLICT (execution_id) DO NOTHING",
            params![pipeline_id, execution_id],
        )?;
        Ok(())
    }

    fn get_history_entry(&self, execution_id: &str) -> Result<Option<ExecutionHistoryEntry>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {HISTORY_COLUMNS} FROM pipeline_history WHERE execution_id = ?1"),
            params![execution_id],
            row_to_history,
        )
        .optional()
        .map_err(Error::from)
    }

    fn update_history_status(
        &self,
        execution_id: &str,
        status: ExecutionStatus,
        updated_at: &DateTime<Utc>,
    ) -> Result<bool> {
        let rows = self.conn().execute(
            "UPDATE pipeline_history SET status = ?2, updated_at = ?3
             WHERE execution_id = ?1 AND (status = 'running' OR status = ?2)",
            params![execution_id, status.as_str(), format_datetime(updated_at)],
        )?;
        Ok(rows > 0)
    }

    fn list_pipeline_history(
        &self,
        pipeline_id: &str,
        since: Option<&DateTime<Utc>>,
    ) -> Result<Vec<ExecutionHistoryEntry>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT h.execution_id, h.pipeline_id, h.dataset_id, h.status, h.user_id, h.created_at, h.updated_at
             FROM pipeline_history h
             JOIN pipeline_history_refs r ON r.execution_id = h.execution_id
             WHERE r.pipeline_id = ?1
             ORDER BY r.seq",
        )?;

        let rows = stmt.query_map(params![pipeline_id], row_to_history)?;
        let entries = rows.collect::<std::result::Result<Vec<_>, _>>()?;

        // Stored timestamps vary in fractional precision, so compare parsed values.
        Ok(match since {
            Some(since) => entries
                .into_iter()
                .filter(|e| e.created_at >= *since)
                .collect(),
            None => entries,
        })
    }

    // Dataset operations

    fn get_data_document(&self, id: &str) -> Result<Option<DataDocument>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, rows_json, columns_json, record_count, created_at, updated_at
             FROM datasets WHERE id = ?1",
            params![id],
            |row| {
                Ok(DataDocument {
                    id: row.get(0)?,
                    rows: json_column(row, 1)?,
                    columns: json_column(row, 2)?,
                    record_count: row.get(3)?,
                    created_at: parse_datetime(&row.get::<_, String>(4)?),
                    updated_at: parse_datetime(&row.get::<_, String>(5)?),
                })
            },
        )
        .optional()
        .map_err(Error::from)
    }

    fn insert_data_document(&self, doc: &DataDocument) -> Result<()> {
        let rows_json = to_json(&doc.rows)?;
        let columns_json = to_json(&doc.columns)?;
        insert_result(self.conn().execute(
            "INSERT INTO datasets (id, rows_json, columns_json, record_count, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                doc.id,
                rows_json,
                columns_json,
                doc.record_count,
                format_datetime(&doc.created_at),
                format_datetime(&doc.updated_at),
            ],
        ))
    }

    fn replace_data_rows(
        &self,
        id: &str,
        rows: &[Map<String, Value>],
        columns: &[String],
        updated_at: &DateTime<Utc>,
    ) -> Result<bool> {
        let rows_json = to_json(rows)?;
        let columns_json = to_json(columns)?;
        let count = i64::try_from(rows.len()).map_err(|e| Error::Internal(e.to_string()))?;
        let changed = self.conn().execute(
            "UPDATE datasets SET rows_json = ?1, columns_json = ?2, record_count = ?3, updated_at = ?4
             WHERE id = ?5",
            params![rows_json, columns_json, count, format_datetime(updated_at), id],
        )?;
        Ok(changed > 0)
    }

    // Dataset information operations

    fn get_dataset_info_by_dataset_id(&self, dataset_id: &str) -> Result<Option<DatasetInformation>> {
        let conn = self.conn();
        let info = conn
            .query_row(
                &format!(
                    "SELECT {INFO_COLUMNS} FROM dataset_information
                     WHERE dataset_id = ?1 ORDER BY rowid LIMIT 1"
                ),
                params![dataset_id],
                row_to_info,
            )
            .optional()?;
        info.map(|i| info_with_owners(&conn, i)).transpose()
    }

    fn get_dataset_info_by_name(&self, dataset_name: &str) -> Result<Option<DatasetInformation>> {
        let conn = self.conn();
        let info = conn
            .query_row(
                &format!(
                    "SELECT {INFO_COLUMNS} FROM dataset_information
                     WHERE dataset_name = ?1 ORDER BY rowid LIMIT 1"
                ),
                params![dataset_name],
                row_to_info,
            )
            .optional()?;
        info.map(|i| info_with_owners(&conn, i)).transpose()
    }

    fn insert_dataset_info(&self, info: &DatasetInformation) -> Result<()> {
        let conn = self.conn();
        insert_result(conn.execute(
            &format!(
                "INSERT INTO dataset_information ({INFO_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)"
            ),
            params![
                info.id,
                info.dataset_id,
                info.dataset_name,
                info.file_id,
                info.description,
                to_json(&info.tags)?,
                info.dataset_type,
                info.permissions,
                info.is_spatial,
                info.is_temporal,
                to_json(&info.temporal_granularities)?,
                to_json(&info.spatial_granularities)?,
                to_json(&info.location_columns)?,
                to_json(&info.time_columns)?,
                info.pulled_from_pipeline,
                info.pipeline_id,
                format_datetime(&info.created_at),
                format_datetime(&info.updated_at),
            ],
        ))?;

        for user_id in &info.owner_ids {
            conn.execute(
                "INSERT INTO dataset_owners (info_id, user_id, added_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT (info_id, user_id) DO NOTHING",
                params![info.id, user_id, format_datetime(&info.created_at)],
            )?;
        }
        Ok(())
    }

    fn mark_dataset_info_pulled(&self, info_id: &str, updated_at: &DateTime<Utc>) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE dataset_information SET updated_at = ?1, pulled_from_pipeline = 1 WHERE id = ?2",
            params![format_datetime(updated_at), info_id],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn add_dataset_owner(&self, info_id: &str, user_id: &str) -> Result<bool> {
        let rows = self.conn().execute(
            "INSERT INTO dataset_owners (info_id, user_id, added_at) VALUES (?1, ?2, ?3)
             ON CONFLICT (info_id, user_id) DO NOTHING",
            params![info_id, user_id, format_datetime(&Utc::now())],
        )?;
        Ok(rows > 0)
    }

    fn list_dataset_info(
        &self,
        search: Option<&str>,
        owner_id: Option<&str>,
    ) -> Result<Vec<DatasetInformation>> {
        let conn = self.conn();
        let pattern = contains_pattern(search.unwrap_or(""));
        let infos: Vec<DatasetInformation> = {
            let mut stmt = conn.prepare(&format!(
                r"SELECT {INFO_COLUMNS} FROM dataset_information
                  WHERE dataset_name LIKE ?1 ESCAPE '\'
                    AND (?2 IS NULL OR id IN (SELECT info_id FROM dataset_owners WHERE user_id = ?2))
                  ORDER BY updated_at DESC, rowid"
            ))?;
            let rows = stmt.query_map(params![pattern, owner_id], row_to_info)?;
            rows.collect::<std::result::Result<Vec<_>, _>>()?
        };

        infos
            .into_iter()
            .map(|i| info_with_owners(&conn, i))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn test_store() -> (TempDir, SqliteStore) {
        let temp = TempDir::new().unwrap();
        let store = SqliteStore::new(temp.path().join("test.db")).unwrap();
        store.initialize().unwrap();
        (temp, store)
    }

    fn rule(role: &str, endpoint: &str, capabilities: Capabilities) -> AccessRule {
        AccessRule {
            role: role.to_string(),
            endpoint: endpoint.to_string(),
            capabilities,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_initialize_creates_tables() {
        let (_temp, store) = test_store();

        let conn = store.conn();
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        for table in [
            "users",
            "roles",
            "endpoint_access",
            "pipelines",
            "pipeline_history",
            "pipeline_history_refs",
            "datasets",
            "dataset_information",
            "dataset_owners",
        ] {
            assert!(tables.contains(&table.to_string()), "missing {table}");
        }
    }

    #[test]
    fn test_initialize_is_repeatable() {
        let (_temp, store) = test_store();
        store.initialize().unwrap();
    }

    #[test]
    fn test_user_external_id_is_unique() {
        let (_temp, store) = test_store();
        let now = Utc::now();
        let user = User {
            id: "user-1".to_string(),
            external_id: "sub-1".to_string(),
            first_name: Some("Ada".to_string()),
            last_name: None,
            email: None,
            phone: None,
            role_id: None,
            created_at: now,
            updated_at: now,
        };
        store.create_user(&user).unwrap();

        let dup = User {
            id: "user-2".to_string(),
            ..user.clone()
        };
        assert!(matches!(store.create_user(&dup), Err(Error::AlreadyExists)));

        let fetched = store.get_user_by_external_id("sub-1").unwrap().unwrap();
        assert_eq!(fetched.id, "user-1");
        assert_eq!(fetched.first_name.as_deref(), Some("Ada"));
    }

    #[test]
    fn test_update_user_role_missing_user() {
        let (_temp, store) = test_store();
        let result = store.update_user_role("nobody", "role-1");
        assert!(matches!(result, Err(Error::NotFound)));
    }

    #[test]
    fn test_insert_rule_if_absent_never_overwrites() {
        let (_temp, store) = test_store();

        assert!(store
            .insert_access_rule_if_absent(&rule("user", "/dashboard", Capabilities::VIEW))
            .unwrap());
        assert!(!store
            .insert_access_rule_if_absent(&rule("user", "/dashboard", Capabilities::FULL))
            .unwrap());

        let stored = store.get_access_rule("user", "/dashboard").unwrap().unwrap();
        assert_eq!(stored.capabilities, Capabilities::VIEW);
    }

    #[test]
    fn test_upsert_and_delete_rule() {
        let (_temp, store) = test_store();

        store
            .upsert_access_rule(&rule("admin", "/pipeline", Capabilities::VIEW))
            .unwrap();
        store
            .upsert_access_rule(&rule("admin", "/pipeline", Capabilities::FULL))
            .unwrap();

        let rules = store.list_access_rules("admin").unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].capabilities, Capabilities::FULL);

        assert!(store.delete_access_rule("admin", "/pipeline").unwrap());
        assert!(!store.delete_access_rule("admin", "/pipeline").unwrap());
    }

    #[test]
    fn test_pipeline_name_unique_and_history_refs() {
        let (_temp, store) = test_store();
        let now = Utc::now();
        let pipeline = Pipeline {
            id: "pipe-1".to_string(),
            name: "Sales Pull".to_string(),
            enabled: true,
            history: Vec::new(),
            created_at: now,
        };
        store.create_pipeline(&pipeline).unwrap();

        let dup = Pipeline {
            id: "pipe-2".to_string(),
            ..pipeline.clone()
        };
        assert!(matches!(store.create_pipeline(&dup), Err(Error::AlreadyExists)));

        for exec in ["exec-a", "exec-b"] {
            store
                .create_history_entry(&ExecutionHistoryEntry {
                    execution_id: exec.to_string(),
                    pipeline_id: "pipe-1".to_string(),
                    dataset_id: "ds-1".to_string(),
                    status: ExecutionStatus::Running,
                    user_id: "u1".to_string(),
                    created_at: now,
                    updated_at: now,
                })
                .unwrap();
            store.append_pipeline_history("pipe-1", exec).unwrap();
        }
        store.append_pipeline_history("pipe-1", "exec-a").unwrap();

        let fetched = store.get_pipeline_by_name("Sales Pull").unwrap().unwrap();
        assert_eq!(fetched.history, vec!["exec-a", "exec-b"]);
        assert_eq!(store.list_pipeline_history("pipe-1", None).unwrap().len(), 2);
    }

    #[test]
    fn test_list_pipelines_filter_is_case_insensitive_and_literal() {
        let (_temp, store) = test_store();
        for (id, name) in [("a", "Sales Pull"), ("b", "Inventory_Sync"), ("c", "InventoryXSync")] {
            store
                .create_pipeline(&Pipeline {
                    id: id.to_string(),
                    name: name.to_string(),
                    enabled: true,
                    history: Vec::new(),
                    created_at: Utc::now(),
                })
                .unwrap();
        }

        let sales = store.list_pipelines(Some("sales")).unwrap();
        assert_eq!(sales.len(), 1);
        assert_eq!(sales[0].name, "Sales Pull");

        let underscore = store.list_pipelines(Some("y_s")).unwrap();
        assert_eq!(underscore.len(), 1);
        assert_eq!(underscore[0].name, "Inventory_Sync");

        assert_eq!(store.list_pipelines(None).unwrap().len(), 3);
    }

    #[test]
    fn test_history_status_is_write_once() {
        let (_temp, store) = test_store();
        let now = Utc::now();
        store
            .create_pipeline(&Pipeline {
                id: "p".to_string(),
                name: "p".to_string(),
                enabled: true,
                history: Vec::new(),
                created_at: now,
            })
            .unwrap();
        store
            .create_history_entry(&ExecutionHistoryEntry {
                execution_id: "e".to_string(),
                pipeline_id: "p".to_string(),
                dataset_id: "d".to_string(),
                status: ExecutionStatus::Running,
                user_id: "u".to_string(),
                created_at: now,
                updated_at: now,
            })
            .unwrap();

        assert!(store.update_history_status("e", ExecutionStatus::Completed, &now).unwrap());
        assert!(store.update_history_status("e", ExecutionStatus::Completed, &now).unwrap());
        assert!(!store.update_history_status("e", ExecutionStatus::Error, &now).unwrap());
        assert!(!store.update_history_status("e", ExecutionStatus::Running, &now).unwrap());

        let entry = store.get_history_entry("e").unwrap().unwrap();
        assert_eq!(entry.status, ExecutionStatus::Completed);
    }

    #[test]
    fn test_data_document_replace() {
        let (_temp, store) = test_store();
        let now = Utc::now();
        let row = json!({"region": "north", "total": 3});
        let doc = DataDocument {
            id: "ds-1".to_string(),
            rows: vec![row.as_object().unwrap().clone()],
            columns: vec!["region".to_string(), "total".to_string()],
            record_count: 1,
            created_at: now,
            updated_at: now,
        };
        store.insert_data_document(&doc).unwrap();

        let new_rows: Vec<Map<String, Value>> = (0..3)
            .map(|i| json!({"region": "south", "total": i}).as_object().unwrap().clone())
            .collect();
        assert!(store
            .replace_data_rows("ds-1", &new_rows, &doc.columns, &Utc::now())
            .unwrap());
        assert!(!store
            .replace_data_rows("missing", &new_rows, &doc.columns, &Utc::now())
            .unwrap());

        let fetched = store.get_data_document("ds-1").unwrap().unwrap();
        assert_eq!(fetched.record_count, 3);
        assert_eq!(fetched.rows[2]["total"], json!(2));
        assert_eq!(fetched.columns, vec!["region", "total"]);
    }

    #[test]
    fn test_dataset_owner_set_semantics() {
        let (_temp, store) = test_store();
        let info = DatasetInformation::for_pipeline(
            "info-1".to_string(),
            "ds-1",
            "Sales",
            None,
            "u1",
            Utc::now(),
        );
        store.insert_dataset_info(&info).unwrap();

        assert!(!store.add_dataset_owner("info-1", "u1").unwrap());
        assert!(store.add_dataset_owner("info-1", "u2").unwrap());
        assert!(!store.add_dataset_owner("info-1", "u2").unwrap());

        let fetched = store.get_dataset_info_by_dataset_id("ds-1").unwrap().unwrap();
        assert_eq!(fetched.owner_ids, vec!["u1", "u2"]);
        assert!(fetched.pulled_from_pipeline);
        assert_eq!(fetched.permissions, "public");

        let mine = store.list_dataset_info(None, Some("u2")).unwrap();
        assert_eq!(mine.len(), 1);
        assert!(store.list_dataset_info(Some("inventory"), None).unwrap().is_empty());
    }
}
