use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::{Connection, OptionalExtension, params};

use crate::models::{
    AnswerRecord, CoreError, CoreErrorKind, StepResult, TrackedItemSelection,
};
use crate::persistence::{MigrationStore, PersistenceResult, TrackedStateStore};
use crate::sqlite::migrations::{SqliteMigration, current_schema_version, migration, migrations};

const MIGRATIONS_TABLE: &str = "studykit_schema_migrations";

pub struct SqliteStore {
    database_path: PathBuf,
}

impl SqliteStore {
    pub fn new(database_path: impl Into<PathBuf>) -> Self {
        Self {
            database_path: database_path.into(),
        }
    }

    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    pub fn planned_migrations(&self, from_version: i64) -> Vec<&'static SqliteMigration> {
        migrations()
            .iter()
            .filter(|entry| entry.version > from_version)
            .collect()
    }

    pub fn migrate_to_latest(&self) -> PersistenceResult<()> {
        self.apply_migration(current_schema_version())
    }

    fn with_connection<T>(
        &self,
        operation_name: &str,
        operation: impl FnOnce(&mut Connection) -> rusqlite::Result<T>,
    ) -> PersistenceResult<T> {
        let mut connection = open_connection(&self.database_path)
            .map_err(|error| storage_error(operation_name, error))?;
        operation(&mut connection).map_err(|error| storage_error(operation_name, error))
    }
}

impl MigrationStore for SqliteStore {
    fn current_version(&self) -> PersistenceResult<i64> {
        self.with_connection("current_version", |connection| {
            ensure_migrations_table(connection)?;
            read_current_version(connection)
        })
    }

    fn apply_migration(&self, target_version: i64) -> PersistenceResult<()> {
        if target_version < 0 || target_version > current_schema_version() {
            return Err(storage_error_text(
                "apply_migration",
                format!("invalid migration target version '{target_version}'"),
            ));
        }

        if target_version > 0 && migration(target_version).is_none() {
            return Err(storage_error_text(
                "apply_migration",
                format!("migration version '{target_version}' is not defined"),
            ));
        }

        self.with_connection("apply_migration", |connection| {
            ensure_migrations_table(connection)?;
            let current_version = read_current_version(connection)?;

            if target_version > current_version {
                for version in (current_version + 1)..=target_version {
                    if let Some(entry) = migration(version) {
                        apply_up_migration(connection, entry)?;
                    }
                }
            } else if target_version < current_version {
                for version in ((target_version + 1)..=current_version).rev() {
                    if let Some(entry) = migration(version) {
                        apply_down_migration(connection, entry)?;
                    }
                }
            }

            Ok(())
        })
    }
}

impl TrackedStateStore for SqliteStore {
    fn load_selection(&self) -> PersistenceResult<Option<Vec<TrackedItemSelection>>> {
        self.with_connection("load_selection", |connection| {
            ensure_schema_ready(connection)?;

            let recorded: Option<i64> = connection
                .query_row(
                    "SELECT recorded FROM tracked_selection_state WHERE id = 0",
                    [],
                    |row| row.get(0),
                )
                .optional()?;
            if recorded.unwrap_or(0) == 0 {
                return Ok(None);
            }

            let mut statement = connection.prepare(
                "SELECT item, quantity FROM tracked_selection_items ORDER BY position",
            )?;
            let items = statement
                .query_map([], |row| {
                    Ok(TrackedItemSelection {
                        item: row.get(0)?,
                        quantity: row.get(1)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(Some(items))
        })
    }

    fn save_selection(&self, selection: &[TrackedItemSelection]) -> PersistenceResult<()> {
        self.with_connection("save_selection", |connection| {
            ensure_schema_ready(connection)?;
            let transaction = connection.transaction()?;
            transaction.execute(
                "
INSERT INTO tracked_selection_state (id, recorded, recorded_at_unix)
VALUES (0, 1, strftime('%s', 'now'))
ON CONFLICT(id) DO UPDATE SET
    recorded = 1,
    recorded_at_unix = excluded.recorded_at_unix
",
                [],
            )?;
            transaction.execute("DELETE FROM tracked_selection_items", [])?;
            {
                let mut statement = transaction.prepare(
                    "INSERT INTO tracked_selection_items (item, quantity, position) VALUES (?1, ?2, ?3)",
                )?;
                for (position, item) in selection.iter().enumerate() {
                    statement.execute(params![
                        item.item.as_str(),
                        item.quantity,
                        position as i64
                    ])?;
                }
            }
            transaction.commit()?;
            Ok(())
        })
    }

    fn load_context_results(&self) -> PersistenceResult<Vec<StepResult>> {
        let rows = self.with_connection("load_context_results", |connection| {
            ensure_schema_ready(connection)?;
            let mut statement = connection.prepare(
                "SELECT step_identifier, answers_json FROM tracked_context_results ORDER BY step_identifier",
            )?;
            let rows = statement
                .query_map([], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })?;

        rows.into_iter()
            .map(|(identifier, json)| {
                let answers: Vec<AnswerRecord> = serde_json::from_str(&json).map_err(|error| {
                    storage_error_text(
                        "load_context_results",
                        format!("invalid answer payload for '{identifier}': {error}"),
                    )
                })?;
                Ok(StepResult::new(identifier, answers))
            })
            .collect()
    }

    fn save_context_result(&self, result: &StepResult) -> PersistenceResult<()> {
        let json = serde_json::to_string(&result.answers).map_err(|error| {
            storage_error_text(
                "save_context_result",
                format!("unserializable answer payload: {error}"),
            )
        })?;

        self.with_connection("save_context_result", |connection| {
            ensure_schema_ready(connection)?;
            connection.execute(
                "
INSERT INTO tracked_context_results (step_identifier, answers_json, updated_at_unix)
VALUES (?1, ?2, strftime('%s', 'now'))
ON CONFLICT(step_identifier) DO UPDATE SET
    answers_json = excluded.answers_json,
    updated_at_unix = excluded.updated_at_unix
",
                params![result.identifier.as_str(), json.as_str()],
            )?;
            Ok(())
        })
    }

    fn clear_context_results(&self) -> PersistenceResult<()> {
        self.with_connection("clear_context_results", |connection| {
            ensure_schema_ready(connection)?;
            connection.execute("DELETE FROM tracked_context_results", [])?;
            Ok(())
        })
    }

    fn reset(&self) -> PersistenceResult<()> {
        self.with_connection("reset", |connection| {
            ensure_schema_ready(connection)?;
            let transaction = connection.transaction()?;
            transaction.execute("DELETE FROM tracked_selection_items", [])?;
            transaction.execute("DELETE FROM tracked_selection_state", [])?;
            transaction.execute("DELETE FROM tracked_context_results", [])?;
            transaction.commit()?;
            Ok(())
        })
    }
}

fn open_connection(path: &Path) -> rusqlite::Result<Connection> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            let _ = fs::create_dir_all(parent);
        }
    }
    let connection = Connection::open(path)?;
    connection.pragma_update(None, "journal_mode", "WAL")?;
    connection.pragma_update(None, "foreign_keys", "ON")?;
    Ok(connection)
}

fn ensure_migrations_table(connection: &Connection) -> rusqlite::Result<()> {
    connection.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {MIGRATIONS_TABLE} (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at_unix INTEGER NOT NULL
        );"
    ))
}

fn read_current_version(connection: &Connection) -> rusqlite::Result<i64> {
    connection.query_row(
        &format!("SELECT COALESCE(MAX(version), 0) FROM {MIGRATIONS_TABLE}"),
        [],
        |row| row.get(0),
    )
}

fn ensure_schema_ready(connection: &mut Connection) -> rusqlite::Result<()> {
    ensure_migrations_table(connection)?;
    let current = read_current_version(connection)?;
    for version in (current + 1)..=current_schema_version() {
        if let Some(entry) = migration(version) {
            apply_up_migration(connection, entry)?;
        }
    }
    Ok(())
}

fn apply_up_migration(connection: &mut Connection, entry: &SqliteMigration) -> rusqlite::Result<()> {
    let transaction = connection.transaction()?;
    transaction.execute_batch(entry.up_sql)?;
    transaction.execute(
        &format!(
            "INSERT INTO {MIGRATIONS_TABLE} (version, name, applied_at_unix)
             VALUES (?1, ?2, strftime('%s', 'now'))"
        ),
        params![entry.version, entry.name],
    )?;
    transaction.commit()
}

fn apply_down_migration(
    connection: &mut Connection,
    entry: &SqliteMigration,
) -> rusqlite::Result<()> {
    let transaction = connection.transaction()?;
    transaction.execute_batch(entry.down_sql)?;
    transaction.execute(
        &format!("DELETE FROM {MIGRATIONS_TABLE} WHERE version = ?1"),
        params![entry.version],
    )?;
    transaction.commit()
}

fn storage_error(operation_name: &str, error: rusqlite::Error) -> CoreError {
    storage_error_text(operation_name, error.to_string())
}

fn storage_error_text(operation_name: &str, message: String) -> CoreError {
    CoreError {
        task: None,
        schema: None,
        kind: CoreErrorKind::StorageFailure,
        message: format!("{operation_name}: {message}"),
    }
}
