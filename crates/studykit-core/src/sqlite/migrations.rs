#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SqliteMigration {
    pub version: i64,
    pub name: &'static str,
    pub up_sql: &'static str,
    pub down_sql: &'static str,
}

const MIGRATION_0001: SqliteMigration = SqliteMigration {
    version: 1,
    name: "tracked_selection_schema",
    up_sql: r#"
CREATE TABLE IF NOT EXISTS tracked_selection_state (
    id INTEGER PRIMARY KEY CHECK (id = 0),
    recorded INTEGER NOT NULL DEFAULT 0,
    recorded_at_unix INTEGER
);

CREATE TABLE IF NOT EXISTS tracked_selection_items (
    item TEXT PRIMARY KEY,
    quantity INTEGER,
    position INTEGER NOT NULL
);
"#,
    down_sql: r#"
DROP TABLE IF EXISTS tracked_selection_items;
DROP TABLE IF EXISTS tracked_selection_state;
"#,
};

const MIGRATION_0002: SqliteMigration = SqliteMigration {
    version: 2,
    name: "add_tracked_context_cache",
    up_sql: r#"
CREATE TABLE IF NOT EXISTS tracked_context_results (
    step_identifier TEXT PRIMARY KEY,
    answers_json TEXT NOT NULL,
    updated_at_unix INTEGER NOT NULL
);
"#,
    down_sql: r#"
DROP TABLE IF EXISTS tracked_context_results;
"#,
};

const MIGRATIONS: [SqliteMigration; 2] = [MIGRATION_0001, MIGRATION_0002];

pub fn migrations() -> &'static [SqliteMigration] {
    &MIGRATIONS
}

pub fn migration(version: i64) -> Option<&'static SqliteMigration> {
    MIGRATIONS.iter().find(|entry| entry.version == version)
}

pub fn current_schema_version() -> i64 {
    MIGRATIONS.last().map(|entry| entry.version).unwrap_or(0)
}
