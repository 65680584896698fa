//! DDL statements and migrations for the SQLite schema.
//!
//! Timestamps are stored as TEXT in ISO 8601 format (SQLite has no
//! native datetime type). Booleans are stored as INTEGER (0/1). The
//! `allowed_values` list is a JSON blob. Dynamic `index_<md5>` tables
//! are created at runtime by the index-table manager and are not listed
//! here.

/// Current schema version. Bumped whenever DDL or migrations change.
pub const CURRENT_SCHEMA_VERSION: i32 = 1;

/// Core DDL statements executed during `init_schema`.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    // -- Collections ---------------------------------------------------------
    r#"
    CREATE TABLE IF NOT EXISTS collections (
        id                      TEXT PRIMARY KEY,
        name                    TEXT NOT NULL UNIQUE,
        description             TEXT,
        documents_directory     TEXT NOT NULL,
        schema_enforcement_mode TEXT NOT NULL DEFAULT 'None',
        indexing_mode           TEXT NOT NULL DEFAULT 'All',
        created_utc             TEXT NOT NULL,
        last_update_utc         TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_collections_name ON collections(name)",
    // -- Schemas -------------------------------------------------------------
    r#"
    CREATE TABLE IF NOT EXISTS schemas (
        id              TEXT PRIMARY KEY,
        name            TEXT,
        hash            TEXT NOT NULL UNIQUE,
        created_utc     TEXT NOT NULL,
        last_update_utc TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS schemaelements (
        id              TEXT PRIMARY KEY,
        schema_id       TEXT NOT NULL,
        position        INTEGER NOT NULL,
        key             TEXT NOT NULL,
        data_type       TEXT NOT NULL,
        nullable        INTEGER NOT NULL DEFAULT 0,
        created_utc     TEXT NOT NULL,
        last_update_utc TEXT NOT NULL,
        FOREIGN KEY (schema_id) REFERENCES schemas(id) ON DELETE CASCADE
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_schemaelements_schema ON schemaelements(schema_id)",
    // -- Documents -----------------------------------------------------------
    r#"
    CREATE TABLE IF NOT EXISTS documents (
        id              TEXT PRIMARY KEY,
        collection_id   TEXT NOT NULL,
        schema_id       TEXT NOT NULL,
        name            TEXT,
        content_length  INTEGER NOT NULL DEFAULT 0,
        sha256_hash     TEXT NOT NULL DEFAULT '',
        created_utc     TEXT NOT NULL,
        last_update_utc TEXT NOT NULL,
        FOREIGN KEY (collection_id) REFERENCES collections(id)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection_id)",
    "CREATE INDEX IF NOT EXISTS idx_documents_name ON documents(collection_id, name)",
    "CREATE INDEX IF NOT EXISTS idx_documents_created ON documents(created_utc)",
    // -- Labels (exactly one owner) ------------------------------------------
    r#"
    CREATE TABLE IF NOT EXISTS labels (
        id            TEXT PRIMARY KEY,
        collection_id TEXT,
        document_id   TEXT,
        label         TEXT NOT NULL,
        created_utc   TEXT NOT NULL,
        CHECK ((collection_id IS NULL) != (document_id IS NULL)),
        FOREIGN KEY (collection_id) REFERENCES collections(id) ON DELETE CASCADE,
        FOREIGN KEY (document_id) REFERENCES documents(id) ON DELETE CASCADE
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_labels_document ON labels(document_id)",
    "CREATE INDEX IF NOT EXISTS idx_labels_label ON labels(label)",
    // -- Tags (exactly one owner) --------------------------------------------
    r#"
    CREATE TABLE IF NOT EXISTS tags (
        id            TEXT PRIMARY KEY,
        collection_id TEXT,
        document_id   TEXT,
        key           TEXT NOT NULL,
        value         TEXT NOT NULL,
        created_utc   TEXT NOT NULL,
        CHECK ((collection_id IS NULL) != (document_id IS NULL)),
        FOREIGN KEY (collection_id) REFERENCES collections(id) ON DELETE CASCADE,
        FOREIGN KEY (document_id) REFERENCES documents(id) ON DELETE CASCADE
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_tags_document ON tags(document_id)",
    "CREATE INDEX IF NOT EXISTS idx_tags_key_value ON tags(key, value)",
    // -- Index table mappings (key <-> table bijection) ----------------------
    r#"
    CREATE TABLE IF NOT EXISTS indextablemappings (
        id          TEXT PRIMARY KEY,
        key         TEXT NOT NULL UNIQUE,
        table_name  TEXT NOT NULL UNIQUE,
        created_utc TEXT NOT NULL
    )
    "#,
    // -- Field constraints ---------------------------------------------------
    r#"
    CREATE TABLE IF NOT EXISTS fieldconstraints (
        id                 TEXT PRIMARY KEY,
        collection_id      TEXT NOT NULL,
        field_path         TEXT NOT NULL,
        data_type          TEXT,
        required           INTEGER NOT NULL DEFAULT 0,
        nullable           INTEGER NOT NULL DEFAULT 1,
        regex_pattern      TEXT,
        min_value          REAL,
        max_value          REAL,
        min_length         INTEGER,
        max_length         INTEGER,
        allowed_values     TEXT,
        array_element_type TEXT,
        created_utc        TEXT NOT NULL,
        last_update_utc    TEXT NOT NULL,
        UNIQUE (collection_id, field_path),
        FOREIGN KEY (collection_id) REFERENCES collections(id) ON DELETE CASCADE
    )
    "#,
    // -- Indexed fields ------------------------------------------------------
    r#"
    CREATE TABLE IF NOT EXISTS indexedfields (
        id              TEXT PRIMARY KEY,
        collection_id   TEXT NOT NULL,
        field_path      TEXT NOT NULL,
        created_utc     TEXT NOT NULL,
        last_update_utc TEXT NOT NULL,
        UNIQUE (collection_id, field_path),
        FOREIGN KEY (collection_id) REFERENCES collections(id) ON DELETE CASCADE
    )
    "#,
    // -- Object locks --------------------------------------------------------
    r#"
    CREATE TABLE IF NOT EXISTS objectlocks (
        id            TEXT PRIMARY KEY,
        collection_id TEXT NOT NULL,
        document_name TEXT NOT NULL,
        hostname      TEXT NOT NULL,
        created_utc   TEXT NOT NULL,
        UNIQUE (collection_id, document_name)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_objectlocks_created ON objectlocks(created_utc)",
    // -- Metadata (migration tracking) ---------------------------------------
    r#"
    CREATE TABLE IF NOT EXISTS metadata (
        key   TEXT PRIMARY KEY,
        value TEXT NOT NULL
    )
    "#,
];

/// Forward column migrations applied after the base DDL.
///
/// Each entry is `(name, table, column, sql)`. SQLite has no
/// `ADD COLUMN IF NOT EXISTS`, so the column's presence is checked via
/// `pragma table_info` before the ALTER runs, and applied migrations are
/// tracked in the `metadata` table under `migration:<name>`. Databases
/// created by older builds pick up the columns here; fresh databases
/// already have them and only record the marker.
pub const COLUMN_MIGRATIONS: &[(&str, &str, &str, &str)] = &[
    (
        "documents_content_length",
        "documents",
        "content_length",
        "ALTER TABLE documents ADD COLUMN content_length INTEGER NOT NULL DEFAULT 0",
    ),
    (
        "documents_sha256_hash",
        "documents",
        "sha256_hash",
        "ALTER TABLE documents ADD COLUMN sha256_hash TEXT NOT NULL DEFAULT ''",
    ),
    (
        "collections_schema_enforcement_mode",
        "collections",
        "schema_enforcement_mode",
        "ALTER TABLE collections ADD COLUMN schema_enforcement_mode TEXT NOT NULL DEFAULT 'None'",
    ),
    (
        "collections_indexing_mode",
        "collections",
        "indexing_mode",
        "ALTER TABLE collections ADD COLUMN indexing_mode TEXT NOT NULL DEFAULT 'All'",
    ),
];
