//! Database schema definitions

use rusqlite::{Connection, OptionalExtension};
use tracing::info;

use crate::types::{GatewayError, Result};

/// Current schema version for migrations
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<()> {
    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        info!("Creating new database schema v{}", SCHEMA_VERSION);
        create_tables(conn)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else if current_version < SCHEMA_VERSION {
        info!("Migrating schema from v{} to v{}", current_version, SCHEMA_VERSION);
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else if current_version > SCHEMA_VERSION {
        return Err(GatewayError::Database(format!(
            "Database schema v{} is newer than this build (v{})",
            current_version, SCHEMA_VERSION
        )));
    } else {
        info!("Database schema is up to date (v{})", current_version);
    }

    Ok(())
}

/// Get current schema version (0 if not initialized)
fn get_schema_version(conn: &Connection) -> Result<i32> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)",
        [],
    )?;

    let version: Option<i32> = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| row.get(0))
        .optional()?;

    Ok(version.unwrap_or(0))
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?)", [version])?;
    Ok(())
}

fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(ACCOUNTS_SCHEMA)
        .map_err(|e| GatewayError::Database(format!("Failed to create account tables: {}", e)))?;
    conn.execute_batch(RECORDS_SCHEMA)
        .map_err(|e| GatewayError::Database(format!("Failed to create record tables: {}", e)))?;
    conn.execute_batch(CHAIN_SCHEMA)
        .map_err(|e| GatewayError::Database(format!("Failed to create chain tables: {}", e)))?;
    conn.execute_batch(INDEXES_SCHEMA)
        .map_err(|e| GatewayError::Database(format!("Failed to create indexes: {}", e)))?;
    Ok(())
}

/// Users and role applications
const ACCOUNTS_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    address TEXT PRIMARY KEY NOT NULL,
    display_name TEXT,
    email TEXT,
    organization TEXT,
    bio TEXT,
    location TEXT,

    -- Bumped to invalidate outstanding session tokens
    token_version INTEGER NOT NULL DEFAULT 1,

    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    last_login_at TEXT
);

CREATE TABLE IF NOT EXISTS role_applications (
    id TEXT PRIMARY KEY NOT NULL,
    applicant TEXT NOT NULL,
    role TEXT NOT NULL,
    organization TEXT,
    justification TEXT,

    -- pending | approved | rejected
    status TEXT NOT NULL DEFAULT 'pending',
    reviewed_by TEXT,
    review_note TEXT,
    grant_tx_hash TEXT,

    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    reviewed_at TEXT,
    FOREIGN KEY (applicant) REFERENCES users(address)
);
"#;

/// Off-chain documents behind registry records
const RECORDS_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS conservation_samples (
    sampling_id TEXT PRIMARY KEY NOT NULL,
    researcher TEXT NOT NULL,
    species TEXT NOT NULL,
    location TEXT NOT NULL,
    sample_type TEXT NOT NULL,
    sampled_at TEXT,

    -- Free-form measurements as JSON
    measurements_json TEXT,
    notes TEXT,

    data_hash TEXT NOT NULL,
    tx_hash TEXT NOT NULL,

    -- Mirrors of the on-chain verification status
    verified INTEGER NOT NULL DEFAULT 0,
    verified_by TEXT,
    verify_tx_hash TEXT,
    verified_at TEXT,

    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS products (
    product_id TEXT PRIMARY KEY NOT NULL,
    creator TEXT NOT NULL,
    species TEXT NOT NULL,
    source_type TEXT NOT NULL,
    origin_location TEXT NOT NULL,
    vessel_or_farm TEXT,
    quantity REAL,
    unit TEXT,
    harvested_at TEXT,

    -- Mirror of the on-chain stage and hash
    current_stage TEXT NOT NULL,
    data_hash TEXT NOT NULL,
    tx_hash TEXT NOT NULL,

    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- The chain keeps only the current stage; the journey is rebuilt from here
CREATE TABLE IF NOT EXISTS journey_events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    product_id TEXT NOT NULL,
    stage TEXT NOT NULL,
    actor TEXT NOT NULL,
    location TEXT,
    notes TEXT,
    data_hash TEXT NOT NULL,
    tx_hash TEXT NOT NULL,
    block_number INTEGER NOT NULL,
    recorded_at TEXT NOT NULL DEFAULT (datetime('now')),
    FOREIGN KEY (product_id) REFERENCES products(product_id)
);
"#;

/// Persisted registry state
const CHAIN_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS chain_snapshot (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    block_number INTEGER NOT NULL,
    state_json TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS chain_receipts (
    tx_hash TEXT PRIMARY KEY NOT NULL,
    block_number INTEGER NOT NULL,
    receipt_json TEXT NOT NULL
);
"#;

const INDEXES_SCHEMA: &str = r#"
CREATE INDEX IF NOT EXISTS idx_applications_applicant ON role_applications(applicant);
CREATE INDEX IF NOT EXISTS idx_applications_status ON role_applications(status);
CREATE UNIQUE INDEX IF NOT EXISTS idx_applications_one_pending
    ON role_applications(applicant, role) WHERE status = 'pending';
CREATE INDEX IF NOT EXISTS idx_samples_researcher ON conservation_samples(researcher);
CREATE INDEX IF NOT EXISTS idx_products_creator ON products(creator);
CREATE INDEX IF NOT EXISTS idx_products_stage ON products(current_stage);
CREATE INDEX IF NOT EXISTS idx_journey_product ON journey_events(product_id, id);
CREATE INDEX IF NOT EXISTS idx_receipts_block ON chain_receipts(block_number);
"#;
