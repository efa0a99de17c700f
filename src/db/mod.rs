//! SQLite store for everything the registry does not keep
//!
//! The registry only holds identifiers, owners, hashes and the current stage.
//! The documents those hashes point at, user profiles, role applications and
//! the stage history all live here.
//!
//! ## Tables
//!
//! - `users` - Wallet profiles (created on first sign-in)
//! - `role_applications` - Requests for a registry role, reviewed by admins
//! - `conservation_samples` - Sampling documents behind conservation records
//! - `products` - Product documents behind supply-chain records
//! - `journey_events` - Append-only stage history per product
//! - `chain_snapshot` / `chain_receipts` - Persisted registry state and receipts

pub mod applications;
pub mod products;
pub mod samples;
pub mod schema;
pub mod snapshot;
pub mod users;

use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;
use serde::Serialize;
use tracing::{debug, info};

use crate::types::{GatewayError, Result};

/// SQLite database for off-chain records
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create the database file
    pub fn open(path: &Path) -> Result<Self> {
        info!("Opening SQLite database at {:?}", path);

        let conn = Connection::open(path)
            .map_err(|e| GatewayError::Database(format!("Failed to open SQLite: {}", e)))?;

        // WAL for concurrent readers while a write is in flight
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL; PRAGMA foreign_keys=ON;")
            .map_err(|e| GatewayError::Database(format!("Failed to set PRAGMA: {}", e)))?;

        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init_schema()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing and `--database-path :memory:`)
    pub fn open_in_memory() -> Result<Self> {
        debug!("Opening in-memory SQLite database");

        let conn = Connection::open_in_memory()
            .map_err(|e| GatewayError::Database(format!("Failed to open in-memory SQLite: {}", e)))?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;

        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        self.with_conn(schema::init_schema)
    }

    /// Run a read against the connection
    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| GatewayError::Internal(format!("Lock poisoned: {}", e)))?;
        f(&conn)
    }

    /// Execute a write operation with exclusive access
    pub fn with_conn_mut<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T>,
    {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| GatewayError::Internal(format!("Lock poisoned: {}", e)))?;
        f(&mut conn)
    }

    /// Row counts for the health endpoint
    pub fn stats(&self) -> Result<DbStats> {
        self.with_conn(|conn| {
            let count = |table: &str| -> Result<u64> {
                let n: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))?;
                Ok(n as u64)
            };

            Ok(DbStats {
                users: count("users")?,
                pending_applications: conn.query_row(
                    "SELECT COUNT(*) FROM role_applications WHERE status = 'pending'",
                    [],
                    |row| row.get::<_, i64>(0),
                )? as u64,
                samples: count("conservation_samples")?,
                products: count("products")?,
                journey_events: count("journey_events")?,
            })
        })
    }
}

/// Database statistics
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DbStats {
    pub users: u64,
    pub pending_applications: u64,
    pub samples: u64,
    pub products: u64,
    pub journey_events: u64,
}

/// Read a TEXT column through `FromStr` (roles, source types, statuses)
pub(crate) fn parsed_column<T>(row: &rusqlite::Row, column: &str) -> std::result::Result<T, rusqlite::Error>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(column)?;
    raw.parse::<T>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// Clamp a client-supplied page size
pub(crate) fn page_limit(limit: Option<u32>) -> u32 {
    limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
}

pub const DEFAULT_PAGE_SIZE: u32 = 50;
pub const MAX_PAGE_SIZE: u32 = 500;
