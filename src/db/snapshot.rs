//! Persisted registry state and transaction receipts

use rusqlite::{params, Connection, OptionalExtension};

use crate::types::Result;

/// The registry state as of the latest successful block
#[derive(Debug, Clone)]
pub struct ChainSnapshot {
    pub block_number: u64,
    pub state_json: String,
}

/// Store one block: its receipt, and the new registry state if the
/// transaction succeeded. Both land in a single SQLite transaction.
pub fn record_block(
    conn: &mut Connection,
    tx_hash: &str,
    block_number: u64,
    receipt_json: &str,
    state_json: Option<&str>,
) -> Result<()> {
    let tx = conn.transaction()?;

    tx.execute(
        "INSERT INTO chain_receipts (tx_hash, block_number, receipt_json) VALUES (?, ?, ?)",
        params![tx_hash, block_number as i64, receipt_json],
    )?;

    if let Some(state) = state_json {
        store_snapshot(&tx, block_number, state)?;
    }

    tx.commit()?;
    Ok(())
}

/// Overwrite the stored registry state (used directly for the genesis state)
pub fn store_snapshot(conn: &Connection, block_number: u64, state_json: &str) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO chain_snapshot (id, block_number, state_json) VALUES (1, ?1, ?2)
        ON CONFLICT(id) DO UPDATE SET
            block_number = excluded.block_number,
            state_json = excluded.state_json,
            updated_at = datetime('now')
        "#,
        params![block_number as i64, state_json],
    )?;
    Ok(())
}

pub fn load_snapshot(conn: &Connection) -> Result<Option<ChainSnapshot>> {
    let snapshot = conn
        .query_row(
            "SELECT block_number, state_json FROM chain_snapshot WHERE id = 1",
            [],
            |row| {
                let block_number: i64 = row.get(0)?;
                Ok(ChainSnapshot {
                    block_number: block_number as u64,
                    state_json: row.get(1)?,
                })
            },
        )
        .optional()?;
    Ok(snapshot)
}

/// Highest block ever produced, reverted ones included
pub fn latest_block(conn: &Connection) -> Result<u64> {
    let block: Option<i64> = conn.query_row("SELECT MAX(block_number) FROM chain_receipts", [], |row| row.get(0))?;
    Ok(block.unwrap_or(0) as u64)
}

/// Timestamp of the newest receipt, so a restarted chain never stamps a block earlier
pub fn latest_timestamp(conn: &Connection) -> Result<u64> {
    let ts: Option<i64> = conn.query_row(
        "SELECT MAX(CAST(json_extract(receipt_json, '$.timestamp') AS INTEGER)) FROM chain_receipts",
        [],
        |row| row.get(0),
    )?;
    Ok(ts.unwrap_or(0).max(0) as u64)
}

pub fn get_receipt_json(conn: &Connection, tx_hash: &str) -> Result<Option<String>> {
    let json = conn
        .query_row(
            "SELECT receipt_json FROM chain_receipts WHERE tx_hash = ?",
            params![tx_hash],
            |row| row.get(0),
        )
        .optional()?;
    Ok(json)
}

/// (total, reverted) receipt counts
pub fn receipt_counts(conn: &Connection) -> Result<(u64, u64)> {
    let (total, reverted): (i64, i64) = conn.query_row(
        r#"
        SELECT COUNT(*),
               COALESCE(SUM(CASE WHEN json_extract(receipt_json, '$.status.status') = 'reverted' THEN 1 ELSE 0 END), 0)
        FROM chain_receipts
        "#,
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    Ok((total as u64, reverted as u64))
}
