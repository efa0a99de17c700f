//! Conservation sampling documents

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use super::page_limit;
use crate::types::{GatewayError, Result};

/// Sample row from database
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleRow {
    pub sampling_id: String,
    pub researcher: String,
    pub species: String,
    pub location: String,
    pub sample_type: String,
    pub sampled_at: Option<String>,
    pub measurements: Option<serde_json::Value>,
    pub notes: Option<String>,
    pub data_hash: String,
    pub tx_hash: String,
    pub verified: bool,
    pub verified_by: Option<String>,
    pub verify_tx_hash: Option<String>,
    pub verified_at: Option<String>,
    pub created_at: String,
}

impl SampleRow {
    fn from_row(row: &Row) -> std::result::Result<Self, rusqlite::Error> {
        let measurements_json: Option<String> = row.get("measurements_json")?;
        let measurements = measurements_json
            .map(|s| serde_json::from_str(&s))
            .transpose()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e)))?;
        Ok(Self {
            sampling_id: row.get("sampling_id")?,
            researcher: row.get("researcher")?,
            species: row.get("species")?,
            location: row.get("location")?,
            sample_type: row.get("sample_type")?,
            sampled_at: row.get("sampled_at")?,
            measurements,
            notes: row.get("notes")?,
            data_hash: row.get("data_hash")?,
            tx_hash: row.get("tx_hash")?,
            verified: row.get("verified")?,
            verified_by: row.get("verified_by")?,
            verify_tx_hash: row.get("verify_tx_hash")?,
            verified_at: row.get("verified_at")?,
            created_at: row.get("created_at")?,
        })
    }

    /// The document as it was hashed at submission
    pub fn document(&self) -> SampleDocument {
        SampleDocument {
            sampling_id: self.sampling_id.clone(),
            species: self.species.clone(),
            location: self.location.clone(),
            sample_type: self.sample_type.clone(),
            sampled_at: self.sampled_at.clone(),
            measurements: self.measurements.clone(),
            notes: self.notes.clone(),
        }
    }
}

/// Off-chain sampling document as submitted by a researcher.
///
/// Its canonical JSON is what the data hash covers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleDocument {
    pub sampling_id: String,
    pub species: String,
    pub location: String,
    pub sample_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sampled_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub measurements: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Filter for listing samples
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleQuery {
    #[serde(default)]
    pub researcher: Option<String>,
    #[serde(default)]
    pub species: Option<String>,
    #[serde(default)]
    pub verified: Option<bool>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub offset: Option<u32>,
}

pub fn insert_sample(
    conn: &Connection,
    doc: &SampleDocument,
    researcher: &str,
    data_hash: &str,
    tx_hash: &str,
) -> Result<SampleRow> {
    let measurements = doc
        .measurements
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    conn.execute(
        r#"
        INSERT INTO conservation_samples (
            sampling_id, researcher, species, location, sample_type,
            sampled_at, measurements_json, notes, data_hash, tx_hash
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        params![
            doc.sampling_id,
            researcher,
            doc.species,
            doc.location,
            doc.sample_type,
            doc.sampled_at,
            measurements,
            doc.notes,
            data_hash,
            tx_hash,
        ],
    )?;

    get_sample(conn, &doc.sampling_id)?
        .ok_or_else(|| GatewayError::Internal("Sample not found after insert".to_string()))
}

pub fn get_sample(conn: &Connection, sampling_id: &str) -> Result<Option<SampleRow>> {
    let row = conn
        .query_row(
            "SELECT * FROM conservation_samples WHERE sampling_id = ?",
            params![sampling_id],
            |row| SampleRow::from_row(row),
        )
        .optional()?;
    Ok(row)
}

/// List samples, newest first
pub fn list_samples(conn: &Connection, query: &SampleQuery) -> Result<Vec<SampleRow>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT * FROM conservation_samples
        WHERE (?1 IS NULL OR researcher = ?1)
          AND (?2 IS NULL OR species = ?2 COLLATE NOCASE)
          AND (?3 IS NULL OR verified = ?3)
        ORDER BY created_at DESC, rowid DESC
        LIMIT ?4 OFFSET ?5
        "#,
    )?;
    let rows = stmt
        .query_map(
            params![
                query.researcher,
                query.species,
                query.verified,
                page_limit(query.limit),
                query.offset.unwrap_or(0)
            ],
            |row| SampleRow::from_row(row),
        )?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Mirror an on-chain verification onto the stored sample
pub fn mark_verified(conn: &Connection, sampling_id: &str, verifier: &str, tx_hash: &str) -> Result<SampleRow> {
    conn.execute(
        r#"
        UPDATE conservation_samples SET
            verified = 1,
            verified_by = ?2,
            verify_tx_hash = ?3,
            verified_at = datetime('now')
        WHERE sampling_id = ?1
        "#,
        params![sampling_id, verifier, tx_hash],
    )?;
    get_sample(conn, sampling_id)?
        .ok_or_else(|| GatewayError::NotFound(format!("Sample {}", sampling_id)))
}
