//! Product documents and their journey through the supply chain

use rusqlite::{params, Connection, OptionalExtension, Row};
use seatrace_registry::SourceType;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{page_limit, parsed_column};
use crate::types::{GatewayError, Result};

/// Product row from database
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRow {
    pub product_id: String,
    pub creator: String,
    pub species: String,
    pub source_type: SourceType,
    pub origin_location: String,
    pub vessel_or_farm: Option<String>,
    pub quantity: Option<f64>,
    pub unit: Option<String>,
    pub harvested_at: Option<String>,
    pub current_stage: String,
    pub data_hash: String,
    pub tx_hash: String,
    pub created_at: String,
    pub updated_at: String,
}

impl ProductRow {
    fn from_row(row: &Row) -> std::result::Result<Self, rusqlite::Error> {
        Ok(Self {
            product_id: row.get("product_id")?,
            creator: row.get("creator")?,
            species: row.get("species")?,
            source_type: parsed_column(row, "source_type")?,
            origin_location: row.get("origin_location")?,
            vessel_or_farm: row.get("vessel_or_farm")?,
            quantity: row.get("quantity")?,
            unit: row.get("unit")?,
            harvested_at: row.get("harvested_at")?,
            current_stage: row.get("current_stage")?,
            data_hash: row.get("data_hash")?,
            tx_hash: row.get("tx_hash")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    /// The document as it was hashed at registration
    pub fn document(&self) -> ProductDocument {
        ProductDocument {
            product_id: self.product_id.clone(),
            species: self.species.clone(),
            source_type: self.source_type,
            origin_location: self.origin_location.clone(),
            vessel_or_farm: self.vessel_or_farm.clone(),
            quantity: self.quantity,
            unit: self.unit.clone(),
            harvested_at: self.harvested_at.clone(),
        }
    }
}

/// Off-chain product document registered by a fisher or farmer.
///
/// Its canonical JSON is what the data hash covers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDocument {
    pub product_id: String,
    pub species: String,
    pub source_type: SourceType,
    pub origin_location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vessel_or_farm: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub harvested_at: Option<String>,
}

/// One stage transition in a product's history
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JourneyEvent {
    pub id: i64,
    pub product_id: String,
    pub stage: String,
    pub actor: String,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub data_hash: String,
    pub tx_hash: String,
    pub block_number: u64,
    pub recorded_at: String,
}

impl JourneyEvent {
    fn from_row(row: &Row) -> std::result::Result<Self, rusqlite::Error> {
        let block_number: i64 = row.get("block_number")?;
        Ok(Self {
            id: row.get("id")?,
            product_id: row.get("product_id")?,
            stage: row.get("stage")?,
            actor: row.get("actor")?,
            location: row.get("location")?,
            notes: row.get("notes")?,
            data_hash: row.get("data_hash")?,
            tx_hash: row.get("tx_hash")?,
            block_number: block_number as u64,
            recorded_at: row.get("recorded_at")?,
        })
    }
}

/// A journey event about to be written
#[derive(Debug, Clone)]
pub struct NewJourneyEvent<'a> {
    pub stage: &'a str,
    pub actor: &'a str,
    pub location: Option<&'a str>,
    pub notes: Option<&'a str>,
    pub data_hash: &'a str,
    pub tx_hash: &'a str,
    pub block_number: u64,
}

/// Filter for listing products
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductQuery {
    #[serde(default)]
    pub creator: Option<String>,
    #[serde(default)]
    pub stage: Option<String>,
    #[serde(default)]
    pub source_type: Option<SourceType>,
    #[serde(default)]
    pub species: Option<String>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub offset: Option<u32>,
}

/// Insert the product and its first journey event in one transaction
pub fn insert_product(
    conn: &mut Connection,
    doc: &ProductDocument,
    creator: &str,
    first: NewJourneyEvent<'_>,
) -> Result<ProductRow> {
    let tx = conn.transaction()?;

    tx.execute(
        r#"
        INSERT INTO products (
            product_id, creator, species, source_type, origin_location,
            vessel_or_farm, quantity, unit, harvested_at,
            current_stage, data_hash, tx_hash
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        params![
            doc.product_id,
            creator,
            doc.species,
            doc.source_type.as_str(),
            doc.origin_location,
            doc.vessel_or_farm,
            doc.quantity,
            doc.unit,
            doc.harvested_at,
            first.stage,
            first.data_hash,
            first.tx_hash,
        ],
    )?;
    insert_event(&tx, &doc.product_id, &first)?;

    tx.commit()?;

    get_product(conn, &doc.product_id)?
        .ok_or_else(|| GatewayError::Internal("Product not found after insert".to_string()))
}

/// Record a stage change: append the event and move the product's mirror fields
pub fn append_journey_event(
    conn: &mut Connection,
    product_id: &str,
    event: NewJourneyEvent<'_>,
) -> Result<JourneyEvent> {
    let tx = conn.transaction()?;

    let changed = tx.execute(
        r#"
        UPDATE products SET
            current_stage = ?2,
            data_hash = ?3,
            updated_at = datetime('now')
        WHERE product_id = ?1
        "#,
        params![product_id, event.stage, event.data_hash],
    )?;
    if changed == 0 {
        return Err(GatewayError::NotFound(format!("Product {}", product_id)));
    }
    let id = insert_event(&tx, product_id, &event)?;

    tx.commit()?;
    debug!(product_id, stage = event.stage, "Journey event recorded");

    conn.query_row(
        "SELECT * FROM journey_events WHERE id = ?",
        params![id],
        |row| JourneyEvent::from_row(row),
    )
    .map_err(GatewayError::from)
}

fn insert_event(conn: &Connection, product_id: &str, event: &NewJourneyEvent<'_>) -> Result<i64> {
    conn.execute(
        r#"
        INSERT INTO journey_events (
            product_id, stage, actor, location, notes, data_hash, tx_hash, block_number
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        params![
            product_id,
            event.stage,
            event.actor,
            event.location,
            event.notes,
            event.data_hash,
            event.tx_hash,
            event.block_number as i64,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_product(conn: &Connection, product_id: &str) -> Result<Option<ProductRow>> {
    let row = conn
        .query_row(
            "SELECT * FROM products WHERE product_id = ?",
            params![product_id],
            |row| ProductRow::from_row(row),
        )
        .optional()?;
    Ok(row)
}

/// List products, most recently updated first
pub fn list_products(conn: &Connection, query: &ProductQuery) -> Result<Vec<ProductRow>> {
    let source_type = query.source_type.map(|s| s.as_str());
    let mut stmt = conn.prepare(
        r#"
        SELECT * FROM products
        WHERE (?1 IS NULL OR creator = ?1)
          AND (?2 IS NULL OR current_stage = ?2 COLLATE NOCASE)
          AND (?3 IS NULL OR source_type = ?3)
          AND (?4 IS NULL OR species = ?4 COLLATE NOCASE)
        ORDER BY updated_at DESC, rowid DESC
        LIMIT ?5 OFFSET ?6
        "#,
    )?;
    let rows = stmt
        .query_map(
            params![
                query.creator,
                query.stage,
                source_type,
                query.species,
                page_limit(query.limit),
                query.offset.unwrap_or(0)
            ],
            |row| ProductRow::from_row(row),
        )?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Full stage history in the order it happened
pub fn journey(conn: &Connection, product_id: &str) -> Result<Vec<JourneyEvent>> {
    let mut stmt = conn.prepare("SELECT * FROM journey_events WHERE product_id = ? ORDER BY id ASC")?;
    let rows = stmt
        .query_map(params![product_id], |row| JourneyEvent::from_row(row))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema::init_schema;

    const FISHER: &str = "0x4444444444444444444444444444444444444444444444444444444444444444";
    const PROCESSOR: &str = "0x5555555555555555555555555555555555555555555555555555555555555555";

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    fn doc(id: &str) -> ProductDocument {
        ProductDocument {
            product_id: id.into(),
            species: "Thunnus albacares".into(),
            source_type: SourceType::WildCaught,
            origin_location: "FAO 71".into(),
            vessel_or_farm: Some("FV Marlin".into()),
            quantity: Some(120.0),
            unit: Some("kg".into()),
            harvested_at: None,
        }
    }

    fn event<'a>(stage: &'a str, actor: &'a str, hash: &'a str, tx: &'a str, block: u64) -> NewJourneyEvent<'a> {
        NewJourneyEvent {
            stage,
            actor,
            location: None,
            notes: None,
            data_hash: hash,
            tx_hash: tx,
            block_number: block,
        }
    }

    #[test]
    fn test_insert_creates_first_event() {
        let mut conn = conn();
        let row = insert_product(&mut conn, &doc("TUNA-1"), FISHER, event("caught", FISHER, "h1", "t1", 1)).unwrap();
        assert_eq!(row.current_stage, "caught");
        assert_eq!(row.source_type, SourceType::WildCaught);

        let history = journey(&conn, "TUNA-1").unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].actor, FISHER);
    }

    #[test]
    fn test_journey_is_ordered_and_mirrors_stage() {
        let mut conn = conn();
        insert_product(&mut conn, &doc("TUNA-1"), FISHER, event("caught", FISHER, "h1", "t1", 1)).unwrap();
        append_journey_event(&mut conn, "TUNA-1", event("processing", PROCESSOR, "h1", "t2", 2)).unwrap();
        let last = append_journey_event(
            &mut conn,
            "TUNA-1",
            NewJourneyEvent {
                location: Some("Port Louis"),
                notes: Some("filleted"),
                ..event("processed", PROCESSOR, "h2", "t3", 3)
            },
        )
        .unwrap();
        assert_eq!(last.notes.as_deref(), Some("filleted"));

        let stages: Vec<_> = journey(&conn, "TUNA-1").unwrap().into_iter().map(|e| e.stage).collect();
        assert_eq!(stages, vec!["caught", "processing", "processed"]);

        let product = get_product(&conn, "TUNA-1").unwrap().unwrap();
        assert_eq!(product.current_stage, "processed");
        assert_eq!(product.data_hash, "h2");
        assert_eq!(product.creator, FISHER);
    }

    #[test]
    fn test_append_to_missing_product() {
        let mut conn = conn();
        assert!(matches!(
            append_journey_event(&mut conn, "NOPE", event("x", PROCESSOR, "h", "t", 1)),
            Err(GatewayError::NotFound(_))
        ));
        assert!(journey(&conn, "NOPE").unwrap().is_empty());
    }

    #[test]
    fn test_list_filters() {
        let mut conn = conn();
        insert_product(&mut conn, &doc("A"), FISHER, event("caught", FISHER, "h", "t1", 1)).unwrap();
        let mut farmed = doc("B");
        farmed.source_type = SourceType::Aquaculture;
        insert_product(&mut conn, &farmed, FISHER, event("harvested", FISHER, "h", "t2", 2)).unwrap();

        let wild = list_products(
            &conn,
            &ProductQuery {
                source_type: Some(SourceType::WildCaught),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(wild.len(), 1);
        assert_eq!(wild[0].product_id, "A");

        let harvested = list_products(
            &conn,
            &ProductQuery {
                stage: Some("HARVESTED".into()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(harvested.len(), 1);
        assert_eq!(list_products(&conn, &ProductQuery::default()).unwrap().len(), 2);
    }
}
