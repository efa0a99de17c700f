//! Record workflows spanning the registry and the database
//!
//! Writes go: validate the document, submit the registry transaction, then
//! store the document with the transaction hash. A reverted transaction
//! returns before anything is written off-chain.

use std::sync::Arc;

use seatrace_registry::{
    validation, Address, CallOutcome, ConservationRecord, RegistryCall, RegistryError, SupplyChainRecord,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use super::content_hash;
use crate::chain::{ChainClient, Submitted, TxReceipt};
use crate::db::products::{self, JourneyEvent, NewJourneyEvent, ProductDocument, ProductQuery, ProductRow};
use crate::db::samples::{self, SampleDocument, SampleQuery, SampleRow};
use crate::db::Database;
use crate::types::{GatewayError, Result};

/// Longest accepted free-text document field
pub const MAX_TEXT_LEN: usize = 1000;

// =============================================================================
// Inputs
// =============================================================================

/// Body of `POST /conservation`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSampleInput {
    #[serde(flatten)]
    pub document: SampleDocument,
    /// Hash the client already computed (e.g. an IPFS CID); derived if absent
    #[serde(default)]
    pub data_hash: Option<String>,
}

/// Body of `POST /products`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductInput {
    #[serde(flatten)]
    pub document: ProductDocument,
    pub initial_stage: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub data_hash: Option<String>,
}

/// Body of `POST /products/{id}/stage`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStageInput {
    pub stage: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    /// Hash of a revised product document, if the stage changed it
    #[serde(default)]
    pub data_hash: Option<String>,
}

// =============================================================================
// Views
// =============================================================================

/// How the stored document lines up with the chain
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Integrity {
    /// A registry record exists for this id
    pub anchored: bool,
    /// The stored hash equals the on-chain hash
    pub hash_matches: bool,
    /// Re-hashing the stored document reproduces its recorded hash.
    /// Absent when the hash was supplied by the client.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_matches: Option<bool>,
}

impl Integrity {
    pub fn is_intact(&self) -> bool {
        self.anchored && self.hash_matches && self.document_matches != Some(false)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleCreated {
    pub sample: SampleRow,
    pub record: ConservationRecord,
    pub receipt: TxReceipt,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConservationView {
    pub sampling_id: String,
    pub sample: Option<SampleRow>,
    pub on_chain: Option<ConservationRecord>,
    pub integrity: Integrity,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductCreated {
    pub product: ProductRow,
    pub record: SupplyChainRecord,
    pub receipt: TxReceipt,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageUpdated {
    pub event: JourneyEvent,
    pub record: SupplyChainRecord,
    pub receipt: TxReceipt,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductView {
    pub product_id: String,
    pub product: Option<ProductRow>,
    pub on_chain: Option<SupplyChainRecord>,
    pub integrity: Integrity,
}

/// Consumer-facing traceability view
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceView {
    pub product_id: String,
    pub product: Option<ProductRow>,
    pub on_chain: Option<SupplyChainRecord>,
    pub journey: Vec<JourneyEvent>,
    pub integrity: Integrity,
    /// Every check passed
    pub verified: bool,
}

// =============================================================================
// Service
// =============================================================================

pub struct RecordService {
    db: Arc<Database>,
    chain: Arc<dyn ChainClient>,
}

impl RecordService {
    pub fn new(db: Arc<Database>, chain: Arc<dyn ChainClient>) -> Self {
        Self { db, chain }
    }

    // -------------------------------------------------------------------------
    // Conservation
    // -------------------------------------------------------------------------

    pub async fn create_sample(&self, caller: &Address, input: CreateSampleInput) -> Result<SampleCreated> {
        let mut doc = input.document;
        doc.sampling_id = validation::identifier("samplingId", &doc.sampling_id).map_err(invalid)?;
        doc.species = text("species", &doc.species)?;
        doc.location = text("location", &doc.location)?;
        doc.sample_type = text("sampleType", &doc.sample_type)?;
        optional_text("sampledAt", doc.sampled_at.as_deref())?;
        optional_text("notes", doc.notes.as_deref())?;

        let data_hash = resolve_hash(input.data_hash, &doc)?;

        let Submitted { receipt, outcome } = self
            .chain
            .submit(
                caller,
                RegistryCall::CreateConservationRecord {
                    sampling_id: doc.sampling_id.clone(),
                    data_hash,
                },
            )
            .await?;
        let record = expect_conservation(outcome)?;

        let sample = self
            .db
            .with_conn(|conn| samples::insert_sample(conn, &doc, caller.as_str(), &record.data_hash, &receipt.tx_hash))
            .map_err(|e| orphaned(&receipt, e))?;

        info!(sampling_id = %record.sampling_id, researcher = %caller, tx = %receipt.tx_hash, "Conservation sample recorded");
        Ok(SampleCreated { sample, record, receipt })
    }

    pub async fn verify_sample(&self, caller: &Address, sampling_id: &str) -> Result<SampleCreated> {
        let Submitted { receipt, outcome } = self
            .chain
            .submit(
                caller,
                RegistryCall::VerifyConservationRecord {
                    sampling_id: sampling_id.to_string(),
                },
            )
            .await?;
        let record = expect_conservation(outcome)?;

        let sample = self
            .db
            .with_conn(|conn| {
                samples::mark_verified(conn, &record.sampling_id, caller.as_str(), &receipt.tx_hash)
            })
            .map_err(|e| orphaned(&receipt, e))?;

        info!(sampling_id = %record.sampling_id, verifier = %caller, tx = %receipt.tx_hash, "Conservation sample verified");
        Ok(SampleCreated { sample, record, receipt })
    }

    pub async fn conservation_view(&self, sampling_id: &str) -> Result<ConservationView> {
        let sampling_id = sampling_id.trim();
        let sample = self.db.with_conn(|conn| samples::get_sample(conn, sampling_id))?;
        let on_chain = self.chain.conservation_record(sampling_id).await;

        if sample.is_none() && on_chain.is_none() {
            return Err(GatewayError::NotFound(format!("Conservation sample {}", sampling_id)));
        }

        let integrity = match &sample {
            Some(s) => Integrity {
                anchored: on_chain.is_some(),
                hash_matches: on_chain.as_ref().is_some_and(|r| r.data_hash == s.data_hash),
                document_matches: content_hash::document_matches(&s.document(), &s.data_hash)?,
            },
            None => Integrity {
                anchored: true,
                hash_matches: false,
                document_matches: None,
            },
        };

        Ok(ConservationView {
            sampling_id: sampling_id.to_string(),
            sample,
            on_chain,
            integrity,
        })
    }

    pub fn list_samples(&self, query: &SampleQuery) -> Result<Vec<SampleRow>> {
        self.db.with_conn(|conn| samples::list_samples(conn, query))
    }

    // -------------------------------------------------------------------------
    // Supply chain
    // -------------------------------------------------------------------------

    pub async fn create_product(&self, caller: &Address, input: CreateProductInput) -> Result<ProductCreated> {
        let mut doc = input.document;
        doc.product_id = validation::identifier("productId", &doc.product_id).map_err(invalid)?;
        doc.species = text("species", &doc.species)?;
        doc.origin_location = text("originLocation", &doc.origin_location)?;
        optional_text("vesselOrFarm", doc.vessel_or_farm.as_deref())?;
        optional_text("unit", doc.unit.as_deref())?;
        optional_text("harvestedAt", doc.harvested_at.as_deref())?;
        doc.quantity = doc.quantity.map(stored_quantity).transpose()?;
        let initial_stage = validation::stage(&input.initial_stage).map_err(invalid)?;
        optional_text("location", input.location.as_deref())?;
        optional_text("notes", input.notes.as_deref())?;

        let data_hash = resolve_hash(input.data_hash, &doc)?;

        let Submitted { receipt, outcome } = self
            .chain
            .submit(
                caller,
                RegistryCall::CreateSupplyChainRecord {
                    product_id: doc.product_id.clone(),
                    data_hash,
                    source_type: doc.source_type,
                    initial_stage,
                },
            )
            .await?;
        let record = expect_supply_chain(outcome)?;

        let product = self
            .db
            .with_conn_mut(|conn| {
                products::insert_product(
                    conn,
                    &doc,
                    caller.as_str(),
                    NewJourneyEvent {
                        stage: &record.current_stage,
                        actor: caller.as_str(),
                        location: input.location.as_deref(),
                        notes: input.notes.as_deref(),
                        data_hash: &record.data_hash,
                        tx_hash: &receipt.tx_hash,
                        block_number: receipt.block_number,
                    },
                )
            })
            .map_err(|e| orphaned(&receipt, e))?;

        info!(product_id = %record.product_id, creator = %caller, stage = %record.current_stage, tx = %receipt.tx_hash, "Product registered");
        Ok(ProductCreated { product, record, receipt })
    }

    pub async fn update_stage(&self, caller: &Address, product_id: &str, input: UpdateStageInput) -> Result<StageUpdated> {
        let product_id = validation::identifier("productId", product_id).map_err(invalid)?;
        let new_stage = validation::stage(&input.stage).map_err(invalid)?;
        let new_data_hash = input
            .data_hash
            .filter(|h| !h.trim().is_empty())
            .map(|h| validation::data_hash(&h).map_err(invalid))
            .transpose()?;
        optional_text("location", input.location.as_deref())?;
        optional_text("notes", input.notes.as_deref())?;

        let Submitted { receipt, outcome } = self
            .chain
            .submit(
                caller,
                RegistryCall::UpdateSupplyChainRecord {
                    product_id,
                    new_stage,
                    new_data_hash,
                    notes: input.notes.clone(),
                },
            )
            .await?;
        let record = expect_supply_chain(outcome)?;

        let event = self
            .db
            .with_conn_mut(|conn| {
                products::append_journey_event(
                    conn,
                    &record.product_id,
                    NewJourneyEvent {
                        stage: &record.current_stage,
                        actor: caller.as_str(),
                        location: input.location.as_deref(),
                        notes: input.notes.as_deref(),
                        data_hash: &record.data_hash,
                        tx_hash: &receipt.tx_hash,
                        block_number: receipt.block_number,
                    },
                )
            })
            .map_err(|e| orphaned(&receipt, e))?;

        info!(product_id = %record.product_id, stage = %record.current_stage, actor = %caller, tx = %receipt.tx_hash, "Product stage updated");
        Ok(StageUpdated { event, record, receipt })
    }

    pub async fn product_view(&self, product_id: &str) -> Result<ProductView> {
        let product_id = product_id.trim();
        let (product, on_chain, integrity) = self.product_parts(product_id).await?;
        Ok(ProductView {
            product_id: product_id.to_string(),
            product,
            on_chain,
            integrity,
        })
    }

    pub async fn journey(&self, product_id: &str) -> Result<Vec<JourneyEvent>> {
        let product_id = product_id.trim();
        let events = self.db.with_conn(|conn| products::journey(conn, product_id))?;
        if events.is_empty() && self.chain.supply_chain_record(product_id).await.is_none() {
            return Err(GatewayError::NotFound(format!("Product {}", product_id)));
        }
        Ok(events)
    }

    pub async fn trace(&self, product_id: &str) -> Result<TraceView> {
        let product_id = product_id.trim();
        let (product, on_chain, integrity) = self.product_parts(product_id).await?;
        let journey = self.db.with_conn(|conn| products::journey(conn, product_id))?;

        // The last journey entry must agree with the chain's current stage
        let stage_matches = match (journey.last(), &on_chain) {
            (Some(last), Some(record)) => last.stage == record.current_stage,
            _ => false,
        };
        let verified = integrity.is_intact() && stage_matches;
        if !verified {
            warn!(product_id, "Trace integrity check failed");
        }

        Ok(TraceView {
            product_id: product_id.to_string(),
            product,
            on_chain,
            journey,
            integrity,
            verified,
        })
    }

    pub fn list_products(&self, query: &ProductQuery) -> Result<Vec<ProductRow>> {
        self.db.with_conn(|conn| products::list_products(conn, query))
    }

    async fn product_parts(
        &self,
        product_id: &str,
    ) -> Result<(Option<ProductRow>, Option<SupplyChainRecord>, Integrity)> {
        let product = self.db.with_conn(|conn| products::get_product(conn, product_id))?;
        let on_chain = self.chain.supply_chain_record(product_id).await;

        if product.is_none() && on_chain.is_none() {
            return Err(GatewayError::NotFound(format!("Product {}", product_id)));
        }

        let integrity = match &product {
            Some(p) => {
                // The registered document is covered by the hash of the first event
                let first_hash = self
                    .db
                    .with_conn(|conn| products::journey(conn, product_id))?
                    .into_iter()
                    .next()
                    .map(|e| e.data_hash)
                    .unwrap_or_else(|| p.data_hash.clone());
                Integrity {
                    anchored: on_chain.is_some(),
                    hash_matches: on_chain.as_ref().is_some_and(|r| r.data_hash == p.data_hash),
                    document_matches: content_hash::document_matches(&p.document(), &first_hash)?,
                }
            }
            None => Integrity {
                anchored: true,
                hash_matches: false,
                document_matches: None,
            },
        };

        Ok((product, on_chain, integrity))
    }
}

fn text(field: &'static str, value: &str) -> Result<String> {
    validation::required(field, value, MAX_TEXT_LEN).map_err(invalid)
}

/// Input rejected before it reaches the registry
fn invalid(err: RegistryError) -> GatewayError {
    GatewayError::BadRequest(err.to_string())
}

fn optional_text(field: &'static str, value: Option<&str>) -> Result<()> {
    if value.is_some_and(|v| v.chars().count() > MAX_TEXT_LEN) {
        return Err(GatewayError::BadRequest(format!(
            "{} must be at most {} characters",
            field, MAX_TEXT_LEN
        )));
    }
    Ok(())
}

/// The quantity exactly as SQLite will hand it back. A REAL column loses the
/// sign of zero, so `-0.0` is stored and hashed as `0.0`.
fn stored_quantity(q: f64) -> Result<f64> {
    if !q.is_finite() || q < 0.0 {
        return Err(GatewayError::BadRequest("quantity must be a non-negative number".into()));
    }
    Ok(if q == 0.0 { 0.0 } else { q })
}

/// Client-supplied hash if present and non-blank, else the document CID
fn resolve_hash<T: Serialize>(supplied: Option<String>, doc: &T) -> Result<String> {
    match supplied.filter(|h| !h.trim().is_empty()) {
        Some(h) => validation::data_hash(&h).map_err(invalid),
        None => content_hash::document_cid(doc),
    }
}

fn expect_conservation(outcome: CallOutcome) -> Result<ConservationRecord> {
    match outcome {
        CallOutcome::Conservation(record) => Ok(record),
        other => Err(GatewayError::Internal(format!("Unexpected call outcome: {:?}", other))),
    }
}

fn expect_supply_chain(outcome: CallOutcome) -> Result<SupplyChainRecord> {
    match outcome {
        CallOutcome::SupplyChain(record) => Ok(record),
        other => Err(GatewayError::Internal(format!("Unexpected call outcome: {:?}", other))),
    }
}

/// The chain accepted the transaction but the database write failed
fn orphaned(receipt: &TxReceipt, err: GatewayError) -> GatewayError {
    error!(
        tx = %receipt.tx_hash,
        method = receipt.call.method(),
        error = %err,
        "Registry transaction applied but off-chain write failed"
    );
    err
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::LocalChain;
    use crate::db::snapshot;
    use seatrace_registry::{Role, SourceType, StageUpdatePolicy};

    fn addr(n: u8) -> Address {
        Address::from_key_bytes(&[n; 32])
    }

    struct Fixture {
        chain: Arc<LocalChain>,
        records: RecordService,
        db: Arc<Database>,
    }

    async fn fixture() -> Fixture {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let chain = Arc::new(LocalChain::open(db.clone(), Some(&addr(1)), StageUpdatePolicy::AnyRoleHolder).unwrap());
        for (who, role) in [(2, Role::Researcher), (3, Role::Fisher), (4, Role::Processor)] {
            chain
                .submit(&addr(1), RegistryCall::GrantRole { target: addr(who), role })
                .await
                .unwrap();
        }
        let records = RecordService::new(db.clone(), chain.clone());
        Fixture { chain, records, db }
    }

    fn sample_input(id: &str) -> CreateSampleInput {
        serde_json::from_value(serde_json::json!({
            "samplingId": id,
            "species": "Thunnus albacares",
            "location": "North Reef",
            "sampleType": "tissue",
            "measurements": { "lengthCm": 120 }
        }))
        .unwrap()
    }

    fn product_input(id: &str) -> CreateProductInput {
        serde_json::from_value(serde_json::json!({
            "productId": id,
            "species": "Thunnus albacares",
            "sourceType": "wild_caught",
            "originLocation": "FAO 71",
            "quantity": 250.0,
            "unit": "kg",
            "initialStage": "caught"
        }))
        .unwrap()
    }

    fn stage(s: &str) -> UpdateStageInput {
        UpdateStageInput {
            stage: s.into(),
            location: None,
            notes: Some("checked".into()),
            data_hash: None,
        }
    }

    #[tokio::test]
    async fn test_sample_lifecycle() {
        let f = fixture().await;

        let created = f.records.create_sample(&addr(2), sample_input("SAMPLE-001")).await.unwrap();
        assert!(created.record.data_hash.starts_with("bafkrei"));
        assert_eq!(created.sample.tx_hash, created.receipt.tx_hash);

        let dup = f.records.create_sample(&addr(2), sample_input("SAMPLE-001")).await.unwrap_err();
        assert!(matches!(dup, GatewayError::Reverted(RegistryError::DuplicateSamplingId(_))));

        let verified = f.records.verify_sample(&addr(1), "SAMPLE-001").await.unwrap();
        assert!(verified.record.verified);
        assert!(verified.sample.verified);
        assert_eq!(verified.record.data_hash, created.record.data_hash);

        let view = f.records.conservation_view("SAMPLE-001").await.unwrap();
        assert!(view.integrity.is_intact());
        assert_eq!(view.integrity.document_matches, Some(true));
    }

    #[tokio::test]
    async fn test_revert_writes_nothing_off_chain() {
        let f = fixture().await;

        // A fisher is not a researcher
        let err = f.records.create_sample(&addr(3), sample_input("S-9")).await.unwrap_err();
        assert_eq!(err.status_code(), hyper::StatusCode::FORBIDDEN);
        assert!(f.db.with_conn(|c| samples::get_sample(c, "S-9")).unwrap().is_none());
        assert!(matches!(
            f.records.conservation_view("S-9").await,
            Err(GatewayError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_client_supplied_hash() {
        let f = fixture().await;
        let mut input = sample_input("S-2");
        input.data_hash = Some("QmClientPinned".into());
        let created = f.records.create_sample(&addr(2), input).await.unwrap();
        assert_eq!(created.record.data_hash, "QmClientPinned");

        let view = f.records.conservation_view("S-2").await.unwrap();
        assert_eq!(view.integrity.document_matches, None);
        assert!(view.integrity.is_intact());
    }

    #[tokio::test]
    async fn test_product_journey_and_trace() {
        let f = fixture().await;

        let created = f.records.create_product(&addr(3), product_input("TUNA-1")).await.unwrap();
        assert_eq!(created.record.source_type, SourceType::WildCaught);
        assert_eq!(created.product.current_stage, "caught");

        f.records.update_stage(&addr(4), "TUNA-1", stage("processing")).await.unwrap();
        let updated = f.records.update_stage(&addr(4), "TUNA-1", stage("processed")).await.unwrap();
        assert_eq!(updated.record.update_count, 2);
        assert_eq!(updated.event.notes.as_deref(), Some("checked"));

        let journey = f.records.journey("TUNA-1").await.unwrap();
        let stages: Vec<_> = journey.iter().map(|e| e.stage.as_str()).collect();
        assert_eq!(stages, vec!["caught", "processing", "processed"]);

        let trace = f.records.trace("TUNA-1").await.unwrap();
        assert!(trace.verified);
        assert_eq!(trace.on_chain.unwrap().current_stage, "processed");

        assert!(matches!(f.records.trace("NOPE").await, Err(GatewayError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_stage_update_requires_role() {
        let f = fixture().await;
        f.records.create_product(&addr(3), product_input("TUNA-2")).await.unwrap();

        // The researcher holds no supply-chain role
        let err = f.records.update_stage(&addr(2), "TUNA-2", stage("sold")).await.unwrap_err();
        assert!(matches!(err, GatewayError::Reverted(RegistryError::Unauthorized { .. })));
        assert_eq!(f.records.journey("TUNA-2").await.unwrap().len(), 1);
        assert_eq!(f.chain.supply_chain_record("TUNA-2").await.unwrap().current_stage, "caught");
    }

    #[tokio::test]
    async fn test_negative_zero_quantity_stays_verifiable() {
        let f = fixture().await;
        let mut input = product_input("TUNA-0");
        input.document.quantity = Some(-0.0);
        let created = f.records.create_product(&addr(3), input).await.unwrap();
        assert!(created.product.quantity.unwrap().is_sign_positive());

        let trace = f.records.trace("TUNA-0").await.unwrap();
        assert_eq!(trace.integrity.document_matches, Some(true));
        assert!(trace.verified);

        let mut bad = product_input("TUNA-NEG");
        bad.document.quantity = Some(-1.5);
        let err = f.records.create_product(&addr(3), bad).await.unwrap_err();
        assert!(matches!(err, GatewayError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_invalid_stage_update_is_not_submitted() {
        let f = fixture().await;
        let created = f.records.create_product(&addr(3), product_input("TUNA-4")).await.unwrap();
        let before = f.db.with_conn(snapshot::receipt_counts).unwrap();

        let mut blank_hash = stage("processed");
        blank_hash.data_hash = Some("   ".into());
        let updated = f.records.update_stage(&addr(4), "TUNA-4", blank_hash).await.unwrap();
        assert!(updated.receipt.is_success());
        assert_eq!(updated.record.data_hash, created.record.data_hash);

        let after_blank_hash = f.db.with_conn(snapshot::receipt_counts).unwrap();
        assert_eq!(after_blank_hash, (before.0 + 1, before.1));

        let err = f.records.update_stage(&addr(4), "TUNA-4", stage("  ")).await.unwrap_err();
        assert!(matches!(err, GatewayError::BadRequest(_)));
        assert_eq!(f.db.with_conn(snapshot::receipt_counts).unwrap(), after_blank_hash);
    }

    #[tokio::test]
    async fn test_optional_fields_counted_in_chars() {
        let f = fixture().await;

        // Multi-byte text within the character limit is accepted
        let mut input = product_input("TUNA-5");
        input.document.vessel_or_farm = Some("é".repeat(MAX_TEXT_LEN));
        f.records.create_product(&addr(3), input).await.unwrap();

        let mut input = product_input("TUNA-6");
        input.document.unit = Some("k".repeat(MAX_TEXT_LEN + 1));
        let err = f.records.create_product(&addr(3), input).await.unwrap_err();
        assert!(matches!(err, GatewayError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_tampered_document_detected() {
        let f = fixture().await;
        f.records.create_product(&addr(3), product_input("TUNA-3")).await.unwrap();

        f.db
            .with_conn(|conn| {
                conn.execute("UPDATE products SET quantity = 999 WHERE product_id = 'TUNA-3'", [])?;
                Ok(())
            })
            .unwrap();

        let trace = f.records.trace("TUNA-3").await.unwrap();
        assert_eq!(trace.integrity.document_matches, Some(false));
        assert!(!trace.verified);
    }
}
