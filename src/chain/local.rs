//! In-process registry host backed by the gateway database

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use seatrace_registry::{
    Address, ConservationRecord, Registry, RegistryCall, Role, StageUpdatePolicy, SupplyChainRecord,
    TxContext,
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{tx_hash, ChainClient, ChainStats, Submitted, TxReceipt, TxStatus};
use crate::db::{snapshot, Database};
use crate::types::{GatewayError, Result};

struct ChainState {
    registry: Registry,
    block_number: u64,
    last_timestamp: u64,
}

/// Single-node chain: one transaction per block, applied under one lock
pub struct LocalChain {
    state: Mutex<ChainState>,
    db: Arc<Database>,
}

impl LocalChain {
    /// Restore the registry from the database, or deploy it with `deployer`
    /// as owner if there is nothing to restore.
    pub fn open(db: Arc<Database>, deployer: Option<&Address>, policy: StageUpdatePolicy) -> Result<Self> {
        let stored = db.with_conn(snapshot::load_snapshot)?;
        let latest = db.with_conn(snapshot::latest_block)?;
        let last_timestamp = db.with_conn(snapshot::latest_timestamp)?;

        let (registry, block_number) = match stored {
            Some(snap) => {
                let mut registry: Registry = serde_json::from_str(&snap.state_json)
                    .map_err(|e| GatewayError::Database(format!("Corrupt registry snapshot: {}", e)))?;
                if let Some(deployer) = deployer {
                    if deployer != registry.owner() {
                        warn!(
                            configured = %deployer,
                            owner = %registry.owner(),
                            "ADMIN_ADDRESS differs from the deployed registry owner; keeping the deployed owner"
                        );
                    }
                }
                registry.set_stage_update_policy(policy);
                info!(
                    block = snap.block_number.max(latest),
                    owner = %registry.owner(),
                    "Registry restored from snapshot"
                );
                (registry, snap.block_number.max(latest))
            }
            None => {
                let deployer = deployer.ok_or_else(|| {
                    GatewayError::Config("ADMIN_ADDRESS is required to deploy a new registry".into())
                })?;
                let registry = Registry::new(deployer.clone()).with_stage_update_policy(policy);
                let state_json = serde_json::to_string(&registry)
                    .map_err(|e| GatewayError::Internal(format!("Failed to encode registry: {}", e)))?;
                db.with_conn(|conn| snapshot::store_snapshot(conn, 0, &state_json))?;
                info!(owner = %deployer, "Deployed new registry");
                (registry, latest)
            }
        };

        Ok(Self {
            state: Mutex::new(ChainState {
                registry,
                block_number,
                last_timestamp,
            }),
            db,
        })
    }

    pub async fn block_number(&self) -> u64 {
        self.state.lock().await.block_number
    }
}

#[async_trait]
impl ChainClient for LocalChain {
    async fn submit(&self, caller: &Address, call: RegistryCall) -> Result<Submitted> {
        let mut state = self.state.lock().await;

        let block_number = state.block_number + 1;
        // Block timestamps never go backwards
        let timestamp = (Utc::now().timestamp().max(0) as u64).max(state.last_timestamp);
        let ctx = TxContext::new(caller.clone(), block_number, timestamp);
        let hash = tx_hash(block_number, caller, &call)?;

        // Work on a copy so a failure to persist leaves the live state untouched
        let mut next = state.registry.clone();
        let result = next.execute(&ctx, &call);

        let status = match &result {
            Ok(_) => TxStatus::Success,
            Err(e) => TxStatus::Reverted { reason: e.to_string() },
        };
        let receipt = TxReceipt {
            tx_hash: hash,
            block_number,
            timestamp,
            caller: caller.clone(),
            call,
            status,
        };

        let receipt_json = serde_json::to_string(&receipt)
            .map_err(|e| GatewayError::Internal(format!("Failed to encode receipt: {}", e)))?;
        let state_json = match &result {
            Ok(_) => Some(
                serde_json::to_string(&next)
                    .map_err(|e| GatewayError::Internal(format!("Failed to encode registry: {}", e)))?,
            ),
            Err(_) => None,
        };
        self.db.with_conn_mut(|conn| {
            snapshot::record_block(
                conn,
                &receipt.tx_hash,
                block_number,
                &receipt_json,
                state_json.as_deref(),
            )
        })?;

        state.block_number = block_number;
        state.last_timestamp = timestamp;

        match result {
            Ok(outcome) => {
                state.registry = next;
                debug!(
                    tx = %receipt.tx_hash,
                    block = block_number,
                    method = receipt.call.method(),
                    caller = %caller,
                    "Transaction applied"
                );
                Ok(Submitted { receipt, outcome })
            }
            Err(err) => {
                warn!(
                    tx = %receipt.tx_hash,
                    block = block_number,
                    method = receipt.call.method(),
                    caller = %caller,
                    reason = %err,
                    "Transaction reverted"
                );
                Err(GatewayError::Reverted(err))
            }
        }
    }

    async fn owner(&self) -> Address {
        self.state.lock().await.registry.owner().clone()
    }

    async fn roles_of(&self, address: &Address) -> Vec<Role> {
        self.state.lock().await.registry.roles_of(address)
    }

    async fn has_role(&self, address: &Address, role: Role) -> bool {
        self.state.lock().await.registry.has_role(address, role)
    }

    async fn conservation_record(&self, sampling_id: &str) -> Option<ConservationRecord> {
        self.state
            .lock()
            .await
            .registry
            .conservation_record(sampling_id)
            .cloned()
    }

    async fn supply_chain_record(&self, product_id: &str) -> Option<SupplyChainRecord> {
        self.state
            .lock()
            .await
            .registry
            .supply_chain_record(product_id)
            .cloned()
    }

    async fn stats(&self) -> Result<ChainStats> {
        let (transactions, reverted_transactions) = self.db.with_conn(snapshot::receipt_counts)?;
        let state = self.state.lock().await;
        Ok(ChainStats {
            block_number: state.block_number,
            owner: state.registry.owner().clone(),
            stage_update_policy: state.registry.stage_update_policy(),
            transactions,
            reverted_transactions,
            registry: state.registry.stats(),
        })
    }

    async fn receipt(&self, tx_hash: &str) -> Result<Option<TxReceipt>> {
        let normalized = tx_hash.trim().to_ascii_lowercase();
        let json = self.db.with_conn(|conn| snapshot::get_receipt_json(conn, &normalized))?;
        json.map(|j| {
            serde_json::from_str(&j)
                .map_err(|e| GatewayError::Database(format!("Corrupt receipt {}: {}", normalized, e)))
        })
        .transpose()
    }
}
