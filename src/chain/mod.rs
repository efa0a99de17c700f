//! Registry host
//!
//! The registry behaves like a deployed contract: every mutating call is a
//! transaction with a caller, a block number and a block timestamp, applied
//! one at a time in submission order. A rejected call is a reverted
//! transaction: it gets a receipt, but the registry state does not change.
//!
//! `ChainClient` is the seam between the gateway and wherever the registry
//! runs. `LocalChain` hosts it in-process and persists its state to SQLite.

mod local;

pub use local::LocalChain;

use async_trait::async_trait;
use seatrace_registry::{
    Address, CallOutcome, ConservationRecord, RegistryCall, RegistryStats, Role, StageUpdatePolicy,
    SupplyChainRecord,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::types::Result;

/// How a transaction ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TxStatus {
    Success,
    Reverted { reason: String },
}

/// Receipt for one submitted transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxReceipt {
    pub tx_hash: String,
    pub block_number: u64,
    /// Block timestamp, seconds since the Unix epoch
    pub timestamp: u64,
    pub caller: Address,
    pub call: RegistryCall,
    pub status: TxStatus,
}

impl TxReceipt {
    pub fn is_success(&self) -> bool {
        self.status == TxStatus::Success
    }
}

/// A transaction that was applied
#[derive(Debug, Clone)]
pub struct Submitted {
    pub receipt: TxReceipt,
    pub outcome: CallOutcome,
}

/// Chain-level counters for `/chain/stats`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainStats {
    pub block_number: u64,
    pub owner: Address,
    pub stage_update_policy: StageUpdatePolicy,
    pub transactions: u64,
    pub reverted_transactions: u64,
    #[serde(flatten)]
    pub registry: RegistryStats,
}

/// Access to the hosted registry
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Submit a transaction. A revert comes back as `GatewayError::Reverted`
    /// after its receipt has been recorded.
    async fn submit(&self, caller: &Address, call: RegistryCall) -> Result<Submitted>;

    async fn owner(&self) -> Address;

    async fn roles_of(&self, address: &Address) -> Vec<Role>;

    async fn has_role(&self, address: &Address, role: Role) -> bool;

    async fn conservation_record(&self, sampling_id: &str) -> Option<ConservationRecord>;

    async fn supply_chain_record(&self, product_id: &str) -> Option<SupplyChainRecord>;

    async fn stats(&self) -> Result<ChainStats>;

    async fn receipt(&self, tx_hash: &str) -> Result<Option<TxReceipt>>;
}

/// `0x` + hex SHA-256 over the block number, caller and call JSON
pub fn tx_hash(block_number: u64, caller: &Address, call: &RegistryCall) -> Result<String> {
    let call_json = serde_json::to_vec(call)?;
    let mut hasher = Sha256::new();
    hasher.update(block_number.to_be_bytes());
    hasher.update(caller.as_str().as_bytes());
    hasher.update(&call_json);
    Ok(format!("0x{}", hex::encode(hasher.finalize())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tx_hash_depends_on_every_input() {
        let alice = Address::from_key_bytes(&[1; 32]);
        let bob = Address::from_key_bytes(&[2; 32]);
        let call = RegistryCall::VerifyConservationRecord {
            sampling_id: "S-1".into(),
        };
        let other = RegistryCall::VerifyConservationRecord {
            sampling_id: "S-2".into(),
        };

        let base = tx_hash(1, &alice, &call).unwrap();
        assert!(base.starts_with("0x"));
        assert_eq!(base.len(), 66);
        assert_eq!(base, tx_hash(1, &alice, &call).unwrap());
        assert_ne!(base, tx_hash(2, &alice, &call).unwrap());
        assert_ne!(base, tx_hash(1, &bob, &call).unwrap());
        assert_ne!(base, tx_hash(1, &alice, &other).unwrap());
    }

    #[test]
    fn test_receipt_status_wire_format() {
        let json = serde_json::to_value(TxStatus::Reverted {
            reason: "duplicate".into(),
        })
        .unwrap();
        assert_eq!(json["status"], "reverted");
        assert_eq!(json["reason"], "duplicate");
    }
}
