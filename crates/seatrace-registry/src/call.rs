//! Call envelope for the registry entry points
//!
//! `RegistryCall` is the serialisable form of every mutating entry point, so a
//! host can log, hash, and replay transactions without knowing their shape.

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::records::{ConservationRecord, SourceType, SupplyChainRecord};
use crate::roles::Role;

/// Who is calling and in which block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxContext {
    pub caller: Address,
    pub block_number: u64,
    /// Block timestamp, seconds since the Unix epoch
    pub timestamp: u64,
}

impl TxContext {
    pub fn new(caller: Address, block_number: u64, timestamp: u64) -> Self {
        Self {
            caller,
            block_number,
            timestamp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params", rename_all = "snake_case")]
pub enum RegistryCall {
    GrantRole {
        target: Address,
        role: Role,
    },
    RevokeRole {
        target: Address,
        role: Role,
    },
    #[serde(rename_all = "camelCase")]
    CreateConservationRecord {
        sampling_id: String,
        data_hash: String,
    },
    #[serde(rename_all = "camelCase")]
    VerifyConservationRecord {
        sampling_id: String,
    },
    #[serde(rename_all = "camelCase")]
    CreateSupplyChainRecord {
        product_id: String,
        data_hash: String,
        source_type: SourceType,
        initial_stage: String,
    },
    #[serde(rename_all = "camelCase")]
    UpdateSupplyChainRecord {
        product_id: String,
        new_stage: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        new_data_hash: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        notes: Option<String>,
    },
}

impl RegistryCall {
    /// Entry point name, as used in logs and receipts
    pub fn method(&self) -> &'static str {
        match self {
            RegistryCall::GrantRole { .. } => "grant_role",
            RegistryCall::RevokeRole { .. } => "revoke_role",
            RegistryCall::CreateConservationRecord { .. } => "create_conservation_record",
            RegistryCall::VerifyConservationRecord { .. } => "verify_conservation_record",
            RegistryCall::CreateSupplyChainRecord { .. } => "create_supply_chain_record",
            RegistryCall::UpdateSupplyChainRecord { .. } => "update_supply_chain_record",
        }
    }
}

/// State written by a successful call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum CallOutcome {
    RoleGranted { target: Address, role: Role, newly_granted: bool },
    RoleRevoked { target: Address, role: Role },
    Conservation(ConservationRecord),
    SupplyChain(SupplyChainRecord),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_wire_format() {
        let call = RegistryCall::CreateConservationRecord {
            sampling_id: "SAMPLE-001".into(),
            data_hash: "QmHash1".into(),
        };
        let json = serde_json::to_value(&call).unwrap();
        assert_eq!(json["method"], "create_conservation_record");
        assert_eq!(json["params"]["samplingId"], "SAMPLE-001");
        assert_eq!(call.method(), "create_conservation_record");
    }

    #[test]
    fn test_update_call_omits_empty_options() {
        let call = RegistryCall::UpdateSupplyChainRecord {
            product_id: "P-1".into(),
            new_stage: "processing".into(),
            new_data_hash: None,
            notes: None,
        };
        let json = serde_json::to_string(&call).unwrap();
        assert!(!json.contains("newDataHash"));
        let back: RegistryCall = serde_json::from_str(&json).unwrap();
        assert_eq!(back, call);
    }
}
