//! Record types stored by the registry
//!
//! The registry keeps only a hash pointer and coarse status per record. The
//! full documents and the stage history live off-chain.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::address::Address;
use crate::error::RegistryError;

/// A scientific sampling record anchored by a researcher
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConservationRecord {
    pub sampling_id: String,
    pub researcher: Address,
    pub data_hash: String,
    pub verified: bool,
    pub verifier: Option<Address>,
    pub created_at: u64,
    pub verified_at: Option<u64>,
}

/// Where a product entered the supply chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    WildCaught,
    Aquaculture,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::WildCaught => "wild_caught",
            SourceType::Aquaculture => "aquaculture",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceType {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "wild_caught" | "wild" | "wild_capture" => Ok(SourceType::WildCaught),
            "aquaculture" | "farmed" | "farm" => Ok(SourceType::Aquaculture),
            _ => Err(RegistryError::UnknownSourceType(s.to_string())),
        }
    }
}

/// A product's on-chain footprint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupplyChainRecord {
    pub product_id: String,
    pub creator: Address,
    pub data_hash: String,
    pub source_type: SourceType,
    pub current_stage: String,
    pub created_at: u64,
    pub updated_at: u64,
    /// Number of stage updates applied since creation
    pub update_count: u64,
    /// Address of the most recent updater (creator until the first update)
    pub last_updated_by: Address,
}

/// Aggregate counts exposed by the read-only getters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryStats {
    pub conservation_records: u64,
    pub verified_conservation_records: u64,
    pub supply_chain_records: u64,
    pub role_holders: u64,
}
