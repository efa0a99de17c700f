//! Content addressing for off-chain documents
//!
//! A document's data hash is a CIDv1 (raw codec, SHA2-256 multihash) over its
//! canonical JSON: object keys sorted, no insignificant whitespace. Clients
//! that already pinned the document elsewhere may supply their own hash
//! instead, which is stored and anchored as-is.

use std::str::FromStr;

use cid::Cid;
use multihash_codetable::{Code, MultihashDigest};
use serde::Serialize;

use crate::types::{GatewayError, Result};

/// Multicodec for raw bytes
const RAW_CODEC: u64 = 0x55;
/// Multihash code for SHA2-256
const SHA2_256_CODE: u64 = 0x12;

/// Canonical JSON bytes of a document
pub fn canonical_json<T: Serialize>(doc: &T) -> Result<Vec<u8>> {
    // serde_json::Value keeps object keys in sorted order
    let value = serde_json::to_value(doc)
        .map_err(|e| GatewayError::Internal(format!("Failed to encode document: {}", e)))?;
    serde_json::to_vec(&value).map_err(|e| GatewayError::Internal(format!("Failed to encode document: {}", e)))
}

/// CID string for a document
pub fn document_cid<T: Serialize>(doc: &T) -> Result<String> {
    let bytes = canonical_json(doc)?;
    let hash = Code::Sha2_256.digest(&bytes);
    Ok(Cid::new_v1(RAW_CODEC, hash).to_string())
}

/// Whether `data_hash` is a CID this module could have produced
pub fn is_derived_cid(data_hash: &str) -> bool {
    match Cid::from_str(data_hash) {
        Ok(cid) => {
            cid.version() == cid::Version::V1 && cid.codec() == RAW_CODEC && cid.hash().code() == SHA2_256_CODE
        }
        Err(_) => false,
    }
}

/// Re-hash a stored document and compare with its recorded hash.
///
/// `None` when the recorded hash was supplied by the client in a form we do
/// not derive, so there is nothing to recompute against.
pub fn document_matches<T: Serialize>(doc: &T, data_hash: &str) -> Result<Option<bool>> {
    if !is_derived_cid(data_hash) {
        return Ok(None);
    }
    Ok(Some(document_cid(doc)? == data_hash))
}
