//! Field checks shared by every mutating call

use crate::error::{RegistryError, Result};

/// Upper bound for identifiers (sampling / product IDs)
pub const MAX_ID_LEN: usize = 128;

/// Upper bound for data hashes; a base32 CIDv1 of a sha2-256 digest is 59 chars
pub const MAX_HASH_LEN: usize = 256;

/// Upper bound for stage names
pub const MAX_STAGE_LEN: usize = 64;

/// Trim and require a non-empty value no longer than `max`.
pub fn required(field: &'static str, value: &str, max: usize) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(RegistryError::EmptyField(field));
    }
    if trimmed.chars().count() > max {
        return Err(RegistryError::FieldTooLong { field, max });
    }
    Ok(trimmed.to_string())
}

pub fn identifier(field: &'static str, value: &str) -> Result<String> {
    required(field, value, MAX_ID_LEN)
}

pub fn data_hash(value: &str) -> Result<String> {
    required("dataHash", value, MAX_HASH_LEN)
}

pub fn stage(value: &str) -> Result<String> {
    required("stage", value, MAX_STAGE_LEN)
}
