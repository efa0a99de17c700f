//! Wallet signature verification
//!
//! A wallet address is the hex encoding of an ed25519 public key, so the
//! address alone is enough to check a signature.

use ed25519_dalek::{Signature, Verifier, VerifyingKey, SIGNATURE_LENGTH};
use seatrace_registry::Address;

use crate::types::GatewayError;

/// Decode a hex signature, with or without a `0x` prefix.
pub fn decode_signature(raw: &str) -> Result<Signature, GatewayError> {
    let hex_part = raw.trim().trim_start_matches("0x");
    let bytes = hex::decode(hex_part)
        .map_err(|e| GatewayError::BadRequest(format!("Signature is not hex: {}", e)))?;
    let arr: [u8; SIGNATURE_LENGTH] = bytes.as_slice().try_into().map_err(|_| {
        GatewayError::BadRequest(format!(
            "Signature must be {} bytes, got {}",
            SIGNATURE_LENGTH,
            bytes.len()
        ))
    })?;
    Ok(Signature::from_bytes(&arr))
}

/// Public key behind an address. Only 32-byte key addresses can sign in.
pub fn verifying_key(address: &Address) -> Result<VerifyingKey, GatewayError> {
    if !address.is_public_key() {
        return Err(GatewayError::BadRequest(
            "Address must be a 32-byte ed25519 public key to sign in".into(),
        ));
    }
    let bytes = hex::decode(address.hex_digits())
        .map_err(|e| GatewayError::BadRequest(format!("Invalid address hex: {}", e)))?;
    let arr: [u8; 32] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| GatewayError::BadRequest("Invalid public key length".into()))?;
    VerifyingKey::from_bytes(&arr)
        .map_err(|e| GatewayError::BadRequest(format!("Invalid public key: {}", e)))
}

/// Check that `signature` over `message` was made by `address`.
pub fn verify_wallet_signature(
    address: &Address,
    message: &str,
    signature: &str,
) -> Result<(), GatewayError> {
    let key = verifying_key(address)?;
    let sig = decode_signature(signature)?;
    key.verify(message.as_bytes(), &sig)
        .map_err(|_| GatewayError::Auth("Signature verification failed".into()))
}
