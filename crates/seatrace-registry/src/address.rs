//! Wallet addresses
//!
//! An address is `0x` followed by 40 hex digits (an EVM-style account) or
//! 64 hex digits (a raw ed25519 public key). Addresses are stored lowercase so
//! that two spellings of the same account compare equal.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::RegistryError;

const SHORT_HEX_LEN: usize = 40;
const KEY_HEX_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address(String);

impl Address {
    /// Parse and normalise an address string.
    pub fn parse(raw: &str) -> Result<Self, RegistryError> {
        let trimmed = raw.trim();
        let hex = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .ok_or_else(|| RegistryError::InvalidAddress(raw.to_string()))?;

        if hex.len() != SHORT_HEX_LEN && hex.len() != KEY_HEX_LEN {
            return Err(RegistryError::InvalidAddress(raw.to_string()));
        }
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(RegistryError::InvalidAddress(raw.to_string()));
        }

        Ok(Self(format!("0x{}", hex.to_ascii_lowercase())))
    }

    /// Build an address from raw ed25519 public key bytes.
    pub fn from_key_bytes(bytes: &[u8; 32]) -> Self {
        let mut s = String::with_capacity(2 + KEY_HEX_LEN);
        s.push_str("0x");
        for b in bytes {
            s.push_str(&format!("{:02x}", b));
        }
        Self(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Hex digits without the `0x` prefix.
    pub fn hex_digits(&self) -> &str {
        &self.0[2..]
    }

    /// True when the address is a 32-byte public key rather than a 20-byte account.
    pub fn is_public_key(&self) -> bool {
        self.hex_digits().len() == KEY_HEX_LEN
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Address {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Address::parse(&raw).map_err(serde::de::Error::custom)
    }
}
