//! Sign-in challenges
//!
//! A challenge is a single-use nonce bound to one address. The wallet signs
//! the challenge message; verifying consumes the nonce whether or not the
//! signature checks out, so a captured message cannot be replayed.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rand::RngCore;
use seatrace_registry::Address;
use serde::Serialize;
use tracing::{debug, info};

/// An outstanding challenge
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Challenge {
    pub address: Address,
    pub nonce: String,
    pub message: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Challenge {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Why a challenge could not be redeemed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedeemError {
    /// No challenge was issued for this address (or it was already used)
    Missing,
    Expired,
}

/// In-memory challenge store keyed by address
pub struct ChallengeStore {
    app_name: String,
    ttl: Duration,
    challenges: DashMap<Address, Challenge>,
}

impl ChallengeStore {
    pub fn new(app_name: impl Into<String>, ttl_seconds: u64) -> Self {
        Self {
            app_name: app_name.into(),
            ttl: Duration::from_secs(ttl_seconds),
            challenges: DashMap::new(),
        }
    }

    /// Issue a fresh challenge, replacing any earlier one for the same address.
    pub fn issue(&self, address: &Address) -> Challenge {
        self.issue_at(address, Utc::now())
    }

    pub(crate) fn issue_at(&self, address: &Address, now: DateTime<Utc>) -> Challenge {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        let nonce = hex::encode(bytes);

        let ttl = chrono::Duration::from_std(self.ttl).unwrap_or_else(|_| chrono::Duration::seconds(300));
        let expires_at = now + ttl;
        let message = sign_in_message(&self.app_name, address, &nonce, now);

        let challenge = Challenge {
            address: address.clone(),
            nonce,
            message,
            issued_at: now,
            expires_at,
        };
        self.challenges.insert(address.clone(), challenge.clone());
        debug!(address = %address, "Issued sign-in challenge");
        challenge
    }

    /// Remove and return the challenge for `address` if it is still live.
    pub fn redeem(&self, address: &Address) -> Result<Challenge, RedeemError> {
        self.redeem_at(address, Utc::now())
    }

    pub(crate) fn redeem_at(&self, address: &Address, now: DateTime<Utc>) -> Result<Challenge, RedeemError> {
        let (_, challenge) = self.challenges.remove(address).ok_or(RedeemError::Missing)?;
        if challenge.is_expired_at(now) {
            return Err(RedeemError::Expired);
        }
        Ok(challenge)
    }

    /// Drop expired challenges. Returns how many were removed.
    pub fn cleanup(&self) -> usize {
        let now = Utc::now();
        let before = self.challenges.len();
        self.challenges.retain(|_, c| !c.is_expired_at(now));
        before - self.challenges.len()
    }

    pub fn len(&self) -> usize {
        self.challenges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.challenges.is_empty()
    }
}

/// The exact text a wallet signs to prove control of `address`.
pub fn sign_in_message(app_name: &str, address: &Address, nonce: &str, issued_at: DateTime<Utc>) -> String {
    format!(
        "Sign in to {}\n\nAddress: {}\nNonce: {}\nIssued At: {}",
        app_name,
        address,
        nonce,
        issued_at.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
    )
}

/// Spawn the periodic cleanup of expired challenges.
pub fn spawn_cleanup_task(store: Arc<ChallengeStore>, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let removed = store.cleanup();
            if removed > 0 {
                info!(removed, remaining = store.len(), "Expired sign-in challenges removed");
            }
        }
    })
}
