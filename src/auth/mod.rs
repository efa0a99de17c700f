//! Authentication and authorization for the gateway
//!
//! Provides:
//! - Wallet challenge/response sign-in (ed25519)
//! - JWT session tokens
//! - Permission levels for operation authorization

pub mod challenge;
pub mod jwt;
pub mod permissions;
pub mod wallet;

pub use challenge::{sign_in_message, Challenge, ChallengeStore, RedeemError};
pub use jwt::{extract_token_from_header, Claims, JwtValidator, TokenInput, TokenValidationResult};
pub use permissions::{
    get_operation_description, get_required_permission, get_required_roles, is_operation_allowed,
    PermissionLevel,
};
pub use wallet::verify_wallet_signature;
