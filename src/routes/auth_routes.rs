//! Wallet sign-in routes
//!
//! - POST /auth/challenge - Issue a nonce message for an address
//! - POST /auth/verify - Exchange a signed challenge for a JWT
//! - POST /auth/refresh - Re-issue a token for the current session
//! - POST /auth/logout - Revoke every token issued to the caller
//! - GET /auth/me - Current user and on-chain roles

use serde::{Deserialize, Serialize};
use seatrace_registry::{Address, Role};
use tracing::{info, warn};

use super::{authenticate, ApiRequest, ApiResponse, Caller};
use crate::auth::{verify_wallet_signature, Challenge, RedeemError, TokenInput};
use crate::db::users::{self, UserRow};
use crate::server::AppState;
use crate::services::roles::parse_address;
use crate::types::{GatewayError, Result};

/// Challenge request body
#[derive(Debug, Deserialize)]
pub struct ChallengeRequest {
    pub address: String,
}

/// Verify request body
#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub address: String,
    /// Hex ed25519 signature over the challenge message
    pub signature: String,
}

/// Successful sign-in or refresh
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub token: String,
    pub address: Address,
    pub expires_at: u64,
    pub roles: Vec<Role>,
    pub user: UserRow,
}

/// Current session
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub address: Address,
    pub roles: Vec<Role>,
    pub permission_level: crate::auth::PermissionLevel,
    pub user: UserRow,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutResponse {
    pub success: bool,
    pub revoked_version: u32,
}

pub async fn challenge(state: &AppState, req: &ApiRequest) -> Result<ApiResponse> {
    let body: ChallengeRequest = req.json()?;
    let address = parse_address(&body.address)?;
    let challenge: Challenge = state.challenges.issue(&address);
    ApiResponse::ok(&challenge)
}

pub async fn verify(state: &AppState, req: &ApiRequest) -> Result<ApiResponse> {
    let body: VerifyRequest = req.json()?;
    let address = parse_address(&body.address)?;

    let challenge = state.challenges.redeem(&address).map_err(|e| match e {
        RedeemError::Missing => GatewayError::Unauthorized("No pending challenge for this address".into()),
        RedeemError::Expired => GatewayError::Unauthorized("Challenge expired".into()),
    })?;

    if let Err(e) = verify_wallet_signature(&address, &challenge.message, &body.signature) {
        warn!(address = %address, error = %e, "Sign-in signature rejected");
        return Err(match e {
            GatewayError::BadRequest(msg) => GatewayError::BadRequest(msg),
            _ => GatewayError::Unauthorized("Signature does not match challenge".into()),
        });
    }

    let user = state.db.with_conn(|conn| {
        users::ensure_user(conn, address.as_str())?;
        users::record_login(conn, address.as_str())?;
        users::get_user(conn, address.as_str())?
            .ok_or_else(|| GatewayError::Internal("User vanished after login".into()))
    })?;

    let response = issue_token(state, address, user).await?;
    info!(address = %response.address, "Wallet signed in");
    ApiResponse::ok(&response)
}

pub async fn refresh(state: &AppState, req: &ApiRequest) -> Result<ApiResponse> {
    let caller = authenticate(state, req).await?;
    let user = load_user(state, &caller)?;
    let response = issue_token(state, caller.address, user).await?;
    ApiResponse::ok(&response)
}

pub async fn logout(state: &AppState, req: &ApiRequest) -> Result<ApiResponse> {
    let caller = authenticate(state, req).await?;
    let revoked_version = state
        .db
        .with_conn(|conn| users::bump_token_version(conn, caller.address.as_str()))?;
    info!(address = %caller.address, "Wallet signed out");
    ApiResponse::ok(&LogoutResponse {
        success: true,
        revoked_version: revoked_version.saturating_sub(1),
    })
}

pub async fn me(state: &AppState, req: &ApiRequest) -> Result<ApiResponse> {
    let caller = authenticate(state, req).await?;
    let user = load_user(state, &caller)?;
    ApiResponse::ok(&MeResponse {
        address: caller.address,
        roles: caller.roles,
        permission_level: caller.level,
        user,
    })
}

async fn issue_token(state: &AppState, address: Address, user: UserRow) -> Result<AuthResponse> {
    let (token, claims) = state.jwt.generate_token(TokenInput {
        address: address.to_string(),
        version: user.token_version,
    })?;
    let roles = state.chain.roles_of(&address).await;
    Ok(AuthResponse {
        token,
        address,
        expires_at: claims.exp,
        roles,
        user,
    })
}

pub(super) fn load_user(state: &AppState, caller: &Caller) -> Result<UserRow> {
    state
        .db
        .with_conn(|conn| users::get_user(conn, caller.address.as_str()))?
        .ok_or_else(|| GatewayError::NotFound(format!("User {}", caller.address)))
}
