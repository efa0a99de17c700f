//! Profile routes

use serde::Serialize;
use seatrace_registry::{Address, Role};

use super::auth_routes::load_user;
use super::{authorize, ApiRequest, ApiResponse};
use crate::db::users::{self, ProfileUpdate, PublicProfile, UserRow};
use crate::server::AppState;
use crate::services::roles::parse_address;
use crate::types::{GatewayError, Result};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub user: UserRow,
    pub roles: Vec<Role>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicProfileResponse {
    pub profile: PublicProfile,
    pub roles: Vec<Role>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RolesResponse {
    pub address: Address,
    pub roles: Vec<Role>,
    pub is_owner: bool,
}

pub async fn get_me(state: &AppState, req: &ApiRequest) -> Result<ApiResponse> {
    let caller = authorize(state, req, "get_profile").await?;
    let user = load_user(state, &caller)?;
    ApiResponse::ok(&ProfileResponse {
        user,
        roles: caller.roles,
    })
}

pub async fn update_me(state: &AppState, req: &ApiRequest) -> Result<ApiResponse> {
    let caller = authorize(state, req, "update_profile").await?;
    let update: ProfileUpdate = req.json()?;
    let user = state
        .db
        .with_conn(|conn| users::update_profile(conn, caller.address.as_str(), &update))?;
    ApiResponse::ok(&ProfileResponse {
        user,
        roles: caller.roles,
    })
}

/// Public profile. Addresses that never signed in but hold roles still resolve.
pub async fn get_user(state: &AppState, raw_address: &str) -> Result<ApiResponse> {
    let address = parse_address(raw_address)?;
    let roles = state.chain.roles_of(&address).await;
    let user = state.db.with_conn(|conn| users::get_user(conn, address.as_str()))?;

    let profile = match user {
        Some(u) => u.public_view(),
        None if !roles.is_empty() => PublicProfile {
            address: address.to_string(),
            display_name: None,
            organization: None,
            bio: None,
            location: None,
        },
        None => return Err(GatewayError::NotFound(format!("User {}", address))),
    };
    ApiResponse::ok(&PublicProfileResponse { profile, roles })
}

pub async fn get_roles(state: &AppState, raw_address: &str) -> Result<ApiResponse> {
    let address = parse_address(raw_address)?;
    let roles = state.chain.roles_of(&address).await;
    let is_owner = state.chain.owner().await == address;
    ApiResponse::ok(&RolesResponse {
        address,
        roles,
        is_owner,
    })
}
