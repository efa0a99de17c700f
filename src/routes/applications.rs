//! Role applications and direct role management

use super::{authorize, ApiRequest, ApiResponse};
use crate::db::applications::ApplicationQuery;
use crate::server::AppState;
use crate::services::roles::{ReviewInput, RoleChangeInput, SubmitApplicationInput};
use crate::types::Result;

pub async fn submit(state: &AppState, req: &ApiRequest) -> Result<ApiResponse> {
    let caller = authorize(state, req, "submit_application").await?;
    let input: SubmitApplicationInput = req.json()?;
    let application = state.roles.submit_application(&caller.address, input).await?;
    ApiResponse::created(&application)
}

pub async fn list(state: &AppState, req: &ApiRequest) -> Result<ApiResponse> {
    let caller = authorize(state, req, "list_applications").await?;
    let query: ApplicationQuery = req.query()?;
    let applications = state.roles.list_applications(&caller.address, query).await?;
    ApiResponse::ok(&applications)
}

pub async fn approve(state: &AppState, req: &ApiRequest, id: &str) -> Result<ApiResponse> {
    let caller = authorize(state, req, "approve_application").await?;
    let input: ReviewInput = req.json_or_default()?;
    let reviewed = state.roles.approve(&caller.address, id, input).await?;
    ApiResponse::ok(&reviewed)
}

pub async fn reject(state: &AppState, req: &ApiRequest, id: &str) -> Result<ApiResponse> {
    let caller = authorize(state, req, "reject_application").await?;
    let input: ReviewInput = req.json_or_default()?;
    let reviewed = state.roles.reject(&caller.address, id, input).await?;
    ApiResponse::ok(&reviewed)
}

pub async fn grant_role(state: &AppState, req: &ApiRequest) -> Result<ApiResponse> {
    let caller = authorize(state, req, "grant_role").await?;
    let input: RoleChangeInput = req.json()?;
    let changed = state.roles.grant(&caller.address, input).await?;
    ApiResponse::ok(&changed)
}

pub async fn revoke_role(state: &AppState, req: &ApiRequest) -> Result<ApiResponse> {
    let caller = authorize(state, req, "revoke_role").await?;
    let input: RoleChangeInput = req.json()?;
    let changed = state.roles.revoke(&caller.address, input).await?;
    ApiResponse::ok(&changed)
}
