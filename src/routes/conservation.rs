//! Conservation sample routes

use super::{authorize, ApiRequest, ApiResponse};
use crate::db::samples::SampleQuery;
use crate::server::AppState;
use crate::services::records::CreateSampleInput;
use crate::types::Result;

pub async fn create(state: &AppState, req: &ApiRequest) -> Result<ApiResponse> {
    let caller = authorize(state, req, "create_sample").await?;
    let input: CreateSampleInput = req.json()?;
    let created = state.records.create_sample(&caller.address, input).await?;
    ApiResponse::created(&created)
}

pub async fn list(state: &AppState, req: &ApiRequest) -> Result<ApiResponse> {
    let query: SampleQuery = req.query()?;
    ApiResponse::ok(&state.records.list_samples(&query)?)
}

pub async fn get(state: &AppState, sampling_id: &str) -> Result<ApiResponse> {
    ApiResponse::ok(&state.records.conservation_view(sampling_id).await?)
}

pub async fn verify(state: &AppState, req: &ApiRequest, sampling_id: &str) -> Result<ApiResponse> {
    let caller = authorize(state, req, "verify_sample").await?;
    let verified = state.records.verify_sample(&caller.address, sampling_id).await?;
    ApiResponse::ok(&verified)
}
