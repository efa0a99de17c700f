//! Product, journey and trace routes

use serde::Serialize;

use super::{authorize, ApiRequest, ApiResponse};
use crate::db::products::{JourneyEvent, ProductQuery};
use crate::server::AppState;
use crate::services::records::{CreateProductInput, UpdateStageInput};
use crate::types::Result;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct JourneyResponse<'a> {
    product_id: &'a str,
    events: Vec<JourneyEvent>,
}

pub async fn create(state: &AppState, req: &ApiRequest) -> Result<ApiResponse> {
    let caller = authorize(state, req, "create_product").await?;
    let input: CreateProductInput = req.json()?;
    let created = state.records.create_product(&caller.address, input).await?;
    ApiResponse::created(&created)
}

pub async fn list(state: &AppState, req: &ApiRequest) -> Result<ApiResponse> {
    let query: ProductQuery = req.query()?;
    ApiResponse::ok(&state.records.list_products(&query)?)
}

pub async fn get(state: &AppState, product_id: &str) -> Result<ApiResponse> {
    ApiResponse::ok(&state.records.product_view(product_id).await?)
}

pub async fn journey(state: &AppState, product_id: &str) -> Result<ApiResponse> {
    let events = state.records.journey(product_id).await?;
    ApiResponse::ok(&JourneyResponse {
        product_id: product_id.trim(),
        events,
    })
}

pub async fn update_stage(state: &AppState, req: &ApiRequest, product_id: &str) -> Result<ApiResponse> {
    let caller = authorize(state, req, "update_stage").await?;
    let input: UpdateStageInput = req.json()?;
    let updated = state.records.update_stage(&caller.address, product_id, input).await?;
    ApiResponse::ok(&updated)
}

pub async fn trace(state: &AppState, product_id: &str) -> Result<ApiResponse> {
    ApiResponse::ok(&state.records.trace(product_id).await?)
}
