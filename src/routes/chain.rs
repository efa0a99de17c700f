//! Registry inspection routes

use super::ApiResponse;
use crate::server::AppState;
use crate::types::{GatewayError, Result};

pub async fn stats(state: &AppState) -> Result<ApiResponse> {
    ApiResponse::ok(&state.chain.stats().await?)
}

pub async fn receipt(state: &AppState, tx_hash: &str) -> Result<ApiResponse> {
    let hash = tx_hash.trim().to_ascii_lowercase();
    match state.chain.receipt(&hash).await? {
        Some(receipt) => ApiResponse::ok(&receipt),
        None => Err(GatewayError::NotFound(format!("Transaction {}", hash))),
    }
}
