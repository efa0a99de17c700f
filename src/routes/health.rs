//! Health and version endpoints
//!
//! - /health - Liveness plus a summary of the store and the registry
//! - /version - Build metadata embedded by build.rs

use serde::Serialize;

use super::ApiResponse;
use crate::db::DbStats;
use crate::server::AppState;
use crate::types::Result;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Overall health status
    pub healthy: bool,
    /// 'online' or 'degraded'
    pub status: &'static str,
    pub version: &'static str,
    /// Uptime in seconds
    pub uptime: u64,
    pub timestamp: String,
    /// 'development' or 'production'
    pub mode: &'static str,
    pub block_number: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<DbStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionResponse {
    pub version: &'static str,
    pub git_commit: &'static str,
    pub git_commit_full: &'static str,
    pub build_timestamp: &'static str,
}

/// Always 200 while the process is serving; a failing store reports `degraded`.
pub async fn health(state: &AppState) -> Result<ApiResponse> {
    let (database, error) = match state.db.stats() {
        Ok(stats) => (Some(stats), None),
        Err(e) => (None, Some(e.to_string())),
    };

    let response = HealthResponse {
        healthy: error.is_none(),
        status: if error.is_none() { "online" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        uptime: state.started_at.elapsed().as_secs(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        mode: if state.args.dev_mode { "development" } else { "production" },
        block_number: state.chain.stats().await.map(|s| s.block_number).unwrap_or(0),
        database,
        error,
    };
    ApiResponse::ok(&response)
}

pub fn version() -> Result<ApiResponse> {
    ApiResponse::ok(&VersionResponse {
        version: env!("CARGO_PKG_VERSION"),
        git_commit: env!("GIT_COMMIT_SHORT"),
        git_commit_full: env!("GIT_COMMIT_FULL"),
        build_timestamp: env!("BUILD_TIMESTAMP"),
    })
}
