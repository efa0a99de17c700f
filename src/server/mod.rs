//! HTTP server and shared state

pub mod http;

use std::sync::Arc;
use std::time::Instant;

use crate::auth::{ChallengeStore, JwtValidator};
use crate::chain::ChainClient;
use crate::config::Args;
use crate::db::Database;
use crate::services::{RecordService, RoleService};
use crate::types::{GatewayError, Result};

pub use http::run;

/// Shared application state
pub struct AppState {
    pub args: Args,
    pub db: Arc<Database>,
    /// Registry host; roles are always read from here
    pub chain: Arc<dyn ChainClient>,
    pub jwt: JwtValidator,
    /// Outstanding sign-in challenges
    pub challenges: Arc<ChallengeStore>,
    pub records: RecordService,
    pub roles: RoleService,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(args: Args, db: Arc<Database>, chain: Arc<dyn ChainClient>) -> Result<Self> {
        let secret = args
            .jwt_secret()
            .ok_or_else(|| GatewayError::Config("JWT_SECRET is required in production mode".into()))?;
        let jwt = JwtValidator::new(secret, args.jwt_expiry_seconds)?;
        let challenges = Arc::new(ChallengeStore::new(args.app_name.clone(), args.challenge_ttl_seconds));

        Ok(Self {
            records: RecordService::new(Arc::clone(&db), Arc::clone(&chain)),
            roles: RoleService::new(Arc::clone(&db), Arc::clone(&chain)),
            args,
            db,
            chain,
            jwt,
            challenges,
            started_at: Instant::now(),
        })
    }
}
