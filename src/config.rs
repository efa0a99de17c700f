//! Configuration for the SeaTrace gateway
//!
//! CLI arguments and environment variable handling using clap.

use clap::{Parser, ValueEnum};
use seatrace_registry::{Address, StageUpdatePolicy};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Minimum JWT secret length accepted outside dev mode
pub const MIN_JWT_SECRET_LEN: usize = 32;

/// SeaTrace - seafood traceability gateway
#[derive(Parser, Debug, Clone)]
#[command(name = "seatrace")]
#[command(about = "Seafood traceability gateway: wallet auth, off-chain records, registry host")]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// SQLite database file (":memory:" for an ephemeral store)
    #[arg(long, env = "DATABASE_PATH", default_value = "seatrace.db")]
    pub database_path: PathBuf,

    /// Enable development mode (insecure JWT secret default, generated admin)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// JWT secret for token signing (required in production)
    #[arg(long, env = "JWT_SECRET")]
    pub jwt_secret: Option<String>,

    /// JWT token expiry in seconds
    #[arg(long, env = "JWT_EXPIRY_SECONDS", default_value = "3600")]
    pub jwt_expiry_seconds: u64,

    /// Wallet address that deploys and owns the registry (required in production)
    #[arg(long, env = "ADMIN_ADDRESS")]
    pub admin_address: Option<String>,

    /// Lifetime of a sign-in challenge in seconds
    #[arg(long, env = "CHALLENGE_TTL_SECONDS", default_value = "300")]
    pub challenge_ttl_seconds: u64,

    /// Who may update the stage of an existing product
    #[arg(long, env = "STAGE_UPDATE_POLICY", value_enum, default_value = "any-role-holder")]
    pub stage_update_policy: StagePolicyArg,

    /// Application name shown in the sign-in message
    #[arg(long, env = "APP_NAME", default_value = "SeaTrace")]
    pub app_name: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, env = "LOG_JSON", default_value = "false")]
    pub log_json: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagePolicyArg {
    AnyRoleHolder,
    CreatorOnly,
}

impl From<StagePolicyArg> for StageUpdatePolicy {
    fn from(arg: StagePolicyArg) -> Self {
        match arg {
            StagePolicyArg::AnyRoleHolder => StageUpdatePolicy::AnyRoleHolder,
            StagePolicyArg::CreatorOnly => StageUpdatePolicy::CreatorOnly,
        }
    }
}

impl Args {
    /// Get effective JWT secret (uses default in dev mode)
    pub fn jwt_secret(&self) -> Option<String> {
        match (&self.jwt_secret, self.dev_mode) {
            (Some(secret), _) => Some(secret.clone()),
            (None, true) => Some("dev-only-insecure-secret-for-local-testing".to_string()),
            (None, false) => None,
        }
    }

    /// Parsed registry owner address, if configured
    pub fn admin(&self) -> Result<Option<Address>, String> {
        self.admin_address
            .as_deref()
            .map(|raw| Address::parse(raw).map_err(|e| format!("ADMIN_ADDRESS: {}", e)))
            .transpose()
    }

    pub fn is_in_memory_db(&self) -> bool {
        self.database_path.as_os_str() == ":memory:"
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.dev_mode {
            match &self.jwt_secret {
                None => return Err("JWT_SECRET is required in production mode".to_string()),
                Some(s) if s.len() < MIN_JWT_SECRET_LEN => {
                    return Err(format!(
                        "JWT_SECRET must be at least {} characters",
                        MIN_JWT_SECRET_LEN
                    ))
                }
                Some(_) => {}
            }
            if self.admin_address.is_none() {
                return Err("ADMIN_ADDRESS is required in production mode".to_string());
            }
        }

        self.admin()?;

        if self.challenge_ttl_seconds == 0 {
            return Err("CHALLENGE_TTL_SECONDS must be greater than zero".to_string());
        }

        if self.jwt_expiry_seconds == 0 {
            return Err("JWT_EXPIRY_SECONDS must be greater than zero".to_string());
        }

        Ok(())
    }
}
