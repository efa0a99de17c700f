//! Error types for the gateway

use hyper::StatusCode;
use seatrace_registry::RegistryError;

/// Main error type for gateway operations
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Method not allowed: {0}")]
    MethodNotAllowed(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// A registry transaction was reverted
    #[error("Transaction reverted: {0}")]
    Reverted(RegistryError),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication error: {0}")]
    Auth(String),
}

impl GatewayError {
    /// Convert error to HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Reverted(e) => revert_status(e),
            Self::Database(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Auth(_) => StatusCode::UNAUTHORIZED,
        }
    }

    /// Stable machine-readable code for the JSON error body
    pub fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::NotFound(_) => "NOT_FOUND",
            Self::MethodNotAllowed(_) => "METHOD_NOT_ALLOWED",
            Self::Conflict(_) => "CONFLICT",
            Self::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            Self::Reverted(e) => revert_code(e),
            Self::Database(_) => "DATABASE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Auth(_) => "AUTH_ERROR",
        }
    }
}

fn revert_status(err: &RegistryError) -> StatusCode {
    match err {
        RegistryError::Unauthorized { .. } | RegistryError::NotRecordCreator { .. } => {
            StatusCode::FORBIDDEN
        }
        RegistryError::DuplicateSamplingId(_)
        | RegistryError::DuplicateProductId(_)
        | RegistryError::AlreadyVerified(_)
        | RegistryError::OwnerLockout
        | RegistryError::RoleNotGranted { .. } => StatusCode::CONFLICT,
        RegistryError::ConservationRecordNotFound(_) | RegistryError::SupplyChainRecordNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        RegistryError::EmptyField(_)
        | RegistryError::FieldTooLong { .. }
        | RegistryError::InvalidAddress(_)
        | RegistryError::UnknownRole(_)
        | RegistryError::UnknownSourceType(_) => StatusCode::BAD_REQUEST,
    }
}

fn revert_code(err: &RegistryError) -> &'static str {
    match err {
        RegistryError::Unauthorized { .. } => "MISSING_ROLE",
        RegistryError::NotRecordCreator { .. } => "NOT_CREATOR",
        RegistryError::DuplicateSamplingId(_) | RegistryError::DuplicateProductId(_) => "DUPLICATE_ID",
        RegistryError::AlreadyVerified(_) => "ALREADY_VERIFIED",
        RegistryError::OwnerLockout => "OWNER_LOCKOUT",
        RegistryError::RoleNotGranted { .. } => "ROLE_NOT_GRANTED",
        RegistryError::ConservationRecordNotFound(_) | RegistryError::SupplyChainRecordNotFound(_) => {
            "RECORD_NOT_FOUND"
        }
        _ => "INVALID_INPUT",
    }
}

// Implement From conversions for common error types

impl From<RegistryError> for GatewayError {
    fn from(err: RegistryError) -> Self {
        Self::Reverted(err)
    }
}

impl From<std::io::Error> for GatewayError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        Self::BadRequest(format!("JSON error: {}", err))
    }
}

impl From<hyper::Error> for GatewayError {
    fn from(err: hyper::Error) -> Self {
        Self::Internal(format!("HTTP error: {}", err))
    }
}

impl From<rusqlite::Error> for GatewayError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for GatewayError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        Self::Unauthorized(format!("JWT error: {}", err))
    }
}

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;
