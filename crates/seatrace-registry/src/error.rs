//! Revert reasons for registry calls

use thiserror::Error;

use crate::address::Address;
use crate::roles::Role;

/// Every rejected registry call maps to exactly one of these.
///
/// A call that returns an error has not written any state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("caller {caller} lacks required role: {}", format_roles(required))]
    Unauthorized { caller: Address, required: Vec<Role> },

    #[error("duplicate sampling ID: {0} already exists")]
    DuplicateSamplingId(String),

    #[error("duplicate product ID: {0} already exists")]
    DuplicateProductId(String),

    #[error("conservation record not found: {0}")]
    ConservationRecordNotFound(String),

    #[error("supply-chain record not found: {0}")]
    SupplyChainRecordNotFound(String),

    #[error("conservation record {0} is already verified")]
    AlreadyVerified(String),

    #[error("caller {caller} is not the creator of product {product_id}")]
    NotRecordCreator { caller: Address, product_id: String },

    #[error("the registry owner cannot lose the admin role")]
    OwnerLockout,

    #[error("{address} does not hold role {role}")]
    RoleNotGranted { address: Address, role: Role },

    #[error("field '{0}' must not be empty")]
    EmptyField(&'static str),

    #[error("field '{field}' exceeds {max} characters")]
    FieldTooLong { field: &'static str, max: usize },

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("unknown role: {0}")]
    UnknownRole(String),

    #[error("unknown source type: {0}")]
    UnknownSourceType(String),
}

fn format_roles(roles: &[Role]) -> String {
    roles
        .iter()
        .map(|r| r.as_str())
        .collect::<Vec<_>>()
        .join(" | ")
}

/// Result type alias for registry operations
pub type Result<T> = std::result::Result<T, RegistryError>;
