//! Permission levels and the operation table for gateway endpoints
//!
//! The registry is the authority for record calls; this table lets the
//! gateway refuse early (before touching the database) and is the only gate
//! for purely off-chain operations such as reviewing role applications.

use seatrace_registry::{Role, PRODUCER_ROLES, SUPPLY_CHAIN_ROLES};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Permission levels for gateway operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
#[repr(u8)]
pub enum PermissionLevel {
    /// No authentication - read-only operations
    #[default]
    Public = 0,
    /// Signed-in wallet
    Authenticated = 1,
    /// Holder of the registry admin role
    Admin = 2,
}

impl PermissionLevel {
    /// Level implied by the roles an address currently holds on chain
    pub fn from_roles(roles: &[Role]) -> Self {
        if roles.contains(&Role::Admin) {
            PermissionLevel::Admin
        } else {
            PermissionLevel::Authenticated
        }
    }
}

impl fmt::Display for PermissionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PermissionLevel::Public => write!(f, "PUBLIC"),
            PermissionLevel::Authenticated => write!(f, "AUTHENTICATED"),
            PermissionLevel::Admin => write!(f, "ADMIN"),
        }
    }
}

/// Get the required permission level for a gateway operation.
/// Returns None for unknown operations (which should be blocked).
pub fn get_required_permission(operation: &str) -> Option<PermissionLevel> {
    match operation {
        // Public - lookups and the consumer-facing trace view
        "get_sample"
        | "list_samples"
        | "get_product"
        | "list_products"
        | "get_journey"
        | "trace_product"
        | "get_user"
        | "chain_stats"
        | "get_receipt" => Some(PermissionLevel::Public),

        // Authenticated - own profile, applications, role-gated record writes
        "get_profile"
        | "update_profile"
        | "submit_application"
        | "list_applications"
        | "create_sample"
        | "create_product"
        | "update_stage" => Some(PermissionLevel::Authenticated),

        // Admin - verification and role management
        "verify_sample"
        | "approve_application"
        | "reject_application"
        | "grant_role"
        | "revoke_role" => Some(PermissionLevel::Admin),

        // Unknown operations are blocked
        _ => None,
    }
}

/// Roles (any one of) required on top of the permission level. Admins always pass.
pub fn get_required_roles(operation: &str) -> &'static [Role] {
    match operation {
        "create_sample" => &[Role::Researcher],
        "create_product" => &PRODUCER_ROLES,
        "update_stage" => &SUPPLY_CHAIN_ROLES,
        _ => &[],
    }
}

/// Check if an operation is allowed for the given permission level and held roles
pub fn is_operation_allowed(operation: &str, level: PermissionLevel, roles: &[Role]) -> bool {
    let Some(required) = get_required_permission(operation) else {
        return false;
    };
    if level < required {
        return false;
    }
    if level == PermissionLevel::Admin {
        return true;
    }
    let needed = get_required_roles(operation);
    needed.is_empty() || needed.iter().any(|r| roles.contains(r))
}

/// Get a human-readable description of an operation for logging
pub fn get_operation_description(operation: &str) -> &'static str {
    match operation {
        "get_sample" => "Get conservation sample",
        "list_samples" => "List conservation samples",
        "get_product" => "Get product",
        "list_products" => "List products",
        "get_journey" => "Get product journey",
        "trace_product" => "Trace product",
        "get_user" => "Get public profile",
        "chain_stats" => "Registry statistics",
        "get_receipt" => "Get transaction receipt",

        "get_profile" => "Get own profile",
        "update_profile" => "Update own profile",
        "submit_application" => "Apply for a role",
        "list_applications" => "List role applications",
        "create_sample" => "Create conservation sample",
        "create_product" => "Register product",
        "update_stage" => "Update product stage",

        "verify_sample" => "Verify conservation sample",
        "approve_application" => "Approve role application",
        "reject_application" => "Reject role application",
        "grant_role" => "Grant role",
        "revoke_role" => "Revoke role",

        _ => "Unknown operation",
    }
}
