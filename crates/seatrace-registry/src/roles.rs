//! Role registry
//!
//! Maps wallet addresses to the set of roles granted to them. The deploying
//! address is the owner: it always passes admin checks and the revocation
//! path refuses to take its admin role away.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use crate::address::Address;
use crate::error::{RegistryError, Result};

/// Named permissions checked by registry calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Researcher,
    Fisher,
    Farmer,
    Processor,
    Distributor,
    Retailer,
}

/// Roles that may register a new product at its source
pub const PRODUCER_ROLES: [Role; 2] = [Role::Fisher, Role::Farmer];

/// Roles that may move a product along the supply chain
pub const SUPPLY_CHAIN_ROLES: [Role; 5] = [
    Role::Fisher,
    Role::Farmer,
    Role::Processor,
    Role::Distributor,
    Role::Retailer,
];

pub const ALL_ROLES: [Role; 7] = [
    Role::Admin,
    Role::Researcher,
    Role::Fisher,
    Role::Farmer,
    Role::Processor,
    Role::Distributor,
    Role::Retailer,
];

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Researcher => "researcher",
            Role::Fisher => "fisher",
            Role::Farmer => "farmer",
            Role::Processor => "processor",
            Role::Distributor => "distributor",
            Role::Retailer => "retailer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = RegistryError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        ALL_ROLES
            .iter()
            .copied()
            .find(|r| r.as_str() == lower)
            // Frontends historically sent "fisherman"
            .or_else(|| (lower == "fisherman").then_some(Role::Fisher))
            .ok_or_else(|| RegistryError::UnknownRole(s.to_string()))
    }
}

/// Address → granted roles, plus the immutable owner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleBook {
    owner: Address,
    grants: BTreeMap<Address, BTreeSet<Role>>,
}

impl RoleBook {
    pub fn new(owner: Address) -> Self {
        let mut grants = BTreeMap::new();
        grants.insert(owner.clone(), BTreeSet::from([Role::Admin]));
        Self { owner, grants }
    }

    pub fn owner(&self) -> &Address {
        &self.owner
    }

    /// Whether `address` holds `role`. The owner always holds `Admin`.
    pub fn has_role(&self, address: &Address, role: Role) -> bool {
        if role == Role::Admin && *address == self.owner {
            return true;
        }
        self.grants
            .get(address)
            .map(|set| set.contains(&role))
            .unwrap_or(false)
    }

    pub fn is_admin(&self, address: &Address) -> bool {
        self.has_role(address, Role::Admin)
    }

    /// Allow if `caller` is an admin or holds any of `accepted`, otherwise deny with an error.
    pub fn require_any(&self, caller: &Address, accepted: &[Role]) -> Result<()> {
        if self.is_admin(caller) || accepted.iter().any(|r| self.has_role(caller, *r)) {
            return Ok(());
        }
        let mut required = vec![Role::Admin];
        required.extend(accepted.iter().copied().filter(|r| *r != Role::Admin));
        Err(RegistryError::Unauthorized {
            caller: caller.clone(),
            required,
        })
    }

    pub fn require_admin(&self, caller: &Address) -> Result<()> {
        self.require_any(caller, &[])
    }

    /// Returns true when the role was newly granted.
    pub(crate) fn grant(&mut self, target: &Address, role: Role) -> bool {
        self.grants.entry(target.clone()).or_default().insert(role)
    }

    /// Check a revocation without applying it.
    pub(crate) fn check_revoke(&self, target: &Address, role: Role) -> Result<()> {
        if role == Role::Admin && *target == self.owner {
            return Err(RegistryError::OwnerLockout);
        }
        if !self.has_role(target, role) {
            return Err(RegistryError::RoleNotGranted {
                address: target.clone(),
                role,
            });
        }
        Ok(())
    }

    pub(crate) fn revoke(&mut self, target: &Address, role: Role) -> Result<()> {
        self.check_revoke(target, role)?;
        if let Some(set) = self.grants.get_mut(target) {
            set.remove(&role);
            if set.is_empty() {
                self.grants.remove(target);
            }
        }
        Ok(())
    }

    /// Roles held by an address, owner admin included.
    pub fn roles_of(&self, address: &Address) -> Vec<Role> {
        let mut roles: BTreeSet<Role> = self.grants.get(address).cloned().unwrap_or_default();
        if *address == self.owner {
            roles.insert(Role::Admin);
        }
        roles.into_iter().collect()
    }

    /// Number of addresses holding at least one role.
    pub fn holder_count(&self) -> usize {
        self.grants.len()
    }
}
