//! SeaTrace Registry
//!
//! A role-gated registry that timestamps hashes of off-chain seafood records.
//! It plays the part of an on-chain contract: the host (see the `seatrace`
//! gateway) feeds it one call at a time, in order, and persists its state.
//!
//! ## Records
//!
//! - **ConservationRecord**: a researcher's sampling record, verified once by an admin
//! - **SupplyChainRecord**: a product registered by a producer whose current
//!   stage is overwritten as it moves through the supply chain
//!
//! ## Roles
//!
//! The deploying address owns the registry and can never lose its admin
//! role. Admins grant and revoke the other roles:
//!
//! | Role | May |
//! |------|-----|
//! | admin | everything, including verification and role management |
//! | researcher | create conservation records |
//! | fisher, farmer | create and update supply-chain records |
//! | processor, distributor, retailer | update supply-chain records |

pub mod address;
pub mod call;
pub mod error;
pub mod records;
pub mod registry;
pub mod roles;
pub mod validation;

pub use address::Address;
pub use call::{CallOutcome, RegistryCall, TxContext};
pub use error::{RegistryError, Result};
pub use records::{ConservationRecord, RegistryStats, SourceType, SupplyChainRecord};
pub use registry::{Registry, StageUpdatePolicy};
pub use roles::{Role, RoleBook, ALL_ROLES, PRODUCER_ROLES, SUPPLY_CHAIN_ROLES};
