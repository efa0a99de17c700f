//! Workflows that combine the registry with the off-chain store

pub mod content_hash;
pub mod records;
pub mod roles;

pub use records::RecordService;
pub use roles::RoleService;
