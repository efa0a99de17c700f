//! SeaTrace - seafood traceability gateway
//!
//! Hosts the role-gated traceability registry and everything around it:
//! wallet sign-in, user profiles, role applications, and the off-chain
//! documents whose hashes the registry anchors.
//!
//! ## Architecture
//!
//! ```text
//! client ──HTTP──▶ routes ──▶ services ──┬──▶ chain (registry host) ──▶ seatrace-registry
//!                                        └──▶ db (SQLite: users, applications, documents, journey)
//! ```

pub mod auth;
pub mod chain;
pub mod config;
pub mod db;
pub mod logging;
pub mod routes;
pub mod server;
pub mod services;
pub mod types;

pub use config::Args;
pub use server::AppState;
pub use types::{GatewayError, Result};
