//! SeaTrace gateway binary

use clap::Parser;
use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use std::sync::Arc;
use tracing::{error, info, warn};

use seatrace::{
    chain::{ChainClient, LocalChain},
    config::Args,
    db::{snapshot, Database},
    logging, server, AppState,
};
use seatrace_registry::Address;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    logging::init(&args.log_level, args.log_json);

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  SeaTrace - Seafood Traceability");
    info!("======================================");
    info!("Listen: {}", args.listen);
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    info!("Database: {}", args.database_path.display());
    info!("Stage updates: {:?}", args.stage_update_policy);
    info!("======================================");

    let db = if args.is_in_memory_db() {
        warn!("Using an in-memory database; all records are lost on exit");
        Arc::new(Database::open_in_memory()?)
    } else {
        Arc::new(Database::open(&args.database_path)?)
    };

    let mut admin = args.admin().map_err(anyhow::Error::msg)?;
    if admin.is_none() && db.with_conn(snapshot::load_snapshot)?.is_none() {
        // Only reachable in dev mode; validate() requires ADMIN_ADDRESS otherwise
        let key = SigningKey::generate(&mut OsRng);
        let address = Address::from_key_bytes(&key.verifying_key().to_bytes());
        warn!("No ADMIN_ADDRESS set; generated a development admin wallet");
        warn!("  address: {}", address);
        warn!("  secret key: {}", hex::encode(key.to_bytes()));
        admin = Some(address);
    }

    let chain = Arc::new(LocalChain::open(
        Arc::clone(&db),
        admin.as_ref(),
        args.stage_update_policy.into(),
    )?);
    info!("Registry owner: {}", chain.owner().await);
    info!("Block height: {}", chain.block_number().await);

    let state = Arc::new(AppState::new(args, db, chain)?);
    server::run(state).await?;

    Ok(())
}
