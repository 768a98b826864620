//! # Civic-Ledger Node
//!
//! Binary entry point. Everything interesting lives in the library
//! crate; this file only parses the environment, sets up logging, and
//! hands control to [`NodeRuntime`].
//!
//! ## Usage
//!
//! ```text
//! civic-ledger                  # run a node (CL_CONFIG names the file)
//! civic-ledger keygen FILE      # create or read a seed, print its key
//! ```

use anyhow::{bail, Context, Result};
use cl_01_signer::adapters::FileSeedStore;
use cl_01_signer::KeyStore;
use node_runtime::{NodeConfig, NodeRuntime};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).init();
}

/// Create the seed file if missing and print the public key, for pasting
/// into another node's genesis roster.
async fn keygen(path: &str) -> Result<()> {
    let store = FileSeedStore::new(path);
    let keypair = store.load_or_generate().await.context("preparing the seed file")?;
    println!("{}", keypair.public_key_hex());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let mut args = std::env::args().skip(1);
    if let Some(command) = args.next() {
        return match command.as_str() {
            "keygen" => {
                let path = args.next().unwrap_or_else(|| "signer.seed".into());
                keygen(&path).await
            }
            other => bail!("unknown command {other:?} (supported: keygen <seed-file>)"),
        };
    }

    let config = NodeConfig::from_env().context("loading configuration")?;
    let runtime = NodeRuntime::build(config).await?;
    runtime.start().await?;

    info!("Node is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    runtime.shutdown().await;
    Ok(())
}
