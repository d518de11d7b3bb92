mod api;
mod constants;

use std::{net::SocketAddr, sync::Arc};

use clap::Parser;
use civic_core::constants::DEFAULT_DIFFICULTY;
use civic_core::{CancelToken, Difficulty, Ledger, LedgerConfig};
use civic_storage::SledStore;
use tracing::{info, warn, Level};

use crate::api::{router, AppState};
use crate::constants::{DEFAULT_DATA_DIR, DEFAULT_LISTEN_ADDR};

#[derive(Parser, Debug)]
#[command(name = "civic-node", about = "HTTP node serving a civic payments ledger")]
struct Args {
    /// Address to listen on, e.g. 127.0.0.1:8080
    #[arg(long, default_value = DEFAULT_LISTEN_ADDR)]
    listen: String,

    /// Data directory for sled
    #[arg(long, default_value = DEFAULT_DATA_DIR)]
    data_dir: String,

    /// Leading zero hex digits every block hash must carry
    #[arg(long, default_value_t = DEFAULT_DIFFICULTY)]
    difficulty: u32,

    /// Give up mining a block after this many nonces
    #[arg(long)]
    max_attempts: Option<u64>,

    /// Search nonces on all cores
    #[arg(long)]
    parallel: bool,
}

impl Args {
    fn ledger_config(&self) -> anyhow::Result<LedgerConfig> {
        Ok(LedgerConfig {
            difficulty: Difficulty::new(self.difficulty)?,
            max_attempts: self.max_attempts.unwrap_or(u64::MAX),
            parallel: self.parallel,
        })
    }
}

async fn shutdown_signal(cancel: CancelToken) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested, cancelling in-flight mining");
    cancel.cancel();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = args.ledger_config()?;
    let store = Arc::new(SledStore::open(&args.data_dir)?);
    let ledger = Arc::new(Ledger::new(Arc::clone(&store), config));
    if let Some(tip) = ledger.tip()? {
        info!(index = tip.index, hash = %tip.hash_hex(), "resuming chain");
    }

    let cancel = ledger.cancel_token();
    let app = router(AppState { ledger });

    let addr: SocketAddr = args.listen.parse()?;
    info!(difficulty = args.difficulty, "civic-node listening on http://{addr}");
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .with_graceful_shutdown(shutdown_signal(cancel))
        .await?;

    store.close()?;
    info!("civic-node stopped");
    Ok(())
}
