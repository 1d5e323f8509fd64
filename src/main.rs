//! RPC Endpoint Curator
//!
//! Keeps a routing proxy's registry of blockchain RPC endpoints fresh:
//! discovers candidates from seed nodes' peer-gossip lists, verifies that
//! each one is alive and on the right network, scores the survivors by
//! reliability and latency, and reconciles the result against the proxy's
//! registry: adding newly found endpoints, removing dead disabled ones,
//! never touching the whitelist.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        RPC CURATOR                           │
//! ├──────────────────────────────────────────────────────────────┤
//! │  Peer Discovery Collector ←── seeds' peer lists / directory  │
//! │  Normalizer/Deduplicator  ←── one candidate per host IP      │
//! │  Health Prober            ←── liveness + network identity    │
//! │  Performance Scorer       ←── reliability × latency ranking  │
//! │  Reconciliation Engine    ←── add/remove via proxy admin API │
//! │  Snapshot Store           ←── fallback seed set per network  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! One pass runs per network per interval; passes are idempotent and
//! stateless apart from the snapshot fallback.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

mod chain;
mod config;
mod discovery;
mod pipeline;
mod probe;
mod reconcile;
mod registry;
mod rpc;
mod snapshot;
mod types;

use config::{CuratorConfig, NetworkConfig};
use pipeline::Pipeline;
use registry::HttpRegistry;
use rpc::RpcClient;
use snapshot::SnapshotStore;

/// RPC Curator - endpoint discovery and registry reconciliation
#[derive(Parser, Debug)]
#[command(name = "rpc-curator")]
#[command(version = "0.1.0")]
#[command(about = "Discovers, verifies and scores RPC endpoints for a routing proxy", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "rpc-curator.toml")]
    config: PathBuf,

    /// Data directory for per-network snapshots
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Seconds between reconciliation passes
    #[arg(long)]
    interval: Option<u64>,

    /// Run a single pass per network and exit
    #[arg(long)]
    once: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.clone().into()),
        )
        .init();

    info!("🛰️  RPC Curator v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = if args.config.exists() {
        CuratorConfig::load(&args.config)?
    } else {
        warn!("Config file not found at {:?}, using defaults", args.config);
        CuratorConfig::default()
    };

    // Override config with CLI args
    let config = config
        .with_data_dir(args.data_dir)
        .with_run_interval(args.interval);

    config.validate()?;

    info!("⚙️  Configuration:");
    info!("   Networks: {}", config.networks.len());
    info!("   Probe timeout: {}ms", config.probe_timeout_ms);
    info!("   Score retries: {}", config.score_retries);
    info!("   Batch size: {}", config.batch_size);
    info!("   Run interval: {}s", config.run_interval_secs);
    info!("   Data dir: {:?}", config.data_dir);

    let shared_config = Arc::new(config);

    // One independent run loop per network; a failing network never takes
    // down its siblings
    let mut handles = Vec::new();
    for network in shared_config.networks.clone() {
        let config = shared_config.clone();
        let name = network.name.clone();
        let once = args.once;

        handles.push((
            name.clone(),
            tokio::spawn(async move {
                if let Err(e) = run_network(config, network, once).await {
                    error!("Network {} run loop failed: {:#}", name, e);
                }
            }),
        ));
    }

    info!("✅ All network loops started");

    if args.once {
        for (name, handle) in handles {
            if let Err(e) = handle.await {
                error!("Network {} task panicked: {}", name, e);
            }
        }
        info!("👋 Single pass complete");
        return Ok(());
    }

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("🛑 Shutdown signal received");
    info!("👋 RPC Curator shutting down");
    Ok(())
}

/// Run loop for one network: one pipeline pass per interval
async fn run_network(
    config: Arc<CuratorConfig>,
    network: NetworkConfig,
    once: bool,
) -> anyhow::Result<()> {
    network.validate()?;

    let rpc = RpcClient::new()?;
    let store = SnapshotStore::new(&config.data_dir);
    let registry = HttpRegistry::new(
        &network.proxy_url,
        &network.action_prefix,
        network.network_id,
        Duration::from_millis(config.probe_timeout_ms),
    )?;

    info!(
        "🚀 Curating {} (network id {}, {} seeds)",
        network.name,
        network.network_id,
        network.seeds.len()
    );

    let mut interval = tokio::time::interval(Duration::from_secs(config.run_interval_secs));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        interval.tick().await;

        let pipeline = Pipeline::new(&config, &network, &store, rpc.clone());
        pipeline.run(&registry).await;

        if once {
            return Ok(());
        }
    }
}
