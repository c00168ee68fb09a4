use anyhow::{Context, Result};
use bigdecimal::BigDecimal;
use clap::Parser;
use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use filnet_sim::simulator::{
    cli::SimulationReporter,
    network::{MemoryNetwork, Network},
    shared::{DirectoryFiles, EventSink},
    SimulationConfig, SimulationEngine,
};

#[derive(Parser, Debug)]
#[command(name = "Simulator CLI")]
#[command(about = "Grow a storage network and drive random economic traffic through it", long_about = None)]
struct Args {
    /// JSON configuration file; flags below override its values
    #[arg(long, short = 'c', env = "SIM_CONFIG")]
    config: Option<PathBuf>,

    /// Nodes started before the network begins to grow (default: 5)
    #[arg(long, env = "SIM_START_NODES")]
    start_nodes: Option<usize>,

    /// Population cap (default: 30)
    #[arg(long, env = "SIM_MAX_NODES")]
    max_nodes: Option<usize>,

    /// Maximum miners drawn per epoch (default: 1)
    #[arg(long, env = "SIM_FORK_BRANCHING")]
    fork_branching: Option<usize>,

    /// Chance a drawn miner mines in an epoch (default: 1.0)
    #[arg(long, env = "SIM_FORK_PROBABILITY")]
    fork_probability: Option<f64>,

    /// Milliseconds between node joins (default: 3000)
    #[arg(long, env = "SIM_JOIN_TIME_MS")]
    join_time_ms: Option<u64>,

    /// Milliseconds between mining epochs (default: 2000)
    #[arg(long, env = "SIM_BLOCK_TIME_MS")]
    block_time_ms: Option<u64>,

    /// Milliseconds between random actions (default: 1000)
    #[arg(long, env = "SIM_ACTION_TIME_MS")]
    action_time_ms: Option<u64>,

    /// Directory deal payloads are drawn from
    #[arg(long, env = "SIM_TEST_FILES_DIR")]
    test_files_dir: Option<PathBuf>,

    #[arg(long, env = "SIM_ASK")]
    ask: Option<bool>,

    #[arg(long, env = "SIM_BID")]
    bid: Option<bool>,

    #[arg(long, env = "SIM_DEAL")]
    deal: Option<bool>,

    #[arg(long, env = "SIM_PAYMENT")]
    payment: Option<bool>,

    #[arg(long, env = "SIM_MINE")]
    mine: Option<bool>,

    /// Base directory for node repositories (default: system temp dir)
    #[arg(long, env = "SIM_REPO_DIR")]
    repo_dir: Option<PathBuf>,

    /// Balance credited to every new node wallet
    #[arg(long, env = "SIM_INITIAL_BALANCE", default_value_t = 100_000)]
    initial_balance: u64,

    /// Reward credited per mined block
    #[arg(long, env = "SIM_BLOCK_REWARD", default_value_t = 1_000)]
    block_reward: u64,

    /// Stop after this many seconds instead of waiting for Ctrl-C
    #[arg(long, env = "SIM_DURATION_SECS")]
    duration_secs: Option<u64>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(long)]
    debug: bool,
}

impl Args {
    fn to_simulation_config(&self) -> Result<SimulationConfig> {
        let mut config = match &self.config {
            Some(path) => SimulationConfig::from_json_file(path)?,
            None => SimulationConfig::default(),
        };

        if let Some(start_nodes) = self.start_nodes {
            config.start_nodes = start_nodes;
        }
        if let Some(max_nodes) = self.max_nodes {
            config.max_nodes = max_nodes;
        }
        if let Some(fork_branching) = self.fork_branching {
            config.fork_branching = fork_branching;
        }
        if let Some(fork_probability) = self.fork_probability {
            config.fork_probability = fork_probability;
        }
        if let Some(ms) = self.join_time_ms {
            config.join_time = Duration::from_millis(ms);
        }
        if let Some(ms) = self.block_time_ms {
            config.block_time = Duration::from_millis(ms);
        }
        if let Some(ms) = self.action_time_ms {
            config.action_time = Duration::from_millis(ms);
        }
        if let Some(dir) = &self.test_files_dir {
            config.test_files_dir = Some(dir.clone());
        }

        let toggles = &mut config.actions;
        toggles.ask = self.ask.unwrap_or(toggles.ask);
        toggles.bid = self.bid.unwrap_or(toggles.bid);
        toggles.deal = self.deal.unwrap_or(toggles.deal);
        toggles.payment = self.payment.unwrap_or(toggles.payment);
        toggles.mine = self.mine.unwrap_or(toggles.mine);

        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenv();
    let args = Args::parse();

    let default_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(env::var("RUST_LOG").unwrap_or_else(|_| default_level.to_string()).as_str())
        .init();

    let config = args.to_simulation_config()?;
    let repo_dir = args
        .repo_dir
        .clone()
        .unwrap_or_else(|| env::temp_dir().join("filnet-sim"));
    tracing::info!(repo_dir = %repo_dir.display(), "using node repository base");

    let network = Arc::new(MemoryNetwork::new(
        repo_dir,
        BigDecimal::from(args.initial_balance),
        BigDecimal::from(args.block_reward),
    ));
    let (events, rx) = EventSink::channel();
    let reporter = tokio::spawn(SimulationReporter::new(rx).run());

    let engine = SimulationEngine::new(config, network.clone(), Arc::new(DirectoryFiles), events)
        .context("Invalid simulation configuration")?;

    let cancel = CancellationToken::new();
    let handle = engine.start(cancel.clone());

    match args.duration_secs {
        Some(secs) => {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(secs)) => {
                    tracing::info!(secs, "run duration elapsed, stopping");
                }
                _ = tokio::signal::ctrl_c() => tracing::info!("interrupted, stopping"),
            }
        }
        None => {
            tokio::signal::ctrl_c().await.context("Failed to listen for Ctrl-C")?;
            tracing::info!("interrupted, stopping");
        }
    }

    handle.cancel();
    handle.join().await?;

    let stats = reporter.await.context("Reporter task panicked")?;
    stats.print_summary();
    println!(
        "Final network: {} nodes, {} connections, {} deals",
        network.size(),
        network.connection_count(),
        network.ledger().deals().len()
    );

    Ok(())
}
