//! Tally daemon: entry point for running a ledger node.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;

use tally_node::{init_logging, ClaimPolicy, LedgerNode, LogFormat, NodeConfig, ShutdownController};
use tally_rpc::RpcServer;
use tally_types::KeyMode;

#[derive(Parser)]
#[command(name = "tally-daemon", about = "Tally ledger node daemon")]
struct Cli {
    /// Address the HTTP API listens on, e.g. "0.0.0.0:3500".
    #[arg(long, env = "TALLY_LISTEN_ADDR")]
    listen_addr: Option<String>,

    /// Milliseconds between verification ticks.
    #[arg(long, env = "TALLY_VERIFICATION_INTERVAL_MS")]
    verification_interval_ms: Option<u64>,

    /// Workers spawned per verification tick.
    #[arg(long, env = "TALLY_VERIFICATION_WORKERS")]
    verification_workers: Option<usize>,

    /// Milliseconds between transaction ticks.
    #[arg(long, env = "TALLY_TRANSACTION_INTERVAL_MS")]
    transaction_interval_ms: Option<u64>,

    /// Workers spawned per transaction tick.
    #[arg(long, env = "TALLY_TRANSACTION_WORKERS")]
    transaction_workers: Option<usize>,

    /// How workers claim queued items: "guaranteed" or "best_effort".
    #[arg(long, env = "TALLY_CLAIM_POLICY")]
    claim_policy: Option<String>,

    /// How pending transactions are keyed: "pair" or "request".
    #[arg(long, env = "TALLY_KEY_MODE")]
    key_mode: Option<String>,

    /// Balance given to every new user.
    #[arg(long, env = "TALLY_INITIAL_BALANCE")]
    initial_balance: Option<i64>,

    /// Log output format: "human" or "json".
    #[arg(long, env = "TALLY_LOG_FORMAT")]
    log_format: Option<String>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "TALLY_LOG_LEVEL")]
    log_level: Option<String>,

    /// Disable the Prometheus metrics endpoint.
    #[arg(long, env = "TALLY_DISABLE_METRICS")]
    disable_metrics: bool,

    /// Path to a TOML configuration file. If provided, file settings
    /// are used as the base; CLI flags and env vars override them.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Subcommand.
    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Node operations.
    #[command(name = "node")]
    Node {
        #[command(subcommand)]
        action: NodeAction,
    },
    /// Configuration helpers.
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Subcommand)]
enum NodeAction {
    /// Run the node.
    Run,
}

#[derive(clap::Subcommand)]
enum ConfigAction {
    /// Print the effective configuration as TOML.
    Dump,
}

fn parse_claim_policy(s: &str) -> anyhow::Result<ClaimPolicy> {
    match s.to_lowercase().as_str() {
        "guaranteed" => Ok(ClaimPolicy::Guaranteed),
        "best_effort" | "best-effort" => Ok(ClaimPolicy::BestEffort),
        other => bail!("unknown claim policy {other:?} (expected guaranteed or best_effort)"),
    }
}

fn parse_key_mode(s: &str) -> anyhow::Result<KeyMode> {
    match s.to_lowercase().as_str() {
        "pair" => Ok(KeyMode::Pair),
        "request" => Ok(KeyMode::Request),
        other => bail!("unknown key mode {other:?} (expected pair or request)"),
    }
}

/// File settings (or defaults) overridden by whatever the CLI sets.
fn build_config(cli: &Cli) -> anyhow::Result<NodeConfig> {
    let mut config = match &cli.config {
        Some(path) => NodeConfig::from_toml_file(&path.to_string_lossy())
            .with_context(|| format!("failed to load config file {}", path.display()))?,
        None => NodeConfig::default(),
    };

    if let Some(addr) = &cli.listen_addr {
        config.listen_addr = addr.clone();
    }
    if let Some(ms) = cli.verification_interval_ms {
        config.verification.interval_ms = ms;
    }
    if let Some(n) = cli.verification_workers {
        config.verification.workers = n;
    }
    if let Some(ms) = cli.transaction_interval_ms {
        config.transaction.interval_ms = ms;
    }
    if let Some(n) = cli.transaction_workers {
        config.transaction.workers = n;
    }
    if let Some(policy) = &cli.claim_policy {
        config.claim_policy = parse_claim_policy(policy)?;
    }
    if let Some(mode) = &cli.key_mode {
        config.key_mode = parse_key_mode(mode)?;
    }
    if let Some(balance) = cli.initial_balance {
        config.initial_balance = balance;
    }
    if let Some(format) = &cli.log_format {
        config.log_format = format.clone();
    }
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    if cli.disable_metrics {
        config.enable_metrics = false;
    }

    config.validate()?;
    Ok(config)
}

async fn run(config: NodeConfig) -> anyhow::Result<()> {
    init_logging(LogFormat::parse(&config.log_format), &config.log_level)
        .map_err(|e| anyhow::anyhow!("failed to initialise logging: {e}"))?;

    tracing::info!(
        listen_addr = %config.listen_addr,
        verification_interval_ms = config.verification.interval_ms,
        verification_workers = config.verification.workers,
        transaction_interval_ms = config.transaction.interval_ms,
        transaction_workers = config.transaction.workers,
        claim_policy = config.claim_policy.as_str(),
        "starting tally node"
    );

    let listen_addr = config.listen_addr.clone();
    let node = Arc::new(LedgerNode::new(config)?);
    node.start().await?;

    let shutdown = ShutdownController::new();
    let mut rpc_shutdown = shutdown.subscribe();
    let server = RpcServer::new(listen_addr, Arc::clone(&node));
    let mut rpc_task = tokio::spawn(server.start(async move {
        let _ = rpc_shutdown.recv().await;
    }));

    tokio::select! {
        res = shutdown.wait_for_signal() => {
            res.context("failed to listen for shutdown signals")?;
        }
        res = &mut rpc_task => {
            // the server exited on its own, most likely a bind failure
            node.stop().await?;
            res.context("RPC server task panicked")??;
            return Ok(());
        }
    }

    tracing::info!("shutdown signal received, stopping node");
    match rpc_task.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!(error = %e, "RPC server failed"),
        Err(e) => tracing::error!(error = %e, "RPC server task panicked"),
    }
    node.stop().await?;

    tracing::info!("tally daemon exited cleanly");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = build_config(&cli)?;

    match cli.command {
        Command::Node { action } => match action {
            NodeAction::Run => run(config).await?,
        },
        Command::Config { action } => match action {
            ConfigAction::Dump => print!("{}", config.to_toml_string()?),
        },
    }

    Ok(())
}
