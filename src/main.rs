//! Multi-chain sentiment grid trading bot

use clap::{Parser, Subcommand};
use ethers::types::U256;
use gridpulse_bot::{
    chain::{ChainClient, EvmClient},
    config::Config,
    grid::GridPlanner,
    monitor::{start_monitor, MonitorState},
    storage::Database,
    trust::{self, TrustLedger},
    worker::Orchestrator,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "gridpulse-bot")]
#[command(about = "Multi-chain sentiment-driven grid trading bot")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the trading bot
    Run {
        /// Dry run mode (plan and probe, never broadcast)
        #[arg(long)]
        dry_run: bool,
    },
    /// Show wallet balances per configured network
    Status,
    /// Print the tier ladder for a hypothetical balance (smallest units)
    Tiers {
        balance: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;

    match cli.command {
        Commands::Run { dry_run } => run_bot(config, dry_run).await,
        Commands::Status => show_status(config).await,
        Commands::Tiers { balance } => show_tiers(config, &balance),
    }
}

async fn run_bot(config: Config, dry_run: bool) -> anyhow::Result<()> {
    tracing::info!("Starting gridpulse bot");

    // Missing signing key or executor address aborts here, before any cycle
    config.validate()?;

    if dry_run {
        tracing::warn!("Running in DRY RUN mode - no transactions will be broadcast");
    }

    let mut seeds = trust::default_seeds();
    seeds.extend(config.trust.seeds.clone());
    let ledger = Arc::new(TrustLedger::load(
        shellexpand::tilde(&config.trust.path).to_string(),
        seeds,
    ));

    let db = Arc::new(Database::connect(&config.database.path).await?);
    let monitor = Arc::new(MonitorState::new());

    // Health endpoint
    {
        let state = monitor.clone();
        let port = config.server.port;
        tokio::spawn(async move {
            if let Err(e) = start_monitor(state, port).await {
                tracing::error!("Health endpoint failed: {}", e);
            }
        });
    }

    let config = Arc::new(config);
    let mut orchestrator = Orchestrator::new(
        config.clone(),
        ledger,
        Some(db),
        monitor,
        dry_run,
    );
    orchestrator.start();

    tracing::info!(
        "Monitoring {} networks; press Ctrl-C to stop",
        config.networks.len()
    );
    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");
    orchestrator.shutdown().await;

    Ok(())
}

async fn show_status(config: Config) -> anyhow::Result<()> {
    config.validate()?;

    println!("\n💰 Wallet Status\n");
    for profile in &config.networks {
        let client = EvmClient::new(profile, &config.wallet)?;
        match client.balance().await {
            Ok(balance) => {
                println!(
                    "{:<12} chain {:<8} balance {} (address {:#x})",
                    profile.name, profile.chain_id, balance, client.address()
                );
            }
            Err(e) => {
                println!("{:<12} chain {:<8} error: {}", profile.name, profile.chain_id, e);
            }
        }
    }
    Ok(())
}

fn show_tiers(config: Config, balance: &str) -> anyhow::Result<()> {
    let balance = U256::from_dec_str(balance)
        .map_err(|e| anyhow::anyhow!("bad balance: {}", e))?;
    let planner = GridPlanner::new(config.min_reserve()?);
    let tiers = planner.plan(balance, U256::zero());

    if tiers.is_empty() {
        println!("No tiers: balance does not exceed the reserve");
        return Ok(());
    }

    println!("\n📊 Grid ladder for balance {}\n", balance);
    println!("{:<16} {:>8} {:>24} {:>6}", "Tier", "Pct", "Amount", "Flash");
    println!("{}", "-".repeat(58));
    for tier in tiers {
        println!(
            "{:<16} {:>7}% {:>24} {:>6}",
            tier.label,
            tier.pct,
            tier.amount,
            if tier.flash { "yes" } else { "no" }
        );
    }
    Ok(())
}
