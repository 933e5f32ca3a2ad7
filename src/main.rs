//! Pair Rotator - Main Entry Point
//!
//! Rotates capital between configured asset pairs on Binance spot whenever
//! their price ratio drifts out of its band.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pair_rotator::config::Config;
use pair_rotator::engine::run_cycle;
use pair_rotator::exchange::BinanceSpotClient;
use pair_rotator::persistence::StateStore;
use pair_rotator::report::{JsonFileSink, LogSink, SnapshotSink};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn, Level};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

/// Pair Rotator CLI
#[derive(Parser)]
#[command(name = "pair-rotator")]
#[command(version, about = "Multi-pair ratio rotation on Binance spot")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show persisted pair states and recent rotations
    Status {
        /// Path to SQLite database (default: data/rotator.db)
        #[arg(short, long, default_value = "data/rotator.db")]
        db: String,

        /// Number of history rows to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Run exactly one cycle in simulate mode and print the snapshot
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging()?;

    match cli.command {
        Some(Commands::Status { db, limit }) => show_status(&db, limit),
        Some(Commands::Check) => run_check().await,
        None => run_loop().await,
    }
}

/// The default mode: rebalance cycles on a fixed interval until shutdown.
async fn run_loop() -> Result<()> {
    info!("╔════════════════════════════════════════════════════════════╗");
    info!(
        "║            Pair Rotator v{}                              ║",
        env!("CARGO_PKG_VERSION")
    );
    info!("╚════════════════════════════════════════════════════════════╝");

    let mut config = load_startup_config()?;
    log_config(&config);

    let client = BinanceSpotClient::new(&config.binance)?;
    let store = open_store(&config)?;

    let file_sink = JsonFileSink::new(config.status_file.clone());
    let log_sink = LogSink;

    // Shutdown signal
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("🛑 Shutdown signal received");
        shutdown_clone.store(true, Ordering::SeqCst);
    });

    info!("🚀 Starting rebalance loop...");

    let mut cycle_count: u64 = 0;
    while !shutdown.load(Ordering::SeqCst) {
        // Pick up config edits between cycles; each cycle runs against the
        // immutable snapshot taken here.
        match Config::load().and_then(|c| c.validate().map(|_| c)) {
            Ok(mut fresh) => {
                fresh.binance = config.binance.clone();
                config = fresh;
            }
            Err(e) => {
                warn!(error = %e, "Config reload failed, keeping previous configuration");
            }
        }

        cycle_count += 1;
        info!("📡 [CYCLE] Starting cycle #{}", cycle_count);

        match run_cycle(&client, &store, &config).await {
            Ok(snapshot) => {
                if let Err(e) = log_sink.emit(&snapshot) {
                    warn!(error = %e, "Log sink failed");
                }
                if let Err(e) = file_sink.emit(&snapshot) {
                    warn!(error = %e, "Snapshot file write failed");
                }
            }
            Err(e) => {
                // Oracle-wide failure: state untouched, retry next tick.
                error!(error = %e, "Cycle aborted");
            }
        }

        tokio::time::sleep(Duration::from_secs(config.check_interval_secs)).await;
    }

    info!("👋 Rotator stopped");
    Ok(())
}

/// Run one simulated cycle and print its snapshot to stdout.
async fn run_check() -> Result<()> {
    let mut config = load_startup_config()?;
    config.simulate = true;

    let client = BinanceSpotClient::new(&config.binance)?;
    let store = open_store(&config)?;

    let snapshot = run_cycle(&client, &store, &config).await?;

    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

/// Open the state store, creating its directory on first run.
fn open_store(config: &Config) -> Result<StateStore> {
    if let Some(parent) = std::path::Path::new(&config.state_db).parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {:?}", parent))?;
    }
    StateStore::new(&config.state_db)
}

/// Load, validate, and credential-check the configuration.
///
/// Missing credentials are the one startup condition treated as fatal; every
/// runtime failure after this point is logged and retried on the next tick.
fn load_startup_config() -> Result<Config> {
    let mut config = Config::load()?;
    config.validate()?;

    if config.binance.api_key.is_empty() {
        config.binance.api_key = std::env::var("BINANCE_API_KEY").unwrap_or_default();
    }
    if config.binance.secret_key.is_empty() {
        config.binance.secret_key = std::env::var("BINANCE_SECRET_KEY").unwrap_or_default();
    }

    anyhow::ensure!(
        !config.binance.api_key.is_empty() && !config.binance.secret_key.is_empty(),
        "Please set BINANCE_API_KEY and BINANCE_SECRET_KEY in your environment or .env file"
    );

    Ok(config)
}

/// Log configuration on startup.
fn log_config(config: &Config) {
    info!("📋 Configuration:");
    info!("   Stable asset : {}", config.stable_asset);
    info!("   Simulate     : {}", config.simulate);
    info!("   Interval     : {}s", config.check_interval_secs);
    info!("   Testnet      : {}", config.binance.testnet);
    info!("   Pairs:");
    for pair in &config.pairs {
        info!(
            "    - {}: {}/{} (upper={}, lower={}, alloc={})",
            pair.name,
            pair.coin_a,
            pair.coin_b,
            pair.upper_ratio,
            pair.lower_ratio,
            pair.allocation_pct
        );
    }
}

/// Print persisted pair states and recent rotation history.
fn show_status(db_path: &str, limit: usize) -> Result<()> {
    use std::path::Path;

    println!("╔════════════════════════════════════════════════════════════╗");
    println!("║              PAIR ROTATOR STATUS                           ║");
    println!("╚════════════════════════════════════════════════════════════╝");

    if !Path::new(db_path).exists() {
        println!("\n❌ Database not found: {}", db_path);
        println!("   The rotator has not run yet, or the database path is incorrect.");
        return Ok(());
    }

    let store = StateStore::new(db_path)?;

    let states = store.all_states()?;
    if states.is_empty() {
        println!("\n❌ No pair states recorded yet.");
        return Ok(());
    }

    println!("\n📊 Held Assets");
    for (name, asset, updated) in &states {
        println!(
            "   ├─ {:<16} {}  (since {})",
            name,
            asset,
            updated.format("%Y-%m-%d %H:%M:%S UTC")
        );
    }

    let rotations = store.recent_rotations(limit)?;
    println!("\n🔄 Recent Rotations");
    if rotations.is_empty() {
        println!("   └─ none");
    }
    for rotation in &rotations {
        println!(
            "   ├─ {} {} {} -> {} | sold {} | bought {} | {}",
            rotation.timestamp.format("%Y-%m-%d %H:%M"),
            rotation.pair,
            rotation.from_asset,
            rotation.to_asset,
            rotation.sold_qty,
            rotation
                .bought_qty
                .map(|q| q.to_string())
                .unwrap_or_else(|| "-".to_string()),
            rotation.phase
        );
    }

    Ok(())
}

/// Initialize comprehensive logging with file output.
fn init_logging() -> Result<()> {
    use tracing_subscriber::fmt::writer::MakeWriterExt;

    // Create logs directory
    std::fs::create_dir_all("logs")?;

    // File appender for detailed logs
    let file_appender = tracing_appender::rolling::hourly("logs", "pair-rotator.log");
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);

    // Leak the guard to keep it alive for the program duration
    Box::leak(Box::new(_guard));

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("pair_rotator=debug".parse()?)
                .add_directive(Level::INFO.into()),
        )
        .with_writer(std::io::stdout.and(file_writer))
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .init();

    Ok(())
}
