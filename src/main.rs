use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use log::{info, warn};
use tokio::sync::watch;

use replisync::cache::{CacheLayer, QueryCache};
use replisync::common::clock::SystemClock;
use replisync::config::SyncConfig;
use replisync::schedule::{format_sync_time, format_timestamp, FileScheduleStore};
use replisync::sync::{GrpcRemote, LocalOnlyRemote, ReplicaRemote, SyncScheduler, SyncStatus, SyncWorker};

#[derive(Parser)]
#[command(name = "replisync", about = "Replica sync scheduler")]
struct Cli {
    /// Path to a JSON config file; built-in defaults are used when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the background sync daemon until interrupted
    Run,
    /// Print the persisted schedule and due-check verdict
    Status,
    /// Trigger a sync immediately, bypassing the due-check
    SyncNow,
}

fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}

fn load_config(path: &Option<PathBuf>) -> Result<SyncConfig> {
    match path {
        Some(path) => SyncConfig::load(path),
        None => Ok(SyncConfig::default()),
    }
}

fn build_remote(config: &SyncConfig) -> Box<dyn ReplicaRemote> {
    match &config.remote_addr {
        Some(addr) => {
            let mut remote = GrpcRemote::new(addr, &config.replica_path)
                .with_pull_timeout(Duration::from_secs(config.pull_timeout_secs));
            match config.resolve_auth_token() {
                Some(token) => remote = remote.with_auth_token(token),
                None => warn!(
                    "auth token env {} not set; pulling unauthenticated",
                    config.auth_token_env
                ),
            }
            Box::new(remote)
        }
        None => Box::new(LocalOnlyRemote),
    }
}

fn build_scheduler(config: &SyncConfig) -> Result<Arc<SyncScheduler>> {
    let sync_times = config.parsed_sync_times()?;
    let store = Box::new(FileScheduleStore::new(&config.state_path));
    let cache: Arc<dyn CacheLayer> = Arc::new(QueryCache::new(Duration::from_secs(600)));

    let scheduler = SyncScheduler::initialize(
        store,
        build_remote(config),
        vec![cache],
        Arc::new(SystemClock),
        sync_times,
        Duration::from_millis(config.drain_delay_ms),
        Duration::from_secs(config.due_check_ttl_secs),
    );
    Ok(Arc::new(scheduler))
}

async fn run_daemon(config: &SyncConfig) -> Result<()> {
    let scheduler = build_scheduler(config)?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = SyncWorker::new(
        Arc::clone(&scheduler),
        Duration::from_secs(config.tick_interval_secs),
        shutdown_rx,
    );
    let handle = tokio::spawn(worker.run());

    info!(
        "sync daemon running; next sync at {}",
        format_timestamp(&scheduler.schedule().next_sync)
    );
    tokio::signal::ctrl_c().await?;
    info!("interrupt received; stopping sync worker");
    let _ = shutdown_tx.send(true);
    handle.await?;
    Ok(())
}

async fn show_status(config: &SyncConfig) -> Result<()> {
    let scheduler = build_scheduler(config)?;
    let schedule = scheduler.schedule();

    match &schedule.last_sync {
        Some(ts) => println!("last sync:  {}", format_timestamp(ts)),
        None => println!("last sync:  never"),
    }
    println!("next sync:  {}", format_timestamp(&schedule.next_sync));
    println!(
        "sync times: {}",
        schedule
            .sync_times
            .iter()
            .map(format_sync_time)
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!("due now:    {}", scheduler.is_sync_due());
    println!("session:    {}", scheduler.status().await.last_status);
    Ok(())
}

async fn sync_now(config: &SyncConfig) -> Result<()> {
    let scheduler = build_scheduler(config)?;
    let status = scheduler.perform_sync().await;
    println!("{status}");

    match status {
        SyncStatus::Failed(reason) => Err(anyhow::anyhow!("sync failed: {reason}")),
        _ => Ok(()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Run => run_daemon(&config).await,
        Commands::Status => show_status(&config).await,
        Commands::SyncNow => sync_now(&config).await,
    }
}
