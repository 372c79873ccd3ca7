use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tiffin_server::background_jobs::jobs::AutoCancelOrdersJob;
use tiffin_server::config::{AppConfig, CliConfig, FileConfig};
use tiffin_server::{
    create_scheduler, ConflictPolicy, JobContext, Registration, RegionTable, RetryPolicy,
    SqliteOrderStore, SqliteSchedulerStore, SystemClock,
};
use tokio_util::sync::CancellationToken;

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(msg).with_context(|| format!("Error resolving path: {}", s));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Directory holding the SQLite databases.
    #[clap(long, value_parser = parse_path)]
    pub db_dir: Option<PathBuf>,

    /// Path to an optional TOML config file; its values override CLI flags.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Seconds of inactivity before a login session expires.
    #[clap(long, default_value_t = 600)]
    pub session_timeout_secs: u64,

    /// Seconds an order may stay pending before auto-cancellation.
    #[clap(long, default_value_t = 3600)]
    pub pending_order_ttl_secs: u64,

    /// Seconds between auto-cancel scans.
    #[clap(long, default_value_t = 3600)]
    pub scan_interval_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .unwrap();

    info!(
        "Starting tiffin-server {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH")
    );

    let file_config = cli_args
        .config
        .as_deref()
        .map(FileConfig::load)
        .transpose()?;
    let config = AppConfig::resolve(
        &CliConfig {
            db_dir: cli_args.db_dir,
            session_timeout_secs: cli_args.session_timeout_secs,
            pending_order_ttl_secs: cli_args.pending_order_ttl_secs,
            scan_interval_secs: cli_args.scan_interval_secs,
        },
        file_config,
    )?;

    info!("Opening order database at {:?}...", config.orders_db_path());
    let order_store = Arc::new(SqliteOrderStore::new(config.orders_db_path())?);

    info!(
        "Opening scheduler database at {:?}...",
        config.scheduler_db_path()
    );
    let scheduler_store = Arc::new(SqliteSchedulerStore::new(config.scheduler_db_path())?);

    let region_table = Arc::new(RegionTable::builtin());
    info!("Loaded {} regions", region_table.regions().len());

    let clock = Arc::new(SystemClock);
    let shutdown_token = CancellationToken::new();

    let job_context = JobContext::new(shutdown_token.child_token(), order_store, clock);
    let (mut scheduler, handle) = create_scheduler(
        scheduler_store,
        shutdown_token.clone(),
        job_context,
        RetryPolicy::new(&config.jobs),
    );

    let auto_cancel = Arc::new(AutoCancelOrdersJob::new(
        chrono::Duration::seconds(config.jobs.pending_order_ttl_secs as i64),
        Duration::from_secs(config.jobs.scan_interval_secs),
    ));
    match scheduler
        .register_job(auto_cancel, ConflictPolicy::Keep)
        .await?
    {
        Registration::Registered => {}
        Registration::AlreadyExists => {
            info!("Auto-cancel job was already registered, keeping existing schedule")
        }
    }

    for job in handle.list_jobs().await? {
        info!(
            "Job {} scheduled every {}s, next run at {}",
            job.id,
            job.interval_secs,
            job.next_run_at.as_deref().unwrap_or("unknown")
        );
    }

    let scheduler_task = tokio::spawn(async move {
        scheduler.run().await;
    });

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutdown requested");
    shutdown_token.cancel();

    scheduler_task.await.context("Scheduler task panicked")?;
    info!("Bye");
    Ok(())
}
