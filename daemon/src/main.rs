//! tally daemon — entry point for running the DAO-vote cache service.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use tally_chain::HttpChainClient;
use tally_rpc::RpcServer;
use tally_store_fs::FsStore;
use tally_sync::{
    init_logging, Cache, CacheMetrics, Fetcher, LogFormat, Notifier, SyncConfig, TaskLoop,
};
use tally_types::time::SystemClock;

#[derive(Parser)]
#[command(name = "tally-daemon", about = "DAO-vote cache daemon")]
struct Cli {
    /// Path to a TOML configuration file. File settings are the base;
    /// CLI flags and env vars override them.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Base URL of the chain indexing gateway.
    #[arg(long, env = "TALLY_GATEWAY_URL")]
    gateway_url: Option<String>,

    /// Data directory for durable storage.
    #[arg(long, env = "TALLY_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Query API port.
    #[arg(long, env = "TALLY_RPC_PORT")]
    rpc_port: Option<u16>,

    /// Seconds between sync cycles.
    #[arg(long, env = "TALLY_POLL_INTERVAL")]
    poll_interval: Option<u64>,

    /// Webhook URL for operational alerts.
    #[arg(long, env = "TALLY_NOTIFY_URL")]
    notify_url: Option<String>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, default_value = "info", env = "TALLY_LOG_LEVEL")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => SyncConfig::from_toml_file(&path.display().to_string())
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => SyncConfig::default(),
    };
    if let Some(url) = cli.gateway_url {
        config.gateway_url = url;
    }
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }
    if let Some(port) = cli.rpc_port {
        config.rpc_port = port;
    }
    if let Some(secs) = cli.poll_interval {
        config.poll_interval_secs = secs;
    }
    if cli.notify_url.is_some() {
        config.notify_url = cli.notify_url;
    }
    config.log_level = cli.log_level;

    init_logging(LogFormat::from_config(&config.log_format), &config.log_level);
    tracing::info!(
        gateway = %config.gateway_url,
        data_dir = %config.data_dir.display(),
        rpc_port = config.rpc_port,
        poll_interval_secs = config.poll_interval_secs,
        "starting tally cache daemon"
    );

    let store = Arc::new(
        FsStore::open(&config.data_dir)
            .with_context(|| format!("failed to open data dir {}", config.data_dir.display()))?,
    );
    let chain = Arc::new(HttpChainClient::new(&config.gateway_url));
    let cache = Arc::new(Cache::new());
    let metrics = Arc::new(CacheMetrics::new());
    let notifier = Arc::new(Notifier::new(
        config.notify_url.clone(),
        config.env_name.clone(),
    ));

    let fetcher = Arc::new(Fetcher::new(
        Arc::clone(&chain),
        Arc::clone(&store),
        Arc::clone(&cache),
        Arc::new(SystemClock),
        config.clone(),
        Arc::clone(&notifier),
        Arc::clone(&metrics),
    ));

    fetcher
        .init()
        .await
        .context("fetcher initialization failed (is the registry deployed?)")?;

    let sync_loop = {
        let fetcher = Arc::clone(&fetcher);
        TaskLoop::spawn("sync", config.poll_interval(), move || {
            let fetcher = Arc::clone(&fetcher);
            async move { fetcher.run().await }
        })
    };

    let server = RpcServer::new(config.rpc_port, Arc::clone(&cache), Arc::clone(&metrics));
    let serve = tokio::spawn(async move { server.start().await });

    shutdown_signal().await;
    tracing::info!("shutdown signal received, stopping");
    notifier.send("tally cache server shutting down").await;
    sync_loop.stop().await;
    serve.abort();

    tracing::info!("tally daemon exited cleanly");
    Ok(())
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
