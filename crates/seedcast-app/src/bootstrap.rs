use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use seedcast_announcer::{AnnouncerFactory, AnnouncerSupervisor};
use seedcast_api::{AdminServer, AdminState};
use seedcast_config::{AppConfig, ConfigProvider, ConfigWatcher};
use seedcast_core::PeerId;
use seedcast_events::EventBus;
use seedcast_telemetry::{LogFormat, LoggingConfig, Metrics, build_sha, init_logging};
use seedcast_tracker::{BencodeAnnounceAccessor, HttpTransport};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::error::{AppError, AppResult};
use crate::torrent_dir::TorrentDirectory;

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "SEEDCAST_CONFIG";
/// Configuration file used when [`CONFIG_ENV`] is unset.
pub const DEFAULT_CONFIG_PATH: &str = "seedcast.json";

const CONFIG_POLL_INTERVAL: Duration = Duration::from_secs(5);
const TORRENT_DIR_POLL_INTERVAL: Duration = Duration::from_secs(10);

type AdminTask = JoinHandle<anyhow::Result<()>>;

fn config_path(value: Option<OsString>) -> PathBuf {
    value
        .filter(|value| !value.is_empty())
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from)
}

fn logging_config(config: &AppConfig) -> LoggingConfig<'_> {
    LoggingConfig {
        level: &config.telemetry.log_level,
        format: LogFormat::from_config(config.telemetry.log_format.as_deref()),
        build_sha: build_sha(),
    }
}

/// Entry point for the seedcast boot sequence.
///
/// Loads the configuration named by `SEEDCAST_CONFIG`, starts one announcer per
/// torrent file, serves the admin surface, and shuts everything down on Ctrl-C.
///
/// # Errors
///
/// Returns an error if configuration, logging, or the HTTP client cannot be
/// initialised, or if the admin surface fails.
pub async fn run_app() -> AppResult<()> {
    let path = config_path(std::env::var_os(CONFIG_ENV));
    let (config, watcher) = ConfigWatcher::watch(&path, CONFIG_POLL_INTERVAL)
        .await
        .map_err(|err| AppError::config("config.watch", err))?;
    init_logging(&logging_config(&config))
        .map_err(|err| AppError::telemetry("telemetry.init", err))?;
    info!(config = %path.display(), build = build_sha(), "seedcast bootstrap starting");

    let metrics = Metrics::new().map_err(|err| AppError::telemetry("telemetry.metrics", err))?;
    let events = EventBus::new();
    let provider = ConfigProvider::new(config.clone())
        .map_err(|err| AppError::config("config.provider", err))?;
    let transport =
        HttpTransport::new().map_err(|err| AppError::tracker("tracker.http_client", err))?;
    let peer_id = PeerId::generate();
    info!(%peer_id, "peer id generated");

    let factory = AnnouncerFactory::new(
        Arc::new(BencodeAnnounceAccessor::new(config.client.numwant)),
        Arc::new(transport),
        provider.clone(),
        events.clone(),
        metrics.clone(),
        peer_id,
    );
    let supervisor = Arc::new(AnnouncerSupervisor::new(factory, events.clone()));

    let mut torrents = TorrentDirectory::new(config.paths.torrents_dir.clone());
    torrents.ensure_exists().await?;
    let report = torrents.sync(&supervisor).await?;
    info!(
        dir = %torrents.root().display(),
        added = report.added,
        rejected = report.rejected,
        "torrent directory loaded"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let config_task = spawn_config_watch_task(watcher, Arc::clone(&supervisor), metrics.clone());
    let dir_task = spawn_torrent_dir_task(torrents, Arc::clone(&supervisor));
    let mut admin_task = config.admin.enabled.then(|| {
        let addr = config.admin.socket_addr();
        let server = AdminServer::new(AdminState::new(
            Arc::clone(&supervisor),
            provider.clone(),
            events.clone(),
            metrics.clone(),
        ));
        info!(%addr, "launching admin listener");
        tokio::spawn(server.serve(addr, shutdown_signal(shutdown_rx)))
    });

    let admin_exit = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.map_err(|err| AppError::io("signal.ctrl_c", None, err))?;
            info!("shutdown requested");
            None
        }
        exit = wait_admin(admin_task.as_mut()) => Some(exit),
    };

    config_task.abort();
    dir_task.abort();
    let _ = shutdown_tx.send(true);

    let stopped = supervisor.shutdown().await;
    info!(stopped = stopped.len(), "announcers stopped");

    let admin_result = match (admin_exit, admin_task) {
        (Some(exit), _) => exit,
        (None, Some(task)) => task.await,
        (None, None) => Ok(Ok(())),
    };
    match admin_result {
        Ok(Ok(())) => {}
        Ok(Err(err)) => return Err(AppError::admin_server("admin.serve", err)),
        Err(err) => warn!(error = %err, "admin task join failed"),
    }

    info!("seedcast shutdown complete");
    Ok(())
}

async fn wait_admin(
    task: Option<&mut AdminTask>,
) -> Result<anyhow::Result<()>, tokio::task::JoinError> {
    match task {
        Some(task) => task.await,
        None => std::future::pending().await,
    }
}

async fn shutdown_signal(mut shutdown: watch::Receiver<bool>) {
    while !*shutdown.borrow_and_update() {
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

fn spawn_config_watch_task(
    mut watcher: ConfigWatcher,
    supervisor: Arc<AnnouncerSupervisor>,
    metrics: Metrics,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let outcome = match watcher.next().await {
                Ok(config) => supervisor
                    .refresh_config(config)
                    .await
                    .map(|revision| info!(revision, "configuration reloaded"))
                    .map_err(|err| err.to_string()),
                Err(err) => Err(err.to_string()),
            };
            if let Err(err) = &outcome {
                warn!(
                    path = %watcher.path().display(),
                    error = %err,
                    "configuration change rejected; keeping previous snapshot"
                );
            }
            metrics.record_config_reload(outcome.is_ok());
        }
    })
}

fn spawn_torrent_dir_task(
    mut torrents: TorrentDirectory,
    supervisor: Arc<AnnouncerSupervisor>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(TORRENT_DIR_POLL_INTERVAL);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match torrents.sync(&supervisor).await {
                Ok(report) if report.added + report.removed > 0 => {
                    info!(added = report.added, removed = report.removed, "torrent directory changed");
                }
                Ok(_) => {}
                Err(err) => error!(error = %err, "torrent directory scan failed"),
            }
        }
    })
}
