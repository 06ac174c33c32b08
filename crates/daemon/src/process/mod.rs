pub mod utils;

use std::time::Duration;

use futures::future::join_all;
use tokio::sync::watch;
use tokio::time::timeout;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::http_server;
use crate::{ServiceConfig, ServiceState};

/// Upper bound on draining requests and closing the store once shutdown starts.
const FINAL_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Keeps the running service's tasks; `wait` returns once they have all
/// stopped.
pub struct ShutdownHandle {
    graceful_waiter: tokio::task::JoinHandle<()>,
    handles: Vec<tokio::task::JoinHandle<()>>,
    shutdown_tx: watch::Sender<()>,
    // held from startup so a shutdown sent before `wait` is not missed
    shutdown_rx: watch::Receiver<()>,
}

impl ShutdownHandle {
    /// Block until the service shuts down (via signal or explicit shutdown).
    pub async fn wait(self) {
        shutdown_and_join(self.graceful_waiter, self.shutdown_rx, self.handles).await;
    }

    /// Trigger shutdown programmatically.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }
}

const LOG_FILE_PREFIX: &str = "burrow.log";

fn env_filter(level: tracing::Level) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy()
}

/// Install the global subscriber: compact stdout, plus a daily rolling file
/// when `log_dir` is set. The returned guards flush the writers on drop.
fn init_logging(service_config: &ServiceConfig) -> Vec<WorkerGuard> {
    let mut guards = Vec::new();

    let (stdout_writer, guard) = tracing_appender::non_blocking(std::io::stdout());
    guards.push(guard);
    let stdout_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_writer(stdout_writer)
        .with_filter(env_filter(service_config.log_level));

    let file_layer = service_config.log_dir.as_ref().and_then(|log_dir| {
        if let Err(e) = std::fs::create_dir_all(log_dir) {
            eprintln!("not logging to {}: {}", log_dir.display(), e);
            return None;
        }
        let appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
        let (file_writer, guard) = tracing_appender::non_blocking(appender);
        guards.push(guard);
        Some(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_span_events(FmtSpan::CLOSE)
                .with_filter(env_filter(service_config.log_level)),
        )
    });

    tracing_subscriber::registry()
        .with(stdout_layer)
        .with(file_layer)
        .init();

    utils::register_panic_logger();
    utils::report_build_info();

    guards
}

/// Create service state from config, exiting on error.
async fn create_state(service_config: &ServiceConfig) -> ServiceState {
    match ServiceState::from_config(service_config).await {
        Ok(state) => state,
        Err(e) => {
            tracing::error!("error creating server state: {}", e);
            std::process::exit(3);
        }
    }
}

/// Wait for a signal or a programmatic shutdown, then join all handles with timeout.
async fn shutdown_and_join(
    graceful_waiter: tokio::task::JoinHandle<()>,
    mut shutdown_rx: watch::Receiver<()>,
    handles: Vec<tokio::task::JoinHandle<()>>,
) {
    tokio::select! {
        _ = graceful_waiter => {}
        _ = shutdown_rx.changed() => {}
    }

    if timeout(FINAL_SHUTDOWN_TIMEOUT, join_all(handles)).await.is_err() {
        tracing::error!(timeout = ?FINAL_SHUTDOWN_TIMEOUT, "service did not stop in time");
        std::process::exit(4);
    }
    tracing::info!("shutdown complete");
}

/// Create state and spawn background tasks, returning the state handle.
///
/// The returned `ShutdownHandle` must be kept alive; dropping it does not stop the service.
pub async fn start_service(service_config: &ServiceConfig) -> (ServiceState, ShutdownHandle) {
    let (graceful_waiter, shutdown_tx, shutdown_rx) = utils::graceful_shutdown_blocker();
    let state = create_state(service_config).await;

    let mut handles = Vec::new();

    let http_state = state.clone();
    let http_config = http_server::Config::from_service(service_config);
    let listen_addr = http_config.listen_addr;
    let http_rx = shutdown_rx.clone();
    let http_handle = tokio::spawn(async move {
        if let Err(e) = http_server::run(http_config, http_state, http_rx).await {
            tracing::error!("HTTP server error: {}", e);
        }
    });
    handles.push(http_handle);

    // Stop the watcher and close the store once shutdown is signalled
    let store_state = state.clone();
    let mut store_rx = shutdown_rx.clone();
    let store_handle = tokio::spawn(async move {
        let _ = store_rx.changed().await;
        let watcher_state = store_state.clone();
        if let Err(e) = tokio::task::spawn_blocking(move || watcher_state.stop_watcher()).await {
            tracing::error!("failed to stop the filesystem watcher: {}", e);
        }
        store_state.database().close().await;
        tracing::info!("database closed");
    });
    handles.push(store_handle);

    tracing::info!(
        root = %service_config.root.display(),
        files = state.index().len(),
        %listen_addr,
        "burrow is serving"
    );

    let handle = ShutdownHandle {
        graceful_waiter,
        handles,
        shutdown_tx,
        shutdown_rx,
    };

    (state, handle)
}

/// Spawns the service and blocks until a shutdown signal is received.
pub async fn spawn_service(service_config: &ServiceConfig) {
    let _guards = init_logging(service_config);
    let (_, handle) = start_service(service_config).await;
    handle.wait().await;
}
