use std::time::Duration;

use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// How long in-flight requests get after SIGTERM before shutdown begins.
const TERMINATE_GRACE: Duration = Duration::from_secs(10);

enum Received {
    Interrupt,
    Terminate,
}

async fn next_signal() -> std::io::Result<Received> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        _ = sigint.recv() => Ok(Received::Interrupt),
        _ = sigterm.recv() => Ok(Received::Terminate),
    }
}

/// Watch for SIGINT or SIGTERM and broadcast shutdown on the returned channel.
/// The sender can also be used to stop the service from code.
pub fn graceful_shutdown_blocker() -> (JoinHandle<()>, watch::Sender<()>, watch::Receiver<()>) {
    let (tx, rx) = watch::channel(());
    let signal_tx = tx.clone();

    let handle = tokio::spawn(async move {
        match next_signal().await {
            Ok(Received::Interrupt) => tracing::info!("SIGINT received, shutting down"),
            Ok(Received::Terminate) => {
                tracing::info!(grace = ?TERMINATE_GRACE, "SIGTERM received, shutting down after grace period");
                tokio::time::sleep(TERMINATE_GRACE).await;
            }
            Err(e) => {
                // only a programmatic shutdown can stop us now
                tracing::error!("unable to install signal handlers: {}", e);
                std::future::pending::<()>().await;
            }
        }
        let _ = signal_tx.send(());
    });

    (handle, tx, rx)
}

/// Send panics through `tracing` so they land in the log file too.
pub fn register_panic_logger() {
    std::panic::set_hook(Box::new(|panic| {
        let location = panic.location();
        tracing::error!(
            message = %panic,
            panic.file = location.map(|l| l.file()),
            panic.line = location.map(|l| l.line()),
        );
    }));
}

pub fn report_build_info() {
    let build = crate::version::build_info();

    tracing::info!(
        build_profile = build.build_profile,
        features = build.build_features,
        version = build.version,
        built_at = build.build_timestamp,
        "burrow starting up"
    );
}
