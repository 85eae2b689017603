//! Serve — printer consumer, health endpoint, signal-driven shutdown.

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::CollectorConfig;
use crate::docker::DockerSource;
use crate::health;
use crate::model::LogEntry;
use crate::printer;

/// Run the collector until SIGTERM / ctrl-c, then stop the source.
pub async fn serve(
    source: Arc<DockerSource>,
    mut logs: mpsc::Receiver<LogEntry>,
    config: CollectorConfig,
    root: CancellationToken,
) -> Result<(), Box<dyn std::error::Error>> {
    let printer = tokio::spawn({
        let cancel = root.clone();
        async move {
            let mut out = tokio::io::stdout();
            printer::print_logs(&mut out, &mut logs, cancel).await;
        }
    });

    let listener = TcpListener::bind(("0.0.0.0", config.port)).await?;
    info!(port = config.port, "health endpoint listening");

    axum::serve(listener, health::router())
        .with_graceful_shutdown(shutdown_signal(root.clone()))
        .await?;

    source.stop();
    let _ = printer.await;
    Ok(())
}

/// Resolves on SIGTERM, ctrl-c, or root cancellation, and makes sure the
/// root token ends up cancelled in every case.
async fn shutdown_signal(root: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

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
        _ = ctrl_c => info!("received ctrl-c, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
        _ = root.cancelled() => {}
    }
    root.cancel();
}
