//! Boot — logging init, config load, engine connection, source start.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::client::EngineClient;
use crate::config::CollectorConfig;
use crate::docker::DockerSource;
use crate::model::LogEntry;

/// Initialise the tracing / logging subsystem.
pub fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "collector=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Load config, connect to the engine, and start the log source.
///
/// Returns the started source, the output queue's receiver, the loaded
/// config, and the root cancellation token the host should cancel on
/// shutdown.
pub async fn boot() -> Result<
    (
        Arc<DockerSource>,
        mpsc::Receiver<LogEntry>,
        CollectorConfig,
        CancellationToken,
    ),
    Box<dyn std::error::Error>,
> {
    let config = CollectorConfig::load()?;
    config.validate()?;
    info!(
        socket = %config.docker_socket.display(),
        "connecting to container engine"
    );

    let engine = Arc::new(EngineClient::new(&config.docker_socket));
    let source = Arc::new(DockerSource::new(engine, config.hostname.clone()));
    let logs = source.logs().ok_or("log queue already claimed")?;

    let root = CancellationToken::new();
    source.start(root.clone()).await?;
    info!("log source started");

    Ok((source, logs, config, root))
}
