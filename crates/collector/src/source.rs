//! The contract a log source exposes to its host.

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::client::error::EngineError;
use crate::model::LogEntry;

/// Why `start` failed. Runtime errors after a successful start are
/// per-streamer and observable only through logs.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("initial container discovery failed: {0}")]
    Discovery(#[source] EngineError),
    #[error("event subscription failed: {0}")]
    Events(#[source] EngineError),
}

/// A running log source.
///
/// `start` must not be called concurrently with itself or with `stop`.
/// `stop` is idempotent and never waits for the queue to drain. `logs`
/// hands the single consumer its receiving end of the output queue; the
/// queue is never closed by the source, so consumers terminate via their
/// own cancellation.
pub trait LogSource: Send + Sync {
    fn start(
        &self,
        parent: CancellationToken,
    ) -> Pin<Box<dyn Future<Output = Result<(), SourceError>> + Send + '_>>;

    fn stop(&self);

    /// The output queue. Single-consumer: the first call yields the
    /// receiver, later calls yield `None`.
    fn logs(&self) -> Option<mpsc::Receiver<LogEntry>>;
}
