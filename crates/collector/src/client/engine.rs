//! Engine trait — abstract interface to the container engine.
//!
//! The coordinator only ever talks to the engine through [`EngineOps`].
//! `live.rs` provides the real Unix-socket implementation; `fake.rs`
//! provides a deterministic test double.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use serde::Deserialize;
use tokio::io::AsyncRead;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::error::EngineError;

/// A follow-mode log stream: the engine's multiplexed frame bytes.
/// The caller owns the stream; dropping it releases the connection.
pub type LogReader = Pin<Box<dyn AsyncRead + Send>>;

/// The subset of the engine's container summary we need.
#[derive(Debug, Clone, Deserialize)]
pub struct ContainerSummary {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "Names", default)]
    pub names: Vec<String>,
}

/// A container lifecycle event from the engine's event stream.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContainerEvent {
    #[serde(rename = "Action", default)]
    pub action: String,
    #[serde(rename = "Actor", default)]
    pub actor: EventActor,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventActor {
    #[serde(rename = "ID", default)]
    pub id: String,
    #[serde(rename = "Attributes", default)]
    pub attributes: HashMap<String, String>,
}

/// Minimal async interface over the container engine.
///
/// Object-safe thanks to `Pin<Box<…>>` returns. Implementations must be
/// `Send + Sync` so they can be shared by concurrent streamers.
pub trait EngineOps: Send + Sync {
    /// List all currently-running containers.
    fn list_containers(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<ContainerSummary>, EngineError>> + Send + '_>>;

    /// Open a follow-mode log stream for one container, starting at the
    /// tail of the log. The stream carries the multiplexed frame format.
    fn stream_logs<'a>(
        &'a self,
        id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<LogReader, EngineError>> + Send + 'a>>;

    /// Subscribe to container `start`/`die` events. The returned queue
    /// closes when the subscription ends or `cancel` fires. Malformed
    /// event records are dropped.
    fn watch_events(
        &self,
        cancel: CancellationToken,
    ) -> Pin<Box<dyn Future<Output = Result<mpsc::Receiver<ContainerEvent>, EngineError>> + Send + '_>>;

    /// Release the client. Idempotent.
    fn close(&self);
}
