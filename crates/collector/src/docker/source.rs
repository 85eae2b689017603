//! Coordinator for the dynamic set of per-container streamers.
//!
//! Owns the map of live streamers keyed by container id, reacts to
//! `start`/`die` events from the engine, and fans cancellation out from
//! one root token to every streamer's child token.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Once};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::client::engine::{ContainerEvent, EngineOps};
use crate::docker::{filter, streamer};
use crate::model::LogEntry;
use crate::source::{LogSource, SourceError};

/// Capacity of the bounded output queue. Producers block on a full queue
/// until space frees or their token is cancelled.
const QUEUE_CAPACITY: usize = 256;

/// Handle for one running streamer. Compared by pointer identity so a
/// draining streamer for a restarted id can never delete its successor's
/// map entry.
struct StreamerRecord {
    cancel: CancellationToken,
}

#[derive(Default)]
struct State {
    streams: HashMap<String, Arc<StreamerRecord>>,
    root: Option<CancellationToken>,
}

struct Inner {
    engine: Arc<dyn EngineOps>,
    hostname: String,
    entry_tx: mpsc::Sender<LogEntry>,
    // One lock covers the streamer map and the root cancel handle; it is
    // held only across mutations, never across I/O.
    state: Mutex<State>,
}

/// Log source backed by the local container engine.
pub struct DockerSource {
    inner: Arc<Inner>,
    entry_rx: Mutex<Option<mpsc::Receiver<LogEntry>>>,
    stop_once: Once,
}

impl DockerSource {
    /// `hostname` drives self-exclusion: containers whose id starts with
    /// it are never streamed. Empty disables the check.
    pub fn new(engine: Arc<dyn EngineOps>, hostname: String) -> Self {
        let (entry_tx, entry_rx) = mpsc::channel(QUEUE_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                engine,
                hostname,
                entry_tx,
                state: Mutex::new(State::default()),
            }),
            entry_rx: Mutex::new(Some(entry_rx)),
            stop_once: Once::new(),
        }
    }

    /// Discover running containers, spawn a streamer for each, and begin
    /// watching lifecycle events. Not safe to call concurrently with
    /// itself or with [`DockerSource::stop`].
    pub async fn start(&self, parent: CancellationToken) -> Result<(), SourceError> {
        let root = parent.child_token();
        self.inner.state.lock().root = Some(root.clone());

        let containers = match self.inner.engine.list_containers().await {
            Ok(containers) => containers,
            Err(err) => {
                root.cancel();
                return Err(SourceError::Discovery(err));
            }
        };

        for container in &containers {
            if filter::is_self(&container.id, &self.inner.hostname) {
                debug!(id = %container.id, "skipping own container");
                continue;
            }
            self.inner
                .spawn_streamer(&root, container.id.clone(), filter::display_name(container));
        }
        info!(containers = containers.len(), "initial discovery complete");

        let events = match self.inner.engine.watch_events(root.child_token()).await {
            Ok(events) => events,
            Err(err) => {
                root.cancel();
                return Err(SourceError::Events(err));
            }
        };

        tokio::spawn(Arc::clone(&self.inner).handle_events(root, events));
        Ok(())
    }

    /// Cancel every streamer and release the engine client. Idempotent;
    /// does not wait for the queue to drain and never closes it.
    pub fn stop(&self) {
        self.stop_once.call_once(|| {
            let root = self.inner.state.lock().root.take();
            if let Some(root) = root {
                root.cancel();
            }
            self.inner.engine.close();
        });
    }

    /// Take the receiving end of the output queue. Single-consumer: the
    /// first call yields the receiver, later calls yield `None`.
    pub fn logs(&self) -> Option<mpsc::Receiver<LogEntry>> {
        self.entry_rx.lock().take()
    }

    /// Number of streamers currently tracked.
    pub fn active_streamers(&self) -> usize {
        self.inner.state.lock().streams.len()
    }

    /// Whether a streamer is tracked for `id`.
    pub fn is_streaming(&self, id: &str) -> bool {
        self.inner.state.lock().streams.contains_key(id)
    }
}

impl Inner {
    /// Insert a record and spawn the streamer task, unless the id is
    /// already tracked. The map check under the lock is the single source
    /// of truth for dedup.
    fn spawn_streamer(self: &Arc<Self>, root: &CancellationToken, id: String, name: String) {
        let record = {
            let mut state = self.state.lock();
            if state.streams.contains_key(&id) {
                return;
            }
            let record = Arc::new(StreamerRecord {
                cancel: root.child_token(),
            });
            state.streams.insert(id.clone(), Arc::clone(&record));
            record
        };

        debug!(id = %id, container = %name, "streamer started");
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            streamer::run(
                Arc::clone(&inner.engine),
                &id,
                &name,
                inner.entry_tx.clone(),
                record.cancel.clone(),
            )
            .await;

            // Natural exit cancels the streamer's own token, and removes
            // the map entry only if it still points at this record.
            record.cancel.cancel();
            let mut state = inner.state.lock();
            if state
                .streams
                .get(&id)
                .is_some_and(|current| Arc::ptr_eq(current, &record))
            {
                state.streams.remove(&id);
                debug!(id = %id, container = %name, "streamer removed");
            }
        });
    }

    fn stop_streamer(&self, id: &str) {
        let mut state = self.state.lock();
        if let Some(record) = state.streams.remove(id) {
            record.cancel.cancel();
            debug!(id = %id, "streamer cancelled on die event");
        }
    }

    /// Consume the event queue until it closes or the root token fires.
    async fn handle_events(
        self: Arc<Self>,
        root: CancellationToken,
        mut events: mpsc::Receiver<ContainerEvent>,
    ) {
        loop {
            let event = tokio::select! {
                _ = root.cancelled() => return,
                event = events.recv() => match event {
                    Some(event) => event,
                    None => return,
                },
            };

            match event.action.as_str() {
                "start" => {
                    let id = event.actor.id;
                    if filter::is_self(&id, &self.hostname) {
                        continue;
                    }
                    let name = match event.actor.attributes.get("name") {
                        Some(name) if !name.is_empty() => name.clone(),
                        _ => filter::short_id(&id),
                    };
                    self.spawn_streamer(&root, id, name);
                }
                "die" => self.stop_streamer(&event.actor.id),
                _ => {}
            }
        }
    }
}

impl LogSource for DockerSource {
    fn start(
        &self,
        parent: CancellationToken,
    ) -> Pin<Box<dyn Future<Output = Result<(), SourceError>> + Send + '_>> {
        Box::pin(DockerSource::start(self, parent))
    }

    fn stop(&self) {
        DockerSource::stop(self)
    }

    fn logs(&self) -> Option<mpsc::Receiver<LogEntry>> {
        DockerSource::logs(self)
    }
}
