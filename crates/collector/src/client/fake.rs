//! Fake — deterministic engine double for tests.
//!
//! Implements [`EngineOps`] against in-memory state: seeded containers,
//! scripted log bytes per container, and an injectable event queue. Log
//! scripts can be held open to model a follow stream that has not ended.

use std::collections::HashMap;
use std::future::Future;
use std::io::Cursor;
use std::pin::Pin;

use http::StatusCode;
use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, DuplexStream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::engine::{ContainerEvent, ContainerSummary, EngineOps, EventActor, LogReader};
use super::error::EngineError;

/// Build one multiplexed frame: 8-byte header followed by the payload.
pub fn build_frame(tag: u8, payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(8 + payload.len());
    frame.push(tag);
    frame.extend_from_slice(&[0, 0, 0]);
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(payload);
    frame
}

/// A `start` event carrying the container name attribute.
pub fn start_event(id: &str, name: &str) -> ContainerEvent {
    ContainerEvent {
        action: "start".into(),
        actor: EventActor {
            id: id.into(),
            attributes: HashMap::from([("name".to_string(), name.to_string())]),
        },
    }
}

/// A `die` event; the engine omits the name attribute here.
pub fn die_event(id: &str) -> ContainerEvent {
    ContainerEvent {
        action: "die".into(),
        actor: EventActor {
            id: id.into(),
            attributes: HashMap::new(),
        },
    }
}

#[derive(Clone)]
struct Script {
    bytes: Vec<u8>,
    hold_open: bool,
}

#[derive(Default)]
struct Inner {
    containers: Vec<ContainerSummary>,
    logs: HashMap<String, Script>,
    events: Option<mpsc::Receiver<ContainerEvent>>,
    // Writers parked here keep their scripted streams from reaching EOF.
    open_writers: Vec<DuplexStream>,
    closed: usize,
}

/// In-memory engine double.
pub struct FakeEngine {
    inner: Mutex<Inner>,
    event_tx: mpsc::Sender<ContainerEvent>,
}

impl FakeEngine {
    pub fn new() -> Self {
        let (event_tx, event_rx) = mpsc::channel(16);
        Self {
            inner: Mutex::new(Inner {
                events: Some(event_rx),
                ..Inner::default()
            }),
            event_tx,
        }
    }

    /// Seed a running container into the list response.
    pub fn add_container(&self, id: &str, names: &[&str]) {
        self.inner.lock().containers.push(ContainerSummary {
            id: id.to_string(),
            names: names.iter().map(|n| n.to_string()).collect(),
        });
    }

    /// Script the log stream for a container; the stream ends (EOF) once
    /// the bytes are consumed.
    pub fn script_logs(&self, id: &str, bytes: Vec<u8>) {
        self.inner.lock().logs.insert(
            id.to_string(),
            Script {
                bytes,
                hold_open: false,
            },
        );
    }

    /// Script the log stream for a container and keep it open after the
    /// bytes are consumed, like a live follow stream.
    pub fn script_logs_open(&self, id: &str, bytes: Vec<u8>) {
        self.inner.lock().logs.insert(
            id.to_string(),
            Script {
                bytes,
                hold_open: true,
            },
        );
    }

    /// Sender for injecting lifecycle events into the watched queue.
    pub fn event_sender(&self) -> mpsc::Sender<ContainerEvent> {
        self.event_tx.clone()
    }

    /// How many times `close` has been called.
    pub fn close_count(&self) -> usize {
        self.inner.lock().closed
    }
}

impl Default for FakeEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineOps for FakeEngine {
    fn list_containers(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<ContainerSummary>, EngineError>> + Send + '_>> {
        Box::pin(async { Ok(self.inner.lock().containers.clone()) })
    }

    fn stream_logs<'a>(
        &'a self,
        id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<LogReader, EngineError>> + Send + 'a>> {
        Box::pin(async move {
            let mut inner = self.inner.lock();
            let script = inner
                .logs
                .get(id)
                .cloned()
                .ok_or(EngineError::Status(StatusCode::NOT_FOUND))?;

            if script.hold_open {
                let (writer, reader) = tokio::io::duplex(1);
                inner.open_writers.push(writer);
                Ok(Box::pin(Cursor::new(script.bytes).chain(reader)) as LogReader)
            } else {
                Ok(Box::pin(Cursor::new(script.bytes)) as LogReader)
            }
        })
    }

    fn watch_events(
        &self,
        _cancel: CancellationToken,
    ) -> Pin<Box<dyn Future<Output = Result<mpsc::Receiver<ContainerEvent>, EngineError>> + Send + '_>>
    {
        Box::pin(async {
            match self.inner.lock().events.take() {
                Some(rx) => Ok(rx),
                None => {
                    // Subscription already consumed: hand back a closed queue.
                    let (_tx, rx) = mpsc::channel(1);
                    Ok(rx)
                }
            }
        })
    }

    fn close(&self) {
        self.inner.lock().closed += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_list_seeded_containers() {
        let fake = FakeEngine::new();
        fake.add_container("abc123", &["/web"]);
        fake.add_container("def456", &["/db"]);

        let containers = fake.list_containers().await.unwrap();
        assert_eq!(containers.len(), 2);
        assert_eq!(containers[0].id, "abc123");
    }

    #[tokio::test]
    async fn test_stream_logs_yields_scripted_bytes() {
        let fake = FakeEngine::new();
        fake.script_logs("abc123", b"payload".to_vec());

        let mut reader = fake.stream_logs("abc123").await.unwrap();
        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"payload");
    }

    #[tokio::test]
    async fn test_stream_logs_unknown_container_is_not_found() {
        let fake = FakeEngine::new();
        match fake.stream_logs("nope").await {
            Err(EngineError::Status(code)) => assert_eq!(code, StatusCode::NOT_FOUND),
            other => panic!("expected status error, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_injected_events_arrive() {
        let fake = FakeEngine::new();
        let mut rx = fake.watch_events(CancellationToken::new()).await.unwrap();

        fake.event_sender()
            .send(start_event("abc123", "web"))
            .await
            .unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.action, "start");
        assert_eq!(event.actor.id, "abc123");
        assert_eq!(event.actor.attributes.get("name").map(String::as_str), Some("web"));
    }

    #[test]
    fn test_close_counts_calls() {
        let fake = FakeEngine::new();
        fake.close();
        fake.close();
        assert_eq!(fake.close_count(), 2);
    }

    #[test]
    fn test_build_frame_header_layout() {
        let frame = build_frame(1, b"hello");
        assert_eq!(frame[0], 1);
        assert_eq!(&frame[1..4], &[0, 0, 0]);
        assert_eq!(u32::from_be_bytes([frame[4], frame[5], frame[6], frame[7]]), 5);
        assert_eq!(&frame[8..], b"hello");
    }
}
