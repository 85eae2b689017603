//! Live engine client — HTTP/1.1 over the local Unix socket.
//!
//! Deliberately minimal: one connection per request, which is what the
//! long-lived log and event streams need anyway. The engine demands a
//! Host header even over the socket.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use bytes::Bytes;
use futures_util::TryStreamExt;
use http::{Method, Request, Response, StatusCode};
use http_body_util::{BodyExt, Empty};
use hyper::body::Incoming;
use hyper_util::rt::TokioIo;
use tokio::io::AsyncBufReadExt;
use tokio::net::UnixStream;
use tokio::sync::mpsc;
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::engine::{ContainerEvent, ContainerSummary, EngineOps, LogReader};
use super::error::EngineError;

const API_VERSION: &str = "v1.45";

/// Capacity of the event queue handed to the caller.
const EVENT_QUEUE: usize = 16;

/// Minimal container engine API client over the Unix socket.
#[derive(Debug)]
pub struct EngineClient {
    socket: PathBuf,
    base: String,
}

impl EngineClient {
    pub fn new(socket: impl Into<PathBuf>) -> Self {
        Self {
            socket: socket.into(),
            base: format!("/{API_VERSION}"),
        }
    }

    /// Dial the socket and issue one GET request, returning the response
    /// with its (possibly endless) body still streaming.
    async fn get(&self, path_and_query: String) -> Result<Response<Incoming>, EngineError> {
        let stream =
            UnixStream::connect(&self.socket)
                .await
                .map_err(|source| EngineError::Connect {
                    path: self.socket.clone(),
                    source,
                })?;

        let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(stream)).await?;
        // The connection task ends once the response body is dropped,
        // which is how cancelled streamers release their streams.
        tokio::spawn(async move {
            if let Err(err) = conn.await {
                debug!(error = %err, "engine connection ended");
            }
        });

        let request = Request::builder()
            .method(Method::GET)
            .uri(path_and_query)
            .header(http::header::HOST, "docker")
            .body(Empty::<Bytes>::new())?;

        let response = sender.send_request(request).await?;
        if response.status() != StatusCode::OK {
            return Err(EngineError::Status(response.status()));
        }
        Ok(response)
    }

    async fn list(&self) -> Result<Vec<ContainerSummary>, EngineError> {
        let response = self.get(format!("{}/containers/json", self.base)).await?;
        let body = response.into_body().collect().await?.to_bytes();
        Ok(serde_json::from_slice(&body)?)
    }

    async fn logs(&self, id: &str) -> Result<LogReader, EngineError> {
        let path = format!(
            "{}/containers/{}/logs?follow=true&stdout=true&stderr=true&tail=0",
            self.base, id
        );
        let response = self.get(path).await?;
        let body = response
            .into_body()
            .into_data_stream()
            .map_err(std::io::Error::other);
        Ok(Box::pin(StreamReader::new(body)))
    }

    async fn events(
        &self,
        cancel: CancellationToken,
    ) -> Result<mpsc::Receiver<ContainerEvent>, EngineError> {
        let filters = serde_json::to_string(&serde_json::json!({"event": ["start", "die"]}))?;
        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("filters", &filters)
            .finish();
        let response = self.get(format!("{}/events?{}", self.base, query)).await?;

        let body = response
            .into_body()
            .into_data_stream()
            .map_err(std::io::Error::other);
        let mut lines = StreamReader::new(body).lines();

        let (tx, rx) = mpsc::channel(EVENT_QUEUE);
        tokio::spawn(async move {
            loop {
                let line = tokio::select! {
                    _ = cancel.cancelled() => return,
                    line = lines.next_line() => line,
                };
                match line {
                    Ok(Some(line)) => {
                        let event: ContainerEvent = match serde_json::from_str(&line) {
                            Ok(event) => event,
                            Err(err) => {
                                trace!(error = %err, "dropping malformed event record");
                                continue;
                            }
                        };
                        tokio::select! {
                            _ = cancel.cancelled() => return,
                            sent = tx.send(event) => {
                                if sent.is_err() {
                                    return;
                                }
                            }
                        }
                    }
                    Ok(None) => return,
                    Err(err) => {
                        if !cancel.is_cancelled() {
                            warn!(error = %err, "event stream read failed");
                        }
                        return;
                    }
                }
            }
        });

        Ok(rx)
    }
}

impl EngineOps for EngineClient {
    fn list_containers(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<ContainerSummary>, EngineError>> + Send + '_>> {
        Box::pin(self.list())
    }

    fn stream_logs<'a>(
        &'a self,
        id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<LogReader, EngineError>> + Send + 'a>> {
        Box::pin(self.logs(id))
    }

    fn watch_events(
        &self,
        cancel: CancellationToken,
    ) -> Pin<Box<dyn Future<Output = Result<mpsc::Receiver<ContainerEvent>, EngineError>> + Send + '_>>
    {
        Box::pin(self.events(cancel))
    }

    fn close(&self) {
        // Connections are per-request and die with their streams once the
        // root cancellation propagates; nothing pooled to tear down.
        debug!("engine client closed");
    }
}
