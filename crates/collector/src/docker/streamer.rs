//! Per-container log streamer.
//!
//! One task owns one container's log capture: it reads multiplexed
//! frames, reassembles logical lines across frame boundaries, and pushes
//! normalised entries onto the shared output queue until the stream ends
//! or its cancellation token fires.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::client::engine::EngineOps;
use crate::docker::frame;
use crate::model::LogEntry;

/// Reassembles logical lines from frame payloads.
///
/// A payload may contain zero, one, or many newlines, and a line may span
/// several frames; bytes after the last newline are held until the next
/// payload. An unterminated tail left at EOF is dropped by the caller
/// simply never flushing it.
#[derive(Default)]
pub(crate) struct LineBuffer {
    residual: Vec<u8>,
}

impl LineBuffer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Append `chunk` and return every now-complete line, with the
    /// terminating `\n` and any trailing `\r` stripped.
    pub(crate) fn split(&mut self, chunk: &[u8]) -> Vec<String> {
        self.residual.extend_from_slice(chunk);
        let Some(last) = self.residual.iter().rposition(|&b| b == b'\n') else {
            return Vec::new();
        };
        let rest = self.residual.split_off(last + 1);
        let complete = std::mem::replace(&mut self.residual, rest);
        complete[..last]
            .split(|&b| b == b'\n')
            .map(|raw| {
                String::from_utf8_lossy(raw)
                    .trim_end_matches('\r')
                    .to_string()
            })
            .collect()
    }
}

/// Stream one container's logs until EOF, error, or cancellation.
///
/// Open failures and mid-stream decode errors are logged with the
/// container name and end the streamer; they never affect peers. A
/// container restart produces a fresh `start` event and a fresh streamer,
/// so there is no retry here.
pub(crate) async fn run(
    engine: Arc<dyn EngineOps>,
    id: &str,
    name: &str,
    entries: mpsc::Sender<LogEntry>,
    cancel: CancellationToken,
) {
    let mut stream = tokio::select! {
        _ = cancel.cancelled() => return,
        opened = engine.stream_logs(id) => match opened {
            Ok(stream) => stream,
            Err(err) => {
                if !cancel.is_cancelled() {
                    warn!(container = name, error = %err, "opening log stream failed");
                }
                return;
            }
        },
    };

    let mut lines = LineBuffer::new();
    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => return,
            next = frame::read_frame(&mut stream) => next,
        };

        match next {
            Ok(Some(frame)) => {
                for line in lines.split(&frame.payload) {
                    if line.is_empty() {
                        continue;
                    }
                    let entry = LogEntry::new(Utc::now(), name.to_string(), line);
                    // Cancellation must win even against a full queue.
                    tokio::select! {
                        _ = cancel.cancelled() => return,
                        sent = entries.send(entry) => {
                            if sent.is_err() {
                                return;
                            }
                        }
                    }
                }
            }
            Ok(None) => return,
            Err(err) => {
                if !cancel.is_cancelled() {
                    warn!(container = name, error = %err, "log stream read failed");
                }
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::fake::{build_frame, FakeEngine};
    use std::time::Duration;
    use tokio::time::timeout;

    // ── LineBuffer ──────────────────────────────────────────────────

    #[test]
    fn test_split_single_line() {
        let mut buffer = LineBuffer::new();
        assert_eq!(buffer.split(b"hello\n"), vec!["hello"]);
    }

    #[test]
    fn test_split_many_lines_in_one_chunk() {
        let mut buffer = LineBuffer::new();
        assert_eq!(buffer.split(b"one\ntwo\nthree\n"), vec!["one", "two", "three"]);
    }

    #[test]
    fn test_split_line_spanning_chunks() {
        let mut buffer = LineBuffer::new();
        assert!(buffer.split(b"abc").is_empty());
        assert_eq!(buffer.split(b"def\n"), vec!["abcdef"]);
    }

    #[test]
    fn test_split_strips_carriage_return() {
        let mut buffer = LineBuffer::new();
        assert_eq!(buffer.split(b"windows\r\n"), vec!["windows"]);
    }

    #[test]
    fn test_split_keeps_unterminated_tail() {
        let mut buffer = LineBuffer::new();
        assert_eq!(buffer.split(b"done\npartial"), vec!["done"]);
        assert_eq!(buffer.split(b" line\n"), vec!["partial line"]);
    }

    #[test]
    fn test_split_blank_line_surfaces_empty() {
        let mut buffer = LineBuffer::new();
        assert_eq!(buffer.split(b"\n"), vec![""]);
    }

    // ── run ─────────────────────────────────────────────────────────

    fn scripted_engine(id: &str, frames: &[Vec<u8>]) -> Arc<FakeEngine> {
        let fake = Arc::new(FakeEngine::new());
        fake.script_logs(id, frames.concat());
        fake
    }

    #[tokio::test]
    async fn test_run_emits_entries_until_eof() {
        let engine = scripted_engine("abc", &[build_frame(1, b"hello\nworld\n")]);
        let (tx, mut rx) = mpsc::channel(8);

        run(engine, "abc", "app", tx, CancellationToken::new()).await;

        let first = rx.recv().await.unwrap();
        assert_eq!(first.source, "app");
        assert_eq!(first.line, "hello");
        assert_eq!(rx.recv().await.unwrap().line, "world");
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_run_merges_line_across_frames() {
        let engine = scripted_engine("abc", &[build_frame(1, b"abc"), build_frame(1, b"def\n")]);
        let (tx, mut rx) = mpsc::channel(8);

        run(engine, "abc", "app", tx, CancellationToken::new()).await;

        assert_eq!(rx.recv().await.unwrap().line, "abcdef");
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_run_drops_empty_lines() {
        let engine = scripted_engine("abc", &[build_frame(1, b"\n\r\nreal\n")]);
        let (tx, mut rx) = mpsc::channel(8);

        run(engine, "abc", "app", tx, CancellationToken::new()).await;

        assert_eq!(rx.recv().await.unwrap().line, "real");
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_run_discards_unterminated_tail_on_eof() {
        let engine = scripted_engine("abc", &[build_frame(1, b"whole\ntorn")]);
        let (tx, mut rx) = mpsc::channel(8);

        run(engine, "abc", "app", tx, CancellationToken::new()).await;

        assert_eq!(rx.recv().await.unwrap().line, "whole");
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_run_exits_on_cancellation_of_open_stream() {
        let fake = Arc::new(FakeEngine::new());
        fake.script_logs_open("abc", build_frame(1, b"live\n"));
        let (tx, mut rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();

        let task = tokio::spawn(run(fake, "abc", "app", tx, cancel.clone()));
        assert_eq!(rx.recv().await.unwrap().line, "live");

        cancel.cancel();
        timeout(Duration::from_secs(1), task)
            .await
            .expect("streamer did not exit after cancellation")
            .unwrap();
    }

    #[tokio::test]
    async fn test_run_exits_when_stream_open_fails() {
        // No scripted logs: the fake answers 404.
        let engine = Arc::new(FakeEngine::new());
        let (tx, mut rx) = mpsc::channel(8);

        run(engine, "missing", "ghost", tx, CancellationToken::new()).await;
        assert!(rx.recv().await.is_none());
    }
}
