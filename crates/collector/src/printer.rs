//! Stdout consumer for the output queue.

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::model::LogEntry;

/// Write each entry's canonical rendering to `out`, one per line, until
/// the queue closes or `cancel` fires.
pub async fn print_logs<W>(
    out: &mut W,
    entries: &mut mpsc::Receiver<LogEntry>,
    cancel: CancellationToken,
) where
    W: AsyncWrite + Unpin,
{
    loop {
        let entry = tokio::select! {
            _ = cancel.cancelled() => return,
            entry = entries.recv() => match entry {
                Some(entry) => entry,
                None => return,
            },
        };
        let line = format!("{entry}\n");
        if out.write_all(line.as_bytes()).await.is_err() {
            return;
        }
    }
}
