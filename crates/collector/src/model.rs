use chrono::{DateTime, SecondsFormat, Utc};

/// Normalised internal representation of a single log line.
///
/// Entries are produced once by a streamer, delivered over the output
/// queue, and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// Capture time in UTC, stamped when the line is enqueued.
    pub timestamp: DateTime<Utc>,
    /// Display name of the producing container.
    pub source: String,
    /// One logical log line with trailing `\r`/`\n` stripped.
    pub line: String,
}

impl LogEntry {
    pub fn new(timestamp: DateTime<Utc>, source: String, line: String) -> Self {
        Self { timestamp, source, line }
    }
}

/// Canonical output format: `[<timestamp>] [<source>] <line>`
impl std::fmt::Display for LogEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] [{}] {}",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.source,
            self.line
        )
    }
}
