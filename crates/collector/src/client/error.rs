use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("connecting to engine socket {path}: {source}")]
    Connect {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("building engine request: {0}")]
    Request(#[from] http::Error),
    #[error("engine transport: {0}")]
    Transport(#[from] hyper::Error),
    #[error("engine returned unexpected status {0}")]
    Status(http::StatusCode),
    #[error("decoding engine response: {0}")]
    Decode(#[from] serde_json::Error),
}
