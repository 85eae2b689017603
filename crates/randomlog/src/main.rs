//! Demo workload: emits one random JSON log line per second to stdout so
//! a collector running next to it has something to pick up.

use std::time::Duration;

use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use chrono::{SecondsFormat, Utc};
use rand::seq::SliceRandom;
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const LEVELS: &[&str] = &["INFO", "WARN", "ERROR", "DEBUG"];
const MESSAGES: &[&str] = &[
    "user login successful",
    "database query executed",
    "cache miss",
    "request timeout",
    "connection established",
    "file not found",
    "rate limit exceeded",
    "service restarted",
];

#[derive(Serialize)]
struct Emitted<'a> {
    timestamp: String,
    level: &'a str,
    message: &'a str,
    source: &'a str,
}

async fn emit_logs() {
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    loop {
        ticker.tick().await;
        let line = {
            let mut rng = rand::thread_rng();
            let entry = Emitted {
                timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
                level: LEVELS.choose(&mut rng).copied().unwrap_or("INFO"),
                message: MESSAGES
                    .choose(&mut rng)
                    .copied()
                    .unwrap_or("service restarted"),
                source: "randomlog",
            };
            serde_json::to_string(&entry)
        };
        if let Ok(line) = line {
            println!("{line}");
        }
    }
}

async fn health() -> StatusCode {
    StatusCode::OK
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "randomlog=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8081);

    tokio::spawn(emit_logs());

    let app = Router::new().route("/health", get(health));
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!(port, "randomlog starting");
    axum::serve(listener, app).await?;
    Ok(())
}
