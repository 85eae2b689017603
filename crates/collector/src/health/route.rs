use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;

/// Router serving the liveness probe.
pub fn router() -> Router {
    Router::new().route("/health", get(health))
}

async fn health() -> StatusCode {
    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_returns_ok() {
        assert_eq!(health().await, StatusCode::OK);
    }
}
