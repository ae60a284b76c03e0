//! HTTP API server.

use core::net::SocketAddr;
use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Router};
use tokio::net::TcpListener;

use super::Metrics;

/// HTTP API server exposing the metrics endpoint for pull-based
/// scraping.
pub struct Server {
    addr: SocketAddr,
    metrics: Arc<Metrics>,
}

impl Server {
    /// Creates a new API server.
    pub fn new(addr: SocketAddr, metrics: Arc<Metrics>) -> Self {
        Self { addr, metrics }
    }

    /// Runs the API server.
    pub async fn run(self) -> Result<(), std::io::Error> {
        let app = Router::new().route("/metrics", get(metrics_handler)).with_state(self.metrics);

        let listener = TcpListener::bind(self.addr).await?;
        let addr = listener.local_addr()?;
        log::info!("API server listening on {addr}");

        axum::serve(listener, app).await
    }
}

async fn metrics_handler(State(metrics): State<Arc<Metrics>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        metrics.encode(),
    )
}
