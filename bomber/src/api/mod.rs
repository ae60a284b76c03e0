//! HTTP API for exposing collected metrics.

mod metrics;
mod server;

pub use self::{metrics::Metrics, server::Server};
