//! Local stand-in for an upstream text provider.
//!
//! `mock_provider [port] [latency_ms] [error_rate] [body]`

use axum::{extract::State, http::StatusCode, routing::get, Router};
use rand::Rng;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::time::sleep;

const DEFAULT_BODY: &str = "export function mock(...args) {\n  return args;\n}\n";

#[derive(Clone)]
struct ServerConfig {
    latency_ms: u64,
    error_rate: f64,
    body: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = std::env::args().collect();
    let port = args.get(1).map(|s| s.parse::<u16>()).transpose()?.unwrap_or(3001);
    let latency_ms = args.get(2).map(|s| s.parse::<u64>()).transpose()?.unwrap_or(200);
    let error_rate = args.get(3).map(|s| s.parse::<f64>()).transpose()?.unwrap_or(0.0);
    let body = args.get(4).cloned().unwrap_or_else(|| DEFAULT_BODY.to_string());

    let config = ServerConfig {
        latency_ms,
        error_rate,
        body,
    };

    let app = Router::new()
        .route("/*prompt", get(handler))
        .with_state(config);

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    tracing::info!(
        "Mock provider on localhost:{}. Latency: {}ms, Error Rate: {}",
        port,
        latency_ms,
        error_rate
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn handler(State(config): State<ServerConfig>) -> (StatusCode, String) {
    // Simulate latency
    let jitter = rand::thread_rng().gen_range(0..=20);
    sleep(Duration::from_millis(config.latency_ms + jitter)).await;

    // Simulate error
    if config.error_rate > 0.0 && rand::thread_rng().gen_bool(config.error_rate.min(1.0)) {
        return (StatusCode::INTERNAL_SERVER_ERROR, "simulated failure".to_string());
    }

    (StatusCode::OK, config.body)
}
