//! Polyroute HTTP server
//!
//! Starts an Axum web server that routes prompts to the cheapest capable
//! backend model and validates the answers.

use axum::{
    Router, middleware,
    routing::{get, post},
};
use clap::Parser;
use polyroute::cli::{Cli, Command};
use polyroute::config::Config;
use polyroute::handlers::{self, AppState};
use polyroute::middleware::request_id_middleware;
use polyroute::telemetry;
use std::net::SocketAddr;
use tower_http::trace::TraceLayer;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if let Some(Command::Config { output }) = cli.command {
        let template = Config::template();
        match output {
            Some(path) => {
                std::fs::write(&path, template)?;
                println!("Wrote configuration template to {path}");
            }
            None => print!("{template}"),
        }
        return Ok(());
    }

    let config = Config::from_file(&cli.config)?;
    telemetry::init(&config.observability.log_level);

    tracing::info!(
        host = %config.server.host,
        port = config.server.port,
        providers = config.providers.len(),
        "Starting Polyroute server"
    );

    let host = config.server.host.clone();
    let port = config.server.port;
    let state = AppState::new(config)?;

    let app = Router::new()
        .route("/ask", post(handlers::ask::handler))
        .route("/compare", post(handlers::compare::handler))
        .route("/health", get(handlers::health::handler))
        .route("/metrics", get(handlers::metrics::handler))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from((
        host.parse::<std::net::IpAddr>()
            .unwrap_or_else(|_| std::net::IpAddr::from([0, 0, 0, 0])),
        port,
    ));

    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
