//! L402 demo HTTP entrypoint.
//!
//! Serves a free and a premium route, both gated behind L402:
//! - `GET /article` – any paid macaroon
//! - `GET /premium/article` – a paid macaroon carrying the `tier=premium` caveat
//!
//! Requesting a route without credentials yields a `402` with a fresh macaroon. The
//! matching preimage is written to the log; retry with
//! `Authorization: L402 <macaroon>:<preimage>`.
//!
//! Environment:
//! - `.env` values loaded at startup
//! - `HOST`, `PORT` control binding address
//! - `L402_INVOICE`, `L402_LOCATION` shape minted challenges
//! - `RUST_LOG` controls log filtering

mod config;
mod node;

use axum::Router;
use axum::routing::get;
use dotenvy::dotenv;
use l402_axum::{L402Macaroons, L402Middleware};
use std::net::SocketAddr;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::Config;
use crate::node::{DemoAuthority, DemoMinter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env variables
    dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load();

    let l402 = L402Middleware::new(
        DemoMinter::new(config.invoice.clone(), config.location.clone()),
        DemoAuthority,
    );

    let app = Router::new()
        .route("/article", get(article))
        .route("/premium/article", get(article))
        .layer(l402)
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::new(config.host, config.port);
    tracing::info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn article(macaroons: L402Macaroons) -> String {
    let ids = macaroons
        .keys()
        .map(|identifier| identifier.id.to_string())
        .collect::<Vec<_>>();
    format!("Paid content, unlocked by token(s) {}\n", ids.join(", "))
}

/// Resolves on Ctrl-C, or on SIGTERM where available.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!("Failed to listen for SIGTERM: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutting down");
}
