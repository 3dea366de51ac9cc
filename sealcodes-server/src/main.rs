//! seal.codes server - attestation signing and verification
//!
//! Exposes sealcodes-core over HTTP:
//! - POST /sign-attestation - Sign an attestation package for the bearer's identity
//! - POST /verify-signature - Verify a compact attestation against the key registry

use std::net::SocketAddr;
use std::process::ExitCode;

use sealcodes_server::{create_router_with_config, AppState, Config};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("sealcodes_server=info,sealcodes_core=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env();
    if let Err(e) = config.validate() {
        tracing::error!(error = %e, "Refusing to start");
        return ExitCode::FAILURE;
    }
    tracing::info!(
        environment = %config.environment,
        signer = %config.signer_strategy,
        key_id = %config.signing_key_id,
        "Starting sealcodes-server v{}",
        env!("CARGO_PKG_VERSION")
    );

    let state = match AppState::from_config(&config).await {
        Ok(state) => state,
        Err(e) => {
            tracing::error!(error = %e, "Failed to initialise application state");
            return ExitCode::FAILURE;
        }
    };

    let app = create_router_with_config(&config, state);
    let addr = config.socket_addr();

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, %addr, "Failed to bind");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!("Listening on http://{}", addr);
    tracing::info!("API docs at http://{}/docs", addr);

    // Peer addresses are needed by the rate limiter's key extractor.
    if let Err(e) = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    {
        tracing::error!(error = %e, "Server error");
        return ExitCode::FAILURE;
    }

    tracing::info!("Server stopped");
    ExitCode::SUCCESS
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}
