//! Chained OAuth broker server binary.
//!
//! Main application entry point that wires configuration, in-memory storage,
//! and the HTTP server, then runs with graceful shutdown and a periodic
//! sweep of expired flow state.

use anyhow::Result;
use cob::{
    config::Config,
    http::{AppContext, build_router},
    oauth::AuthorizationServer,
    storage::{
        AuthorizationCodeStore, BrokerStorage, MemoryBrokerStorage, MemoryServiceTokenStore,
        PendingFlowStore,
    },
};
use std::{env, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing_subscriber::prelude::*;

/// Interval between sweeps of expired codes and pending flows
const CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "cob=debug,info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().pretty())
        .init();

    let version = cob::config::version()?;

    env::args().for_each(|arg| {
        if arg == "--version" {
            println!("{version}");
            std::process::exit(0);
        }
    });

    tracing::info!(?version, "Starting chained OAuth broker");

    let config = Arc::new(Config::new()?);

    let http_client = reqwest::Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(*config.http_client_timeout.as_ref())
        .build()?;

    let storage: Arc<dyn BrokerStorage> = Arc::new(MemoryBrokerStorage::new());
    let service_tokens = Arc::new(MemoryServiceTokenStore::new());

    let auth_server = Arc::new(AuthorizationServer::new(
        storage.clone(),
        service_tokens,
        http_client.clone(),
        config.clone(),
    ));

    if config.downstream_provider.is_some() {
        tracing::info!(
            service = %config.downstream_service,
            "downstream provider configured - running chained flow"
        );
    } else {
        tracing::info!("no downstream provider configured - running identity-only flow");
    }

    let app_context = AppContext {
        http_client,
        config: config.clone(),
        auth_server,
        storage: storage.clone(),
    };

    let app = build_router(app_context);

    // Setup graceful shutdown
    let tracker = TaskTracker::new();
    let token = CancellationToken::new();

    {
        let tracker = tracker.clone();
        let inner_token = token.clone();

        let ctrl_c = async {
            signal::ctrl_c()
                .await
                .expect("failed to install Ctrl+C handler");
        };

        #[cfg(unix)]
        let terminate = async {
            signal::unix::signal(signal::unix::SignalKind::terminate())
                .expect("failed to install signal handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::spawn(async move {
            tokio::select! {
                () = inner_token.cancelled() => { },
                _ = terminate => {},
                _ = ctrl_c => {},
            }

            tracker.close();
            inner_token.cancel();
        });
    }

    // Periodic expiry sweep; lost state only forces a flow restart, the
    // sweep just bounds memory held by abandoned logins
    {
        let inner_token = token.clone();
        let sweep_storage = storage.clone();
        tracker.spawn(async move {
            let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
            loop {
                tokio::select! {
                    () = inner_token.cancelled() => break,
                    _ = interval.tick() => {
                        match sweep_storage.cleanup_expired_codes().await {
                            Ok(removed) if removed > 0 => {
                                tracing::debug!(removed, "swept expired authorization codes");
                            }
                            Ok(_) => {}
                            Err(err) => tracing::warn!("code sweep failed: {err}"),
                        }
                        match sweep_storage.cleanup_expired_flows().await {
                            Ok(removed) if removed > 0 => {
                                tracing::debug!(removed, "swept expired pending flows");
                            }
                            Ok(_) => {}
                            Err(err) => tracing::warn!("flow sweep failed: {err}"),
                        }
                    }
                }
            }
        });
    }

    // Start HTTP server
    {
        let http_port = *config.http_port.as_ref();
        let inner_token = token.clone();
        tracker.spawn(async move {
            let bind_address = format!("0.0.0.0:{http_port}");
            tracing::info!("Starting server on {bind_address}");
            let listener = match TcpListener::bind(&bind_address).await {
                Ok(listener) => listener,
                Err(err) => {
                    tracing::error!("failed to bind {bind_address}: {err}");
                    inner_token.cancel();
                    return;
                }
            };

            let shutdown_token = inner_token.clone();
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    tokio::select! {
                        () = shutdown_token.cancelled() => { }
                    }
                    tracing::info!("axum graceful shutdown complete");
                })
                .await;
            if let Err(err) = result {
                tracing::error!("axum task failed: {}", err);
            }

            inner_token.cancel();
        });
    }

    tracker.wait().await;

    Ok(())
}
