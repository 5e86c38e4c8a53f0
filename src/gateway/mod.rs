//! HTTP gateway: wires the session endpoints onto an axum router and runs
//! the server alongside the eviction sweeper.

pub mod api;
pub mod view;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::Router;
use chrono_tz::Tz;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

use crate::config::{Config, GatewayConfig};
use crate::infra;
use crate::sessions::{
    self, Clock, HostNetwork, LocalInterfaceProbe, SessionStore, StaticNetwork, SystemClock,
};

/// Shared handler state. Cloned per request; everything inside is a handle.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn SessionStore>,
    pub clock: Arc<dyn Clock>,
    pub display_tz: Tz,
}

/// Build the gateway router with request limits applied.
pub fn build_router(state: AppState, gateway: &GatewayConfig) -> Router {
    let limits = ServiceBuilder::new()
        .layer(RequestBodyLimitLayer::new(gateway.max_body_bytes))
        .layer(timeout_layer(gateway));

    Router::new()
        .route("/welcome", get(api::handle_welcome))
        .route("/login", post(api::handle_login))
        .route("/logout", post(api::handle_logout))
        .route("/update", put(api::handle_update))
        .route("/status", post(api::handle_status))
        .route("/sessions", get(api::handle_list))
        .layer(limits)
        .with_state(state)
}

/// Requests still running after `request_timeout_secs` get a 408.
fn timeout_layer(gateway: &GatewayConfig) -> TimeoutLayer {
    TimeoutLayer::with_status_code(
        StatusCode::REQUEST_TIMEOUT,
        Duration::from_secs(gateway.request_timeout_secs),
    )
}

fn host_network(config: &Config) -> Arc<dyn HostNetwork> {
    if config.sessions.has_static_network() {
        Arc::new(StaticNetwork::new(
            config.sessions.server_ip.clone(),
            config.sessions.server_mac.clone(),
        ))
    } else {
        Arc::new(LocalInterfaceProbe::detect())
    }
}

/// Run the gateway until Ctrl-C, then stop the sweeper.
pub async fn run_gateway(host: &str, port: u16, config: Config) -> Result<()> {
    let policy = config.sessions.sweep_policy()?;
    let display_tz = config.display.tz()?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store = sessions::create_session_store(clock.clone(), host_network(&config));

    let shutdown = CancellationToken::new();
    let sweeper = infra::create_sweeper(store.clone(), clock.clone(), policy)
        .start_with(shutdown.child_token());

    let state = AppState {
        store,
        clock,
        display_tz,
    };
    let app = build_router(state, &config.gateway);

    let listener = tokio::net::TcpListener::bind((host, port))
        .await
        .with_context(|| format!("Failed to bind gateway to {host}:{port}"))?;
    let local_addr = listener.local_addr()?;
    tracing::info!(addr = %local_addr, timezone = %display_tz, "gateway listening");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await
        .context("gateway server error");

    shutdown.cancel();
    sweeper.stop().await;
    tracing::info!("gateway stopped");
    served
}

async fn shutdown_signal(shutdown: CancellationToken) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                tracing::warn!(error = %e, "failed to listen for shutdown signal");
                shutdown.cancelled().await;
                return;
            }
            tracing::info!("shutdown signal received");
        }
        () = shutdown.cancelled() => {}
    }
}
