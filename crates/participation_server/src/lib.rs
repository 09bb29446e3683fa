//! HTTP surface for the participation tracker.
//!
//! # Request pipeline
//! CORS (preflight short-circuit) → API-key auth → rate limit → handler.
//! `/api/auth-key` is rate limited but not key-checked; `/api/health` is open.
//! Unmatched paths get a JSON 404 under the lenient rate-limit tier.

use std::net::SocketAddr;

use axum::{middleware::from_fn_with_state, routing::get, Router};
use log::{error, info};
use participation_core::db::DbError;
use thiserror::Error;
use tokio::{
    net::TcpListener,
    signal::{self, ctrl_c},
};
use tower_http::limit::RequestBodyLimitLayer;

pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;

use config::Config;
use middleware::{auth::auth_middleware, cors::cors_middleware, rate_limit::rate_limit_middleware};
use routes::{
    auth_key, create_participant, delete_participant, get_participant, health,
    list_participants, route_not_found, update_participant,
};
use state::AppState;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("database setup failed: {0}")]
    Db(#[from] DbError),

    #[error("server io failed: {0}")]
    Io(#[from] std::io::Error),
}

pub fn build_router(state: AppState) -> Router {
    let participants = Router::new()
        .route(
            "/api/participants",
            get(list_participants).post(create_participant),
        )
        .route(
            "/api/participants/{id}",
            get(get_participant)
                .put(update_participant)
                .delete(delete_participant),
        )
        .route_layer(from_fn_with_state(state.clone(), rate_limit_middleware))
        .route_layer(from_fn_with_state(state.clone(), auth_middleware));

    let auth_key_route = Router::new()
        .route("/api/auth-key", get(auth_key))
        .route_layer(from_fn_with_state(state.clone(), rate_limit_middleware));

    let not_found = Router::new()
        .fallback(route_not_found)
        .layer(from_fn_with_state(state.clone(), rate_limit_middleware));

    Router::new()
        .merge(participants)
        .merge(auth_key_route)
        .route("/api/health", get(health))
        .merge(not_found)
        .layer(RequestBodyLimitLayer::new(state.config.max_body_bytes))
        .layer(from_fn_with_state(state.clone(), cors_middleware))
        .with_state(state)
}

pub async fn start_server(config: Config) -> Result<(), ServerError> {
    info!(
        "event=server_init module=server status=start environment={} database_url={}",
        config.environment, config.database_url
    );
    let state = AppState::new(config)?;

    let address = format!("0.0.0.0:{}", state.config.port);
    let app = build_router(state);

    let listener = TcpListener::bind(&address).await?;
    info!("event=server_listen module=server status=ok address={address}");

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("event=server_stop module=server status=ok");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match ctrl_c().await {
            Ok(()) => info!("event=shutdown module=server status=start signal=ctrl_c"),
            Err(err) => {
                error!("event=shutdown module=server status=error error={err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("event=shutdown module=server status=start signal=terminate");
            }
            Err(err) => {
                error!("event=shutdown module=server status=error error={err}");
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
}
