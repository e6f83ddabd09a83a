//! Router assembly and server lifecycle

use crate::routes;
use crate::state::AppState;
use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderName, HeaderValue, Method};
use axum::Router;
use ecclesia_core::{AppConfig, AppError, AppResult};
use std::net::SocketAddr;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// The full application with middleware applied
pub fn build_app(state: AppState) -> Router {
    let config = &state.services.config;
    let cors = cors_layer(config);
    let timeout = TimeoutLayer::new(config.server.request_timeout());
    let body_limit = RequestBodyLimitLayer::new(config.server.max_request_size);

    routes::router()
        .layer(DefaultBodyLimit::disable())
        .layer(body_limit)
        .layer(timeout)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Permissive outside production; production allows `APP_URL` only, when set
fn cors_layer(config: &AppConfig) -> CorsLayer {
    if !config.environment.is_production() {
        return CorsLayer::permissive();
    }

    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static(crate::extract::CHURCH_HEADER),
        ])
        .expose_headers(Any);

    match config
        .app_url
        .as_deref()
        .and_then(|url| HeaderValue::from_str(url.trim_end_matches('/')).ok())
    {
        Some(origin) => layer.allow_origin(origin),
        None => layer.allow_origin(Any),
    }
}

/// Bind and serve until Ctrl+C or SIGTERM
pub async fn serve(state: AppState) -> AppResult<()> {
    let bind_address = state.services.config.server.bind_address();
    let addr: SocketAddr = bind_address
        .parse()
        .map_err(|e| AppError::internal(format!("Invalid bind address {}: {}", bind_address, e)))?;
    let app = build_app(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| AppError::internal(format!("Failed to bind to {}: {}", addr, e)))?;
    info!(address = %addr, "server listening");

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| AppError::internal(format!("Server error: {}", e)))?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            warn!("received Ctrl+C, shutting down gracefully");
        },
        _ = terminate => {
            warn!("received terminate signal, shutting down gracefully");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecclesia_core::config::Environment;

    #[test]
    fn test_production_cors_builds_from_app_url() {
        let mut config = AppConfig::for_testing();
        config.environment = Environment::Production;
        config.app_url = Some("https://app.ecclesia.example/".to_string());
        let _ = cors_layer(&config);

        config.app_url = None;
        let _ = cors_layer(&config);
    }
}
