//! HTTP route handlers.

use std::sync::Arc;

use axum::middleware;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use super::auth;
use super::types::*;
use crate::error::Error;
use crate::manifest::{Manifest, ManifestError};
use crate::service::AgentVaultService;

const DASHBOARD_HTML: &str = include_str!("dashboard.html");
const TOKEN_PLACEHOLDER: &str = "__AUTH_TOKEN__";

/// Shared application state.
pub struct AppState {
    pub service: Arc<AgentVaultService>,
    /// Token required by mutating endpoints
    pub auth_token: String,
}

impl AppState {
    pub fn new(service: AgentVaultService, auth_token: impl Into<String>) -> Self {
        Self {
            service: Arc::new(service),
            auth_token: auth_token.into(),
        }
    }
}

/// Build the router. Mutating routes sit behind the write-token guard.
pub fn router(state: Arc<AppState>) -> Router {
    let public_routes = Router::new()
        .route("/", get(dashboard))
        .route("/health", get(health))
        .route("/providers", get(list_providers))
        .route("/providers/:name/test", post(test_provider))
        .route("/manifest", get(get_manifest));

    let protected_routes = Router::new()
        .route(
            "/providers/:name/secret",
            post(set_provider_secret).delete(delete_provider_secret),
        )
        .route("/manifest", axum::routing::put(update_manifest))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            auth::require_write_token,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `host:port` and serve until Ctrl+C or SIGTERM.
pub async fn serve(state: Arc<AppState>, host: &str, port: u16) -> anyhow::Result<()> {
    let addr = if host.contains(':') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    };
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Dashboard listening on http://{}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Dashboard stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
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

    tracing::info!("Shutdown signal received");
}

// ==================== Errors ====================

/// Failure rendered as `{"detail": ...}` with a 400 or 500 status.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let status = if err.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        Self {
            status,
            detail: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(status = %self.status, "{}", self.detail);
        } else {
            tracing::debug!(status = %self.status, "{}", self.detail);
        }
        (self.status, Json(ErrorResponse { detail: self.detail })).into_response()
    }
}

/// Run a synchronous service call on the blocking pool.
async fn blocking<T, F>(state: &AppState, call: F) -> Result<T, ApiError>
where
    F: FnOnce(&AgentVaultService) -> crate::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let service = Arc::clone(&state.service);
    tokio::task::spawn_blocking(move || call(&service))
        .await
        .map_err(|e| ApiError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            detail: format!("Service task failed: {}", e),
        })?
        .map_err(ApiError::from)
}

// ==================== Handlers ====================

async fn dashboard(State(state): State<Arc<AppState>>) -> Html<String> {
    Html(render_dashboard(&state.auth_token))
}

/// Embed the token as a JS string literal that cannot close the script tag.
fn render_dashboard(token: &str) -> String {
    let literal = serde_json::to_string(token)
        .unwrap_or_else(|_| "\"\"".to_string())
        .replace('<', "\\u003c")
        .replace('>', "\\u003e");
    DASHBOARD_HTML.replace(TOKEN_PLACEHOLDER, &literal)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn list_providers(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ProvidersResponse>, ApiError> {
    let providers = state.service.list_provider_statuses().await?;
    Ok(Json(ProvidersResponse { providers }))
}

async fn set_provider_secret(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(req): Json<SetSecretRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
    blocking(&state, move |service| {
        service.set_provider_secret(&name, &req.secret)
    })
    .await?;
    Ok(Json(StatusResponse::new("stored")))
}

async fn delete_provider_secret(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<DeleteSecretResponse>, ApiError> {
    let deleted = blocking(&state, move |service| service.delete_provider_secret(&name)).await?;
    Ok(Json(DeleteSecretResponse { deleted }))
}

async fn test_provider(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<ProviderTestResponse>, ApiError> {
    let result = state.service.test_provider(&name).await?;
    Ok(Json(result.into()))
}

async fn get_manifest(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ManifestResponse>, ApiError> {
    let manifest = blocking(&state, |service| service.get_manifest()).await?;
    Ok(Json(ManifestResponse { manifest }))
}

async fn update_manifest(
    State(state): State<Arc<AppState>>,
    Json(req): Json<UpdateManifestRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
    let manifest: Manifest = serde_json::from_value(req.manifest)
        .map_err(|e| Error::from(ManifestError::from(e)))?;
    blocking(&state, move |service| service.put_manifest(&manifest)).await?;
    Ok(Json(StatusResponse::new("updated")))
}
