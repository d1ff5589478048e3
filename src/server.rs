//! HTTP proxy exposing `POST /api/generate`.
//!
//! The proxy holds the generation API credential so browsers never see it.
//! It accepts the two images as JSON, forwards them to the configured
//! [`TryOnProvider`] and answers with either `{"generatedImage": ...}` or
//! `{"error": ...}`.

use crate::client::GENERATE_PATH;
use crate::error::Result;
use crate::image::{GenerateRequest, GenerationResult, TryOnProvider};
use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Default listen address.
pub const DEFAULT_ADDR: &str = "127.0.0.1:3000";

/// Default maximum request body size (two base64 photos).
pub const DEFAULT_BODY_LIMIT: usize = 20 * 1024 * 1024;

const MISSING_KEY_MESSAGE: &str = "API_KEY environment variable not set on the server.";
const MISSING_IMAGES_MESSAGE: &str = "Missing product or model image data.";

/// Proxy server settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind.
    pub addr: SocketAddr,
    /// Maximum accepted request body in bytes.
    pub body_limit: usize,
    /// Answer CORS preflights for any origin.
    pub permissive_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            body_limit: DEFAULT_BODY_LIMIT,
            permissive_cors: false,
        }
    }
}

/// Shared handler state.
///
/// `provider` is `None` when no credential was configured; the server still
/// starts and reports the problem per request.
#[derive(Clone, Default)]
pub struct AppState {
    provider: Option<Arc<dyn TryOnProvider>>,
}

impl AppState {
    /// State backed by a configured provider.
    pub fn new(provider: Arc<dyn TryOnProvider>) -> Self {
        Self {
            provider: Some(provider),
        }
    }

    /// State for a server started without a credential.
    pub fn without_provider() -> Self {
        Self { provider: None }
    }
}

/// An error answered as `{"error": message}`.
#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(GenerationResult::error(self.message))).into_response()
    }
}

/// Builds the proxy router.
pub fn router(state: AppState, config: &ServerConfig) -> Router {
    let mut router = Router::new()
        .route(GENERATE_PATH, post(generate).fallback(method_not_allowed))
        .layer(DefaultBodyLimit::max(config.body_limit))
        .layer(TraceLayer::new_for_http());

    if config.permissive_cors {
        router = router.layer(CorsLayer::permissive());
    }

    router.with_state(state)
}

/// Binds `config.addr` and serves until Ctrl-C.
pub async fn serve(config: ServerConfig, state: AppState) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    tracing::info!(
        addr = %listener.local_addr()?,
        credential = state.provider.is_some(),
        "try-on proxy listening"
    );

    axum::serve(listener, router(state, &config))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("try-on proxy stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {e}");
    }
}

async fn method_not_allowed() -> ApiError {
    ApiError::new(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed")
}

async fn generate(
    State(state): State<AppState>,
    body: std::result::Result<Bytes, BytesRejection>,
) -> std::result::Result<Json<GenerationResult>, ApiError> {
    let Some(provider) = state.provider.as_ref() else {
        tracing::error!("rejecting request: no API credential configured");
        return Err(ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            MISSING_KEY_MESSAGE,
        ));
    };

    let body = body.map_err(|rejection| ApiError::new(rejection.status(), rejection.body_text()))?;

    let request: GenerateRequest = serde_json::from_slice(&body).map_err(|e| {
        tracing::warn!("malformed request body: {e}");
        ApiError::new(
            StatusCode::BAD_REQUEST,
            format!("Invalid request body: {e}"),
        )
    })?;

    let (Some(product), Some(model)) = (request.product_image, request.model_image) else {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            MISSING_IMAGES_MESSAGE,
        ));
    };

    match provider.compose(&product, &model).await {
        Ok(image) => Ok(Json(GenerationResult::image(image.base64))),
        Err(e) => {
            tracing::error!(provider = provider.name(), "generation failed: {e}");
            Err(ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to generate image due to an API error: {e}"),
            ))
        }
    }
}
