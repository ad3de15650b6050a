use std::env;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use anyhow::{Context, Result};
use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use base64::Engine;
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use decaptcher_rs::{Credentials, DecaptcherClient, DecaptcherConfig, Error, ProxyConfig};

/// Server configuration
struct ServerConfig {
    port: u16,
}

impl ServerConfig {
    fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
        }
    }
}

/// Application state shared across all requests
#[derive(Clone)]
struct AppState {
    client: Arc<DecaptcherClient>,
    metrics: Arc<Metrics>,
}

/// Server metrics
struct Metrics {
    total_requests: AtomicU64,
    requests_in_flight: AtomicU64,
    start_time: Instant,
}

impl Metrics {
    fn enter(&self) -> RequestGuard<'_> {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.requests_in_flight.fetch_add(1, Ordering::Relaxed);
        RequestGuard(&self.requests_in_flight)
    }
}

/// RAII guard for tracking in-flight requests
struct RequestGuard<'a>(&'a AtomicU64);

impl<'a> Drop for RequestGuard<'a> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing/logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "server=info,decaptcher_rs=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Read configuration from environment
    let config = ServerConfig::from_env();
    let client = Arc::new(build_client().context("Failed to initialize Decaptcher client")?);
    tracing::info!("Decaptcher client initialized");

    // Build Axum app with routes
    let app = build_app(client);

    // Bind server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Server listening on {}", addr);

    // Run server with graceful shutdown
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server shut down gracefully");
    Ok(())
}

/// Assemble the client from environment variables.
fn build_client() -> Result<DecaptcherClient> {
    let username = env::var("DECAPTCHER_USERNAME").context("DECAPTCHER_USERNAME not set")?;
    let password = env::var("DECAPTCHER_PASSWORD").context("DECAPTCHER_PASSWORD not set")?;

    let mut config = DecaptcherConfig::default();
    if let Ok(endpoint) = env::var("DECAPTCHER_URL") {
        config.endpoint = endpoint;
    }
    if let Ok(proxy) = env::var("DECAPTCHER_PROXY") {
        match ProxyConfig::parse(&proxy) {
            Some(parsed) => config.proxy = Some(parsed),
            None => tracing::warn!("Ignoring unparseable DECAPTCHER_PROXY value"),
        }
    }

    Ok(DecaptcherClient::with_config(
        Credentials::new(username, password),
        config,
    )?)
}

/// Build the Axum application with routes and middleware
fn build_app(client: Arc<DecaptcherClient>) -> Router {
    let metrics = Arc::new(Metrics {
        total_requests: AtomicU64::new(0),
        requests_in_flight: AtomicU64::new(0),
        start_time: Instant::now(),
    });

    let state = AppState { client, metrics };

    Router::new()
        // Health check
        .route("/health", get(health_check))
        // API routes
        .route("/api/solve", post(solve_image))
        .route("/api/solve/url", post(solve_url))
        .route("/api/solve/recaptcha", post(solve_recaptcha))
        .route("/api/refund", post(request_refund))
        .route("/api/balance", get(get_balance))
        .route("/api/metrics", get(get_metrics))
        // Middleware
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

/// Solve an image posted as base64
async fn solve_image(
    State(state): State<AppState>,
    Json(request): Json<SolveImageRequest>,
) -> Result<Json<SolveResponse>, ApiError> {
    let _guard = state.metrics.enter();

    let image = base64::engine::general_purpose::STANDARD
        .decode(&request.image_b64)
        .map_err(|e| ApiError::BadRequest(format!("invalid base64 image: {e}")))?;

    tracing::info!("Solving uploaded image ({} bytes)", image.len());

    let result = state.client.solve(&image).await?;
    Ok(Json(SolveResponse::from(result)))
}

#[derive(Deserialize)]
struct SolveImageRequest {
    image_b64: String,
}

/// Solve an image fetched by URL
async fn solve_url(
    State(state): State<AppState>,
    Json(request): Json<SolveUrlRequest>,
) -> Result<Json<SolveResponse>, ApiError> {
    let _guard = state.metrics.enter();

    tracing::info!("Solving image from URL: {}", request.url);

    let result = state.client.solve_url(&request.url).await?;
    Ok(Json(SolveResponse::from(result)))
}

#[derive(Deserialize)]
struct SolveUrlRequest {
    url: String,
}

/// Solve a reCAPTCHA by site key
async fn solve_recaptcha(
    State(state): State<AppState>,
    Json(request): Json<SolveRecaptchaRequest>,
) -> Result<Json<SolveResponse>, ApiError> {
    let _guard = state.metrics.enter();

    tracing::info!("Solving reCAPTCHA for site key {}", request.site_id);

    let result = state.client.solve_recaptcha(&request.site_id).await?;
    Ok(Json(SolveResponse::from(result)))
}

#[derive(Deserialize)]
struct SolveRecaptchaRequest {
    site_id: String,
}

#[derive(Serialize)]
struct SolveResponse {
    success: bool,
    pic_id: String,
    text: String,
    elapsed_ms: u64,
}

impl From<decaptcher_rs::SolveResult> for SolveResponse {
    fn from(result: decaptcher_rs::SolveResult) -> Self {
        Self {
            success: true,
            pic_id: result.pic_id.to_string(),
            text: result.text,
            elapsed_ms: result.elapsed.as_millis() as u64,
        }
    }
}

/// Report a bad solve for refund
async fn request_refund(
    State(state): State<AppState>,
    Json(request): Json<RefundRequest>,
) -> Result<Json<RawResponse>, ApiError> {
    let _guard = state.metrics.enter();

    tracing::info!("Requesting refund for pic id {}", request.pic_id);

    let response = state.client.request_refund(&request.pic_id).await?;
    Ok(Json(RawResponse {
        success: true,
        response,
    }))
}

#[derive(Deserialize)]
struct RefundRequest {
    pic_id: String,
}

/// Query the account balance
async fn get_balance(State(state): State<AppState>) -> Result<Json<RawResponse>, ApiError> {
    let _guard = state.metrics.enter();

    let response = state.client.balance().await?;
    Ok(Json(RawResponse {
        success: true,
        response,
    }))
}

#[derive(Serialize)]
struct RawResponse {
    success: bool,
    response: String,
}

/// Get server metrics
async fn get_metrics(State(state): State<AppState>) -> Json<MetricsResponse> {
    Json(MetricsResponse {
        total_requests: state.metrics.total_requests.load(Ordering::Relaxed),
        requests_in_flight: state.metrics.requests_in_flight.load(Ordering::Relaxed),
        uptime_seconds: state.metrics.start_time.elapsed().as_secs(),
    })
}

#[derive(Serialize)]
struct MetricsResponse {
    total_requests: u64,
    requests_in_flight: u64,
    uptime_seconds: u64,
}

/// API error types
enum ApiError {
    BadRequest(String),
    Upstream(String),
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::InvalidPicId(_) => ApiError::BadRequest(err.to_string()),
            other => {
                tracing::error!("Upstream error: {}", other);
                ApiError::Upstream(other.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Upstream(msg) => (StatusCode::BAD_GATEWAY, msg),
        };

        let body = Json(serde_json::json!({
            "success": false,
            "error": message
        }));

        (status, body).into_response()
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    use tokio::signal;

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

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down gracefully...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down gracefully...");
        }
    }
}
