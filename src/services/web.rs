//! Axum-based HTTP server for the connection manager.
//!
//! Provides REST endpoints for:
//! - GET `/api/ports` - Classification and state of every port (JSON)
//! - GET `/api/analog` - Pin levels and raw ADC counts (terminal text)
//! - GET `/api/dcm` - Device type codes (binary)
//! - POST `/api/control` - `'e'`/`'t'` control bytes
//! - POST `/api/pins` - Raw-pin command bytes
//! - POST `/api/test-mode/on`, `/api/test-mode/off` - Test mode
//! - POST `/api/test-pin` - Test-pin read/write (JSON)

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::config::WebConfig;
use crate::device::TestPinRequest;
use crate::traits::{AdcSpi, PortPins};

use super::api::{ApiResponse, PortsResponse, TestPinBody, TestPinResponse, WriteResponse};
use super::shared::SharedDcmState;

// ============================================================================
// Route Handlers
// ============================================================================

/// GET /api/ports - Returns every port
async fn get_ports<P, S>(State(state): State<Arc<SharedDcmState<P, S>>>) -> impl IntoResponse
where
    P: PortPins + Send + 'static,
    S: AdcSpi + Send + 'static,
{
    let (now_us, brick) = state.with_controller(|c| (c.now_us(), c.snapshot()));
    Json(ApiResponse::ok(PortsResponse { now_us, brick }))
}

/// GET /api/analog - Diagnostic text
async fn get_analog<P, S>(State(state): State<Arc<SharedDcmState<P, S>>>) -> impl IntoResponse
where
    P: PortPins + Send + 'static,
    S: AdcSpi + Send + 'static,
{
    let text = state.with_controller(|c| c.read_analog());
    String::from(text.as_str())
}

/// GET /api/dcm - Binary type snapshot
async fn get_types<P, S>(State(state): State<Arc<SharedDcmState<P, S>>>) -> impl IntoResponse
where
    P: PortPins + Send + 'static,
    S: AdcSpi + Send + 'static,
{
    let types = state.with_controller(|c| c.read_types());
    (
        [(header::CONTENT_TYPE, "application/octet-stream")],
        types.to_vec(),
    )
}

/// POST /api/control - Enable/disable detection or force a type
///
/// Body is the raw command, e.g. `e0---`.
async fn post_control<P, S>(
    State(state): State<Arc<SharedDcmState<P, S>>>,
    body: Bytes,
) -> Json<ApiResponse<WriteResponse>>
where
    P: PortPins + Send + 'static,
    S: AdcSpi + Send + 'static,
{
    match state.with_controller(|c| c.write_control(&body)) {
        Ok(accepted) => Json(ApiResponse::ok(WriteResponse { accepted })),
        Err(e) => Json(ApiResponse::err(e.to_string())),
    }
}

/// POST /api/pins - Raw-pin command stream
async fn post_pins<P, S>(
    State(state): State<Arc<SharedDcmState<P, S>>>,
    body: Bytes,
) -> Json<ApiResponse<WriteResponse>>
where
    P: PortPins + Send + 'static,
    S: AdcSpi + Send + 'static,
{
    match state.with_controller(|c| c.write_pins(&body)) {
        Ok(accepted) => Json(ApiResponse::ok(WriteResponse { accepted })),
        Err(e) => Json(ApiResponse::err(e.to_string())),
    }
}

fn run_test_pin<P, S>(
    state: &SharedDcmState<P, S>,
    request: TestPinRequest<'_>,
) -> Json<ApiResponse<TestPinResponse>>
where
    P: PortPins,
    S: AdcSpi,
{
    match state.with_controller(|c| c.test_pin(request)) {
        Ok(reply) => {
            let pins = reply.map(|text| {
                let body = text.split(|&b| b == 0).next().unwrap_or(&[]);
                String::from_utf8_lossy(body).into_owned()
            });
            Json(ApiResponse::ok(TestPinResponse { pins }))
        }
        Err(e) => Json(ApiResponse::err(e.to_string())),
    }
}

/// POST /api/test-mode/on
async fn test_mode_on<P, S>(
    State(state): State<Arc<SharedDcmState<P, S>>>,
) -> Json<ApiResponse<TestPinResponse>>
where
    P: PortPins + Send + 'static,
    S: AdcSpi + Send + 'static,
{
    run_test_pin(&state, TestPinRequest::On)
}

/// POST /api/test-mode/off
async fn test_mode_off<P, S>(
    State(state): State<Arc<SharedDcmState<P, S>>>,
) -> Json<ApiResponse<TestPinResponse>>
where
    P: PortPins + Send + 'static,
    S: AdcSpi + Send + 'static,
{
    run_test_pin(&state, TestPinRequest::Off)
}

/// POST /api/test-pin - Test-pin request
///
/// Accepts JSON: `{"op": "read", "port": 0, "length": 6}`
async fn post_test_pin<P, S>(
    State(state): State<Arc<SharedDcmState<P, S>>>,
    body: Bytes,
) -> Json<ApiResponse<TestPinResponse>>
where
    P: PortPins + Send + 'static,
    S: AdcSpi + Send + 'static,
{
    let Ok(request) = serde_json::from_slice::<TestPinBody>(&body) else {
        return Json(ApiResponse::err("Invalid test-pin request"));
    };
    run_test_pin(&state, request.as_request())
}

/// Fallback handler for 404
async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(ApiResponse::<()>::err("Not found")),
    )
}

// ============================================================================
// Server Builder
// ============================================================================

/// Configuration for the web server
#[derive(Debug, Clone)]
pub struct WebServerConfig {
    /// Address to bind to
    pub addr: SocketAddr,
    /// Whether to enable CORS for all origins
    pub cors_permissive: bool,
}

impl Default for WebServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            cors_permissive: true,
        }
    }
}

impl WebServerConfig {
    /// Create a new config with the given address
    pub fn new(addr: impl Into<SocketAddr>) -> Self {
        Self {
            addr: addr.into(),
            ..Default::default()
        }
    }

    /// Set whether CORS should be permissive
    pub fn cors(mut self, permissive: bool) -> Self {
        self.cors_permissive = permissive;
        self
    }

    /// Create from shared WebConfig. An unparsable host falls back to all
    /// interfaces.
    pub fn from_config(config: &WebConfig) -> Self {
        let ip = config
            .host
            .parse()
            .unwrap_or(std::net::IpAddr::from([0, 0, 0, 0]));
        Self {
            addr: SocketAddr::new(ip, config.port),
            cors_permissive: config.cors_permissive,
        }
    }
}

/// Build the Axum router with all routes
pub fn build_router<P, S>(state: Arc<SharedDcmState<P, S>>, config: &WebServerConfig) -> Router
where
    P: PortPins + Send + 'static,
    S: AdcSpi + Send + 'static,
{
    let mut router = Router::new()
        .route("/api/ports", get(get_ports::<P, S>))
        .route("/api/analog", get(get_analog::<P, S>))
        .route("/api/dcm", get(get_types::<P, S>))
        .route("/api/control", post(post_control::<P, S>))
        .route("/api/pins", post(post_pins::<P, S>))
        .route("/api/test-mode/on", post(test_mode_on::<P, S>))
        .route("/api/test-mode/off", post(test_mode_off::<P, S>))
        .route("/api/test-pin", post(post_test_pin::<P, S>))
        .fallback(not_found)
        .with_state(state);

    if config.cors_permissive {
        router = router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }

    router
}

/// Start the web server with shared state
///
/// This function blocks until the server is shut down. The caller keeps a
/// clone of `state` to drive the controller.
pub async fn run_server_with_state<P, S>(
    state: Arc<SharedDcmState<P, S>>,
    config: WebServerConfig,
) -> Result<(), std::io::Error>
where
    P: PortPins + Send + 'static,
    S: AdcSpi + Send + 'static,
{
    let router = build_router(state, &config);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    info!(addr = %config.addr, "web server listening");

    axum::serve(listener, router).await
}
