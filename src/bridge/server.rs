//! Purpose: Axum server hosting the Bridge endpoints on a loopback address.
//! Exports: `BridgeConfig`, `BridgeState`, `DEFAULT_PORT`, `router`, `serve`, `serve_on`,
//! `validate_config`, `init_tracing`.
//! Role: Mounts `handlers::ENDPOINTS`, bounds engine concurrency, frames every reply as JSON.
//! Invariants: At most `workers` handlers run at once; waiters are admitted FIFO.
//! Invariants: Every response, including 404/405/413 and handler panics, carries
//! `application/json; charset=utf-8` and a JSON body.
//! Invariants: Loopback binds only.

use std::future::{Future, IntoFuture};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::rejection::BytesRejection;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use bytes::Bytes;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tokio::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::bridge::envelope::{ApiError, Params, internal, invalid_params, no_workspace, ok_envelope};
use crate::bridge::handlers::{ENDPOINTS, Endpoint, Handler, Reply, find_endpoint};
use crate::bridge::session::Sessions;
use crate::core::error::{Error, ErrorKind};
use crate::engine::Services;

pub const DEFAULT_PORT: u16 = 9847;
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

#[derive(Clone, Debug)]
pub struct BridgeConfig {
    pub bind: SocketAddr,
    pub workers: usize,
    pub decompile_timeout: Duration,
    pub max_body_bytes: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), DEFAULT_PORT),
            workers: 4,
            decompile_timeout: Duration::from_secs(30),
            max_body_bytes: 16 * 1024 * 1024,
        }
    }
}

/// Everything a handler can reach: sessions, engine services and limits.
#[derive(Debug)]
pub struct BridgeState {
    pub sessions: Sessions,
    pub services: Services,
    pub config: BridgeConfig,
}

impl BridgeState {
    pub fn new(services: Services, config: BridgeConfig) -> Self {
        Self {
            sessions: Sessions::new(),
            services,
            config,
        }
    }

    /// Runs one endpoint synchronously against a raw request body.
    pub fn call(&self, endpoint: &Endpoint, body: &[u8]) -> (StatusCode, Value) {
        if let Handler::Health = endpoint.handler {
            return (StatusCode::OK, json!({ "status": "ok" }));
        }
        let reply = Params::from_body(body).and_then(|params| self.dispatch(endpoint.handler, &params));
        match reply {
            Ok(data) => (StatusCode::OK, ok_envelope(data)),
            Err(err) => (err.status(), err.to_envelope()),
        }
    }

    /// Convenience for in-process callers: `call` by path with a JSON body.
    pub fn request(&self, path: &str, body: &Value) -> (StatusCode, Value) {
        match find_endpoint(path) {
            Some(endpoint) => self.call(endpoint, body.to_string().as_bytes()),
            None => {
                let err = unknown_endpoint_error(path);
                (err.status(), err.to_envelope())
            }
        }
    }

    fn dispatch(&self, handler: Handler, params: &Params) -> Reply {
        match handler {
            Handler::Health => Ok(json!({ "status": "ok" })),
            Handler::Session(run) => run(self, params),
            Handler::Workspace(run) => {
                let workspace = self.sessions.current().ok_or_else(no_workspace)?;
                run(self, &workspace, params)
            }
        }
    }
}

#[derive(Clone)]
struct AppState {
    bridge: Arc<BridgeState>,
    workers: Arc<Semaphore>,
}

pub fn router(bridge: Arc<BridgeState>) -> Router {
    let app = AppState {
        workers: Arc::new(Semaphore::new(bridge.config.workers)),
        bridge: bridge.clone(),
    };
    let mut router = Router::new();
    for endpoint in ENDPOINTS {
        router = router.route(
            endpoint.path,
            any(
                move |State(app): State<AppState>,
                      method: Method,
                      body: Result<Bytes, BytesRejection>| {
                    handle(app, endpoint, method, body)
                },
            ),
        );
    }
    router
        .fallback(unknown_endpoint)
        .layer(DefaultBodyLimit::max(bridge.config.max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(app)
}

async fn handle(
    app: AppState,
    endpoint: &'static Endpoint,
    method: Method,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let started = Instant::now();
    info!("{method} {}", endpoint.path);
    let allowed = method == Method::POST || (endpoint.allow_get && method == Method::GET);
    let response = if !allowed {
        error_response(
            invalid_params(format!("Method {method} not allowed for {}", endpoint.path))
                .with_status(StatusCode::METHOD_NOT_ALLOWED),
        )
    } else {
        match body {
            Ok(body) => run_endpoint(app, endpoint, body).await,
            Err(rejection) => {
                error_response(body_rejected(&rejection, app.bridge.config.max_body_bytes))
            }
        }
    };
    info!(
        "{method} {} completed in {}ms",
        endpoint.path,
        started.elapsed().as_millis()
    );
    response
}

fn body_rejected(rejection: &BytesRejection, limit: usize) -> ApiError {
    let status = rejection.status();
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        invalid_params(format!("Request body exceeds {limit} bytes")).with_status(status)
    } else {
        invalid_params(format!("Failed to read request body: {}", rejection.body_text()))
            .with_status(status)
    }
}

async fn run_endpoint(app: AppState, endpoint: &'static Endpoint, body: Bytes) -> Response {
    let Ok(_permit) = app.workers.acquire_owned().await else {
        return error_response(internal("Bridge worker pool is closed"));
    };
    let bridge = app.bridge;
    match tokio::task::spawn_blocking(move || bridge.call(endpoint, &body)).await {
        Ok((status, value)) => json_response(status, value),
        Err(err) => {
            let message = panic_message(err);
            error!(path = endpoint.path, "handler failed: {message}");
            error_response(internal(message))
        }
    }
}

fn panic_message(err: tokio::task::JoinError) -> String {
    if err.is_cancelled() {
        return "Request handler was cancelled".to_string();
    }
    let payload = err.into_panic();
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "Request handler panicked".to_string()
    }
}

async fn unknown_endpoint(method: Method, uri: Uri) -> Response {
    info!("{method} {} (unknown endpoint)", uri.path());
    error_response(unknown_endpoint_error(uri.path()))
}

fn unknown_endpoint_error(path: &str) -> ApiError {
    invalid_params(format!("Unknown endpoint: {path}")).with_status(StatusCode::NOT_FOUND)
}

fn json_response(status: StatusCode, payload: Value) -> Response {
    let mut response = (status, payload.to_string()).into_response();
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
    response
}

fn error_response(err: ApiError) -> Response {
    json_response(err.status(), err.to_envelope())
}

fn is_loopback(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(addr) => addr.is_loopback(),
        IpAddr::V6(addr) => addr.is_loopback(),
    }
}

pub fn validate_config(config: &BridgeConfig) -> Result<(), Error> {
    if !is_loopback(config.bind.ip()) {
        return Err(Error::new(ErrorKind::Usage)
            .with_message(format!("refusing to bind non-loopback address {}", config.bind))
            .with_hint("The bridge only listens on loopback; use 127.0.0.1 or ::1."));
    }
    if config.workers == 0 {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("worker count must be greater than zero")
            .with_hint("Use a positive value like 4."));
    }
    if config.decompile_timeout.is_zero() {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("--decompile-timeout-ms must be greater than zero")
            .with_hint("Use a positive value like 30000."));
    }
    if config.max_body_bytes == 0 {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("maximum body size must be greater than zero")
            .with_hint("Use a positive value like 16777216."));
    }
    Ok(())
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .try_init();
}

/// Binds `config.bind` and serves until Ctrl-C or SIGTERM.
pub async fn serve(config: BridgeConfig, services: Services) -> Result<(), Error> {
    validate_config(&config)?;
    init_tracing();

    let listener = TcpListener::bind(config.bind).await.map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message(format!("failed to bind {}", config.bind))
            .with_hint("Another bridge may already be running on this port.")
            .with_source(err)
    })?;
    info!("bridge listening on http://{}", config.bind);
    let bridge = Arc::new(BridgeState::new(services, config));
    serve_on(listener, bridge, shutdown_signal()).await
}

/// Serves on an already bound listener until `shutdown` resolves, then drains
/// in-flight requests for up to 10 seconds.
pub async fn serve_on(
    listener: TcpListener,
    bridge: Arc<BridgeState>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), Error> {
    let app = router(bridge);
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        })
        .into_future();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => {
            result.map_err(server_failed)?;
        }
        _ = shutdown => {
            info!("shutting down bridge");
            let _ = shutdown_tx.send(());
            match tokio::time::timeout(Duration::from_secs(10), &mut server).await {
                Ok(result) => result.map_err(server_failed)?,
                Err(_) => {
                    return Err(Error::new(ErrorKind::Io).with_message("bridge shutdown timed out"));
                }
            }
        }
    };
    Ok(())
}

fn server_failed(err: std::io::Error) -> Error {
    Error::new(ErrorKind::Io)
        .with_message("bridge server failed")
        .with_source(err)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };
    #[cfg(unix)]
    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    #[cfg(not(unix))]
    ctrl_c.await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::handlers::testing;

    #[test]
    fn config_rejects_remote_binds_and_zero_limits() {
        let config = BridgeConfig {
            bind: "0.0.0.0:9847".parse().expect("bind"),
            ..BridgeConfig::default()
        };
        let err = validate_config(&config).expect_err("non-loopback");
        assert_eq!(err.kind(), ErrorKind::Usage);

        let config = BridgeConfig {
            workers: 0,
            ..BridgeConfig::default()
        };
        assert!(validate_config(&config).is_err());
        assert!(validate_config(&BridgeConfig::default()).is_ok());
        assert!(
            validate_config(&BridgeConfig {
                bind: "[::1]:0".parse().expect("bind"),
                ..BridgeConfig::default()
            })
            .is_ok()
        );
    }

    #[tokio::test]
    async fn serve_rejects_non_loopback_bind() {
        let config = BridgeConfig {
            bind: "0.0.0.0:0".parse().expect("bind"),
            ..BridgeConfig::default()
        };
        let err = serve(config, Services::bundled())
            .await
            .expect_err("expected usage error");
        assert_eq!(err.kind(), ErrorKind::Usage);
    }

    #[test]
    fn health_is_not_enveloped() {
        let state = testing::state();
        let (status, body) = state.request("/health", &json!({}));
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "ok"}));
    }

    #[test]
    fn workspace_endpoints_need_a_current_workspace() {
        let state = testing::state();
        let (status, body) = state.request("/workspace/classes", &json!({}));
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "error");
        assert_eq!(body["code"], "NO_WORKSPACE");
    }

    #[test]
    fn non_object_bodies_are_rejected() {
        let state = testing::state();
        let endpoint = find_endpoint("/workspace/open").expect("endpoint");
        let (status, body) = state.call(endpoint, b"[1, 2]");
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_PARAMS");

        let (status, body) = state.call(endpoint, b"");
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Missing required parameter(s): path");
    }

    #[test]
    fn unknown_paths_report_the_path() {
        let state = testing::state();
        let (status, body) = state.request("/nope", &json!({}));
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Unknown endpoint: /nope");
    }

    #[tokio::test]
    async fn router_frames_errors_as_json() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        let bridge = Arc::new(testing::state());
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let server = tokio::spawn(serve_on(listener, bridge, async {
            let _ = stop_rx.await;
        }));

        let base = format!("http://{addr}");
        let responses = tokio::task::spawn_blocking(move || {
            let fetch = |method: &str, path: &str| -> (u16, String, String) {
                let request = ureq::request(method, &format!("{base}{path}"));
                let result = if method == "GET" {
                    request.call()
                } else {
                    request.send_string("{}")
                };
                let response = match result {
                    Ok(response) => response,
                    Err(ureq::Error::Status(_, response)) => response,
                    Err(err) => panic!("transport error: {err}"),
                };
                let status = response.status();
                let content_type = response.header("content-type").unwrap_or("").to_string();
                (status, content_type, response.into_string().expect("body"))
            };
            vec![
                fetch("GET", "/health"),
                fetch("GET", "/decompile"),
                fetch("POST", "/missing"),
            ]
        })
        .await
        .expect("client");

        assert_eq!(responses[0].0, 200);
        assert_eq!(responses[0].1, JSON_CONTENT_TYPE);
        assert_eq!(responses[1].0, 405);
        assert!(responses[1].2.contains("Method GET not allowed for /decompile"));
        assert_eq!(responses[2].0, 404);
        assert_eq!(responses[2].1, JSON_CONTENT_TYPE);

        let _ = stop_tx.send(());
        server.await.expect("join").expect("serve");
    }

    #[tokio::test]
    async fn oversized_bodies_get_a_json_envelope() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        let config = BridgeConfig {
            max_body_bytes: 64,
            ..BridgeConfig::default()
        };
        let bridge = Arc::new(BridgeState::new(Services::bundled(), config));
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let server = tokio::spawn(serve_on(listener, bridge, async {
            let _ = stop_rx.await;
        }));

        let url = format!("http://{addr}/workspace/open");
        let (status, content_type, body) = tokio::task::spawn_blocking(move || {
            let payload = json!({ "path": "x".repeat(1024) }).to_string();
            let response = match ureq::post(&url)
                .set("Content-Type", "application/json")
                .send_string(&payload)
            {
                Ok(response) => response,
                Err(ureq::Error::Status(_, response)) => response,
                Err(err) => panic!("transport error: {err}"),
            };
            let status = response.status();
            let content_type = response.header("content-type").unwrap_or("").to_string();
            (status, content_type, response.into_string().expect("body"))
        })
        .await
        .expect("client");

        assert_eq!(status, 413);
        assert_eq!(content_type, JSON_CONTENT_TYPE);
        let body: Value = serde_json::from_str(&body).expect("json body");
        assert_eq!(body["status"], "error");
        assert_eq!(body["code"], "INVALID_PARAMS");
        assert_eq!(body["message"], "Request body exceeds 64 bytes");

        let _ = stop_tx.send(());
        server.await.expect("join").expect("serve");
    }
}
