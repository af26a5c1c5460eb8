// * HTTP Shell
// * Exposes the pipeline as GET /api/reviews plus /health and /metrics

use hyper::header::{
    HeaderValue, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_TYPE,
};
use hyper::{Body, Method, Request, Response, StatusCode};
use serde_json::json;
use std::convert::Infallible;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{error, info, warn};

use crate::config::ServiceConfig;
use crate::engine::pipeline::{ExtractionRequest, PipelineError, ReviewPipeline};
use crate::engine::renderer::ChromiumRenderer;
use crate::network::client::OllamaClient;
use crate::ops::telemetry;

const JSON_CONTENT_TYPE: &str = "application/json";

/// Shared state behind every connection
pub struct AppState {
    pub config: ServiceConfig,
    pub completer: Arc<OllamaClient>,
}

/// Server handle for graceful shutdown
pub struct ServerHandle {
    shutdown_tx: Option<oneshot::Sender<()>>,
    running: Arc<AtomicBool>,
}

impl ServerHandle {
    /// Signals the server to shut down
    pub fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        self.running.store(false, Ordering::Relaxed);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }
}

/// Binds the configured address and serves until shutdown
pub async fn start_server(state: Arc<AppState>) -> Result<ServerHandle, hyper::Error> {
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = running.clone();
    let addr = state.config.bind_addr;

    let make_svc = hyper::service::make_service_fn(move |_conn| {
        let state = state.clone();
        async move {
            Ok::<_, Infallible>(hyper::service::service_fn(move |req| {
                handle_request(state.clone(), req)
            }))
        }
    });

    let server = hyper::Server::try_bind(&addr)?
        .serve(make_svc)
        .with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        });

    info!(addr = %addr, "Review API listening");

    tokio::spawn(async move {
        if let Err(e) = server.await {
            error!(error = %e, "Review API server error");
        }
        running_clone.store(false, Ordering::Relaxed);
        info!("Review API stopped");
    });

    Ok(ServerHandle {
        shutdown_tx: Some(shutdown_tx),
        running,
    })
}

/// Routes one HTTP request
pub async fn handle_request(
    state: Arc<AppState>,
    req: Request<Body>,
) -> Result<Response<Body>, Infallible> {
    let response = match (req.method(), req.uri().path()) {
        (&Method::OPTIONS, _) => respond(StatusCode::NO_CONTENT, "text/plain", Body::empty()),
        (&Method::GET, "/api/reviews") => handle_reviews(&state, req.uri().query()).await,
        (_, "/api/reviews") => error_response(StatusCode::METHOD_NOT_ALLOWED, "only GET is supported"),
        (&Method::GET, "/health") => respond(StatusCode::OK, "text/plain", Body::from("OK")),
        (&Method::GET, "/metrics") => respond(
            StatusCode::OK,
            &telemetry::metrics_content_type(),
            Body::from(telemetry::get_metrics_string()),
        ),
        _ => respond(StatusCode::NOT_FOUND, "text/plain", Body::from("Not Found")),
    };
    Ok(response)
}

async fn handle_reviews(state: &AppState, query: Option<&str>) -> Response<Body> {
    let request = match parse_query(query) {
        Ok(request) => request,
        Err(message) => {
            telemetry::record_request("invalid_input");
            return error_response(StatusCode::BAD_REQUEST, &message);
        }
    };

    // * Reject bad input before a browser is launched
    if let Err(e) = request.validate(state.config.pipeline.default_max_pages) {
        telemetry::record_request(e.label());
        return error_response(StatusCode::BAD_REQUEST, &e.to_string());
    }

    let renderer = match ChromiumRenderer::launch(state.config.render.clone()).await {
        Ok(renderer) => renderer,
        Err(e) => {
            error!(error = %e, "Browser launch failed");
            telemetry::record_request("render_failure");
            return error_response(StatusCode::BAD_GATEWAY, &e.to_string());
        }
    };

    let pipeline = ReviewPipeline::new(renderer, state.completer.clone(), state.config.pipeline.clone());
    let deadline = tokio::time::sleep(state.config.request_timeout);

    match pipeline.run_until(&request, deadline).await {
        Ok(result) => respond(StatusCode::OK, JSON_CONTENT_TYPE, Body::from(result.to_json())),
        Err(e @ PipelineError::InvalidInput(_)) => error_response(StatusCode::BAD_REQUEST, &e.to_string()),
        Err(e @ PipelineError::Render(_)) => {
            warn!(url = %request.url, error = %e, "Returning 502");
            error_response(StatusCode::BAD_GATEWAY, &e.to_string())
        }
    }
}

/// Reads `url` and `max_pages` from a query string
///
/// A non-positive or non-numeric `max_pages` is rejected here, so the
/// pipeline only ever sees a u32 page bound.
pub fn parse_query(query: Option<&str>) -> Result<ExtractionRequest, String> {
    let mut target = None;
    let mut max_pages = None;

    for (key, value) in url::form_urlencoded::parse(query.unwrap_or("").as_bytes()) {
        match key.as_ref() {
            "url" => target = Some(value.into_owned()),
            "max_pages" => {
                let parsed: i64 = value
                    .trim()
                    .parse()
                    .map_err(|_| format!("max_pages must be a positive integer, got '{}'", value))?;
                if parsed <= 0 {
                    return Err(format!("max_pages must be a positive integer, got {}", parsed));
                }
                max_pages = Some(u32::try_from(parsed).unwrap_or(u32::MAX));
            }
            _ => {}
        }
    }

    let url = target
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| "missing required query parameter 'url'".to_string())?;

    Ok(ExtractionRequest { url, max_pages })
}

fn error_response(status: StatusCode, message: &str) -> Response<Body> {
    let body = json!({ "error": message }).to_string();
    respond(status, JSON_CONTENT_TYPE, Body::from(body))
}

fn respond(status: StatusCode, content_type: &str, body: Body) -> Response<Body> {
    let mut response = Response::new(body);
    *response.status_mut() = status;

    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(content_type) {
        headers.insert(CONTENT_TYPE, value);
    }
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static("GET, OPTIONS"));
    headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static("*"));
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> Arc<AppState> {
        Arc::new(AppState {
            config: ServiceConfig::default(),
            completer: Arc::new(OllamaClient::new("http://127.0.0.1:9", "mistral").unwrap()),
        })
    }

    #[test]
    fn test_parse_query_reads_both_params() {
        let request = parse_query(Some("url=https%3A%2F%2Fshop.test%2Fp%3Fid%3D1&max_pages=3")).unwrap();
        assert_eq!(request.url, "https://shop.test/p?id=1");
        assert_eq!(request.max_pages, Some(3));
    }

    #[test]
    fn test_parse_query_rejects_bad_page_bounds() {
        assert!(parse_query(Some("url=https://a.test&max_pages=0")).is_err());
        assert!(parse_query(Some("url=https://a.test&max_pages=-2")).is_err());
        assert!(parse_query(Some("url=https://a.test&max_pages=many")).is_err());
    }

    #[test]
    fn test_parse_query_requires_url() {
        assert!(parse_query(None).is_err());
        assert!(parse_query(Some("max_pages=2")).is_err());
        assert!(parse_query(Some("url=")).is_err());
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let req = Request::get("/health").body(Body::empty()).unwrap();
        let resp = handle_request(state(), req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    }

    #[tokio::test]
    async fn test_invalid_url_is_400_without_browser() {
        let req = Request::get("/api/reviews?url=notaurl").body(Body::empty()).unwrap();
        let resp = handle_request(state(), req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body = hyper::body::to_bytes(resp.into_body()).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(parsed["error"].as_str().unwrap().contains("Invalid input"));
    }

    #[tokio::test]
    async fn test_server_handle_lifecycle() {
        let mut config = ServiceConfig::default();
        config.bind_addr = "127.0.0.1:0".parse().unwrap();
        let state = Arc::new(AppState {
            config,
            completer: Arc::new(OllamaClient::new("http://127.0.0.1:9", "mistral").unwrap()),
        });

        let handle = start_server(state).await.unwrap();
        assert!(handle.is_running());
        handle.shutdown();
    }

    #[tokio::test]
    async fn test_unknown_path_is_404() {
        let req = Request::get("/nope").body(Body::empty()).unwrap();
        let resp = handle_request(state(), req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        telemetry::record_request("complete");
        let req = Request::get("/metrics").body(Body::empty()).unwrap();
        let resp = handle_request(state(), req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
