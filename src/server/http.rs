//! HTTP server implementation
//!
//! hyper http1 with TokioIo; every connection gets its own task.

use http_body_util::{BodyExt, Limited};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{header, Request, Response};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use super::AppState;
use crate::auth::challenge::spawn_cleanup_task;
use crate::routes::{self, ApiRequest, ApiResponse, BoxBody, MAX_BODY_BYTES};
use crate::types::{GatewayError, Result};

/// How often expired sign-in challenges are swept
const CHALLENGE_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

pub async fn run(state: Arc<AppState>) -> Result<()> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!("SeaTrace gateway listening on {}", state.args.listen);
    if state.args.dev_mode {
        warn!("Development mode enabled - insecure JWT secret allowed");
    }

    spawn_cleanup_task(Arc::clone(&state.challenges), CHALLENGE_SWEEP_INTERVAL);

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

/// Buffer the request, route it, and log the outcome
async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> std::result::Result<Response<BoxBody>, hyper::Error> {
    let started = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = match buffer_request(req).await {
        Ok(api_req) => routes::dispatch(&state, api_req).await,
        Err(e) => ApiResponse::error(&e),
    };

    let status = response.status;
    let elapsed_ms = started.elapsed().as_millis() as u64;
    if status.is_server_error() {
        warn!(%addr, %method, %path, status = status.as_u16(), elapsed_ms, "Request failed");
    } else {
        info!(%addr, %method, %path, status = status.as_u16(), elapsed_ms, "Request handled");
    }

    Ok(response.into_response())
}

async fn buffer_request(req: Request<Incoming>) -> Result<ApiRequest> {
    let (parts, body) = req.into_parts();

    if let Some(len) = parts
        .headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok())
    {
        if len > MAX_BODY_BYTES {
            return Err(too_large());
        }
    }

    let body = Limited::new(body, MAX_BODY_BYTES)
        .collect()
        .await
        .map_err(|e| {
            debug!("Failed to read request body: {}", e);
            if e.is::<http_body_util::LengthLimitError>() {
                too_large()
            } else {
                GatewayError::BadRequest(format!("Failed to read body: {}", e))
            }
        })?
        .to_bytes();

    let authorization = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    Ok(ApiRequest {
        method: parts.method,
        path: parts.uri.path().to_string(),
        query: parts.uri.query().map(str::to_string),
        authorization,
        body,
    })
}

fn too_large() -> GatewayError {
    GatewayError::PayloadTooLarge(format!("Request body exceeds {} bytes", MAX_BODY_BYTES))
}
