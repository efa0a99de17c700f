//! HTTP API
//!
//! The server buffers each request into an [`ApiRequest`] and hands it to
//! [`dispatch`], which routes on method and path segments and always answers
//! with a JSON [`ApiResponse`]. Handlers never see hyper types, so the whole
//! API can be driven in tests without a socket.
//!
//! | Method | Path | Access |
//! |--------|------|--------|
//! | GET | /health, /version | public |
//! | POST | /auth/challenge, /auth/verify | public |
//! | POST | /auth/refresh, /auth/logout; GET /auth/me | signed in |
//! | GET, PUT | /users/me | signed in |
//! | GET | /users/{address}, /roles/{address} | public |
//! | GET, POST | /applications | signed in |
//! | POST | /applications/{id}/approve, /applications/{id}/reject | admin |
//! | POST | /roles/grant, /roles/revoke | admin |
//! | GET | /conservation, /conservation/{id} | public |
//! | POST | /conservation | researcher |
//! | POST | /conservation/{id}/verify | admin |
//! | GET | /products, /products/{id}, /products/{id}/journey, /trace/{id} | public |
//! | POST | /products | fisher, farmer |
//! | POST | /products/{id}/stage | any supply-chain role |
//! | GET | /chain/stats, /chain/tx/{hash} | public |

pub mod applications;
pub mod auth_routes;
pub mod chain;
pub mod conservation;
pub mod health;
pub mod products;
pub mod users;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::header::{self, HeaderValue};
use hyper::{Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use seatrace_registry::{Address, Role};
use tracing::{error, warn};

use crate::auth::{
    extract_token_from_header, get_operation_description, get_required_permission, get_required_roles,
    is_operation_allowed, PermissionLevel,
};
use crate::db::users as user_store;
use crate::server::AppState;
use crate::types::{GatewayError, Result};

pub type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

/// Largest request body accepted, in bytes
pub const MAX_BODY_BYTES: usize = 64 * 1024;

// =============================================================================
// Request / Response
// =============================================================================

/// A fully buffered request
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub authorization: Option<String>,
    pub body: Bytes,
}

impl ApiRequest {
    pub fn new(method: Method, path_and_query: &str) -> Self {
        let (path, query) = match path_and_query.split_once('?') {
            Some((p, q)) => (p.to_string(), Some(q.to_string())),
            None => (path_and_query.to_string(), None),
        };
        Self {
            method,
            path,
            query,
            authorization: None,
            body: Bytes::new(),
        }
    }

    pub fn with_bearer(mut self, token: &str) -> Self {
        self.authorization = Some(format!("Bearer {}", token));
        self
    }

    pub fn with_json<T: Serialize>(mut self, body: &T) -> Self {
        self.body = serde_json::to_vec(body).map(Bytes::from).unwrap_or_default();
        self
    }

    /// Decode the JSON body
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        if self.body.is_empty() {
            return Err(GatewayError::BadRequest("Request body required".into()));
        }
        serde_json::from_slice(&self.body).map_err(|e| GatewayError::BadRequest(format!("Invalid JSON: {}", e)))
    }

    /// Decode the JSON body, or the type's default when there is none
    pub fn json_or_default<T: DeserializeOwned + Default>(&self) -> Result<T> {
        if self.body.iter().all(u8::is_ascii_whitespace) {
            return Ok(T::default());
        }
        self.json()
    }

    /// Decode the query string
    pub fn query<T: DeserializeOwned>(&self) -> Result<T> {
        serde_urlencoded::from_str(self.query.as_deref().unwrap_or(""))
            .map_err(|e| GatewayError::BadRequest(format!("Invalid query string: {}", e)))
    }
}

/// A JSON response
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: Option<serde_json::Value>,
}

impl ApiResponse {
    pub fn json<T: Serialize>(status: StatusCode, body: &T) -> Result<Self> {
        let value = serde_json::to_value(body)
            .map_err(|e| GatewayError::Internal(format!("Failed to encode response: {}", e)))?;
        Ok(Self {
            status,
            body: Some(value),
        })
    }

    pub fn ok<T: Serialize>(body: &T) -> Result<Self> {
        Self::json(StatusCode::OK, body)
    }

    pub fn created<T: Serialize>(body: &T) -> Result<Self> {
        Self::json(StatusCode::CREATED, body)
    }

    pub fn no_content() -> Self {
        Self {
            status: StatusCode::NO_CONTENT,
            body: None,
        }
    }

    pub fn error(err: &GatewayError) -> Self {
        let status = err.status_code();
        if status.is_server_error() {
            error!(error = %err, "Request failed");
        }
        Self {
            status,
            body: Some(serde_json::json!({
                "error": err.to_string(),
                "code": err.code(),
            })),
        }
    }

    /// Convert to a hyper response with CORS headers
    pub fn into_response(self) -> Response<BoxBody> {
        let mut response = match self.body {
            Some(value) => {
                let mut r = Response::new(full_body(value.to_string()));
                r.headers_mut()
                    .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
                r
            }
            None => Response::new(full_body(Bytes::new())),
        };
        *response.status_mut() = self.status;

        let headers = response.headers_mut();
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("GET, POST, PUT, OPTIONS"),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("Content-Type, Authorization"),
        );
        if self.status == StatusCode::NO_CONTENT {
            headers.insert(header::ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static("86400"));
        }
        response
    }
}

pub fn full_body(data: impl Into<Bytes>) -> BoxBody {
    Full::new(data.into()).map_err(|never| match never {}).boxed()
}

// =============================================================================
// Caller identity
// =============================================================================

/// A signed-in wallet with its current on-chain roles
#[derive(Debug, Clone)]
pub struct Caller {
    pub address: Address,
    pub roles: Vec<Role>,
    pub level: PermissionLevel,
}

/// Resolve the bearer token to a caller. Roles come from the chain, not the token.
pub async fn authenticate(state: &AppState, req: &ApiRequest) -> Result<Caller> {
    let token = extract_token_from_header(req.authorization.as_deref())
        .ok_or_else(|| GatewayError::Unauthorized("No token provided".into()))?;

    let result = state.jwt.verify_token(token);
    let claims = match result.claims {
        Some(claims) if result.valid => claims,
        _ => {
            let reason = result.error.unwrap_or_else(|| "Invalid token".into());
            warn!(path = %req.path, reason = %reason, "Rejected bearer token");
            return Err(GatewayError::Unauthorized(reason));
        }
    };

    let address = Address::parse(&claims.sub)
        .map_err(|_| GatewayError::Unauthorized("Token subject is not an address".into()))?;
    let user = state
        .db
        .with_conn(|conn| user_store::get_user(conn, address.as_str()))?
        .ok_or_else(|| GatewayError::Unauthorized("Unknown user".into()))?;
    if user.token_version != claims.version {
        warn!(address = %address, "Rejected revoked session token");
        return Err(GatewayError::Unauthorized("Token has been revoked".into()));
    }

    let roles = state.chain.roles_of(&address).await;
    let level = PermissionLevel::from_roles(&roles);
    Ok(Caller { address, roles, level })
}

/// Check the operation table for a signed-in caller
pub async fn authorize(state: &AppState, req: &ApiRequest, operation: &str) -> Result<Caller> {
    let required = get_required_permission(operation)
        .ok_or_else(|| GatewayError::Forbidden(format!("Unknown operation: {}", operation)))?;
    let caller = authenticate(state, req).await?;

    if !is_operation_allowed(operation, caller.level, &caller.roles) {
        let needed = get_required_roles(operation);
        let detail = if caller.level < required {
            format!("{} permission required", required)
        } else {
            let names: Vec<&str> = needed.iter().map(|r| r.as_str()).collect();
            format!("one of these roles required: {}", names.join(", "))
        };
        warn!(
            address = %caller.address,
            operation = get_operation_description(operation),
            "Operation denied"
        );
        return Err(GatewayError::Forbidden(format!(
            "{}: {}",
            get_operation_description(operation),
            detail
        )));
    }
    Ok(caller)
}

// =============================================================================
// Router
// =============================================================================

/// Route a request to its handler
pub async fn dispatch(state: &AppState, req: ApiRequest) -> ApiResponse {
    if req.method == Method::OPTIONS {
        return ApiResponse::no_content();
    }

    let segments = match path_segments(&req.path) {
        Ok(s) => s,
        Err(e) => return ApiResponse::error(&e),
    };
    let segs: Vec<&str> = segments.iter().map(String::as_str).collect();

    let result = match (&req.method, segs.as_slice()) {
        (&Method::GET, ["health"]) => health::health(state).await,
        (&Method::GET, ["version"]) => health::version(),

        (&Method::POST, ["auth", "challenge"]) => auth_routes::challenge(state, &req).await,
        (&Method::POST, ["auth", "verify"]) => auth_routes::verify(state, &req).await,
        (&Method::POST, ["auth", "refresh"]) => auth_routes::refresh(state, &req).await,
        (&Method::POST, ["auth", "logout"]) => auth_routes::logout(state, &req).await,
        (&Method::GET, ["auth", "me"]) => auth_routes::me(state, &req).await,

        (&Method::GET, ["users", "me"]) => users::get_me(state, &req).await,
        (&Method::PUT, ["users", "me"]) => users::update_me(state, &req).await,
        (&Method::GET, ["users", address]) => users::get_user(state, address).await,

        (&Method::GET, ["applications"]) => applications::list(state, &req).await,
        (&Method::POST, ["applications"]) => applications::submit(state, &req).await,
        (&Method::POST, ["applications", id, "approve"]) => applications::approve(state, &req, id).await,
        (&Method::POST, ["applications", id, "reject"]) => applications::reject(state, &req, id).await,

        (&Method::POST, ["roles", "grant"]) => applications::grant_role(state, &req).await,
        (&Method::POST, ["roles", "revoke"]) => applications::revoke_role(state, &req).await,
        (&Method::GET, ["roles", address]) => users::get_roles(state, address).await,

        (&Method::GET, ["conservation"]) => conservation::list(state, &req).await,
        (&Method::POST, ["conservation"]) => conservation::create(state, &req).await,
        (&Method::GET, ["conservation", id]) => conservation::get(state, id).await,
        (&Method::POST, ["conservation", id, "verify"]) => conservation::verify(state, &req, id).await,

        (&Method::GET, ["products"]) => products::list(state, &req).await,
        (&Method::POST, ["products"]) => products::create(state, &req).await,
        (&Method::GET, ["products", id]) => products::get(state, id).await,
        (&Method::GET, ["products", id, "journey"]) => products::journey(state, id).await,
        (&Method::POST, ["products", id, "stage"]) => products::update_stage(state, &req, id).await,
        (&Method::GET, ["trace", id]) => products::trace(state, id).await,

        (&Method::GET, ["chain", "stats"]) => chain::stats(state).await,
        (&Method::GET, ["chain", "tx", hash]) => chain::receipt(state, hash).await,

        (_, path) if is_known_path(path) => Err(GatewayError::MethodNotAllowed(format!(
            "{} {}",
            req.method, req.path
        ))),

        _ => Err(GatewayError::NotFound(format!("No route for {} {}", req.method, req.path))),
    };

    match result {
        Ok(response) => response,
        Err(err) => ApiResponse::error(&err),
    }
}

/// Split a path into percent-decoded segments, ignoring empty ones
fn path_segments(path: &str) -> Result<Vec<String>> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(|s| {
            urlencoding::decode(s)
                .map(|d| d.into_owned())
                .map_err(|_| GatewayError::BadRequest(format!("Invalid path encoding: {}", path)))
        })
        .collect()
}

/// Paths that exist under some other method
fn is_known_path(segs: &[&str]) -> bool {
    matches!(
        segs,
        ["health"]
            | ["version"]
            | ["auth", "challenge" | "verify" | "refresh" | "logout" | "me"]
            | ["users", _]
            | ["applications"]
            | ["applications", _, "approve" | "reject"]
            | ["roles", _]
            | ["conservation"]
            | ["conservation", _]
            | ["conservation", _, "verify"]
            | ["products"]
            | ["products", _]
            | ["products", _, "journey" | "stage"]
            | ["trace", _]
            | ["chain", "stats"]
            | ["chain", "tx", _]
    )
}
