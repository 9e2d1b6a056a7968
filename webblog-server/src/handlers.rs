//! HTTP request handlers for webblog server

use crate::gate::{current_principal, AuthGate, GateOutcome};
use crate::response::{json_response, ApiError, ApiResponse, ResponseBody};
use http_body_util::{BodyExt, Limited};
use hyper::body::Body;
use hyper::{Method, Request, Response, StatusCode};
use serde::Serialize;
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use tracing::{debug, info};
use webblog_core::auth::{LoginRequest, LoginService};

/// Largest accepted login body
const MAX_LOGIN_BODY: usize = 16 * 1024;

/// Shared per-process handler state. Cloned into every connection.
#[derive(Clone)]
pub struct AppState {
    gate: Arc<AuthGate>,
    login: Arc<LoginService>,
}

impl AppState {
    pub fn new(gate: Arc<AuthGate>, login: Arc<LoginService>) -> Self {
        AppState { gate, login }
    }
}

/// Public fields of the authenticated principal
#[derive(Debug, Serialize)]
struct PrincipalView {
    username: String,
    mail: Option<String>,
    created_at: String,
}

/// Main request handler: gate first, then route
pub async fn handle_request<B>(
    mut req: Request<B>,
    state: AppState,
) -> Result<Response<ResponseBody>, Infallible>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let outcome = state.gate.apply(&mut req).await;
    match &outcome {
        GateOutcome::Anonymous(reason) => {
            debug!("Handling {} {} anonymously ({:?})", method, path, reason)
        }
        _ => debug!("Handling {} {} ({:?})", method, path, outcome),
    }

    let result = match (&method, path.as_str()) {
        (&Method::GET, "/api/health") => handle_health(),
        (&Method::POST, "/api/auth/login") => handle_login(req, &state).await,
        (&Method::GET, "/api/auth/me") => handle_me(&req),
        _ => Err(ApiError::NotFound),
    };

    let response = result.unwrap_or_else(ApiError::into_response);
    info!("{} {} -> {}", method, path, response.status());
    Ok(response)
}

/// Health check handler
fn handle_health() -> Result<Response<ResponseBody>, ApiError> {
    Ok(json_response(
        StatusCode::OK,
        &ApiResponse::success(json!({
            "status": "UP",
            "message": "Backend is running",
            "timestamp": chrono::Utc::now().to_rfc3339(),
        })),
    ))
}

/// Login handler
async fn handle_login<B>(
    req: Request<B>,
    state: &AppState,
) -> Result<Response<ResponseBody>, ApiError>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let body_bytes = Limited::new(req.into_body(), MAX_LOGIN_BODY)
        .collect()
        .await
        .map_err(|_| ApiError::MalformedBody)?
        .to_bytes();

    let login_request: LoginRequest =
        serde_json::from_slice(&body_bytes).map_err(|_| ApiError::MalformedBody)?;

    let field_errors = login_request.field_errors();
    if !field_errors.is_empty() {
        return Err(ApiError::Validation(field_errors.join(", ")));
    }

    info!("Login attempt for user: {:?}", login_request.login);

    // Argon2 verification is CPU-bound; keep it off the reactor threads
    let login = state.login.clone();
    let response = tokio::task::spawn_blocking(move || login.authenticate(&login_request))
        .await
        .map_err(|e| ApiError::Internal(format!("login task failed: {}", e)))??;

    Ok(json_response(StatusCode::OK, &ApiResponse::success(response)))
}

/// Returns the caller's principal; requires authentication
fn handle_me<B>(req: &Request<B>) -> Result<Response<ResponseBody>, ApiError> {
    let principal = current_principal(req).ok_or(ApiError::Unauthorized)?;

    let view = PrincipalView {
        username: principal.subject.as_str().to_string(),
        mail: principal.mail().map(|m| m.as_str().to_string()),
        created_at: principal.created_at.to_rfc3339(),
    };

    Ok(json_response(StatusCode::OK, &ApiResponse::success(view)))
}
