//! JSON envelope responses and HTTP error mapping

use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{HeaderValue, CONTENT_TYPE, SERVER};
use hyper::{Response, StatusCode};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};
use webblog_core::WebblogError;

pub type ResponseBody = Full<Bytes>;

/// `{ data, success, message }` with `null` fields omitted
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        ApiResponse {
            data: Some(data),
            success: true,
            message: None,
        }
    }
}

impl ApiResponse<()> {
    pub fn error(message: impl Into<String>) -> Self {
        ApiResponse {
            data: None,
            success: false,
            message: Some(message.into()),
        }
    }
}

/// Build a JSON response
pub fn json_response<T: Serialize>(
    status: StatusCode,
    body: &ApiResponse<T>,
) -> Response<ResponseBody> {
    let bytes = match serde_json::to_vec(body) {
        Ok(bytes) => Bytes::from(bytes),
        Err(e) => {
            error!("Failed to serialize response: {}", e);
            return json_fallback(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    let mut response = Response::new(Full::new(bytes));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
        .headers_mut()
        .insert(SERVER, HeaderValue::from_static("webblog/0.1.0"));
    response
}

fn json_fallback(status: StatusCode) -> Response<ResponseBody> {
    let mut response = Response::new(Full::new(Bytes::from_static(
        br#"{"success":false,"message":"Internal server error"}"#,
    )));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

/// Errors a route can answer with
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Malformed request body")]
    MalformedBody,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Unauthorized access")]
    Unauthorized,

    #[error("Not found")]
    NotFound,

    #[error("Internal server error")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::MalformedBody => StatusCode::BAD_REQUEST,
            ApiError::InvalidCredentials | ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn into_response(self) -> Response<ResponseBody> {
        match &self {
            ApiError::Internal(detail) => error!("Unexpected error: {}", detail),
            ApiError::Unauthorized => warn!("Unauthorized access attempt"),
            _ => {}
        }
        json_response(self.status(), &ApiResponse::error(self.to_string()))
    }
}

impl From<WebblogError> for ApiError {
    fn from(e: WebblogError) -> Self {
        match e {
            WebblogError::InvalidCredentials => ApiError::InvalidCredentials,
            // Token and lookup failures are never surfaced distinctly
            e if e.is_token_rejection() => ApiError::Unauthorized,
            WebblogError::PrincipalNotFound => ApiError::Unauthorized,
            other => ApiError::Internal(other.to_string()),
        }
    }
}
