//! HTTP error mapping.
//!
//! Errors are rendered with the edge error body
//! `{"code": <status>, "errorMessage": "..."}`. Backend responses that the
//! pipelines chose to relay are returned exactly as the backend sent them.

use axum::{
    Json,
    body::Body,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use patron_edge_auth::TokenError;
use patron_edge_core::{EdgeError, UpstreamResponse};
use serde_json::json;

use crate::api_key::ApiKeyError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Edge(#[from] EdgeError),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    ApiKey(#[from] ApiKeyError),

    /// Missing or malformed `Authorization` header.
    #[error("{0}")]
    Unauthorized(String),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Edge(e) => match e {
                EdgeError::ValidationFailed(_) => StatusCode::UNPROCESSABLE_ENTITY,
                EdgeError::PatronNotFound { .. } | EdgeError::HoldNotFound { .. } => {
                    StatusCode::NOT_FOUND
                }
                EdgeError::UpstreamTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
                EdgeError::Upstream(response) => {
                    StatusCode::from_u16(response.status).unwrap_or(StatusCode::BAD_GATEWAY)
                }
                EdgeError::LookupFailed(_) | EdgeError::Backend(_) => StatusCode::BAD_GATEWAY,
            },
            Self::Token(e) => match e {
                TokenError::UpstreamTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
                e if e.is_access_denied() => StatusCode::UNAUTHORIZED,
                _ => StatusCode::BAD_GATEWAY,
            },
            Self::ApiKey(_) | Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let Self::Edge(EdgeError::Upstream(response)) = self {
            return relay(response);
        }

        let status = self.status_code();
        if status.is_server_error() {
            tracing::warn!(status = status.as_u16(), error = %self, "Request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %self, "Request rejected");
        }

        let body = Json(json!({
            "code": status.as_u16(),
            "errorMessage": self.to_string(),
        }));
        match self {
            Self::Token(_) | Self::Unauthorized(_) if status == StatusCode::UNAUTHORIZED => {
                (status, [(header::WWW_AUTHENTICATE, "Bearer")], body).into_response()
            }
            _ => (status, body).into_response(),
        }
    }
}

/// Returns a backend response to the client unchanged.
pub fn relay(upstream: UpstreamResponse) -> Response {
    let status = StatusCode::from_u16(upstream.status).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut response = Response::new(Body::from(upstream.body));
    *response.status_mut() = status;
    if let Some(content_type) = upstream
        .content_type
        .as_deref()
        .and_then(|v| HeaderValue::from_str(v).ok())
    {
        response
            .headers_mut()
            .insert(header::CONTENT_TYPE, content_type);
    }
    response
}
