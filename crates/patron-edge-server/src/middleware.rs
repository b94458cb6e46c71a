use axum::extract::State;
use axum::response::IntoResponse;
use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Request, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::api_key::ApiKey;
use crate::error::ApiError;
use crate::server::AppState;

// =============================================================================
// Authentication Middleware
// =============================================================================

/// Authenticates patron requests.
///
/// 1. Public endpoints pass through untouched.
/// 2. The edge API key is decoded; its tenant scopes the request.
/// 3. When bearer auth is enabled, the token is verified against the
///    tenant's realm.
///
/// The [`ApiKey`] and, when present, the verified
/// [`TokenClaims`](patron_edge_auth::TokenClaims) are stored in request
/// extensions for the handlers.
pub async fn authentication_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    if should_skip_authentication(&req) {
        return next.run(req).await;
    }

    let api_key = match ApiKey::from_request(req.uri(), req.headers()) {
        Ok(key) => key,
        Err(e) => {
            tracing::debug!(path = %req.uri().path(), error = %e, "API key rejected");
            return ApiError::from(e).into_response();
        }
    };

    if let Some(verifier) = state.verifier.as_ref() {
        let auth_header = match req.headers().get(AUTHORIZATION).and_then(|h| h.to_str().ok()) {
            Some(header) => header,
            None => {
                tracing::debug!(path = %req.uri().path(), "No Authorization header");
                return ApiError::Unauthorized("Authentication required".into()).into_response();
            }
        };

        let token = match auth_header.strip_prefix("Bearer ") {
            Some(t) if !t.trim().is_empty() => t.trim(),
            _ => {
                return ApiError::Unauthorized("Invalid Authorization header format".into())
                    .into_response();
            }
        };

        match verifier.verify(token, &api_key.tenant).await {
            Ok(claims) => {
                tracing::debug!(
                    tenant = %api_key.tenant,
                    subject = %claims.sub,
                    "Token validated successfully"
                );
                req.extensions_mut().insert(claims);
            }
            Err(e) => {
                tracing::debug!(tenant = %api_key.tenant, error = %e, "Token validation failed");
                return ApiError::from(e).into_response();
            }
        }
    }

    req.extensions_mut().insert(api_key);
    next.run(req).await
}

/// Check if a request should skip authentication.
fn should_skip_authentication(req: &Request<Body>) -> bool {
    let public_paths = ["/healthz", "/readyz"];
    public_paths.contains(&req.uri().path())
}

// =============================================================================
// Other Middleware
// =============================================================================

// Middleware that ensures each request has an X-Request-Id and mirrors it on the response
pub async fn request_id(mut req: Request<Body>, next: Next) -> Response {
    let header_name = HeaderName::from_static("x-request-id");

    // If the incoming request already has a request-id, preserve it; otherwise generate one
    let req_id_value = req
        .headers()
        .get(&header_name)
        .cloned()
        .or_else(|| HeaderValue::from_str(&Uuid::new_v4().to_string()).ok());

    // Add to request extensions for downstream usage (e.g., logging)
    if let Some(value) = req_id_value.clone() {
        req.extensions_mut().insert(value);
    }

    let mut res = next.run(req).await;

    if let Some(value) = req_id_value {
        res.headers_mut().insert(header_name, value);
    }

    res
}
