use std::collections::HashMap;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use patron_edge_core::{EdgeError, HoldCancellationRequest, ProxyRequest, with_timeout};
use serde::Serialize;

use crate::api_key::ApiKey;
use crate::error::{ApiError, relay};
use crate::server::AppState;

/// Account query parameters relayed to the backend, in forwarding order.
pub const ACCOUNT_QUERY_PARAMS: [&str; 6] = [
    "includeLoans",
    "includeHolds",
    "includeCharges",
    "sortBy",
    "offset",
    "limit",
];

#[derive(Serialize)]
pub struct HealthResponse<'a> {
    status: &'a str,
}

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse { status: "ok" }))
}

/// Ready once both caches are initialized.
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    if state.identity_cache.is_initialized() && state.public_key_cache.is_initialized() {
        (StatusCode::OK, Json(HealthResponse { status: "ready" }))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse {
                status: "initializing",
            }),
        )
    }
}

/// `GET /patron/account/{extPatronId}`
pub async fn get_account(
    State(state): State<AppState>,
    Extension(api_key): Extension<ApiKey>,
    Path(ext_patron_id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, ApiError> {
    let patron_id = state.resolver.resolve(&api_key.tenant, &ext_patron_id).await?;

    let query = ACCOUNT_QUERY_PARAMS
        .iter()
        .filter_map(|name| params.get(*name).map(|v| (name.to_string(), v.clone())))
        .collect();
    let request = ProxyRequest::get(["patron", "account", patron_id.as_str()]).with_query(query);

    forward(&state, &api_key.tenant, request).await
}

/// `POST /patron/account/{extPatronId}/item/{itemId}/renew`
pub async fn renew_item(
    State(state): State<AppState>,
    Extension(api_key): Extension<ApiKey>,
    Path((ext_patron_id, item_id)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let patron_id = state.resolver.resolve(&api_key.tenant, &ext_patron_id).await?;
    let request = ProxyRequest::post(
        ["patron", "account", patron_id.as_str(), "item", item_id.as_str(), "renew"],
        None,
    );
    forward(&state, &api_key.tenant, request).await
}

/// `POST /patron/account/{extPatronId}/item/{itemId}/hold`
pub async fn place_item_hold(
    State(state): State<AppState>,
    Extension(api_key): Extension<ApiKey>,
    Path((ext_patron_id, item_id)): Path<(String, String)>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let patron_id = state.resolver.resolve(&api_key.tenant, &ext_patron_id).await?;
    let request = ProxyRequest::post(
        ["patron", "account", patron_id.as_str(), "item", item_id.as_str(), "hold"],
        Some(body),
    );
    forward(&state, &api_key.tenant, request).await
}

/// `POST /patron/account/{extPatronId}/instance/{instanceId}/hold`
pub async fn place_instance_hold(
    State(state): State<AppState>,
    Extension(api_key): Extension<ApiKey>,
    Path((ext_patron_id, instance_id)): Path<(String, String)>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let patron_id = state.resolver.resolve(&api_key.tenant, &ext_patron_id).await?;
    let request = ProxyRequest::post(
        [
            "patron",
            "account",
            patron_id.as_str(),
            "instance",
            instance_id.as_str(),
            "hold",
        ],
        Some(body),
    );
    forward(&state, &api_key.tenant, request).await
}

/// `POST /patron/account/{extPatronId}/hold/{holdId}/cancel`
pub async fn cancel_hold(
    State(state): State<AppState>,
    Extension(api_key): Extension<ApiKey>,
    Path((ext_patron_id, hold_id)): Path<(String, String)>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let request: HoldCancellationRequest = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("invalid cancellation body: {e}")))?;
    // Validate before resolving so a bad request costs no backend call.
    request.validate(&hold_id)?;

    let patron_id = state.resolver.resolve(&api_key.tenant, &ext_patron_id).await?;
    let response = state
        .orchestrator
        .cancel(&api_key.tenant, &patron_id, &hold_id, request)
        .await?;
    Ok(relay(response))
}

async fn forward(
    state: &AppState,
    tenant: &str,
    request: ProxyRequest,
) -> Result<Response, ApiError> {
    let response = with_timeout(state.request_timeout, state.accounts.forward(tenant, request))
        .await
        .map_err(EdgeError::from)?;
    Ok(relay(response))
}
