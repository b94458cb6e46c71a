//! Backend collaborator traits and the response type passed through to clients.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::BackendError;
use crate::model::{CancellationPayload, HoldRecord};

/// A backend HTTP response relayed verbatim to the edge client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl UpstreamResponse {
    pub fn new(status: u16, content_type: Option<String>, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            content_type,
            body: body.into(),
        }
    }

    /// A JSON response.
    pub fn json(status: u16, value: &serde_json::Value) -> Self {
        Self::new(
            status,
            Some("application/json".to_string()),
            value.to_string(),
        )
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyMethod {
    Get,
    Post,
}

/// A request forwarded to the backend without interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyRequest {
    pub method: ProxyMethod,
    /// Backend path segments, unencoded.
    pub path: Vec<String>,
    pub query: Vec<(String, String)>,
    pub body: Option<Bytes>,
}

impl ProxyRequest {
    pub fn get<I, S>(path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            method: ProxyMethod::Get,
            path: path.into_iter().map(Into::into).collect(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn post<I, S>(path: I, body: Option<Bytes>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            method: ProxyMethod::Post,
            path: path.into_iter().map(Into::into).collect(),
            query: Vec::new(),
            body,
        }
    }

    pub fn with_query(mut self, query: Vec<(String, String)>) -> Self {
        self.query = query;
        self
    }

    /// The path as a display string, e.g. `/patron/account/42`.
    pub fn display_path(&self) -> String {
        format!("/{}", self.path.join("/"))
    }
}

/// Maps external patron ids to the backend's internal ids.
#[async_trait]
pub trait PatronLookup: Send + Sync {
    /// Returns the internal id, or [`BackendError::NotFound`] when no patron matches.
    async fn lookup_internal_id(
        &self,
        tenant: &str,
        external_id: &str,
    ) -> Result<String, BackendError>;
}

/// Hold (request) records and their cancellation.
#[async_trait]
pub trait HoldBackend: Send + Sync {
    /// Reads the hold; non-404 failures carry the backend response.
    async fn fetch_hold(&self, tenant: &str, hold_id: &str) -> Result<HoldRecord, BackendError>;

    /// Submits the cancellation. Any HTTP answer is `Ok`; only transport
    /// failures and timeouts are errors.
    async fn submit_cancellation(
        &self,
        tenant: &str,
        patron_id: &str,
        hold_id: &str,
        payload: &CancellationPayload,
    ) -> Result<UpstreamResponse, BackendError>;
}

/// Pass-through patron account operations.
#[async_trait]
pub trait AccountBackend: Send + Sync {
    /// Forwards the request. Any HTTP answer is `Ok`.
    async fn forward(
        &self,
        tenant: &str,
        request: ProxyRequest,
    ) -> Result<UpstreamResponse, BackendError>;
}

/// Bounds a backend call by `duration`; elapsing yields [`BackendError::Timeout`].
pub async fn with_timeout<T, F>(duration: Duration, call: F) -> Result<T, BackendError>
where
    F: Future<Output = Result<T, BackendError>>,
{
    tokio::time::timeout(duration, call)
        .await
        .unwrap_or(Err(BackendError::Timeout))
}
