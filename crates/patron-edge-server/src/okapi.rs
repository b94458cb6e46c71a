//! Okapi backend client.
//!
//! Implements the backend traits over reqwest. Every request carries the
//! tenant and Okapi URL headers, plus the service token when one is
//! configured.

use async_trait::async_trait;
use bytes::Bytes;
use patron_edge_core::{
    AccountBackend, BackendError, CancellationPayload, HoldBackend, HoldRecord, PatronLookup,
    ProxyMethod, ProxyRequest, UpstreamResponse,
};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use crate::config::OkapiConfig;

pub const TENANT_HEADER: &str = "X-Okapi-Tenant";
pub const URL_HEADER: &str = "X-Okapi-Url";
pub const TOKEN_HEADER: &str = "X-Okapi-Token";

pub struct OkapiClient {
    http_client: reqwest::Client,
    base_url: Url,
    token: Option<String>,
}

/// The part of a `/users` search result the lookup needs.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserCollection {
    #[serde(default)]
    users: Vec<UserRecord>,
    #[serde(default)]
    total_records: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct UserRecord {
    id: String,
}

impl OkapiClient {
    pub fn new(config: &OkapiConfig) -> anyhow::Result<Self> {
        let base_url = Url::parse(&config.url)?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("okapi.url cannot carry a path: {}", config.url);
        }
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            http_client,
            base_url,
            token: config.token.clone(),
        })
    }

    /// Builds a backend URL from unencoded path segments.
    pub fn endpoint<I, S>(&self, segments: I) -> Result<Url, BackendError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| BackendError::Transport(format!("invalid base url {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: reqwest::Method, url: Url, tenant: &str) -> reqwest::RequestBuilder {
        let builder = self
            .http_client
            .request(method, url)
            .header(TENANT_HEADER, tenant)
            .header(URL_HEADER, self.base_url.as_str().trim_end_matches('/'))
            .header(ACCEPT, "application/json, text/plain");
        match &self.token {
            Some(token) => builder.header(TOKEN_HEADER, token),
            None => builder,
        }
    }

    async fn send(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<UpstreamResponse, BackendError> {
        let response = builder.send().await.map_err(map_transport_error)?;
        into_upstream(response).await
    }
}

/// Escapes a value for use inside a double-quoted CQL term.
fn cql_quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        if matches!(c, '"' | '\\' | '*' | '?' | '^') {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

async fn into_upstream(response: reqwest::Response) -> Result<UpstreamResponse, BackendError> {
    let status = response.status().as_u16();
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = response.bytes().await.map_err(map_transport_error)?;
    Ok(UpstreamResponse {
        status,
        content_type,
        body,
    })
}

fn map_transport_error(error: reqwest::Error) -> BackendError {
    if error.is_timeout() {
        BackendError::Timeout
    } else {
        BackendError::Transport(error.to_string())
    }
}

#[async_trait]
impl PatronLookup for OkapiClient {
    async fn lookup_internal_id(
        &self,
        tenant: &str,
        external_id: &str,
    ) -> Result<String, BackendError> {
        let url = self.endpoint(["users"])?;
        let query = format!("externalSystemId=={}", cql_quote(external_id));
        let builder = self
            .request(reqwest::Method::GET, url, tenant)
            .query(&[("query", query.as_str()), ("limit", "1")]);

        let response = self.send(builder).await?;
        if !response.is_success() {
            warn!(tenant = %tenant, status = response.status, "User lookup rejected");
            return Err(BackendError::Status(response));
        }

        let collection: UserCollection = serde_json::from_slice(&response.body)
            .map_err(|e| BackendError::Decode(format!("user collection: {e}")))?;
        if collection.total_records == Some(0) {
            return Err(BackendError::NotFound);
        }
        let user = collection
            .users
            .into_iter()
            .next()
            .ok_or(BackendError::NotFound)?;
        debug!(tenant = %tenant, external_id = %external_id, "Resolved patron");
        Ok(user.id)
    }
}

#[async_trait]
impl HoldBackend for OkapiClient {
    async fn fetch_hold(&self, tenant: &str, hold_id: &str) -> Result<HoldRecord, BackendError> {
        let url = self.endpoint(["circulation", "requests", hold_id])?;
        let response = self
            .send(self.request(reqwest::Method::GET, url, tenant))
            .await?;

        match response.status {
            404 => Err(BackendError::NotFound),
            status if (200..300).contains(&status) => serde_json::from_slice(&response.body)
                .map_err(|e| BackendError::Decode(format!("hold record: {e}"))),
            _ => Err(BackendError::Status(response)),
        }
    }

    async fn submit_cancellation(
        &self,
        tenant: &str,
        patron_id: &str,
        hold_id: &str,
        payload: &CancellationPayload,
    ) -> Result<UpstreamResponse, BackendError> {
        let url = self.endpoint(["patron", "account", patron_id, "hold", hold_id, "cancel"])?;
        let builder = self
            .request(reqwest::Method::POST, url, tenant)
            .json(payload);
        self.send(builder).await
    }
}

#[async_trait]
impl AccountBackend for OkapiClient {
    async fn forward(
        &self,
        tenant: &str,
        request: ProxyRequest,
    ) -> Result<UpstreamResponse, BackendError> {
        let url = self.endpoint(&request.path)?;
        let method = match request.method {
            ProxyMethod::Get => reqwest::Method::GET,
            ProxyMethod::Post => reqwest::Method::POST,
        };
        debug!(
            tenant = %tenant,
            method = %method,
            path = %request.display_path(),
            "Forwarding to backend"
        );

        let mut builder = self.request(method, url, tenant);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = request.body.filter(|b: &Bytes| !b.is_empty()) {
            builder = builder.header(CONTENT_TYPE, "application/json").body(body);
        }
        self.send(builder).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(url: &str) -> OkapiClient {
        OkapiClient::new(&OkapiConfig {
            url: url.into(),
            ..OkapiConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_endpoint_encodes_segments() {
        let client = client("http://okapi:9130/");
        let url = client
            .endpoint(["circulation", "requests", "a/b"])
            .unwrap();
        assert_eq!(url.as_str(), "http://okapi:9130/circulation/requests/a%2Fb");
    }

    #[test]
    fn test_cql_quote() {
        assert_eq!(cql_quote("12345"), "\"12345\"");
        assert_eq!(cql_quote("a\"b*"), "\"a\\\"b\\*\"");
    }

    #[test]
    fn test_rejects_non_base_url() {
        let result = OkapiClient::new(&OkapiConfig {
            url: "mailto:ops@example.org".into(),
            ..OkapiConfig::default()
        });
        assert!(result.is_err());
    }
}
