//! Realm key-set fetching.
//!
//! The identity provider publishes each realm's public signing keys as a
//! JSON Web Key Set at
//! `{base}/realms/{realm}/protocol/openid-connect/certs`.
//!
//! - [`KeySetFetcher`] - the seam the verifier fetches through
//! - [`KeycloakKeySetFetcher`] - the HTTP implementation
//! - [`KeycloakConfig`] - endpoint, timeout and response-size settings
//!
//! Fetchers return the raw document. Parsing into a `JwkSet` happens in the
//! verifier so the cache stores exactly what the provider served.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::KeyFetchError;

/// Source of realm key-set documents.
#[async_trait]
pub trait KeySetFetcher: Send + Sync {
    /// Fetches the serialized JWKS document for `realm`.
    ///
    /// Returns [`KeyFetchError::NotFound`] when the provider does not know the
    /// realm; callers treat that answer as cacheable.
    async fn fetch_realm_keys(&self, realm: &str) -> Result<String, KeyFetchError>;
}

/// Identity provider connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeycloakConfig {
    /// Base URL of the identity provider.
    pub url: String,

    /// HTTP request timeout (default: 10 seconds).
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Maximum key-set response size in bytes (default: 1 MB).
    pub max_response_size: usize,
}

impl Default for KeycloakConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8080".to_string(),
            request_timeout: Duration::from_secs(10),
            max_response_size: 1024 * 1024,
        }
    }
}

impl KeycloakConfig {
    /// Creates a configuration for the given base URL with default limits.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Sets the HTTP request timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the maximum response size.
    #[must_use]
    pub fn with_max_response_size(mut self, size: usize) -> Self {
        self.max_response_size = size;
        self
    }
}

/// Fetches realm key sets from a Keycloak-compatible identity provider.
pub struct KeycloakKeySetFetcher {
    http_client: reqwest::Client,
    base_url: Url,
    config: KeycloakConfig,
}

impl KeycloakKeySetFetcher {
    /// Creates a fetcher for the configured identity provider.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL cannot be parsed or cannot carry a
    /// path, or if the HTTP client cannot be built.
    pub fn new(config: KeycloakConfig) -> Result<Self, KeyFetchError> {
        let base_url = Url::parse(&config.url)
            .map_err(|e| KeyFetchError::InvalidUrl(format!("{}: {e}", config.url)))?;
        if base_url.cannot_be_a_base() {
            return Err(KeyFetchError::InvalidUrl(config.url.clone()));
        }

        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| KeyFetchError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url,
            config,
        })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &KeycloakConfig {
        &self.config
    }

    /// Builds the certs endpoint for `realm`. The realm is percent-encoded
    /// as a single path segment.
    pub fn certs_url(&self, realm: &str) -> Result<Url, KeyFetchError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| KeyFetchError::InvalidUrl(self.config.url.clone()))?
            .pop_if_empty()
            .extend(["realms", realm, "protocol", "openid-connect", "certs"]);
        Ok(url)
    }
}

#[async_trait]
impl KeySetFetcher for KeycloakKeySetFetcher {
    async fn fetch_realm_keys(&self, realm: &str) -> Result<String, KeyFetchError> {
        let url = self.certs_url(realm)?;

        tracing::debug!(realm = %realm, url = %url, "Fetching realm key set");

        let response = self
            .http_client
            .get(url.as_str())
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(realm = %realm, error = %e, "Failed to fetch realm key set");
                map_transport_error(e)
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(KeyFetchError::NotFound(realm.to_string()));
        }
        if !status.is_success() {
            return Err(KeyFetchError::HttpStatus(status.as_u16()));
        }

        if let Some(len) = response.content_length()
            && exceeds_limit(len, self.config.max_response_size)
        {
            return Err(KeyFetchError::ResponseTooLarge {
                max_size: self.config.max_response_size,
            });
        }

        let body = response.text().await.map_err(map_transport_error)?;

        // Chunked responses carry no content length.
        if body.len() > self.config.max_response_size {
            return Err(KeyFetchError::ResponseTooLarge {
                max_size: self.config.max_response_size,
            });
        }

        tracing::debug!(realm = %realm, bytes = body.len(), "Fetched realm key set");
        Ok(body)
    }
}

/// Compared in `u64` so a large declared length never wraps on 32-bit targets.
fn exceeds_limit(content_length: u64, max_size: usize) -> bool {
    content_length > max_size as u64
}

fn map_transport_error(error: reqwest::Error) -> KeyFetchError {
    if error.is_timeout() {
        KeyFetchError::Timeout
    } else {
        KeyFetchError::Network(error.to_string())
    }
}
