//! Bearer token verification.
//!
//! [`TokenVerifier::verify`] checks a token against the signing keys of the
//! tenant's realm:
//!
//! 1. The header is decoded first; a malformed token never causes a fetch.
//! 2. The realm's key set comes from the [`PublicKeyCache`], or from the
//!    [`KeySetFetcher`] on a miss. A "realm not found" answer is cached as a
//!    negative entry; other fetch failures are not cached.
//! 3. The key matching the header's `kid` is selected. A `kid` missing from
//!    a cached key set is rejected without refetching.
//! 4. Signature, expiry and (optionally) issuer are validated.

use std::sync::Arc;
use std::time::Duration;

use jsonwebtoken::jwk::{Jwk, JwkSet, KeyAlgorithm};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use patron_edge_cache::{CacheLookup, PublicKeyCache};

use crate::claims::TokenClaims;
use crate::error::{KeyFetchError, TokenError};
use crate::jwks::KeySetFetcher;

/// Placeholder replaced with the realm name in [`TokenVerifierConfig::issuer_template`].
pub const REALM_PLACEHOLDER: &str = "{realm}";

/// Configuration for [`TokenVerifier`].
#[derive(Debug, Clone)]
pub struct TokenVerifierConfig {
    /// Upper bound on a single key-set fetch (default: 10 seconds).
    pub request_timeout: Duration,

    /// Expected issuer, e.g. `https://kc.example.org/realms/{realm}`.
    /// Issuer is not checked when unset.
    pub issuer_template: Option<String>,

    /// Clock skew tolerance in seconds for `exp` (default: 60).
    pub leeway_secs: u64,
}

impl Default for TokenVerifierConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            issuer_template: None,
            leeway_secs: 60,
        }
    }
}

impl TokenVerifierConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the key-set fetch timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the expected issuer template.
    #[must_use]
    pub fn with_issuer_template(mut self, template: impl Into<String>) -> Self {
        self.issuer_template = Some(template.into());
        self
    }

    /// Sets the clock skew tolerance.
    #[must_use]
    pub fn with_leeway_secs(mut self, leeway: u64) -> Self {
        self.leeway_secs = leeway;
        self
    }

    /// Expected issuer for `realm`, if issuer checking is enabled.
    pub fn issuer_for(&self, realm: &str) -> Option<String> {
        self.issuer_template
            .as_ref()
            .map(|template| template.replace(REALM_PLACEHOLDER, realm))
    }
}

/// Verifies bearer tokens against per-realm signing keys.
pub struct TokenVerifier {
    keys: Arc<PublicKeyCache>,
    fetcher: Arc<dyn KeySetFetcher>,
    config: TokenVerifierConfig,
}

impl TokenVerifier {
    /// Creates a new verifier.
    pub fn new(
        keys: Arc<PublicKeyCache>,
        fetcher: Arc<dyn KeySetFetcher>,
        config: TokenVerifierConfig,
    ) -> Self {
        Self {
            keys,
            fetcher,
            config,
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &TokenVerifierConfig {
        &self.config
    }

    /// Verifies `token` against the signing keys of `realm` and returns its claims.
    ///
    /// # Errors
    ///
    /// - [`TokenError::InvalidToken`] - malformed token, bad signature, expired or wrong issuer
    /// - [`TokenError::UnknownSigningKey`] - no key in the realm's key set matches the `kid`
    /// - [`TokenError::KeyFetchFailed`] - the key set could not be obtained or parsed
    /// - [`TokenError::UpstreamTimeout`] - the key-set fetch exceeded the request timeout
    pub async fn verify(&self, token: &str, realm: &str) -> Result<TokenClaims, TokenError> {
        let header = decode_header(token).map_err(|e| TokenError::invalid_token(e.to_string()))?;

        let document = self.key_set(realm).await?;
        let jwks: JwkSet = serde_json::from_str(&document).map_err(|e| {
            tracing::warn!(realm = %realm, error = %e, "Realm key set is not a valid JWKS");
            TokenError::key_fetch_failed(realm, format!("malformed key set: {e}"))
        })?;

        let kid = header.kid.as_deref();
        let jwk = kid
            .and_then(|kid| jwks.find(kid))
            .ok_or_else(|| TokenError::unknown_signing_key(kid))?;

        if let Some(expected) = jwk_algorithm(jwk)
            && expected != header.alg
        {
            return Err(TokenError::invalid_token(format!(
                "token algorithm {:?} does not match key algorithm {:?}",
                header.alg, expected
            )));
        }

        let key = DecodingKey::from_jwk(jwk).map_err(|e| {
            TokenError::key_fetch_failed(realm, format!("unusable signing key: {e}"))
        })?;

        let validation = self.validation(header.alg, realm);
        let data = decode::<TokenClaims>(token, &key, &validation)
            .map_err(|e| TokenError::invalid_token(e.to_string()))?;

        tracing::trace!(realm = %realm, sub = %data.claims.sub, "Token verified");
        Ok(data.claims)
    }

    fn validation(&self, alg: Algorithm, realm: &str) -> Validation {
        let mut validation = Validation::new(alg);
        validation.validate_exp = true;
        validation.validate_aud = false;
        validation.leeway = self.config.leeway_secs;
        validation.set_required_spec_claims(&["exp", "sub"]);
        if let Some(issuer) = self.config.issuer_for(realm) {
            validation.set_issuer(&[issuer]);
        }
        validation
    }

    /// Returns the realm's key-set document, from cache or freshly fetched.
    async fn key_set(&self, realm: &str) -> Result<String, TokenError> {
        match self.keys.get(realm) {
            Ok(CacheLookup::Hit(document)) => {
                tracing::trace!(realm = %realm, "Key set cache hit");
                return Ok(document);
            }
            Ok(CacheLookup::KnownAbsent) => {
                return Err(TokenError::key_fetch_failed(realm, "realm not found"));
            }
            Ok(CacheLookup::Miss) => {
                tracing::debug!(realm = %realm, "Key set cache miss");
            }
            Err(e) => {
                tracing::debug!(realm = %realm, error = %e, "Key set cache unavailable");
            }
        }

        let fetched = tokio::time::timeout(
            self.config.request_timeout,
            self.fetcher.fetch_realm_keys(realm),
        )
        .await
        .map_err(|_| TokenError::upstream_timeout(realm))?;

        match fetched {
            Ok(document) => {
                self.remember(realm, Some(document.clone()));
                Ok(document)
            }
            Err(KeyFetchError::NotFound(_)) => {
                self.remember(realm, None);
                Err(TokenError::key_fetch_failed(realm, "realm not found"))
            }
            Err(KeyFetchError::Timeout) => Err(TokenError::upstream_timeout(realm)),
            Err(e) => Err(TokenError::key_fetch_failed(realm, e.to_string())),
        }
    }

    fn remember(&self, realm: &str, document: Option<String>) {
        if let Err(e) = self.keys.put(realm, document) {
            tracing::debug!(realm = %realm, error = %e, "Key set not cached");
        }
    }
}

/// Extracts the algorithm from a JWK.
fn jwk_algorithm(jwk: &Jwk) -> Option<Algorithm> {
    jwk.common.key_algorithm.as_ref().and_then(|alg| match alg {
        KeyAlgorithm::RS256 => Some(Algorithm::RS256),
        KeyAlgorithm::RS384 => Some(Algorithm::RS384),
        KeyAlgorithm::RS512 => Some(Algorithm::RS512),
        KeyAlgorithm::ES256 => Some(Algorithm::ES256),
        KeyAlgorithm::ES384 => Some(Algorithm::ES384),
        KeyAlgorithm::PS256 => Some(Algorithm::PS256),
        KeyAlgorithm::PS384 => Some(Algorithm::PS384),
        KeyAlgorithm::PS512 => Some(Algorithm::PS512),
        KeyAlgorithm::EdDSA => Some(Algorithm::EdDSA),
        _ => None,
    })
}
