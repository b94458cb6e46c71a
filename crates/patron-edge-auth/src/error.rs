//! Error types for key-set fetching and token verification.

/// Errors that can occur while fetching a realm's key set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyFetchError {
    /// The identity provider does not know the realm.
    #[error("Realm not found: {0}")]
    NotFound(String),

    /// The request returned a non-success status code.
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),

    /// A network error occurred while fetching the key set.
    #[error("Network error: {0}")]
    Network(String),

    /// The request did not complete within the configured timeout.
    #[error("Request timed out")]
    Timeout,

    /// The response exceeded the maximum allowed size.
    #[error("Response exceeds maximum size of {max_size} bytes")]
    ResponseTooLarge {
        /// The maximum allowed size.
        max_size: usize,
    },

    /// The key endpoint URL could not be built.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

/// Errors that can occur while verifying a bearer token.
///
/// `UnknownSigningKey` and `InvalidToken` are access-denied conditions; the
/// other variants describe a failure to reach or use the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    /// The realm's key set could not be obtained.
    #[error("Failed to obtain signing keys for realm {realm}: {message}")]
    KeyFetchFailed {
        /// The realm whose keys were requested.
        realm: String,
        /// Description of the failure.
        message: String,
    },

    /// No key in the realm's key set matches the token's key id.
    #[error("Unknown signing key: {}", kid.as_deref().unwrap_or("<missing kid>"))]
    UnknownSigningKey {
        /// The key id from the token header, if any.
        kid: Option<String>,
    },

    /// The token is malformed, has a bad signature, or carries invalid claims.
    #[error("Invalid token: {message}")]
    InvalidToken {
        /// Description of why the token is invalid.
        message: String,
    },

    /// Fetching the realm's key set exceeded the request timeout.
    #[error("Upstream timed out fetching signing keys for realm {realm}")]
    UpstreamTimeout {
        /// The realm whose keys were requested.
        realm: String,
    },
}

impl TokenError {
    /// Creates a new `KeyFetchFailed` error.
    #[must_use]
    pub fn key_fetch_failed(realm: impl Into<String>, message: impl Into<String>) -> Self {
        Self::KeyFetchFailed {
            realm: realm.into(),
            message: message.into(),
        }
    }

    /// Creates a new `UnknownSigningKey` error.
    #[must_use]
    pub fn unknown_signing_key(kid: Option<&str>) -> Self {
        Self::UnknownSigningKey {
            kid: kid.map(str::to_string),
        }
    }

    /// Creates a new `InvalidToken` error.
    #[must_use]
    pub fn invalid_token(message: impl Into<String>) -> Self {
        Self::InvalidToken {
            message: message.into(),
        }
    }

    /// Creates a new `UpstreamTimeout` error.
    #[must_use]
    pub fn upstream_timeout(realm: impl Into<String>) -> Self {
        Self::UpstreamTimeout {
            realm: realm.into(),
        }
    }

    /// Returns `true` if the caller should be denied access.
    #[must_use]
    pub fn is_access_denied(&self) -> bool {
        matches!(
            self,
            Self::UnknownSigningKey { .. } | Self::InvalidToken { .. }
        )
    }

    /// Returns `true` if the identity provider could not be reached or used.
    #[must_use]
    pub fn is_upstream_error(&self) -> bool {
        matches!(
            self,
            Self::KeyFetchFailed { .. } | Self::UpstreamTimeout { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_fetch_error_display() {
        assert_eq!(
            KeyFetchError::NotFound("diku".to_string()).to_string(),
            "Realm not found: diku"
        );
        assert_eq!(
            KeyFetchError::HttpStatus(503).to_string(),
            "HTTP error: status 503"
        );
        assert_eq!(KeyFetchError::Timeout.to_string(), "Request timed out");
        assert_eq!(
            KeyFetchError::ResponseTooLarge { max_size: 1024 }.to_string(),
            "Response exceeds maximum size of 1024 bytes"
        );
    }

    #[test]
    fn test_token_error_display() {
        let err = TokenError::unknown_signing_key(Some("key-1"));
        assert_eq!(err.to_string(), "Unknown signing key: key-1");

        let err = TokenError::unknown_signing_key(None);
        assert_eq!(err.to_string(), "Unknown signing key: <missing kid>");

        let err = TokenError::key_fetch_failed("diku", "HTTP error: status 500");
        assert!(err.to_string().contains("diku"));
        assert!(err.to_string().contains("status 500"));
    }

    #[test]
    fn test_token_error_predicates() {
        assert!(TokenError::invalid_token("bad").is_access_denied());
        assert!(TokenError::unknown_signing_key(None).is_access_denied());
        assert!(!TokenError::upstream_timeout("diku").is_access_denied());

        assert!(TokenError::key_fetch_failed("diku", "x").is_upstream_error());
        assert!(TokenError::upstream_timeout("diku").is_upstream_error());
        assert!(!TokenError::invalid_token("bad").is_upstream_error());
    }
}
