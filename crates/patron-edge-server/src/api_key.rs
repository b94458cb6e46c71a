//! Edge API keys.
//!
//! An API key is a base64url-encoded JSON object naming the tenant and the
//! edge user it was issued to:
//!
//! ```text
//! {"s": "<salt>", "t": "<tenant>", "u": "<username>"}
//! ```
//!
//! Clients pass it as the `apikey` query parameter or the `X-API-Key` header.
//! Padding is optional.

use axum::http::{HeaderMap, Uri};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};

pub const API_KEY_HEADER: &str = "x-api-key";
pub const API_KEY_PARAM: &str = "apikey";

/// A decoded edge API key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKey {
    #[serde(rename = "s")]
    pub salt: String,
    #[serde(rename = "t")]
    pub tenant: String,
    #[serde(rename = "u")]
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiKeyError {
    #[error("Missing API key")]
    Missing,

    #[error("Malformed API key: {0}")]
    Malformed(String),
}

impl ApiKey {
    /// Decodes an API key string.
    pub fn decode(raw: &str) -> Result<Self, ApiKeyError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(raw.trim().trim_end_matches('='))
            .map_err(|e| ApiKeyError::Malformed(e.to_string()))?;
        let key: ApiKey =
            serde_json::from_slice(&bytes).map_err(|e| ApiKeyError::Malformed(e.to_string()))?;
        if key.tenant.trim().is_empty() {
            return Err(ApiKeyError::Malformed("tenant is empty".into()));
        }
        Ok(key)
    }

    /// Encodes the key in the form clients send it.
    pub fn encode(&self) -> String {
        // Serializing a struct of strings cannot fail.
        let json = serde_json::to_vec(self).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(json)
    }

    /// Finds and decodes the key on a request. The query parameter wins over the header.
    pub fn from_request(uri: &Uri, headers: &HeaderMap) -> Result<Self, ApiKeyError> {
        let from_query = uri.query().and_then(|query| {
            url::form_urlencoded::parse(query.as_bytes())
                .find(|(name, _)| name == API_KEY_PARAM)
                .map(|(_, value)| value.into_owned())
        });
        let raw = match from_query {
            Some(raw) => raw,
            None => headers
                .get(API_KEY_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
                .ok_or(ApiKeyError::Missing)?,
        };
        if raw.trim().is_empty() {
            return Err(ApiKeyError::Missing);
        }
        Self::decode(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn key() -> ApiKey {
        ApiKey {
            salt: "Q4jBcWs7Vz".into(),
            tenant: "diku".into(),
            username: "edge-patron".into(),
        }
    }

    #[test]
    fn test_decode_encoded_key() {
        assert_eq!(ApiKey::decode(&key().encode()).unwrap(), key());
    }

    #[test]
    fn test_decode_accepts_padding() {
        // {"s":"x","t":"diku","u":"y"} padded to a multiple of four.
        let padded = base64::engine::general_purpose::URL_SAFE
            .encode(br#"{"s":"x","t":"diku","u":"y"}"#);
        assert!(padded.ends_with('='));
        assert_eq!(ApiKey::decode(&padded).unwrap().tenant, "diku");
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            ApiKey::decode("%%%"),
            Err(ApiKeyError::Malformed(_))
        ));
        let not_json = URL_SAFE_NO_PAD.encode("tenant=diku");
        assert!(matches!(
            ApiKey::decode(&not_json),
            Err(ApiKeyError::Malformed(_))
        ));
        let no_tenant = URL_SAFE_NO_PAD.encode(br#"{"s":"x","t":"","u":"y"}"#);
        assert!(matches!(
            ApiKey::decode(&no_tenant),
            Err(ApiKeyError::Malformed(_))
        ));
    }

    #[test]
    fn test_from_request_query_and_header() {
        let encoded = key().encode();

        let uri: Uri = format!("/patron/account/abc?apikey={encoded}&includeLoans=true")
            .parse()
            .unwrap();
        assert_eq!(ApiKey::from_request(&uri, &HeaderMap::new()).unwrap(), key());

        let uri: Uri = "/patron/account/abc".parse().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, HeaderValue::from_str(&encoded).unwrap());
        assert_eq!(ApiKey::from_request(&uri, &headers).unwrap(), key());

        assert_eq!(
            ApiKey::from_request(&uri, &HeaderMap::new()),
            Err(ApiKeyError::Missing)
        );
    }
}
