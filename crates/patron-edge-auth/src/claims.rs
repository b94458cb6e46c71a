//! Claims carried by a verified bearer token.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Claims extracted from a verified access token.
///
/// Only the claims the gateway looks at are typed; everything else is kept
/// in `extra`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenClaims {
    /// Subject.
    pub sub: String,

    /// Issuer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,

    /// Expiration time (Unix timestamp).
    pub exp: i64,

    /// Issued at (Unix timestamp).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,

    /// Login name of the authenticated user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_username: Option<String>,

    /// Backend user id of the authenticated user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// Any other claims.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
