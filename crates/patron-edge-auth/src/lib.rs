//! # patron-edge-auth
//!
//! Bearer token verification for the patron edge gateway.
//!
//! Tokens are issued by a Keycloak-style identity provider, one realm per
//! tenant. Verification needs the realm's public signing keys, which are
//! fetched on demand and kept in a [`PublicKeyCache`](patron_edge_cache::PublicKeyCache).
//!
//! ## Modules
//!
//! - [`jwks`] - fetching realm key sets from the identity provider
//! - [`verifier`] - [`TokenVerifier`], key lookup and signature/claims checks
//! - [`claims`] - the claims extracted from a verified token
//! - [`error`] - error types

pub mod claims;
pub mod error;
pub mod jwks;
pub mod verifier;

pub use claims::TokenClaims;
pub use error::{KeyFetchError, TokenError};
pub use jwks::{KeySetFetcher, KeycloakConfig, KeycloakKeySetFetcher};
pub use verifier::{TokenVerifier, TokenVerifierConfig};

/// Type alias for token verification results.
pub type TokenResult<T> = Result<T, TokenError>;
