//! # patron-edge-core
//!
//! The request pipelines of the patron edge gateway:
//!
//! - [`IdentityResolver`] maps a tenant-scoped external patron id to the
//!   backend's internal id, through the identity cache.
//! - [`HoldCancellationOrchestrator`] validates a cancellation, reads the
//!   existing hold, and submits the merged cancellation.
//!
//! Backend access goes through the traits in [`backend`], so the pipelines
//! can run against any client (the server crate provides an Okapi one).

pub mod backend;
pub mod cancellation;
pub mod error;
pub mod model;
pub mod resolver;

pub use backend::{
    AccountBackend, HoldBackend, PatronLookup, ProxyMethod, ProxyRequest, UpstreamResponse,
    with_timeout,
};
pub use cancellation::HoldCancellationOrchestrator;
pub use error::{BackendError, EdgeError, Result};
pub use model::{CancellationPayload, HoldCancellationRequest, HoldRecord};
pub use resolver::IdentityResolver;
