pub mod api_key;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod observability;
pub mod okapi;
pub mod server;

pub use api_key::{ApiKey, ApiKeyError};
pub use config::{AppConfig, AuthSettings, CacheConfig, LoggingConfig, OkapiConfig, ServerConfig};
pub use error::ApiError;
pub use observability::init_tracing;
pub use okapi::OkapiClient;
pub use server::{AppState, PatronEdgeServer, ServerBuilder, build_app};
