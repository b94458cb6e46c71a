use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use patron_edge_auth::{KeycloakKeySetFetcher, TokenVerifier, TokenVerifierConfig};
use patron_edge_cache::{IdentityCache, PublicKeyCache};
use patron_edge_core::{AccountBackend, HoldCancellationOrchestrator, IdentityResolver};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::okapi::OkapiClient;
use crate::{config::AppConfig, handlers, middleware as app_middleware};

/// Shared per-process state. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub identity_cache: Arc<IdentityCache>,
    pub public_key_cache: Arc<PublicKeyCache>,
    pub resolver: Arc<IdentityResolver>,
    /// Present when bearer auth is enabled.
    pub verifier: Option<Arc<TokenVerifier>>,
    pub orchestrator: Arc<HoldCancellationOrchestrator>,
    pub accounts: Arc<dyn AccountBackend>,
    pub request_timeout: Duration,
}

impl AppState {
    /// Wires caches, backend clients and pipelines from configuration.
    pub fn from_config(cfg: &AppConfig) -> anyhow::Result<Self> {
        let identity_cache = Arc::new(IdentityCache::uninitialized());
        identity_cache.initialize(&cfg.cache.identity);
        let public_key_cache = Arc::new(PublicKeyCache::uninitialized());
        public_key_cache.initialize(&cfg.cache.public_keys);

        let okapi = Arc::new(OkapiClient::new(&cfg.okapi)?);
        let request_timeout = cfg.okapi.request_timeout;

        let verifier = if cfg.auth.enabled {
            let fetcher = KeycloakKeySetFetcher::new(cfg.keycloak.clone())?;
            let mut verifier_config =
                TokenVerifierConfig::new().with_request_timeout(cfg.keycloak.request_timeout);
            if let Some(template) = &cfg.auth.issuer_template {
                verifier_config = verifier_config.with_issuer_template(template.clone());
            }
            Some(Arc::new(TokenVerifier::new(
                public_key_cache.clone(),
                Arc::new(fetcher),
                verifier_config,
            )))
        } else {
            tracing::warn!("Bearer token authentication is disabled");
            None
        };

        Ok(Self {
            resolver: Arc::new(IdentityResolver::new(
                identity_cache.clone(),
                okapi.clone(),
                request_timeout,
            )),
            orchestrator: Arc::new(HoldCancellationOrchestrator::new(
                okapi.clone(),
                request_timeout,
            )),
            accounts: okapi,
            identity_cache,
            public_key_cache,
            verifier,
            request_timeout,
        })
    }
}

pub struct PatronEdgeServer {
    addr: SocketAddr,
    app: Router,
}

pub fn build_app(cfg: &AppConfig, state: AppState) -> Router {
    let body_limit = cfg.server.body_limit_bytes;
    Router::new()
        // Health endpoints
        .route("/healthz", get(handlers::healthz))
        .route("/readyz", get(handlers::readyz))
        // Patron account operations
        .route("/patron/account/{ext_patron_id}", get(handlers::get_account))
        .route(
            "/patron/account/{ext_patron_id}/item/{item_id}/renew",
            post(handlers::renew_item),
        )
        .route(
            "/patron/account/{ext_patron_id}/item/{item_id}/hold",
            post(handlers::place_item_hold),
        )
        .route(
            "/patron/account/{ext_patron_id}/instance/{instance_id}/hold",
            post(handlers::place_instance_hold),
        )
        .route(
            "/patron/account/{ext_patron_id}/hold/{hold_id}/cancel",
            post(handlers::cancel_hold),
        )
        // Middleware stack (innermost first: auth -> body limit -> trace -> cors -> request id)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            app_middleware::authentication_middleware,
        ))
        .layer(axum::extract::DefaultBodyLimit::max(body_limit))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    use tracing::field::Empty;
                    let req_id = req
                        .extensions()
                        .get::<axum::http::HeaderValue>()
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("")
                        .to_string();
                    // The target is logged without its query: it may carry the API key.
                    tracing::info_span!(
                        "http.request",
                        http.method = %req.method(),
                        http.target = %req.uri().path(),
                        http.status_code = Empty,
                        request_id = %req_id
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>, latency: Duration, span: &tracing::Span| {
                        span.record(
                            "http.status_code",
                            tracing::field::display(res.status().as_u16()),
                        );
                        tracing::info!(
                            http.status = %res.status().as_u16(),
                            elapsed_ms = %latency.as_millis(),
                            "request handled"
                        );
                    },
                ),
        )
        .layer(CorsLayer::permissive())
        .layer(middleware::from_fn(app_middleware::request_id))
        .with_state(state)
}

pub struct ServerBuilder {
    addr: SocketAddr,
    config: AppConfig,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        let cfg = AppConfig::default();
        Self {
            addr: cfg.addr(),
            config: cfg,
        }
    }

    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.addr = cfg.addr();
        self.config = cfg;
        self
    }

    pub fn build(self) -> anyhow::Result<PatronEdgeServer> {
        let state = AppState::from_config(&self.config)?;
        let app = build_app(&self.config, state);

        Ok(PatronEdgeServer {
            addr: self.addr,
            app,
        })
    }
}

impl PatronEdgeServer {
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }
}

async fn shutdown_signal() {
    // Wait for Ctrl+C
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
