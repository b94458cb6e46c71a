use patron_edge_auth::KeycloakConfig;
use patron_edge_cache::CacheSettings;
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, time::Duration};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    /// Library-services backend
    #[serde(default)]
    pub okapi: OkapiConfig,
    /// Identity provider serving realm signing keys
    #[serde(default)]
    pub keycloak: KeycloakConfig,
    /// Bearer token enforcement
    #[serde(default)]
    pub auth: AuthSettings,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

// Default derived via field defaults

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        // Server validations
        if self.server.port == 0 {
            return Err("server.port must be > 0".into());
        }
        if self.server.body_limit_bytes == 0 {
            return Err("server.body_limit_bytes must be > 0".into());
        }
        // Logging validation
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        // Backend validation
        if self.okapi.url.trim().is_empty() {
            return Err("okapi.url must not be empty".into());
        }
        if self.okapi.request_timeout.is_zero() {
            return Err("okapi.request_timeout must be > 0".into());
        }
        // Cache validation
        self.cache
            .identity
            .validate()
            .map_err(|e| format!("cache.identity.{e}"))?;
        self.cache
            .public_keys
            .validate()
            .map_err(|e| format!("cache.public_keys.{e}"))?;
        // Auth validation
        if self.auth.enabled {
            if self.keycloak.url.trim().is_empty() {
                return Err("auth.enabled=true requires keycloak.url".into());
            }
            if self.keycloak.request_timeout.is_zero() {
                return Err("keycloak.request_timeout must be > 0".into());
            }
        }
        Ok(())
    }

    pub fn addr(&self) -> SocketAddr {
        use std::net::{IpAddr, Ipv4Addr};
        let host: IpAddr = self
            .server
            .host
            .parse()
            .unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));
        SocketAddr::from((host, self.server.port))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8081
}
fn default_body_limit() -> usize {
    256 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OkapiConfig {
    #[serde(default = "default_okapi_url")]
    pub url: String,
    /// Service token sent as `X-Okapi-Token`.
    /// For security, prefer PATRON_EDGE__OKAPI__TOKEN over the config file
    #[serde(default)]
    pub token: Option<String>,
    /// Upper bound on every backend call
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,
}

fn default_okapi_url() -> String {
    "http://localhost:9130".into()
}
fn default_request_timeout() -> Duration {
    Duration::from_secs(10)
}

impl Default for OkapiConfig {
    fn default() -> Self {
        Self {
            url: default_okapi_url(),
            token: None,
            request_timeout: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AuthSettings {
    /// Require a bearer token, verified against the tenant's realm.
    #[serde(default)]
    pub enabled: bool,
    /// Expected issuer with a `{realm}` placeholder. Issuer is not checked when unset.
    #[serde(default)]
    pub issuer_template: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CacheConfig {
    /// External patron id -> internal id
    #[serde(default)]
    pub identity: CacheSettings,
    /// Realm -> signing key set
    #[serde(default)]
    pub public_keys: CacheSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}
fn default_log_level() -> String {
    "info".into()
}
impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

pub mod loader {
    use super::AppConfig;
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    /// Default configuration file, relative to the working directory.
    pub const DEFAULT_CONFIG_PATH: &str = "patron-edge.toml";

    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let mut builder = Config::builder();
        match path {
            Some(p) => {
                let pathbuf = PathBuf::from(p);
                if pathbuf.exists() {
                    builder = builder.add_source(File::from(pathbuf));
                }
            }
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_PATH);
                if default_path.exists() {
                    builder = builder.add_source(File::from(default_path));
                }
            }
        }
        // Environment variable overrides, e.g., PATRON_EDGE__SERVER__PORT=9090
        builder = builder.add_source(
            Environment::with_prefix("PATRON_EDGE")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }
}
