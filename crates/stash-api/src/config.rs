//! Server configuration from environment variables.
//!
//! | variable | default |
//! |----------|---------|
//! | `DATABASE_URL` | `postgres://localhost/stash` |
//! | `HOST` | `0.0.0.0` |
//! | `PORT` | `3000` |
//! | `PUBLIC_BASE_URL` | `http://localhost:3000` |
//! | `MAX_IMPORT_BYTES` | 20 MiB |
//! | `ALLOWED_ORIGINS` | `http://localhost:3000` |
//! | `AUTH_HEADER` | `x-user-id` |
//! | `DB_MAX_CONNECTIONS` | `10` |

use std::str::FromStr;

use axum::http::HeaderValue;
use tracing::warn;

pub const DEFAULT_DATABASE_URL: &str = "postgres://localhost/stash";
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_PUBLIC_BASE_URL: &str = "http://localhost:3000";
pub const DEFAULT_MAX_IMPORT_BYTES: usize = 20 * 1024 * 1024;
pub const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:3000";
pub const DEFAULT_AUTH_HEADER: &str = "x-user-id";
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;

/// Runtime configuration for the API server.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    /// Prefix for attachment URLs in JSON exports.
    pub public_base_url: String,
    /// Request body cap, applied to every route.
    pub max_import_bytes: usize,
    pub allowed_origins: Vec<String>,
    /// Header carrying the authenticated user's id, set by the fronting proxy.
    pub auth_header: String,
    pub db_max_connections: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            public_base_url: DEFAULT_PUBLIC_BASE_URL.to_string(),
            max_import_bytes: DEFAULT_MAX_IMPORT_BYTES,
            allowed_origins: split_origins(DEFAULT_ALLOWED_ORIGINS),
            auth_header: DEFAULT_AUTH_HEADER.to_string(),
            db_max_connections: DEFAULT_DB_MAX_CONNECTIONS,
        }
    }
}

impl ApiConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`, falling back to defaults for
    /// missing or unparsable values.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let text = |key: &str, default: String| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or(default)
        };

        let allowed_origins = lookup("ALLOWED_ORIGINS")
            .map(|v| split_origins(&v))
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.allowed_origins);

        Self {
            database_url: text("DATABASE_URL", defaults.database_url),
            host: text("HOST", defaults.host),
            port: parse_or(&lookup, "PORT", defaults.port),
            public_base_url: text("PUBLIC_BASE_URL", defaults.public_base_url)
                .trim_end_matches('/')
                .to_string(),
            max_import_bytes: parse_or(&lookup, "MAX_IMPORT_BYTES", defaults.max_import_bytes),
            allowed_origins,
            auth_header: text("AUTH_HEADER", defaults.auth_header).to_lowercase(),
            db_max_connections: parse_or(
                &lookup,
                "DB_MAX_CONNECTIONS",
                defaults.db_max_connections,
            ),
        }
    }

    /// Socket address string for the listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Allowed origins as header values; invalid entries are skipped.
    pub fn cors_origins(&self) -> Vec<HeaderValue> {
        self.allowed_origins
            .iter()
            .filter_map(|origin| match origin.parse::<HeaderValue>() {
                Ok(v) => Some(v),
                Err(e) => {
                    warn!("Invalid CORS origin '{}': {}", origin, e);
                    None
                }
            })
            .collect()
    }
}

fn split_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr + Copy + std::fmt::Display,
{
    match lookup(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(
                "Invalid value '{}' for {}, using default {}",
                raw, key, default
            );
            default
        }),
    }
}
