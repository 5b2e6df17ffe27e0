use std::{path::PathBuf, str::FromStr};

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub cookie_name: String,
    pub secret: String,
    pub timeout_secs: i64,
    pub secure: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// `None` runs the service on the in-memory user store.
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub static_dir: PathBuf,
    pub request_timeout_secs: u64,
    pub max_upload_bytes: usize,
    pub require_auth: bool,
    pub session: SessionConfig,
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let session = SessionConfig {
            cookie_name: std::env::var("SESSION_COOKIE_NAME")
                .unwrap_or_else(|_| "user-service-session".into()),
            secret: std::env::var("SESSION_SECRET").context("SESSION_SECRET must be set")?,
            timeout_secs: env_or("SESSION_TIMEOUT_SECS", 30 * 60),
            secure: env_or("SESSION_SECURE", false),
        };

        Ok(Self {
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env_or("APP_PORT", 8080),
            database_url: std::env::var("DATABASE_URL").ok().filter(|v| !v.is_empty()),
            max_connections: env_or("DATABASE_MAX_CONNECTIONS", 10),
            static_dir: std::env::var("STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("public")),
            request_timeout_secs: env_or("REQUEST_TIMEOUT_SECS", 90),
            max_upload_bytes: env_or("MAX_UPLOAD_BYTES", 10 * 1024 * 1024),
            require_auth: env_or("REQUIRE_AUTH", false),
            session,
        })
    }
}

#[cfg(test)]
impl AppConfig {
    pub fn for_tests() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            database_url: None,
            max_connections: 1,
            static_dir: PathBuf::from("public"),
            request_timeout_secs: 5,
            max_upload_bytes: 1024 * 1024,
            require_auth: false,
            session: SessionConfig {
                cookie_name: "test-session".into(),
                secret: "test-secret".into(),
                timeout_secs: 60,
                secure: false,
            },
        }
    }
}
