use anyhow::{Context, Result};
use std::time::Duration;

use crate::cache::DEFAULT_TTL;

/// Which cache sits in front of the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheBackend {
    /// In-process DashMap cache.
    Memory,
    /// Redis at the given URL.
    Redis(String),
    /// Store-only mode.
    None,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// SQLite connection string, e.g. "sqlite:./hashlink.db", or "memory" for
    /// the in-process store
    pub database_url: String,

    /// Host to bind the HTTP server to, e.g. "0.0.0.0"
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Public base URL used when reporting short links, e.g. "https://go.example.com"
    /// Must NOT have a trailing slash.
    pub base_url: String,

    pub cache_backend: CacheBackend,

    /// TTL applied to cache entries filled on a read miss
    pub cache_ttl: Duration,

    /// Maximum concurrent mapping deletes during a user cascade
    pub cascade_concurrency: usize,
}

impl AppConfig {
    /// Load configuration from environment variables (populated by dotenvy before this is called).
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key lookup; `from_env` passes the
    /// process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let port = lookup("PORT")
            .unwrap_or_else(|| "3000".into())
            .parse::<u16>()
            .context("PORT must be a valid port number (1–65535)")?;
        if port == 0 {
            anyhow::bail!("PORT must be a valid port number (1–65535)");
        }

        let base_url = lookup("BASE_URL")
            .unwrap_or_else(|| format!("http://localhost:{port}"))
            .trim_end_matches('/')
            .to_owned();

        let cache_backend = match lookup("CACHE_BACKEND")
            .unwrap_or_else(|| "memory".into())
            .trim()
            .to_ascii_lowercase()
            .as_str()
        {
            "memory" => CacheBackend::Memory,
            "none" | "off" => CacheBackend::None,
            "redis" => CacheBackend::Redis(
                lookup("REDIS_URL")
                    .filter(|s| !s.trim().is_empty())
                    .context("REDIS_URL must be set when CACHE_BACKEND=redis")?,
            ),
            other => anyhow::bail!("unknown CACHE_BACKEND '{other}' (memory, redis, none)"),
        };

        let cache_ttl = match lookup("CACHE_TTL_SECONDS") {
            Some(raw) => Duration::from_secs(
                raw.parse::<u64>()
                    .context("CACHE_TTL_SECONDS must be a whole number of seconds")?,
            ),
            None => DEFAULT_TTL,
        };

        let cascade_concurrency = lookup("CASCADE_CONCURRENCY")
            .unwrap_or_else(|| "8".into())
            .parse::<usize>()
            .unwrap_or(8)
            .max(1);

        Ok(Self {
            database_url: lookup("DATABASE_URL").unwrap_or_else(|| "sqlite:./hashlink.db".into()),
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            base_url,
            cache_backend,
            cache_ttl,
            cascade_concurrency,
        })
    }
}
