//! Application configuration loaded from environment variables.

use std::env;
use std::str::FromStr;

use vitae_infra::LimitsCacheConfig;

/// Where per-caller window state is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Redis,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "in-memory" => Ok(StoreBackend::Memory),
            "redis" => Ok(StoreBackend::Redis),
            other => Err(format!("unknown rate limit backend '{other}'")),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub store_backend: StoreBackend,
    pub limits_cache: LimitsCacheConfig,
    /// Bearer token for the operator endpoints; admin routes are closed when unset.
    pub admin_token: Option<String>,
    /// Cron expression for the idle-bucket sweep.
    pub sweep_schedule: String,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let store_backend = match env::var("RATE_LIMIT_BACKEND") {
            Ok(value) => value.parse().unwrap_or_else(|e| {
                tracing::warn!("{}. Using in-memory store.", e);
                StoreBackend::Memory
            }),
            Err(_) => StoreBackend::Memory,
        };

        Self {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            store_backend,
            limits_cache: LimitsCacheConfig::from_env(),
            admin_token: env::var("ADMIN_API_TOKEN")
                .ok()
                .filter(|token| !token.trim().is_empty()),
            // Top of every hour
            sweep_schedule: env::var("SWEEP_SCHEDULE")
                .unwrap_or_else(|_| "0 0 * * * *".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_names() {
        assert_eq!("Redis".parse::<StoreBackend>(), Ok(StoreBackend::Redis));
        assert_eq!("memory".parse::<StoreBackend>(), Ok(StoreBackend::Memory));
        assert!("memcached".parse::<StoreBackend>().is_err());
    }
}
