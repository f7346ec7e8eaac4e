use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";

/// Root client configuration (`config.toml`).
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    /// Backend origin; endpoints such as `/api/tasks` are appended to it.
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    /// Default tracing filter when `RUST_LOG` is unset.
    pub log_level: String,
    /// Call `POST /api/auth/logout` before clearing local state.
    pub notify_server_on_logout: bool,
    pub cache: CacheConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout_secs: 30,
            log_level: "info".to_string(),
            notify_server_on_logout: true,
            cache: CacheConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Query cache timings and retry policy.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    pub stale_time_secs: u64,
    pub gc_time_secs: u64,
    pub refetch_on_window_focus: bool,
    pub refetch_on_reconnect: bool,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            stale_time_secs: 5 * 60,
            gc_time_secs: 10 * 60,
            refetch_on_window_focus: false,
            refetch_on_reconnect: true,
            max_retries: 3,
            retry_base_delay_ms: 1000,
            retry_max_delay_ms: 10_000,
        }
    }
}

impl CacheConfig {
    pub fn stale_time(&self) -> Duration {
        Duration::from_secs(self.stale_time_secs)
    }

    pub fn gc_time(&self) -> Duration {
        Duration::from_secs(self.gc_time_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.cache.stale_time(), Duration::from_secs(300));
        assert_eq!(config.cache.gc_time(), Duration::from_secs(600));
        assert!(!config.cache.refetch_on_window_focus);
        assert!(config.cache.refetch_on_reconnect);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: ClientConfig = toml::from_str(
            r#"
            api_base_url = "https://todo.example.com"

            [cache]
            stale_time_secs = 60
            "#,
        )
        .unwrap();

        assert_eq!(config.api_base_url, "https://todo.example.com");
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.cache.stale_time_secs, 60);
        assert_eq!(config.cache.gc_time_secs, 600);
    }
}
