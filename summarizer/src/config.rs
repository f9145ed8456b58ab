//! Configuration module for environment variable parsing.
//!
//! Process-level knobs (endpoints, thresholds, port) plus the initial values
//! of the user settings, which can later be changed through [`crate::settings`].

use std::env;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::settings::Settings;

/// Default local inference endpoint.
pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:11434/api/generate";

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Candidate `/api/generate` URLs, tried in order
    pub ollama_endpoints: Vec<String>,

    /// Port for the web server to listen on
    pub port: u16,

    /// Maximum number of cached summaries
    pub cache_capacity: usize,

    /// Minimum spacing between non-terminal progress callbacks
    pub progress_throttle_ms: u64,

    /// Maximum characters of extracted text sent to the model
    pub max_content_chars: usize,

    /// URL-only lines at least this long are dropped as tracking links
    pub tracking_url_min_len: usize,

    /// Connection establishment timeout in milliseconds
    pub connect_timeout_ms: u64,

    /// Settings in effect until a settings update arrives
    pub initial_settings: Settings,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            ollama_endpoints: vec![DEFAULT_ENDPOINT.to_string()],
            port: 8080,
            cache_capacity: 200,
            progress_throttle_ms: 120,
            max_content_chars: 120_000,
            tracking_url_min_len: 200,
            connect_timeout_ms: 5000,
            initial_settings: Settings::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Config::default();
        let default_settings = Settings::default();

        Config {
            ollama_endpoints: parse_csv("OLLAMA_ENDPOINTS")
                .filter(|list| !list.is_empty())
                .unwrap_or(defaults.ollama_endpoints),

            port: parse_var("PORT", defaults.port),

            cache_capacity: parse_var("CACHE_CAPACITY", defaults.cache_capacity),

            progress_throttle_ms: parse_var("PROGRESS_THROTTLE_MS", defaults.progress_throttle_ms),

            max_content_chars: parse_var("MAX_CONTENT_CHARS", defaults.max_content_chars),

            tracking_url_min_len: parse_var("TRACKING_URL_MIN_LEN", defaults.tracking_url_min_len),

            connect_timeout_ms: parse_var("CONNECT_TIMEOUT_MS", defaults.connect_timeout_ms),

            initial_settings: Settings {
                enabled: parse_var("AI_ENABLED", default_settings.enabled),
                model_name: env::var("MODEL_NAME")
                    .ok()
                    .map(|v| v.trim().to_string())
                    .filter(|v| !v.is_empty())
                    .unwrap_or(default_settings.model_name),
                system_prompt_override: env::var("SYSTEM_PROMPT").unwrap_or_default(),
            },
        }
    }

    /// Progress throttle as a duration.
    pub fn progress_throttle(&self) -> Duration {
        Duration::from_millis(self.progress_throttle_ms)
    }

    /// Connect timeout as a duration.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

/// Parse a typed variable, warning and using the default on bad input.
fn parse_var<T: FromStr>(name: &str, default: T) -> T {
    let raw = match env::var(name) {
        Ok(v) => v,
        Err(_) => return default,
    };

    match raw.trim().parse::<T>() {
        Ok(value) => value,
        Err(_) => {
            warn!(env_var = name, value = %raw, "Invalid value, using default");
            default
        }
    }
}

/// Parse a comma-separated list of strings.
fn parse_csv(name: &str) -> Option<Vec<String>> {
    env::var(name).ok().map(|raw| {
        raw.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_var_valid() {
        env::set_var("TEST_MAILSUM_PORT", "9090");
        let result: u16 = parse_var("TEST_MAILSUM_PORT", 1);
        assert_eq!(result, 9090);
        env::remove_var("TEST_MAILSUM_PORT");
    }

    #[test]
    fn test_parse_var_invalid_uses_default() {
        env::set_var("TEST_MAILSUM_BAD", "not-a-number");
        let result: usize = parse_var("TEST_MAILSUM_BAD", 42);
        assert_eq!(result, 42);
        env::remove_var("TEST_MAILSUM_BAD");
    }

    #[test]
    fn test_parse_var_bool() {
        env::set_var("TEST_MAILSUM_FLAG", "false");
        assert!(!parse_var("TEST_MAILSUM_FLAG", true));
        env::remove_var("TEST_MAILSUM_FLAG");
    }

    #[test]
    fn test_parse_csv() {
        env::set_var("TEST_MAILSUM_CSV", "http://a/api/generate, ,http://b/api/generate");
        let result = parse_csv("TEST_MAILSUM_CSV");
        assert_eq!(
            result,
            Some(vec![
                "http://a/api/generate".to_string(),
                "http://b/api/generate".to_string()
            ])
        );
        env::remove_var("TEST_MAILSUM_CSV");
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.ollama_endpoints, vec![DEFAULT_ENDPOINT.to_string()]);
        assert_eq!(config.cache_capacity, 200);
        assert_eq!(config.progress_throttle(), Duration::from_millis(120));
        assert_eq!(config.max_content_chars, 120_000);
        assert_eq!(config.tracking_url_min_len, 200);
    }
}
