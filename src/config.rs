//! Runtime configuration resolved from the environment.

use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use crate::gemini::GenerationConfig;
use crate::Error;

pub const DEFAULT_MODEL: &str = "gemini-pro";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_ADDR: &str = "127.0.0.1:8501";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Everything the server needs to start.
#[derive(Clone)]
pub struct AppConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub bind_addr: SocketAddr,
    pub page_title: String,
    pub header: String,
    pub request_timeout: Duration,
    /// Sampling options sent with every request.
    pub generation: GenerationConfig,
}

// Hand-written so the key never lands in logs.
impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("bind_addr", &self.bind_addr)
            .field("page_title", &self.page_title)
            .field("header", &self.header)
            .field("request_timeout", &self.request_timeout)
            .field("generation", &self.generation)
            .finish()
    }
}

impl AppConfig {
    /// Create a configuration with defaults for everything but the key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8501)),
            page_title: "Q&A Demo".to_string(),
            header: "Gemini MENTAL HEALTH BOT".to_string(),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            generation: GenerationConfig::default(),
        }
    }

    /// Create configuration from environment variables.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Resolve configuration through an arbitrary variable lookup.
    ///
    /// * `GOOGLE_API_KEY` - required, must not be blank
    /// * `GEMINI_MODEL` - model name (default `gemini-pro`)
    /// * `GEMINI_BASE_URL` - API root, mostly useful for tests
    /// * `QACHAT_ADDR` - listen address (default `127.0.0.1:8501`)
    /// * `QACHAT_TIMEOUT_SECS` - per-request timeout
    /// * `GEMINI_TEMPERATURE`, `GEMINI_TOP_P`, `GEMINI_MAX_OUTPUT_TOKENS` - sampling
    pub fn from_lookup<F>(lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("GOOGLE_API_KEY")
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .ok_or_else(|| Error::config("GOOGLE_API_KEY environment variable is required"))?;

        let mut config = Self::new(api_key);

        if let Some(model) = lookup("GEMINI_MODEL").filter(|m| !m.trim().is_empty()) {
            config.model = model.trim().to_string();
        }
        if let Some(base_url) = lookup("GEMINI_BASE_URL").filter(|u| !u.trim().is_empty()) {
            config.base_url = base_url.trim().trim_end_matches('/').to_string();
        }
        if let Some(addr) = lookup("QACHAT_ADDR") {
            config.bind_addr = parse_addr(&addr)?;
        }
        if let Some(secs) = lookup("QACHAT_TIMEOUT_SECS") {
            let secs: u64 = secs.trim().parse().map_err(|_| {
                Error::config(format!("QACHAT_TIMEOUT_SECS must be a number of seconds, got '{secs}'"))
            })?;
            config.request_timeout = Duration::from_secs(secs);
        }
        config.generation = GenerationConfig {
            temperature: parse_var(&lookup, "GEMINI_TEMPERATURE")?,
            max_output_tokens: parse_var(&lookup, "GEMINI_MAX_OUTPUT_TOKENS")?,
            top_p: parse_var(&lookup, "GEMINI_TOP_P")?,
        };

        Ok(config)
    }
}

fn parse_var<F, T>(lookup: &F, key: &str) -> Result<Option<T>, Error>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key).filter(|value| !value.trim().is_empty()) {
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| Error::config(format!("{key} has an invalid value '{value}': {e}"))),
        None => Ok(None),
    }
}

/// Parse a listen address such as `127.0.0.1:8501`.
pub fn parse_addr(addr: &str) -> Result<SocketAddr, Error> {
    addr.trim()
        .parse()
        .map_err(|e| Error::config(format!("Invalid listen address '{addr}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_missing_api_key_is_config_error() {
        let err = AppConfig::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("GOOGLE_API_KEY"));
    }

    #[test]
    fn test_blank_api_key_is_rejected() {
        let err = AppConfig::from_lookup(lookup_from(&[("GOOGLE_API_KEY", "   ")])).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(lookup_from(&[("GOOGLE_API_KEY", "k-123")])).unwrap();
        assert_eq!(config.api_key, "k-123");
        assert_eq!(config.model, "gemini-pro");
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.bind_addr, parse_addr(DEFAULT_ADDR).unwrap());
        assert_eq!(config.request_timeout, Duration::from_secs(60));
        assert_eq!(config.page_title, "Q&A Demo");
        assert!(config.generation.is_empty());
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("GOOGLE_API_KEY", "k"),
            ("GEMINI_MODEL", "gemini-1.5-flash"),
            ("GEMINI_BASE_URL", "http://localhost:9000/"),
            ("QACHAT_ADDR", "0.0.0.0:3000"),
            ("QACHAT_TIMEOUT_SECS", "5"),
        ]))
        .unwrap();
        assert_eq!(config.model, "gemini-1.5-flash");
        assert_eq!(config.base_url, "http://localhost:9000");
        assert_eq!(config.bind_addr.port(), 3000);
        assert_eq!(config.request_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_bad_values_are_config_errors() {
        let err = AppConfig::from_lookup(lookup_from(&[
            ("GOOGLE_API_KEY", "k"),
            ("QACHAT_ADDR", "not an address"),
        ]))
        .unwrap_err();
        assert!(err.is_config());

        let err = AppConfig::from_lookup(lookup_from(&[
            ("GOOGLE_API_KEY", "k"),
            ("QACHAT_TIMEOUT_SECS", "soon"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("QACHAT_TIMEOUT_SECS"));
    }

    #[test]
    fn test_generation_settings() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("GOOGLE_API_KEY", "k"),
            ("GEMINI_TEMPERATURE", "0.4"),
            ("GEMINI_MAX_OUTPUT_TOKENS", "512"),
        ]))
        .unwrap();
        assert_eq!(config.generation.temperature, Some(0.4));
        assert_eq!(config.generation.max_output_tokens, Some(512));
        assert_eq!(config.generation.top_p, None);

        let err = AppConfig::from_lookup(lookup_from(&[
            ("GOOGLE_API_KEY", "k"),
            ("GEMINI_MAX_OUTPUT_TOKENS", "lots"),
        ]))
        .unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("GEMINI_MAX_OUTPUT_TOKENS"));
    }

    #[test]
    fn test_debug_redacts_key() {
        let config = AppConfig::new("super-secret");
        let debug = format!("{config:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("<redacted>"));
    }
}
