//! Environment configuration
//!
//! Values come from the process environment, after loading `.env` if present.

use crate::error::OrchestrationError;
use crate::memory::ContextConfig;
use crate::Result;
use std::env;
use std::str::FromStr;

const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub supervisor_temperature: f32,
    pub handler_temperature: f32,
    pub retrieval_api_url: Option<String>,
    pub retrieval_k: usize,
    pub database_url: Option<String>,
    pub api_port: u16,
    pub max_context_messages: usize,
    pub max_context_tokens: usize,
    pub verbose_handlers: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            gemini_api_key: None,
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
            supervisor_temperature: 0.1,
            handler_temperature: 0.3,
            retrieval_api_url: None,
            retrieval_k: 5,
            database_url: None,
            api_port: 8080,
            max_context_messages: 10,
            max_context_tokens: 4000,
            verbose_handlers: false,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();
        let (port_key, port_value) = match get("PORT") {
            Some(value) => ("PORT", Some(value)),
            None => ("API_PORT", get("API_PORT")),
        };

        Ok(Self {
            gemini_api_key: get("GEMINI_API_KEY"),
            gemini_model: get("GEMINI_MODEL").unwrap_or(defaults.gemini_model),
            supervisor_temperature: parse_or(
                "SUPERVISOR_TEMPERATURE",
                get("SUPERVISOR_TEMPERATURE"),
                defaults.supervisor_temperature,
            )?,
            handler_temperature: parse_or(
                "HANDLER_TEMPERATURE",
                get("HANDLER_TEMPERATURE"),
                defaults.handler_temperature,
            )?,
            retrieval_api_url: get("RETRIEVAL_API_URL"),
            retrieval_k: parse_or("RETRIEVAL_K", get("RETRIEVAL_K"), defaults.retrieval_k)?,
            database_url: get("DATABASE_URL"),
            api_port: parse_or(port_key, port_value, defaults.api_port)?,
            max_context_messages: parse_or(
                "MAX_CONTEXT_MESSAGES",
                get("MAX_CONTEXT_MESSAGES"),
                defaults.max_context_messages,
            )?,
            max_context_tokens: parse_or(
                "MAX_CONTEXT_TOKENS",
                get("MAX_CONTEXT_TOKENS"),
                defaults.max_context_tokens,
            )?,
            verbose_handlers: get("VERBOSE_HANDLERS")
                .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
                .unwrap_or(defaults.verbose_handlers),
        })
    }

    pub fn require_gemini_api_key(&self) -> Result<&str> {
        self.gemini_api_key.as_deref().ok_or_else(|| {
            OrchestrationError::ConfigurationError("GEMINI_API_KEY not configured".to_string())
        })
    }

    /// Trimmer settings. `MAX_CONTEXT_MESSAGES` sets the window for unlisted handlers.
    pub fn context_config(&self) -> ContextConfig {
        ContextConfig {
            default_window: self.max_context_messages,
            max_context_tokens: self.max_context_tokens,
            ..ContextConfig::default()
        }
    }
}

fn parse_or<T: FromStr>(key: &str, value: Option<String>, default: T) -> Result<T> {
    match value {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| {
            OrchestrationError::ConfigurationError(format!("Invalid value for {}: '{}'", key, raw))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<AppConfig> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.gemini_model, "gemini-2.0-flash");
        assert_eq!(config.api_port, 8080);
        assert_eq!(config.retrieval_k, 5);
        assert!(!config.verbose_handlers);
        assert!(config.require_gemini_api_key().unwrap_err().is_fatal());
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("GEMINI_API_KEY", "secret"),
            ("API_PORT", "9000"),
            ("MAX_CONTEXT_MESSAGES", "12"),
            ("VERBOSE_HANDLERS", "true"),
            ("SUPERVISOR_TEMPERATURE", "0.0"),
        ])
        .unwrap();

        assert_eq!(config.require_gemini_api_key().unwrap(), "secret");
        assert_eq!(config.api_port, 9000);
        assert!(config.verbose_handlers);
        assert_eq!(config.supervisor_temperature, 0.0);
        assert_eq!(config.context_config().default_window, 12);
        assert_eq!(config.context_config().history_window, 15);
    }

    #[test]
    fn test_port_takes_precedence() {
        let config = config_from(&[("PORT", "3000"), ("API_PORT", "9000")]).unwrap();
        assert_eq!(config.api_port, 3000);
    }

    #[test]
    fn test_empty_key_counts_as_unset() {
        let config = config_from(&[("GEMINI_API_KEY", "  ")]).unwrap();
        assert!(config.gemini_api_key.is_none());
    }

    #[test]
    fn test_malformed_number_is_rejected() {
        let err = config_from(&[("RETRIEVAL_K", "five")]).unwrap_err();
        assert!(err.to_string().contains("RETRIEVAL_K"));
    }

    #[test]
    fn test_malformed_port_names_its_variable() {
        let err = config_from(&[("API_PORT", "abc")]).unwrap_err();
        assert!(err.to_string().contains("Invalid value for API_PORT: 'abc'"));

        let err = config_from(&[("PORT", "abc"), ("API_PORT", "9000")]).unwrap_err();
        assert!(err.to_string().contains("Invalid value for PORT: 'abc'"));
    }
}
