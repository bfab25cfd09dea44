//! Effective configuration with provenance
//!
//! The merged configuration plus the list of sources that contributed to
//! it. Typed settings are derived from the merged value on demand.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use pcats_protocol::RequestOptions;

use super::defaults::BuiltinDefaults;
use super::merge::{layer_from_pairs, merge_layers, toml_to_json};
use crate::host::{HttpConfig, JobClientConfig, PollConfig};

/// Environment variable overriding the service base URL
pub const ENV_BASE_URL: &str = "PCATS_BASE_URL";

/// Environment variable carrying the bearer token
pub const ENV_TOKEN: &str = "PCATS_TOKEN";

/// Origin of a configuration source
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ConfigOrigin {
    Builtin,
    User,
    Env,
    Cli,
}

/// A contributing config source with provenance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSource {
    pub origin: ConfigOrigin,

    /// File path (user layer only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Effective configuration with provenance
#[derive(Debug, Clone, Serialize)]
pub struct EffectiveConfig {
    /// When this config was computed
    pub created_at: DateTime<Utc>,

    /// Contributing sources in precedence order
    pub sources: Vec<ConfigSource>,

    /// The merged configuration object, secrets included
    #[serde(skip)]
    config: Value,
}

/// Keys that contain secrets and should be redacted
const SECRET_KEYS: &[&str] = &["password", "token", "secret", "api_key", "credential"];

/// Default location of the user config file: `~/.config/pcats/client.toml`
pub fn default_config_path() -> Option<PathBuf> {
    let home = std::env::var_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("pcats")
            .join("client.toml"),
    )
}

/// Build the environment layer from a variable lookup
///
/// Empty variables are ignored.
pub fn env_layer<F>(lookup: F) -> Option<Value>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |name: &str| {
        lookup(name)
            .filter(|v| !v.trim().is_empty())
            .map(Value::String)
    };
    layer_from_pairs([
        ("base_url", var(ENV_BASE_URL)),
        ("request.token", var(ENV_TOKEN)),
    ])
}

impl EffectiveConfig {
    /// Build effective config from layers
    ///
    /// A user config path that does not exist is skipped.
    pub fn build(
        user_config_path: Option<&Path>,
        env_overrides: Option<Value>,
        cli_overrides: Option<Value>,
    ) -> Result<Self, ConfigError> {
        let mut layers = vec![BuiltinDefaults::default().to_value()];
        let mut sources = vec![ConfigSource {
            origin: ConfigOrigin::Builtin,
            path: None,
        }];

        if let Some(path) = user_config_path {
            if path.exists() {
                layers.push(Self::load_toml_file(path)?);
                sources.push(ConfigSource {
                    origin: ConfigOrigin::User,
                    path: Some(path.to_string_lossy().to_string()),
                });
            }
        }

        if let Some(env) = env_overrides {
            layers.push(env);
            sources.push(ConfigSource {
                origin: ConfigOrigin::Env,
                path: None,
            });
        }

        if let Some(cli) = cli_overrides {
            layers.push(cli);
            sources.push(ConfigSource {
                origin: ConfigOrigin::Cli,
                path: None,
            });
        }

        let config = Self {
            created_at: Utc::now(),
            sources,
            config: merge_layers(layers),
        };

        config.settings()?;
        Ok(config)
    }

    fn load_toml_file(path: &Path) -> Result<Value, ConfigError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(format!("{}: {}", path.display(), e)))?;

        let toml_value: toml::Value = toml::from_str(&contents).map_err(|e| {
            ConfigError::ParseError(format!("{}: TOML parse error: {}", path.display(), e))
        })?;

        Ok(toml_to_json(toml_value))
    }

    /// Typed, validated settings
    pub fn settings(&self) -> Result<ClientSettings, ConfigError> {
        let settings: ClientSettings = serde_json::from_value(self.config.clone())
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Merged configuration with secrets replaced, plus the redacted key paths
    pub fn redacted(&self) -> (Value, Vec<String>) {
        let mut value = self.config.clone();
        let mut redactions = Vec::new();
        Self::redact_recursive(&mut value, String::new(), &mut redactions);
        (value, redactions)
    }

    fn redact_recursive(value: &mut Value, path: String, redactions: &mut Vec<String>) {
        let Value::Object(map) = value else {
            return;
        };
        for (key, val) in map.iter_mut() {
            let current_path = if path.is_empty() {
                key.clone()
            } else {
                format!("{}.{}", path, key)
            };

            let key_lower = key.to_lowercase();
            let is_secret = SECRET_KEYS.iter().any(|s| key_lower.contains(s));

            if is_secret && !val.is_object() && !val.is_null() {
                *val = Value::String("[REDACTED]".to_string());
                redactions.push(current_path);
            } else {
                Self::redact_recursive(val, current_path, redactions);
            }
        }
    }

    /// Redacted view for display: sources, values and redacted paths
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        let (config, redactions) = self.redacted();
        serde_json::to_string_pretty(&json!({
            "created_at": self.created_at,
            "sources": self.sources,
            "config": config,
            "redactions": redactions,
        }))
    }

    /// Get a config value by path (dot-separated)
    ///
    /// Returns raw values; use [`EffectiveConfig::redacted`] for display.
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut current = &self.config;
        for part in path.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    pub fn get_u64(&self, path: &str) -> Option<u64> {
        self.get(path).and_then(|v| v.as_u64())
    }

    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(|v| v.as_str())
    }
}

/// Poll loop settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PollSettings {
    #[serde(default)]
    pub interval_seconds: Option<u64>,
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
    #[serde(default)]
    pub max_polls: Option<u64>,
}

/// HTTP transport settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HttpSettings {
    #[serde(default)]
    pub connect_timeout_seconds: Option<u64>,
    #[serde(default)]
    pub request_timeout_seconds: Option<u64>,
}

/// Typed view of the merged configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientSettings {
    pub base_url: String,
    #[serde(default)]
    pub poll: PollSettings,
    #[serde(default)]
    pub http: HttpSettings,
    /// Request options applied to every call unless overridden
    #[serde(default)]
    pub request: RequestOptions,
}

impl ClientSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let rest = self
            .base_url
            .strip_prefix("https://")
            .or_else(|| self.base_url.strip_prefix("http://"));
        if rest.map_or(true, |host| host.trim_matches('/').is_empty()) {
            return Err(ConfigError::ValidationError(format!(
                "base_url must be an http(s) URL, got '{}'",
                self.base_url
            )));
        }

        if self.poll.interval_seconds == Some(0) {
            return Err(ConfigError::ValidationError(
                "poll.interval_seconds must be greater than zero".to_string(),
            ));
        }

        self.poll_config()
            .validate()
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;

        if let Some(connect) = self.http.connect_timeout_seconds {
            if connect == 0 || connect > 300 {
                return Err(ConfigError::ValidationError(
                    "http.connect_timeout_seconds must be in (0, 300]".to_string(),
                ));
            }
        }

        if self.http.request_timeout_seconds == Some(0) {
            return Err(ConfigError::ValidationError(
                "http.request_timeout_seconds must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    pub fn poll_config(&self) -> PollConfig {
        PollConfig::from_config(
            self.poll.interval_seconds,
            self.poll.timeout_seconds,
            self.poll.max_polls,
        )
    }

    pub fn http_config(&self) -> HttpConfig {
        let defaults = HttpConfig::default();
        HttpConfig {
            base_url: self.base_url.clone(),
            connect_timeout: self
                .http
                .connect_timeout_seconds
                .map(Duration::from_secs)
                .unwrap_or(defaults.connect_timeout),
            request_timeout: self.http.request_timeout_seconds.map(Duration::from_secs),
        }
    }

    pub fn client_config(&self) -> JobClientConfig {
        JobClientConfig {
            defaults: self.request.clone(),
            poll: self.poll_config(),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}
