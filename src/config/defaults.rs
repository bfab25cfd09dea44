//! Built-in client defaults (layer 1)

use serde::{Deserialize, Serialize};

/// Built-in default configuration values
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltinDefaults {
    /// Service base URL (default: the public PCATS deployment)
    pub base_url: String,

    /// Pause between status checks in seconds (default: 5)
    pub poll_interval_seconds: u64,

    /// TCP connect timeout in seconds (default: 30)
    pub connect_timeout_seconds: u64,
}

impl Default for BuiltinDefaults {
    fn default() -> Self {
        Self {
            base_url: pcats_protocol::DEFAULT_BASE_URL.to_string(),
            poll_interval_seconds: 5,
            connect_timeout_seconds: 30,
        }
    }
}

impl BuiltinDefaults {
    /// Convert to JSON Value for merging
    ///
    /// Unbounded polling, no request timeout and no request options are the
    /// defaults, so those keys are simply absent.
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "base_url": self.base_url,
            "poll": {
                "interval_seconds": self.poll_interval_seconds
            },
            "http": {
                "connect_timeout_seconds": self.connect_timeout_seconds
            }
        })
    }
}
