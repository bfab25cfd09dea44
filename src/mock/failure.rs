//! Failure Injection for the Mock Service
//!
//! Failures are keyed by endpoint name (`Endpoint::name()`), so a test can
//! break status polls without touching submissions.

use std::collections::HashMap;
use std::time::Duration;

/// What an injected failure does to a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureMode {
    /// The request never reaches the service
    Transport(String),
    /// The service answers with this status code and body
    Http { status: u16, body: String },
    /// The service answers 200 with a body that is not JSON
    MalformedBody,
}

/// Failure configuration for an endpoint
#[derive(Debug, Clone)]
pub struct FailureConfig {
    /// What goes wrong (None = only delay)
    pub mode: Option<FailureMode>,
    /// Delay to add before responding
    pub delay: Option<Duration>,
    /// Number of times to fail before succeeding (None = always fail)
    pub fail_count: Option<u32>,
}

impl FailureConfig {
    fn with_mode(mode: FailureMode) -> Self {
        Self {
            mode: Some(mode),
            delay: None,
            fail_count: None,
        }
    }

    /// Fail before the request is answered, as a dropped connection would
    pub fn transport(message: impl Into<String>) -> Self {
        Self::with_mode(FailureMode::Transport(message.into()))
    }

    /// Answer with a non-200 status
    pub fn http(status: u16, body: impl Into<String>) -> Self {
        Self::with_mode(FailureMode::Http {
            status,
            body: body.into(),
        })
    }

    /// Answer 200 with an unparseable body
    pub fn malformed_body() -> Self {
        Self::with_mode(FailureMode::MalformedBody)
    }

    /// Create a config that just adds delay
    pub fn delay(duration: Duration) -> Self {
        Self {
            mode: None,
            delay: Some(duration),
            fail_count: None,
        }
    }

    /// Set the number of times to fail before succeeding
    pub fn with_fail_count(mut self, count: u32) -> Self {
        self.fail_count = Some(count);
        self
    }
}

/// Failure injector for the mock service
#[derive(Debug, Default)]
pub struct FailureInjector {
    /// Per-endpoint failure configs
    configs: HashMap<String, FailureConfig>,
    /// Call counts per endpoint (for fail_count tracking)
    call_counts: HashMap<String, u32>,
}

impl FailureInjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inject a failure for an endpoint, resetting its call count
    pub fn inject(&mut self, endpoint: &str, config: FailureConfig) {
        self.configs.insert(endpoint.to_string(), config);
        self.call_counts.insert(endpoint.to_string(), 0);
    }

    /// Clear all failure injections
    pub fn clear(&mut self) {
        self.configs.clear();
        self.call_counts.clear();
    }

    /// Clear failure injection for a specific endpoint
    pub fn clear_endpoint(&mut self, endpoint: &str) {
        self.configs.remove(endpoint);
        self.call_counts.remove(endpoint);
    }

    /// Failure to apply to this call, if any
    pub fn check(&mut self, endpoint: &str) -> Option<FailureConfig> {
        let config = self.configs.get(endpoint)?;
        let count = self.call_counts.entry(endpoint.to_string()).or_insert(0);
        *count += 1;

        if let Some(fail_limit) = config.fail_count {
            if *count > fail_limit {
                return None;
            }
        }

        Some(config.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_config_http() {
        let config = FailureConfig::http(503, "maintenance");
        assert_eq!(
            config.mode,
            Some(FailureMode::Http {
                status: 503,
                body: "maintenance".to_string()
            })
        );
        assert!(config.fail_count.is_none());
    }

    #[test]
    fn test_failure_injector_basic() {
        let mut injector = FailureInjector::new();
        assert!(injector.check("status").is_none());

        injector.inject("status", FailureConfig::malformed_body());
        let config = injector.check("status").unwrap();
        assert_eq!(config.mode, Some(FailureMode::MalformedBody));

        // Other endpoints are untouched
        assert!(injector.check("print").is_none());
    }

    #[test]
    fn test_failure_injector_fail_count() {
        let mut injector = FailureInjector::new();
        injector.inject(
            "uploadfile",
            FailureConfig::transport("reset").with_fail_count(2),
        );

        assert!(injector.check("uploadfile").is_some());
        assert!(injector.check("uploadfile").is_some());
        assert!(injector.check("uploadfile").is_none());
    }

    #[test]
    fn test_failure_injector_clear() {
        let mut injector = FailureInjector::new();
        injector.inject("staticgp", FailureConfig::http(500, "x"));
        assert!(injector.check("staticgp").is_some());

        injector.clear_endpoint("staticgp");
        assert!(injector.check("staticgp").is_none());

        injector.inject("plot", FailureConfig::http(500, "x"));
        injector.clear();
        assert!(injector.check("plot").is_none());
    }
}
