//! Settings for the cluster router diagnostic.
//!
//! Every field has a default, so a settings file only needs the values it
//! overrides:
//!
//! ```yaml
//! namespace: ingress
//! workloadName: edge-router
//! recencyWindowMs: 60000
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_NAMESPACE: &str = "default";
pub const DEFAULT_WORKLOAD_NAME: &str = "router";

/// Leading timestamp, then the route list failure and its reason
pub const DEFAULT_FAILURE_PATTERN: &str = r"^(\S+).*Failed to list \*api.Route: (.*)";

/// Layout of the leading log timestamp, nanosecond precision in UTC
pub const DEFAULT_TIMESTAMP_LAYOUT: &str = "%Y-%m-%dT%H:%M:%S.%9fZ";

/// The router retries every second; anything older than this is presumed resolved
pub const DEFAULT_RECENCY_WINDOW_MS: u64 = 30_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RouterCheckSettings {
    /// Namespace holding the router workload
    pub namespace: String,
    pub workload_name: String,
    /// Regex with two groups: timestamp and reason
    pub failure_pattern: String,
    /// `chrono` format string for the captured timestamp
    pub timestamp_layout: String,
    /// Matches younger than this count as a live failure
    pub recency_window_ms: u64,
    /// Upper bound for scanning one pod's log; unbounded when unset
    pub log_scan_timeout_ms: Option<u64>,
}

impl Default for RouterCheckSettings {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            workload_name: DEFAULT_WORKLOAD_NAME.to_string(),
            failure_pattern: DEFAULT_FAILURE_PATTERN.to_string(),
            timestamp_layout: DEFAULT_TIMESTAMP_LAYOUT.to_string(),
            recency_window_ms: DEFAULT_RECENCY_WINDOW_MS,
            log_scan_timeout_ms: None,
        }
    }
}

impl RouterCheckSettings {
    /// Load settings from a YAML (or JSON) file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let settings: Self =
            serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.display().to_string(),
                source,
            })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject settings the router check could not work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.namespace.is_empty() {
            return Err(invalid("namespace", "must not be empty"));
        }
        if self.workload_name.is_empty() {
            return Err(invalid("workloadName", "must not be empty"));
        }
        let pattern = regex::Regex::new(&self.failure_pattern)?;
        if pattern.captures_len() < 3 {
            return Err(invalid(
                "failurePattern",
                "needs a timestamp group and a reason group",
            ));
        }
        if self.timestamp_layout.is_empty() {
            return Err(invalid("timestampLayout", "must not be empty"));
        }
        Ok(())
    }

    #[must_use]
    pub fn recency_window(&self) -> Duration {
        Duration::from_millis(self.recency_window_ms)
    }

    #[must_use]
    pub fn log_scan_timeout(&self) -> Option<Duration> {
        self.log_scan_timeout_ms.map(Duration::from_millis)
    }
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let settings = RouterCheckSettings::default();
        assert_eq!(settings.namespace, "default");
        assert_eq!(settings.workload_name, "router");
        assert_eq!(settings.recency_window(), Duration::from_secs(30));
        assert_eq!(settings.log_scan_timeout(), None);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "workloadName: edge-router\nlogScanTimeoutMs: 5000").unwrap();

        let settings = RouterCheckSettings::from_file(file.path()).unwrap();
        assert_eq!(settings.workload_name, "edge-router");
        assert_eq!(settings.namespace, "default");
        assert_eq!(settings.log_scan_timeout(), Some(Duration::from_secs(5)));
        assert_eq!(settings.failure_pattern, DEFAULT_FAILURE_PATTERN);
    }

    #[test]
    fn test_missing_file() {
        let err = RouterCheckSettings::from_file("/nonexistent/router.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_malformed_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "recencyWindowMs: [not, a, number]").unwrap();

        let err = RouterCheckSettings::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_pattern_validation() {
        let settings = RouterCheckSettings {
            failure_pattern: "(unclosed".to_string(),
            ..RouterCheckSettings::default()
        };
        assert!(matches!(settings.validate(), Err(ConfigError::Pattern(_))));

        let settings = RouterCheckSettings {
            failure_pattern: r"^(\S+) only one group".to_string(),
            ..RouterCheckSettings::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::Invalid { field, .. }) if field == "failurePattern"
        ));
    }
}
