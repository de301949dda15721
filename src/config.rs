//! Processor configuration
//!
//! All settings are carried in an explicit `TraceConfig` handed to the
//! processor at construction; nothing is read from process-global state.

use crate::error::TraceError;
use crate::formatter::parse_timezone;
use crate::types::IntervalOrdering;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// File name of the raw payload audit log inside the output directory
pub const DEFAULT_AUDIT_LOG: &str = "client_proximity_data.log";

/// Report processor configuration
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct TraceConfig {
    /// Root under which one directory per delivery is created
    pub output_dir: PathBuf,
    /// IANA timezone used for local timestamps and directory names
    pub timezone: String,
    /// Append every raw payload to the audit log before processing
    pub audit_log: bool,
    /// Audit log location (defaults to `output_dir/client_proximity_data.log`)
    pub audit_log_path: Option<PathBuf>,
    /// Ordering applied to each device's intervals before dwell coalescing
    pub interval_ordering: IntervalOrdering,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            timezone: "UTC".to_string(),
            audit_log: true,
            audit_log_path: None,
            interval_ordering: IntervalOrdering::default(),
        }
    }
}

impl TraceConfig {
    /// Parse a YAML configuration document
    pub fn from_yaml_str(yaml: &str) -> Result<Self, TraceError> {
        let config: TraceConfig =
            serde_yaml::from_str(yaml).map_err(|e| TraceError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a YAML configuration file
    pub fn from_file(path: &Path) -> Result<Self, TraceError> {
        let yaml = fs::read_to_string(path).map_err(|e| TraceError::io(path, e))?;
        Self::from_yaml_str(&yaml)
    }

    /// Validates the configuration and resolves the timezone
    pub fn validate(&self) -> Result<Tz, TraceError> {
        if self.output_dir.as_os_str().is_empty() {
            return Err(TraceError::Config("output_dir cannot be empty".to_string()));
        }
        parse_timezone(&self.timezone)
    }

    /// Effective audit log path, or `None` when auditing is disabled
    pub fn audit_log_path(&self) -> Option<PathBuf> {
        if !self.audit_log {
            return None;
        }
        Some(
            self.audit_log_path
                .clone()
                .unwrap_or_else(|| self.output_dir.join(DEFAULT_AUDIT_LOG)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_valid_config() {
        let yaml = r#"
output_dir: /var/lib/proximity
timezone: America/Los_Angeles
audit_log_path: /var/log/proximity/client_proximity_data.log
interval_ordering: as_received
"#;

        let config = TraceConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.output_dir, PathBuf::from("/var/lib/proximity"));
        assert_eq!(config.timezone, "America/Los_Angeles");
        assert!(config.audit_log);
        assert_eq!(config.interval_ordering, IntervalOrdering::AsReceived);
        assert_eq!(
            config.audit_log_path(),
            Some(PathBuf::from("/var/log/proximity/client_proximity_data.log"))
        );
    }

    #[test]
    fn test_defaults() {
        let config = TraceConfig::from_yaml_str("{}").unwrap();
        assert_eq!(config, TraceConfig::default());
        assert_eq!(config.interval_ordering, IntervalOrdering::SortByStart);
        assert_eq!(
            config.audit_log_path(),
            Some(PathBuf::from(".").join(DEFAULT_AUDIT_LOG))
        );
    }

    #[test]
    fn test_audit_disabled() {
        let config = TraceConfig::from_yaml_str("audit_log: false").unwrap();
        assert_eq!(config.audit_log_path(), None);
    }

    #[test]
    fn test_validation_errors() {
        assert!(matches!(
            TraceConfig::from_yaml_str("timezone: Not/AZone"),
            Err(TraceError::InvalidTimezone(_))
        ));
        assert!(matches!(
            TraceConfig::from_yaml_str("output_dir: \"\""),
            Err(TraceError::Config(_))
        ));
        assert!(matches!(
            TraceConfig::from_yaml_str("dnac_password: hunter2"),
            Err(TraceError::Config(_))
        ));
    }
}
