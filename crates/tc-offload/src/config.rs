//! Configuration file support for flow offload.
//!
//! Loads and validates offload settings from TOML.
//! Default location: /etc/openvswitch/tc-offload.toml

use crate::error::{OffloadError, OffloadResult};
use offload_common::RateLimiter;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tc_flower::OffloadPolicy;
use tracing::info;

/// Default configuration path.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/openvswitch/tc-offload.toml";

/// Classifier configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Hardware/software placement of installed entries
    #[serde(default)]
    pub policy: OffloadPolicy,
}

/// Backend failure logging
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Failure messages admitted per second
    #[serde(default = "default_rate_per_sec")]
    pub rate_per_sec: u32,

    /// Failure messages admitted in a burst
    #[serde(default = "default_burst")]
    pub burst: u32,
}

/// Tunnel defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TunnelConfig {
    /// UDP destination port for tunnel-set actions that leave it unset (0 = none)
    #[serde(default)]
    pub default_dst_port: u16,
}

/// Complete offload configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OffloadConfig {
    #[serde(default)]
    pub classifier: ClassifierConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub tunnel: TunnelConfig,
}

fn default_rate_per_sec() -> u32 {
    offload_common::rate_limit::DEFAULT_RATE_PER_SEC
}

fn default_burst() -> u32 {
    offload_common::rate_limit::DEFAULT_BURST
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            rate_per_sec: default_rate_per_sec(),
            burst: default_burst(),
        }
    }
}

impl OffloadConfig {
    /// Load configuration from file, falling back to defaults if file not found
    pub fn load_or_default(path: impl AsRef<Path>) -> OffloadResult<Self> {
        let path = path.as_ref();

        match fs::read_to_string(path) {
            Ok(content) => {
                let config: Self = toml::from_str(&content).map_err(|e| {
                    OffloadError::Configuration(format!(
                        "Failed to parse config file {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                config.validate()?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "Config file not found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(OffloadError::Io(e)),
        }
    }

    /// Load from default location or defaults
    pub fn load() -> OffloadResult<Self> {
        Self::load_or_default(DEFAULT_CONFIG_PATH)
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> OffloadResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| {
            OffloadError::Configuration(format!("Failed to serialize config: {}", e))
        })?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> OffloadResult<()> {
        if self.logging.rate_per_sec == 0 {
            return Err(OffloadError::Configuration(
                "rate_per_sec must be > 0".to_string(),
            ));
        }
        if self.logging.burst == 0 {
            return Err(OffloadError::Configuration("burst must be > 0".to_string()));
        }
        Ok(())
    }

    /// `TCA_FLOWER_FLAGS` for installed entries.
    pub fn flower_flags(&self) -> u32 {
        self.classifier.policy.flags()
    }

    /// Default tunnel destination port, if configured.
    pub fn tunnel_dst_port(&self) -> Option<u16> {
        match self.tunnel.default_dst_port {
            0 => None,
            port => Some(port),
        }
    }

    /// Rate limiter for backend failure logs.
    pub fn failure_limiter(&self) -> RateLimiter {
        RateLimiter::new(self.logging.rate_per_sec, self.logging.burst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config() {
        let config = OffloadConfig::default();
        assert_eq!(config.classifier.policy, OffloadPolicy::None);
        assert_eq!(config.logging.rate_per_sec, 5);
        assert_eq!(config.logging.burst, 20);
        assert_eq!(config.tunnel_dst_port(), None);
        assert_eq!(config.flower_flags(), 0);
    }

    #[test]
    fn test_toml_deserialization() {
        let toml_str = r#"
[classifier]
policy = "skip_sw"

[tunnel]
default_dst_port = 4789
"#;
        let config: OffloadConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.classifier.policy, OffloadPolicy::SkipSw);
        assert_eq!(config.flower_flags(), 2);
        assert_eq!(config.tunnel_dst_port(), Some(4789));
        // Unspecified values should use defaults
        assert_eq!(config.logging.burst, 20);
    }

    #[test]
    fn test_skip_hw_flags() {
        let config: OffloadConfig = toml::from_str("[classifier]\npolicy = \"skip_hw\"\n").unwrap();
        assert_eq!(config.flower_flags(), 1);
    }

    #[test]
    fn test_validate_rejects_zero_rate() {
        let mut config = OffloadConfig::default();
        assert!(config.validate().is_ok());

        config.logging.rate_per_sec = 0;
        assert!(config.validate().is_err());

        config.logging.rate_per_sec = 5;
        config.logging.burst = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_nonexistent_file_defaults() {
        let config = OffloadConfig::load_or_default("/nonexistent/tc-offload.toml").unwrap();
        assert_eq!(config.logging.rate_per_sec, 5);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tc-offload.toml");

        let mut config = OffloadConfig::default();
        config.classifier.policy = OffloadPolicy::SkipHw;
        config.tunnel.default_dst_port = 6081;
        config.save(&path).unwrap();

        let loaded = OffloadConfig::load_or_default(&path).unwrap();
        assert_eq!(loaded.classifier.policy, OffloadPolicy::SkipHw);
        assert_eq!(loaded.tunnel_dst_port(), Some(6081));
    }

    #[test]
    fn test_invalid_file_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[logging]\nrate_per_sec = 0\n").unwrap();

        let err = OffloadConfig::load_or_default(&path).unwrap_err();
        assert!(matches!(err, OffloadError::Configuration(_)));

        std::fs::write(&path, "not toml [").unwrap();
        assert!(OffloadConfig::load_or_default(&path).is_err());
    }
}
