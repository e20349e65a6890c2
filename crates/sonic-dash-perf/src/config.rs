//! Scenario configuration.
//!
//! A scenario fixes the entity counts, batching and address base of one
//! performance run, plus how long to wait between dependency tiers.
//! Scenarios come from a named preset, a TOML file, or the defaults.
//!
//! File format:
//! ```toml
//! name = "route-10k"
//! vnet_count = 4
//! eni_count = 4
//! mapping_count = 1000
//! route_count = 10000
//! batch_count = 10
//! base_address_offset = 20
//!
//! [settle]
//! settle_delay_secs = 5
//! readiness_timeout_secs = 120
//! ```

use crate::derive::{MAX_BASE_OCTET, MAX_UNIQUE_INDEX};
use crate::error::{DashPerfError, DashPerfResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Scenario file read from the working directory when no preset or file
/// is named.
pub const DEFAULT_SCENARIO_FILE: &str = "dash-perf.toml";

/// Names accepted by [`ScenarioConfig::preset`].
pub const PRESET_NAMES: [&str; 5] = [
    "smoke",
    "route-1k",
    "route-10k-batched",
    "route-100k-batched",
    "mapping-100k",
];

/// Waiting behaviour between dependency tiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettleConfig {
    /// Fixed delay used when no readiness probe is available.
    #[serde(default = "default_settle_delay")]
    pub settle_delay_secs: u64,

    /// First interval between readiness polls.
    #[serde(default = "default_poll_initial_interval")]
    pub poll_initial_interval_ms: u64,

    /// Cap for the doubling poll interval.
    #[serde(default = "default_poll_max_interval")]
    pub poll_max_interval_ms: u64,

    /// Deadline for a table to reach its expected entry count.
    #[serde(default = "default_readiness_timeout")]
    pub readiness_timeout_secs: u64,
}

/// Parameters of one generation and submission run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    /// Scenario name, used in logs and reports.
    #[serde(default = "default_name")]
    pub name: String,

    #[serde(default = "default_one")]
    pub appliance_count: u32,

    #[serde(default = "default_one")]
    pub vnet_count: u32,

    #[serde(default = "default_one")]
    pub eni_count: u32,

    /// VNET mappings to generate. Zero skips the mapping table.
    #[serde(default)]
    pub mapping_count: u32,

    /// Routes to generate (the entity count under test).
    #[serde(default = "default_route_count")]
    pub route_count: u32,

    /// Documents the route and mapping tables are split into.
    #[serde(default = "default_one")]
    pub batch_count: u32,

    /// First octet of route and mapping addresses. Underlay addresses use
    /// this value plus 100.
    #[serde(default = "default_base_address_offset")]
    pub base_address_offset: u8,

    #[serde(default)]
    pub settle: SettleConfig,
}

fn default_name() -> String {
    "default".to_string()
}

fn default_one() -> u32 {
    1
}

fn default_route_count() -> u32 {
    1000
}

fn default_base_address_offset() -> u8 {
    10
}

fn default_settle_delay() -> u64 {
    5
}

fn default_poll_initial_interval() -> u64 {
    100
}

fn default_poll_max_interval() -> u64 {
    2000
}

fn default_readiness_timeout() -> u64 {
    60
}

impl Default for SettleConfig {
    fn default() -> Self {
        Self {
            settle_delay_secs: default_settle_delay(),
            poll_initial_interval_ms: default_poll_initial_interval(),
            poll_max_interval_ms: default_poll_max_interval(),
            readiness_timeout_secs: default_readiness_timeout(),
        }
    }
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            appliance_count: default_one(),
            vnet_count: default_one(),
            eni_count: default_one(),
            mapping_count: 0,
            route_count: default_route_count(),
            batch_count: default_one(),
            base_address_offset: default_base_address_offset(),
            settle: SettleConfig::default(),
        }
    }
}

impl SettleConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_secs(self.settle_delay_secs)
    }

    pub fn poll_initial_interval(&self) -> Duration {
        Duration::from_millis(self.poll_initial_interval_ms)
    }

    pub fn poll_max_interval(&self) -> Duration {
        Duration::from_millis(self.poll_max_interval_ms)
    }

    pub fn readiness_timeout(&self) -> Duration {
        Duration::from_secs(self.readiness_timeout_secs)
    }
}

impl ScenarioConfig {
    /// Returns a built-in scenario by name.
    pub fn preset(name: &str) -> Option<Self> {
        let base = Self {
            name: name.to_string(),
            ..Self::default()
        };
        let config = match name {
            "smoke" => Self {
                mapping_count: 10,
                route_count: 10,
                ..base
            },
            "route-1k" => Self {
                route_count: 1000,
                ..base
            },
            "route-10k-batched" => Self {
                vnet_count: 4,
                eni_count: 4,
                mapping_count: 1000,
                route_count: 10_000,
                batch_count: 10,
                ..base
            },
            "route-100k-batched" => Self {
                vnet_count: 16,
                eni_count: 16,
                mapping_count: 10_000,
                route_count: 100_000,
                batch_count: 100,
                settle: SettleConfig {
                    settle_delay_secs: 30,
                    readiness_timeout_secs: 600,
                    ..SettleConfig::default()
                },
                ..base
            },
            "mapping-100k" => Self {
                vnet_count: 8,
                eni_count: 8,
                mapping_count: 100_000,
                route_count: 1000,
                batch_count: 10,
                base_address_offset: 30,
                settle: SettleConfig {
                    settle_delay_secs: 30,
                    readiness_timeout_secs: 600,
                    ..SettleConfig::default()
                },
                ..base
            },
            _ => return None,
        };
        Some(config)
    }

    /// Loads a scenario from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> DashPerfResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| DashPerfError::io(path, e))?;
        Self::from_toml(&content).map_err(|e| match e {
            DashPerfError::InvalidConfig { message, .. } => {
                DashPerfError::invalid_config(path.display().to_string(), message)
            }
            other => other,
        })
    }

    /// Loads a scenario from a TOML file, falling back to defaults if the
    /// file does not exist.
    pub fn load_or_default(path: impl AsRef<Path>) -> DashPerfResult<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::from_file(path)
        } else {
            info!(
                "Scenario file {} not found, using defaults",
                path.display()
            );
            Ok(Self::default())
        }
    }

    /// Parses a scenario from TOML text.
    pub fn from_toml(content: &str) -> DashPerfResult<Self> {
        toml::from_str(content)
            .map_err(|e| DashPerfError::invalid_config("scenario", e.to_string()))
    }

    /// Serializes the scenario to TOML text.
    pub fn to_toml(&self) -> DashPerfResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| DashPerfError::invalid_config("scenario", e.to_string()))
    }

    /// Number of route documents.
    pub fn route_batches(&self) -> u32 {
        self.batch_count.min(self.route_count)
    }

    /// Number of mapping documents (zero when mappings are skipped).
    pub fn mapping_batches(&self) -> u32 {
        self.batch_count.min(self.mapping_count)
    }

    /// Validate the scenario.
    ///
    /// Rejects inputs whose derived addresses or identifiers would alias.
    pub fn validate(&self) -> DashPerfResult<()> {
        let required = [
            ("appliance_count", self.appliance_count),
            ("vnet_count", self.vnet_count),
            ("eni_count", self.eni_count),
            ("route_count", self.route_count),
            ("batch_count", self.batch_count),
        ];
        for (field, value) in required {
            if value == 0 {
                return Err(DashPerfError::invalid_config(field, "must be at least 1"));
            }
        }

        let bounded = [
            ("appliance_count", self.appliance_count),
            ("vnet_count", self.vnet_count),
            ("mapping_count", self.mapping_count),
            ("route_count", self.route_count),
        ];
        for (field, value) in bounded {
            if value >= MAX_UNIQUE_INDEX {
                return Err(DashPerfError::invalid_config(
                    field,
                    format!(
                        "{} exceeds {}; derived addresses would alias",
                        value,
                        MAX_UNIQUE_INDEX - 1
                    ),
                ));
            }
        }

        // ENI identifiers carry three decimal digits.
        if self.eni_count >= 1000 {
            return Err(DashPerfError::invalid_config(
                "eni_count",
                format!("{} exceeds 999; ENI identifiers would alias", self.eni_count),
            ));
        }

        if self.batch_count > self.route_count {
            return Err(DashPerfError::invalid_config(
                "batch_count",
                format!(
                    "{} batches for {} routes",
                    self.batch_count, self.route_count
                ),
            ));
        }

        if self.base_address_offset == 0 || self.base_address_offset > MAX_BASE_OCTET {
            return Err(DashPerfError::invalid_config(
                "base_address_offset",
                format!("must be 1-{}", MAX_BASE_OCTET),
            ));
        }

        if self.settle.poll_initial_interval_ms == 0 {
            return Err(DashPerfError::invalid_config(
                "settle.poll_initial_interval_ms",
                "must be > 0",
            ));
        }

        if self.settle.poll_max_interval_ms < self.settle.poll_initial_interval_ms {
            return Err(DashPerfError::invalid_config(
                "settle.poll_max_interval_ms",
                "must not be below poll_initial_interval_ms",
            ));
        }

        if self.settle.readiness_timeout_secs == 0 {
            return Err(DashPerfError::invalid_config(
                "settle.readiness_timeout_secs",
                "must be > 0",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = ScenarioConfig::default();
        assert_eq!(config.route_count, 1000);
        assert_eq!(config.vnet_count, 1);
        assert_eq!(config.batch_count, 1);
        assert_eq!(config.base_address_offset, 10);
        assert_eq!(config.settle.settle_delay(), Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_all_presets_valid() {
        for name in PRESET_NAMES {
            let config = ScenarioConfig::preset(name).unwrap();
            assert_eq!(config.name, name);
            config.validate().unwrap();
        }
        assert!(ScenarioConfig::preset("nonexistent").is_none());
    }

    #[test]
    fn test_toml_partial_uses_defaults() {
        let config = ScenarioConfig::from_toml(
            r#"
            name = "custom"
            route_count = 500
            batch_count = 5

            [settle]
            readiness_timeout_secs = 9
            "#,
        )
        .unwrap();
        assert_eq!(config.name, "custom");
        assert_eq!(config.route_count, 500);
        assert_eq!(config.route_batches(), 5);
        assert_eq!(config.eni_count, 1);
        assert_eq!(config.settle.readiness_timeout_secs, 9);
        assert_eq!(config.settle.settle_delay_secs, 5);
    }

    #[test]
    fn test_toml_serialization_roundtrip() {
        let config = ScenarioConfig::preset("route-10k-batched").unwrap();
        let text = config.to_toml().unwrap();
        assert!(text.contains("route_count = 10000"));
        assert_eq!(ScenarioConfig::from_toml(&text).unwrap(), config);
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "vnet_count = 3\nmapping_count = 30").unwrap();
        let config = ScenarioConfig::from_file(file.path()).unwrap();
        assert_eq!(config.vnet_count, 3);
        assert_eq!(config.mapping_batches(), 1);
    }

    #[test]
    fn test_from_file_bad_toml() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "vnet_count = \"many\"").unwrap();
        let err = ScenarioConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, DashPerfError::InvalidConfig { .. }));
    }

    #[test]
    fn test_load_or_default_existing_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "name = \"local\"\nroute_count = 20").unwrap();
        let config = ScenarioConfig::load_or_default(file.path()).unwrap();
        assert_eq!(config.name, "local");
        assert_eq!(config.route_count, 20);
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = ScenarioConfig::load_or_default("/nonexistent/scenario.toml").unwrap();
        assert_eq!(config, ScenarioConfig::default());
    }

    #[test]
    fn test_validate_rejects_zero_counts() {
        let config = ScenarioConfig {
            vnet_count: 0,
            ..ScenarioConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("vnet_count"));
    }

    #[test]
    fn test_validate_rejects_aliasing_ranges() {
        let config = ScenarioConfig {
            route_count: MAX_UNIQUE_INDEX,
            ..ScenarioConfig::default()
        };
        assert!(config.validate().unwrap_err().to_string().contains("route_count"));

        let config = ScenarioConfig {
            eni_count: 1000,
            ..ScenarioConfig::default()
        };
        assert!(config.validate().unwrap_err().to_string().contains("eni_count"));

        let config = ScenarioConfig {
            base_address_offset: 100,
            ..ScenarioConfig::default()
        };
        assert!(config
            .validate()
            .unwrap_err()
            .to_string()
            .contains("base_address_offset"));
    }

    #[test]
    fn test_validate_batch_count() {
        let config = ScenarioConfig {
            route_count: 4,
            batch_count: 5,
            ..ScenarioConfig::default()
        };
        assert!(config.validate().is_err());

        let config = ScenarioConfig {
            route_count: 10,
            mapping_count: 3,
            batch_count: 5,
            ..ScenarioConfig::default()
        };
        config.validate().unwrap();
        assert_eq!(config.route_batches(), 5);
        assert_eq!(config.mapping_batches(), 3);
    }

    #[test]
    fn test_validate_settle() {
        let mut config = ScenarioConfig::default();
        config.settle.poll_initial_interval_ms = 0;
        assert!(config.validate().is_err());

        let mut config = ScenarioConfig::default();
        config.settle.poll_max_interval_ms = 10;
        assert!(config.validate().is_err());
    }
}
