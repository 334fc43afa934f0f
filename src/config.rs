use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::errors::{ConfigError, ConfigResult};

/// Exporter configuration, loaded from a TOML file. Every field has a
/// default so a missing file yields a usable configuration; a present but
/// malformed file is a fatal error.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExporterConfig {
    /// Address the HTTP metrics/health surface binds to.
    pub listen_addr: String,
    /// I2C character device path.
    pub i2c_path: String,
    /// 7-bit sensor address on the bus.
    pub i2c_address: u16,
    /// Poll cadence in milliseconds. The SCD4x produces a measurement
    /// every 5 seconds in periodic mode.
    pub poll_interval_ms: u64,
    /// Consecutive failed polls before a recovery attempt.
    pub failure_threshold: u32,
    pub log_format: LogFormat,
    /// Optional ambient pressure compensation, in pascals.
    pub ambient_pressure_pa: Option<u32>,
    /// Optional temperature offset, in degrees Celsius.
    pub temperature_offset_c: Option<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Text,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:9161".to_string(),
            i2c_path: "/dev/i2c-1".to_string(),
            i2c_address: 0x62,
            poll_interval_ms: 5000,
            failure_threshold: 5,
            log_format: LogFormat::Json,
            ambient_pressure_pa: None,
            temperature_offset_c: None,
        }
    }
}

impl ExporterConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "poll_interval_ms",
                reason: "must be positive".to_string(),
            });
        }
        if self.failure_threshold == 0 {
            return Err(ConfigError::InvalidValue {
                field: "failure_threshold",
                reason: "must be positive".to_string(),
            });
        }
        if let Some(pa) = self.ambient_pressure_pa {
            // Valid compensation range per the datasheet: 700-1200 hPa
            if !(70_000..=120_000).contains(&pa) {
                return Err(ConfigError::InvalidValue {
                    field: "ambient_pressure_pa",
                    reason: format!("{pa} is outside 70000-120000"),
                });
            }
        }
        if let Some(offset) = self.temperature_offset_c {
            if !(0.0..=20.0).contains(&offset) {
                return Err(ConfigError::InvalidValue {
                    field: "temperature_offset_c",
                    reason: format!("{offset} is outside 0-20"),
                });
            }
        }
        Ok(())
    }
}

/// Loads config from a TOML file; a missing file yields the defaults.
pub fn load_config(path: &str) -> ConfigResult<ExporterConfig> {
    let config = if Path::new(path).exists() {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_string(),
            source,
        })?;
        toml::from_str(&content)?
    } else {
        ExporterConfig::default()
    };
    config.validate()?;
    Ok(config)
}
