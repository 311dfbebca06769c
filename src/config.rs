//! # Host configuration and state persistence
//!
//! Both files are TOML. The host configuration selects the serial link, the
//! listening address, frequency limits and the mode-byte layout; every
//! section is optional.
//!
//! ```toml
//! [server]
//! bind = "0.0.0.0:5025"
//!
//! [serial]
//! port = "/dev/ttyUSB0"
//! baud = 57600
//!
//! [limits]
//! min_freq = 10.0    # MHz
//! max_freq = 400.0   # MHz
//!
//! [mode]
//! channel_bits = [5, 4]
//!
//! [state]
//! path = "dds_state.toml"
//! ```
//!
//! The state file holds one table per board/channel, which flattens into the
//! `"<section>.<field>"` map used by [`crate::state::StateStore`]:
//!
//! ```toml
//! [board1_ch1]
//! output = "True"
//! frequency = "100000000"
//! amplitude = "1023"
//! phase = "0"
//! ```

use crate::dds::codec::ModeLayout;
use crate::dds::Limits;
use crate::hardware::serial::DEFAULT_BAUD;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration for the DDS host.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub mode: ModeLayout,
    #[serde(default)]
    pub state: StateConfig,
}

/// Text protocol listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: default_bind() }
    }
}

/// Serial link to the FPGA.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SerialConfig {
    #[serde(default)]
    pub port: String,
    #[serde(default = "default_baud")]
    pub baud: u32,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: "".to_string(),
            baud: default_baud(),
        }
    }
}

/// Output frequency limits in MHz.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LimitsConfig {
    #[serde(default = "default_min_freq")]
    pub min_freq: f64,
    #[serde(default = "default_max_freq")]
    pub max_freq: f64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            min_freq: default_min_freq(),
            max_freq: default_max_freq(),
        }
    }
}

impl LimitsConfig {
    pub fn to_limits(&self) -> Limits {
        Limits {
            min_freq_mhz: self.min_freq,
            max_freq_mhz: self.max_freq,
        }
    }
}

/// Where the state mirror is saved between runs.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StateConfig {
    #[serde(default = "default_state_path")]
    pub path: PathBuf,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self { path: default_state_path() }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let limits = &self.limits;
        if !(limits.min_freq.is_finite() && limits.max_freq.is_finite()) {
            return Err(ConfigError::Invalid("frequency limits must be finite".to_string()));
        }
        if limits.min_freq < 0.0 || limits.min_freq > limits.max_freq {
            return Err(ConfigError::Invalid(format!(
                "frequency limits [{}, {}] MHz are not an ascending non-negative range",
                limits.min_freq, limits.max_freq
            )));
        }
        // Keeps every tuning word inside 48 bits.
        if limits.max_freq >= crate::dds::codec::REFERENCE_CLOCK_HZ / 1e6 {
            return Err(ConfigError::Invalid(format!(
                "max_freq {} MHz must stay below the reference clock",
                limits.max_freq
            )));
        }
        if self.serial.baud == 0 {
            return Err(ConfigError::Invalid("serial baud rate must be > 0".to_string()));
        }
        self.mode.validate().map_err(ConfigError::Invalid)
    }
}

// Default value functions
fn default_bind() -> String { "0.0.0.0:5025".to_string() }
fn default_baud() -> u32 { DEFAULT_BAUD }
fn default_min_freq() -> f64 { 10.0 }
fn default_max_freq() -> f64 { 400.0 }
fn default_state_path() -> PathBuf { PathBuf::from("dds_state.toml") }

/// Load configuration from a TOML file at the given path.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        tracing::error!("Failed to read config file '{}': {}", path.display(), e);
        ConfigError::Io(e)
    })?;
    let config: Config = toml::from_str(&contents).map_err(|e| {
        tracing::error!("Failed to parse config TOML: {}", e);
        ConfigError::Toml(e)
    })?;
    config.validate()?;
    Ok(config)
}

/// Read the persisted state map. A missing file yields an empty map.
///
/// Values may be written as strings, numbers or booleans; anything that is
/// not a scalar inside a section table is skipped with a warning.
pub fn load_state(path: &Path) -> Result<BTreeMap<String, String>, ConfigError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!("No saved state at '{}', starting from defaults", path.display());
            return Ok(BTreeMap::new());
        }
        Err(e) => return Err(ConfigError::Io(e)),
    };
    let table: toml::Table = toml::from_str(&contents)?;

    let mut map = BTreeMap::new();
    for (section, fields) in table {
        let toml::Value::Table(fields) = fields else {
            tracing::warn!("Skipping state entry '{}': not a section", section);
            continue;
        };
        for (field, value) in fields {
            let text = match value {
                toml::Value::String(s) => s,
                toml::Value::Integer(i) => i.to_string(),
                toml::Value::Float(f) => f.to_string(),
                toml::Value::Boolean(b) => (if b { "True" } else { "False" }).to_string(),
                other => {
                    tracing::warn!("Skipping state entry '{}.{}': unsupported value {}", section, field, other);
                    continue;
                }
            };
            map.insert(format!("{}.{}", section, field), text);
        }
    }
    Ok(map)
}

/// Write the flat state map back as one table per section.
pub fn save_state(path: &Path, map: &BTreeMap<String, String>) -> Result<(), ConfigError> {
    let mut sections: BTreeMap<&str, BTreeMap<&str, &str>> = BTreeMap::new();
    for (entry, value) in map {
        match entry.split_once('.') {
            Some((section, field)) => {
                sections.entry(section).or_default().insert(field, value.as_str());
            }
            None => tracing::warn!("Not saving state entry '{}': expected <section>.<field>", entry),
        }
    }
    let contents = toml::to_string(&sections)?;
    std::fs::write(path, contents)?;
    tracing::info!("Saved state to '{}'", path.display());
    Ok(())
}
