//! Configuration module
//!
//! See [`ModemConfig`] for the available keys.

use crate::{modem::LinkSettings, ResolverReturn};
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use simple_logger::SimpleLogger;
use std::path::Path;

/// Installs [`SimpleLogger`] at the given level; [`LevelFilter::Off`] installs nothing.
pub fn init_logger(log_level: LevelFilter) {
    match log_level {
        LevelFilter::Off => (),
        _ => {
            if let Err(err) = SimpleLogger::new().with_level(log_level).init() {
                log::warn!("Problems with initialising the logger: {err}");
            }
        }
    }
}

/// Modem and driver settings, usually read from a JSON file. Missing keys take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModemConfig {
    pub port: String,
    pub baud_rate: u32,
    pub rx_pin: Option<u8>,
    pub tx_pin: Option<u8>,
    pub power_pin: Option<u8>,
    pub power_pin_active_high: bool,
    pub ignore_errors: bool,
    pub poll_interval_ms: u64,
    pub log_level: LevelFilter,
}

impl Default for ModemConfig {
    fn default() -> Self {
        ModemConfig {
            port: "/dev/ttyS0".to_string(),
            baud_rate: 115200,
            rx_pin: None,
            tx_pin: None,
            power_pin: None,
            power_pin_active_high: true,
            ignore_errors: false,
            poll_interval_ms: 10,
            log_level: LevelFilter::Info,
        }
    }
}

impl ModemConfig {
    pub fn from_json_str(json: &str) -> ResolverReturn<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> ResolverReturn<Self> {
        let json: String = std::fs::read_to_string(path)?;
        ModemConfig::from_json_str(&json)
    }

    pub fn link_settings(&self) -> LinkSettings {
        LinkSettings {
            baud_rate: self.baud_rate,
            rx_pin: self.rx_pin,
            tx_pin: self.tx_pin,
            power_pin: self.power_pin,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn empty_object_gives_defaults() {
        let config = ModemConfig::from_json_str("{}").unwrap();
        assert_eq!(config, ModemConfig::default());
        assert_eq!(config.link_settings(), LinkSettings::default());
    }

    #[test]
    fn keys_override_defaults() {
        let config = ModemConfig::from_json_str(
            r#"{"port": "/dev/ttyAMA0", "power_pin": 4, "log_level": "debug", "ignore_errors": true}"#,
        )
        .unwrap();
        assert_eq!(config.port, "/dev/ttyAMA0");
        assert_eq!(config.link_settings().power_pin, Some(4));
        assert_eq!(config.log_level, LevelFilter::Debug);
        assert!(config.ignore_errors);
        assert_eq!(config.baud_rate, 115200);
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        let err = ModemConfig::from_json_str(r#"{"baud_rate": "fast"}"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = ModemConfig::from_file("/nonexistent/modem.json").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
