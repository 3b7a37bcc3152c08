use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Connect attempts used when `ntrip_connect_attempts` is unset or zero
pub const DEFAULT_CONNECT_ATTEMPTS: usize = 10;
/// Baud rate used when none is configured
pub const DEFAULT_BAUD_RATE: u32 = 115200;

const DEFAULT_READ_TIMEOUT_MS: u64 = 1000;
const DEFAULT_GGA_INTERVAL_SECS: u64 = 10;

#[derive(Error, Clone, Debug, PartialEq, Eq)]
/// Configuration validation errors
pub enum ConfigError {
    /// A required attribute is missing
    #[error("error validating \"{path}\": \"{field}\" is required")]
    FieldRequired {
        /// Path of the component being validated
        path: String,
        /// Name of the missing attribute
        field: &'static str,
    },
}

impl ConfigError {
    fn required(path: &str, field: &'static str) -> Self {
        ConfigError::FieldRequired {
            path: path.to_string(),
            field,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
/// NTRIP caster settings
pub struct NtripConfig {
    /// Caster address, e.g. `http://caster.example:2101`
    #[serde(rename = "ntrip_url", default)]
    pub url: String,
    /// Caster username
    #[serde(rename = "ntrip_username", default)]
    pub username: String,
    /// Caster password
    #[serde(rename = "ntrip_password", default)]
    pub password: String,
    /// Mountpoint to stream corrections from
    #[serde(rename = "ntrip_mountpoint", default)]
    pub mountpoint: String,
    /// Maximum connect and stream attempts, zero selects the default
    #[serde(rename = "ntrip_connect_attempts", default)]
    pub connect_attempts: usize,
    /// Force (or disable) the virtual reference station handshake.
    /// Decided from the caster sourcetable when unset.
    #[serde(
        rename = "ntrip_virtual_base",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub virtual_base: Option<bool>,
    /// Network read timeout in milliseconds
    #[serde(
        rename = "ntrip_read_timeout_ms",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub read_timeout_ms: Option<u64>,
    /// Interval between GGA sentences sent to a virtual reference station
    #[serde(
        rename = "ntrip_gga_interval_secs",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub gga_interval_secs: Option<u64>,
}

impl NtripConfig {
    /// Validate the NTRIP attributes
    pub fn validate(&self, path: &str) -> Result<(), ConfigError> {
        if self.url.is_empty() {
            return Err(ConfigError::required(path, "ntrip_url"));
        }
        Ok(())
    }

    /// Effective number of connect attempts
    pub fn max_attempts(&self) -> usize {
        if self.connect_attempts == 0 {
            DEFAULT_CONNECT_ATTEMPTS
        } else {
            self.connect_attempts
        }
    }

    /// Effective network read timeout
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(
            self.read_timeout_ms
                .filter(|&ms| ms > 0)
                .unwrap_or(DEFAULT_READ_TIMEOUT_MS),
        )
    }

    /// Effective GGA resend interval
    pub fn gga_interval(&self) -> Duration {
        Duration::from_secs(
            self.gga_interval_secs
                .filter(|&s| s > 0)
                .unwrap_or(DEFAULT_GGA_INTERVAL_SECS),
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
/// Serial receiver settings
pub struct SerialConfig {
    /// Serial device, e.g. `/dev/ttyUSB0`
    #[serde(default)]
    pub serial_path: String,
    /// Serial baud rate, zero selects 115200
    #[serde(default)]
    pub serial_baud_rate: u32,
}

impl SerialConfig {
    /// Validate the serial attributes
    pub fn validate(&self, path: &str) -> Result<(), ConfigError> {
        if self.serial_path.is_empty() {
            return Err(ConfigError::required(path, "serial_path"));
        }
        Ok(())
    }

    /// Effective baud rate
    pub fn baud_rate(&self) -> u32 {
        if self.serial_baud_rate == 0 {
            DEFAULT_BAUD_RATE
        } else {
            self.serial_baud_rate
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
/// I2C receiver settings
pub struct I2cConfig {
    /// I2C bus name
    #[serde(default)]
    pub i2c_bus: String,
    /// 7-bit device address
    #[serde(default)]
    pub i2c_addr: u8,
    /// Baud rate requested from the receiver, zero selects 115200
    #[serde(default)]
    pub i2c_baud_rate: u32,
}

impl I2cConfig {
    /// Validate the I2C attributes
    pub fn validate(&self, path: &str) -> Result<(), ConfigError> {
        if self.i2c_bus.is_empty() {
            return Err(ConfigError::required(path, "i2c_bus"));
        }
        if self.i2c_addr == 0 {
            return Err(ConfigError::required(path, "i2c_addr"));
        }
        Ok(())
    }

    /// Effective baud rate
    pub fn baud_rate(&self) -> u32 {
        if self.i2c_baud_rate == 0 {
            DEFAULT_BAUD_RATE
        } else {
            self.i2c_baud_rate
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
/// RTK sensor attached over a serial port
pub struct RtkSerialConfig {
    /// Receiver attributes
    #[serde(flatten)]
    pub serial: SerialConfig,
    /// Caster attributes
    #[serde(flatten)]
    pub ntrip: NtripConfig,
}

impl RtkSerialConfig {
    /// Validate all attributes, transport first
    pub fn validate(&self, path: &str) -> Result<(), ConfigError> {
        self.serial.validate(path)?;
        self.ntrip.validate(path)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
/// RTK sensor attached over an I2C bus
pub struct RtkI2cConfig {
    /// Receiver attributes
    #[serde(flatten)]
    pub i2c: I2cConfig,
    /// Caster attributes
    #[serde(flatten)]
    pub ntrip: NtripConfig,
}

impl RtkI2cConfig {
    /// Validate all attributes, transport first
    pub fn validate(&self, path: &str) -> Result<(), ConfigError> {
        self.i2c.validate(path)?;
        self.ntrip.validate(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ntrip() -> NtripConfig {
        NtripConfig {
            url: "http//fakeurl".into(),
            username: "someuser".into(),
            password: "somepass".into(),
            mountpoint: "NYC".into(),
            connect_attempts: 10,
            ..Default::default()
        }
    }

    #[test]
    fn valid_serial_config() {
        let cfg = RtkSerialConfig {
            serial: SerialConfig {
                serial_path: "path".into(),
                serial_baud_rate: 115200,
            },
            ntrip: ntrip(),
        };
        assert_eq!(cfg.validate("path"), Ok(()));
    }

    #[test]
    fn missing_ntrip_url() {
        let cfg = RtkSerialConfig {
            serial: SerialConfig {
                serial_path: "path".into(),
                serial_baud_rate: 115200,
            },
            ntrip: NtripConfig {
                url: String::new(),
                ..ntrip()
            },
        };
        assert_eq!(cfg.serial.validate("path"), Ok(()));
        let err = cfg.validate("path").unwrap_err();
        assert_eq!(err, ConfigError::required("path", "ntrip_url"));
        assert!(err.to_string().contains("ntrip_url"));
    }

    #[test]
    fn missing_serial_path() {
        let cfg = RtkSerialConfig {
            serial: SerialConfig::default(),
            ntrip: ntrip(),
        };
        assert_eq!(cfg.ntrip.validate("path"), Ok(()));
        assert_eq!(
            cfg.validate("path"),
            Err(ConfigError::required("path", "serial_path"))
        );
    }

    #[test]
    fn missing_i2c_fields() {
        let mut cfg = RtkI2cConfig {
            i2c: I2cConfig {
                i2c_bus: "bus1".into(),
                i2c_addr: 44,
                i2c_baud_rate: 0,
            },
            ntrip: ntrip(),
        };
        assert_eq!(cfg.validate("path"), Ok(()));

        cfg.i2c.i2c_addr = 0;
        assert_eq!(
            cfg.validate("path"),
            Err(ConfigError::required("path", "i2c_addr"))
        );

        cfg.i2c.i2c_bus.clear();
        assert_eq!(
            cfg.validate("path"),
            Err(ConfigError::required("path", "i2c_bus"))
        );
    }

    #[test]
    fn defaults_apply() {
        let cfg = NtripConfig::default();
        assert_eq!(cfg.max_attempts(), DEFAULT_CONNECT_ATTEMPTS);
        assert_eq!(cfg.read_timeout(), Duration::from_secs(1));
        assert_eq!(cfg.gga_interval(), Duration::from_secs(10));
        assert_eq!(I2cConfig::default().baud_rate(), 115200);
    }

    #[test]
    fn deserialize_attributes() {
        let cfg: RtkI2cConfig = serde_json::from_str(
            r#"{
                "i2c_bus": "1",
                "i2c_addr": 66,
                "i2c_baud_rate": 115200,
                "ntrip_connect_attempts": 12,
                "ntrip_mountpoint": "MNTPT",
                "ntrip_password": "pass",
                "ntrip_url": "http://ntrip/url",
                "ntrip_username": "usr"
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.i2c.i2c_addr, 66);
        assert_eq!(cfg.ntrip.max_attempts(), 12);
        assert_eq!(cfg.ntrip.mountpoint, "MNTPT");
        assert_eq!(cfg.ntrip.virtual_base, None);
        assert_eq!(cfg.validate("gps"), Ok(()));
    }
}
