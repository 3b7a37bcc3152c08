use std::path::{Path, PathBuf};

use argh::FromArgs;
use directories::ProjectDirs;
use rtk_gps::{ConfigError, NtripConfig, SerialConfig};
use serde::{Deserialize, Serialize};

#[derive(FromArgs, Debug, Default)]
/// Relay NTRIP corrections into a serial GNSS receiver
pub struct RelayArgs {
    /// JSON5 configuration file, the stored default is used otherwise
    #[argh(option)]
    pub config: Option<PathBuf>,
    /// serial device
    #[argh(option)]
    pub serial_path: Option<String>,
    /// baud rate
    #[argh(option)]
    pub baud_rate: Option<u32>,
    /// caster address, e.g. http://caster.example:2101
    #[argh(option)]
    pub ntrip_url: Option<String>,
    /// mountpoint
    #[argh(option)]
    pub mountpoint: Option<String>,
    /// caster username
    #[argh(option)]
    pub username: Option<String>,
    /// caster password
    #[argh(option)]
    pub password: Option<String>,
    /// store the resulting configuration as the default
    #[argh(switch)]
    pub save: bool,
}

#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, Eq)]
/// Configuration for the relay
pub struct RelayCfg {
    /// Receiver port
    #[serde(flatten)]
    pub serial: SerialConfig,
    /// Caster
    #[serde(flatten)]
    pub ntrip: NtripConfig,
}

impl RelayCfg {
    /// Load a JSON5 configuration file
    pub fn load(path: &Path) -> Result<Self, std::io::Error> {
        let data = std::fs::read_to_string(path)?;
        json5::from_str(&data).map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
    }

    /// Override stored values with the ones given on the command line
    pub fn apply(&mut self, args: &RelayArgs) {
        if let Some(path) = &args.serial_path {
            self.serial.serial_path = path.clone();
        }
        if let Some(baud) = args.baud_rate {
            self.serial.serial_baud_rate = baud;
        }
        if let Some(url) = &args.ntrip_url {
            self.ntrip.url = url.clone();
        }
        if let Some(mountpoint) = &args.mountpoint {
            self.ntrip.mountpoint = mountpoint.clone();
        }
        if let Some(username) = &args.username {
            self.ntrip.username = username.clone();
        }
        if let Some(password) = &args.password {
            self.ntrip.password = password.clone();
        }
    }

    /// Check required attributes
    pub fn validate(&self, path: &str) -> Result<(), ConfigError> {
        self.serial.validate(path)?;
        self.ntrip.validate(path)
    }

    /// Store the configuration in `dir`
    pub fn store(&self, dir: &Path) -> Result<PathBuf, std::io::Error> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join("config.json");
        std::fs::write(
            &path,
            serde_json::to_string_pretty(self)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?,
        )?;
        Ok(path)
    }

    /// Store the configuration in the default location
    pub fn store_default(&self) -> Result<PathBuf, std::io::Error> {
        self.store(&get_default_path())
    }

    /// Load the configuration from the default location
    pub fn load_default() -> Result<Self, std::io::Error> {
        Self::load(&get_default_path().join("config.json"))
    }
}

fn get_default_path() -> PathBuf {
    if let Some(path) = ProjectDirs::from("", "", "rtk_relay") {
        path.config_dir().to_path_buf()
    } else {
        PathBuf::from(".")
    }
}
