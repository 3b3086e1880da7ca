use std::{path::Path, path::PathBuf, time::Duration};

use anyhow::{Context, Error};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_FILE: &str = "led-remote.ron";

/// Address tried when nothing has been saved yet
pub const DEFAULT_ADDRESS: &str = "192.168.1.100";

/// Where released firmware is described. Point this at your own release
/// server.
pub const DEFAULT_FIRMWARE_URL: &str =
    "https://raw.githubusercontent.com/user/repo/main/firmware/version.json";

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub default_address: String,
    pub firmware_url: String,
    /// File the last connected address is kept in
    pub state_file: PathBuf,
    /// Quiet period before a changed colour is sent
    pub debounce_ms: u64,
    /// How long to wait after an update was sent before dropping the
    /// connection
    pub update_reboot_grace_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_address: DEFAULT_ADDRESS.to_string(),
            firmware_url: DEFAULT_FIRMWARE_URL.to_string(),
            state_file: PathBuf::from("led-remote-state.ron"),
            debounce_ms: 200,
            update_reboot_grace_ms: 2000,
        }
    }
}

impl Config {
    /// Read the config at `path`. A missing file gives the defaults.
    /// `LED_REMOTE_FIRMWARE_URL` and `LED_REMOTE_ADDRESS` override the file.
    pub fn load(path: impl AsRef<Path>) -> Result<Config, Error> {
        let path = path.as_ref();

        let mut config = if path.exists() {
            let config = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            Self::parse(&config).with_context(|| format!("parsing {}", path.display()))?
        } else {
            Config::default()
        };

        if let Ok(url) = std::env::var("LED_REMOTE_FIRMWARE_URL") {
            config.firmware_url = url;
        }
        if let Ok(address) = std::env::var("LED_REMOTE_ADDRESS") {
            config.default_address = address;
        }

        Ok(config)
    }

    pub fn parse(config: &str) -> Result<Config, Error> {
        let config: Config = ron::from_str(config)?;
        Ok(config)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn update_reboot_grace(&self) -> Duration {
        Duration::from_millis(self.update_reboot_grace_ms)
    }
}
