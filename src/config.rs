// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Configuration module.
//!
//! Handles loading and saving the front end's settings. The link core
//! itself only sees the [`LinkSettings`] derived from them.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

use crate::bluetooth::{ServiceId, RFCOMM_CHANNEL, SPP_UUID};
use crate::link::{LinkSettings, DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_BUFFER_SIZE};

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Bluetooth settings.
    pub bluetooth: BluetoothConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BluetoothConfig {
    /// Alias to give the local adapter. Left unchanged when unset.
    pub device_name: Option<String>,

    /// Service UUID.
    pub service_uuid: Uuid,

    /// RFCOMM channel to listen on and connect to.
    pub channel: u8,

    /// Bound on a single outgoing attempt, in milliseconds.
    pub connect_timeout_ms: u64,

    /// Size of the read buffer in bytes.
    pub read_buffer_size: usize,

    /// Go back to listening when a link accepted in listen mode drops.
    pub relisten_on_disconnect: bool,
}

impl Default for BluetoothConfig {
    fn default() -> Self {
        Self {
            device_name: None,
            service_uuid: SPP_UUID,
            channel: RFCOMM_CHANNEL,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT.as_millis() as u64,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            relisten_on_disconnect: true,
        }
    }
}

impl Config {
    /// Default location: `<config dir>/btlink/config.toml`.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("btlink")
            .join("config.toml")
    }

    /// Load configuration from the default location or create it.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path())
    }

    /// Load configuration from `path`, writing defaults there if missing.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            let config = toml::from_str(&content)
                .with_context(|| format!("parsing {}", path.display()))?;
            Ok(config)
        } else {
            let config = Self::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::default_path())
    }

    /// Save configuration to `path`.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Settings for the link core.
    pub fn link_settings(&self) -> LinkSettings {
        LinkSettings {
            service: ServiceId {
                uuid: self.bluetooth.service_uuid,
                channel: self.bluetooth.channel,
            },
            connect_timeout: Duration::from_millis(self.bluetooth.connect_timeout_ms),
            read_buffer_size: self.bluetooth.read_buffer_size,
        }
    }
}
