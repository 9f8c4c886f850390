//! Plugin configuration

use crate::{types::TextureId, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Plugin configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PluginConfig {
    /// Name of the method channel the plugin answers on
    pub method_channel: String,
    /// Event channel for a player is this prefix followed by its texture id
    pub event_channel_prefix: String,
    /// Scheme prepended to resolved asset lookup keys
    pub asset_scheme: String,
    /// Period of buffering updates for ready players while serving (0 = off)
    pub buffering_update_interval_ms: u64,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            method_channel: "flutter.io/videoPlayer".to_string(),
            event_channel_prefix: "flutter.io/videoPlayer/videoEvents".to_string(),
            asset_scheme: "asset:///".to_string(),
            buffering_update_interval_ms: 500,
        }
    }
}

impl PluginConfig {
    /// Load from a JSON file; missing keys take their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Event channel name for a player
    pub fn event_channel(&self, texture_id: TextureId) -> String {
        format!("{}{}", self.event_channel_prefix, texture_id)
    }

    pub fn buffering_update_interval(&self) -> Option<Duration> {
        match self.buffering_update_interval_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }
}
