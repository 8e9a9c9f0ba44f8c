use crate::persistence::write_private;

use anyhow::Result;
use mediaconnect_core::client::ClientConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Current settings schema version
pub const SETTINGS_VERSION: u32 = 1;

/// Persisted application settings (settings.json).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub version: u32,
    /// Client identity and connection tunables
    pub client: ClientConfig,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            version: SETTINGS_VERSION,
            client: ClientConfig::default(),
        }
    }
}

pub fn get_settings_path(config_dir: &Path) -> PathBuf {
    config_dir.join("settings.json")
}

/// Load settings, falling back to defaults when the file is missing or broken.
pub fn load_settings(config_dir: &Path) -> AppSettings {
    let path = get_settings_path(config_dir);

    if !path.exists() {
        log::info!("Settings file not found at {}, using defaults", path.display());
        return AppSettings::default();
    }

    let content = match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) => {
            log::error!("Failed to read settings file {}: {}", path.display(), e);
            return AppSettings::default();
        }
    };

    match serde_json::from_str::<AppSettings>(&content) {
        Ok(settings) => settings,
        Err(e) => {
            log::warn!("Failed to parse settings file {}: {}, using defaults", path.display(), e);
            AppSettings::default()
        }
    }
}

pub fn save_settings(config_dir: &Path, settings: &AppSettings) -> Result<()> {
    let content = serde_json::to_string_pretty(settings)?;
    write_private(&get_settings_path(config_dir), &content)
}

/// Load settings and give this install a device id on first run.
pub fn load_or_init_settings(config_dir: &Path) -> AppSettings {
    let mut settings = load_settings(config_dir);
    if !settings.client.device_id.is_empty() {
        return settings;
    }

    settings.client.device_id = uuid::Uuid::new_v4().to_string();
    if let Some(name) = host_name() {
        settings.client.device_name = name;
    }
    log::info!("Generated device id {}", settings.client.device_id);
    if let Err(e) = save_settings(config_dir, &settings) {
        log::warn!("Failed to save settings: {}", e);
    }
    settings
}

fn host_name() -> Option<String> {
    ["HOSTNAME", "COMPUTERNAME"]
        .iter()
        .find_map(|var| std::env::var(var).ok())
        .filter(|name| !name.is_empty())
}
