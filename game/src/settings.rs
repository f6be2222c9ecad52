use std::time::Duration;

use log::info;
use serde::{Deserialize, Serialize};

use crate::storage::{CONFIG_KEY, KeyValueStore, StorageError, load_json, save_json};

pub const MIN_INACTIVITY_SECS: u32 = 1;
pub const MAX_INACTIVITY_SECS: u32 = 60;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Default,
    Dark,
    Light,
    Neon,
}

/// Player-facing options, stored under the `config` key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct GameConfig {
    pub theme: Theme,
    /// Seconds the player may idle while a sequence is expected.
    pub inactivity_time: u32,
    /// Percent, 0..=100.
    pub volume: u8,
    pub sound_enabled: bool,
    #[serde(alias = "udpHost")]
    pub sink_host: String,
    #[serde(alias = "udpPort")]
    pub sink_port: u16,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            theme: Theme::Default,
            inactivity_time: 5,
            volume: 30,
            sound_enabled: true,
            sink_host: "127.0.0.1".to_string(),
            sink_port: 3000,
        }
    }
}

impl GameConfig {
    pub fn sanitized(mut self) -> Self {
        self.inactivity_time = self
            .inactivity_time
            .clamp(MIN_INACTIVITY_SECS, MAX_INACTIVITY_SECS);
        self.volume = self.volume.min(100);
        if self.sink_host.trim().is_empty() {
            self.sink_host = GameConfig::default().sink_host;
        }
        self
    }

    pub fn inactivity(&self) -> Duration {
        Duration::from_secs(u64::from(self.inactivity_time))
    }

    pub fn volume_gain(&self) -> f32 {
        if self.sound_enabled {
            f32::from(self.volume.min(100)) / 100.0
        } else {
            0.0
        }
    }
}

/// Loads and saves [`GameConfig`] through a [`KeyValueStore`].
#[derive(Debug, Clone)]
pub struct SettingsStore<S> {
    store: S,
}

impl<S: KeyValueStore> SettingsStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn load(&self) -> GameConfig {
        load_json::<GameConfig, _>(&self.store, CONFIG_KEY)
            .map(GameConfig::sanitized)
            .unwrap_or_default()
    }

    pub fn save(&self, config: &GameConfig) -> Result<(), StorageError> {
        save_json(&self.store, CONFIG_KEY, config)?;
        info!("settings saved");
        Ok(())
    }

    pub fn reset(&self) -> Result<GameConfig, StorageError> {
        let config = GameConfig::default();
        self.save(&config)?;
        Ok(config)
    }
}
