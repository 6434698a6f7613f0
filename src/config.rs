use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_BEATS_PER_LOOP, DEFAULT_BPM, DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_OUTBOUND_QUEUE_DEPTH,
    DEFAULT_RELAY_BIND, DEFAULT_RELAY_PORT, DEFAULT_RELAY_URL, DEFAULT_RULER_WIDTH_PX,
};
use crate::error::LoopError;
use crate::model::OverlengthPolicy;
use crate::paths::config_path;
use crate::time_utils::LoopTiming;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub relay: RelayConfig,
    pub client: ClientConfig,
    pub loop_settings: LoopSettings,
    pub audio: AudioConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub bind_address: String,
    pub port: u16,
    /// Messages a slow peer may have queued before new ones are dropped for it.
    pub outbound_queue_depth: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub relay_url: String,
    pub connect_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopSettings {
    pub bpm: f32,
    pub beats_per_loop: u32,
    pub ruler_width_px: f32,
    pub overlength: OverlengthPolicy,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub preferred_output_device: Option<String>,
    pub preferred_input_device: Option<String>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_RELAY_BIND.to_string(),
            port: DEFAULT_RELAY_PORT,
            outbound_queue_depth: DEFAULT_OUTBOUND_QUEUE_DEPTH,
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            relay_url: DEFAULT_RELAY_URL.to_string(),
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
        }
    }
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            bpm: DEFAULT_BPM,
            beats_per_loop: DEFAULT_BEATS_PER_LOOP,
            ruler_width_px: DEFAULT_RULER_WIDTH_PX,
            overlength: OverlengthPolicy::default(),
        }
    }
}

impl LoopSettings {
    pub fn timing(&self) -> LoopTiming {
        LoopTiming::new(self.bpm, self.beats_per_loop, self.ruler_width_px)
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        match config_path() {
            Some(config_path) => Self::load_from(&config_path),
            None => Ok(Self::default()),
        }
    }

    /// Read `path`, or defaults when it does not exist yet.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    pub fn save(&self) -> Result<()> {
        if let Some(config_path) = config_path() {
            self.save_to(&config_path)?;
        }
        Ok(())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Write the defaults out on first run so there is a file to edit.
    pub fn ensure_saved(&self) -> Result<()> {
        match config_path() {
            Some(config_path) if !config_path.exists() => self.save(),
            _ => Ok(()),
        }
    }

    pub fn validate(&self) -> crate::error::Result<()> {
        let loop_settings = &self.loop_settings;
        if !(loop_settings.bpm.is_finite() && loop_settings.bpm > 0.0) {
            return Err(LoopError::Config(format!(
                "tempo must be positive, got {}",
                loop_settings.bpm
            )));
        }
        if loop_settings.beats_per_loop == 0 {
            return Err(LoopError::Config("a loop needs at least one beat".into()));
        }
        if !(loop_settings.ruler_width_px.is_finite() && loop_settings.ruler_width_px > 0.0) {
            return Err(LoopError::Config(format!(
                "ruler width must be positive, got {}",
                loop_settings.ruler_width_px
            )));
        }
        if self.relay.outbound_queue_depth == 0 {
            return Err(LoopError::Config(
                "relay outbound queue depth must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_describe_the_reference_loop() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        let timing = config.loop_settings.timing();
        assert!((timing.loop_duration_seconds() - 9.6).abs() < 1e-9);
        assert_eq!(config.relay.port, 8080);
        assert_eq!(config.client.relay_url, "ws://127.0.0.1:8080");
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: Config =
            serde_json::from_str(r#"{ "loop_settings": { "bpm": 120.0 } }"#).unwrap();
        assert_eq!(config.loop_settings.bpm, 120.0);
        assert_eq!(config.loop_settings.beats_per_loop, DEFAULT_BEATS_PER_LOOP);
        assert_eq!(config.relay.outbound_queue_depth, DEFAULT_OUTBOUND_QUEUE_DEPTH);
    }

    #[test]
    fn rejects_degenerate_loops() {
        let mut config = Config::default();
        config.loop_settings.beats_per_loop = 0;
        assert!(matches!(config.validate(), Err(LoopError::Config(_))));

        let mut config = Config::default();
        config.loop_settings.bpm = 0.0;
        assert!(matches!(config.validate(), Err(LoopError::Config(_))));

        let mut config = Config::default();
        config.relay.outbound_queue_depth = 0;
        assert!(matches!(config.validate(), Err(LoopError::Config(_))));
    }

    #[test]
    fn saved_config_loads_back() {
        let dir = std::env::temp_dir().join(format!("loopjam-config-{}", std::process::id()));
        let path = dir.join("nested").join("config.json");

        let mut config = Config::default();
        config.loop_settings.bpm = 90.0;
        config.loop_settings.overlength = OverlengthPolicy::AllowDrift;
        config.client.relay_url = "ws://jam.local:9000".into();
        config.audio.preferred_input_device = Some("USB Mic".into());
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.loop_settings.bpm, 90.0);
        assert_eq!(loaded.loop_settings.overlength, OverlengthPolicy::AllowDrift);
        assert_eq!(loaded.client.relay_url, "ws://jam.local:9000");
        assert_eq!(loaded.audio.preferred_input_device.as_deref(), Some("USB Mic"));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_file_loads_defaults() {
        let path = std::env::temp_dir().join("loopjam-config-missing/config.json");
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.relay.port, DEFAULT_RELAY_PORT);
    }
}
