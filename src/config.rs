//! Configuration management for Knob GW
//!
//! Handles loading and saving of the YAML configuration file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub midi: MidiConfig,
    #[serde(default)]
    pub knobs: Vec<KnobConfig>,
}

/// Hub server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Shared password checked on /login and /devices
    pub password: String,
    #[serde(default = "default_static_dir")]
    pub static_dir: String,
    #[serde(default = "default_assets_dir")]
    pub assets_dir: String,
}

/// MIDI output configuration for the bridge
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MidiConfig {
    /// Output port name (case-insensitive substring match)
    pub output_port: String,
    /// Initial state of the bridge's passthrough toggle
    #[serde(default = "default_true")]
    pub passthrough: bool,
}

/// One knob in the emitter bank
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct KnobConfig {
    pub cc: u8,
    pub label: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            password: String::new(),
            static_dir: default_static_dir(),
            assets_dir: default_assets_dir(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file
    pub async fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config: AppConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse YAML config: {}", path))?;

        Ok(config)
    }

    /// Save configuration to file
    pub async fn save(&self, path: &str) -> Result<()> {
        let yaml = serde_yaml::to_string(self).context("Failed to serialize config to YAML")?;

        fs::write(path, yaml)
            .await
            .with_context(|| format!("Failed to write config file: {}", path))?;

        Ok(())
    }

    /// Address the hub binds to / the bridge dials
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

// Default value functions
fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    3000
}
fn default_static_dir() -> String {
    "static".to_string()
}
fn default_assets_dir() -> String {
    "assets".to_string()
}
fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
server:
  password: "jam"
midi:
  output_port: "loopMIDI"
knobs:
  - cc: 2
    label: "cutoff"
  - cc: 7
    label: "volume"
"#;

    #[tokio::test]
    async fn test_load_with_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = AppConfig::load(file.path().to_str().unwrap()).await.unwrap();

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.password, "jam");
        assert_eq!(config.server_addr(), "127.0.0.1:3000");
        assert!(config.midi.passthrough);
        assert_eq!(config.knobs.len(), 2);
        assert_eq!(config.knobs[0].cc, 2);
        assert_eq!(config.knobs[1].label, "volume");
    }

    #[tokio::test]
    async fn test_save_round_trip() {
        let config: AppConfig = serde_yaml::from_str(SAMPLE).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        let path = path.to_str().unwrap();

        config.save(path).await.unwrap();
        let reloaded = AppConfig::load(path).await.unwrap();

        assert_eq!(reloaded.server.password, config.server.password);
        assert_eq!(reloaded.midi.output_port, config.midi.output_port);
        assert_eq!(reloaded.knobs.len(), config.knobs.len());
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        assert!(AppConfig::load("no/such/config.yaml").await.is_err());
    }
}
