//! Server configuration
//!
//! Layered as: built-in defaults, then an optional TOML file, then `TOMO_*`
//! environment variables (`TOMO_PROTOCOL__ENDPOINT=ws://relay:8080`).

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tomo_companion::CompanionConfig;
use tomo_nav::{CrowdConfig, ARRIVAL_SPEED_THRESHOLD};
use tomo_protocol::ProtocolConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Log filter used when `RUST_LOG` is unset
    pub log_level: String,

    /// Emit logs as JSON lines
    pub log_json: bool,

    /// Simulation ticks per second
    pub tick_hz: u32,

    /// How long a one-shot gesture clip plays before it reports completion (ms)
    pub gesture_duration_ms: u64,

    /// Scene file with walkable geometry and furniture
    pub scene_path: Option<PathBuf>,

    pub protocol: ProtocolConfig,
    pub crowd: CrowdConfig,
    pub companions: CompanionConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_json: false,
            tick_hz: 60,
            gesture_duration_ms: 2_000,
            scene_path: None,
            protocol: ProtocolConfig::default(),
            crowd: CrowdConfig::default(),
            companions: CompanionConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from defaults, an optional file and the environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder().add_source(Config::try_from(&ServerConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }

        builder
            .add_source(
                Environment::with_prefix("TOMO")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.tick_hz.max(1)))
    }

    pub fn gesture_duration(&self) -> Duration {
        Duration::from_millis(self.gesture_duration_ms)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        if !(1..=240).contains(&self.tick_hz) {
            return Err("tick_hz must be in 1..=240".to_string());
        }

        self.protocol.validate().map_err(|e| format!("protocol: {}", e))?;
        self.crowd.validate().map_err(|e| format!("crowd: {}", e))?;
        self.companions
            .validate()
            .map_err(|e| format!("companions: {}", e))?;

        if self.companions.agent_radius > self.crowd.max_agent_radius {
            return Err(format!(
                "companions.agent_radius ({}) exceeds crowd.max_agent_radius ({})",
                self.companions.agent_radius, self.crowd.max_agent_radius
            ));
        }

        if self.companions.roster.len() > self.crowd.max_agents {
            return Err(format!(
                "{} companions configured but the crowd holds {}",
                self.companions.roster.len(),
                self.crowd.max_agents
            ));
        }

        // A companion starting from rest must exceed the arrival speed after one tick
        let first_tick_speed = self.crowd.max_acceleration / self.tick_hz as f32;
        if first_tick_speed <= ARRIVAL_SPEED_THRESHOLD {
            return Err(format!(
                "crowd.max_acceleration / tick_hz must exceed {} (got {:.3})",
                ARRIVAL_SPEED_THRESHOLD, first_tick_speed
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_is_valid() {
        let config = ServerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.protocol.endpoint, "ws://localhost:8080");
        assert_eq!(config.crowd.max_agents, 10);
    }

    #[test]
    fn test_slow_acceleration_rejected() {
        let mut config = ServerConfig::default();
        config.tick_hz = 120;
        config.crowd.max_acceleration = 10.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
tick_hz = 30

[protocol]
endpoint = "ws://relay.local:9000"
default_query_timeout_ms = 2500

[companions]
walk_speed = 0.8

[[companions.roster]]
name = "aya"
speaker_id = 3
spawn_offset = [1.0, 0.0, -1.0]
"#
        )
        .unwrap();

        let config = ServerConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.tick_hz, 30);
        assert_eq!(config.protocol.endpoint, "ws://relay.local:9000");
        assert_eq!(config.protocol.default_query_timeout_ms, 2500);
        assert_eq!(config.protocol.speak_timeout_ms, 100_000);
        assert_eq!(config.companions.roster.len(), 1);
        assert_eq!(config.companions.roster[0].speaker_id, 3);
        assert!(config.validate().is_ok());
    }
}
