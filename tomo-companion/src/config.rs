//! Configuration for companions

use serde::{Deserialize, Serialize};

/// Companion behaviour configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompanionConfig {
    /// Walking speed (units/s)
    pub walk_speed: f32,

    /// Running speed as a multiple of the walking speed
    pub run_multiplier: f32,

    /// Collision radius of each companion's navigation agent
    pub agent_radius: f32,

    /// Animation clips every companion model provides
    pub animations: Vec<String>,

    /// Companions to spawn once the walkable surface is ready
    pub roster: Vec<CompanionProfile>,
}

/// One configured companion
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompanionProfile {
    /// Display name; the wire id is `companion_<name>`
    pub name: String,

    /// Voice used by the speech collaborator
    #[serde(default)]
    pub speaker_id: u32,

    /// Spawn position relative to the scene origin
    #[serde(default)]
    pub spawn_offset: [f32; 3],
}

impl Default for CompanionConfig {
    fn default() -> Self {
        Self {
            walk_speed: 1.0,
            run_multiplier: 2.5,
            agent_radius: 0.1,
            animations: ["idle", "walk", "run", "wave", "nod", "dance", "jump", "look", "stretch"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            roster: vec![CompanionProfile {
                name: "natsumi".to_string(),
                speaker_id: 0,
                spawn_offset: [0.0, 0.0, -1.0],
            }],
        }
    }
}

impl CompanionConfig {
    pub fn run_speed(&self) -> f32 {
        self.walk_speed * self.run_multiplier
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        if !(self.walk_speed.is_finite() && self.walk_speed > 0.0) {
            return Err("walk_speed must be a positive number".to_string());
        }

        if !(self.run_multiplier.is_finite() && self.run_multiplier >= 1.0) {
            return Err("run_multiplier must be >= 1.0".to_string());
        }

        if !(self.agent_radius.is_finite() && self.agent_radius > 0.0) {
            return Err("agent_radius must be a positive number".to_string());
        }

        for clip in ["idle", "walk", "run"] {
            if !self.animations.iter().any(|a| a == clip) {
                return Err(format!("animations must include '{}'", clip));
            }
        }

        let mut names: Vec<&str> = self.roster.iter().map(|p| p.name.as_str()).collect();
        names.sort_unstable();
        if names.windows(2).any(|w| w[0] == w[1]) {
            return Err("roster names must be unique".to_string());
        }
        if names.iter().any(|n| n.is_empty()) {
            return Err("roster names must not be empty".to_string());
        }

        Ok(())
    }
}
