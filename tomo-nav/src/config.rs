//! Configuration for the crowd simulation

use serde::{Deserialize, Serialize};

/// Crowd simulation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrowdConfig {
    /// Maximum number of simultaneous agents
    pub max_agents: usize,

    /// Upper bound for any agent's collision radius
    pub max_agent_radius: f32,

    /// Steepest slope (degrees) still considered walkable
    pub walkable_slope_degrees: f32,

    /// Vertices closer than this are welded together when baking
    pub weld_tolerance: f32,

    /// Acceleration limit applied to every agent (units/s^2)
    pub max_acceleration: f32,

    /// Strength of the push away from neighbouring agents
    pub separation_weight: f32,
}

impl Default for CrowdConfig {
    fn default() -> Self {
        Self {
            max_agents: 10,
            max_agent_radius: 0.3,
            walkable_slope_degrees: 45.0,
            weld_tolerance: 0.001,
            max_acceleration: 8.0,
            separation_weight: 2.0,
        }
    }
}

impl CrowdConfig {
    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        if self.max_agents == 0 {
            return Err("max_agents must be > 0".to_string());
        }

        if !(self.max_agent_radius.is_finite() && self.max_agent_radius > 0.0) {
            return Err("max_agent_radius must be a positive number".to_string());
        }

        if !(0.0..90.0).contains(&self.walkable_slope_degrees) {
            return Err("walkable_slope_degrees must be in [0, 90)".to_string());
        }

        if !(self.weld_tolerance.is_finite() && self.weld_tolerance > 0.0) {
            return Err("weld_tolerance must be a positive number".to_string());
        }

        if !(self.max_acceleration.is_finite() && self.max_acceleration > 0.0) {
            return Err("max_acceleration must be a positive number".to_string());
        }

        if !(self.separation_weight.is_finite() && self.separation_weight >= 0.0) {
            return Err("separation_weight must be non-negative".to_string());
        }

        Ok(())
    }
}
