//! tomo-nav: Crowd navigation for companions
//!
//! Provides:
//! - Walkable surface baking from streamed scene triangles
//! - Corridor pathfinding across the baked surface
//! - Multi-agent crowd simulation with separation and arrival slow-down
//! - Per-agent kinematics for the companion layer to read each tick

pub mod config;
pub mod crowd;
pub mod error;
pub mod geometry;
pub mod path;
pub mod surface;

pub use config::CrowdConfig;
pub use crowd::{
    AgentHandle, CrowdNavigationManager, Kinematics, NavAgent, ARRIVAL_SPEED_THRESHOLD,
};
pub use error::NavError;
pub use geometry::WalkableGeometry;
pub use surface::NavSurface;
