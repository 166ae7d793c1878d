//! tomo-core: shared vocabulary for the companion coordination workspace
//!
//! Provides:
//! - The error taxonomy every layer reports through
//! - Companion identifiers
//! - Vector and rotation helpers built on glam

pub mod error;
pub mod ids;
pub mod math;

pub use error::{Error, Result};
pub use ids::CompanionId;
pub use glam::{Quat, Vec3};
