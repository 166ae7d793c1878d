//! tomo-companion: Companion behaviour on top of the crowd
//!
//! Provides:
//! - The Idle/Walk/Run/Gesture state machine, one per companion
//! - A cancelable completion signal for one-shot animations
//! - The roster of spawned companions keyed by id

pub mod animation;
pub mod config;
pub mod error;
pub mod roster;
pub mod state;

pub use animation::{
    completion_channel, AnimationCompletion, AnimationPlayer, CompletionStatus, CompletionTrigger,
};
pub use config::{CompanionConfig, CompanionProfile};
pub use error::CompanionError;
pub use roster::CompanionRoster;
pub use state::{Companion, CompanionStateMachine, LocomotionState, ROTATION_SMOOTHING};
