//! Action dispatch onto companions

use crate::message::{ActionCommand, ActionMessage};
use tomo_companion::CompanionRoster;
use tomo_core::{Error, Result};
use tomo_nav::CrowdNavigationManager;
use tracing::{error, warn};

/// Validates actions and applies them to the addressed companion
#[derive(Debug, Clone, Copy, Default)]
pub struct ActionDispatcher;

impl ActionDispatcher {
    pub fn new() -> Self {
        Self
    }

    /// Apply one action. Failures are logged and leave every companion untouched.
    pub fn dispatch(
        &self,
        action: &ActionMessage,
        roster: &mut CompanionRoster,
        crowd: &mut CrowdNavigationManager,
    ) -> Result<()> {
        let command = ActionCommand::parse(action).map_err(|e| {
            error!("Rejected '{}' action from {}: {}", action.name, action.from, e);
            e
        })?;

        let companion = roster.resolve(&action.from).map_err(|e| {
            warn!("Rejected '{}' action: {}", action.name, e);
            Error::from(e)
        })?;

        let outcome = match command {
            ActionCommand::Walk { target } => companion.walk_to(crowd, target),
            ActionCommand::Run { target } => companion.run_to(crowd, target),
            ActionCommand::Gesture { name } => companion.play_gesture(crowd, &name),
        };
        outcome.map_err(Error::from)
    }
}
