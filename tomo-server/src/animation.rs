//! Animation player for headless runs
//!
//! Clips are logged rather than rendered; one-shot clips report completion
//! after a fixed duration.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tomo_companion::{completion_channel, AnimationCompletion, AnimationPlayer};
use tomo_core::CompanionId;
use tracing::{debug, info};

pub struct LoggingAnimationPlayer {
    companion: CompanionId,
    clips: Arc<HashSet<String>>,
    one_shot_duration: Duration,
}

impl LoggingAnimationPlayer {
    pub fn new(companion: CompanionId, clips: Arc<HashSet<String>>, one_shot_duration: Duration) -> Self {
        Self {
            companion,
            clips,
            one_shot_duration,
        }
    }
}

impl AnimationPlayer for LoggingAnimationPlayer {
    fn has_animation(&self, name: &str) -> bool {
        self.clips.contains(name)
    }

    fn play(&mut self, name: &str, looping: bool) -> Option<AnimationCompletion> {
        info!(
            "{} plays '{}'{}",
            self.companion,
            name,
            if looping { " (loop)" } else { "" }
        );
        if looping {
            return None;
        }

        let (trigger, completion) = completion_channel();
        let duration = self.one_shot_duration;
        let companion = self.companion.clone();
        let clip = name.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            if !trigger.fire() {
                debug!("'{}' on {} was superseded before it finished", clip, companion);
            }
        });
        Some(completion)
    }

    fn set_expression(&mut self, name: &str) {
        info!("{} expression -> {}", self.companion, name);
    }
}
