//! Animation collaborator seam
//!
//! Clip playback itself happens elsewhere; the state machine only asks for a
//! clip to start and, for one-shot clips, gets a completion signal back.
//! Dropping an [`AnimationCompletion`] cancels it, so a superseded gesture
//! can never report completion into a later state.

use tokio::sync::oneshot;

/// Plays animation clips on a companion's model
pub trait AnimationPlayer: Send {
    /// Whether the model has a clip with this name
    fn has_animation(&self, name: &str) -> bool;

    /// Start a clip. One-shot clips return a completion signal.
    fn play(&mut self, name: &str, looping: bool) -> Option<AnimationCompletion>;

    /// Apply a facial expression
    fn set_expression(&mut self, _name: &str) {}
}

/// Create a linked trigger and completion pair
pub fn completion_channel() -> (CompletionTrigger, AnimationCompletion) {
    let (tx, rx) = oneshot::channel();
    (CompletionTrigger { tx }, AnimationCompletion { rx })
}

/// Held by the player; fired once when the clip finishes
#[derive(Debug)]
pub struct CompletionTrigger {
    tx: oneshot::Sender<()>,
}

impl CompletionTrigger {
    /// Signal completion. Returns false if the listener was cancelled.
    pub fn fire(self) -> bool {
        self.tx.send(()).is_ok()
    }

    /// Whether the listener has been cancelled
    pub fn is_cancelled(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Outcome of polling a completion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionStatus {
    Pending,
    Finished,
    /// The player dropped its trigger without firing
    Abandoned,
}

/// Held by the state machine; dropped to cancel
#[derive(Debug)]
pub struct AnimationCompletion {
    rx: oneshot::Receiver<()>,
}

impl AnimationCompletion {
    pub fn poll_status(&mut self) -> CompletionStatus {
        match self.rx.try_recv() {
            Ok(()) => CompletionStatus::Finished,
            Err(oneshot::error::TryRecvError::Empty) => CompletionStatus::Pending,
            Err(oneshot::error::TryRecvError::Closed) => CompletionStatus::Abandoned,
        }
    }

    /// Wait until the clip finishes. Returns false if the trigger was dropped unfired.
    pub async fn finished(self) -> bool {
        self.rx.await.is_ok()
    }
}
