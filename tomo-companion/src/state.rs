//! Per-companion locomotion and gesture state machine

use crate::animation::{AnimationCompletion, AnimationPlayer, CompletionStatus};
use crate::error::CompanionError;
use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use std::fmt;
use tomo_core::math::look_rotation;
use tomo_core::CompanionId;
use tomo_nav::{AgentHandle, CrowdNavigationManager};
use tracing::{debug, info, warn};

/// Fraction of the remaining turn applied each tick while moving
pub const ROTATION_SMOOTHING: f32 = 0.1;

const IDLE_CLIP: &str = "idle";
const WALK_CLIP: &str = "walk";
const RUN_CLIP: &str = "run";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocomotionState {
    Idle,
    Walk,
    Run,
    Gesture,
}

impl LocomotionState {
    pub fn is_moving(self) -> bool {
        matches!(self, LocomotionState::Walk | LocomotionState::Run)
    }
}

impl fmt::Display for LocomotionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LocomotionState::Idle => "idle",
            LocomotionState::Walk => "walk",
            LocomotionState::Run => "run",
            LocomotionState::Gesture => "gesture",
        };
        f.write_str(name)
    }
}

/// Companion record. Only the state machine mutates it.
#[derive(Debug, Clone, PartialEq)]
pub struct Companion {
    pub id: CompanionId,
    pub state: LocomotionState,
    pub has_target: bool,
    /// Active gesture; empty unless gesturing
    pub gesture: String,
    pub agent: Option<AgentHandle>,
    pub position: Vec3,
    pub orientation: Quat,
    pub target: Option<Vec3>,
    pub expression: Option<String>,
}

impl Companion {
    fn new(id: CompanionId, position: Vec3) -> Self {
        Self {
            id,
            state: LocomotionState::Idle,
            has_target: false,
            gesture: String::new(),
            agent: None,
            position,
            orientation: Quat::IDENTITY,
            target: None,
            expression: None,
        }
    }
}

/// Drives one companion's state from commands and crowd kinematics
pub struct CompanionStateMachine {
    companion: Companion,
    player: Box<dyn AnimationPlayer>,
    pending_gesture: Option<AnimationCompletion>,
    walk_speed: f32,
    run_speed: f32,
}

impl fmt::Debug for CompanionStateMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompanionStateMachine")
            .field("companion", &self.companion)
            .field("gesture_pending", &self.pending_gesture.is_some())
            .finish()
    }
}

impl CompanionStateMachine {
    /// Create an idle companion and start its idle animation
    pub fn new(
        id: CompanionId,
        position: Vec3,
        mut player: Box<dyn AnimationPlayer>,
        walk_speed: f32,
        run_speed: f32,
    ) -> Self {
        player.play(IDLE_CLIP, true);
        Self {
            companion: Companion::new(id, position),
            player,
            pending_gesture: None,
            walk_speed,
            run_speed,
        }
    }

    pub fn companion(&self) -> &Companion {
        &self.companion
    }

    pub fn id(&self) -> &CompanionId {
        &self.companion.id
    }

    pub fn state(&self) -> LocomotionState {
        self.companion.state
    }

    pub fn attach_agent(&mut self, agent: AgentHandle) {
        self.companion.agent = Some(agent);
    }

    /// Forget the agent, e.g. after the surface was re-baked
    pub fn detach_agent(&mut self) -> Option<AgentHandle> {
        self.companion.agent.take()
    }

    pub fn walk_to(
        &mut self,
        crowd: &mut CrowdNavigationManager,
        target: Vec3,
    ) -> Result<(), CompanionError> {
        self.move_to(crowd, target, LocomotionState::Walk)
    }

    pub fn run_to(
        &mut self,
        crowd: &mut CrowdNavigationManager,
        target: Vec3,
    ) -> Result<(), CompanionError> {
        self.move_to(crowd, target, LocomotionState::Run)
    }

    fn move_to(
        &mut self,
        crowd: &mut CrowdNavigationManager,
        target: Vec3,
        state: LocomotionState,
    ) -> Result<(), CompanionError> {
        let (speed, clip) = match state {
            LocomotionState::Run => (self.run_speed, RUN_CLIP),
            _ => (self.walk_speed, WALK_CLIP),
        };

        let agent = match self.companion.agent {
            Some(agent) if crowd.agent(agent).is_some() => agent,
            _ => {
                warn!("{} ignored for {}: no navigation agent", state, self.companion.id);
                return Err(CompanionError::NoAgent(self.companion.id.clone()));
            }
        };

        crowd.set_speed(agent, speed);
        crowd.set_target(agent, target);

        self.pending_gesture = None;
        self.companion.gesture.clear();
        self.companion.state = state;
        self.companion.has_target = true;
        self.companion.target = Some(target);
        self.player.play(clip, true);

        info!(
            "{} -> {} towards ({:.2}, {:.2}, {:.2})",
            self.companion.id, state, target.x, target.y, target.z
        );
        Ok(())
    }

    /// Play a one-shot gesture, superseding any gesture still in flight
    pub fn play_gesture(
        &mut self,
        crowd: &mut CrowdNavigationManager,
        name: &str,
    ) -> Result<(), CompanionError> {
        if !self.player.has_animation(name) {
            warn!("Unknown gesture '{}' for {}", name, self.companion.id);
            return Err(CompanionError::UnknownGesture(name.to_string()));
        }

        // Cancel the previous completion before the new clip can fire
        self.pending_gesture = None;

        if self.companion.has_target {
            if let Some(agent) = self.companion.agent {
                crowd.clear_target(agent);
            }
        }

        self.companion.state = LocomotionState::Gesture;
        self.companion.has_target = false;
        self.companion.target = None;
        self.companion.gesture = name.to_string();
        self.pending_gesture = self.player.play(name, false);

        if self.pending_gesture.is_none() {
            debug!("Gesture '{}' on {} has no completion signal", name, self.companion.id);
        }
        info!("{} -> gesture '{}'", self.companion.id, name);
        Ok(())
    }

    /// Abandon a walk or run in place, e.g. when no agent can carry it
    pub fn stop(&mut self) {
        if self.companion.state.is_moving() {
            info!("{} stopped without arriving", self.companion.id);
            self.enter_idle();
        }
    }

    pub fn set_expression(&mut self, name: &str) {
        self.player.set_expression(name);
        self.companion.expression = Some(name.to_string());
    }

    /// Advance after the crowd tick: gesture completion, arrival, facing
    pub fn update(&mut self, crowd: &mut CrowdNavigationManager) {
        match self.companion.state {
            LocomotionState::Gesture => self.poll_gesture(),
            LocomotionState::Walk | LocomotionState::Run => self.follow_agent(crowd),
            LocomotionState::Idle => {
                if let Some(kinematics) = self.companion.agent.and_then(|a| crowd.kinematics(a)) {
                    self.companion.position = kinematics.position;
                }
            }
        }
    }

    fn poll_gesture(&mut self) {
        let Some(completion) = self.pending_gesture.as_mut() else {
            return;
        };
        match completion.poll_status() {
            CompletionStatus::Pending => {}
            CompletionStatus::Finished => {
                self.pending_gesture = None;
                debug!("{} finished gesture '{}'", self.companion.id, self.companion.gesture);
                self.enter_idle();
            }
            CompletionStatus::Abandoned => {
                self.pending_gesture = None;
                warn!(
                    "Gesture '{}' on {} was dropped without completing",
                    self.companion.gesture, self.companion.id
                );
            }
        }
    }

    fn follow_agent(&mut self, crowd: &mut CrowdNavigationManager) {
        let Some(agent) = self.companion.agent else {
            return;
        };
        let Some(kinematics) = crowd.kinematics(agent) else {
            debug!("{} lost its agent while moving", self.companion.id);
            return;
        };

        self.companion.position = kinematics.position;

        if self.companion.has_target && kinematics.has_arrived() {
            crowd.clear_target(agent);
            info!("{} arrived", self.companion.id);
            self.enter_idle();
            return;
        }

        if let Some(facing) = look_rotation(kinematics.velocity) {
            self.companion.orientation = self
                .companion
                .orientation
                .slerp(facing, ROTATION_SMOOTHING)
                .normalize();
        }
    }

    fn enter_idle(&mut self) {
        self.companion.state = LocomotionState::Idle;
        self.companion.has_target = false;
        self.companion.target = None;
        self.companion.gesture.clear();
        self.player.play(IDLE_CLIP, true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::{completion_channel, CompletionTrigger};
    use std::sync::{Arc, Mutex};
    use tomo_nav::{CrowdConfig, WalkableGeometry};

    #[derive(Default)]
    struct Recorded {
        plays: Vec<(String, bool)>,
        triggers: Vec<CompletionTrigger>,
    }

    #[derive(Clone, Default)]
    struct RecordingPlayer(Arc<Mutex<Recorded>>);

    impl AnimationPlayer for RecordingPlayer {
        fn has_animation(&self, name: &str) -> bool {
            ["idle", "walk", "run", "wave", "nod"].contains(&name)
        }

        fn play(&mut self, name: &str, looping: bool) -> Option<AnimationCompletion> {
            let mut rec = self.0.lock().unwrap();
            rec.plays.push((name.to_string(), looping));
            if looping {
                return None;
            }
            let (trigger, completion) = completion_channel();
            rec.triggers.push(trigger);
            Some(completion)
        }
    }

    fn setup() -> (CrowdNavigationManager, CompanionStateMachine, RecordingPlayer) {
        let mut crowd = CrowdNavigationManager::new(CrowdConfig::default());
        crowd
            .bake(&WalkableGeometry::rectangle(
                Vec3::new(-5.0, 0.0, -5.0),
                Vec3::new(5.0, 0.0, 5.0),
            ))
            .unwrap();
        let player = RecordingPlayer::default();
        let mut machine = CompanionStateMachine::new(
            CompanionId::from_name("natsumi"),
            Vec3::ZERO,
            Box::new(player.clone()),
            1.0,
            2.5,
        );
        let agent = crowd.add_agent(Vec3::ZERO, 0.1, 1.0).unwrap();
        machine.attach_agent(agent);
        player.0.lock().unwrap().plays.clear();
        (crowd, machine, player)
    }

    #[test]
    fn test_walk_sets_state_and_plays_once() {
        let (mut crowd, mut machine, player) = setup();
        machine.walk_to(&mut crowd, Vec3::new(2.0, 0.0, 0.0)).unwrap();

        assert_eq!(machine.state(), LocomotionState::Walk);
        assert!(machine.companion().has_target);
        assert_eq!(player.0.lock().unwrap().plays, vec![("walk".to_string(), true)]);
    }

    #[test]
    fn test_run_uses_run_speed() {
        let (mut crowd, mut machine, _player) = setup();
        machine.run_to(&mut crowd, Vec3::new(2.0, 0.0, 0.0)).unwrap();
        let agent = machine.companion().agent.unwrap();
        assert_eq!(crowd.agent(agent).unwrap().max_speed(), 2.5);
        assert_eq!(machine.state(), LocomotionState::Run);
    }

    #[test]
    fn test_walk_without_agent_is_noop() {
        let (mut crowd, mut machine, player) = setup();
        machine.detach_agent();
        let before = machine.companion().clone();

        let result = machine.walk_to(&mut crowd, Vec3::X);
        assert!(matches!(result, Err(CompanionError::NoAgent(_))));
        assert_eq!(machine.companion(), &before);
        assert!(player.0.lock().unwrap().plays.is_empty());
    }

    #[test]
    fn test_arrival_returns_to_idle() {
        let (mut crowd, mut machine, player) = setup();
        machine.walk_to(&mut crowd, Vec3::new(1.0, 0.0, 0.5)).unwrap();

        for _ in 0..600 {
            crowd.tick(1.0 / 60.0);
            machine.update(&mut crowd);
            if machine.state() == LocomotionState::Idle {
                break;
            }
        }

        assert_eq!(machine.state(), LocomotionState::Idle);
        assert!(!machine.companion().has_target);
        let plays = &player.0.lock().unwrap().plays;
        assert_eq!(plays.last(), Some(&("idle".to_string(), true)));
        // Turned towards the direction of travel
        let forward = machine.companion().orientation * Vec3::Z;
        assert!(forward.x > 0.5);
    }

    #[test]
    fn test_unknown_gesture_rejected() {
        let (mut crowd, mut machine, _player) = setup();
        let before = machine.companion().clone();
        let result = machine.play_gesture(&mut crowd, "backflip");
        assert!(matches!(result, Err(CompanionError::UnknownGesture(_))));
        assert_eq!(machine.companion(), &before);
    }

    #[test]
    fn test_gesture_completion_goes_idle_once() {
        let (mut crowd, mut machine, player) = setup();
        machine.play_gesture(&mut crowd, "wave").unwrap();
        assert_eq!(machine.state(), LocomotionState::Gesture);
        assert_eq!(machine.companion().gesture, "wave");

        machine.update(&mut crowd);
        assert_eq!(machine.state(), LocomotionState::Gesture);

        let trigger = player.0.lock().unwrap().triggers.pop().unwrap();
        assert!(trigger.fire());
        machine.update(&mut crowd);
        machine.update(&mut crowd);

        assert_eq!(machine.state(), LocomotionState::Idle);
        let idle_plays = player
            .0
            .lock()
            .unwrap()
            .plays
            .iter()
            .filter(|(name, _)| name == "idle")
            .count();
        assert_eq!(idle_plays, 1);
    }

    #[test]
    fn test_superseded_gesture_cannot_complete() {
        let (mut crowd, mut machine, player) = setup();
        machine.play_gesture(&mut crowd, "wave").unwrap();
        machine.play_gesture(&mut crowd, "nod").unwrap();

        let (first, second) = {
            let mut rec = player.0.lock().unwrap();
            let second = rec.triggers.pop().unwrap();
            let first = rec.triggers.pop().unwrap();
            (first, second)
        };

        assert!(!first.fire());
        machine.update(&mut crowd);
        assert_eq!(machine.state(), LocomotionState::Gesture);
        assert_eq!(machine.companion().gesture, "nod");

        assert!(second.fire());
        machine.update(&mut crowd);
        assert_eq!(machine.state(), LocomotionState::Idle);
    }

    #[test]
    fn test_walk_cancels_gesture() {
        let (mut crowd, mut machine, player) = setup();
        machine.play_gesture(&mut crowd, "wave").unwrap();
        machine.walk_to(&mut crowd, Vec3::new(3.0, 0.0, 0.0)).unwrap();

        let trigger = player.0.lock().unwrap().triggers.pop().unwrap();
        assert!(!trigger.fire());
        crowd.tick(1.0 / 60.0);
        machine.update(&mut crowd);
        assert_eq!(machine.state(), LocomotionState::Walk);
    }

    #[test]
    fn test_facing_turns_gradually() {
        let (mut crowd, mut machine, _player) = setup();
        machine.walk_to(&mut crowd, Vec3::new(3.0, 0.0, 0.0)).unwrap();
        let agent = machine.companion().agent.unwrap();

        crowd.tick(1.0 / 60.0);
        machine.update(&mut crowd);

        let facing = look_rotation(crowd.kinematics(agent).unwrap().velocity).unwrap();
        let expected = Quat::IDENTITY.slerp(facing, ROTATION_SMOOTHING).normalize();
        let orientation = machine.companion().orientation;
        assert!(orientation.abs_diff_eq(expected, 1e-5), "{:?} vs {:?}", orientation, expected);
        // One tick covers a tenth of the turn, not all of it
        assert!(orientation.angle_between(facing) > 0.5 * facing.angle_between(Quat::IDENTITY));

        crowd.tick(1.0 / 60.0);
        machine.update(&mut crowd);
        let facing = look_rotation(crowd.kinematics(agent).unwrap().velocity).unwrap();
        let expected = expected.slerp(facing, ROTATION_SMOOTHING).normalize();
        assert!(machine.companion().orientation.abs_diff_eq(expected, 1e-5));
    }
}
