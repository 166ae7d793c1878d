//! Coordinator loop
//!
//! One task owns the crowd and every companion. It multiplexes the
//! simulation tick, inbound frames and side effects from query answers, so
//! ticks and message handling never overlap. Slow work (answering queries,
//! waiting on outbound ones) runs in other tasks and reports back through
//! channels.

use glam::Vec3;
use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tomo_companion::{AnimationPlayer, CompanionRoster};
use tomo_core::{CompanionId, Result};
use tomo_nav::{CrowdNavigationManager, WalkableGeometry};
use tomo_protocol::{
    ActionDispatcher, ProtocolRouter, QueryCorrelator, QueryResponder, RouteDecision,
};
use tracing::{debug, info, warn};

/// Requests from other tasks into the coordinator
#[derive(Debug, Clone)]
pub enum CoordinatorEvent {
    /// Apply a facial expression (from a `speak` query's emotion)
    SetExpression {
        companion: CompanionId,
        expression: String,
    },
    /// New walkable geometry from the scene provider
    Bake(WalkableGeometry),
}

/// Builds the animation player for a newly spawned companion
pub type PlayerFactory = Box<dyn Fn(&CompanionId) -> Box<dyn AnimationPlayer> + Send>;

pub struct Coordinator {
    crowd: CrowdNavigationManager,
    roster: CompanionRoster,
    router: ProtocolRouter,
    dispatcher: ActionDispatcher,
    correlator: QueryCorrelator,
    responder: QueryResponder,
    tick_interval: Duration,
}

impl Coordinator {
    pub fn new(
        crowd: CrowdNavigationManager,
        roster: CompanionRoster,
        correlator: QueryCorrelator,
        responder: QueryResponder,
        tick_interval: Duration,
    ) -> Self {
        Self {
            crowd,
            roster,
            router: ProtocolRouter::new(),
            dispatcher: ActionDispatcher::new(),
            correlator,
            responder,
            tick_interval,
        }
    }

    /// Spawn every configured companion. Without a baked surface they have no agent yet.
    pub fn spawn_roster(&mut self, players: &PlayerFactory) {
        let profiles = self.roster.config().roster.clone();
        for profile in profiles {
            let id = CompanionId::from_name(&profile.name);
            let player = players(&id);
            let position = Vec3::from(profile.spawn_offset);
            if let Err(e) = self.roster.spawn(id, position, player, &mut self.crowd) {
                warn!("Could not spawn {}: {}", profile.name, e);
            }
        }
    }

    pub fn crowd(&self) -> &CrowdNavigationManager {
        &self.crowd
    }

    pub fn roster(&self) -> &CompanionRoster {
        &self.roster
    }

    /// Build the walkable surface and hand every companion a fresh agent
    pub fn bake(&mut self, geometry: &WalkableGeometry) -> Result<()> {
        self.crowd.bake(geometry)?;
        self.roster.rebind_agents(&mut self.crowd);
        info!(
            "Walkable surface ready, {} companions placed",
            self.crowd.agent_count()
        );
        Ok(())
    }

    /// One simulation step: crowd first, then the state machines read the result
    pub fn tick(&mut self, dt: f32) {
        self.crowd.tick(dt);
        self.roster.update(&mut self.crowd);
    }

    /// Advance by one fixed tick interval, the step the run loop uses
    pub fn step(&mut self) {
        self.tick(self.tick_interval.as_secs_f32());
    }

    /// Handle one inbound text frame
    pub fn handle_frame(&mut self, frame: &str) {
        match self.router.route(frame) {
            RouteDecision::Action(action) => {
                if let Err(e) = self
                    .dispatcher
                    .dispatch(&action, &mut self.roster, &mut self.crowd)
                {
                    debug!("Action '{}' from {} had no effect: {}", action.name, action.from, e);
                }
            }
            RouteDecision::QueryRequest(request) => {
                self.responder.spawn(request);
            }
            RouteDecision::QueryResponse(response) => {
                // Unknown ids are logged by the correlator
                let _ = self.correlator.resolve(response);
            }
            RouteDecision::Chat(chat) => {
                info!("{} -> {:?}: {}", chat.from, chat.to, chat.message);
            }
            RouteDecision::Drop(_) => {}
        }
    }

    pub fn handle_event(&mut self, event: CoordinatorEvent) {
        match event {
            CoordinatorEvent::SetExpression {
                companion,
                expression,
            } => match self.roster.get_mut(&companion) {
                Some(machine) => machine.set_expression(&expression),
                None => warn!("Expression for unknown companion {}", companion),
            },
            CoordinatorEvent::Bake(geometry) => {
                if let Err(e) = self.bake(&geometry) {
                    warn!("Ignoring scene geometry: {}", e);
                }
            }
        }
    }

    /// Run until the inbound stream closes or `shutdown` completes
    pub async fn run(
        mut self,
        mut inbound: mpsc::Receiver<String>,
        mut events: mpsc::Receiver<CoordinatorEvent>,
        shutdown: impl Future<Output = ()>,
    ) {
        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!(
            "Coordinator running at {:.0} Hz with {} companions",
            1.0 / self.tick_interval.as_secs_f64(),
            self.roster.len()
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => self.step(),
                frame = inbound.recv() => match frame {
                    Some(frame) => self.handle_frame(&frame),
                    None => {
                        info!("Inbound stream closed");
                        break;
                    }
                },
                Some(event) = events.recv() => self.handle_event(event),
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
            }
        }

        let pending = self.correlator.pending_count();
        if pending > 0 {
            info!("{} outbound queries still pending at shutdown", pending);
        }
    }
}
