//! Spawned companions, keyed by id

use crate::animation::AnimationPlayer;
use crate::config::CompanionConfig;
use crate::error::CompanionError;
use crate::state::CompanionStateMachine;
use glam::Vec3;
use std::collections::HashMap;
use tomo_core::CompanionId;
use tomo_nav::CrowdNavigationManager;
use tracing::{info, warn};

/// All companions of one coordination instance
#[derive(Debug)]
pub struct CompanionRoster {
    config: CompanionConfig,
    companions: HashMap<CompanionId, CompanionStateMachine>,
}

impl CompanionRoster {
    pub fn new(config: CompanionConfig) -> Self {
        Self {
            config,
            companions: HashMap::new(),
        }
    }

    pub fn config(&self) -> &CompanionConfig {
        &self.config
    }

    /// Spawn a companion and, if the surface is ready, give it an agent
    pub fn spawn(
        &mut self,
        id: CompanionId,
        position: Vec3,
        player: Box<dyn AnimationPlayer>,
        crowd: &mut CrowdNavigationManager,
    ) -> Result<&mut CompanionStateMachine, CompanionError> {
        if self.companions.contains_key(&id) {
            return Err(CompanionError::AlreadySpawned(id));
        }

        let mut machine = CompanionStateMachine::new(
            id.clone(),
            position,
            player,
            self.config.walk_speed,
            self.config.run_speed(),
        );

        match crowd.add_agent(position, self.config.agent_radius, self.config.walk_speed) {
            Some(agent) => machine.attach_agent(agent),
            None => warn!("{} spawned without a navigation agent", id),
        }

        info!("Spawned companion {}", id);
        Ok(self.companions.entry(id).or_insert(machine))
    }

    /// Remove a companion and its agent
    pub fn remove(
        &mut self,
        id: &CompanionId,
        crowd: &mut CrowdNavigationManager,
    ) -> Option<CompanionStateMachine> {
        let mut machine = self.companions.remove(id)?;
        if let Some(agent) = machine.detach_agent() {
            crowd.remove_agent(agent);
        }
        info!("Removed companion {}", id);
        Some(machine)
    }

    pub fn get(&self, id: &CompanionId) -> Option<&CompanionStateMachine> {
        self.companions.get(id)
    }

    pub fn get_mut(&mut self, id: &CompanionId) -> Option<&mut CompanionStateMachine> {
        self.companions.get_mut(id)
    }

    /// Look up a companion by its wire id
    pub fn resolve(&mut self, from: &str) -> Result<&mut CompanionStateMachine, CompanionError> {
        self.companions
            .get_mut(&CompanionId::from(from))
            .ok_or_else(|| CompanionError::UnknownCompanion(from.to_string()))
    }

    pub fn ids(&self) -> impl Iterator<Item = &CompanionId> {
        self.companions.keys()
    }

    pub fn len(&self) -> usize {
        self.companions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.companions.is_empty()
    }

    /// Run every state machine after the crowd tick
    pub fn update(&mut self, crowd: &mut CrowdNavigationManager) {
        for machine in self.companions.values_mut() {
            machine.update(crowd);
        }
    }

    /// Give every companion a fresh agent after a re-bake, resuming any walk or run
    pub fn rebind_agents(&mut self, crowd: &mut CrowdNavigationManager) {
        let radius = self.config.agent_radius;
        let walk_speed = self.config.walk_speed;

        for machine in self.companions.values_mut() {
            machine.detach_agent();
            let companion = machine.companion();
            let (position, state, target) = (companion.position, companion.state, companion.target);

            let Some(agent) = crowd.add_agent(position, radius, walk_speed) else {
                warn!("No agent available for {} after re-bake", machine.id());
                machine.stop();
                continue;
            };
            machine.attach_agent(agent);

            if let Some(target) = target.filter(|_| state.is_moving()) {
                let speed = if state == crate::state::LocomotionState::Run {
                    self.config.run_speed()
                } else {
                    walk_speed
                };
                crowd.set_speed(agent, speed);
                crowd.set_target(agent, target);
            }
        }
    }
}
