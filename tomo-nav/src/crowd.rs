//! Crowd simulation over the baked walkable surface
//!
//! Agents steer along their corridor, slow down near the final waypoint and
//! keep apart from each other. Arrival is velocity based: an agent holding a
//! target whose speed drops below [`ARRIVAL_SPEED_THRESHOLD`] has arrived,
//! which also covers agents that are blocked and come to a stop.

use crate::config::CrowdConfig;
use crate::error::NavError;
use crate::geometry::WalkableGeometry;
use crate::path::find_path;
use crate::surface::NavSurface;
use glam::Vec3;
use std::collections::VecDeque;
use tomo_core::math::{clamp_length, distance_xz_squared, EPSILON_SQ};
use tracing::{debug, info, warn};

/// Speed (units/second) below which an agent with a target counts as arrived
pub const ARRIVAL_SPEED_THRESHOLD: f32 = 0.1;

/// Intermediate waypoints closer than this are considered reached
const WAYPOINT_REACHED_DISTANCE: f32 = 0.05;

/// Opaque agent identity. Handles go stale when the agent is removed or the surface is re-baked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AgentHandle {
    index: u32,
    generation: u32,
}

/// Position and velocity of an agent after the latest tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Kinematics {
    pub position: Vec3,
    pub velocity: Vec3,
}

impl Kinematics {
    pub fn speed(&self) -> f32 {
        self.velocity.length()
    }

    /// Whether the speed is under the arrival threshold
    pub fn has_arrived(&self) -> bool {
        self.speed() < ARRIVAL_SPEED_THRESHOLD
    }
}

/// A simulated agent
#[derive(Debug, Clone)]
pub struct NavAgent {
    position: Vec3,
    velocity: Vec3,
    max_speed: f32,
    radius: f32,
    target: Option<Vec3>,
    corridor: VecDeque<Vec3>,
    partial: bool,
}

impl NavAgent {
    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn velocity(&self) -> Vec3 {
        self.velocity
    }

    pub fn max_speed(&self) -> f32 {
        self.max_speed
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    /// Active target, already projected onto the surface
    pub fn target(&self) -> Option<Vec3> {
        self.target
    }

    /// True when the target could not be reached and the agent heads for the closest point instead
    pub fn is_partial(&self) -> bool {
        self.partial
    }

    pub fn kinematics(&self) -> Kinematics {
        Kinematics {
            position: self.position,
            velocity: self.velocity,
        }
    }
}

#[derive(Debug, Default)]
struct AgentSlot {
    generation: u32,
    agent: Option<NavAgent>,
}

/// Owns the walkable surface and every agent moving over it
#[derive(Debug)]
pub struct CrowdNavigationManager {
    config: CrowdConfig,
    surface: Option<NavSurface>,
    slots: Vec<AgentSlot>,
}

impl CrowdNavigationManager {
    pub fn new(config: CrowdConfig) -> Self {
        let slots = (0..config.max_agents).map(|_| AgentSlot::default()).collect();
        Self {
            config,
            surface: None,
            slots,
        }
    }

    pub fn config(&self) -> &CrowdConfig {
        &self.config
    }

    /// Build or rebuild the walkable surface.
    ///
    /// A successful bake replaces the previous surface and removes every
    /// agent; callers re-add them. A failed bake leaves the current surface
    /// and agents untouched.
    pub fn bake(&mut self, geometry: &WalkableGeometry) -> Result<(), NavError> {
        let surface = NavSurface::bake(
            geometry,
            self.config.walkable_slope_degrees,
            self.config.weld_tolerance,
        )?;

        let dropped = self.agent_count();
        for slot in &mut self.slots {
            if slot.agent.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
            }
        }
        if dropped > 0 {
            info!("Surface re-baked, {} agents must be re-added", dropped);
        }

        self.surface = Some(surface);
        Ok(())
    }

    /// Whether a surface has been baked
    pub fn is_ready(&self) -> bool {
        self.surface.is_some()
    }

    pub fn surface(&self) -> Option<&NavSurface> {
        self.surface.as_ref()
    }

    pub fn agent_count(&self) -> usize {
        self.slots.iter().filter(|s| s.agent.is_some()).count()
    }

    /// Add an agent at the walkable point nearest `position`.
    ///
    /// Returns `None` if the surface is not baked or the crowd is full.
    pub fn add_agent(&mut self, position: Vec3, radius: f32, max_speed: f32) -> Option<AgentHandle> {
        let Some(surface) = self.surface.as_ref() else {
            warn!("Cannot add agent: navigation surface is not baked");
            return None;
        };

        let Some(index) = self.slots.iter().position(|s| s.agent.is_none()) else {
            warn!(
                "Cannot add agent: crowd is full ({} agents)",
                self.config.max_agents
            );
            return None;
        };

        let (_, position) = surface.closest_point(position);
        let radius = radius.clamp(0.0, self.config.max_agent_radius);
        let slot = &mut self.slots[index];
        slot.agent = Some(NavAgent {
            position,
            velocity: Vec3::ZERO,
            max_speed: max_speed.max(0.0),
            radius,
            target: None,
            corridor: VecDeque::new(),
            partial: false,
        });

        debug!(
            "Added agent {} at ({:.2}, {:.2}, {:.2})",
            index, position.x, position.y, position.z
        );

        Some(AgentHandle {
            index: index as u32,
            generation: slot.generation,
        })
    }

    /// Remove an agent. Returns false for stale handles.
    pub fn remove_agent(&mut self, handle: AgentHandle) -> bool {
        match self.slot_mut(handle) {
            Some(slot) => {
                slot.agent = None;
                slot.generation = slot.generation.wrapping_add(1);
                true
            }
            None => false,
        }
    }

    /// Send an agent towards `target`, projected onto the surface
    pub fn set_target(&mut self, handle: AgentHandle, target: Vec3) -> bool {
        let Some(surface) = self.surface.as_ref() else {
            return false;
        };
        let Some(agent) = lookup_mut(&mut self.slots, handle) else {
            warn!("set_target on stale agent handle {:?}", handle);
            return false;
        };

        let path = find_path(surface, agent.position, target);
        agent.target = path.waypoints.last().copied();
        agent.corridor = path.waypoints.into_iter().collect();
        agent.partial = !path.complete;
        true
    }

    /// Drop the agent's target; it decelerates to a stop
    pub fn clear_target(&mut self, handle: AgentHandle) -> bool {
        match lookup_mut(&mut self.slots, handle) {
            Some(agent) => {
                agent.target = None;
                agent.corridor.clear();
                agent.partial = false;
                true
            }
            None => false,
        }
    }

    pub fn set_speed(&mut self, handle: AgentHandle, speed: f32) -> bool {
        match lookup_mut(&mut self.slots, handle) {
            Some(agent) => {
                agent.max_speed = speed.max(0.0);
                true
            }
            None => false,
        }
    }

    pub fn kinematics(&self, handle: AgentHandle) -> Option<Kinematics> {
        self.agent(handle).map(NavAgent::kinematics)
    }

    pub fn agent(&self, handle: AgentHandle) -> Option<&NavAgent> {
        let slot = self.slots.get(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.agent.as_ref()
    }

    /// Advance every agent by `dt` seconds
    pub fn tick(&mut self, dt: f32) {
        if !(dt.is_finite() && dt > 0.0) {
            return;
        }
        let Some(surface) = self.surface.as_ref() else {
            return;
        };

        let snapshot: Vec<Option<(Vec3, f32)>> = self
            .slots
            .iter()
            .map(|s| s.agent.as_ref().map(|a| (a.position, a.radius)))
            .collect();

        for (index, slot) in self.slots.iter_mut().enumerate() {
            let Some(agent) = slot.agent.as_mut() else {
                continue;
            };

            let mut desired = steer(agent, self.config.max_acceleration);
            if agent.target.is_some() {
                desired = separate(
                    index,
                    agent,
                    desired,
                    &snapshot,
                    self.config.separation_weight,
                );
            }

            let dv = clamp_length(desired - agent.velocity, self.config.max_acceleration * dt);
            agent.velocity = clamp_length(agent.velocity + dv, agent.max_speed);

            let previous = agent.position;
            let (_, projected) = surface.closest_point(previous + agent.velocity * dt);
            agent.position = projected;
            // Blocked movement shows up as lost speed
            agent.velocity = (projected - previous) / dt;
        }

        self.resolve_overlaps();
    }

    /// Push overlapping agents apart. Agents without a target do not yield.
    fn resolve_overlaps(&mut self) {
        let Some(surface) = self.surface.as_ref() else {
            return;
        };

        let count = self.slots.len();
        for i in 0..count {
            for j in (i + 1)..count {
                let (head, tail) = self.slots.split_at_mut(j);
                let (Some(a), Some(b)) = (head[i].agent.as_mut(), tail[0].agent.as_mut()) else {
                    continue;
                };

                let min_dist = a.radius + b.radius;
                let dist_sq = distance_xz_squared(a.position, b.position);
                if dist_sq >= min_dist * min_dist || dist_sq < EPSILON_SQ {
                    continue;
                }

                let a_moves = a.target.is_some();
                let b_moves = b.target.is_some();
                let (share_a, share_b) = match (a_moves, b_moves) {
                    (true, true) => (0.5, 0.5),
                    (true, false) => (1.0, 0.0),
                    (false, true) => (0.0, 1.0),
                    (false, false) => continue,
                };

                let dist = dist_sq.sqrt();
                let mut away = a.position - b.position;
                away.y = 0.0;
                let push = away / dist * (min_dist - dist);
                a.position = surface.closest_point(a.position + push * share_a).1;
                b.position = surface.closest_point(b.position - push * share_b).1;
            }
        }
    }

    fn slot_mut(&mut self, handle: AgentHandle) -> Option<&mut AgentSlot> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation || slot.agent.is_none() {
            return None;
        }
        Some(slot)
    }
}

fn lookup_mut(slots: &mut [AgentSlot], handle: AgentHandle) -> Option<&mut NavAgent> {
    let slot = slots.get_mut(handle.index as usize)?;
    if slot.generation != handle.generation {
        return None;
    }
    slot.agent.as_mut()
}

/// Desired velocity towards the next corridor waypoint, slowing near the final one
fn steer(agent: &mut NavAgent, max_acceleration: f32) -> Vec3 {
    if agent.target.is_none() {
        return Vec3::ZERO;
    }

    while agent.corridor.len() > 1 {
        match agent.corridor.front() {
            Some(next)
                if distance_xz_squared(*next, agent.position)
                    < WAYPOINT_REACHED_DISTANCE * WAYPOINT_REACHED_DISTANCE =>
            {
                agent.corridor.pop_front();
            }
            _ => break,
        }
    }

    let Some(next) = agent.corridor.front().copied() else {
        return Vec3::ZERO;
    };

    let mut to_next = next - agent.position;
    to_next.y = 0.0;
    let distance = to_next.length();
    if distance < 1e-3 {
        return Vec3::ZERO;
    }

    let mut speed = agent.max_speed;
    if agent.corridor.len() == 1 {
        let braking = agent.max_speed * agent.max_speed / (2.0 * max_acceleration);
        let slow_down = braking.max(agent.radius * 2.0);
        if distance < slow_down {
            speed *= distance / slow_down;
        }
    }

    to_next / distance * speed
}

/// Add a push away from nearby agents, keeping the desired speed
fn separate(
    index: usize,
    agent: &NavAgent,
    desired: Vec3,
    others: &[Option<(Vec3, f32)>],
    weight: f32,
) -> Vec3 {
    if weight <= 0.0 {
        return desired;
    }

    let mut displacement = Vec3::ZERO;
    let mut neighbours = 0;
    for (other_index, other) in others.iter().enumerate() {
        let Some((position, radius)) = other else {
            continue;
        };
        if other_index == index {
            continue;
        }

        let range = (agent.radius + radius) * 2.0;
        let mut diff = agent.position - *position;
        diff.y = 0.0;
        let dist_sq = diff.length_squared();
        if dist_sq < EPSILON_SQ || dist_sq > range * range {
            continue;
        }
        let dist = dist_sq.sqrt();
        let falloff = weight * (1.0 - (dist / range) * (dist / range));
        displacement += diff * (falloff / dist);
        neighbours += 1;
    }

    if neighbours == 0 {
        return desired;
    }

    let speed = desired.length();
    clamp_length(desired + displacement / neighbours as f32, speed)
}
