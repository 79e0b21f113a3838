//! Per-tick actor kinematics.
//!
//! Travel is towards negative z. Every rule clamps z into the travel interval
//! after moving, so an actor reaching a boundary is held there.

use crate::actor::{ActorRole, ActorSlot, KinematicState};
use crate::config::TravelBounds;
use crate::scenario::{MotionRule, ScenarioId, StopProfile};
use std::collections::BTreeMap;

impl MotionRule {
    /// Advances `state` by one tick.
    pub fn step(&self, state: &mut KinematicState, bounds: &TravelBounds) {
        match self {
            MotionRule::Constant { step } => {
                state.position.z -= step;
            }
            MotionRule::StopAndGo(profile) => stop_and_go(profile, state),
        }
        state.position.z = bounds.clamp_z(state.position.z);
    }
}

fn stop_and_go(profile: &StopProfile, state: &mut KinematicState) {
    let z = state.position.z;
    
    if !state.stopped {
        // Spawned past the line: nothing to brake for, pull away directly
        if z < profile.stop_z {
            state.stopped = true;
            state.stop_frames = profile.dwell_ticks;
        } else {
            let step = ((z - profile.stop_z) * profile.deceleration).max(profile.min_step);
            let next = z - step;
            if next <= profile.stop_z {
                state.position.z = profile.stop_z;
                state.stopped = true;
                state.stop_frames = 0;
                state.speed = 0.0;
            } else {
                state.position.z = next;
            }
            return;
        }
    }
    
    state.stop_frames = state.stop_frames.saturating_add(1);
    if state.stop_frames > profile.dwell_ticks {
        state.speed = (state.speed + profile.acceleration).min(profile.max_speed);
        state.position.z -= state.speed;
    }
}

/// Moves x by the nudge step, wrapping to 0 at the road width.
pub fn nudge(state: &mut KinematicState, bounds: &TravelBounds) {
    state.position.x = (state.position.x + bounds.nudge_step).rem_euclid(bounds.road_width);
}

/// Advances every ready actor of `scenario` by one tick.
///
/// Actors whose model is still loading are skipped. Returns the number of
/// actors moved.
pub fn update_actors(
    scenario: ScenarioId,
    actors: &mut BTreeMap<ActorRole, ActorSlot>,
    bounds: &TravelBounds,
) -> usize {
    let mut moved = 0;
    for slot in actors.values_mut() {
        if !slot.is_ready() {
            continue;
        }
        if let Some(rule) = scenario.rule_for(slot.role) {
            rule.step(&mut slot.state, bounds);
            moved += 1;
        }
    }
    moved
}
