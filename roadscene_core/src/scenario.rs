//! Traffic scenarios and the motion rule each one assigns to its actors.

use crate::actor::ActorRole;
use crate::config::TravelBounds;
use crate::error::SceneError;
use crate::tuning::*;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioId {
    /// 1: a motorist comes up from behind and passes the car
    MotoristOvertake,
    
    /// 2: the car passes a cyclist
    CyclistOvertake,
    
    /// 3: car and motorist brake to the stop line, wait, pull away
    MotoristStopAndGo,
    
    /// 4: car and cyclist brake to the stop line, wait, pull away
    CyclistStopAndGo,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::MotoristOvertake,
            ScenarioId::CyclistOvertake,
            ScenarioId::MotoristStopAndGo,
            ScenarioId::CyclistStopAndGo,
        ]
    }
    
    /// Numeric id as shown in the start form.
    pub fn number(&self) -> u8 {
        match self {
            ScenarioId::MotoristOvertake => 1,
            ScenarioId::CyclistOvertake => 2,
            ScenarioId::MotoristStopAndGo => 3,
            ScenarioId::CyclistStopAndGo => 4,
        }
    }
    
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::MotoristOvertake => "motorist_overtake",
            ScenarioId::CyclistOvertake => "cyclist_overtake",
            ScenarioId::MotoristStopAndGo => "motorist_stop_and_go",
            ScenarioId::CyclistStopAndGo => "cyclist_stop_and_go",
        }
    }
    
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::MotoristOvertake => "Motorist at 0.09/tick overtakes a car at 0.05/tick",
            ScenarioId::CyclistOvertake => "Car at 0.08/tick overtakes a cyclist at 0.05/tick",
            ScenarioId::MotoristStopAndGo => "Car and motorist stop at the line, dwell, accelerate",
            ScenarioId::CyclistStopAndGo => "Car and cyclist stop at the line, dwell, accelerate",
        }
    }
    
    /// The two-wheeler sharing the road with the car.
    pub fn partner(&self) -> ActorRole {
        match self {
            ScenarioId::MotoristOvertake | ScenarioId::MotoristStopAndGo => ActorRole::Motorist,
            ScenarioId::CyclistOvertake | ScenarioId::CyclistStopAndGo => ActorRole::Cyclist,
        }
    }
    
    /// Actors that take part in this scenario.
    pub fn roles(&self) -> [ActorRole; 2] {
        [ActorRole::Car, self.partner()]
    }
    
    pub fn is_stop_and_go(&self) -> bool {
        matches!(self, ScenarioId::MotoristStopAndGo | ScenarioId::CyclistStopAndGo)
    }
    
    /// Motion rule for `role`, or `None` if the role is not in this scenario.
    pub fn rule_for(&self, role: ActorRole) -> Option<MotionRule> {
        if !self.roles().contains(&role) {
            return None;
        }
        
        let rule = match (self, role) {
            (ScenarioId::MotoristOvertake, ActorRole::Car) => MotionRule::Constant {
                step: CAR_STEP_BEHIND_MOTORIST,
            },
            (ScenarioId::MotoristOvertake, _) => MotionRule::Constant {
                step: MOTORIST_OVERTAKE_STEP,
            },
            (ScenarioId::CyclistOvertake, ActorRole::Car) => MotionRule::Constant {
                step: CAR_STEP_PASSING_CYCLIST,
            },
            (ScenarioId::CyclistOvertake, _) => MotionRule::Constant {
                step: CYCLIST_OVERTAKE_STEP,
            },
            (_, role) => MotionRule::StopAndGo(StopProfile::for_role(role)),
        };
        Some(rule)
    }
    
    /// Largest partner distance the spawn layout accepts within `bounds`.
    ///
    /// Stop-and-go partners must start before their stop line; every
    /// partner must start inside the travel interval.
    pub fn max_distance(&self, bounds: &TravelBounds) -> f64 {
        match self {
            ScenarioId::MotoristOvertake => bounds.max_z - CAR_SPAWN_Z,
            ScenarioId::CyclistOvertake => CAR_SPAWN_Z - bounds.min_z,
            _ => (CAR_SPAWN_Z - StopProfile::for_role(self.partner()).stop_z).min(CAR_SPAWN_Z - bounds.min_z),
        }
    }
    
    /// Spawn position of `role` with the partner `distance` units from the car.
    ///
    /// In the motorist overtake the motorist starts behind the car; in every
    /// other scenario the two-wheeler starts ahead.
    pub fn spawn_position(&self, role: ActorRole, distance: f64) -> Vector3<f64> {
        let height = role.ride_height();
        if role == ActorRole::Car {
            return Vector3::new(CAR_LANE_X, height, CAR_SPAWN_Z);
        }
        let z = match self {
            ScenarioId::MotoristOvertake => CAR_SPAWN_Z + distance,
            _ => CAR_SPAWN_Z - distance,
        };
        Vector3::new(PARTNER_LANE_X, height, z)
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = SceneError;
    
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "1" | "motorist_overtake" | "motoristovertake" => Ok(ScenarioId::MotoristOvertake),
            "2" | "cyclist_overtake" | "cyclistovertake" => Ok(ScenarioId::CyclistOvertake),
            "3" | "motorist_stop_and_go" | "motoriststopandgo" => Ok(ScenarioId::MotoristStopAndGo),
            "4" | "cyclist_stop_and_go" | "cycliststopandgo" => Ok(ScenarioId::CyclistStopAndGo),
            _ => Err(SceneError::UnknownScenario(s.to_string())),
        }
    }
}

/// Stop-and-go parameters for one role.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StopProfile {
    /// Where the actor stops
    pub stop_z: f64,
    pub max_speed: f64,
    /// Fraction of the remaining distance covered per tick while braking
    pub deceleration: f64,
    /// Speed gained per tick after the dwell
    pub acceleration: f64,
    /// Floor on the braking step so the stop line is reached in finite ticks
    pub min_step: f64,
    pub dwell_ticks: u32,
}

impl StopProfile {
    pub fn for_role(role: ActorRole) -> Self {
        match role {
            ActorRole::Car => Self {
                stop_z: STOP_LINE_Z,
                max_speed: CAR_MAX_SPEED,
                deceleration: CAR_DECELERATION,
                acceleration: CAR_ACCELERATION,
                min_step: CAR_MIN_STEP,
                dwell_ticks: DWELL_TICKS,
            },
            ActorRole::Motorist => Self {
                stop_z: STOP_LINE_Z,
                max_speed: MOTORIST_MAX_SPEED,
                deceleration: MOTORIST_DECELERATION,
                acceleration: MOTORIST_ACCELERATION,
                min_step: MOTORIST_MIN_STEP,
                dwell_ticks: DWELL_TICKS,
            },
            ActorRole::Cyclist => Self {
                stop_z: STOP_LINE_Z + CYCLIST_STOP_OFFSET,
                max_speed: CYCLIST_MAX_SPEED,
                deceleration: CYCLIST_DECELERATION,
                acceleration: CYCLIST_ACCELERATION,
                min_step: CYCLIST_MIN_STEP,
                dwell_ticks: DWELL_TICKS,
            },
        }
    }
}

/// How an actor's z advances each tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MotionRule {
    /// Fixed distance per tick
    Constant { step: f64 },
    
    /// Brake to a stop line, dwell, re-accelerate
    StopAndGo(StopProfile),
}

/// Largest per-tick distance any scenario can move an actor.
///
/// The first braking step is `(z - stop_z) * deceleration`, which is largest
/// for an actor spawned at `max_z`.
pub fn max_actor_step(max_z: f64) -> f64 {
    ScenarioId::all()
        .into_iter()
        .flat_map(|scenario| scenario.roles().map(move |role| scenario.rule_for(role)))
        .flatten()
        .map(|rule| match rule {
            MotionRule::Constant { step } => step,
            MotionRule::StopAndGo(profile) => profile
                .max_speed
                .max(profile.min_step)
                .max((max_z - profile.stop_z) * profile.deceleration),
        })
        .fold(0.0, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    
    #[test]
    fn test_parse_by_number_and_name() {
        assert_eq!("1".parse::<ScenarioId>().unwrap(), ScenarioId::MotoristOvertake);
        assert_eq!("cyclist_overtake".parse::<ScenarioId>().unwrap(), ScenarioId::CyclistOvertake);
        assert_eq!(" 4 ".parse::<ScenarioId>().unwrap(), ScenarioId::CyclistStopAndGo);
        assert!(matches!("7".parse::<ScenarioId>(), Err(SceneError::UnknownScenario(_))));
    }
    
    #[test]
    fn test_overtake_steps() {
        let s1 = ScenarioId::MotoristOvertake;
        assert_eq!(s1.rule_for(ActorRole::Motorist), Some(MotionRule::Constant { step: 0.09 }));
        assert_eq!(s1.rule_for(ActorRole::Car), Some(MotionRule::Constant { step: 0.05 }));
        assert_eq!(s1.rule_for(ActorRole::Cyclist), None);
        
        let s2 = ScenarioId::CyclistOvertake;
        assert_eq!(s2.rule_for(ActorRole::Cyclist), Some(MotionRule::Constant { step: 0.05 }));
        assert_eq!(s2.rule_for(ActorRole::Car), Some(MotionRule::Constant { step: 0.08 }));
    }
    
    #[test]
    fn test_cyclist_stops_before_the_line() {
        let cyclist = StopProfile::for_role(ActorRole::Cyclist);
        let car = StopProfile::for_role(ActorRole::Car);
        assert_eq!(car.stop_z, 0.0);
        assert_eq!(cyclist.stop_z, 0.75);
        assert_eq!(cyclist.dwell_ticks, 120);
    }
    
    #[test]
    fn test_spawn_layout() {
        let behind = ScenarioId::MotoristOvertake.spawn_position(ActorRole::Motorist, 10.0);
        let car = ScenarioId::MotoristOvertake.spawn_position(ActorRole::Car, 10.0);
        assert!(behind.z > car.z);
        
        let ahead = ScenarioId::CyclistOvertake.spawn_position(ActorRole::Cyclist, 10.0);
        assert!(ahead.z < car.z);
        assert_ne!(ahead.x, car.x);
    }
    
    #[test]
    fn test_max_actor_step() {
        let braking = (MAX_Z - STOP_LINE_Z) * MOTORIST_DECELERATION;
        assert!(max_actor_step(MAX_Z) >= MOTORIST_OVERTAKE_STEP);
        assert!((max_actor_step(MAX_Z) - braking).abs() < 1e-12);
    }
    
    #[test]
    fn test_max_distance_follows_bounds() {
        let default = TravelBounds::default();
        assert_eq!(ScenarioId::MotoristOvertake.max_distance(&default), MAX_Z - CAR_SPAWN_Z);
        assert_eq!(ScenarioId::CyclistStopAndGo.max_distance(&default), CAR_SPAWN_Z - 0.75);
        
        let short = TravelBounds {
            min_z: -10.0,
            max_z: 35.0,
            ..Default::default()
        };
        assert_eq!(ScenarioId::MotoristOvertake.max_distance(&short), 5.0);
        assert_eq!(ScenarioId::CyclistOvertake.max_distance(&short), 40.0);
        assert_eq!(ScenarioId::MotoristStopAndGo.max_distance(&short), CAR_SPAWN_Z);
    }
}
