//! Camera placement strategies relative to the car.

use crate::tuning::*;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Camera mode, cycled in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraMode {
    /// User-controlled, no target
    FreeOrbit,
    /// Above the car, target pinned to it, polar angle constrained
    ChaseTopDown,
    BehindRight,
    /// Beside the car, facing the travel direction
    LeftSide,
    ForwardLeft,
}

impl CameraMode {
    pub const ORDER: [CameraMode; 5] = [
        CameraMode::FreeOrbit,
        CameraMode::ChaseTopDown,
        CameraMode::BehindRight,
        CameraMode::LeftSide,
        CameraMode::ForwardLeft,
    ];
    
    pub fn name(&self) -> &'static str {
        match self {
            CameraMode::FreeOrbit => "free_orbit",
            CameraMode::ChaseTopDown => "chase_top_down",
            CameraMode::BehindRight => "behind_right",
            CameraMode::LeftSide => "left_side",
            CameraMode::ForwardLeft => "forward_left",
        }
    }
    
    /// Camera pose for the car at `car` heading along `forward`.
    ///
    /// Returns `None` for [`CameraMode::FreeOrbit`], whose pose belongs to
    /// the user.
    pub fn place(&self, car: &Vector3<f64>, forward: &Vector3<f64>) -> Option<CameraPlacement> {
        let up = Vector3::y();
        let forward = flatten(forward);
        let right = forward.cross(&up);
        
        let placement = match self {
            CameraMode::FreeOrbit => return None,
            CameraMode::ChaseTopDown => {
                let polar = CHASE_POLAR_ANGLE.clamp(CHASE_MIN_POLAR, CHASE_MAX_POLAR);
                let offset = up * (CHASE_DISTANCE * polar.cos()) - forward * (CHASE_DISTANCE * polar.sin());
                CameraPlacement {
                    position: car + offset,
                    look_at: *car,
                    polar_range: Some((CHASE_MIN_POLAR, CHASE_MAX_POLAR)),
                }
            }
            CameraMode::BehindRight => CameraPlacement::looking_at(
                car - forward * 6.0 + right * 3.0 + up * 3.0,
                *car,
            ),
            CameraMode::LeftSide => CameraPlacement::looking_at(
                car - right * 2.5 + up * 1.2,
                car + forward * 10.0,
            ),
            CameraMode::ForwardLeft => CameraPlacement::looking_at(
                car + forward * 6.0 - right * 3.0 + up * 2.0,
                *car,
            ),
        };
        Some(placement)
    }
}

/// Forward direction with y removed; falls back to -z when degenerate.
fn flatten(forward: &Vector3<f64>) -> Vector3<f64> {
    let flat = Vector3::new(forward.x, 0.0, forward.z);
    flat.try_normalize(1e-9).unwrap_or_else(|| -Vector3::z())
}

/// Camera position and look-at target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraPlacement {
    pub position: Vector3<f64>,
    pub look_at: Vector3<f64>,
    
    /// Orbit polar-angle constraint, when the mode has one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub polar_range: Option<(f64, f64)>,
}

impl CameraPlacement {
    pub fn looking_at(position: Vector3<f64>, look_at: Vector3<f64>) -> Self {
        Self {
            position,
            look_at,
            polar_range: None,
        }
    }
    
    /// Dashcam viewpoint used for screenshot telemetry.
    pub fn dashcam(car: &Vector3<f64>, forward: &Vector3<f64>) -> Self {
        let forward = flatten(forward);
        Self::looking_at(
            car + Vector3::y() * 1.2 + forward * 0.5,
            car + forward * 20.0,
        )
    }
}

/// Mode counter advanced by user input.
#[derive(Debug, Clone, Default)]
pub struct CameraSelector {
    index: usize,
}

impl CameraSelector {
    /// Advances to the next mode and returns it.
    pub fn cycle(&mut self) -> CameraMode {
        self.index = (self.index + 1) % CameraMode::ORDER.len();
        self.mode()
    }
    
    pub fn mode(&self) -> CameraMode {
        CameraMode::ORDER[self.index % CameraMode::ORDER.len()]
    }
}

/// Held movement keys for the free camera.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MoveKeys {
    pub forward: bool,
    pub left: bool,
    pub back: bool,
    pub right: bool,
}

impl MoveKeys {
    pub fn any(&self) -> bool {
        self.forward || self.left || self.back || self.right
    }
}

/// The user-controlled camera of the free orbit mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FreeCamera {
    pub position: Vector3<f64>,
    pub look_at: Vector3<f64>,
}

impl Default for FreeCamera {
    fn default() -> Self {
        Self {
            position: Vector3::new(10.0, 10.0, 20.0),
            look_at: Vector3::zeros(),
        }
    }
}

impl FreeCamera {
    /// Translates camera and target along the y-locked view axes.
    pub fn apply_movement(&mut self, keys: MoveKeys) {
        if !keys.any() {
            return;
        }
        let forward = flatten(&(self.look_at - self.position));
        let right = forward.cross(&Vector3::y());
        
        let mut delta = Vector3::zeros();
        if keys.forward {
            delta += forward;
        }
        if keys.back {
            delta -= forward;
        }
        if keys.left {
            delta -= right;
        }
        if keys.right {
            delta += right;
        }
        delta *= FREE_CAMERA_SPEED;
        
        self.position += delta;
        self.look_at += delta;
    }
    
    pub fn placement(&self) -> CameraPlacement {
        CameraPlacement::looking_at(self.position, self.look_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    
    fn forward() -> Vector3<f64> {
        -Vector3::z()
    }
    
    #[test]
    fn test_cycle_wraps() {
        let mut selector = CameraSelector::default();
        assert_eq!(selector.mode(), CameraMode::FreeOrbit);
        for expected in &CameraMode::ORDER[1..] {
            assert_eq!(selector.cycle(), *expected);
        }
        assert_eq!(selector.cycle(), CameraMode::FreeOrbit);
    }
    
    #[test]
    fn test_free_orbit_has_no_placement() {
        assert!(CameraMode::FreeOrbit.place(&Vector3::zeros(), &forward()).is_none());
    }
    
    #[test]
    fn test_chase_targets_car_from_above_behind() {
        let car = Vector3::new(1.5, 0.5, -40.0);
        let placement = CameraMode::ChaseTopDown.place(&car, &forward()).unwrap();
        
        assert_eq!(placement.look_at, car);
        assert!(placement.position.y > car.y + 10.0);
        assert!(placement.position.z > car.z);
        assert_relative_eq!((placement.position - car).norm(), CHASE_DISTANCE, epsilon = 1e-9);
        assert!(placement.polar_range.is_some());
    }
    
    #[test]
    fn test_side_modes() {
        let car = Vector3::new(0.0, 0.0, 0.0);
        
        let behind_right = CameraMode::BehindRight.place(&car, &forward()).unwrap();
        assert!(behind_right.position.x > 0.0 && behind_right.position.z > 0.0);
        
        let left = CameraMode::LeftSide.place(&car, &forward()).unwrap();
        assert!(left.position.x < 0.0);
        assert!(left.look_at.z < car.z);
        
        let forward_left = CameraMode::ForwardLeft.place(&car, &forward()).unwrap();
        assert!(forward_left.position.x < 0.0 && forward_left.position.z < 0.0);
    }
    
    #[test]
    fn test_placement_is_pure() {
        let car = Vector3::new(2.0, 0.5, -12.0);
        for mode in CameraMode::ORDER {
            assert_eq!(mode.place(&car, &forward()), mode.place(&car, &forward()));
        }
    }
    
    #[test]
    fn test_free_camera_moves_on_ground_plane() {
        let mut camera = FreeCamera::default();
        let start = camera.position;
        camera.apply_movement(MoveKeys {
            forward: true,
            ..Default::default()
        });
        
        assert_eq!(camera.position.y, start.y);
        assert_relative_eq!((camera.position - start).norm(), FREE_CAMERA_SPEED, epsilon = 1e-9);
        
        let before = camera.position;
        camera.apply_movement(MoveKeys::default());
        assert_eq!(camera.position, before);
    }
}
