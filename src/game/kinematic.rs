//! Kinematic character state owned by the authoritative simulation

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::geometry::Aabb;

/// Collider and stepping parameters copied into the state at spawn
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MoveGeometry {
    /// Standing collider height
    pub default_height: f32,
    /// Crouched height as a fraction of `default_height`
    pub crouching_height: f32,
    /// Height interpolation rate while (un)crouching
    pub crouching_speed: f32,
    /// Steepest walkable surface, in degrees
    pub slope_limit: f32,
    pub step_offset: f32,
    pub use_step_offset: bool,
}

impl Default for MoveGeometry {
    fn default() -> Self {
        Self {
            default_height: 2.0,
            crouching_height: 0.5,
            crouching_speed: 10.0,
            slope_limit: 45.0,
            step_offset: 0.0,
            use_step_offset: false,
        }
    }
}

impl MoveGeometry {
    pub fn crouched_height(&self) -> f32 {
        self.default_height * self.crouching_height
    }
}

/// Position, velocity, orientation and derived movement flags.
///
/// `origin` is the centre of the body collider. `velocity` and `origin` are
/// only written inside the authoritative tick (or through the authority gate).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KinematicState {
    pub origin: Vec3,
    pub velocity: Vec3,
    /// Euler angles in degrees: (pitch, yaw, roll)
    pub view_angles: Vec3,

    /// Signed acceleration requests derived from the input axes
    pub forward_move: f32,
    pub side_move: f32,
    /// Raw axes as last received
    pub vertical_axis: f32,
    pub horizontal_axis: f32,

    pub crouching: bool,
    pub sprinting: bool,
    pub grounded: bool,
    pub underwater: bool,
    pub camera_underwater: bool,
    pub wish_jump: bool,
    pub climbing_ladder: bool,

    pub geometry: MoveGeometry,
    /// Body width and depth
    pub collider_footprint: (f32, f32),
    /// Current collider height, moved towards the stance target by the crouch step
    pub collider_height: f32,
    /// Eye position relative to `origin`
    pub view_offset: Vec3,
    /// Eye position relative to `origin` while standing
    pub default_view_offset: Vec3,

    /// Vertical velocity at the end of the previous tick
    pub falling_velocity: f32,
}

impl KinematicState {
    pub fn new(origin: Vec3, geometry: MoveGeometry, footprint: (f32, f32), view_offset: Vec3) -> Self {
        Self {
            origin,
            velocity: Vec3::ZERO,
            view_angles: Vec3::ZERO,
            forward_move: 0.0,
            side_move: 0.0,
            vertical_axis: 0.0,
            horizontal_axis: 0.0,
            crouching: false,
            sprinting: false,
            grounded: false,
            underwater: false,
            camera_underwater: false,
            wish_jump: false,
            climbing_ladder: false,
            geometry,
            collider_footprint: footprint,
            collider_height: geometry.default_height,
            view_offset,
            default_view_offset: view_offset,
            falling_velocity: 0.0,
        }
    }

    pub fn eye_position(&self) -> Vec3 {
        self.origin + self.view_offset
    }

    pub fn half_extents(&self) -> Vec3 {
        Vec3::new(
            self.collider_footprint.0 * 0.5,
            self.collider_height * 0.5,
            self.collider_footprint.1 * 0.5,
        )
    }

    /// Current body collider in world space
    pub fn bounds(&self) -> Aabb {
        Aabb::from_center(self.origin, self.half_extents())
    }

    /// Lowest point of the body collider
    pub fn feet(&self) -> Vec3 {
        self.origin - Vec3::new(0.0, self.collider_height * 0.5, 0.0)
    }

    /// Facing direction including pitch (yaw 0 looks down +Z, positive pitch looks down)
    pub fn view_forward(&self) -> Vec3 {
        let pitch = self.view_angles.x.to_radians();
        let yaw = self.view_angles.y.to_radians();
        Vec3::new(pitch.cos() * yaw.sin(), -pitch.sin(), pitch.cos() * yaw.cos())
    }

    /// Facing direction flattened onto the horizontal plane
    pub fn flat_forward(&self) -> Vec3 {
        let yaw = self.view_angles.y.to_radians();
        Vec3::new(yaw.sin(), 0.0, yaw.cos())
    }

    pub fn flat_right(&self) -> Vec3 {
        let yaw = self.view_angles.y.to_radians();
        Vec3::new(yaw.cos(), 0.0, -yaw.sin())
    }
}

/// Engine-facing transform of the character body. Anything outside the tick
/// may move it; the next tick folds that movement into `origin`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Transform {
    pub position: Vec3,
}

/// Eye placement relative to the body
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewpoint {
    pub local_offset: Vec3,
}

impl Viewpoint {
    pub fn at_height(height: f32) -> Self {
        Self {
            local_offset: Vec3::new(0.0, height, 0.0),
        }
    }
}
