//! Movement tuning and per-character feature toggles

use serde::{Deserialize, Serialize};

/// Movement tuning shared by the tick pipeline and the integrator.
/// Loaded once at startup and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MovementConfig {
    // Jumping and gravity
    pub gravity: f32,
    pub jump_force: f32,
    /// Holding jump re-jumps on every landing
    pub auto_bhop: bool,
    /// Gravity multiplier while the body is in liquid
    pub underwater_gravity: f32,

    // General
    /// Per-axis speed cap
    pub max_velocity: f32,
    pub max_step_offset: f32,
    pub slope_limit: f32,

    // Ground movement
    pub walk_speed: f32,
    pub sprint_speed: f32,
    /// Magnitude of the forward/side acceleration requests
    pub acceleration: f32,
    pub deceleration: f32,
    pub friction: f32,

    // Air movement
    pub air_cap: f32,
    pub air_acceleration: f32,
    pub air_friction: f32,

    // Crouching
    pub crouch_speed: f32,
    pub crouch_acceleration: f32,
    pub crouch_deceleration: f32,
    pub crouch_friction: f32,
    /// Ground friction while crouch-sliding, when sliding is enabled
    pub slide_friction: f32,

    // Swimming
    pub swim_speed: f32,
    pub swim_friction: f32,
    pub swim_up_speed: f32,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            gravity: 20.0,
            jump_force: 6.5,
            auto_bhop: true,
            underwater_gravity: 0.2,

            max_velocity: 50.0,
            max_step_offset: 0.2,
            slope_limit: 45.0,

            walk_speed: 7.0,
            sprint_speed: 12.0,
            acceleration: 14.0,
            deceleration: 10.0,
            friction: 6.0,

            air_cap: 0.4,
            air_acceleration: 12.0,
            air_friction: 0.4,

            crouch_speed: 4.0,
            crouch_acceleration: 8.0,
            crouch_deceleration: 4.0,
            crouch_friction: 3.0,
            slide_friction: 0.5,

            swim_speed: 5.0,
            swim_friction: 2.0,
            swim_up_speed: 3.5,
        }
    }
}

/// Feature switches fixed at spawn
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CharacterFeatures {
    pub crouching_enabled: bool,
    pub sliding_enabled: bool,
    pub ladders_enabled: bool,
    pub angled_ladders_enabled: bool,
    pub fall_damage_enabled: bool,
    pub use_step_offset: bool,
    pub step_offset: f32,
}

impl Default for CharacterFeatures {
    fn default() -> Self {
        Self {
            crouching_enabled: true,
            sliding_enabled: false,
            ladders_enabled: true,
            angled_ladders_enabled: true,
            fall_damage_enabled: true,
            use_step_offset: false,
            step_offset: 0.35,
        }
    }
}
