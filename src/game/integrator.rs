//! Movement integration capability and the reference surf integrator
//!
//! The tick pipeline only knows [`MovementIntegrator`]. [`SurfIntegrator`]
//! is the quake-style implementation the server runs: ground friction and
//! acceleration, capped air acceleration (what makes surfing and strafing
//! work), gravity, jumping, swimming and crouch height interpolation, moved
//! through a world of axis-aligned solids.

use std::sync::Arc;

use glam::Vec3;

use super::geometry::Aabb;
use super::kinematic::KinematicState;
use super::movement_config::{CharacterFeatures, MovementConfig};

/// How far below the feet ground is still considered touching
const GROUND_PROBE: f32 = 0.05;

/// Advances a character's kinematic state. Called by the tick pipeline with
/// exclusive access to the state for the duration of the call.
pub trait MovementIntegrator: Send {
    /// Move the collider height towards the current stance
    fn crouch(&mut self, state: &mut KinematicState, config: &MovementConfig, dt: f32);

    /// Apply acceleration, friction, gravity, ground detection and stepping
    fn process_movement(&mut self, state: &mut KinematicState, config: &MovementConfig, dt: f32);
}

/// Walkable surface found under a body
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroundContact {
    pub height: f32,
    pub normal: Vec3,
}

/// Static collision geometry the integrator moves through
pub trait SolidGeometry: Send + Sync {
    fn overlaps_solid(&self, bounds: &Aabb) -> bool;

    /// Highest surface under `bounds` whose top is at most `reach` below its bottom
    fn ground_below(&self, bounds: &Aabb, reach: f32) -> Option<GroundContact>;
}

/// Quake-style walk/air/swim movement
pub struct SurfIntegrator {
    world: Arc<dyn SolidGeometry>,
    features: CharacterFeatures,
}

impl SurfIntegrator {
    pub fn new(world: Arc<dyn SolidGeometry>, features: CharacterFeatures) -> Self {
        Self { world, features }
    }

    // ========================================================================
    // Ground detection
    // ========================================================================

    fn check_ground(&self, state: &mut KinematicState) {
        // Moving upward (just jumped or pushed): never grounded
        if state.velocity.y > 0.0 {
            state.grounded = false;
            return;
        }

        let contact = self
            .world
            .ground_below(&state.bounds(), GROUND_PROBE)
            .filter(|contact| contact.normal.angle_between(Vec3::Y).to_degrees() <= state.geometry.slope_limit);

        match contact {
            Some(contact) => {
                state.grounded = true;
                state.origin.y = contact.height + state.collider_height * 0.5;
                state.velocity.y = 0.0;
            }
            None => state.grounded = false,
        }
    }

    // ========================================================================
    // Movement modes
    // ========================================================================

    fn wish(&self, state: &KinematicState, config: &MovementConfig, forward: Vec3) -> (Vec3, f32) {
        let wish = forward * state.forward_move + state.flat_right() * state.side_move;
        let direction = wish.normalize_or_zero();
        if direction == Vec3::ZERO {
            return (Vec3::ZERO, 0.0);
        }

        let speed = if state.crouching {
            config.crouch_speed
        } else if state.sprinting {
            config.sprint_speed
        } else {
            config.walk_speed
        };
        (direction, speed)
    }

    fn ground_move(&self, state: &mut KinematicState, config: &MovementConfig, dt: f32) {
        let (direction, speed) = self.wish(state, config, state.flat_forward());

        if state.wish_jump {
            // No friction on the jump tick, so hopping keeps speed
            let acceleration = if state.crouching { config.crouch_acceleration } else { config.acceleration };
            accelerate(&mut state.velocity, direction, speed, acceleration, dt);

            state.velocity.y = config.jump_force;
            state.grounded = false;
            if !config.auto_bhop {
                state.wish_jump = false;
            }
            return;
        }

        let horizontal_speed = Vec3::new(state.velocity.x, 0.0, state.velocity.z).length();
        let (friction, deceleration, acceleration) = if state.crouching {
            let friction = if self.features.sliding_enabled && horizontal_speed > config.crouch_speed {
                config.slide_friction
            } else {
                config.crouch_friction
            };
            (friction, config.crouch_deceleration, config.crouch_acceleration)
        } else {
            (config.friction, config.deceleration, config.acceleration)
        };

        apply_friction(&mut state.velocity, friction, deceleration, dt, false);
        accelerate(&mut state.velocity, direction, speed, acceleration, dt);
        state.velocity.y = 0.0;
    }

    fn air_move(&self, state: &mut KinematicState, config: &MovementConfig, dt: f32) {
        let (direction, speed) = self.wish(state, config, state.flat_forward());
        air_accelerate(&mut state.velocity, direction, speed, config, dt);
        state.velocity.y -= config.gravity * dt;
    }

    fn water_move(&self, state: &mut KinematicState, config: &MovementConfig, dt: f32) {
        let (direction, _) = self.wish(state, config, state.view_forward());
        apply_friction(&mut state.velocity, config.swim_friction, config.deceleration, dt, true);
        accelerate(&mut state.velocity, direction, config.swim_speed, config.acceleration, dt);

        if state.wish_jump {
            state.velocity.y = state.velocity.y.max(config.swim_up_speed);
        }
        state.velocity.y -= config.gravity * config.underwater_gravity * dt;
    }

    // ========================================================================
    // Collision
    // ========================================================================

    fn blocked(&self, center: Vec3, half: Vec3) -> bool {
        self.world.overlaps_solid(&Aabb::from_center(center, half))
    }

    fn slide(&self, state: &mut KinematicState, dt: f32) {
        let delta = state.velocity * dt;
        let half = state.half_extents();

        for axis in [0usize, 2] {
            if delta[axis] == 0.0 {
                continue;
            }
            let mut offset = Vec3::ZERO;
            offset[axis] = delta[axis];
            let moved = state.origin + offset;

            if !self.blocked(moved, half) {
                state.origin = moved;
                continue;
            }

            if state.geometry.use_step_offset && state.grounded {
                let stepped = moved + Vec3::new(0.0, state.geometry.step_offset, 0.0);
                if !self.blocked(stepped, half) {
                    state.origin = stepped;
                    continue;
                }
            }

            state.velocity[axis] = 0.0;
        }

        if delta.y < 0.0 {
            let bounds = Aabb::from_center(state.origin, half);
            let landing = self
                .world
                .ground_below(&bounds, -delta.y + GROUND_PROBE)
                .filter(|contact| state.origin.y + delta.y - half.y <= contact.height);

            match landing {
                Some(contact) => {
                    state.origin.y = contact.height + half.y;
                    state.velocity.y = 0.0;
                }
                None => state.origin.y += delta.y,
            }
        } else if delta.y > 0.0 {
            let moved = state.origin + Vec3::new(0.0, delta.y, 0.0);
            if self.blocked(moved, half) {
                state.velocity.y = 0.0;
            } else {
                state.origin = moved;
            }
        }
    }
}

impl MovementIntegrator for SurfIntegrator {
    fn crouch(&mut self, state: &mut KinematicState, _config: &MovementConfig, dt: f32) {
        let standing = state.geometry.default_height;
        let crouched = state.geometry.crouched_height();
        let target = if state.crouching { crouched } else { standing };
        let current = state.collider_height;

        let next = move_towards(current, target, state.geometry.crouching_speed * dt);
        if next == current {
            return;
        }

        // Grounded bodies keep their feet planted; airborne ones tuck their legs
        let center_shift = if state.grounded { (next - current) * 0.5 } else { 0.0 };

        if next > current {
            let half = Vec3::new(
                state.collider_footprint.0 * 0.5,
                next * 0.5,
                state.collider_footprint.1 * 0.5,
            );
            if self.blocked(state.origin + Vec3::new(0.0, center_shift, 0.0), half) {
                return;
            }
        }

        state.origin.y += center_shift;
        state.collider_height = next;
        state.view_offset = state.default_view_offset - Vec3::new(0.0, (standing - next) * 0.5, 0.0);
    }

    fn process_movement(&mut self, state: &mut KinematicState, config: &MovementConfig, dt: f32) {
        if !dt.is_finite() || dt <= 0.0 {
            return;
        }

        self.check_ground(state);

        if state.underwater {
            self.water_move(state, config, dt);
        } else if state.grounded {
            self.ground_move(state, config, dt);
        } else {
            self.air_move(state, config, dt);
        }

        state.velocity = state
            .velocity
            .clamp(Vec3::splat(-config.max_velocity), Vec3::splat(config.max_velocity));

        self.slide(state, dt);
        self.check_ground(state);
    }
}

// ============================================================================
// Shared helpers
// ============================================================================

fn move_towards(current: f32, target: f32, max_step: f32) -> f32 {
    if (target - current).abs() <= max_step {
        target
    } else {
        current + (target - current).signum() * max_step
    }
}

fn apply_friction(velocity: &mut Vec3, friction: f32, deceleration: f32, dt: f32, include_vertical: bool) {
    let affected = if include_vertical {
        *velocity
    } else {
        Vec3::new(velocity.x, 0.0, velocity.z)
    };
    let speed = affected.length();
    if speed < 1e-4 {
        velocity.x = 0.0;
        velocity.z = 0.0;
        if include_vertical {
            velocity.y = 0.0;
        }
        return;
    }

    let control = speed.max(deceleration);
    let new_speed = (speed - control * friction * dt).max(0.0);
    let scale = new_speed / speed;

    velocity.x *= scale;
    velocity.z *= scale;
    if include_vertical {
        velocity.y *= scale;
    }
}

fn accelerate(velocity: &mut Vec3, direction: Vec3, wish_speed: f32, acceleration: f32, dt: f32) {
    if direction == Vec3::ZERO {
        return;
    }
    let add_speed = wish_speed - velocity.dot(direction);
    if add_speed <= 0.0 {
        return;
    }
    let accel_speed = (acceleration * dt * wish_speed).min(add_speed);
    *velocity += direction * accel_speed;
}

fn air_accelerate(velocity: &mut Vec3, direction: Vec3, wish_speed: f32, config: &MovementConfig, dt: f32) {
    if direction == Vec3::ZERO {
        return;
    }
    let capped = wish_speed.min(config.air_cap);
    let add_speed = capped - velocity.dot(direction);
    if add_speed <= 0.0 {
        return;
    }
    let accel_speed = (config.air_acceleration * wish_speed * dt).min(add_speed);
    *velocity += direction * accel_speed;
}
