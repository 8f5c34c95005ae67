//! The authoritative per-character tick
//!
//! Every tick runs the same fixed sequence:
//!
//! 1. input normalization (axes to acceleration requests, edge latches)
//! 2. position correction (fold transform drift into `origin`)
//! 3. fall damage
//! 4. environment sampling, then impact absorption
//! 5. crouch arbitration
//! 6. movement integration
//! 7. reconciliation (write `origin` back, take the next baseline)

use std::sync::Arc;

use glam::Vec3;
use tracing::debug;

use super::authority::{Authorized, NetRole};
use super::environment::{CameraWaterProbe, EnvironmentSampler, TeleportTarget};
use super::events::{DrainedEvents, TriggerEvent};
use super::impact::ImpactAbsorber;
use super::input::{axis_sign, EdgeLatch, InputFrame};
use super::integrator::MovementIntegrator;
use super::kinematic::{KinematicState, Transform};
use super::movement_config::{CharacterFeatures, MovementConfig};
use super::vitality::{ViewPunch, VitalityModel};

/// Vertical velocity change above which a landing hurts
pub const FALL_DAMAGE_THRESHOLD: f32 = 20.0;
/// Damage dealt by a qualifying landing
pub const FALL_DAMAGE: f32 = 10.0;
/// Divisor turning the velocity change into view punch pitch
const FALL_PUNCH_SCALE: f32 = 15.0;

/// Mutable per-character state a tick works on
pub struct TickContext<'a> {
    pub state: &'a mut KinematicState,
    pub transform: &'a mut Transform,
    pub sampler: &'a mut EnvironmentSampler,
    pub vitality: &'a mut VitalityModel,
}

/// The input samples a tick consumes
#[derive(Debug, Clone, Copy)]
pub struct TickInput<'a> {
    pub previous: &'a InputFrame,
    pub current: &'a InputFrame,
    pub view_angles: Vec3,
    pub dt: f32,
}

/// What happened during a tick, for the host to act on
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    /// Velocity change of a landing that dealt fall damage
    pub fall_damage: Option<f32>,
    /// Presentation-only recoil for the locally controlled view
    pub view_punch: Option<ViewPunch>,
    /// Contacts with a massive body that changed the velocity
    pub impacts_absorbed: usize,
    /// Destination of a teleport trigger entered this tick
    pub teleport: Option<TeleportTarget>,
}

/// Runs the fixed tick sequence for one character
pub struct TickPipeline {
    config: Arc<MovementConfig>,
    features: CharacterFeatures,
    integrator: Box<dyn MovementIntegrator>,
    camera_probe: CameraWaterProbe,
    role: NetRole,
    jump_latch: EdgeLatch,
    crouch_latch: EdgeLatch,
    /// Transform position at the end of the previous tick
    baseline: Vec3,
}

impl TickPipeline {
    pub fn new(
        config: Arc<MovementConfig>,
        features: CharacterFeatures,
        integrator: Box<dyn MovementIntegrator>,
        camera_probe: CameraWaterProbe,
        role: NetRole,
        spawn: Vec3,
    ) -> Self {
        Self {
            config,
            features,
            integrator,
            camera_probe,
            role,
            jump_latch: EdgeLatch::new(),
            crouch_latch: EdgeLatch::new(),
            baseline: spawn,
        }
    }

    pub fn config(&self) -> &MovementConfig {
        &self.config
    }

    pub fn features(&self) -> &CharacterFeatures {
        &self.features
    }

    pub fn jump_latch(&self) -> EdgeLatch {
        self.jump_latch
    }

    pub fn baseline(&self) -> Vec3 {
        self.baseline
    }

    /// Accept `position` as the new baseline so a teleport is not folded in
    /// again as drift
    pub fn rebase(&mut self, position: Vec3) {
        self.baseline = position;
    }

    /// Drop any half-observed presses
    pub fn clear_latches(&mut self) {
        self.jump_latch.clear();
        self.crouch_latch.clear();
    }

    pub fn tick(
        &mut self,
        auth: Authorized,
        ctx: TickContext<'_>,
        input: TickInput<'_>,
        events: DrainedEvents,
    ) -> TickReport {
        let TickContext {
            state,
            transform,
            sampler,
            vitality,
        } = ctx;
        let mut report = TickReport::default();

        self.normalize_input(state, &input);
        self.correct_position(state, transform);
        self.check_fall_damage(auth, state, vitality, &mut report);
        self.sample_environment(state, sampler, events, &mut report);

        if self.features.crouching_enabled {
            self.integrator.crouch(state, &self.config, input.dt);
        }

        self.integrator.process_movement(state, &self.config, input.dt);
        if self.jump_latch.is_armed() && !state.wish_jump {
            self.jump_latch.consume();
        }

        transform.position = state.origin;
        self.baseline = state.origin;

        report
    }

    // ========================================================================
    // Steps
    // ========================================================================

    fn normalize_input(&mut self, state: &mut KinematicState, input: &TickInput<'_>) {
        let previous = input.previous;
        let current = input.current;

        if input.view_angles.is_finite() {
            state.view_angles = input.view_angles;
        }

        state.vertical_axis = current.move_forward;
        state.horizontal_axis = current.move_right;
        state.forward_move = axis_sign(current.move_forward) * self.config.acceleration;
        state.side_move = axis_sign(current.move_right) * self.config.acceleration;
        state.sprinting = current.sprint;

        state.wish_jump = self.jump_latch.update(previous.jump, current.jump);

        if self.features.crouching_enabled {
            state.crouching = self.crouch_latch.update(previous.crouch, current.crouch);
        } else {
            self.crouch_latch.clear();
            state.crouching = false;
        }

        if !self.features.ladders_enabled {
            state.climbing_ladder = false;
        }
    }

    fn correct_position(&self, state: &mut KinematicState, transform: &mut Transform) {
        state.origin += transform.position - self.baseline;
        transform.position = self.baseline;
    }

    fn check_fall_damage(
        &self,
        auth: Authorized,
        state: &mut KinematicState,
        vitality: &mut VitalityModel,
        report: &mut TickReport,
    ) {
        let fall_diff = state.velocity.y - state.falling_velocity;

        if self.features.fall_damage_enabled && fall_diff > FALL_DAMAGE_THRESHOLD && state.grounded {
            vitality.damage(auth, FALL_DAMAGE, false);
            report.fall_damage = Some(fall_diff);

            if self.role.is_locally_controlled() {
                report.view_punch = Some(ViewPunch {
                    pitch: -3.0 * fall_diff / FALL_PUNCH_SCALE,
                    yaw: 0.0,
                });
            }
            debug!(fall_diff, "Fall damage");
        }

        state.falling_velocity = state.velocity.y;
    }

    fn sample_environment(
        &mut self,
        state: &mut KinematicState,
        sampler: &mut EnvironmentSampler,
        events: DrainedEvents,
        report: &mut TickReport,
    ) {
        for event in events.triggers {
            match event {
                TriggerEvent::Enter(volume) => {
                    if sampler.enter(&volume) {
                        if let Some(target) = volume.teleport_target() {
                            report.teleport = Some(target);
                        }
                    }
                }
                TriggerEvent::Exit(volume) => {
                    sampler.exit(&volume);
                }
            }
        }

        state.underwater = sampler.sample();
        state.camera_underwater = self.camera_probe.sample();
        self.camera_probe.follow(state.eye_position());

        for collision in &events.collisions {
            if let Some(velocity) = ImpactAbsorber::apply(state.velocity, collision) {
                state.velocity = velocity;
                report.impacts_absorbed += 1;
            }
        }
    }
}
