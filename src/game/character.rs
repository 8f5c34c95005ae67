//! A simulated player character and its builder

use std::sync::Arc;

use glam::Vec3;
use tracing::debug;
use uuid::Uuid;

use crate::ws::protocol::CharacterSnapshot;

use super::authority::{Authorized, NetRole};
use super::environment::{CameraWaterProbe, EnvironmentSampler, ViewpointSensor};
use super::events::{EventBuffer, TriggerEvent};
use super::impact::CollisionEvent;
use super::input::{InputFrame, InputHistory};
use super::integrator::MovementIntegrator;
use super::interaction::{
    CollisionLayer, InteractionEffect, InteractionOutcome, InteractionProbe, SceneQuery, DEFAULT_MAX_USE_DISTANCE,
    USE_DISTANCE_RANGE,
};
use super::kinematic::{KinematicState, MoveGeometry, Transform, Viewpoint};
use super::movement_config::{CharacterFeatures, MovementConfig};
use super::pipeline::{TickContext, TickInput, TickPipeline, TickReport};
use super::vitality::{damage_feedback, ViewPunch, VitalityEvent, VitalityModel, DEFAULT_HEALTH};

/// Character assembly errors. A character that fails to build never ticks.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum SetupError {
    #[error("Character has no viewpoint")]
    MissingViewpoint,

    #[error("Character has no movement integrator")]
    MissingIntegrator,

    #[error("Character has no viewpoint sensor")]
    MissingViewpointSensor,

    #[error("Invalid collider: {0}")]
    InvalidCollider(&'static str),

    #[error("Max use distance {0} is out of range")]
    InvalidUseDistance(f32),
}

/// Result of one authoritative character tick
#[derive(Debug, Clone, Default)]
pub struct CharacterTick {
    pub report: TickReport,
    pub interaction: Option<InteractionOutcome>,
    /// Where a trigger or interaction teleported the character to
    pub teleported_to: Option<Vec3>,
}

/// Assembles a [`Character`]
pub struct CharacterBuilder {
    user_id: Uuid,
    role: NetRole,
    config: Arc<MovementConfig>,
    features: CharacterFeatures,
    collider_size: Vec3,
    weight: f32,
    push_force: f32,
    crouching_height_multiplier: f32,
    crouching_speed: f32,
    viewpoint: Option<Viewpoint>,
    integrator: Option<Box<dyn MovementIntegrator>>,
    sensor: Option<Arc<dyn ViewpointSensor>>,
    max_use_distance: f32,
    health: f32,
    health_ceiling: Option<f32>,
    spawn: Vec3,
}

impl CharacterBuilder {
    pub fn new(user_id: Uuid, role: NetRole) -> Self {
        Self {
            user_id,
            role,
            config: Arc::new(MovementConfig::default()),
            features: CharacterFeatures::default(),
            collider_size: Vec3::new(1.0, 2.0, 1.0),
            weight: 75.0,
            push_force: 2.0,
            crouching_height_multiplier: 0.5,
            crouching_speed: 10.0,
            viewpoint: None,
            integrator: None,
            sensor: None,
            max_use_distance: DEFAULT_MAX_USE_DISTANCE,
            health: DEFAULT_HEALTH,
            health_ceiling: None,
            spawn: Vec3::ZERO,
        }
    }

    pub fn config(mut self, config: Arc<MovementConfig>) -> Self {
        self.config = config;
        self
    }

    pub fn features(mut self, features: CharacterFeatures) -> Self {
        self.features = features;
        self
    }

    /// Width, height and depth of the box collider
    pub fn collider_size(mut self, size: Vec3) -> Self {
        self.collider_size = size;
        self
    }

    pub fn weight(mut self, weight: f32) -> Self {
        self.weight = weight;
        self
    }

    pub fn push_force(mut self, push_force: f32) -> Self {
        self.push_force = push_force;
        self
    }

    /// Crouched height as a fraction of standing height, and the rate to get there
    pub fn crouching(mut self, height_multiplier: f32, speed: f32) -> Self {
        self.crouching_height_multiplier = height_multiplier;
        self.crouching_speed = speed;
        self
    }

    pub fn viewpoint(mut self, viewpoint: Viewpoint) -> Self {
        self.viewpoint = Some(viewpoint);
        self
    }

    pub fn integrator(mut self, integrator: Box<dyn MovementIntegrator>) -> Self {
        self.integrator = Some(integrator);
        self
    }

    pub fn viewpoint_sensor(mut self, sensor: Arc<dyn ViewpointSensor>) -> Self {
        self.sensor = Some(sensor);
        self
    }

    pub fn max_use_distance(mut self, distance: f32) -> Self {
        self.max_use_distance = distance;
        self
    }

    pub fn health(mut self, health: f32, ceiling: Option<f32>) -> Self {
        self.health = health;
        self.health_ceiling = ceiling;
        self
    }

    /// Collider centre at spawn
    pub fn spawn_at(mut self, origin: Vec3) -> Self {
        self.spawn = origin;
        self
    }

    pub fn build(self) -> Result<Character, SetupError> {
        if !self.collider_size.is_finite() || self.collider_size.min_element() <= 0.0 {
            return Err(SetupError::InvalidCollider("size must be positive"));
        }
        if !(self.crouching_height_multiplier > 0.0 && self.crouching_height_multiplier <= 1.0) {
            return Err(SetupError::InvalidCollider("crouching height multiplier must be in (0, 1]"));
        }
        if !USE_DISTANCE_RANGE.contains(&self.max_use_distance) {
            return Err(SetupError::InvalidUseDistance(self.max_use_distance));
        }
        let viewpoint = self.viewpoint.ok_or(SetupError::MissingViewpoint)?;
        let integrator = self.integrator.ok_or(SetupError::MissingIntegrator)?;
        let sensor = self.sensor.ok_or(SetupError::MissingViewpointSensor)?;

        let geometry = MoveGeometry {
            default_height: self.collider_size.y,
            crouching_height: self.crouching_height_multiplier,
            crouching_speed: self.crouching_speed,
            slope_limit: self.config.slope_limit,
            step_offset: self.features.step_offset,
            use_step_offset: self.features.use_step_offset,
        };
        let state = KinematicState::new(
            self.spawn,
            geometry,
            (self.collider_size.x, self.collider_size.z),
            viewpoint.local_offset,
        );

        let camera_probe = CameraWaterProbe::new(sensor, state.eye_position());
        let pipeline = TickPipeline::new(
            self.config,
            self.features,
            integrator,
            camera_probe,
            self.role,
            self.spawn,
        );

        Ok(Character {
            user_id: self.user_id,
            role: self.role,
            state,
            transform: Transform { position: self.spawn },
            sampler: EnvironmentSampler::new(),
            vitality: VitalityModel::new(self.health).with_ceiling(self.health_ceiling),
            pipeline,
            inputs: InputHistory::default(),
            view_angles: Vec3::ZERO,
            events: EventBuffer::default(),
            interaction: InteractionProbe::new(self.max_use_distance, CollisionLayer::PLAYER),
            weight: self.weight,
            push_force: self.push_force,
            last_input_seq: 0,
        })
    }
}

/// One player's body: kinematic state, health, buffered events and the
/// pipeline that advances them.
pub struct Character {
    user_id: Uuid,
    role: NetRole,
    state: KinematicState,
    transform: Transform,
    sampler: EnvironmentSampler,
    vitality: VitalityModel,
    pipeline: TickPipeline,
    inputs: InputHistory,
    view_angles: Vec3,
    events: EventBuffer,
    interaction: InteractionProbe,
    weight: f32,
    push_force: f32,
    last_input_seq: u32,
}

impl Character {
    pub fn builder(user_id: Uuid, role: NetRole) -> CharacterBuilder {
        CharacterBuilder::new(user_id, role)
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub fn role(&self) -> NetRole {
        self.role
    }

    pub fn state(&self) -> &KinematicState {
        &self.state
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn health(&self) -> f32 {
        self.vitality.health()
    }

    pub fn weight(&self) -> f32 {
        self.weight
    }

    pub fn push_force(&self) -> f32 {
        self.push_force
    }

    pub fn last_input_seq(&self) -> u32 {
        self.last_input_seq
    }

    pub fn interaction(&self) -> &InteractionProbe {
        &self.interaction
    }

    pub fn tracked_volumes(&self) -> usize {
        self.sampler.len()
    }

    // ========================================================================
    // Input
    // ========================================================================

    /// Record a client frame. Frames whose sequence number does not increase
    /// are stale and dropped.
    pub fn receive_input(&mut self, seq: u32, frame: InputFrame, view_angles: Vec3) -> bool {
        if seq <= self.last_input_seq {
            return false;
        }
        self.last_input_seq = seq;
        self.inputs.receive(frame.sanitized());
        if view_angles.is_finite() {
            self.view_angles = view_angles;
        }
        true
    }

    /// Zero every movement intent and forget held keys
    pub fn disable_input(&mut self) {
        self.inputs.reset();
        self.pipeline.clear_latches();
        self.state.forward_move = 0.0;
        self.state.side_move = 0.0;
        self.state.vertical_axis = 0.0;
        self.state.horizontal_axis = 0.0;
        self.state.wish_jump = false;
    }

    // ========================================================================
    // Events
    // ========================================================================

    /// Buffer an overlap change for the next tick. Only the authority ticks,
    /// so other instances drop it.
    pub fn queue_trigger(&mut self, event: TriggerEvent) {
        let events = &mut self.events;
        self.role.authorize("queue_trigger", |_| events.push_trigger(event));
    }

    pub fn queue_collision(&mut self, event: CollisionEvent) {
        let events = &mut self.events;
        self.role.authorize("queue_collision", |_| events.push_collision(event));
    }

    // ========================================================================
    // Tick
    // ========================================================================

    /// Run one authoritative tick and the use probe. No-op off the authority.
    pub fn tick(&mut self, scene: &dyn SceneQuery, dt: f32) -> Option<CharacterTick> {
        let role = self.role;
        role.authorize("tick", |auth| self.run_tick(auth, scene, dt))
    }

    fn run_tick(&mut self, auth: Authorized, scene: &dyn SceneQuery, dt: f32) -> CharacterTick {
        let events = self.events.drain();
        let input = TickInput {
            previous: self.inputs.previous(),
            current: self.inputs.latest(),
            view_angles: self.view_angles,
            dt,
        };
        let ctx = TickContext {
            state: &mut self.state,
            transform: &mut self.transform,
            sampler: &mut self.sampler,
            vitality: &mut self.vitality,
        };
        let report = self.pipeline.tick(auth, ctx, input, events);

        let interact_held = self.inputs.latest().interact;
        self.inputs.advance();

        let mut result = CharacterTick {
            report,
            ..Default::default()
        };

        if let Some(target) = result.report.teleport {
            self.apply_teleport(auth, target.destination, target.reset_velocity);
            result.teleported_to = Some(target.destination);
        }

        result.interaction = self.interaction.update(
            scene,
            self.user_id,
            self.state.eye_position(),
            self.state.view_forward(),
            interact_held,
        );

        if let Some(outcome) = &result.interaction {
            debug!(user_id = %self.user_id, entity = outcome.entity, repeated = outcome.repeated, "Interaction");
            match outcome.effect {
                InteractionEffect::None => {}
                InteractionEffect::Heal(amount) => self.vitality.heal(auth, amount),
                InteractionEffect::Damage {
                    amount,
                    presentation_hint,
                } => self.vitality.damage(auth, amount, presentation_hint),
                InteractionEffect::Teleport {
                    position,
                    reset_velocity,
                } => {
                    self.apply_teleport(auth, position, reset_velocity);
                    result.teleported_to = Some(position);
                }
            }
        }

        result
    }

    // ========================================================================
    // Authority-gated mutations
    // ========================================================================

    fn apply_teleport(&mut self, _auth: Authorized, position: Vec3, reset_velocity: bool) {
        self.state.origin = position;
        self.transform.position = position;
        self.pipeline.rebase(position);
        if reset_velocity {
            self.state.velocity = Vec3::ZERO;
            self.state.falling_velocity = 0.0;
        }
    }

    /// Move the body instantly. Returns false off the authority.
    pub fn teleport(&mut self, position: Vec3, reset_velocity: bool) -> bool {
        let role = self.role;
        role.authorize("teleport", |auth| self.apply_teleport(auth, position, reset_velocity))
            .is_some()
    }

    pub fn add_velocity(&mut self, delta: Vec3) -> bool {
        let state = &mut self.state;
        self.role
            .authorize("add_velocity", |_| state.velocity += delta)
            .is_some()
    }

    /// Nudge the transform; the next tick folds it into `origin`
    pub fn add_position(&mut self, delta: Vec3) -> bool {
        let transform = &mut self.transform;
        self.role
            .authorize("add_position", |_| transform.position += delta)
            .is_some()
    }

    pub fn damage(&mut self, amount: f32, presentation_hint: bool) -> bool {
        let vitality = &mut self.vitality;
        self.role
            .authorize("damage", |auth| vitality.damage(auth, amount, presentation_hint))
            .is_some()
    }

    pub fn heal(&mut self, amount: f32) -> bool {
        let vitality = &mut self.vitality;
        self.role.authorize("heal", |auth| vitality.heal(auth, amount)).is_some()
    }

    /// Back to a spawn point at full health, with no held keys
    pub fn respawn(&mut self, origin: Vec3) -> bool {
        let role = self.role;
        role.authorize("respawn", |auth| {
            self.apply_teleport(auth, origin, true);
            self.vitality.restore(auth, DEFAULT_HEALTH);
            self.disable_input();
            self.state.crouching = false;
            self.state.collider_height = self.state.geometry.default_height;
            self.state.view_offset = self.state.default_view_offset;
        })
        .is_some()
    }

    /// Take the health notifications produced since the last drain
    pub fn drain_vitality_events(&mut self) -> Vec<VitalityEvent> {
        self.vitality.drain_events()
    }

    // ========================================================================
    // Replication
    // ========================================================================

    pub fn snapshot(&self) -> CharacterSnapshot {
        CharacterSnapshot {
            user_id: self.user_id,
            origin: self.state.origin,
            velocity: self.state.velocity,
            view_angles: self.state.view_angles,
            crouching: self.state.crouching,
            grounded: self.state.grounded,
            underwater: self.state.underwater,
            camera_underwater: self.state.camera_underwater,
            health: self.vitality.health(),
            last_input_seq: self.last_input_seq,
        }
    }

    /// Render a replicated snapshot. The authority owns its state and ignores these.
    pub fn apply_snapshot(&mut self, snapshot: &CharacterSnapshot) -> bool {
        if self.role.is_authority() || snapshot.user_id != self.user_id {
            return false;
        }
        self.state.origin = snapshot.origin;
        self.state.velocity = snapshot.velocity;
        self.state.view_angles = snapshot.view_angles;
        self.state.crouching = snapshot.crouching;
        self.state.grounded = snapshot.grounded;
        self.state.underwater = snapshot.underwater;
        self.state.camera_underwater = snapshot.camera_underwater;
        self.transform.position = snapshot.origin;
        self.vitality.apply_replicated(snapshot.health);
        true
    }

    /// Owning client's reaction to a damage notification
    pub fn receive_damage_notification(&self, presentation_hint: bool) -> Option<ViewPunch> {
        damage_feedback(self.role, presentation_hint)
    }
}
