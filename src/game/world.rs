//! World state and authoritative tick loop

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use glam::Vec3;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{broadcast, mpsc};
use tokio::time::interval;
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use crate::util::time::{tick_delta, SIMULATION_TPS, SNAPSHOT_TPS};
use crate::ws::protocol::{ClientMsg, GameEvent, ServerMsg};

use super::authority::NetRole;
use super::character::{Character, SetupError};
use super::impact::CollisionEvent;
use super::input::InputFrame;
use super::integrator::SurfIntegrator;
use super::kinematic::Viewpoint;
use super::level::{Level, OverlapTracker};
use super::movement_config::{CharacterFeatures, MovementConfig};
use super::pipeline::FALL_DAMAGE;
use super::snapshot::SnapshotBuilder;
use super::vitality::VitalityEvent;
use super::PlayerInput;

/// Standing collider of every player
const COLLIDER_SIZE: Vec3 = Vec3::new(1.0, 2.0, 1.0);
/// Eye height above the collider centre
const EYE_OFFSET: f32 = 0.6;

/// Everything needed to start a world
#[derive(Clone)]
pub struct WorldSettings {
    pub level: Arc<Level>,
    pub movement: Arc<MovementConfig>,
    pub features: CharacterFeatures,
    pub max_players: usize,
    /// Seed for spawn point selection
    pub seed: u64,
}

/// A connected player's character plus host-side bookkeeping
pub struct PlayerEntry {
    pub display_name: String,
    pub character: Character,
    overlaps: OverlapTracker,
}

/// World state (owned by the world task)
pub struct WorldState {
    pub tick: u64,
    pub players: HashMap<Uuid, PlayerEntry>,
    pub rng: ChaCha8Rng,
    pub max_players: usize,
}

impl WorldState {
    pub fn new(seed: u64, max_players: usize) -> Self {
        Self {
            tick: 0,
            players: HashMap::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            max_players,
        }
    }

    /// Collider centre above a random spawn point
    pub fn pick_spawn(&mut self, level: &Level) -> Vec3 {
        let points = level.spawn_points();
        let feet = if points.is_empty() {
            Vec3::new(0.0, level.floor_height(), 0.0)
        } else {
            points[self.rng.gen_range(0..points.len())]
        };
        feet + Vec3::new(0.0, COLLIDER_SIZE.y * 0.5, 0.0)
    }
}

/// Handle to the running world
#[derive(Clone)]
pub struct WorldHandle {
    pub input_tx: mpsc::Sender<PlayerInput>,
    pub snapshot_tx: broadcast::Sender<ServerMsg>,
    pub player_count: Arc<AtomicUsize>,
}

impl WorldHandle {
    pub fn player_count(&self) -> usize {
        self.player_count.load(Ordering::Relaxed)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerMsg> {
        self.snapshot_tx.subscribe()
    }
}

/// The authoritative world
pub struct World {
    state: WorldState,
    settings: WorldSettings,
    input_rx: mpsc::Receiver<PlayerInput>,
    snapshot_tx: broadcast::Sender<ServerMsg>,
    snapshot_builder: SnapshotBuilder,
    player_count: Arc<AtomicUsize>,
    /// Events gathered since the last snapshot
    pending_events: Vec<GameEvent>,
}

impl World {
    pub fn new(settings: WorldSettings) -> (Self, WorldHandle) {
        let (input_tx, input_rx) = mpsc::channel(256);
        let (snapshot_tx, _) = broadcast::channel(64);
        let player_count = Arc::new(AtomicUsize::new(0));

        let handle = WorldHandle {
            input_tx,
            snapshot_tx: snapshot_tx.clone(),
            player_count: player_count.clone(),
        };

        let snapshot_interval = (SIMULATION_TPS / SNAPSHOT_TPS).max(1);
        let world = Self {
            state: WorldState::new(settings.seed, settings.max_players),
            settings,
            input_rx,
            snapshot_tx,
            snapshot_builder: SnapshotBuilder::new(snapshot_interval),
            player_count,
            pending_events: Vec::new(),
        };

        (world, handle)
    }

    pub fn state(&self) -> &WorldState {
        &self.state
    }

    /// Run the authoritative tick loop until every input sender is dropped
    pub async fn run(mut self) {
        info!(level = %self.settings.level.name(), tps = SIMULATION_TPS, "World started");

        let tick_duration = Duration::from_micros(1_000_000 / SIMULATION_TPS as u64);
        let mut tick_interval = interval(tick_duration);
        tick_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tick_interval.tick().await;

            if !self.process_inputs() {
                info!("Input channel closed, stopping world");
                break;
            }

            self.run_tick();

            if self.snapshot_builder.should_send() {
                let events = std::mem::take(&mut self.pending_events);
                let snapshot = self.snapshot_builder.build(
                    self.state.tick,
                    self.state.players.values().map(|p| &p.character),
                    events,
                );

                // Broadcast to all connected clients
                let _ = self.snapshot_tx.send(snapshot);
            }
        }
    }

    /// Process all pending client messages. Returns false once no sender is left.
    fn process_inputs(&mut self) -> bool {
        loop {
            let input = match self.input_rx.try_recv() {
                Ok(input) => input,
                Err(TryRecvError::Empty) => return true,
                Err(TryRecvError::Disconnected) => return false,
            };

            match input.msg {
                ClientMsg::Join { display_name } => {
                    self.handle_join(input.user_id, display_name);
                }
                ClientMsg::Input {
                    seq,
                    frame,
                    view_angles,
                } => {
                    self.handle_input(input.user_id, seq, frame, view_angles);
                }
                ClientMsg::Respawn => {
                    self.handle_respawn(input.user_id);
                }
                ClientMsg::Ping { t } => {
                    let _ = self.snapshot_tx.send(ServerMsg::Pong {
                        user_id: input.user_id,
                        t,
                    });
                }
                ClientMsg::Leave => {
                    self.handle_leave(input.user_id);
                }
            }
        }
    }

    fn spawn_character(&self, user_id: Uuid, origin: Vec3) -> Result<Character, SetupError> {
        let level = self.settings.level.clone();
        Character::builder(user_id, NetRole::server())
            .config(self.settings.movement.clone())
            .features(self.settings.features)
            .collider_size(COLLIDER_SIZE)
            .viewpoint(Viewpoint::at_height(EYE_OFFSET))
            .integrator(Box::new(SurfIntegrator::new(level.clone(), self.settings.features)))
            .viewpoint_sensor(level)
            .spawn_at(origin)
            .build()
    }

    /// Handle player join request
    fn handle_join(&mut self, user_id: Uuid, display_name: Option<String>) {
        if self.state.players.contains_key(&user_id) {
            warn!(user_id = %user_id, "Player already in world");
            return;
        }

        if self.state.players.len() >= self.state.max_players {
            let _ = self.snapshot_tx.send(ServerMsg::Error {
                user_id,
                code: "world_full".to_string(),
                message: "World is full".to_string(),
            });
            return;
        }

        let origin = self.state.pick_spawn(&self.settings.level);
        let character = match self.spawn_character(user_id, origin) {
            Ok(character) => character,
            Err(e) => {
                error!(user_id = %user_id, error = %e, "Failed to spawn character");
                let _ = self.snapshot_tx.send(ServerMsg::Error {
                    user_id,
                    code: "spawn_failed".to_string(),
                    message: e.to_string(),
                });
                return;
            }
        };

        let display_name = display_name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| format!("Player_{}", &user_id.simple().to_string()[..8]));

        self.state.players.insert(
            user_id,
            PlayerEntry {
                display_name: display_name.clone(),
                character,
                overlaps: OverlapTracker::new(),
            },
        );
        self.player_count.store(self.state.players.len(), Ordering::Relaxed);

        let _ = self.snapshot_tx.send(ServerMsg::Spawned {
            user_id,
            display_name,
            origin,
        });
        self.snapshot_builder.force_next();

        info!(
            user_id = %user_id,
            player_count = self.state.players.len(),
            "Player joined world"
        );
    }

    /// Handle player input
    fn handle_input(&mut self, user_id: Uuid, seq: u32, frame: InputFrame, view_angles: Vec3) {
        if let Some(player) = self.state.players.get_mut(&user_id) {
            if !player.character.receive_input(seq, frame, view_angles) {
                trace!(user_id = %user_id, seq, "Dropped stale input");
            }
        }
    }

    fn handle_respawn(&mut self, user_id: Uuid) {
        let origin = self.state.pick_spawn(&self.settings.level);
        let Some(player) = self.state.players.get_mut(&user_id) else {
            return;
        };

        // The overlap tracker keeps its volumes so the next tick reports their exits
        player.character.respawn(origin);

        let _ = self.snapshot_tx.send(ServerMsg::Spawned {
            user_id,
            display_name: player.display_name.clone(),
            origin,
        });
        self.snapshot_builder.force_next();
        debug!(user_id = %user_id, "Player respawned");
    }

    /// Handle player leave
    fn handle_leave(&mut self, user_id: Uuid) {
        if self.state.players.remove(&user_id).is_some() {
            self.player_count.store(self.state.players.len(), Ordering::Relaxed);

            let _ = self.snapshot_tx.send(ServerMsg::PlayerLeft {
                user_id,
                reason: "disconnected".to_string(),
            });

            info!(user_id = %user_id, "Player left world");
        }
    }

    /// Run a single simulation tick
    fn run_tick(&mut self) {
        self.state.tick += 1;
        let dt = tick_delta();

        self.update_overlaps();
        self.apply_pushes();

        let level = self.settings.level.clone();
        for (user_id, player) in self.state.players.iter_mut() {
            let Some(tick) = player.character.tick(&*level, dt) else {
                continue;
            };

            if let Some(fall_speed) = tick.report.fall_damage {
                self.pending_events.push(GameEvent::FallDamage {
                    user_id: *user_id,
                    fall_speed,
                    damage: FALL_DAMAGE,
                });
            }

            if let Some(position) = tick.teleported_to {
                self.pending_events.push(GameEvent::Teleported {
                    user_id: *user_id,
                    position,
                });
            }

            if let Some(outcome) = tick.interaction.filter(|o| !o.repeated) {
                self.pending_events.push(GameEvent::Interacted {
                    user_id: *user_id,
                    entity: outcome.entity,
                });
            }
        }

        self.flush_vitality();
    }

    /// Report volume enter/exit changes into each character's buffer
    fn update_overlaps(&mut self) {
        let level = &self.settings.level;
        for player in self.state.players.values_mut() {
            let bounds = player.character.state().bounds();
            for event in player.overlaps.update(level, &bounds) {
                player.character.queue_trigger(event);
            }
        }
    }

    /// Overlapping characters shove each other
    fn apply_pushes(&mut self) {
        let bodies: Vec<(Uuid, _, Vec3, f32, f32)> = self
            .state
            .players
            .iter()
            .map(|(id, p)| {
                let c = &p.character;
                (*id, c.state().bounds(), c.state().velocity, c.weight(), c.push_force())
            })
            .collect();

        let mut contacts = Vec::new();
        for (i, a) in bodies.iter().enumerate() {
            for b in &bodies[i + 1..] {
                if !a.1.intersects(&b.1) {
                    continue;
                }
                contacts.push((
                    a.0,
                    CollisionEvent {
                        relative_velocity: (b.2 - a.2) * b.4,
                        other_mass: Some(b.3),
                    },
                ));
                contacts.push((
                    b.0,
                    CollisionEvent {
                        relative_velocity: (a.2 - b.2) * a.4,
                        other_mass: Some(a.3),
                    },
                ));
            }
        }

        for (user_id, event) in contacts {
            if let Some(player) = self.state.players.get_mut(&user_id) {
                player.character.queue_collision(event);
            }
        }
    }

    /// Turn health notifications into one-way messages for their owners
    fn flush_vitality(&mut self) {
        for (user_id, player) in self.state.players.iter_mut() {
            for event in player.character.drain_vitality_events() {
                let msg = match event {
                    VitalityEvent::Damaged {
                        amount,
                        presentation_hint,
                    } => ServerMsg::Damaged {
                        user_id: *user_id,
                        amount,
                        presentation_hint,
                    },
                    VitalityEvent::Healed { amount } => ServerMsg::Healed {
                        user_id: *user_id,
                        amount,
                    },
                    VitalityEvent::Changed { old, new } => {
                        trace!(user_id = %user_id, old, new, "Health changed");
                        continue;
                    }
                };
                let _ = self.snapshot_tx.send(msg);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::time::unix_millis;
    use tokio_test::{assert_err, assert_ok};

    fn settings(max_players: usize) -> WorldSettings {
        WorldSettings {
            level: Arc::new(Level::test_level()),
            movement: Arc::new(MovementConfig::default()),
            features: CharacterFeatures::default(),
            max_players,
            seed: 7,
        }
    }

    async fn send(handle: &WorldHandle, user_id: Uuid, msg: ClientMsg) {
        assert_ok!(
            handle
                .input_tx
                .send(PlayerInput {
                    user_id,
                    msg,
                    received_at: unix_millis(),
                })
                .await
        );
    }

    #[tokio::test]
    async fn test_join_spawns_character_on_spawn_point() {
        let (mut world, handle) = World::new(settings(4));
        let mut rx = handle.subscribe();
        let user_id = Uuid::new_v4();

        send(&handle, user_id, ClientMsg::Join { display_name: None }).await;
        assert!(world.process_inputs());

        assert_eq!(handle.player_count(), 1);
        let msg = assert_ok!(rx.try_recv());
        match msg {
            ServerMsg::Spawned { user_id: id, origin, .. } => {
                assert_eq!(id, user_id);
                assert_eq!(origin.y, 1.0);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_full_world_rejects_join() {
        let (mut world, handle) = World::new(settings(1));
        let mut rx = handle.subscribe();
        let late = Uuid::new_v4();

        send(&handle, Uuid::new_v4(), ClientMsg::Join { display_name: None }).await;
        send(&handle, late, ClientMsg::Join { display_name: None }).await;
        world.process_inputs();

        assert_eq!(handle.player_count(), 1);
        let _spawned = assert_ok!(rx.try_recv());
        let error = assert_ok!(rx.try_recv());
        assert_eq!(error.recipient(), Some(late));
    }

    #[tokio::test]
    async fn test_stale_input_is_dropped() {
        let (mut world, handle) = World::new(settings(4));
        let user_id = Uuid::new_v4();
        let forward = InputFrame {
            move_forward: 1.0,
            ..Default::default()
        };

        send(&handle, user_id, ClientMsg::Join { display_name: None }).await;
        send(
            &handle,
            user_id,
            ClientMsg::Input {
                seq: 5,
                frame: forward,
                view_angles: Vec3::ZERO,
            },
        )
        .await;
        send(
            &handle,
            user_id,
            ClientMsg::Input {
                seq: 4,
                frame: InputFrame::default(),
                view_angles: Vec3::ZERO,
            },
        )
        .await;
        world.process_inputs();
        world.run_tick();

        let player = &world.state().players[&user_id];
        assert_eq!(player.character.last_input_seq(), 5);
        assert!(player.character.state().forward_move > 0.0);
    }

    #[tokio::test]
    async fn test_damage_notification_is_targeted() {
        let (mut world, handle) = World::new(settings(4));
        let user_id = Uuid::new_v4();
        send(&handle, user_id, ClientMsg::Join { display_name: None }).await;
        world.process_inputs();

        let mut rx = handle.subscribe();
        if let Some(player) = world.state.players.get_mut(&user_id) {
            assert!(player.character.damage(15.0, true));
        }
        world.flush_vitality();

        let msg = assert_ok!(rx.try_recv());
        assert_eq!(
            msg,
            ServerMsg::Damaged {
                user_id,
                amount: 15.0,
                presentation_hint: true,
            }
        );
        assert!(msg.is_for(user_id));
        assert!(!msg.is_for(Uuid::new_v4()));
        assert_err!(rx.try_recv());
    }

    #[tokio::test]
    async fn test_overlapping_players_push_apart() {
        let (mut world, handle) = World::new(settings(4));
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        send(&handle, a, ClientMsg::Join { display_name: None }).await;
        send(&handle, b, ClientMsg::Join { display_name: None }).await;
        world.process_inputs();

        // Stack both on the same spot, one moving fast into the other
        for (id, x, vx) in [(a, 0.0, 0.0), (b, 0.2, -20.0)] {
            let player = world.state.players.get_mut(&id).expect("joined");
            player.character.teleport(Vec3::new(x, 1.0, 0.0), true);
            player.character.add_velocity(Vec3::new(vx, 0.0, 0.0));
        }

        world.apply_pushes();
        let level = world.settings.level.clone();
        let player = world.state.players.get_mut(&a).expect("joined");
        let tick = player.character.tick(&*level, tick_delta()).expect("authority ticks");
        assert_eq!(tick.report.impacts_absorbed, 1);
    }

    fn move_player(world: &mut World, user_id: Uuid, position: Vec3) {
        let player = world.state.players.get_mut(&user_id).expect("joined");
        assert!(player.character.teleport(position, true));
    }

    fn character(world: &World, user_id: Uuid) -> &Character {
        &world.state.players[&user_id].character
    }

    #[tokio::test]
    async fn test_respawn_out_of_water_clears_underwater() {
        let (mut world, handle) = World::new(settings(4));
        let user_id = Uuid::new_v4();
        send(&handle, user_id, ClientMsg::Join { display_name: None }).await;
        world.process_inputs();

        move_player(&mut world, user_id, Vec3::new(15.0, 1.0, 0.0));
        world.run_tick();
        world.run_tick();
        assert!(character(&world, user_id).state().underwater);

        world.handle_respawn(user_id);
        world.run_tick();
        world.run_tick();

        let respawned = character(&world, user_id);
        assert!(!respawned.state().underwater);
        assert_eq!(respawned.tracked_volumes(), 0);
    }

    #[tokio::test]
    async fn test_teleport_trigger_fires_on_every_entry() {
        let (mut world, handle) = World::new(settings(4));
        let user_id = Uuid::new_v4();
        send(&handle, user_id, ClientMsg::Join { display_name: None }).await;
        world.process_inputs();

        let mut fired = Vec::new();
        for _ in 0..2 {
            world.pending_events.clear();
            move_player(&mut world, user_id, Vec3::new(-19.0, 1.0, -19.0));
            world.run_tick();

            fired.push(world.pending_events.iter().any(|event| {
                matches!(event, GameEvent::Teleported { user_id: id, position }
                    if *id == user_id && *position == Vec3::new(0.0, 1.0, 0.0))
            }));

            // Next tick reports the exit at the destination
            world.run_tick();
            assert_eq!(character(&world, user_id).tracked_volumes(), 0);
        }

        assert_eq!(fired, vec![true, true]);
    }

    #[tokio::test]
    async fn test_leave_removes_player() {
        let (mut world, handle) = World::new(settings(4));
        let mut rx = handle.subscribe();
        let user_id = Uuid::new_v4();

        send(&handle, user_id, ClientMsg::Join { display_name: Some("surfer".to_string()) }).await;
        send(&handle, user_id, ClientMsg::Leave).await;
        world.process_inputs();

        assert_eq!(handle.player_count(), 0);
        let _spawned = assert_ok!(rx.try_recv());
        assert!(matches!(assert_ok!(rx.try_recv()), ServerMsg::PlayerLeft { .. }));
    }

    #[tokio::test]
    async fn test_run_broadcasts_snapshots_and_stops_when_handles_drop() {
        let (world, handle) = World::new(settings(4));
        let mut rx = handle.subscribe();
        let user_id = Uuid::new_v4();
        let task = tokio::spawn(world.run());

        send(&handle, user_id, ClientMsg::Join { display_name: None }).await;

        let snapshot = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                if let Ok(ServerMsg::Snapshot { players, tick, .. }) = rx.recv().await {
                    if !players.is_empty() {
                        return (tick, players);
                    }
                }
            }
        })
        .await;
        let (tick, players) = assert_ok!(snapshot);
        assert!(tick > 0);
        assert_eq!(players[0].user_id, user_id);

        drop(handle);
        assert_ok!(assert_ok!(tokio::time::timeout(Duration::from_secs(2), task).await));
    }
}
