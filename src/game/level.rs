//! Static level geometry: floor, solid boxes, trigger volumes, use stations
//!
//! Levels are described in JSON and loaded once at startup. The level is
//! the host's physics scene: it answers shape casts, reports ground contacts
//! and tells each body which volumes it overlaps.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use super::environment::{LiquidMedium, TeleportTarget, ViewpointSensor, Volume, VolumeId};
use super::events::TriggerEvent;
use super::geometry::Aabb;
use super::integrator::{GroundContact, SolidGeometry};
use super::interaction::{CollisionLayer, EntityId, Interactable, InteractionEffect, SceneHit, SceneQuery};

/// Contact tolerance for resting bodies
const CONTACT_EPSILON: f32 = 1e-4;
/// Entity id of the floor plane
pub const FLOOR_ENTITY: EntityId = 0;

/// Level loading errors
#[derive(Debug, thiserror::Error)]
pub enum LevelError {
    #[error("Failed to read level file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse level file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Level defines no spawn points")]
    NoSpawnPoints,
}

// ============================================================================
// Description (JSON)
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LevelDesc {
    pub name: String,
    #[serde(default)]
    pub floor_height: f32,
    /// Feet positions new characters are placed at
    pub spawn_points: Vec<Vec3>,
    #[serde(default)]
    pub solids: Vec<Aabb>,
    #[serde(default)]
    pub volumes: Vec<VolumeDesc>,
    #[serde(default)]
    pub stations: Vec<StationDesc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeDesc {
    pub bounds: Aabb,
    pub kind: VolumeKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VolumeKind {
    Water,
    Teleport(TeleportTarget),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationDesc {
    pub bounds: Aabb,
    pub action: StationAction,
}

/// What a use station does for whoever uses it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StationAction {
    Heal { amount: f32 },
    Damage { amount: f32 },
    Teleport(TeleportTarget),
}

impl LevelDesc {
    /// Flat practice level used when no level file is configured
    pub fn test_level() -> Self {
        Self {
            name: "flat_practice".to_string(),
            floor_height: 0.0,
            spawn_points: vec![
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(4.0, 0.0, 0.0),
                Vec3::new(-4.0, 0.0, 0.0),
                Vec3::new(0.0, 0.0, -4.0),
            ],
            solids: vec![
                Aabb::new(Vec3::new(6.0, 0.0, 6.0), Vec3::new(8.0, 1.0, 8.0)),
                Aabb::new(Vec3::new(-30.0, 0.0, 30.0), Vec3::new(30.0, 6.0, 31.0)),
            ],
            volumes: vec![
                VolumeDesc {
                    bounds: Aabb::new(Vec3::new(10.0, 0.0, -5.0), Vec3::new(20.0, 3.0, 5.0)),
                    kind: VolumeKind::Water,
                },
                VolumeDesc {
                    bounds: Aabb::new(Vec3::new(-20.0, 0.0, -20.0), Vec3::new(-18.0, 0.5, -18.0)),
                    kind: VolumeKind::Teleport(TeleportTarget {
                        destination: Vec3::new(0.0, 1.0, 0.0),
                        reset_velocity: true,
                    }),
                },
            ],
            stations: vec![StationDesc {
                bounds: Aabb::new(Vec3::new(-0.5, 0.0, 6.0), Vec3::new(0.5, 2.0, 7.0)),
                action: StationAction::Heal { amount: 25.0 },
            }],
        }
    }
}

// ============================================================================
// Runtime objects
// ============================================================================

/// A trigger volume placed in the level
#[derive(Debug)]
pub struct LevelVolume {
    id: VolumeId,
    bounds: Aabb,
    kind: VolumeKind,
}

impl LevelVolume {
    pub fn bounds(&self) -> &Aabb {
        &self.bounds
    }

    pub fn kind(&self) -> VolumeKind {
        self.kind
    }
}

impl LiquidMedium for LevelVolume {
    fn medium(&self) -> &str {
        "water"
    }
}

impl Volume for LevelVolume {
    fn id(&self) -> VolumeId {
        self.id
    }

    fn as_liquid(&self) -> Option<&dyn LiquidMedium> {
        match self.kind {
            VolumeKind::Water => Some(self),
            VolumeKind::Teleport(_) => None,
        }
    }

    fn teleport_target(&self) -> Option<TeleportTarget> {
        match self.kind {
            VolumeKind::Teleport(target) => Some(target),
            VolumeKind::Water => None,
        }
    }
}

/// A usable box: heal pads, teleporters
#[derive(Debug)]
pub struct Station {
    entity: EntityId,
    bounds: Aabb,
    action: StationAction,
}

impl Interactable for Station {
    fn execute_action(&self, requestor: Uuid, is_repeated_hold: bool) -> InteractionEffect {
        // Stations fire once per press
        if is_repeated_hold {
            return InteractionEffect::None;
        }

        debug!(entity = self.entity, user_id = %requestor, action = ?self.action, "Station used");
        match self.action {
            StationAction::Heal { amount } => InteractionEffect::Heal(amount),
            StationAction::Damage { amount } => InteractionEffect::Damage {
                amount,
                presentation_hint: true,
            },
            StationAction::Teleport(target) => InteractionEffect::Teleport {
                position: target.destination,
                reset_velocity: target.reset_velocity,
            },
        }
    }
}

/// Loaded level
#[derive(Debug)]
pub struct Level {
    name: String,
    floor_height: f32,
    spawn_points: Vec<Vec3>,
    solids: Vec<Aabb>,
    volumes: Vec<Arc<LevelVolume>>,
    stations: Vec<Arc<Station>>,
}

impl Level {
    /// Read and validate a JSON level file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LevelError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let desc: LevelDesc = serde_json::from_str(&raw)?;
        Self::from_desc(desc)
    }

    pub fn from_desc(desc: LevelDesc) -> Result<Self, LevelError> {
        if desc.spawn_points.is_empty() {
            return Err(LevelError::NoSpawnPoints);
        }
        Ok(Self::build(desc))
    }

    pub fn test_level() -> Self {
        Self::build(LevelDesc::test_level())
    }

    fn build(desc: LevelDesc) -> Self {
        // Entity ids: floor, then solids, then stations
        let station_base = 1 + desc.solids.len() as EntityId;

        let volumes = desc
            .volumes
            .into_iter()
            .enumerate()
            .map(|(i, v)| {
                Arc::new(LevelVolume {
                    id: i as VolumeId + 1,
                    bounds: v.bounds,
                    kind: v.kind,
                })
            })
            .collect::<Vec<_>>();

        let stations = desc
            .stations
            .into_iter()
            .enumerate()
            .map(|(i, s)| {
                Arc::new(Station {
                    entity: station_base + i as EntityId,
                    bounds: s.bounds,
                    action: s.action,
                })
            })
            .collect::<Vec<_>>();

        info!(
            level = %desc.name,
            spawn_points = desc.spawn_points.len(),
            solids = desc.solids.len(),
            volumes = volumes.len(),
            stations = stations.len(),
            "Level loaded"
        );

        Self {
            name: desc.name,
            floor_height: desc.floor_height,
            spawn_points: desc.spawn_points,
            solids: desc.solids,
            volumes,
            stations,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn floor_height(&self) -> f32 {
        self.floor_height
    }

    pub fn spawn_points(&self) -> &[Vec3] {
        &self.spawn_points
    }

    pub fn volumes(&self) -> &[Arc<LevelVolume>] {
        &self.volumes
    }

    fn solid_entity(index: usize) -> EntityId {
        1 + index as EntityId
    }
}

impl SolidGeometry for Level {
    fn overlaps_solid(&self, bounds: &Aabb) -> bool {
        bounds.min.y < self.floor_height - CONTACT_EPSILON || self.solids.iter().any(|solid| solid.intersects(bounds))
    }

    fn ground_below(&self, bounds: &Aabb, reach: f32) -> Option<GroundContact> {
        let bottom = bounds.min.y;
        let mut best: Option<f32> = None;

        if bottom - self.floor_height <= reach {
            best = Some(self.floor_height);
        }

        for solid in &self.solids {
            let over = solid.min.x < bounds.max.x
                && solid.max.x > bounds.min.x
                && solid.min.z < bounds.max.z
                && solid.max.z > bounds.min.z;
            let top = solid.max.y;
            if over && top <= bottom + CONTACT_EPSILON && bottom - top <= reach {
                best = Some(best.map_or(top, |b| b.max(top)));
            }
        }

        best.map(|height| GroundContact {
            height,
            normal: Vec3::Y,
        })
    }
}

impl SceneQuery for Level {
    fn sphere_cast(
        &self,
        origin: Vec3,
        direction: Vec3,
        radius: f32,
        max_distance: f32,
        exclude: CollisionLayer,
    ) -> Option<SceneHit> {
        // Level geometry lives on the default layer
        if exclude == CollisionLayer::DEFAULT {
            return None;
        }
        let direction = direction.normalize_or_zero();
        if direction == Vec3::ZERO {
            return None;
        }

        let mut best: Option<SceneHit> = None;
        let mut consider = |hit: SceneHit| {
            if best.as_ref().map_or(true, |b| hit.distance < b.distance) {
                best = Some(hit);
            }
        };

        if direction.y < 0.0 {
            let distance = (origin.y - radius - self.floor_height) / -direction.y;
            if (0.0..=max_distance).contains(&distance) {
                consider(SceneHit {
                    entity: FLOOR_ENTITY,
                    distance,
                    interactable: None,
                });
            }
        }

        for (i, solid) in self.solids.iter().enumerate() {
            if let Some(distance) = solid.sphere_cast(origin, direction, radius, max_distance) {
                consider(SceneHit {
                    entity: Self::solid_entity(i),
                    distance,
                    interactable: None,
                });
            }
        }

        for station in &self.stations {
            if let Some(distance) = station.bounds.sphere_cast(origin, direction, radius, max_distance) {
                consider(SceneHit {
                    entity: station.entity,
                    distance,
                    interactable: Some(station.clone() as Arc<dyn Interactable>),
                });
            }
        }

        best
    }
}

impl ViewpointSensor for Level {
    fn is_submerged(&self, center: Vec3, radius: f32) -> bool {
        self.volumes
            .iter()
            .any(|v| v.as_liquid().is_some() && v.bounds.intersects_sphere(center, radius))
    }
}

/// Tracks which level volumes a body overlaps and reports the changes
#[derive(Debug, Default)]
pub struct OverlapTracker {
    inside: HashSet<VolumeId>,
}

impl OverlapTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compare the body's current bounds against every volume
    pub fn update(&mut self, level: &Level, body: &Aabb) -> Vec<TriggerEvent> {
        let mut events = Vec::new();

        for volume in &level.volumes {
            let overlapping = volume.bounds.intersects(body);
            let was_inside = self.inside.contains(&volume.id);

            if overlapping && !was_inside {
                self.inside.insert(volume.id);
                events.push(TriggerEvent::Enter(volume.clone() as Arc<dyn Volume>));
            } else if !overlapping && was_inside {
                self.inside.remove(&volume.id);
                events.push(TriggerEvent::Exit(volume.clone() as Arc<dyn Volume>));
            }
        }

        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body_at(feet: Vec3) -> Aabb {
        Aabb::from_center(feet + Vec3::new(0.0, 1.0, 0.0), Vec3::new(0.5, 1.0, 0.5))
    }

    #[test]
    fn test_desc_parses_from_json() {
        let json = r#"{
            "name": "pool",
            "spawn_points": [[0.0, 0.0, 0.0]],
            "volumes": [
                { "bounds": { "min": [0, 0, 0], "max": [1, 1, 1] }, "kind": { "type": "water" } },
                { "bounds": { "min": [5, 0, 0], "max": [6, 1, 1] },
                  "kind": { "type": "teleport", "destination": [0, 1, 0] } }
            ],
            "stations": [
                { "bounds": { "min": [2, 0, 2], "max": [3, 2, 3] }, "action": { "type": "heal", "amount": 10 } }
            ]
        }"#;

        let level = Level::from_desc(serde_json::from_str(json).expect("valid json")).expect("valid level");
        assert_eq!(level.name(), "pool");
        assert_eq!(level.volumes().len(), 2);
        assert_eq!(level.volumes()[0].kind(), VolumeKind::Water);
        assert_eq!(
            level.volumes()[1].teleport_target(),
            Some(TeleportTarget {
                destination: Vec3::new(0.0, 1.0, 0.0),
                reset_velocity: true,
            })
        );
    }

    #[test]
    fn test_level_without_spawns_is_rejected() {
        let mut desc = LevelDesc::test_level();
        desc.spawn_points.clear();
        assert!(matches!(Level::from_desc(desc), Err(LevelError::NoSpawnPoints)));
    }

    #[test]
    fn test_ground_below_prefers_highest_surface() {
        let level = Level::test_level();

        let on_floor = level.ground_below(&body_at(Vec3::ZERO), 0.05).expect("floor");
        assert_eq!(on_floor.height, 0.0);

        let on_box = level.ground_below(&body_at(Vec3::new(7.0, 1.0, 7.0)), 0.05).expect("box top");
        assert_eq!(on_box.height, 1.0);

        assert!(level.ground_below(&body_at(Vec3::new(0.0, 3.0, 0.0)), 0.05).is_none());
    }

    #[test]
    fn test_overlap_tracker_reports_enter_and_exit_once() {
        let level = Level::test_level();
        let mut tracker = OverlapTracker::new();
        let in_pool = body_at(Vec3::new(15.0, 0.0, 0.0));

        let events = tracker.update(&level, &in_pool);
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], TriggerEvent::Enter(v) if v.as_liquid().is_some()));

        assert!(tracker.update(&level, &in_pool).is_empty());

        let events = tracker.update(&level, &body_at(Vec3::ZERO));
        assert!(matches!(events.as_slice(), [TriggerEvent::Exit(_)]));
    }

    #[test]
    fn test_use_cast_finds_station() {
        let level = Level::test_level();
        let hit = level
            .sphere_cast(Vec3::new(0.0, 1.6, 3.0), Vec3::Z, 0.2, 5.0, CollisionLayer::PLAYER)
            .expect("station in reach");

        let effect = hit.interactable.expect("station is interactable").execute_action(Uuid::new_v4(), false);
        assert_eq!(effect, InteractionEffect::Heal(25.0));
    }

    #[test]
    fn test_station_ignores_repeated_hold() {
        let level = Level::test_level();
        let hit = level
            .sphere_cast(Vec3::new(0.0, 1.6, 3.0), Vec3::Z, 0.2, 5.0, CollisionLayer::PLAYER)
            .expect("station in reach");
        let station = hit.interactable.expect("interactable");
        assert_eq!(station.execute_action(Uuid::new_v4(), true), InteractionEffect::None);
    }

    #[test]
    fn test_use_cast_respects_reach() {
        let level = Level::test_level();
        assert!(level
            .sphere_cast(Vec3::new(0.0, 1.6, -10.0), Vec3::Z, 0.2, 5.0, CollisionLayer::PLAYER)
            .is_none());
    }

    #[test]
    fn test_eye_in_water_is_submerged() {
        let level = Level::test_level();
        assert!(level.is_submerged(Vec3::new(15.0, 1.5, 0.0), 0.1));
        assert!(!level.is_submerged(Vec3::new(0.0, 1.5, 0.0), 0.1));
    }
}
