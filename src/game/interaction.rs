//! "Use" probe cast from the viewpoint

use std::fmt::Debug;
use std::sync::Arc;

use glam::Vec3;
use uuid::Uuid;

/// Radius of the use probe sphere
pub const USE_PROBE_RADIUS: f32 = 0.2;
/// Default reach of the use probe
pub const DEFAULT_MAX_USE_DISTANCE: f32 = 5.0;
/// Accepted range for the configured reach
pub const USE_DISTANCE_RANGE: std::ops::RangeInclusive<f32> = 0.01..=150.0;

/// Stable identity of a scene object
pub type EntityId = u64;

/// Collision layer used to exclude the caster's own bodies from queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CollisionLayer(pub u32);

impl CollisionLayer {
    pub const DEFAULT: CollisionLayer = CollisionLayer(0);
    pub const PLAYER: CollisionLayer = CollisionLayer(1);
}

/// Effect an interaction asks the host to apply to the requestor
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InteractionEffect {
    None,
    Heal(f32),
    Damage { amount: f32, presentation_hint: bool },
    Teleport { position: Vec3, reset_velocity: bool },
}

/// Capability of objects that react to being used
pub trait Interactable: Send + Sync + Debug {
    /// Invoked on the authority every tick the use key is held on this target.
    /// `is_repeated_hold` is false only on the first tick of a press.
    fn execute_action(&self, requestor: Uuid, is_repeated_hold: bool) -> InteractionEffect;
}

/// First object hit by a scene cast
#[derive(Debug, Clone)]
pub struct SceneHit {
    pub entity: EntityId,
    pub distance: f32,
    pub interactable: Option<Arc<dyn Interactable>>,
}

/// Shape casts against the host scene
pub trait SceneQuery: Send + Sync {
    fn sphere_cast(
        &self,
        origin: Vec3,
        direction: Vec3,
        radius: f32,
        max_distance: f32,
        exclude: CollisionLayer,
    ) -> Option<SceneHit>;
}

/// Result of one probe update
#[derive(Debug, Clone)]
pub struct InteractionOutcome {
    pub entity: EntityId,
    pub repeated: bool,
    pub effect: InteractionEffect,
}

/// Tracks the targeted interactable and the used-once latch
#[derive(Debug, Clone)]
pub struct InteractionProbe {
    max_use_distance: f32,
    layer: CollisionLayer,
    used_once: bool,
    target: Option<EntityId>,
}

impl InteractionProbe {
    pub fn new(max_use_distance: f32, layer: CollisionLayer) -> Self {
        Self {
            max_use_distance,
            layer,
            used_once: false,
            target: None,
        }
    }

    pub fn target(&self) -> Option<EntityId> {
        self.target
    }

    pub fn used_once(&self) -> bool {
        self.used_once
    }

    pub fn max_use_distance(&self) -> f32 {
        self.max_use_distance
    }

    /// Cast from the eye and invoke the targeted interactable if use is held
    pub fn update(
        &mut self,
        scene: &dyn SceneQuery,
        requestor: Uuid,
        eye: Vec3,
        forward: Vec3,
        interact_held: bool,
    ) -> Option<InteractionOutcome> {
        let hit = scene.sphere_cast(eye, forward, USE_PROBE_RADIUS, self.max_use_distance, self.layer);

        let (entity, interactable) = match hit {
            Some(SceneHit {
                entity,
                interactable: Some(interactable),
                ..
            }) => (entity, interactable),
            _ => {
                if !interact_held {
                    self.used_once = false;
                }
                self.target = None;
                return None;
            }
        };

        self.target = Some(entity);

        if !interact_held {
            self.used_once = false;
            return None;
        }

        let repeated = self.used_once;
        let effect = interactable.execute_action(requestor, repeated);
        self.used_once = true;

        Some(InteractionOutcome {
            entity,
            repeated,
            effect,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    struct Button {
        calls: Mutex<Vec<bool>>,
    }

    impl Interactable for Button {
        fn execute_action(&self, _requestor: Uuid, is_repeated_hold: bool) -> InteractionEffect {
            self.calls.lock().unwrap().push(is_repeated_hold);
            InteractionEffect::Heal(5.0)
        }
    }

    struct Scene {
        button: Option<Arc<Button>>,
        wall: bool,
    }

    impl SceneQuery for Scene {
        fn sphere_cast(&self, _: Vec3, _: Vec3, radius: f32, _: f32, exclude: CollisionLayer) -> Option<SceneHit> {
            assert_eq!(radius, USE_PROBE_RADIUS);
            assert_eq!(exclude, CollisionLayer::PLAYER);
            if let Some(button) = &self.button {
                return Some(SceneHit {
                    entity: 7,
                    distance: 1.0,
                    interactable: Some(button.clone() as Arc<dyn Interactable>),
                });
            }
            self.wall.then(|| SceneHit {
                entity: 1,
                distance: 1.0,
                interactable: None,
            })
        }
    }

    fn probe() -> InteractionProbe {
        InteractionProbe::new(DEFAULT_MAX_USE_DISTANCE, CollisionLayer::PLAYER)
    }

    #[test]
    fn test_hold_reports_repeats_after_first_tick() {
        let button = Arc::new(Button::default());
        let scene = Scene {
            button: Some(button.clone()),
            wall: false,
        };
        let mut probe = probe();
        let me = Uuid::new_v4();

        let first = probe.update(&scene, me, Vec3::ZERO, Vec3::Z, true).expect("should interact");
        assert!(!first.repeated);
        assert_eq!(first.effect, InteractionEffect::Heal(5.0));

        let second = probe.update(&scene, me, Vec3::ZERO, Vec3::Z, true).expect("should interact");
        assert!(second.repeated);

        assert_eq!(*button.calls.lock().unwrap(), vec![false, true]);
        assert_eq!(probe.target(), Some(7));
    }

    #[test]
    fn test_release_clears_latch() {
        let button = Arc::new(Button::default());
        let scene = Scene {
            button: Some(button.clone()),
            wall: false,
        };
        let mut probe = probe();
        let me = Uuid::new_v4();

        probe.update(&scene, me, Vec3::ZERO, Vec3::Z, true);
        assert!(probe.used_once());

        assert!(probe.update(&scene, me, Vec3::ZERO, Vec3::Z, false).is_none());
        assert!(!probe.used_once());

        let again = probe.update(&scene, me, Vec3::ZERO, Vec3::Z, true).expect("should interact");
        assert!(!again.repeated);
    }

    #[test]
    fn test_non_interactable_hit_clears_target() {
        let scene = Scene {
            button: None,
            wall: true,
        };
        let mut probe = probe();
        assert!(probe.update(&scene, Uuid::new_v4(), Vec3::ZERO, Vec3::Z, false).is_none());
        assert_eq!(probe.target(), None);
    }

    #[test]
    fn test_miss_while_held_keeps_latch() {
        let button = Arc::new(Button::default());
        let mut probe = probe();
        let me = Uuid::new_v4();

        let hit_scene = Scene {
            button: Some(button),
            wall: false,
        };
        probe.update(&hit_scene, me, Vec3::ZERO, Vec3::Z, true);

        let empty = Scene {
            button: None,
            wall: false,
        };
        probe.update(&empty, me, Vec3::ZERO, Vec3::Z, true);
        assert!(probe.used_once());
        assert_eq!(probe.target(), None);

        probe.update(&empty, me, Vec3::ZERO, Vec3::Z, false);
        assert!(!probe.used_once());
    }
}
