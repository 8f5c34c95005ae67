//! Trigger-volume tracking and the body/eye liquid classification

use std::fmt::Debug;
use std::sync::{Arc, Weak};

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Radius of the probe sphere that follows the eye
pub const CAMERA_PROBE_RADIUS: f32 = 0.1;

/// Stable identity of a trigger volume
pub type VolumeId = u64;

/// Where a teleport trigger sends whoever enters it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TeleportTarget {
    pub destination: Vec3,
    #[serde(default = "default_true")]
    pub reset_velocity: bool,
}

fn default_true() -> bool {
    true
}

/// Capability of volumes filled with a liquid medium
pub trait LiquidMedium: Send + Sync {
    fn medium(&self) -> &str;
}

/// A non-solid region that reports overlap without blocking movement.
/// Capabilities are opted into by overriding the accessors.
pub trait Volume: Send + Sync + Debug {
    fn id(&self) -> VolumeId;

    fn as_liquid(&self) -> Option<&dyn LiquidMedium> {
        None
    }

    fn teleport_target(&self) -> Option<TeleportTarget> {
        None
    }
}

/// Set of volumes currently overlapping the body.
///
/// Volumes are held weakly; one destroyed while overlapping stays counted
/// until the next recompute purges it.
#[derive(Debug, Default)]
pub struct EnvironmentSampler {
    tracked: Vec<(VolumeId, Weak<dyn Volume>)>,
    sampled_count: Option<usize>,
    underwater: bool,
}

impl EnvironmentSampler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking `volume`. Returns false if it was already tracked.
    pub fn enter(&mut self, volume: &Arc<dyn Volume>) -> bool {
        let id = volume.id();
        if self.tracked.iter().any(|(tracked, _)| *tracked == id) {
            return false;
        }
        self.tracked.push((id, Arc::downgrade(volume)));
        true
    }

    /// Stop tracking `volume`. Returns false if it was not tracked.
    pub fn exit(&mut self, volume: &Arc<dyn Volume>) -> bool {
        let id = volume.id();
        let before = self.tracked.len();
        self.tracked.retain(|(tracked, _)| *tracked != id);
        self.tracked.len() != before
    }

    pub fn contains(&self, id: VolumeId) -> bool {
        self.tracked.iter().any(|(tracked, _)| *tracked == id)
    }

    /// Number of tracked entries, including dead ones not yet purged
    pub fn len(&self) -> usize {
        self.tracked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracked.is_empty()
    }

    /// Purge dead volumes and report whether any live one is a liquid
    pub fn recompute(&mut self) -> bool {
        self.tracked.retain(|(_, volume)| volume.strong_count() > 0);
        self.tracked
            .iter()
            .filter_map(|(_, volume)| volume.upgrade())
            .any(|volume| volume.as_liquid().is_some())
    }

    /// Per-tick body classification. Only re-evaluated when the tracked count
    /// changed since the last sample; a same-size change of membership keeps
    /// the previous answer.
    pub fn sample(&mut self) -> bool {
        let count = self.tracked.len();
        if self.sampled_count != Some(count) {
            self.underwater = self.recompute();
            self.sampled_count = Some(self.tracked.len());
        }
        self.underwater
    }
}

/// Reports whether a point-sized probe sits inside liquid
pub trait ViewpointSensor: Send + Sync {
    fn is_submerged(&self, center: Vec3, radius: f32) -> bool;
}

/// Tiny probe that follows the eye, independent of the body collider
pub struct CameraWaterProbe {
    sensor: Arc<dyn ViewpointSensor>,
    position: Vec3,
}

impl CameraWaterProbe {
    pub fn new(sensor: Arc<dyn ViewpointSensor>, position: Vec3) -> Self {
        Self { sensor, position }
    }

    /// Whether the probe is submerged at its current position
    pub fn sample(&self) -> bool {
        self.sensor.is_submerged(self.position, CAMERA_PROBE_RADIUS)
    }

    /// Move the probe to the eye; takes effect on the next sample
    pub fn follow(&mut self, eye: Vec3) {
        self.position = eye;
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct TestVolume {
        id: VolumeId,
        liquid: bool,
    }

    impl LiquidMedium for TestVolume {
        fn medium(&self) -> &str {
            "water"
        }
    }

    impl Volume for TestVolume {
        fn id(&self) -> VolumeId {
            self.id
        }

        fn as_liquid(&self) -> Option<&dyn LiquidMedium> {
            if self.liquid {
                Some(self)
            } else {
                None
            }
        }
    }

    fn volume(id: VolumeId, liquid: bool) -> Arc<dyn Volume> {
        Arc::new(TestVolume { id, liquid })
    }

    #[test]
    fn test_enter_is_idempotent() {
        let mut sampler = EnvironmentSampler::new();
        let water = volume(1, true);

        assert!(sampler.enter(&water));
        assert!(!sampler.enter(&water));
        assert_eq!(sampler.len(), 1);

        assert!(sampler.exit(&water));
        assert!(sampler.is_empty());
        assert!(!sampler.contains(1));
    }

    #[test]
    fn test_exit_of_untracked_volume_is_noop() {
        let mut sampler = EnvironmentSampler::new();
        let water = volume(1, true);
        assert!(!sampler.exit(&water));
        assert!(sampler.is_empty());
    }

    #[test]
    fn test_recompute_detects_liquid() {
        let mut sampler = EnvironmentSampler::new();
        let trigger = volume(1, false);
        let water = volume(2, true);

        sampler.enter(&trigger);
        assert!(!sampler.recompute());

        sampler.enter(&water);
        assert!(sampler.recompute());
    }

    #[test]
    fn test_dead_volume_is_purged_on_recompute() {
        let mut sampler = EnvironmentSampler::new();
        let water = volume(1, true);
        sampler.enter(&water);
        drop(water);

        assert_eq!(sampler.len(), 1);
        assert!(!sampler.recompute());
        assert!(sampler.is_empty());
    }

    #[test]
    fn test_sample_only_recomputes_on_count_change() {
        let mut sampler = EnvironmentSampler::new();
        let water = volume(1, true);
        let dry = volume(2, false);

        sampler.enter(&water);
        assert!(sampler.sample());

        // Same cardinality, different membership: previous answer is kept
        sampler.exit(&water);
        sampler.enter(&dry);
        assert!(sampler.sample());

        // Count change forces a recompute
        sampler.exit(&dry);
        assert!(!sampler.sample());
    }

    struct Pool {
        surface: f32,
    }

    impl ViewpointSensor for Pool {
        fn is_submerged(&self, center: Vec3, radius: f32) -> bool {
            center.y - radius < self.surface
        }
    }

    #[test]
    fn test_camera_probe_lags_until_follow() {
        let mut probe = CameraWaterProbe::new(Arc::new(Pool { surface: 0.0 }), Vec3::new(0.0, 2.0, 0.0));
        assert!(!probe.sample());

        probe.follow(Vec3::new(0.0, -1.0, 0.0));
        assert!(probe.sample());
    }
}
