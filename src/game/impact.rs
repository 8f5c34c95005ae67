//! Collision impulse absorption

use glam::Vec3;

/// Mass that maps a relative velocity one-to-one onto the working impulse
const REFERENCE_MASS: f32 = 50.0;
/// Horizontal impulse scale
const HORIZONTAL_SCALE: f32 = 0.0025;
/// Vertical impulse scale
const VERTICAL_SCALE: f32 = 0.00025;
/// Largest vertical impulse a single event may add
const MAX_VERTICAL_IMPULSE: f32 = 0.5;
/// Floor of the vertical speed clamp
const MIN_VERTICAL_LIMIT: f32 = 10.0;
/// Floor of the speed clamp
const MIN_SPEED_LIMIT: f32 = 30.0;

/// A rigid-body contact reported by the physics host
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionEvent {
    /// Velocity of the other body relative to the character
    pub relative_velocity: Vec3,
    /// Mass of the other body; `None` for static geometry
    pub other_mass: Option<f32>,
}

/// Converts collision events into bounded velocity changes
pub struct ImpactAbsorber;

impl ImpactAbsorber {
    /// Velocity after absorbing one contact. The result never exceeds
    /// `max(|velocity|, 30)` in magnitude.
    pub fn absorb(velocity: Vec3, relative_velocity: Vec3, other_mass: f32) -> Vec3 {
        let working = relative_velocity * (other_mass / REFERENCE_MASS);
        if !working.is_finite() {
            return velocity;
        }

        let impact = Vec3::new(
            working.x * HORIZONTAL_SCALE,
            working.y * VERTICAL_SCALE,
            working.z * HORIZONTAL_SCALE,
        );

        let max_y = velocity.y.max(MIN_VERTICAL_LIMIT);
        let y = (velocity.y + impact.y.clamp(-MAX_VERTICAL_IMPULSE, MAX_VERTICAL_IMPULSE)).clamp(-max_y, max_y);
        let combined = Vec3::new(velocity.x + impact.x, y, velocity.z + impact.z);

        combined.clamp_length_max(velocity.length().max(MIN_SPEED_LIMIT))
    }

    /// Velocity after an event, or `None` for contacts with massless bodies
    pub fn apply(velocity: Vec3, event: &CollisionEvent) -> Option<Vec3> {
        match event.other_mass {
            Some(mass) if mass > 0.0 => Some(Self::absorb(velocity, event.relative_velocity, mass)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_push_is_applied_per_axis() {
        let result = ImpactAbsorber::absorb(Vec3::ZERO, Vec3::new(100.0, 100.0, -100.0), 50.0);
        assert!((result.x - 0.25).abs() < 1e-6);
        assert!((result.y - 0.025).abs() < 1e-6);
        assert!((result.z + 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_vertical_impulse_is_clamped() {
        let result = ImpactAbsorber::absorb(Vec3::ZERO, Vec3::new(0.0, 1.0e6, 0.0), 50.0);
        assert!((result.y - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_vertical_speed_clamped_to_limit() {
        // Falling faster than the floor gets pulled back into range
        let result = ImpactAbsorber::absorb(Vec3::new(0.0, -40.0, 0.0), Vec3::ZERO, 50.0);
        assert!((result.y + 10.0).abs() < 1e-6);
    }

    #[test]
    fn test_magnitude_never_exceeds_limit() {
        let velocities = [
            Vec3::ZERO,
            Vec3::new(5.0, 0.0, 0.0),
            Vec3::new(40.0, 12.0, -3.0),
            Vec3::new(0.0, -25.0, 0.0),
        ];
        let pushes = [
            Vec3::new(1.0e7, 0.0, 0.0),
            Vec3::new(-3.0e5, 9.0e5, 2.0e6),
            Vec3::new(0.0, -1.0e9, 0.0),
            Vec3::new(12.0, 3.0, 4.0),
        ];
        let masses = [0.5, 50.0, 1000.0, 1.0e6];

        for v in velocities {
            for push in pushes {
                for mass in masses {
                    let result = ImpactAbsorber::absorb(v, push, mass);
                    let limit = v.length().max(30.0);
                    assert!(
                        result.length() <= limit + 1e-3,
                        "v={v:?} push={push:?} mass={mass} result={result:?}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_non_finite_impulse_is_ignored() {
        let v = Vec3::new(1.0, 2.0, 3.0);
        assert_eq!(ImpactAbsorber::absorb(v, Vec3::new(f32::INFINITY, 0.0, 0.0), 50.0), v);
    }

    #[test]
    fn test_static_contacts_are_ignored() {
        let v = Vec3::new(1.0, 0.0, 0.0);
        let event = CollisionEvent {
            relative_velocity: Vec3::new(100.0, 0.0, 0.0),
            other_mass: None,
        };
        assert_eq!(ImpactAbsorber::apply(v, &event), None);

        let body = CollisionEvent {
            other_mass: Some(50.0),
            ..event
        };
        let pushed = ImpactAbsorber::apply(v, &body).expect("massive body is absorbed");
        assert!((pushed.x - 1.25).abs() < 1e-6);
    }
}
