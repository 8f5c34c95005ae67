//! Health bookkeeping and damage/heal notifications

use serde::{Deserialize, Serialize};

use super::authority::{Authorized, NetRole};

/// Health every character spawns with
pub const DEFAULT_HEALTH: f32 = 100.0;

/// Punch applied to the local view when damage carries a presentation hint
pub const DAMAGE_PUNCH: ViewPunch = ViewPunch { pitch: -3.0, yaw: 0.0 };

/// Presentation-only view recoil, in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewPunch {
    pub pitch: f32,
    pub yaw: f32,
}

/// Notification produced by a health mutation
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VitalityEvent {
    /// One-way message to the owning client
    Damaged { amount: f32, presentation_hint: bool },
    /// One-way message to the owning client
    Healed { amount: f32 },
    /// Bookkeeping hook, fired on every mutation
    Changed { old: f32, new: f32 },
}

/// The single authoritative health value of a character
#[derive(Debug, Clone)]
pub struct VitalityModel {
    health: f32,
    ceiling: Option<f32>,
    pending: Vec<VitalityEvent>,
}

impl VitalityModel {
    pub fn new(health: f32) -> Self {
        Self {
            health,
            ceiling: None,
            pending: Vec::new(),
        }
    }

    /// Cap heals at `ceiling`. Without one, healing is unbounded.
    pub fn with_ceiling(mut self, ceiling: Option<f32>) -> Self {
        self.ceiling = ceiling;
        self
    }

    pub fn health(&self) -> f32 {
        self.health
    }

    pub fn ceiling(&self) -> Option<f32> {
        self.ceiling
    }

    pub fn damage(&mut self, _auth: Authorized, amount: f32, presentation_hint: bool) {
        let old = self.health;
        self.health -= amount;
        self.pending.push(VitalityEvent::Damaged {
            amount,
            presentation_hint,
        });
        self.pending.push(VitalityEvent::Changed {
            old,
            new: self.health,
        });
    }

    pub fn heal(&mut self, _auth: Authorized, amount: f32) {
        let old = self.health;
        let healed = self.health + amount;
        self.health = match self.ceiling {
            Some(ceiling) if healed > ceiling => ceiling.max(old),
            _ => healed,
        };
        self.pending.push(VitalityEvent::Healed { amount });
        self.pending.push(VitalityEvent::Changed {
            old,
            new: self.health,
        });
    }

    /// Set health outright, as on respawn. Raising it reports a heal.
    pub fn restore(&mut self, _auth: Authorized, health: f32) {
        let old = self.health;
        if health > old {
            self.pending.push(VitalityEvent::Healed { amount: health - old });
        }
        if health != old {
            self.health = health;
            self.pending.push(VitalityEvent::Changed { old, new: health });
        }
    }

    /// Overwrite with a replicated value on a non-authoritative instance
    pub fn apply_replicated(&mut self, health: f32) {
        if health != self.health {
            let old = self.health;
            self.health = health;
            self.pending.push(VitalityEvent::Changed { old, new: health });
        }
    }

    /// Take every notification produced since the last drain
    pub fn drain_events(&mut self) -> Vec<VitalityEvent> {
        std::mem::take(&mut self.pending)
    }
}

/// Client-side reaction to a damage notification: only the locally
/// controlled view plays the punch, and only when hinted.
pub fn damage_feedback(role: NetRole, presentation_hint: bool) -> Option<ViewPunch> {
    (role.is_locally_controlled() && presentation_hint).then_some(DAMAGE_PUNCH)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn authorized<T>(f: impl FnOnce(Authorized) -> T) -> T {
        NetRole::server().authorize("test", f).expect("server is authoritative")
    }

    #[test]
    fn test_damage_emits_notification_and_change() {
        let mut vitality = VitalityModel::new(DEFAULT_HEALTH);
        authorized(|auth| vitality.damage(auth, 10.0, true));

        assert_eq!(vitality.health(), 90.0);
        assert_eq!(
            vitality.drain_events(),
            vec![
                VitalityEvent::Damaged {
                    amount: 10.0,
                    presentation_hint: true
                },
                VitalityEvent::Changed { old: 100.0, new: 90.0 },
            ]
        );
        assert!(vitality.drain_events().is_empty());
    }

    #[test]
    fn test_heal_is_unbounded_without_ceiling() {
        let mut vitality = VitalityModel::new(DEFAULT_HEALTH);
        authorized(|auth| vitality.heal(auth, 50.0));
        assert_eq!(vitality.health(), 150.0);
    }

    #[test]
    fn test_heal_respects_ceiling() {
        let mut vitality = VitalityModel::new(95.0).with_ceiling(Some(100.0));
        authorized(|auth| vitality.heal(auth, 50.0));
        assert_eq!(vitality.health(), 100.0);

        // Already above the ceiling: healing never lowers health
        let mut over = VitalityModel::new(120.0).with_ceiling(Some(100.0));
        authorized(|auth| over.heal(auth, 5.0));
        assert_eq!(over.health(), 120.0);
    }

    #[test]
    fn test_restore_sets_exact_value() {
        let mut wounded = VitalityModel::new(40.0);
        authorized(|auth| wounded.restore(auth, DEFAULT_HEALTH));
        assert_eq!(wounded.health(), DEFAULT_HEALTH);
        assert_eq!(
            wounded.drain_events(),
            vec![
                VitalityEvent::Healed { amount: 60.0 },
                VitalityEvent::Changed { old: 40.0, new: 100.0 },
            ]
        );

        // Overhealed health comes back down without a heal notification
        let mut overhealed = VitalityModel::new(150.0);
        authorized(|auth| overhealed.restore(auth, DEFAULT_HEALTH));
        assert_eq!(overhealed.health(), DEFAULT_HEALTH);
        assert_eq!(
            overhealed.drain_events(),
            vec![VitalityEvent::Changed { old: 150.0, new: 100.0 }]
        );
    }

    #[test]
    fn test_replicated_value_only_notifies_on_change() {
        let mut vitality = VitalityModel::new(100.0);
        vitality.apply_replicated(100.0);
        assert!(vitality.drain_events().is_empty());

        vitality.apply_replicated(80.0);
        assert_eq!(vitality.drain_events(), vec![VitalityEvent::Changed { old: 100.0, new: 80.0 }]);
    }

    #[test]
    fn test_damage_feedback_only_for_local_hinted() {
        assert_eq!(damage_feedback(NetRole::owner(), true), Some(DAMAGE_PUNCH));
        assert_eq!(damage_feedback(NetRole::owner(), false), None);
        assert_eq!(damage_feedback(NetRole::observer(), true), None);
        assert_eq!(damage_feedback(NetRole::server(), true), None);
    }
}
