//! Snapshot building

use crate::ws::protocol::{CharacterSnapshot, GameEvent, ServerMsg};

use super::character::Character;

/// Builds snapshots for network transmission
pub struct SnapshotBuilder {
    /// Tick counter since last snapshot
    ticks_since_snapshot: u32,
    /// Snapshot interval in ticks
    snapshot_interval: u32,
}

impl SnapshotBuilder {
    pub fn new(snapshot_interval: u32) -> Self {
        Self {
            ticks_since_snapshot: 0,
            snapshot_interval,
        }
    }

    /// Check if it's time to send a snapshot
    pub fn should_send(&mut self) -> bool {
        self.ticks_since_snapshot += 1;
        if self.ticks_since_snapshot >= self.snapshot_interval {
            self.ticks_since_snapshot = 0;
            true
        } else {
            false
        }
    }

    /// Force snapshot on next check (used for spawns)
    pub fn force_next(&mut self) {
        self.ticks_since_snapshot = self.snapshot_interval;
    }

    /// Build a snapshot message
    pub fn build<'a>(
        &self,
        tick: u64,
        characters: impl Iterator<Item = &'a Character>,
        events: Vec<GameEvent>,
    ) -> ServerMsg {
        let players: Vec<CharacterSnapshot> = characters.map(Character::snapshot).collect();

        ServerMsg::Snapshot {
            tick,
            players,
            events,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sends_every_interval() {
        let mut builder = SnapshotBuilder::new(2);
        let sent: Vec<bool> = (0..6).map(|_| builder.should_send()).collect();
        assert_eq!(sent, vec![false, true, false, true, false, true]);
    }

    #[test]
    fn test_force_next_sends_immediately() {
        let mut builder = SnapshotBuilder::new(4);
        builder.should_send();
        builder.force_next();
        assert!(builder.should_send());
        assert!(!builder.should_send());
    }

    #[test]
    fn test_build_without_players() {
        let builder = SnapshotBuilder::new(2);
        let msg = builder.build(9, std::iter::empty(), Vec::new());
        assert_eq!(
            msg,
            ServerMsg::Snapshot {
                tick: 9,
                players: Vec::new(),
                events: Vec::new(),
            }
        );
    }
}
