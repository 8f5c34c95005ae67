//! Buffers for engine callbacks that arrive between ticks

use std::sync::Arc;

use super::environment::Volume;
use super::impact::CollisionEvent;

/// Overlap change reported by the physics host
#[derive(Debug, Clone)]
pub enum TriggerEvent {
    Enter(Arc<dyn Volume>),
    Exit(Arc<dyn Volume>),
}

/// Everything a tick drains in one go
#[derive(Debug, Default)]
pub struct DrainedEvents {
    pub triggers: Vec<TriggerEvent>,
    pub collisions: Vec<CollisionEvent>,
}

/// Holds trigger and collision events until the next tick consumes them
#[derive(Debug, Default)]
pub struct EventBuffer {
    triggers: Vec<TriggerEvent>,
    collisions: Vec<CollisionEvent>,
}

impl EventBuffer {
    pub fn push_trigger(&mut self, event: TriggerEvent) {
        self.triggers.push(event);
    }

    pub fn push_collision(&mut self, event: CollisionEvent) {
        self.collisions.push(event);
    }

    pub fn is_empty(&self) -> bool {
        self.triggers.is_empty() && self.collisions.is_empty()
    }

    /// Hand over every buffered event, in arrival order
    pub fn drain(&mut self) -> DrainedEvents {
        DrainedEvents {
            triggers: std::mem::take(&mut self.triggers),
            collisions: std::mem::take(&mut self.collisions),
        }
    }
}
