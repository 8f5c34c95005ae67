//! Input frames and edge-triggered intent latches

use serde::{Deserialize, Serialize};

/// Auxiliary action buttons carried alongside the movement intents
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionFlags {
    pub hand_action: bool,
    pub hand_action2: bool,
    pub slot1: bool,
    pub slot2: bool,
    pub slot3: bool,
    pub slot4: bool,
    pub slot5: bool,
    pub drop: bool,
    pub reload: bool,
    pub next_item: bool,
    pub prev_item: bool,
    pub brake: bool,
    pub flashlight: bool,
}

/// A single tick's captured input intents
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputFrame {
    /// Forward axis (-1.0 = back, 1.0 = forward)
    pub move_forward: f32,
    /// Strafe axis (-1.0 = left, 1.0 = right)
    pub move_right: f32,
    pub jump: bool,
    pub crouch: bool,
    pub sprint: bool,
    pub interact: bool,
    pub actions: ActionFlags,
}

impl InputFrame {
    /// Clamp both axes into [-1, 1]. Non-finite values read as released.
    pub fn sanitized(mut self) -> Self {
        self.move_forward = clamp_axis(self.move_forward);
        self.move_right = clamp_axis(self.move_right);
        self
    }
}

fn clamp_axis(value: f32) -> f32 {
    if value.is_finite() {
        value.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

/// Three-state reading of a continuous axis: only the sign matters
pub fn axis_sign(value: f32) -> f32 {
    if value > 0.0 {
        1.0
    } else if value < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// The frame consumed by the previous tick and the latest one received since
#[derive(Debug, Clone, Default)]
pub struct InputHistory {
    previous: InputFrame,
    latest: InputFrame,
}

impl InputHistory {
    /// Record a newly received frame. Frames received between two ticks
    /// overwrite each other; only the last one is ever sampled.
    pub fn receive(&mut self, frame: InputFrame) {
        self.latest = frame;
    }

    pub fn previous(&self) -> &InputFrame {
        &self.previous
    }

    pub fn latest(&self) -> &InputFrame {
        &self.latest
    }

    /// Mark the latest frame as consumed by a tick
    pub fn advance(&mut self) {
        self.previous = self.latest;
    }

    /// Forget everything, as if no key had ever been held
    pub fn reset(&mut self) {
        self.previous = InputFrame::default();
        self.latest = InputFrame::default();
    }
}

/// State of an edge-triggered intent
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LatchState {
    /// Key released, or held without an observed press
    #[default]
    Idle,
    /// Press observed and not yet used
    Armed,
    /// Press used by the integrator; stays here until release
    Consumed,
}

/// Per-flag state machine deriving a one-shot intent from two input samples
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EdgeLatch {
    state: LatchState,
}

impl EdgeLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance with the previous and current held state. Returns whether the
    /// intent is armed after the transition.
    pub fn update(&mut self, was_held: bool, held: bool) -> bool {
        self.state = match (self.state, was_held, held) {
            (_, _, false) => LatchState::Idle,
            (_, false, true) => LatchState::Armed,
            // Press and release both landed in frames that were overwritten
            // before a tick sampled them: the press is lost.
            (LatchState::Idle, true, true) => LatchState::Idle,
            (state, true, true) => state,
        };
        self.is_armed()
    }

    /// Mark an armed intent as used
    pub fn consume(&mut self) {
        if self.state == LatchState::Armed {
            self.state = LatchState::Consumed;
        }
    }

    pub fn is_armed(&self) -> bool {
        self.state == LatchState::Armed
    }

    pub fn state(&self) -> LatchState {
        self.state
    }

    pub fn clear(&mut self) {
        self.state = LatchState::Idle;
    }
}
