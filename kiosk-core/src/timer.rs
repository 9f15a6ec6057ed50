//! Named one-shot timer slots.
//!
//! The state machine never owns a clock. It only records which countdown of
//! each kind is armed, identified by a [`TimerId`]; the executor schedules the
//! actual delay and reports back with `TimerFired { kind, id }`. A firing is
//! honoured only if its id is still the armed one, so a countdown that was
//! cancelled or superseded can never fire late.

use std::fmt;

/// The two session countdowns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Runs while a QR code is shown; restarted by activity
    Idle,
    /// Runs after auto-close; not extendable
    Reset,
}

impl fmt::Display for TimerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimerKind::Idle => f.write_str("idle"),
            TimerKind::Reset => f.write_str("reset"),
        }
    }
}

/// Identity of one armed countdown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

/// At most one armed countdown per [`TimerKind`].
#[derive(Debug, Default)]
pub struct TimerSlots {
    next_id: u64,
    idle: Option<TimerId>,
    reset: Option<TimerId>,
}

impl TimerSlots {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot_mut(&mut self, kind: TimerKind) -> &mut Option<TimerId> {
        match kind {
            TimerKind::Idle => &mut self.idle,
            TimerKind::Reset => &mut self.reset,
        }
    }

    /// Arm a countdown, replacing any previous one of the same kind.
    pub fn arm(&mut self, kind: TimerKind) -> TimerId {
        self.next_id += 1;
        let id = TimerId(self.next_id);
        *self.slot_mut(kind) = Some(id);
        id
    }

    /// Disarm a countdown. Returns whether one was armed.
    pub fn cancel(&mut self, kind: TimerKind) -> bool {
        self.slot_mut(kind).take().is_some()
    }

    /// Consume a firing. Returns `true` only for the currently armed id,
    /// which is disarmed in the process.
    pub fn fire(&mut self, kind: TimerKind, id: TimerId) -> bool {
        let slot = self.slot_mut(kind);
        if *slot == Some(id) {
            *slot = None;
            true
        } else {
            false
        }
    }

    pub fn is_armed(&self, kind: TimerKind) -> bool {
        match kind {
            TimerKind::Idle => self.idle.is_some(),
            TimerKind::Reset => self.reset.is_some(),
        }
    }

    pub fn armed(&self, kind: TimerKind) -> Option<TimerId> {
        match kind {
            TimerKind::Idle => self.idle,
            TimerKind::Reset => self.reset,
        }
    }

    pub fn any_armed(&self) -> bool {
        self.idle.is_some() || self.reset.is_some()
    }
}
