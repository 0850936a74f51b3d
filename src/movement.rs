//! The controllers never report direction; opening/closing is inferred from
//! successive position samples and cleared once the target is reached.

/// Position delta within which the shade counts as arrived at its target.
pub const ARRIVAL_TOLERANCE: u8 = 2;

#[derive(Debug, Clone, Default)]
pub struct MovementTracker {
    opening: bool,
    closing: bool,
    target: Option<u8>,
    last_position: Option<u8>,
    // set right after an explicit stop; the next status sample (which may be
    // a stale in-flight reply) is recorded without reinterpretation, then
    // inference resumes
    stopping: bool,
}

impl MovementTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_opening(&self) -> bool {
        self.opening
    }

    pub fn is_closing(&self) -> bool {
        self.closing
    }

    pub fn target(&self) -> Option<u8> {
        self.target
    }

    pub fn last_position(&self) -> Option<u8> {
        self.last_position
    }

    /// Single transition point for movement intent; `opening && closing`
    /// can never hold.
    pub fn apply_intent(&mut self, opening: bool, closing: bool, target: Option<u8>) {
        debug_assert!(!(opening && closing));
        self.opening = opening && !closing;
        self.closing = closing;
        self.target = target;
        self.stopping = false;
    }

    /// An explicit stop: flags drop immediately and the next sample is kept
    /// from re-asserting movement.
    pub fn apply_stop(&mut self) {
        self.opening = false;
        self.closing = false;
        self.target = None;
        self.stopping = true;
    }

    /// Feed a fresh position sample and reinterpret the flags from it.
    pub fn observe(&mut self, position: u8) {
        let Some(previous) = self.last_position else {
            // first sample: record only, no inference
            self.last_position = Some(position);
            return;
        };
        self.last_position = Some(position);
        if self.stopping {
            // one sample absorbed silently, then inference resumes
            self.stopping = false;
            return;
        }
        if position > previous {
            self.opening = true;
            self.closing = false;
        } else if position < previous {
            self.opening = false;
            self.closing = true;
        }
        // arrival takes precedence over direction
        if let Some(target) = self.target {
            if position.abs_diff(target) <= ARRIVAL_TOLERANCE {
                self.opening = false;
                self.closing = false;
                self.target = None;
            }
        }
    }
}
