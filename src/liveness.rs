//! Availability is derived, never reported: a device is presumed reachable
//! based on how recently it answered and how many request cycles have failed
//! in a row. All methods take an explicit `now` so the model stays clocked
//! by its caller.

use crate::constants::{
    AVAILABILITY_GRACE, MAX_CONSECUTIVE_FAILURES, RESPONSE_FRESHNESS, SILENCE_LIMIT,
};
use tokio::time::Instant;

/// Observable availability change. Emitted at most once per edge; repeated
/// evaluations in the same state stay silent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Online,
    Offline,
}

#[derive(Debug, Clone)]
pub struct Liveness {
    last_response: Instant,
    consecutive_failures: u32,
    presumed_available: bool,
}

impl Liveness {
    /// A fresh session starts presumed reachable, as if it had just heard
    /// from the device.
    pub fn new(now: Instant) -> Self {
        Self {
            last_response: now,
            consecutive_failures: 0,
            presumed_available: true,
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Availability as callers observe it: anything heard from inside the
    /// grace window counts, regardless of accumulated failures.
    pub fn is_available(&self, now: Instant) -> bool {
        if now.duration_since(self.last_response) < AVAILABILITY_GRACE {
            return true;
        }
        self.presumed_available
    }

    /// True when a reply was recorded inside the freshness window, i.e. the
    /// in-flight request can be considered answered.
    pub fn response_is_fresh(&self, now: Instant) -> bool {
        now.duration_since(self.last_response) < RESPONSE_FRESHNESS
    }

    /// A status reply arrived. Resets the failure count unconditionally;
    /// returns `Online` when this flips the presumed state.
    pub fn on_response(&mut self, now: Instant) -> Option<Transition> {
        self.last_response = now;
        self.consecutive_failures = 0;
        if !self.presumed_available {
            self.presumed_available = true;
            return Some(Transition::Online);
        }
        None
    }

    /// A full retry cycle ended without any reply. Past the threshold the
    /// device goes offline even before the silence limit elapses.
    pub fn on_cycle_failure(&mut self) -> Option<Transition> {
        self.consecutive_failures += 1;
        if self.consecutive_failures >= MAX_CONSECUTIVE_FAILURES && self.presumed_available {
            self.presumed_available = false;
            return Some(Transition::Offline);
        }
        None
    }

    /// Timer evaluation: long silence marks the device offline; anything
    /// more recent flips it back online.
    pub fn evaluate(&mut self, now: Instant) -> Option<Transition> {
        if now.duration_since(self.last_response) > SILENCE_LIMIT {
            if self.presumed_available {
                self.presumed_available = false;
                return Some(Transition::Offline);
            }
        } else if !self.presumed_available {
            self.presumed_available = true;
            return Some(Transition::Online);
        }
        None
    }
}
