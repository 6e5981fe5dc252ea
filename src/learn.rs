//! Learn session
//!
//! Captures the next button press and turns it into a cue trigger binding.
//! Two flavors exist; arming one cancels the other. The session only
//! observes raw events, it never consumes them, so the press that completes
//! a capture is still resolved normally by the mapping table.

use tracing::info;

use crate::mapping::{EventKind, RawEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LearnFlavor {
    /// Armed by `/learn/start`, target picked with `/cue/{n}`
    Standard,
    /// Armed by `/learn/momentary/start`, target picked with `/cue/momentary/{n}`
    Momentary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LearnState {
    #[default]
    Idle,
    AwaitingTarget(LearnFlavor),
    AwaitingEvent { flavor: LearnFlavor, slot: usize },
}

/// A completed capture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LearnCapture {
    pub flavor: LearnFlavor,
    pub channel: u8,
    pub control: u8,
    pub slot: usize,
}

impl LearnCapture {
    /// Both flavors bind to the momentary trigger of the slot
    pub fn target_address(&self) -> String {
        format!("/cue/momentary/{}", self.slot)
    }
}

#[derive(Debug, Default)]
pub struct LearnSession {
    state: LearnState,
}

impl LearnSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> LearnState {
        self.state
    }

    pub fn armed_flavor(&self) -> Option<LearnFlavor> {
        match self.state {
            LearnState::Idle => None,
            LearnState::AwaitingTarget(flavor) | LearnState::AwaitingEvent { flavor, .. } => {
                Some(flavor)
            }
        }
    }

    pub fn is_armed(&self, flavor: LearnFlavor) -> bool {
        self.armed_flavor() == Some(flavor)
    }

    /// Arm `flavor`, discarding any other capture in progress
    pub fn start(&mut self, flavor: LearnFlavor) {
        if let Some(previous) = self.armed_flavor().filter(|f| *f != flavor) {
            info!("Learn: {:?} capture cancelled", previous);
        }
        self.state = LearnState::AwaitingTarget(flavor);
        info!("🎓 Learn ({:?}): armed, select a cue slot", flavor);
    }

    /// Force idle from any state
    pub fn cancel(&mut self) {
        if self.state != LearnState::Idle {
            info!("Learn: cancelled");
        }
        self.state = LearnState::Idle;
    }

    /// Cancel only if `flavor` is the one armed
    pub fn cancel_flavor(&mut self, flavor: LearnFlavor) {
        if self.is_armed(flavor) {
            self.cancel();
        }
    }

    /// Record the chosen slot. Re-selecting while waiting for the press
    /// replaces the previous choice. Returns false when `flavor` is not armed.
    pub fn select_target(&mut self, flavor: LearnFlavor, slot: usize) -> bool {
        if !self.is_armed(flavor) {
            return false;
        }
        if self.state != (LearnState::AwaitingEvent { flavor, slot }) {
            info!(
                "🎓 Learn ({:?}): cue {} selected, waiting for a button press",
                flavor, slot
            );
        }
        self.state = LearnState::AwaitingEvent { flavor, slot };
        true
    }

    /// Feed a raw event. A press while waiting for an event completes the
    /// capture and returns the session to idle.
    pub fn observe(&mut self, event: &RawEvent) -> Option<LearnCapture> {
        if event.kind != EventKind::DiscreteOn {
            return None;
        }
        let LearnState::AwaitingEvent { flavor, slot } = self.state else {
            return None;
        };
        self.state = LearnState::Idle;
        Some(LearnCapture {
            flavor,
            channel: event.channel,
            control: event.control,
            slot,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_capture_cycle() {
        let mut learn = LearnSession::new();
        learn.start(LearnFlavor::Standard);
        assert_eq!(learn.state(), LearnState::AwaitingTarget(LearnFlavor::Standard));

        // Events before a target is chosen are ignored
        assert!(learn.observe(&RawEvent::press("pad", 1, 40, 127)).is_none());

        assert!(learn.select_target(LearnFlavor::Standard, 4));
        assert!(learn.observe(&RawEvent::continuous("pad", 1, 40, 10)).is_none());
        assert!(learn.observe(&RawEvent::release("pad", 1, 40)).is_none());

        let capture = learn.observe(&RawEvent::press("pad", 2, 41, 90)).unwrap();
        assert_eq!((capture.channel, capture.control, capture.slot), (2, 41, 4));
        assert_eq!(capture.target_address(), "/cue/momentary/4");
        assert_eq!(learn.state(), LearnState::Idle);
    }

    #[test]
    fn test_starting_one_flavor_cancels_the_other() {
        let mut learn = LearnSession::new();
        learn.start(LearnFlavor::Standard);
        learn.select_target(LearnFlavor::Standard, 2);
        learn.start(LearnFlavor::Momentary);
        assert!(learn.is_armed(LearnFlavor::Momentary));
        assert!(!learn.is_armed(LearnFlavor::Standard));
        assert!(!learn.select_target(LearnFlavor::Standard, 3));
    }

    #[test]
    fn test_cancel_paths() {
        let mut learn = LearnSession::new();
        learn.start(LearnFlavor::Momentary);
        learn.cancel_flavor(LearnFlavor::Standard);
        assert!(learn.is_armed(LearnFlavor::Momentary));
        learn.cancel_flavor(LearnFlavor::Momentary);
        assert_eq!(learn.state(), LearnState::Idle);

        learn.start(LearnFlavor::Standard);
        learn.select_target(LearnFlavor::Standard, 1);
        learn.cancel();
        assert!(learn.observe(&RawEvent::press("pad", 1, 1, 1)).is_none());
    }
}
