//! Input mapping engine
//!
//! Turns raw controller events into normalized control messages.
//!
//! - [`curve`]: pure shaping functions (linear, centered, relative, gamma)
//! - [`rules`]: continuous and discrete binding rules
//! - [`table`]: the [`MappingTable`] that resolves events and owns
//!   accumulator, toggle and exclusivity bookkeeping
//! - [`store`]: the JSON storage document, built-in defaults and auto-repair

pub mod curve;
pub mod rules;
pub mod store;
pub mod table;

use std::fmt;
use std::sync::Arc;

use crate::osc::ControlMessage;

pub use rules::{ContinuousRule, DiscreteRule, GroupPolicy, Indicator, Shaping};
pub use store::{LoadReport, MappingDocument, RuleSource};
pub use table::{BindOutcome, MappingTable};

/// What a raw controller event represents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Continuous,
    DiscreteOn,
    DiscreteOff,
}

/// Decoded controller event as delivered by a device collaborator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    /// Port or device the event came from
    pub source: Arc<str>,
    /// 1-based channel
    pub channel: u8,
    /// Controller or note number
    pub control: u8,
    pub kind: EventKind,
    /// 0..127, velocity for discrete events
    pub value: u8,
}

impl RawEvent {
    pub fn continuous(source: &str, channel: u8, control: u8, value: u8) -> Self {
        Self {
            source: Arc::from(source),
            channel,
            control,
            kind: EventKind::Continuous,
            value,
        }
    }

    pub fn press(source: &str, channel: u8, control: u8, velocity: u8) -> Self {
        Self {
            source: Arc::from(source),
            channel,
            control,
            kind: EventKind::DiscreteOn,
            value: velocity,
        }
    }

    pub fn release(source: &str, channel: u8, control: u8) -> Self {
        Self {
            source: Arc::from(source),
            channel,
            control,
            kind: EventKind::DiscreteOff,
            value: 0,
        }
    }

    pub fn key(&self) -> ControlKey {
        ControlKey::new(self.channel, self.control)
    }
}

impl fmt::Display for RawEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            EventKind::Continuous => "CC",
            EventKind::DiscreteOn => "ON",
            EventKind::DiscreteOff => "OFF",
        };
        write!(
            f,
            "[{}] ch {} #{} {} {}",
            self.source, self.channel, self.control, kind, self.value
        )
    }
}

/// (channel, control-id) pair identifying a physical control
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ControlKey {
    pub channel: u8,
    pub control: u8,
}

impl ControlKey {
    pub const fn new(channel: u8, control: u8) -> Self {
        Self { channel, control }
    }
}

impl fmt::Display for ControlKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ch{}/{}", self.channel, self.control)
    }
}

/// Indicator-level command sent back to the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Feedback {
    pub channel: u8,
    pub control: u8,
    pub level: u8,
}

/// Output of resolving one raw event
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Resolution {
    pub intents: Vec<ControlMessage>,
    pub feedback: Vec<Feedback>,
}

impl Resolution {
    pub fn is_empty(&self) -> bool {
        self.intents.is_empty() && self.feedback.is_empty()
    }
}
