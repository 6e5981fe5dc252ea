//! Binding rules
//!
//! A [`ContinuousRule`] shapes fader/knob values, a [`DiscreteRule`] turns
//! button presses into on/off values with optional latching behaviour.

use super::curve;
use super::ControlKey;

/// Legacy radio groups that only ever send the ON message
pub const LEGACY_SUPPRESSED_GROUPS: [&str; 3] = ["shapes", "colors", "movement"];

/// Shaping policy of a continuous rule
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shaping {
    /// Absolute value: `clamp(v*scale+offset)` then gamma
    Linear {
        scale: f32,
        offset: f32,
        invert: bool,
        gamma: f32,
    },
    /// Bipolar around the controller midpoint
    Centered {
        invert: bool,
        gamma: f32,
        deadzone: f32,
    },
    /// Endless encoder accumulating signed steps
    Relative { step: f32, invert: bool, gamma: f32 },
}

impl Shaping {
    pub fn is_relative(&self) -> bool {
        matches!(self, Shaping::Relative { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Shaping::Linear { .. } => "linear",
            Shaping::Centered { .. } => "centered",
            Shaping::Relative { .. } => "relative",
        }
    }
}

impl Default for Shaping {
    fn default() -> Self {
        Shaping::Linear {
            scale: 1.0,
            offset: 0.0,
            invert: false,
            gamma: 1.0,
        }
    }
}

/// Continuous-control binding. Channel 0 matches any channel.
#[derive(Debug, Clone, PartialEq)]
pub struct ContinuousRule {
    pub channel: u8,
    pub control: u8,
    pub target: String,
    pub shaping: Shaping,
    pub out_min: f32,
    pub out_max: f32,
}

impl ContinuousRule {
    /// Plain 0..1 fader binding
    pub fn linear(channel: u8, control: u8, target: impl Into<String>) -> Self {
        Self {
            channel,
            control,
            target: target.into(),
            shaping: Shaping::default(),
            out_min: 0.0,
            out_max: 1.0,
        }
    }

    /// Bipolar knob binding emitting `out_min..out_max` with 0 at center
    pub fn centered(channel: u8, control: u8, target: impl Into<String>, out_min: f32, out_max: f32) -> Self {
        Self {
            channel,
            control,
            target: target.into(),
            shaping: Shaping::Centered {
                invert: false,
                gamma: 1.0,
                deadzone: 0.0,
            },
            out_min,
            out_max,
        }
    }

    pub fn matches(&self, channel: u8, control: u8) -> bool {
        (self.channel == 0 || self.channel == channel) && self.control == control
    }

    /// Output value for `raw`. `accumulator` is only read and written by
    /// relative rules; pass the per-control running value for those.
    pub fn evaluate(&self, raw: u8, accumulator: Option<&mut f32>) -> f32 {
        match self.shaping {
            Shaping::Linear {
                scale,
                offset,
                invert,
                gamma,
            } => {
                let v = curve::linear(raw, scale, offset, invert);
                self.to_range(curve::gamma(v, gamma))
            }
            Shaping::Centered {
                invert,
                gamma,
                deadzone,
            } => {
                let c = curve::centered(raw, invert);
                let c = curve::deadzone(curve::signed_gamma(c, gamma), deadzone);
                curve::map_range(c, -1.0, 1.0, self.out_min, self.out_max)
            }
            Shaping::Relative { step, invert, gamma } => {
                let step = curve::relative_step(raw, step, invert);
                let v = match accumulator {
                    Some(acc) => {
                        *acc = curve::accumulate(*acc, step);
                        *acc
                    }
                    None => curve::accumulate(0.0, step),
                };
                self.to_range(curve::gamma(v, gamma))
            }
        }
    }

    fn to_range(&self, unit: f32) -> f32 {
        curve::map_range(unit, 0.0, 1.0, self.out_min, self.out_max)
    }
}

/// Indicator levels sent back to the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Indicator {
    pub on: u8,
    pub off: u8,
    pub enabled: bool,
}

impl Default for Indicator {
    fn default() -> Self {
        Self {
            on: 1,
            off: 0,
            enabled: false,
        }
    }
}

/// Discrete (button/pad) binding
#[derive(Debug, Clone, PartialEq)]
pub struct DiscreteRule {
    pub channel: u8,
    pub control: u8,
    pub target: String,
    pub on_value: f32,
    pub off_value: f32,
    pub velocity_as_value: bool,
    pub exclusive_group: Option<String>,
    pub indicator: Indicator,
    pub toggle: bool,
}

impl DiscreteRule {
    /// Momentary button: on-value while pressed, off-value on release
    pub fn momentary(channel: u8, control: u8, target: impl Into<String>) -> Self {
        Self {
            channel,
            control,
            target: target.into(),
            on_value: 1.0,
            off_value: 0.0,
            velocity_as_value: false,
            exclusive_group: None,
            indicator: Indicator::default(),
            toggle: false,
        }
    }

    pub fn key(&self) -> ControlKey {
        ControlKey::new(self.channel, self.control)
    }

    pub fn matches(&self, channel: u8, control: u8) -> bool {
        self.channel == channel && self.control == control
    }

    /// Value emitted on press
    pub fn press_value(&self, velocity: u8) -> f32 {
        if self.velocity_as_value {
            (velocity as f32 / curve::RAW_MAX).clamp(0.0, 1.0)
        } else {
            self.on_value
        }
    }

    /// Rules that recall a stored cue: releasing them must not recall twice
    pub fn is_cue_recall(&self) -> bool {
        self.target.contains("/cue/") && !self.target.contains("/cue/momentary/")
    }

    pub fn group(&self) -> Option<&str> {
        self.exclusive_group.as_deref().filter(|g| !g.is_empty())
    }
}

/// Per-group handling of sibling OFF messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GroupPolicy {
    /// Only send indicator updates to siblings, no OFF intents
    pub suppress_off: bool,
}

impl GroupPolicy {
    /// Policy applied when a group has no explicit entry
    pub fn implicit(group: &str) -> Self {
        Self {
            suppress_off: LEGACY_SUPPRESSED_GROUPS.contains(&group),
        }
    }
}
