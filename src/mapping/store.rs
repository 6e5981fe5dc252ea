//! Mapping storage document
//!
//! The on-disk format is a JSON object with `cc` and `notes` arrays whose
//! entries use flat camelCase fields, plus an optional `groups` object of
//! per-group policies. Every field is optional.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};

use super::rules::{ContinuousRule, DiscreteRule, GroupPolicy, Indicator, Shaping};
use crate::error::{self, StorageError};

/// Continuous rules every loaded file is expected to carry
const REQUIRED_RAINBOW_RULES: [(u8, &str); 3] = [
    (51, "/laser/rainbow/speed"),
    (52, "/laser/rainbow/amount"),
    (53, "/laser/rainbow/blend"),
];

/// Serialized mapping configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MappingDocument {
    #[serde(default)]
    pub cc: Vec<CcEntry>,
    #[serde(default)]
    pub notes: Vec<NoteEntry>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub groups: BTreeMap<String, GroupEntry>,
}

/// One continuous rule in storage form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CcEntry {
    pub channel: u8,
    pub cc: u8,
    pub osc: String,
    pub scale: f32,
    pub offset: f32,
    pub invert: bool,
    pub relative: bool,
    pub step: f32,
    pub out_min: f32,
    pub out_max: f32,
    pub gamma: f32,
    pub centered: bool,
    pub deadzone: f32,
}

impl Default for CcEntry {
    fn default() -> Self {
        Self {
            channel: 1,
            cc: 14,
            osc: "/laser/brightness".to_string(),
            scale: 1.0,
            offset: 0.0,
            invert: false,
            relative: false,
            step: 0.01,
            out_min: 0.0,
            out_max: 1.0,
            gamma: 1.0,
            centered: false,
            deadzone: 0.0,
        }
    }
}

/// One discrete rule in storage form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NoteEntry {
    pub channel: u8,
    pub note: u8,
    pub osc: String,
    pub on_value: f32,
    pub off_value: f32,
    pub velocity_as_value: bool,
    pub exclusive_group: String,
    pub led_on: u8,
    pub led_off: u8,
    pub led_feedback: bool,
    pub toggle: bool,
}

impl Default for NoteEntry {
    fn default() -> Self {
        Self {
            channel: 1,
            note: 60,
            osc: "/flash".to_string(),
            on_value: 1.0,
            off_value: 0.0,
            velocity_as_value: false,
            exclusive_group: String::new(),
            led_on: 1,
            led_off: 0,
            led_feedback: false,
            toggle: false,
        }
    }
}

/// Group policy in storage form
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GroupEntry {
    pub suppress_off: bool,
}

impl From<&CcEntry> for ContinuousRule {
    fn from(e: &CcEntry) -> Self {
        // relative wins over centered, centered over linear
        let shaping = if e.relative {
            Shaping::Relative {
                step: e.step,
                invert: e.invert,
                gamma: e.gamma,
            }
        } else if e.centered {
            Shaping::Centered {
                invert: e.invert,
                gamma: e.gamma,
                deadzone: e.deadzone.max(0.0),
            }
        } else {
            Shaping::Linear {
                scale: e.scale,
                offset: e.offset,
                invert: e.invert,
                gamma: e.gamma,
            }
        };
        ContinuousRule {
            channel: e.channel,
            control: e.cc,
            target: e.osc.clone(),
            shaping,
            out_min: e.out_min,
            out_max: e.out_max,
        }
    }
}

impl From<&ContinuousRule> for CcEntry {
    fn from(rule: &ContinuousRule) -> Self {
        let mut entry = CcEntry {
            channel: rule.channel,
            cc: rule.control,
            osc: rule.target.clone(),
            out_min: rule.out_min,
            out_max: rule.out_max,
            ..CcEntry::default()
        };
        match rule.shaping {
            Shaping::Linear {
                scale,
                offset,
                invert,
                gamma,
            } => {
                entry.scale = scale;
                entry.offset = offset;
                entry.invert = invert;
                entry.gamma = gamma;
            }
            Shaping::Centered {
                invert,
                gamma,
                deadzone,
            } => {
                entry.centered = true;
                entry.invert = invert;
                entry.gamma = gamma;
                entry.deadzone = deadzone;
            }
            Shaping::Relative { step, invert, gamma } => {
                entry.relative = true;
                entry.step = step;
                entry.invert = invert;
                entry.gamma = gamma;
            }
        }
        entry
    }
}

impl From<&NoteEntry> for DiscreteRule {
    fn from(e: &NoteEntry) -> Self {
        let group = e.exclusive_group.trim();
        DiscreteRule {
            channel: e.channel,
            control: e.note,
            target: e.osc.clone(),
            on_value: e.on_value,
            off_value: e.off_value,
            velocity_as_value: e.velocity_as_value,
            exclusive_group: (!group.is_empty()).then(|| group.to_string()),
            indicator: Indicator {
                on: e.led_on.min(127),
                off: e.led_off.min(127),
                enabled: e.led_feedback,
            },
            toggle: e.toggle,
        }
    }
}

impl From<&DiscreteRule> for NoteEntry {
    fn from(rule: &DiscreteRule) -> Self {
        NoteEntry {
            channel: rule.channel,
            note: rule.control,
            osc: rule.target.clone(),
            on_value: rule.on_value,
            off_value: rule.off_value,
            velocity_as_value: rule.velocity_as_value,
            exclusive_group: rule.exclusive_group.clone().unwrap_or_default(),
            led_on: rule.indicator.on,
            led_off: rule.indicator.off,
            led_feedback: rule.indicator.enabled,
            toggle: rule.toggle,
        }
    }
}

impl From<GroupEntry> for GroupPolicy {
    fn from(e: GroupEntry) -> Self {
        GroupPolicy {
            suppress_off: e.suppress_off,
        }
    }
}

/// Where the active rule set came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleSource {
    File,
    Defaults,
}

/// Outcome of [`MappingDocument::load`]
#[derive(Debug, Clone, PartialEq)]
pub struct LoadReport {
    pub source: RuleSource,
    /// Rules were appended by auto-repair and should be written back
    pub repaired: bool,
}

impl MappingDocument {
    /// Built-in rule set used when no usable file exists: master brightness
    /// on ch1/CC14, scan rate on ch8/CC7 and a flash button on ch1/note 64.
    pub fn defaults() -> Self {
        let brightness = ContinuousRule::linear(1, 14, "/laser/brightness");
        let scan = ContinuousRule::linear(8, 7, "/laser/scanrate");
        let flash = DiscreteRule::momentary(1, 64, "/flash");
        Self {
            cc: vec![(&brightness).into(), (&scan).into()],
            notes: vec![(&flash).into()],
            groups: BTreeMap::new(),
        }
    }

    /// Read the document at `path`, never failing: missing or malformed
    /// storage yields [`MappingDocument::defaults`].
    pub fn load(path: &Path) -> (Self, LoadReport) {
        match error::read_json::<MappingDocument>(path) {
            Ok(mut doc) => {
                let repaired = doc.repair();
                info!(
                    "Loaded {} continuous and {} discrete rules from {}",
                    doc.cc.len(),
                    doc.notes.len(),
                    path.display()
                );
                (
                    doc,
                    LoadReport {
                        source: RuleSource::File,
                        repaired,
                    },
                )
            }
            Err(StorageError::Missing { .. }) => {
                warn!("No mapping file at {}, using built-in defaults", path.display());
                (Self::defaults(), Self::defaults_report())
            }
            Err(e) => {
                warn!("{}; using built-in defaults", e);
                (Self::defaults(), Self::defaults_report())
            }
        }
    }

    fn defaults_report() -> LoadReport {
        LoadReport {
            source: RuleSource::Defaults,
            repaired: false,
        }
    }

    /// Append the rainbow controls when a file lacks them. Returns whether
    /// anything was added.
    pub fn repair(&mut self) -> bool {
        let mut added = false;
        for (cc, target) in REQUIRED_RAINBOW_RULES {
            if self.cc.iter().any(|e| e.channel == 1 && e.cc == cc) {
                continue;
            }
            let rule = if cc == 51 {
                ContinuousRule::centered(1, cc, target, -1.0, 1.0)
            } else {
                ContinuousRule::linear(1, cc, target)
            };
            info!("Auto-added ch1 CC{} → {}", cc, target);
            self.cc.push((&rule).into());
            added = true;
        }
        added
    }
}
