//! Mapping table
//!
//! Holds the active rule set and the runtime bookkeeping that outlives a
//! single event: relative accumulators, toggle states and the active member
//! of every exclusive group. Resolution is synchronous and allocation-light;
//! it is driven from the router task, which owns the table.

use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, warn};

use super::rules::{ContinuousRule, DiscreteRule, GroupPolicy};
use super::store::{CcEntry, GroupEntry, MappingDocument, NoteEntry};
use super::{ControlKey, EventKind, Feedback, RawEvent, Resolution};
use crate::osc::ControlMessage;

/// Result of [`MappingTable::learn_bind`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindOutcome {
    Inserted,
    Updated,
}

/// Two rules on the same control pointing at different targets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateBinding {
    pub key: ControlKey,
    pub first: String,
    pub second: String,
}

#[derive(Debug, Default)]
pub struct MappingTable {
    continuous: Vec<ContinuousRule>,
    discrete: Vec<DiscreteRule>,
    groups: BTreeMap<String, GroupPolicy>,

    /// Relative-encoder running values keyed by the concrete control
    accumulators: HashMap<ControlKey, f32>,
    toggles: HashMap<ControlKey, bool>,
    /// group name -> currently active member
    active: HashMap<String, ControlKey>,
}

impl MappingTable {
    pub fn from_document(doc: &MappingDocument) -> Self {
        let mut table = Self::default();
        table.replace_rules(doc);
        table
    }

    /// Swap in a new rule set, keeping accumulators, toggles and group
    /// latches so a reload does not disturb the controller state.
    pub fn replace_rules(&mut self, doc: &MappingDocument) {
        self.continuous = doc.cc.iter().map(ContinuousRule::from).collect();
        self.discrete = doc.notes.iter().map(DiscreteRule::from).collect();
        self.groups = doc
            .groups
            .iter()
            .map(|(name, entry)| (name.clone(), GroupPolicy::from(*entry)))
            .collect();

        for dup in self.duplicate_bindings() {
            warn!(
                "⚠️  Duplicate binding on {}: {} and {} (both will fire)",
                dup.key, dup.first, dup.second
            );
        }
    }

    /// Storage form of the current rules
    pub fn document(&self) -> MappingDocument {
        MappingDocument {
            cc: self.continuous.iter().map(CcEntry::from).collect(),
            notes: self.discrete.iter().map(NoteEntry::from).collect(),
            groups: self
                .groups
                .iter()
                .map(|(name, policy)| {
                    (
                        name.clone(),
                        GroupEntry {
                            suppress_off: policy.suppress_off,
                        },
                    )
                })
                .collect(),
        }
    }

    pub fn continuous_rules(&self) -> &[ContinuousRule] {
        &self.continuous
    }

    pub fn discrete_rules(&self) -> &[DiscreteRule] {
        &self.discrete
    }

    pub fn group_policy(&self, group: &str) -> GroupPolicy {
        self.groups
            .get(group)
            .copied()
            .unwrap_or_else(|| GroupPolicy::implicit(group))
    }

    pub fn active_member(&self, group: &str) -> Option<ControlKey> {
        self.active.get(group).copied()
    }

    pub fn toggle_state(&self, key: ControlKey) -> bool {
        self.toggles.get(&key).copied().unwrap_or(false)
    }

    pub fn accumulator(&self, key: ControlKey) -> Option<f32> {
        self.accumulators.get(&key).copied()
    }

    /// Overlapping bindings with different targets, per rule kind. A
    /// continuous rule on channel 0 overlaps that control on every channel.
    pub fn duplicate_bindings(&self) -> Vec<DuplicateBinding> {
        let continuous = self
            .continuous
            .iter()
            .map(|r| (false, ControlKey::new(r.channel, r.control), r.target.as_str()));
        let discrete = self
            .discrete
            .iter()
            .map(|r| (true, r.key(), r.target.as_str()));
        let bindings: Vec<(bool, ControlKey, &str)> = continuous.chain(discrete).collect();

        let overlaps = |is_note: bool, a: ControlKey, b: ControlKey| {
            a.control == b.control
                && (a.channel == b.channel || (!is_note && (a.channel == 0 || b.channel == 0)))
        };

        let mut dups = Vec::new();
        for (i, &(is_note, key, target)) in bindings.iter().enumerate() {
            let first = bindings[..i]
                .iter()
                .find(|(other_note, other, _)| *other_note == is_note && overlaps(is_note, *other, key));
            if let Some(&(_, _, first)) = first {
                if first != target {
                    dups.push(DuplicateBinding {
                        key,
                        first: first.to_string(),
                        second: target.to_string(),
                    });
                }
            }
        }
        dups
    }

    /// Indicator levels to send when a controller is first connected:
    /// every feedback-enabled rule at its off level, then active groups.
    pub fn initial_feedback(&self) -> Vec<Feedback> {
        let mut out: Vec<Feedback> = self
            .discrete
            .iter()
            .filter(|r| r.indicator.enabled)
            .map(|r| Feedback {
                channel: r.channel,
                control: r.control,
                level: r.indicator.off,
            })
            .collect();
        let groups: Vec<String> = self.active.keys().cloned().collect();
        for group in groups {
            out.extend(self.refresh_group(&group));
        }
        out
    }

    /// Resolve one raw event into intents and indicator feedback
    pub fn resolve(&mut self, event: &RawEvent) -> Resolution {
        let mut out = Resolution::default();
        match event.kind {
            EventKind::Continuous => self.resolve_continuous(event, &mut out),
            EventKind::DiscreteOn | EventKind::DiscreteOff => self.resolve_discrete(event, &mut out),
        }
        out
    }

    fn resolve_continuous(&mut self, event: &RawEvent, out: &mut Resolution) {
        let key = event.key();
        for rule in self
            .continuous
            .iter()
            .filter(|r| r.matches(event.channel, event.control))
        {
            let acc = if rule.shaping.is_relative() {
                Some(self.accumulators.entry(key).or_insert(0.0))
            } else {
                None
            };
            let value = rule.evaluate(event.value, acc);
            debug!("{} → {} {:.4}", key, rule.target, value);
            out.intents.push(ControlMessage::float(rule.target.clone(), value));
        }
    }

    fn resolve_discrete(&mut self, event: &RawEvent, out: &mut Resolution) {
        let pressed = event.kind == EventKind::DiscreteOn;
        let key = event.key();
        let matching: Vec<usize> = self
            .discrete
            .iter()
            .enumerate()
            .filter(|(_, r)| r.matches(event.channel, event.control))
            .map(|(i, _)| i)
            .collect();

        for index in matching {
            let rule = &self.discrete[index];

            if rule.toggle {
                if pressed {
                    let next = !self.toggle_state(key);
                    self.toggles.insert(key, next);
                    let rule = &self.discrete[index];
                    let value = if next { rule.on_value } else { rule.off_value };
                    debug!("{} TOGGLE → {} {}", key, rule.target, value);
                    out.intents.push(ControlMessage::float(rule.target.clone(), value));
                    push_indicator(out, rule, next);
                }
                continue;
            }

            if let Some(group) = rule.group().map(str::to_string) {
                if pressed {
                    self.press_exclusive(index, &group, event.value, out);
                } else if rule.indicator.enabled {
                    // Latch: the release changes nothing, but re-assert indicators
                    // for controllers that clear them on release.
                    out.feedback.extend(self.refresh_group(&group));
                }
                continue;
            }

            if pressed {
                let value = rule.press_value(event.value);
                out.intents.push(ControlMessage::float(rule.target.clone(), value));
                push_indicator(out, rule, true);
            } else {
                if !rule.is_cue_recall() {
                    out.intents
                        .push(ControlMessage::float(rule.target.clone(), rule.off_value));
                }
                push_indicator(out, rule, false);
            }
        }
    }

    fn press_exclusive(&mut self, index: usize, group: &str, velocity: u8, out: &mut Resolution) {
        let rule = &self.discrete[index];
        let key = rule.key();
        let policy = self.group_policy(group);

        out.intents.push(ControlMessage::float(
            rule.target.clone(),
            rule.press_value(velocity),
        ));

        for sibling in self.discrete.iter().filter(|other| {
            other.key() != key && other.channel == key.channel && other.group() == Some(group)
        }) {
            if policy.suppress_off {
                debug!("{} forced off (indicator only)", sibling.key());
            } else {
                out.intents.push(ControlMessage::float(
                    sibling.target.clone(),
                    sibling.off_value,
                ));
            }
        }

        self.active.insert(group.to_string(), key);
        out.feedback.extend(self.refresh_group(group));
    }

    /// Indicator levels for every feedback-enabled member of `group`:
    /// the active member at its on level, all others at their off level.
    pub fn refresh_group(&self, group: &str) -> Vec<Feedback> {
        let active = self.active.get(group).copied();
        self.discrete
            .iter()
            .filter(|r| r.group() == Some(group) && r.indicator.enabled)
            .map(|r| Feedback {
                channel: r.channel,
                control: r.control,
                level: if Some(r.key()) == active {
                    r.indicator.on
                } else {
                    r.indicator.off
                },
            })
            .collect()
    }

    /// Bind a control to `target` as a momentary button, rewriting the first
    /// existing discrete rule on that control or appending a new one.
    pub fn learn_bind(&mut self, channel: u8, control: u8, target: &str) -> BindOutcome {
        if let Some(rule) = self
            .discrete
            .iter_mut()
            .find(|r| r.matches(channel, control))
        {
            rule.target = target.to_string();
            rule.on_value = 1.0;
            rule.off_value = 0.0;
            rule.toggle = false;
            rule.velocity_as_value = false;
            info!("🎯 Rebound ch {} note {} → {}", channel, control, target);
            return BindOutcome::Updated;
        }

        self.discrete
            .push(DiscreteRule::momentary(channel, control, target));
        info!("🎯 Bound ch {} note {} → {}", channel, control, target);
        BindOutcome::Inserted
    }
}

fn push_indicator(out: &mut Resolution, rule: &DiscreteRule, on: bool) {
    if rule.indicator.enabled {
        out.feedback.push(Feedback {
            channel: rule.channel,
            control: rule.control,
            level: if on { rule.indicator.on } else { rule.indicator.off },
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::rules::{Indicator, Shaping};
    use proptest::prelude::*;

    fn grouped(channel: u8, control: u8, target: &str, group: &str) -> DiscreteRule {
        let mut rule = DiscreteRule::momentary(channel, control, target);
        rule.exclusive_group = Some(group.to_string());
        rule.indicator = Indicator {
            on: 3,
            off: 1,
            enabled: true,
        };
        rule
    }

    fn table_with(continuous: Vec<ContinuousRule>, discrete: Vec<DiscreteRule>) -> MappingTable {
        let doc = MappingDocument {
            cc: continuous.iter().map(CcEntry::from).collect(),
            notes: discrete.iter().map(NoteEntry::from).collect(),
            groups: BTreeMap::new(),
        };
        MappingTable::from_document(&doc)
    }

    fn level_of(feedback: &[Feedback], control: u8) -> Option<u8> {
        feedback
            .iter()
            .rev()
            .find(|f| f.control == control)
            .map(|f| f.level)
    }

    #[test]
    fn test_all_matching_continuous_rules_fire() {
        let mut table = table_with(
            vec![
                ContinuousRule::linear(1, 14, "/laser/brightness"),
                ContinuousRule::linear(0, 14, "/laser/dotted"),
                ContinuousRule::linear(2, 14, "/other"),
            ],
            vec![],
        );
        let res = table.resolve(&RawEvent::continuous("test", 1, 14, 127));
        let targets: Vec<_> = res.intents.iter().map(|m| m.address.as_str()).collect();
        assert_eq!(targets, vec!["/laser/brightness", "/laser/dotted"]);
        assert!(res.intents.iter().all(|m| m.value() == Some(1.0)));
    }

    #[test]
    fn test_relative_accumulator_is_per_physical_control() {
        let mut rule = ContinuousRule::linear(0, 20, "/move/size");
        rule.shaping = Shaping::Relative {
            step: 0.1,
            invert: false,
            gamma: 1.0,
        };
        let mut table = table_with(vec![rule], vec![]);

        table.resolve(&RawEvent::continuous("test", 1, 20, 3));
        table.resolve(&RawEvent::continuous("test", 2, 20, 1));
        let a = table.accumulator(ControlKey::new(1, 20)).unwrap();
        let b = table.accumulator(ControlKey::new(2, 20)).unwrap();
        assert!((a - 0.3).abs() < 1e-6);
        assert!((b - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_exclusive_press_latches_one_member() {
        let mut table = table_with(
            vec![],
            vec![
                grouped(1, 10, "/beam/select/none", "fx"),
                grouped(1, 11, "/beam/select/prisma", "fx"),
                grouped(1, 12, "/laser/blackout/hold", "fx"),
            ],
        );

        let res = table.resolve(&RawEvent::press("test", 1, 11, 100));
        assert_eq!(res.intents[0], ControlMessage::float("/beam/select/prisma", 1.0));
        // fx is not a suppressed group, so siblings receive OFF intents
        assert_eq!(res.intents.len(), 3);
        assert!(res.intents[1..].iter().all(|m| m.value() == Some(0.0)));
        assert_eq!(level_of(&res.feedback, 11), Some(3));
        assert_eq!(level_of(&res.feedback, 10), Some(1));
        assert_eq!(level_of(&res.feedback, 12), Some(1));
        assert_eq!(table.active_member("fx"), Some(ControlKey::new(1, 11)));

        let res = table.resolve(&RawEvent::release("test", 1, 11));
        assert!(res.intents.is_empty());
        assert_eq!(level_of(&res.feedback, 11), Some(3));
        assert_eq!(table.active_member("fx"), Some(ControlKey::new(1, 11)));
    }

    #[test]
    fn test_legacy_group_suppresses_off_intents() {
        let mut table = table_with(
            vec![],
            vec![
                grouped(1, 1, "/laser/shape/circle", "shapes"),
                grouped(1, 2, "/laser/shape/line", "shapes"),
            ],
        );
        let res = table.resolve(&RawEvent::press("test", 1, 2, 127));
        assert_eq!(res.intents, vec![ControlMessage::float("/laser/shape/line", 1.0)]);
        assert_eq!(level_of(&res.feedback, 1), Some(1));
        assert_eq!(level_of(&res.feedback, 2), Some(3));
    }

    #[test]
    fn test_explicit_group_policy_overrides_legacy_list() {
        let mut doc = MappingDocument {
            notes: vec![
                NoteEntry::from(&grouped(1, 1, "/a", "shapes")),
                NoteEntry::from(&grouped(1, 2, "/b", "shapes")),
            ],
            ..MappingDocument::default()
        };
        doc.groups
            .insert("shapes".into(), GroupEntry { suppress_off: false });
        let mut table = MappingTable::from_document(&doc);
        let res = table.resolve(&RawEvent::press("test", 1, 2, 127));
        assert_eq!(res.intents.len(), 2);
        assert_eq!(res.intents[1], ControlMessage::float("/a", 0.0));
    }

    #[test]
    fn test_toggle_ignores_release() {
        let mut rule = DiscreteRule::momentary(1, 5, "/motion/hold");
        rule.toggle = true;
        let mut table = table_with(vec![], vec![rule]);

        let on = table.resolve(&RawEvent::press("test", 1, 5, 127));
        assert_eq!(on.intents[0].value(), Some(1.0));
        assert!(table.resolve(&RawEvent::release("test", 1, 5)).is_empty());
        let off = table.resolve(&RawEvent::press("test", 1, 5, 127));
        assert_eq!(off.intents[0].value(), Some(0.0));
    }

    #[test]
    fn test_cue_recall_release_sends_only_indicator() {
        let mut rule = DiscreteRule::momentary(1, 30, "/cue/3");
        rule.indicator.enabled = true;
        let mut table = table_with(vec![], vec![rule]);

        let press = table.resolve(&RawEvent::press("test", 1, 30, 127));
        assert_eq!(press.intents, vec![ControlMessage::float("/cue/3", 1.0)]);
        let release = table.resolve(&RawEvent::release("test", 1, 30));
        assert!(release.intents.is_empty());
        assert_eq!(release.feedback[0].level, 0);
    }

    #[test]
    fn test_momentary_release_sends_off_value() {
        let mut rule = DiscreteRule::momentary(1, 64, "/flash");
        rule.velocity_as_value = true;
        let mut table = table_with(vec![], vec![rule]);
        let press = table.resolve(&RawEvent::press("test", 1, 64, 127));
        assert_eq!(press.intents[0].value(), Some(1.0));
        let release = table.resolve(&RawEvent::release("test", 1, 64));
        assert_eq!(release.intents[0].value(), Some(0.0));
    }

    #[test]
    fn test_learn_bind_updates_in_place_or_appends() {
        let mut table = MappingTable::from_document(&MappingDocument::defaults());
        assert_eq!(
            table.learn_bind(1, 64, "/cue/momentary/2"),
            BindOutcome::Updated
        );
        assert_eq!(table.discrete_rules().len(), 1);
        assert_eq!(table.discrete_rules()[0].target, "/cue/momentary/2");

        assert_eq!(
            table.learn_bind(3, 40, "/cue/momentary/7"),
            BindOutcome::Inserted
        );
        assert_eq!(table.discrete_rules().len(), 2);
        assert_eq!(table.document().notes[1].osc, "/cue/momentary/7");
    }

    #[test]
    fn test_duplicate_bindings_are_reported() {
        let table = table_with(
            vec![
                ContinuousRule::linear(1, 14, "/laser/brightness"),
                ContinuousRule::linear(1, 14, "/laser/dotted"),
                ContinuousRule::linear(1, 15, "/x"),
                ContinuousRule::linear(1, 15, "/x"),
            ],
            vec![],
        );
        let dups = table.duplicate_bindings();
        assert_eq!(dups.len(), 1);
        assert_eq!(dups[0].key, ControlKey::new(1, 14));
    }

    #[test]
    fn test_wildcard_channel_overlaps_concrete_rule() {
        let table = table_with(
            vec![
                ContinuousRule::linear(0, 7, "/laser/brightness"),
                ContinuousRule::linear(3, 7, "/laser/scanrate"),
                ContinuousRule::linear(4, 8, "/x"),
            ],
            vec![
                DiscreteRule::momentary(1, 7, "/flash"),
                DiscreteRule::momentary(2, 7, "/motion/hold"),
            ],
        );
        let dups = table.duplicate_bindings();
        assert_eq!(dups.len(), 1);
        assert_eq!(dups[0].key, ControlKey::new(3, 7));
        assert_eq!(dups[0].first, "/laser/brightness");
        assert_eq!(dups[0].second, "/laser/scanrate");
    }

    #[test]
    fn test_replace_rules_keeps_runtime_state() {
        let mut rule = DiscreteRule::momentary(1, 5, "/motion/hold");
        rule.toggle = true;
        let mut table = table_with(vec![], vec![rule]);
        table.resolve(&RawEvent::press("test", 1, 5, 127));
        let doc = table.document();
        table.replace_rules(&doc);
        assert!(table.toggle_state(ControlKey::new(1, 5)));
    }

    proptest! {
        #[test]
        fn test_toggle_alternates_from_on(releases in proptest::collection::vec(any::<bool>(), 1..40)) {
            let mut rule = DiscreteRule::momentary(1, 9, "/laser/axis/invert/x");
            rule.toggle = true;
            rule.on_value = 1.0;
            rule.off_value = 0.0;
            let mut table = table_with(vec![], vec![rule]);

            let mut emitted = Vec::new();
            for release_after in &releases {
                let res = table.resolve(&RawEvent::press("test", 1, 9, 127));
                emitted.extend(res.intents.iter().filter_map(|m| m.value()));
                if *release_after {
                    let res = table.resolve(&RawEvent::release("test", 1, 9));
                    prop_assert!(res.intents.is_empty());
                }
            }
            prop_assert_eq!(emitted.len(), releases.len());
            for (i, v) in emitted.iter().enumerate() {
                prop_assert_eq!(*v, if i % 2 == 0 { 1.0 } else { 0.0 });
            }
        }

        #[test]
        fn test_exclusive_group_has_one_active_member(presses in proptest::collection::vec((0u8..4, any::<bool>()), 1..30)) {
            let rules: Vec<_> = (0..4)
                .map(|i| grouped(1, 20 + i, &format!("/move/select/{}", i), "movement"))
                .collect();
            let mut table = table_with(vec![], rules);

            let mut last = None;
            for (member, release) in presses {
                let control = 20 + member;
                let res = table.resolve(&RawEvent::press("test", 1, control, 127));
                last = Some(control);
                for other in 20..24u8 {
                    let expected = if other == control { 3 } else { 1 };
                    prop_assert_eq!(level_of(&res.feedback, other), Some(expected));
                }
                if release {
                    table.resolve(&RawEvent::release("test", 1, control));
                }
                prop_assert_eq!(table.active_member("movement"), last.map(|c| ControlKey::new(1, c)));
            }
        }
    }
}
