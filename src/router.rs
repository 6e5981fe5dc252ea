//! Router - the single owner of all mutable core state
//!
//! [`Core`] is the synchronous heart: it resolves raw controller events
//! through the mapping table, feeds the learn session, routes the cue/learn
//! address family and hands everything else to the live state. The
//! [`RouterActor`] wraps it in a tokio task with a frame ticker; producers
//! talk to it through a cloneable [`RouterHandle`].
//!
//! Ordering: raw events are resolved as soon as they arrive; the intents they
//! produce, the learn observation of each press and inbound protocol messages
//! share one queue that is applied at the next tick, in arrival order.

mod actor;
mod actor_handle;
mod commands;

#[cfg(test)]
mod tests;

pub use actor::{RouterActor, RouterOutputs};
pub use actor_handle::RouterHandle;
pub use commands::RouterCommand;

use std::collections::VecDeque;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::cue::{CueDocument, CueEngine};
use crate::learn::{LearnFlavor, LearnSession};
use crate::mapping::{EventKind, Feedback, MappingDocument, MappingTable, RawEvent, RuleSource};
use crate::osc::ControlMessage;
use crate::persistence::PersistRequest;
use crate::state::{LiveState, StateView};

/// Side effects produced by the core, collected until the actor flushes them
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Outbox {
    pub feedback: Vec<Feedback>,
    /// Resolved intents, mirrored to the optional protocol forwarder
    pub forwarded: Vec<ControlMessage>,
    pub persist: Vec<PersistRequest>,
}

impl Outbox {
    pub fn is_empty(&self) -> bool {
        self.feedback.is_empty() && self.forwarded.is_empty() && self.persist.is_empty()
    }
}

/// Work queued for the next tick
#[derive(Debug, Clone)]
enum Pending {
    Message(ControlMessage),
    /// A controller press, offered to the learn session
    Observe(RawEvent),
}

pub struct Core {
    table: MappingTable,
    learn: LearnSession,
    live: LiveState,
    cues: CueEngine,
    pending: VecDeque<Pending>,
    outbox: Outbox,
    /// Source for `/midi/reload`; `None` disables reloading from disk
    mapping_path: Option<PathBuf>,
}

impl Core {
    pub fn new(table: MappingTable, live: LiveState, cues: CueEngine) -> Self {
        Self {
            table,
            learn: LearnSession::new(),
            live,
            cues,
            pending: VecDeque::new(),
            outbox: Outbox::default(),
            mapping_path: None,
        }
    }

    pub fn with_mapping_path(mut self, path: PathBuf) -> Self {
        self.mapping_path = Some(path);
        self
    }

    pub fn table(&self) -> &MappingTable {
        &self.table
    }

    pub fn learn(&self) -> &LearnSession {
        &self.learn
    }

    pub fn live(&self) -> &LiveState {
        &self.live
    }

    pub fn cues(&self) -> &CueEngine {
        &self.cues
    }

    pub fn view(&self) -> StateView {
        self.live.view()
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn take_outbox(&mut self) -> Outbox {
        std::mem::take(&mut self.outbox)
    }

    /// Queue a document write (used for the auto-repaired mapping at startup)
    pub fn request_persist(&mut self, request: PersistRequest) {
        self.outbox.persist.push(request);
    }

    /// Handle one controller event. The mapping table resolves it right away;
    /// presses are also queued for the learn session, ahead of their intents.
    pub fn raw_event(&mut self, event: &RawEvent) {
        debug!("MIDI {}", event);

        if event.kind == EventKind::DiscreteOn {
            self.pending.push_back(Pending::Observe(event.clone()));
        }

        let resolution = self.table.resolve(event);
        self.outbox.feedback.extend(resolution.feedback);
        for intent in resolution.intents {
            debug!("→ {}", intent);
            self.outbox.forwarded.push(intent.clone());
            self.pending.push_back(Pending::Message(intent));
        }
    }

    /// Queue an inbound protocol message for the next tick
    pub fn control(&mut self, msg: ControlMessage) {
        self.pending.push_back(Pending::Message(msg));
    }

    /// Apply every queued message in order
    pub fn drain(&mut self) {
        while let Some(item) = self.pending.pop_front() {
            match item {
                Pending::Message(msg) => {
                    if !self.dispatch(&msg) {
                        debug!("Unhandled message {}", msg);
                    }
                }
                Pending::Observe(event) => self.observe(&event),
            }
        }
    }

    fn observe(&mut self, event: &RawEvent) {
        let Some(capture) = self.learn.observe(event) else {
            return;
        };
        let target = capture.target_address();
        let outcome = self
            .table
            .learn_bind(capture.channel, capture.control, &target);
        info!(
            "🎓 Learn ({:?}): ch {} note {} → {} ({:?})",
            capture.flavor, capture.channel, capture.control, target, outcome
        );
        self.outbox
            .persist
            .push(PersistRequest::Mapping(self.table.document()));
    }

    /// One frame: apply queued messages, then integrate `dt` seconds
    pub fn tick(&mut self, dt: f32) {
        self.drain();
        self.live.tick(dt);
    }

    /// Route one message. Returns false when nobody recognized it.
    pub fn dispatch(&mut self, msg: &ControlMessage) -> bool {
        let addr = msg.address.as_str();

        if let Some(rest) = addr.strip_prefix("/cue/momentary/") {
            self.momentary_cue(rest, msg);
            return true;
        }

        match addr {
            "/learn/start" => {
                if msg.is_press() && !self.learn.is_armed(LearnFlavor::Standard) {
                    self.learn.start(LearnFlavor::Standard);
                }
                return true;
            }
            "/learn/cancel" => {
                self.learn.cancel();
                return true;
            }
            "/learn/momentary/start" => {
                if msg.is_press() {
                    self.learn.start(LearnFlavor::Momentary);
                }
                return true;
            }
            "/learn/momentary/cancel" => {
                self.learn.cancel_flavor(LearnFlavor::Momentary);
                return true;
            }
            "/cue/save" => {
                if msg.is_press() {
                    self.cues.arm_save();
                }
                return true;
            }
            // UI echo of the armed state, nothing to do
            "/ui/saveArmed" => return true,
            "/midi/reload" => {
                if msg.is_press() {
                    self.reload_mapping();
                }
                return true;
            }
            "/midi/dump" => {
                self.dump_mappings();
                return true;
            }
            _ => {}
        }

        if let Some(rest) = addr.strip_prefix("/cue/") {
            self.cue(rest, msg);
            return true;
        }

        self.live.handle(msg)
    }

    fn slot(&self, text: &str) -> Option<usize> {
        let slot = text.parse::<usize>().ok()?;
        if self.cues.bank().contains(slot) {
            Some(slot)
        } else {
            warn!("Cue index {} outside bank 1..={}", text, self.cues.bank().size());
            None
        }
    }

    fn momentary_cue(&mut self, rest: &str, msg: &ControlMessage) {
        let Some(slot) = self.slot(rest) else { return };
        let press = msg.is_press();

        if press && self.learn.is_armed(LearnFlavor::Momentary) {
            self.learn.select_target(LearnFlavor::Momentary, slot);
            return;
        }
        if press {
            self.cues.begin_momentary(slot, &mut self.live);
        } else {
            self.cues.end_momentary(slot, &mut self.live);
        }
    }

    fn cue(&mut self, rest: &str, msg: &ControlMessage) {
        let Some(slot) = self.slot(rest) else { return };
        let press = msg.is_press();

        if self.learn.is_armed(LearnFlavor::Standard) {
            // selecting a target never recalls
            if press {
                self.learn.select_target(LearnFlavor::Standard, slot);
            }
            return;
        }
        if !press {
            return;
        }
        if self.cues.take_save_armed() {
            if self.cues.save(slot, &self.live) {
                self.outbox
                    .persist
                    .push(PersistRequest::Cues(CueDocument::from_bank(self.cues.bank())));
            }
        } else {
            self.cues.apply(slot, &mut self.live);
        }
    }

    /// Re-read the mapping file, keeping runtime controller state
    pub fn reload_mapping(&mut self) {
        let Some(path) = self.mapping_path.clone() else {
            warn!("Mapping reload requested but no mapping file is configured");
            return;
        };
        let (doc, report) = MappingDocument::load(&path);
        self.replace_mapping(&doc);
        if report.source == RuleSource::File && report.repaired {
            self.outbox.persist.push(PersistRequest::Mapping(doc));
        }
    }

    pub fn replace_mapping(&mut self, doc: &MappingDocument) {
        self.table.replace_rules(doc);
        info!(
            "🔄 Mapping reloaded: {} continuous, {} discrete rules",
            self.table.continuous_rules().len(),
            self.table.discrete_rules().len()
        );
    }

    pub fn dump_mappings(&self) {
        info!("Discrete rules ({}):", self.table.discrete_rules().len());
        for rule in self.table.discrete_rules() {
            info!(
                "  ch {} note {} → {} on={} off={} group={} toggle={}",
                rule.channel,
                rule.control,
                rule.target,
                rule.on_value,
                rule.off_value,
                rule.group().unwrap_or("-"),
                rule.toggle
            );
        }
    }
}
