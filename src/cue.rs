//! Cue & momentary engine
//!
//! A cue is a copy of every settable parameter. Recall overwrites the live
//! parameters and zeroes the rotation phase; the other phases keep running.
//! A momentary recall additionally remembers the exact values and phases it
//! replaced and puts them back on release.

mod bank;
mod momentary;
mod store;

pub use bank::{CueBank, DEFAULT_BANK_SIZE};
pub use momentary::MomentarySession;
pub use store::{CueDocument, CueEntry, CUE_DOCUMENT_VERSION};

use tracing::{debug, info, warn};

use crate::state::LiveState;

#[derive(Debug, Default)]
pub struct CueEngine {
    bank: CueBank,
    momentary: Option<MomentarySession>,
    save_armed: bool,
}

impl CueEngine {
    pub fn new(bank: CueBank) -> Self {
        Self {
            bank,
            momentary: None,
            save_armed: false,
        }
    }

    pub fn bank(&self) -> &CueBank {
        &self.bank
    }

    pub fn momentary(&self) -> Option<&MomentarySession> {
        self.momentary.as_ref()
    }

    pub fn is_save_armed(&self) -> bool {
        self.save_armed
    }

    /// Make the next `/cue/{n}` a save instead of a recall
    pub fn arm_save(&mut self) {
        self.save_armed = true;
        info!("Cue save armed, select a slot");
    }

    /// Consume the save arming
    pub fn take_save_armed(&mut self) -> bool {
        std::mem::take(&mut self.save_armed)
    }

    /// Snapshot the settable parameters into `slot`. Returns false when
    /// `slot` is outside the bank.
    pub fn save(&mut self, slot: usize, live: &LiveState) -> bool {
        if !self.bank.store(slot, live.settable()) {
            warn!("Cue {} outside bank 1..={}, not saved", slot, self.bank.size());
            return false;
        }
        info!("💾 Cue {} saved", slot);
        true
    }

    /// Recall `slot`. An empty or out-of-range slot leaves `live` untouched.
    pub fn apply(&self, slot: usize, live: &mut LiveState) -> bool {
        let Some(params) = self.bank.get(slot) else {
            warn!("Cue {} is empty", slot);
            return false;
        };
        live.apply_params(params);
        live.reset_rotation_phase();
        info!("🎯 Cue {} applied", slot);
        true
    }

    /// Start a momentary recall. Ignored while another session is active;
    /// no session is created when the slot is empty.
    pub fn begin_momentary(&mut self, slot: usize, live: &mut LiveState) -> bool {
        if let Some(active) = &self.momentary {
            debug!(
                "Momentary cue {} ignored, cue {} still held",
                slot, active.slot
            );
            return false;
        }
        let session = MomentarySession {
            slot,
            params: live.settable(),
            phases: live.phases(),
        };
        if !self.apply(slot, live) {
            return false;
        }
        self.momentary = Some(session);
        true
    }

    /// End the momentary recall of `slot`, restoring values and phases.
    /// Returns false when no session for `slot` is active.
    pub fn end_momentary(&mut self, slot: usize, live: &mut LiveState) -> bool {
        match self.momentary.take() {
            Some(session) if session.slot == slot => {
                live.apply_params(&session.params);
                live.restore_phases(session.phases);
                info!("Momentary cue {} released, state restored", slot);
                true
            }
            other => {
                self.momentary = other;
                false
            }
        }
    }
}
