//! Fixed-size bank of cue slots, addressed 1-based

use crate::state::Params;

pub const DEFAULT_BANK_SIZE: usize = 30;

#[derive(Debug, Clone, PartialEq)]
pub struct CueBank {
    slots: Vec<Option<Params>>,
}

impl Default for CueBank {
    fn default() -> Self {
        Self::new(DEFAULT_BANK_SIZE)
    }
}

impl CueBank {
    pub fn new(size: usize) -> Self {
        Self {
            slots: vec![None; size],
        }
    }

    pub fn size(&self) -> usize {
        self.slots.len()
    }

    pub fn contains(&self, slot: usize) -> bool {
        (1..=self.slots.len()).contains(&slot)
    }

    /// Stored parameters, `None` when empty or out of range
    pub fn get(&self, slot: usize) -> Option<&Params> {
        self.slots.get(slot.checked_sub(1)?)?.as_ref()
    }

    /// Overwrite a slot. Returns false when out of range.
    pub fn store(&mut self, slot: usize, params: Params) -> bool {
        match slot.checked_sub(1).and_then(|i| self.slots.get_mut(i)) {
            Some(entry) => {
                *entry = Some(params);
                true
            }
            None => false,
        }
    }

    pub fn populated(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// `(slot, params)` for every slot in order
    pub fn iter(&self) -> impl Iterator<Item = (usize, Option<&Params>)> {
        self.slots.iter().enumerate().map(|(i, s)| (i + 1, s.as_ref()))
    }
}
