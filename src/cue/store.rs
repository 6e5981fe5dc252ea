//! Cue storage document

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

use super::bank::CueBank;
use crate::error::{self, StorageError};
use crate::state::Params;

pub const CUE_DOCUMENT_VERSION: u32 = 1;

fn default_version() -> u32 {
    CUE_DOCUMENT_VERSION
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CueDocument {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub cues: Vec<CueEntry>,
}

/// One slot. Unpopulated entries carry only `index` and `populated`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CueEntry {
    /// 1-based slot; signed so a stray legacy value only costs its own entry
    #[serde(default)]
    pub index: i64,
    #[serde(default)]
    pub populated: bool,
    #[serde(flatten)]
    pub params: Option<Params>,
}

impl CueDocument {
    pub fn from_bank(bank: &CueBank) -> Self {
        let cues = bank
            .iter()
            .map(|(index, params)| CueEntry {
                index: index as i64,
                populated: params.is_some(),
                params: params.cloned(),
            })
            .collect();
        Self {
            version: CUE_DOCUMENT_VERSION,
            cues,
        }
    }

    /// Fill a bank of `size` slots. Out-of-range or unreadable entries are
    /// skipped with a warning; stored values are clamped.
    pub fn into_bank(self, size: usize) -> CueBank {
        let mut bank = CueBank::new(size);
        for entry in self.cues {
            let slot = match usize::try_from(entry.index) {
                Ok(slot) if bank.contains(slot) => slot,
                _ => {
                    warn!("Cue index {} outside bank 1..={}, skipped", entry.index, size);
                    continue;
                }
            };
            if !entry.populated {
                continue;
            }
            match entry.params {
                Some(params) => {
                    bank.store(slot, params.clamped());
                }
                None => warn!("Cue {} has unreadable fields, left empty", slot),
            }
        }
        bank
    }

    /// Load a bank from disk. Never fails: a missing or malformed file
    /// yields an empty bank.
    pub fn load(path: &Path, size: usize) -> CueBank {
        match error::read_json::<CueDocument>(path) {
            Ok(doc) => {
                let bank = doc.into_bank(size);
                info!(
                    "Loaded {} cue(s) from {}",
                    bank.populated(),
                    path.display()
                );
                bank
            }
            Err(StorageError::Missing { .. }) => {
                info!("No cues file found ({})", path.display());
                CueBank::new(size)
            }
            Err(e) => {
                warn!("{}; starting with an empty cue bank", e);
                CueBank::new(size)
            }
        }
    }
}
