use crate::state::{Params, Phases};

/// A cue applied while its trigger is held.
///
/// Holds the exact pre-apply values and phases so release can put them back.
#[derive(Debug, Clone, PartialEq)]
pub struct MomentarySession {
    pub slot: usize,
    pub params: Params,
    pub phases: Phases,
}
