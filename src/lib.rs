//! Beam Commander - control-routing core for a live laser instrument
//!
//! Controller events (MIDI) and protocol messages (OSC) flow into a single
//! router task that owns the mapping table, the learn session, the live
//! parameter state and the cue bank. Once per frame it integrates the live
//! state and publishes an immutable [`state::StateView`] for the renderer.

pub mod config;
pub mod cue;
pub mod device;
pub mod error;
pub mod learn;
pub mod mapping;
pub mod midi;
pub mod osc;
pub mod paths;
pub mod persistence;
pub mod router;
pub mod slew;
pub mod sniffer;
pub mod state;
