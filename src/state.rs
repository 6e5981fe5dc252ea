//! Live parameter state
//!
//! `LiveState` is owned by the router task; the renderer only ever sees
//! [`StateView`] snapshots.

mod live;
mod params;
mod protocol;
mod smoothing;
mod types;
mod view;

pub use live::{advance, Currents, LiveState, Phases, DEFAULT_FLASH_RELEASE_MS};
pub use params::{Params, ROTATION_LIMIT_RPS};
pub use protocol::rotation_rps;
pub use smoothing::{alpha, approach, SmoothingTaus};
pub use types::{BeamFx, ColorSel, Movement, Shape};
pub use view::StateView;
