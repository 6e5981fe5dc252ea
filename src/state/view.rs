//! Read-only state view handed to the renderer once per tick

use super::live::{LiveState, Phases};
use super::params::Params;

/// Immutable snapshot of everything the renderer needs for one frame.
///
/// `params` carries current (smoothed) values, not targets.
#[derive(Debug, Clone, PartialEq)]
pub struct StateView {
    pub params: Params,
    pub phases: Phases,
    pub scan_rate_pps: u32,
    pub brightness: f32,
    pub mirror_x: bool,
    pub white_flash: bool,
    pub blackout: bool,
    pub motion_hold: bool,
    pub has_scale_input: bool,
}

impl StateView {
    pub(crate) fn capture(live: &LiveState) -> Self {
        let c = live.currents();
        let params = Params {
            pos_x: c.pos_x,
            pos_y: c.pos_y,
            shape_scale: c.shape_scale,
            rotation_speed: c.rotation_speed,
            dot_amount: c.dot_amount,
            ..live.settable()
        };
        Self {
            params,
            phases: live.phases(),
            scan_rate_pps: live.scan_rate().current(),
            brightness: live.effective_brightness(),
            mirror_x: live.invert_x ^ live.hold_invert_x,
            white_flash: live.white_flash,
            blackout: live.blackout,
            motion_hold: live.is_motion_held(),
            has_scale_input: live.has_scale_input,
        }
    }

    /// Palette or custom color, before rainbow and flash
    pub fn base_rgb(&self) -> [f32; 3] {
        self.params.base_rgb()
    }
}

impl Default for StateView {
    fn default() -> Self {
        LiveState::default().view()
    }
}
