//! Live parameter state and the per-tick integrator

use std::f32::consts::TAU;

use tracing::{debug, info};

use super::params::Params;
use super::smoothing::{approach, SmoothingTaus};
use super::view::StateView;
use crate::slew::{SlewConfig, SlewRamp};

pub const DEFAULT_FLASH_RELEASE_MS: u32 = 150;
pub const MAX_FLASH_RELEASE_MS: u32 = 60_000;

/// Wrapped phase accumulators in radians, plus the unwrapped movement time base
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Phases {
    pub rotation: f32,
    pub wave: f32,
    pub movement: f32,
    pub rainbow: f32,
    /// Movement cycles elapsed, not wrapped
    pub move_cycles: f64,
}

/// Smoothed values as currently rendered; their targets live in `Params`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Currents {
    pub pos_x: f32,
    pub pos_y: f32,
    pub shape_scale: f32,
    pub rotation_speed: f32,
    pub dot_amount: f32,
}

impl Currents {
    fn from_targets(p: &Params) -> Self {
        Self {
            pos_x: p.pos_x,
            pos_y: p.pos_y,
            shape_scale: p.shape_scale,
            rotation_speed: p.rotation_speed,
            dot_amount: p.dot_amount,
        }
    }
}

/// Rates captured when motion hold engages
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct HeldRates {
    rotation: f32,
    wave: f32,
    movement: f32,
    rainbow: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub(crate) enum Flash {
    #[default]
    Idle,
    Held {
        previous: f32,
    },
    Decaying {
        elapsed: f32,
        duration: f32,
    },
}

/// Colour fields saved by the momentary white hold
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ColorMemory {
    pub use_custom: bool,
    pub color: super::types::ColorSel,
    pub rgb: [f32; 3],
    pub rainbow_amount: f32,
    pub rainbow_speed: f32,
}

#[derive(Debug, Clone)]
pub struct LiveState {
    pub(crate) params: Params,
    pub(crate) currents: Currents,
    pub(crate) phases: Phases,
    pub(crate) brightness: f32,

    pub(crate) invert_x: bool,
    pub(crate) hold_invert_x: bool,
    pub(crate) white_flash: bool,
    pub(crate) blackout: bool,
    pub(crate) has_scale_input: bool,

    pub(crate) motion_hold: Option<HeldRates>,
    pub(crate) flash: Flash,
    pub(crate) flash_release_ms: u32,
    pub(crate) white_hold: Option<ColorMemory>,

    pub(crate) scan_rate: SlewRamp,
    taus: SmoothingTaus,
}

impl Default for LiveState {
    fn default() -> Self {
        Self::new(SlewConfig::default(), SmoothingTaus::default())
    }
}

impl LiveState {
    pub fn new(scan_rate: SlewConfig, taus: SmoothingTaus) -> Self {
        let params = Params::default();
        Self {
            currents: Currents::from_targets(&params),
            params,
            phases: Phases::default(),
            brightness: 1.0,
            invert_x: false,
            hold_invert_x: false,
            white_flash: false,
            blackout: false,
            has_scale_input: false,
            motion_hold: None,
            flash: Flash::Idle,
            flash_release_ms: DEFAULT_FLASH_RELEASE_MS,
            white_hold: None,
            scan_rate: SlewRamp::new(scan_rate),
            taus,
        }
    }

    /// Copy of every settable field (smoothed fields at their targets)
    pub fn settable(&self) -> Params {
        self.params.clone()
    }

    pub fn currents(&self) -> &Currents {
        &self.currents
    }

    /// Overwrite every settable field. Smoothed values jump to the new
    /// targets so the result is visible on the next frame.
    pub fn apply_params(&mut self, params: &Params) {
        self.params = params.clamped();
        self.currents = Currents::from_targets(&self.params);
        self.has_scale_input = true;
    }

    pub fn phases(&self) -> Phases {
        self.phases
    }

    pub fn restore_phases(&mut self, phases: Phases) {
        self.phases = phases;
    }

    pub fn reset_rotation_phase(&mut self) {
        self.phases.rotation = 0.0;
    }

    pub fn brightness(&self) -> f32 {
        self.brightness
    }

    pub fn is_motion_held(&self) -> bool {
        self.motion_hold.is_some()
    }

    pub fn scan_rate(&self) -> &SlewRamp {
        &self.scan_rate
    }

    /// Engage or release motion hold. Releasing writes the cached rates back,
    /// replacing anything set while held.
    pub fn set_motion_hold(&mut self, on: bool) {
        match (on, self.motion_hold) {
            (true, None) => {
                self.motion_hold = Some(HeldRates {
                    rotation: self.params.rotation_speed,
                    wave: self.params.wave_speed,
                    movement: self.params.move_speed,
                    rainbow: self.params.rainbow_speed,
                });
                info!("Motion hold ENGAGED");
            }
            (false, Some(held)) => {
                self.params.rotation_speed = held.rotation;
                self.params.wave_speed = held.wave;
                self.params.move_speed = held.movement;
                self.params.rainbow_speed = held.rainbow;
                self.motion_hold = None;
                info!("Motion hold RELEASED");
            }
            _ => {}
        }
    }

    pub(crate) fn press_flash(&mut self) {
        if !matches!(self.flash, Flash::Held { .. }) {
            self.flash = Flash::Held {
                previous: self.brightness,
            };
        }
    }

    pub(crate) fn release_flash(&mut self) {
        let previous = match self.flash {
            Flash::Held { previous } => previous,
            _ => self.brightness,
        };
        if self.flash_release_ms > 0 {
            self.flash = Flash::Decaying {
                elapsed: 0.0,
                duration: self.flash_release_ms as f32 / 1000.0,
            };
        } else {
            self.brightness = previous.clamp(0.0, 1.0);
            self.flash = Flash::Idle;
        }
    }

    /// Brightness after flash and blackout
    pub fn effective_brightness(&self) -> f32 {
        if self.blackout {
            return 0.0;
        }
        match self.flash {
            Flash::Held { .. } => 1.0,
            _ => self.brightness,
        }
    }

    /// Advance smoothing, phases, flash decay and the scan-rate ramp by `dt` seconds
    pub fn tick(&mut self, dt: f32) {
        let dt = dt.max(0.0);
        let taus = self.taus;
        let p = &self.params;
        let c = &mut self.currents;
        c.pos_x = approach(c.pos_x, p.pos_x, dt, taus.position_tau);
        c.pos_y = approach(c.pos_y, p.pos_y, dt, taus.position_tau);
        c.shape_scale = approach(c.shape_scale, p.shape_scale, dt, taus.scale_tau);
        c.rotation_speed = approach(c.rotation_speed, p.rotation_speed, dt, taus.rotation_tau);
        c.dot_amount = approach(c.dot_amount, p.dot_amount, dt, taus.dots_tau);

        if self.motion_hold.is_none() {
            let ph = &mut self.phases;
            ph.rotation = advance(ph.rotation, c.rotation_speed, dt);
            ph.wave = advance(ph.wave, p.wave_speed, dt);
            ph.movement = advance(ph.movement, p.move_speed, dt);
            ph.rainbow = advance(ph.rainbow, p.rainbow_speed, dt);
            ph.move_cycles += p.move_speed as f64 * dt as f64;
        }

        if let Flash::Decaying { elapsed, duration } = self.flash {
            let elapsed = elapsed + dt;
            if elapsed >= duration {
                self.brightness = 0.0;
                self.flash = Flash::Idle;
                debug!("Flash decay complete");
            } else {
                self.brightness = 1.0 - elapsed / duration;
                self.flash = Flash::Decaying { elapsed, duration };
            }
        }

        self.scan_rate.tick(dt);
    }

    pub fn view(&self) -> StateView {
        StateView::capture(self)
    }
}

/// `phase + 2π·rate·dt`, wrapped into [0, 2π)
pub fn advance(phase: f32, rate: f32, dt: f32) -> f32 {
    let next = (phase + TAU * rate * dt).rem_euclid(TAU);
    // rem_euclid can round up to exactly TAU
    if next >= TAU {
        0.0
    } else {
        next
    }
}
