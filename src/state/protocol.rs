//! Inbound parameter addresses
//!
//! Everything under `/laser`, `/move`, `/flash`, `/motion` and `/beam` lands
//! here. Cue and learn addresses are routed before this point.

use tracing::{debug, info};

use super::live::{ColorMemory, LiveState, MAX_FLASH_RELEASE_MS};
use super::params::MIN_WAVE_FREQUENCY;
use super::types::{BeamFx, ColorSel, Movement, Shape};
use crate::mapping::curve::map_range;
use crate::osc::ControlMessage;

const MOVE_EPSILON: f32 = 1e-4;
const MOVE_SEED_SIZE: f32 = 0.2;
const MOVE_SEED_SPEED: f32 = 0.12;

const RAINBOW_MAX_CPS: f32 = 2.0;

/// Accept either 0..1 or 0..255 and clamp to 0..1
fn unit_or_byte(v: f32) -> f32 {
    let v = if v > 1.0 { v / 255.0 } else { v };
    v.clamp(0.0, 1.0)
}

/// Map a bipolar knob (−1..1, or 0..255 when above `byte_threshold`) to −1..1
fn bipolar(raw: f32, byte_threshold: f32) -> f32 {
    let raw = if raw > byte_threshold {
        map_range(raw, 0.0, 255.0, -1.0, 1.0)
    } else {
        raw
    };
    raw.clamp(-1.0, 1.0)
}

/// Rotation speed curve: fine cubic zone near zero, exponential beyond.
///
/// Input is −1..1 (or 0..255), output is revolutions per second.
pub fn rotation_rps(raw: f32) -> f32 {
    const ZONE: f32 = 0.18;
    const SLOW_MAX: f32 = 0.25;
    const SUPER_SLOW: f32 = 0.02;
    const MAX_RPS: f32 = 45.0;
    const K: f32 = 4.5;

    let raw = bipolar(raw, 1.5);
    let n = raw.abs();
    let rps = if n < 1e-6 {
        0.0
    } else if n <= ZONE {
        let t = n / ZONE;
        let mut rps = SUPER_SLOW + (SLOW_MAX - SUPER_SLOW) * t * t * t;
        if t < 0.05 {
            rps *= t / 0.05;
        }
        rps
    } else {
        let t = (n - ZONE) / (1.0 - ZONE);
        let accel = ((K * t).exp() - 1.0) / (K.exp() - 1.0);
        SLOW_MAX + accel * (MAX_RPS - SLOW_MAX)
    };
    let rps = rps.copysign(raw);
    if rps.abs() < 0.0002 {
        0.0
    } else {
        rps
    }
}

impl LiveState {
    /// Apply one protocol message. Returns false for addresses this layer
    /// does not know, or known addresses missing a required argument.
    pub fn handle(&mut self, msg: &ControlMessage) -> bool {
        let addr = msg.address.as_str();
        let v = msg.value();

        if let Some(name) = addr.strip_prefix("/laser/shape/") {
            if name == "scale" {
                let Some(v) = v else { return false };
                self.params.shape_scale = v.clamp(-1.0, 1.0);
                self.has_scale_input = true;
                return true;
            }
            return match Shape::parse(name) {
                Some(shape) => {
                    self.params.shape = shape;
                    true
                }
                None => false,
            };
        }
        if let Some(name) = addr.strip_prefix("/laser/color/select/") {
            return self.select_color(name);
        }
        if let Some(name) = addr.strip_prefix("/move/select/") {
            return match Movement::parse(name).filter(|m| *m != Movement::None) {
                Some(mode) => {
                    self.params.movement = mode;
                    true
                }
                None => false,
            };
        }

        match addr {
            "/laser/shape" => match msg.arg_str(0).and_then(Shape::parse) {
                Some(shape) => self.params.shape = shape,
                None => return false,
            },
            "/laser/color" => return self.set_color(msg),
            "/laser/color/r" | "/laser/color/g" | "/laser/color/b" => {
                let Some(v) = v else { return false };
                let v = unit_or_byte(v);
                match addr {
                    "/laser/color/r" => self.params.r = v,
                    "/laser/color/g" => self.params.g = v,
                    _ => self.params.b = v,
                }
                self.params.use_custom = true;
                self.stop_rainbow();
            }
            "/laser/color/white" => self.white(msg),
            "/laser/wave/frequency" => {
                let Some(v) = v else { return false };
                self.params.wave_frequency = v.max(MIN_WAVE_FREQUENCY);
            }
            "/laser/wave/amplitude" => {
                let Some(v) = v else { return false };
                self.params.wave_amplitude = v.clamp(0.0, 1.0);
            }
            "/laser/wave/speed" => {
                let Some(v) = v else { return false };
                self.params.wave_speed = v;
            }
            "/move/mode" => {
                let Some(mode) = msg.arg_str(0).and_then(Movement::parse) else {
                    return false;
                };
                self.params.movement = mode;
                if mode != Movement::None {
                    if self.params.move_size <= MOVE_EPSILON {
                        self.params.move_size = MOVE_SEED_SIZE;
                    }
                    if self.params.move_speed.abs() <= MOVE_EPSILON {
                        self.params.move_speed = MOVE_SEED_SPEED;
                    }
                }
            }
            "/move/size" => {
                let Some(v) = v else { return false };
                self.params.move_size = unit_or_byte(v);
            }
            "/move/speed" => {
                let Some(v) = v else { return false };
                self.params.move_speed = v;
            }
            "/laser/axis/invert/x" if v.is_some() => self.invert_x = msg.is_on(),
            "/laser/axis/invert/x/hold" if v.is_some() => self.hold_invert_x = msg.is_on(),
            "/laser/color/flash/white/hold" if v.is_some() => self.white_flash = msg.is_on(),
            "/laser/blackout/hold" if v.is_some() => self.blackout = msg.is_on(),
            "/motion/hold" if v.is_some() => self.set_motion_hold(msg.is_on()),
            "/laser/brightness" | "/laser/master/brightness" => {
                let Some(v) = v else { return false };
                self.brightness = unit_or_byte(v);
            }
            "/flash/release_ms" => {
                let Some(v) = v else { return false };
                let ms = v.round().clamp(0.0, MAX_FLASH_RELEASE_MS as f32) as u32;
                self.flash_release_ms = ms;
                info!("Flash release time set to {} ms", ms);
            }
            "/flash" => {
                let Some(v) = v else { return false };
                if v != 0.0 {
                    self.press_flash();
                } else {
                    self.release_flash();
                }
            }
            "/laser/position" => {
                let (Some(x), Some(y)) = (msg.arg_f32(0), msg.arg_f32(1)) else {
                    return false;
                };
                self.params.pos_x = x.clamp(-1.0, 1.0);
                self.params.pos_y = y.clamp(-1.0, 1.0);
            }
            "/laser/position/x" => {
                let Some(v) = v else { return false };
                self.params.pos_x = v.clamp(-1.0, 1.0);
            }
            "/laser/position/y" => {
                let Some(v) = v else { return false };
                self.params.pos_y = v.clamp(-1.0, 1.0);
            }
            "/laser/dotted" => {
                let Some(v) = v else { return false };
                self.params.dot_amount = unit_or_byte(v);
            }
            "/laser/scanrate" => {
                let Some(v) = v else { return false };
                self.scan_rate.request(v, msg.arg_f32(1));
            }
            "/laser/rainbow/amount" => {
                let Some(v) = v else { return false };
                self.params.rainbow_amount = v.clamp(0.0, 1.0);
            }
            "/laser/rainbow/blend" => {
                let Some(v) = v else { return false };
                self.params.rainbow_blend = v.clamp(0.0, 1.0);
            }
            "/laser/rainbow/speed" => {
                let Some(v) = v else { return false };
                self.params.rainbow_speed = bipolar(v, 1.0) * RAINBOW_MAX_CPS;
            }
            "/laser/rainbow/preset/slowfull" => {
                self.params.rainbow_amount = 0.95;
                self.params.rainbow_blend = 1.0;
                self.params.rainbow_speed = 0.05;
                info!("Rainbow preset slowfull applied");
            }
            "/laser/rotation/speed" => {
                let Some(v) = v else { return false };
                let rps = rotation_rps(v);
                self.params.rotation_speed = rps;
                debug!("/laser/rotation/speed raw={} → {:.4} rps", v, rps);
            }
            "/beam/select/prisma" | "/beam/select/none" => {
                // an explicit 0 comes from exclusive-group OFF intents
                if v != Some(0.0) {
                    self.params.beam_fx = if addr.ends_with("prisma") {
                        BeamFx::Prisma
                    } else {
                        BeamFx::None
                    };
                }
            }
            _ => return false,
        }
        true
    }

    fn stop_rainbow(&mut self) {
        self.params.rainbow_amount = 0.0;
        self.params.rainbow_speed = 0.0;
    }

    fn set_custom_rgb(&mut self, rgb: [f32; 3]) {
        self.params.r = rgb[0];
        self.params.g = rgb[1];
        self.params.b = rgb[2];
        self.params.use_custom = true;
        self.stop_rainbow();
    }

    fn select_color(&mut self, name: &str) -> bool {
        if name == "white" {
            self.set_custom_rgb([1.0, 1.0, 1.0]);
            return true;
        }
        let Some(color) = ColorSel::parse(name) else {
            return false;
        };
        self.params.color = color;
        self.params.use_custom = false;
        self.stop_rainbow();
        true
    }

    /// `/laser/color <name>` or `/laser/color r g b`
    fn set_color(&mut self, msg: &ControlMessage) -> bool {
        let numeric = msg.args.len() >= 3 && msg.args.iter().take(3).all(|a| a.is_numeric());
        if numeric {
            let rgb = [0, 1, 2].map(|i| msg.arg_f32(i).unwrap_or(0.0));
            let bytes = rgb.iter().any(|c| *c > 1.0);
            let scale = if bytes { 255.0 } else { 1.0 };
            let rgb = rgb.map(|c| (c / scale).clamp(0.0, 1.0));
            self.set_custom_rgb(rgb);
            return true;
        }
        let Some(name) = msg.arg_str(0) else {
            return false;
        };
        if let Some(color) = ColorSel::parse(name) {
            self.params.color = color;
            self.params.use_custom = false;
        }
        self.stop_rainbow();
        true
    }

    /// `/laser/color/white`: no args sets permanent white, `>0` engages a
    /// momentary white hold, `0` releases it and restores the saved colour.
    fn white(&mut self, msg: &ControlMessage) {
        let Some(v) = msg.value() else {
            if msg.args.is_empty() {
                self.white_hold = None;
                self.set_custom_rgb([1.0, 1.0, 1.0]);
            }
            return;
        };
        if v > 0.0 {
            if self.white_hold.is_none() {
                let p = &self.params;
                self.white_hold = Some(ColorMemory {
                    use_custom: p.use_custom,
                    color: p.color,
                    rgb: [p.r, p.g, p.b],
                    rainbow_amount: p.rainbow_amount,
                    rainbow_speed: p.rainbow_speed,
                });
                self.set_custom_rgb([1.0, 1.0, 1.0]);
                info!("Momentary white engaged");
            }
        } else if let Some(saved) = self.white_hold.take() {
            let p = &mut self.params;
            p.use_custom = saved.use_custom;
            p.color = saved.color;
            [p.r, p.g, p.b] = saved.rgb;
            p.rainbow_amount = saved.rainbow_amount;
            p.rainbow_speed = saved.rainbow_speed;
            info!("Momentary white released");
        }
    }
}
