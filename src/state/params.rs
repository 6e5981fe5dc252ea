//! Settable parameter set
//!
//! `Params` is everything a cue captures: selectors plus the targets of the
//! smoothed scalars. Phases, flags and the scan-rate target are not part of it.

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::types::{BeamFx, ColorSel, Movement, Shape};

/// Safe rotation speed range in revolutions per second
pub const ROTATION_LIMIT_RPS: f32 = 45.0;

/// Minimum wave frequency accepted anywhere
pub const MIN_WAVE_FREQUENCY: f32 = 0.1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Params {
    pub shape: Shape,
    #[serde(rename = "colorSel")]
    pub color: ColorSel,
    pub movement: Movement,
    pub beam_fx: BeamFx,

    pub use_custom: bool,
    pub r: f32,
    pub g: f32,
    pub b: f32,

    pub rainbow_speed: f32,
    pub rainbow_amount: f32,
    pub rainbow_blend: f32,

    pub wave_frequency: f32,
    pub wave_amplitude: f32,
    pub wave_speed: f32,

    pub move_speed: f32,
    pub move_size: f32,

    pub rotation_speed: f32,
    pub shape_scale: f32,
    pub pos_x: f32,
    pub pos_y: f32,
    pub dot_amount: f32,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            shape: Shape::Circle,
            color: ColorSel::Blue,
            movement: Movement::None,
            beam_fx: BeamFx::None,
            use_custom: false,
            r: 0.0,
            g: 0.2,
            b: 1.0,
            rainbow_speed: 0.0,
            rainbow_amount: 0.0,
            rainbow_blend: 1.0,
            wave_frequency: 1.0,
            wave_amplitude: 0.45,
            wave_speed: 0.0,
            move_speed: 0.3,
            move_size: 0.5,
            rotation_speed: 0.0,
            shape_scale: 0.0,
            pos_x: 0.0,
            pos_y: 0.0,
            dot_amount: 1.0,
        }
    }
}

impl Params {
    /// Copy with every field forced into its safe range.
    ///
    /// Rotation speed outside ±45 rps is logged; the other clamps are silent.
    pub fn clamped(&self) -> Self {
        let mut p = self.clone();
        p.r = p.r.clamp(0.0, 1.0);
        p.g = p.g.clamp(0.0, 1.0);
        p.b = p.b.clamp(0.0, 1.0);
        p.rainbow_amount = p.rainbow_amount.clamp(0.0, 1.0);
        p.rainbow_blend = p.rainbow_blend.clamp(0.0, 1.0);
        p.wave_frequency = p.wave_frequency.max(MIN_WAVE_FREQUENCY);
        p.wave_amplitude = p.wave_amplitude.clamp(0.0, 1.0);
        p.move_size = p.move_size.clamp(0.0, 1.0);
        if p.rotation_speed.abs() > ROTATION_LIMIT_RPS {
            warn!(
                "Rotation speed {:.2} rps out of range, clamped to ±{}",
                p.rotation_speed, ROTATION_LIMIT_RPS
            );
        }
        p.rotation_speed = p.rotation_speed.clamp(-ROTATION_LIMIT_RPS, ROTATION_LIMIT_RPS);
        p.shape_scale = p.shape_scale.clamp(-1.0, 1.0);
        p.pos_x = p.pos_x.clamp(-1.0, 1.0);
        p.pos_y = p.pos_y.clamp(-1.0, 1.0);
        p.dot_amount = p.dot_amount.clamp(0.0, 1.0);
        // NaN would survive clamp
        for v in [
            &mut p.r,
            &mut p.g,
            &mut p.b,
            &mut p.rainbow_speed,
            &mut p.rainbow_amount,
            &mut p.rainbow_blend,
            &mut p.wave_amplitude,
            &mut p.wave_speed,
            &mut p.move_speed,
            &mut p.move_size,
            &mut p.rotation_speed,
            &mut p.shape_scale,
            &mut p.pos_x,
            &mut p.pos_y,
            &mut p.dot_amount,
        ] {
            if v.is_nan() {
                *v = 0.0;
            }
        }
        if p.wave_frequency.is_nan() {
            p.wave_frequency = MIN_WAVE_FREQUENCY;
        }
        p
    }

    /// Color used when the custom flag is off comes from the palette
    pub fn base_rgb(&self) -> [f32; 3] {
        if self.use_custom {
            [self.r, self.g, self.b]
        } else {
            self.color.rgb()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let p = Params::default();
        assert_eq!(p.shape, Shape::Circle);
        assert_eq!(p.color, ColorSel::Blue);
        assert_eq!((p.r, p.g, p.b), (0.0, 0.2, 1.0));
        assert_eq!(p.dot_amount, 1.0);
        assert!(!p.use_custom);
    }

    #[test]
    fn test_clamped_limits_rotation_and_ranges() {
        let p = Params {
            rotation_speed: -300.0,
            wave_frequency: 0.0,
            pos_x: 4.0,
            dot_amount: -1.0,
            r: 2.0,
            ..Params::default()
        }
        .clamped();
        assert_eq!(p.rotation_speed, -ROTATION_LIMIT_RPS);
        assert_eq!(p.wave_frequency, MIN_WAVE_FREQUENCY);
        assert_eq!(p.pos_x, 1.0);
        assert_eq!(p.dot_amount, 0.0);
        assert_eq!(p.r, 1.0);
    }

    #[test]
    fn test_serde_ignores_unknown_and_fills_missing() {
        let json = r#"{"shape":"triangle","colorSel":"red","scanRateHz":30000,"posX":0.25}"#;
        let p: Params = serde_json::from_str(json).unwrap();
        assert_eq!(p.shape, Shape::Triangle);
        assert_eq!(p.color, ColorSel::Red);
        assert_eq!(p.pos_x, 0.25);
        assert_eq!(p.move_size, Params::default().move_size);
    }

    #[test]
    fn test_base_rgb_prefers_custom() {
        let mut p = Params::default();
        assert_eq!(p.base_rgb(), ColorSel::Blue.rgb());
        p.use_custom = true;
        p.r = 0.5;
        assert_eq!(p.base_rgb(), [0.5, 0.2, 1.0]);
    }
}
