//! Curve library
//!
//! Total functions from a 7-bit controller value to a normalized output.
//! Nothing here can fail; out-of-range inputs are clamped.

/// Highest 7-bit controller value
pub const RAW_MAX: f32 = 127.0;

/// `v/127`, optionally inverted, then `v*scale+offset` clamped to [0,1]
pub fn linear(raw: u8, scale: f32, offset: f32, invert: bool) -> f32 {
    let mut v = (raw as f32 / RAW_MAX).clamp(0.0, 1.0);
    if invert {
        v = 1.0 - v;
    }
    (v * scale + offset).clamp(0.0, 1.0)
}

/// Symmetric mapping into [-1,1]: 0..63 → [-1,0], 64..127 → [0,1].
/// Both 63 and 64 land on exactly 0.
pub fn centered(raw: u8, invert: bool) -> f32 {
    let raw = raw.min(127) as f32;
    let c = if raw >= 64.0 {
        (raw - 64.0) / 63.0
    } else {
        (raw - 63.0) / 63.0
    };
    let c = if invert { -c } else { c };
    c.clamp(-1.0, 1.0)
}

/// Sign-preserving power curve for centered values
pub fn signed_gamma(c: f32, gamma: f32) -> f32 {
    if !has_gamma(gamma) {
        return c;
    }
    c.signum() * c.abs().powf(gamma)
}

/// Power curve for unipolar values in [0,1]
pub fn gamma(v: f32, gamma: f32) -> f32 {
    let v = v.clamp(0.0, 1.0);
    if has_gamma(gamma) {
        v.powf(gamma)
    } else {
        v
    }
}

/// Zero out values whose magnitude is inside the deadzone
pub fn deadzone(c: f32, width: f32) -> f32 {
    if width > 0.0 && c.abs() < width {
        0.0
    } else {
        c
    }
}

/// Two's-complement 7-bit delta: 1..63 positive, 65..127 negative
pub fn relative_delta(raw: u8) -> i32 {
    let raw = raw as i32;
    if raw <= 63 {
        raw
    } else {
        raw - 128
    }
}

/// Signed step for one relative-encoder event
pub fn relative_step(raw: u8, step: f32, invert: bool) -> f32 {
    let d = relative_delta(raw) as f32 * step;
    if invert {
        -d
    } else {
        d
    }
}

/// Add a step to an accumulator and keep it in [0,1]
pub fn accumulate(acc: f32, step: f32) -> f32 {
    (acc + step).clamp(0.0, 1.0)
}

/// Map `v` from [in_min,in_max] to [out_min,out_max], clamped to the output range
pub fn map_range(v: f32, in_min: f32, in_max: f32, out_min: f32, out_max: f32) -> f32 {
    let span = in_max - in_min;
    if span.abs() < f32::EPSILON {
        return out_min;
    }
    let t = ((v - in_min) / span).clamp(0.0, 1.0);
    out_min + t * (out_max - out_min)
}

fn has_gamma(gamma: f32) -> bool {
    gamma > 0.0 && (gamma - 1.0).abs() > f32::EPSILON
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_linear_full_range() {
        assert_eq!(linear(0, 1.0, 0.0, false), 0.0);
        assert_eq!(linear(127, 1.0, 0.0, false), 1.0);
        assert_eq!(linear(127, 1.0, 0.0, true), 0.0);
        assert_eq!(linear(127, 2.0, 0.5, false), 1.0);
        assert_eq!(linear(0, 1.0, -0.5, false), 0.0);
    }

    #[test]
    fn test_centered_midpoints_are_zero() {
        assert_eq!(centered(63, false), 0.0);
        assert_eq!(centered(64, false), 0.0);
        assert_eq!(centered(0, false), -1.0);
        assert_eq!(centered(127, false), 1.0);
        assert_eq!(centered(127, true), -1.0);
    }

    #[test]
    fn test_relative_delta_twos_complement() {
        assert_eq!(relative_delta(1), 1);
        assert_eq!(relative_delta(63), 63);
        assert_eq!(relative_delta(64), -64);
        assert_eq!(relative_delta(127), -1);
        assert_eq!(relative_delta(0), 0);
    }

    #[test]
    fn test_gamma_and_deadzone() {
        assert!((gamma(0.5, 2.0) - 0.25).abs() < 1e-6);
        assert_eq!(gamma(0.5, 1.0), 0.5);
        assert!((signed_gamma(-0.5, 2.0) + 0.25).abs() < 1e-6);
        assert_eq!(deadzone(0.04, 0.05), 0.0);
        assert_eq!(deadzone(0.06, 0.05), 0.06);
        assert_eq!(deadzone(-0.04, 0.0), -0.04);
    }

    #[test]
    fn test_map_range_clamps() {
        assert_eq!(map_range(0.5, 0.0, 1.0, 10.0, 20.0), 15.0);
        assert_eq!(map_range(2.0, 0.0, 1.0, 10.0, 20.0), 20.0);
        assert_eq!(map_range(0.0, -1.0, 1.0, -1.0, 1.0), 0.0);
        assert_eq!(map_range(1.0, 0.0, 1.0, 1.0, 0.0), 0.0);
    }

    proptest! {
        #[test]
        fn test_centered_is_symmetric(k in 0u8..=63) {
            let above = centered(64 + k, false);
            let below = centered(63 - k, false);
            prop_assert!((above + below).abs() < 1e-6);
            prop_assert!(above >= 0.0 && below <= 0.0);
        }

        #[test]
        fn test_linear_is_bounded(raw in 0u8..=127, scale in -4.0f32..4.0, offset in -2.0f32..2.0, invert: bool) {
            let v = linear(raw, scale, offset, invert);
            prop_assert!((0.0..=1.0).contains(&v));
        }

        #[test]
        fn test_accumulator_is_clamped_running_sum(raws in proptest::collection::vec(0u8..=127, 0..64)) {
            let mut acc = 0.0f32;
            let mut reference = 0.0f32;
            for raw in raws {
                let step = relative_step(raw, 0.01, false);
                acc = accumulate(acc, step);
                reference = (reference + step).clamp(0.0, 1.0);
            }
            prop_assert!((acc - reference).abs() < 1e-6);
            prop_assert!((0.0..=1.0).contains(&acc));
        }
    }
}
