//! Distance-adaptive exponential smoothing

use serde::{Deserialize, Serialize};

/// Largest dt honored by one smoothing step
pub const MAX_DT: f32 = 0.25;

const NEAR_DISTANCE: f32 = 0.02;
const FAR_DISTANCE: f32 = 0.25;
const FAR_CAP: f32 = 2.0;
const FAR_BOOST: f32 = 3.0;

/// Blend factor for one step.
///
/// Below `NEAR_DISTANCE` the factor is scaled down (down to 15 %) so slow
/// adjustments stay precise; above `FAR_DISTANCE` the effective time constant
/// shrinks by up to 3x. Both adjustments meet the plain exponential at their
/// boundaries, so the result is continuous in `distance`.
pub fn alpha(dt: f32, tau: f32, distance: f32) -> f32 {
    let dt = dt.clamp(0.0, MAX_DT);
    let base = 1.0 - (-dt / tau.max(1e-4)).exp();
    if distance < NEAR_DISTANCE {
        let t = (distance / NEAR_DISTANCE).clamp(0.0, 1.0);
        base * (0.15 + 0.85 * t)
    } else if distance > FAR_DISTANCE {
        let t = (distance.min(FAR_CAP) - FAR_DISTANCE) / (FAR_CAP - FAR_DISTANCE);
        let boost = 1.0 + (FAR_BOOST - 1.0) * t;
        1.0 - (1.0 - base).powf(boost)
    } else {
        base
    }
}

/// Time constants in seconds per smoothed parameter family
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingTaus {
    pub position_tau: f32,
    pub scale_tau: f32,
    pub rotation_tau: f32,
    pub dots_tau: f32,
}

impl Default for SmoothingTaus {
    fn default() -> Self {
        Self {
            position_tau: 0.090,
            scale_tau: 0.120,
            rotation_tau: 0.150,
            dots_tau: 0.100,
        }
    }
}

/// One smoothing step of `current` toward `target`
pub fn approach(current: f32, target: f32, dt: f32, tau: f32) -> f32 {
    let distance = (target - current).abs();
    if distance == 0.0 {
        return current;
    }
    current + (target - current) * alpha(dt, tau, distance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_alpha_zero_dt() {
        assert_eq!(alpha(0.0, 0.1, 0.5), 0.0);
    }

    #[test]
    fn test_alpha_continuous_at_boundaries() {
        let dt = 1.0 / 60.0;
        let eps = 1e-5;
        let near_lo = alpha(dt, 0.1, NEAR_DISTANCE - eps);
        let near_hi = alpha(dt, 0.1, NEAR_DISTANCE + eps);
        assert!((near_lo - near_hi).abs() < 1e-3);
        let far_lo = alpha(dt, 0.1, FAR_DISTANCE - eps);
        let far_hi = alpha(dt, 0.1, FAR_DISTANCE + eps);
        assert!((far_lo - far_hi).abs() < 1e-3);
    }

    #[test]
    fn test_approach_converges() {
        let mut current = 0.0;
        for _ in 0..600 {
            current = approach(current, 1.0, 1.0 / 60.0, 0.09);
        }
        assert!((current - 1.0).abs() < 1e-3);
    }

    proptest! {
        #[test]
        fn test_alpha_in_unit_interval(dt in -1.0f32..1.0, tau in 0.0f32..1.0, d in 0.0f32..5.0) {
            let a = alpha(dt, tau, d);
            prop_assert!((0.0..=1.0).contains(&a));
        }

        #[test]
        fn test_approach_never_overshoots(start in -1.0f32..1.0, target in -1.0f32..1.0) {
            let before = (target - start).abs();
            let after = approach(start, target, 1.0 / 60.0, 0.12);
            prop_assert!((target - after).abs() <= before + 1e-6);
        }
    }
}
