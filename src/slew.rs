//! Slew/ramp controller for the output scan rate
//!
//! The rendering hardware tolerates only gradual point-rate changes. The
//! ramp moves its current value toward the target by at most
//! `min(ceil(slew_per_second * dt), slew_per_tick)` per tick, snaps once it is
//! within one step, and seeds to `min_pps` when enabled from fully off.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Ramp limits in points per second
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlewConfig {
    pub min_pps: u32,
    pub max_pps: u32,
    pub slew_per_second: u32,
    pub slew_per_tick: u32,
    pub startup_pps: u32,
}

impl Default for SlewConfig {
    fn default() -> Self {
        Self {
            min_pps: 2000,
            max_pps: 20000,
            slew_per_second: 10000,
            slew_per_tick: 1200,
            startup_pps: 20000,
        }
    }
}

impl SlewConfig {
    /// Largest change allowed in one tick of length `dt` seconds
    pub fn max_step(&self, dt: f32) -> u32 {
        let dt = if dt > 0.0 { dt } else { 1.0 / 60.0 };
        let by_time = (self.slew_per_second as f32 * dt).ceil() as u32;
        by_time.min(self.slew_per_tick).max(1)
    }

    /// Decode a `/laser/scanrate` request into a target (0 = disabled).
    ///
    /// - `(-1.5, 0)`: disable
    /// - `<= 1`: normalized, `0 → min_pps`, `1 → max_pps`
    /// - `< min_pps`: controller domain, `domain_max` defaults to 127
    /// - otherwise: absolute points per second
    pub fn decode_request(&self, v: f32, domain_max: Option<f32>) -> u32 {
        let min = self.min_pps as f32;
        let max = self.max_pps as f32;
        let target = if v < 0.0 && v > -1.5 {
            0.0
        } else if v <= 1.0 {
            lerp(min, max, v.clamp(0.0, 1.0)).round()
        } else if v < min {
            let domain = domain_max.unwrap_or(127.0).max(1.0);
            lerp(min, max, v.clamp(0.0, domain) / domain).round()
        } else {
            v.round()
        };
        if target <= 0.0 {
            0
        } else {
            (target as u32).clamp(self.min_pps, self.max_pps)
        }
    }
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

#[derive(Debug, Clone)]
pub struct SlewRamp {
    config: SlewConfig,
    current: u32,
    target: u32,
}

impl SlewRamp {
    /// Ramp seeded at the startup rate with no pending movement
    pub fn new(config: SlewConfig) -> Self {
        let start = if config.startup_pps == 0 {
            0
        } else {
            config.startup_pps.clamp(config.min_pps, config.max_pps)
        };
        Self {
            config,
            current: start,
            target: start,
        }
    }

    pub fn config(&self) -> &SlewConfig {
        &self.config
    }

    pub fn current(&self) -> u32 {
        self.current
    }

    pub fn target(&self) -> u32 {
        self.target
    }

    pub fn is_enabled(&self) -> bool {
        self.target > 0
    }

    /// Set a new target. Zero disables the output immediately; any other
    /// value is clamped into the configured range.
    pub fn set_target(&mut self, target: u32) {
        if target == 0 {
            self.target = 0;
            self.current = 0;
            info!("Scan rate override disabled");
            return;
        }
        self.target = target.clamp(self.config.min_pps, self.config.max_pps);
        debug!("Scan rate target {} (current {})", self.target, self.current);
    }

    /// Decode and apply a protocol request
    pub fn request(&mut self, v: f32, domain_max: Option<f32>) -> u32 {
        let target = self.config.decode_request(v, domain_max);
        info!(
            "/laser/scanrate v={} → target {} (current {})",
            v, target, self.current
        );
        self.set_target(target);
        self.target
    }

    /// Advance one tick of `dt` seconds and return the new current value
    pub fn tick(&mut self, dt: f32) -> u32 {
        if self.current == self.target {
            return self.current;
        }
        if self.current == 0 {
            let seed = self.target.min(self.config.min_pps);
            info!("Scan rate enable seed → {} (target {})", seed, self.target);
            self.current = seed;
            return self.current;
        }

        let step = self.config.max_step(dt);
        let distance = self.current.abs_diff(self.target);
        if distance <= step {
            self.current = self.target;
        } else if self.target > self.current {
            self.current += step;
        } else {
            self.current -= step;
        }
        self.current
    }
}
