//! Configuration management for Beam Commander
//!
//! Handles loading, parsing and validation of the YAML application config.
//! Every section and field is optional; a missing file yields the defaults.

pub mod watcher;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

use crate::slew::SlewConfig;
use crate::state::SmoothingTaus;

pub use watcher::MappingWatcher;

/// Largest cue bank accepted from configuration
pub const MAX_CUE_BANK_SIZE: usize = 128;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub midi: MidiConfig,
    pub osc: OscConfig,
    pub storage: StorageConfig,
    pub engine: EngineConfig,
}

/// Controller port selection
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MidiConfig {
    /// Substring of the input port name, `*` opens every input
    #[serde(default = "default_input_port")]
    pub input_port: String,
    /// Substring of the feedback port name; defaults to the first opened input
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_port: Option<String>,
    #[serde(default = "default_true")]
    pub feedback: bool,
}

/// Control protocol sockets
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OscConfig {
    #[serde(default = "default_osc_listen")]
    pub listen: SocketAddr,
    /// Where resolved intents are re-emitted, if anywhere
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forward_to: Option<SocketAddr>,
}

/// Document locations, relative paths resolve against the data directory
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_mapping_file")]
    pub mapping_file: PathBuf,
    #[serde(default = "default_cues_file")]
    pub cues_file: PathBuf,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_true")]
    pub watch_mapping: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    #[serde(default = "default_tick_hz")]
    pub tick_hz: u32,
    #[serde(default = "default_cue_bank_size")]
    pub cue_bank_size: usize,
    #[serde(default)]
    pub scan_rate: SlewConfig,
    #[serde(default)]
    pub smoothing: SmoothingTaus,
}

impl Default for MidiConfig {
    fn default() -> Self {
        Self {
            input_port: default_input_port(),
            output_port: None,
            feedback: true,
        }
    }
}

impl Default for OscConfig {
    fn default() -> Self {
        Self {
            listen: default_osc_listen(),
            forward_to: None,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            mapping_file: default_mapping_file(),
            cues_file: default_cues_file(),
            debounce_ms: default_debounce_ms(),
            watch_mapping: true,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_hz: default_tick_hz(),
            cue_bank_size: default_cue_bank_size(),
            scan_rate: SlewConfig::default(),
            smoothing: SmoothingTaus::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file with validation
    pub async fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config = Self::from_yaml(&contents)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;

        Ok(config)
    }

    /// Like [`AppConfig::load`], but a missing file yields the defaults
    pub async fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load(path).await
    }

    pub fn from_yaml(contents: &str) -> Result<Self> {
        // an empty document is valid and means "all defaults"
        let config: AppConfig = if contents.trim().is_empty() {
            AppConfig::default()
        } else {
            serde_yaml::from_str(contents).context("Failed to parse YAML config")?
        };
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save(&self, path: &Path) -> Result<()> {
        let yaml = serde_yaml::to_string(self).context("Failed to serialize config to YAML")?;

        fs::write(path, yaml)
            .await
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate configuration for correctness and consistency
    pub fn validate(&self) -> Result<()> {
        if self.midi.input_port.trim().is_empty() {
            anyhow::bail!("midi.input_port cannot be empty (use \"*\" for all ports)");
        }

        let engine = &self.engine;
        if engine.tick_hz == 0 {
            anyhow::bail!("engine.tick_hz must be greater than 0");
        }
        if engine.cue_bank_size == 0 || engine.cue_bank_size > MAX_CUE_BANK_SIZE {
            anyhow::bail!(
                "engine.cue_bank_size must be between 1 and {} (got {})",
                MAX_CUE_BANK_SIZE,
                engine.cue_bank_size
            );
        }

        let slew = &engine.scan_rate;
        if slew.min_pps > slew.max_pps {
            anyhow::bail!(
                "engine.scan_rate.min_pps ({}) exceeds max_pps ({})",
                slew.min_pps,
                slew.max_pps
            );
        }
        if slew.slew_per_second == 0 || slew.slew_per_tick == 0 {
            anyhow::bail!("engine.scan_rate slew limits must be greater than 0");
        }

        let taus = &engine.smoothing;
        for (name, tau) in [
            ("position_tau", taus.position_tau),
            ("scale_tau", taus.scale_tau),
            ("rotation_tau", taus.rotation_tau),
            ("dots_tau", taus.dots_tau),
        ] {
            if tau.is_nan() || tau <= 0.0 {
                anyhow::bail!("engine.smoothing.{} must be positive (got {})", name, tau);
            }
        }

        Ok(())
    }
}

fn default_true() -> bool { true }
fn default_input_port() -> String { "*".to_string() }
fn default_osc_listen() -> SocketAddr { SocketAddr::from(([0, 0, 0, 0], 9000)) }
fn default_mapping_file() -> PathBuf { PathBuf::from("midi_mapping.json") }
fn default_cues_file() -> PathBuf { PathBuf::from("cues.json") }
fn default_debounce_ms() -> u64 { crate::persistence::DEFAULT_DEBOUNCE_MS }
fn default_tick_hz() -> u32 { 60 }
fn default_cue_bank_size() -> usize { crate::cue::DEFAULT_BANK_SIZE }
