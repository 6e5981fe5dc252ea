//! Controller device link (midir)
//!
//! Opens every input port matching the configured pattern and one output
//! port for indicator feedback. Missing ports are logged and the process
//! keeps running headless; nothing here is fatal.

use anyhow::{Context, Result};
use midir::{MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::config::MidiConfig;
use crate::mapping::{Feedback, RawEvent};
use crate::midi::{format_hex, MidiMessage};

const CLIENT_NAME: &str = "Beam Commander";

/// Receives every decoded controller event, called on midir threads
pub type EventSink = Arc<dyn Fn(RawEvent) + Send + Sync>;

/// `*` matches every port, anything else is a case-insensitive substring
pub fn port_matches(name: &str, pattern: &str) -> bool {
    let pattern = pattern.trim();
    pattern == "*" || name.to_lowercase().contains(&pattern.to_lowercase())
}

/// List available MIDI input ports
pub fn list_input_ports() -> Result<Vec<String>> {
    let midi_in = MidiInput::new(CLIENT_NAME).context("Failed to create MIDI input")?;
    Ok(midi_in
        .ports()
        .iter()
        .filter_map(|p| midi_in.port_name(p).ok())
        .collect())
}

/// List available MIDI output ports
pub fn list_output_ports() -> Result<Vec<String>> {
    let midi_out = MidiOutput::new(CLIENT_NAME).context("Failed to create MIDI output")?;
    Ok(midi_out
        .ports()
        .iter()
        .filter_map(|p| midi_out.port_name(p).ok())
        .collect())
}

pub struct ControllerDevice {
    inputs: Vec<(String, MidiInputConnection<()>)>,
    output: Arc<Mutex<Option<MidiOutputConnection>>>,
    output_name: Option<String>,
}

impl ControllerDevice {
    /// Open the configured ports. With `open_output` false no feedback port
    /// is claimed.
    pub fn open(config: &MidiConfig, open_output: bool, sink: EventSink) -> Self {
        let inputs = open_inputs(&config.input_port, &sink);
        if inputs.is_empty() {
            warn!(
                "⚠️  No MIDI input matching '{}', running without a controller",
                config.input_port
            );
        }

        let mut output = None;
        let mut output_name = None;
        if open_output {
            let pattern = config
                .output_port
                .clone()
                .or_else(|| inputs.first().map(|(name, _)| name.clone()));
            match pattern {
                Some(pattern) => match open_output_port(&pattern) {
                    Ok((name, conn)) => {
                        info!("💡 Feedback output: {}", name);
                        output = Some(conn);
                        output_name = Some(name);
                    }
                    Err(e) => warn!("Feedback disabled: {:#}", e),
                },
                None => debug!("No output port to pair with, feedback disabled"),
            }
        }

        Self {
            inputs,
            output: Arc::new(Mutex::new(output)),
            output_name,
        }
    }

    pub fn input_names(&self) -> Vec<&str> {
        self.inputs.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn output_name(&self) -> Option<&str> {
        self.output_name.as_deref()
    }

    pub fn is_headless(&self) -> bool {
        self.inputs.is_empty()
    }

    /// Write one indicator update to the feedback port
    pub fn send_feedback(&self, fb: &Feedback) -> Result<()> {
        send_feedback(&self.output, fb)
    }

    /// Forward queued indicator updates to the device until the channel closes
    pub fn spawn_feedback_pump(&self, mut rx: mpsc::Receiver<Feedback>) -> JoinHandle<()> {
        let output = self.output.clone();
        tokio::spawn(async move {
            while let Some(fb) = rx.recv().await {
                if let Err(e) = send_feedback(&output, &fb) {
                    warn!("Feedback send failed: {:#}", e);
                }
            }
            debug!("Feedback pump stopped");
        })
    }

    /// Drop every connection
    pub fn close(&mut self) {
        for (name, conn) in self.inputs.drain(..) {
            conn.close();
            debug!("Closed MIDI input '{}'", name);
        }
        if let Some(conn) = self.output.lock().take() {
            conn.close();
        }
        self.output_name = None;
    }
}

fn send_feedback(output: &Mutex<Option<MidiOutputConnection>>, fb: &Feedback) -> Result<()> {
    let mut guard = output.lock();
    let Some(conn) = guard.as_mut() else {
        trace!("No feedback port, ch {} #{} skipped", fb.channel, fb.control);
        return Ok(());
    };
    let bytes = MidiMessage::from_feedback(fb).encode();
    conn.send(&bytes)
        .with_context(|| format!("Failed to send {}", format_hex(&bytes)))?;
    trace!("MIDI out {}", format_hex(&bytes));
    Ok(())
}

fn open_inputs(pattern: &str, sink: &EventSink) -> Vec<(String, MidiInputConnection<()>)> {
    let names = match list_input_ports() {
        Ok(names) => names,
        Err(e) => {
            warn!("MIDI input unavailable: {:#}", e);
            return Vec::new();
        }
    };

    let mut opened = Vec::new();
    for name in names.into_iter().filter(|n| port_matches(n, pattern)) {
        match open_input(&name, sink.clone()) {
            Ok(conn) => {
                info!("🎹 MIDI input: {}", name);
                opened.push((name, conn));
            }
            Err(e) => warn!("Failed to open MIDI input '{}': {:#}", name, e),
        }
    }
    opened
}

fn open_input(name: &str, sink: EventSink) -> Result<MidiInputConnection<()>> {
    // connect() consumes the client, so each port gets its own
    let midi_in = MidiInput::new(CLIENT_NAME).context("Failed to create MIDI input")?;
    let port = midi_in
        .ports()
        .into_iter()
        .find(|p| midi_in.port_name(p).map(|n| n == name).unwrap_or(false))
        .with_context(|| format!("Input port '{}' disappeared", name))?;

    let source = name.to_string();
    midi_in
        .connect(
            &port,
            "beam-commander-in",
            move |_timestamp, data, _| match MidiMessage::parse(data) {
                Some(msg) => {
                    debug!("MIDI in [{}] {} | {}", source, format_hex(data), msg);
                    if let Some(event) = msg.to_raw_event(&source) {
                        sink(event);
                    }
                }
                None => debug!("Unparsed MIDI [{}] {}", source, format_hex(data)),
            },
            (),
        )
        .map_err(|e| anyhow::anyhow!("{}", e))
}

fn open_output_port(pattern: &str) -> Result<(String, MidiOutputConnection)> {
    let midi_out = MidiOutput::new(CLIENT_NAME).context("Failed to create MIDI output")?;
    let (port, name) = midi_out
        .ports()
        .into_iter()
        .find_map(|p| {
            let name = midi_out.port_name(&p).ok()?;
            port_matches(&name, pattern).then_some((p, name))
        })
        .with_context(|| format!("Output port '{}' not found", pattern))?;

    let conn = midi_out
        .connect(&port, "beam-commander-out")
        .map_err(|e| anyhow::anyhow!("{}", e))?;
    Ok((name, conn))
}
