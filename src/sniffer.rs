//! Diagnostic CLI modes: port listing, mapping dump and the event sniffer
//!
//! The sniffer resolves events against a private copy of the mapping table,
//! so it shows exactly what a running show would emit without touching any
//! show state or storage.

use anyhow::Result;
use colored::*;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;

use crate::config::MidiConfig;
use crate::device::{self, ControllerDevice};
use crate::mapping::{EventKind, MappingTable, RawEvent, Resolution};

/// Print every MIDI input and output port
pub fn list_ports_formatted() {
    println!("\n{}", "=== Available MIDI Ports ===".bold().cyan());
    print_port_list("Input Ports:", device::list_input_ports());
    print_port_list("Output Ports:", device::list_output_ports());
    println!();
}

fn print_port_list(title: &str, ports: Result<Vec<String>>) {
    println!("\n{}", title.bold());
    match ports {
        Ok(ports) if ports.is_empty() => println!("  {}", "No ports found".dimmed()),
        Ok(ports) => {
            for (i, name) in ports.iter().enumerate() {
                println!("  {} {}", format!("{:>2}:", i).dimmed(), name);
            }
        }
        Err(e) => println!("  {} {:#}", "unavailable:".red(), e),
    }
}

/// Print the effective rule set
pub fn print_mappings(table: &MappingTable) {
    println!("\n{}", "=== Continuous rules ===".bold().cyan());
    for rule in table.continuous_rules() {
        println!(
            "  {} → {} [{}..{}] {}",
            format!("ch {:>2} cc {:>3}", rule.channel, rule.control).yellow(),
            rule.target.bright_white(),
            rule.out_min,
            rule.out_max,
            format!("{:?}", rule.shaping).dimmed()
        );
    }

    println!("\n{}", "=== Discrete rules ===".bold().cyan());
    for rule in table.discrete_rules() {
        let mut flags = Vec::new();
        if let Some(group) = rule.group() {
            flags.push(format!("group={}", group));
        }
        if rule.toggle {
            flags.push("toggle".to_string());
        }
        if rule.velocity_as_value {
            flags.push("velocity".to_string());
        }
        println!(
            "  {} → {} on={} off={} {}",
            format!("ch {:>2} note {:>3}", rule.channel, rule.control).green(),
            rule.target.bright_white(),
            rule.on_value,
            rule.off_value,
            flags.join(" ").dimmed()
        );
    }

    let dups = table.duplicate_bindings();
    if !dups.is_empty() {
        println!("\n{}", "=== Duplicate bindings ===".bold().yellow());
        for dup in dups {
            println!("  {} → {} and {}", dup.key, dup.first, dup.second);
        }
    }
    println!();
}

/// One sniffer line: the event, then what the table made of it
pub fn format_event(elapsed_ms: u128, event: &RawEvent, resolution: &Resolution) -> String {
    let kind = match event.kind {
        EventKind::Continuous => "CC ".bright_yellow(),
        EventKind::DiscreteOn => "ON ".bright_green(),
        EventKind::DiscreteOff => "OFF".bright_red(),
    };
    let mut line = format!(
        "[{}ms] {} {:20} ch {:>2} #{:>3} v {:>3}",
        format!("{:08}", elapsed_ms).dimmed(),
        kind,
        truncate(&event.source, 20),
        event.channel,
        event.control,
        event.value
    );

    if resolution.is_empty() {
        line.push_str(&format!(" {}", "(unmapped)".dimmed()));
    }
    for intent in &resolution.intents {
        line.push_str(&format!("\n    → {}", intent.to_string().bright_blue()));
    }
    for fb in &resolution.feedback {
        line.push_str(&format!(
            "\n    {} ch {} #{} = {}",
            "led".magenta(),
            fb.channel,
            fb.control,
            fb.level
        ));
    }
    line
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let head: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", head)
    } else {
        s.to_string()
    }
}

/// Open the configured inputs and print every event until Ctrl+C
pub async fn run_cli_sniffer(midi: &MidiConfig, mut table: MappingTable) -> Result<()> {
    println!("{}", "=== MIDI Sniffer ===".bold().cyan());
    println!("Press Ctrl+C to exit\n");

    let (tx, mut rx) = mpsc::unbounded_channel();
    let sink: device::EventSink = Arc::new(move |event: RawEvent| {
        let _ = tx.send(event);
    });
    let mut device = ControllerDevice::open(midi, false, sink);
    if device.is_headless() {
        println!(
            "{}",
            format!("No input port matches '{}'", midi.input_port).yellow()
        );
        return Ok(());
    }
    println!("Monitoring: {}", device.input_names().join(", ").green());
    println!("{}\n", "─".repeat(80).dimmed());

    let start = Instant::now();
    loop {
        tokio::select! {
            Some(event) = rx.recv() => {
                let resolution = table.resolve(&event);
                println!("{}", format_event(start.elapsed().as_millis(), &event, &resolution));
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    device.close();
    println!("\n{}", "Sniffer stopped".yellow());
    Ok(())
}
