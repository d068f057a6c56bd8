//! MIDI output
//!
//! The bridge turns wire frames into real Control Change messages on a local
//! MIDI output port. Only CC is carried end to end, so that is the only
//! message this module knows how to build.

use anyhow::{Context, Result};
use midir::{MidiOutput, MidiOutputConnection};
use tracing::{debug, info};

/// A MIDI Control Change message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlChange {
    /// Channel 0-15
    pub channel: u8,
    /// Controller number 0-127
    pub cc: u8,
    /// Controller value 0-127
    pub value: u8,
}

impl ControlChange {
    pub fn new(channel: u8, cc: u8, value: u8) -> Self {
        Self {
            channel: channel & 0x0F,
            cc: cc & 0x7F,
            value: value & 0x7F,
        }
    }

    /// Encode to raw MIDI bytes (status 0xB0 | channel, cc, value)
    pub fn encode(&self) -> [u8; 3] {
        [0xB0 | self.channel, self.cc, self.value]
    }

    /// Parse from raw MIDI bytes, if they form a CC message
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < 3 || data[0] & 0xF0 != 0xB0 {
            return None;
        }
        Some(Self::new(data[0] & 0x0F, data[1], data[2]))
    }
}

/// Format MIDI bytes as hex string for debugging
pub fn format_hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Connected MIDI output port
pub struct MidiOut {
    conn: MidiOutputConnection,
    port_name: String,
}

impl MidiOut {
    /// Connect to the first output port matching `pattern` (case-insensitive
    /// substring, Windows-friendly)
    pub fn connect(pattern: &str) -> Result<Self> {
        let midi_out = MidiOutput::new("Knob-GW-Output").context("Failed to create MIDI output")?;

        let (port, port_name) = find_output_port(&midi_out, pattern)
            .ok_or_else(|| anyhow::anyhow!("Output port '{}' not found", pattern))?;

        info!("Connecting to output port: {}", port_name);
        let conn = midi_out
            .connect(&port, "Knob-GW")
            .map_err(|e| anyhow::anyhow!("Failed to connect to output port: {}", e))?;

        Ok(Self { conn, port_name })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    /// Send one Control Change on channel 1
    pub fn send_cc(&mut self, cc: u8, value: u8) -> Result<()> {
        let data = ControlChange::new(0, cc, value).encode();
        debug!("MIDI out: {}", format_hex(&data));
        self.conn
            .send(&data)
            .context("Failed to send MIDI message")?;
        Ok(())
    }
}

/// List available MIDI output port names
pub fn list_output_ports() -> Result<Vec<String>> {
    let midi_out = MidiOutput::new("Knob-GW-Scanner")?;

    let mut port_names = Vec::new();
    for port in midi_out.ports() {
        if let Ok(name) = midi_out.port_name(&port) {
            port_names.push(name);
        }
    }

    Ok(port_names)
}

/// Find an output port by substring match
fn find_output_port(
    midi_out: &MidiOutput,
    pattern: &str,
) -> Option<(midir::MidiOutputPort, String)> {
    for port in midi_out.ports() {
        if let Ok(name) = midi_out.port_name(&port) {
            if name.to_lowercase().contains(&pattern.to_lowercase()) {
                debug!("Found port '{}' matching pattern '{}'", name, pattern);
                return Some((port, name));
            }
        }
    }
    None
}

/// Print available output ports for `--list-ports`
pub fn list_ports_formatted() {
    use colored::*;

    println!("\n{}", "=== Available MIDI Output Ports ===".bold().cyan());

    match list_output_ports() {
        Ok(ports) if ports.is_empty() => {
            println!("  {}", "No output ports found".dimmed());
        }
        Ok(ports) => {
            for (i, name) in ports.iter().enumerate() {
                println!("  [{}] {}", i.to_string().green(), name);
            }
        }
        Err(e) => {
            println!("  {} {}", "Failed to enumerate ports:".red(), e);
        }
    }
}
