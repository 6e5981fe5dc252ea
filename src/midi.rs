//! MIDI wire format
//!
//! Only the channel messages a controller sends for knobs and pads are
//! decoded; everything else is reported as `Other` and ignored downstream.

use std::fmt;

use crate::mapping::{Feedback, RawEvent};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MidiMessage {
    /// Note Off: channel (0-15), note, velocity
    NoteOff { channel: u8, note: u8, velocity: u8 },

    /// Note On: channel (0-15), note, velocity (never 0, see `parse`)
    NoteOn { channel: u8, note: u8, velocity: u8 },

    /// Control Change: channel (0-15), cc, value
    ControlChange { channel: u8, cc: u8, value: u8 },

    /// Any other well-formed message, kept for diagnostics
    Other { status: u8 },
}

impl MidiMessage {
    /// Parse a MIDI message from raw bytes
    pub fn parse(data: &[u8]) -> Option<Self> {
        let (&status, rest) = data.split_first()?;

        // running status is not used by the controllers we talk to
        if status < 0x80 {
            return None;
        }
        if status >= 0xF0 {
            return Some(MidiMessage::Other { status });
        }

        let channel = status & 0x0F;
        let byte = |i: usize| rest.get(i).map(|b| b & 0x7F);

        match status & 0xF0 {
            0x80 => Some(MidiMessage::NoteOff {
                channel,
                note: byte(0)?,
                velocity: byte(1)?,
            }),
            0x90 => {
                let note = byte(0)?;
                let velocity = byte(1)?;
                // Note On with velocity 0 is a Note Off
                if velocity == 0 {
                    Some(MidiMessage::NoteOff {
                        channel,
                        note,
                        velocity: 0,
                    })
                } else {
                    Some(MidiMessage::NoteOn {
                        channel,
                        note,
                        velocity,
                    })
                }
            }
            0xB0 => Some(MidiMessage::ControlChange {
                channel,
                cc: byte(0)?,
                value: byte(1)?,
            }),
            _ => Some(MidiMessage::Other { status }),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        match *self {
            MidiMessage::NoteOff {
                channel,
                note,
                velocity,
            } => vec![0x80 | (channel & 0x0F), note & 0x7F, velocity & 0x7F],
            MidiMessage::NoteOn {
                channel,
                note,
                velocity,
            } => vec![0x90 | (channel & 0x0F), note & 0x7F, velocity & 0x7F],
            MidiMessage::ControlChange { channel, cc, value } => {
                vec![0xB0 | (channel & 0x0F), cc & 0x7F, value & 0x7F]
            }
            MidiMessage::Other { status } => vec![status],
        }
    }

    /// Controller event with a 1-based channel, `None` for other messages
    pub fn to_raw_event(&self, source: &str) -> Option<RawEvent> {
        match *self {
            MidiMessage::NoteOn {
                channel,
                note,
                velocity,
            } => Some(RawEvent::press(source, channel + 1, note, velocity)),
            MidiMessage::NoteOff { channel, note, .. } => {
                Some(RawEvent::release(source, channel + 1, note))
            }
            MidiMessage::ControlChange { channel, cc, value } => {
                Some(RawEvent::continuous(source, channel + 1, cc, value))
            }
            MidiMessage::Other { .. } => None,
        }
    }

    /// Indicator update as a Note On whose velocity is the level
    pub fn from_feedback(fb: &Feedback) -> Self {
        MidiMessage::NoteOn {
            channel: fb.channel.saturating_sub(1),
            note: fb.control,
            velocity: fb.level,
        }
    }
}

impl fmt::Display for MidiMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            MidiMessage::NoteOff {
                channel,
                note,
                velocity,
            } => write!(f, "NoteOff ch:{} n:{} v:{}", channel + 1, note, velocity),
            MidiMessage::NoteOn {
                channel,
                note,
                velocity,
            } => write!(f, "NoteOn ch:{} n:{} v:{}", channel + 1, note, velocity),
            MidiMessage::ControlChange { channel, cc, value } => {
                write!(f, "CC ch:{} cc:{} v:{}", channel + 1, cc, value)
            }
            MidiMessage::Other { status } => write!(f, "status 0x{:02X}", status),
        }
    }
}

/// Format MIDI bytes as hex string for debugging
pub fn format_hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_on_parsing() {
        let msg = MidiMessage::parse(&[0x90, 60, 100]).unwrap();
        assert_eq!(
            msg,
            MidiMessage::NoteOn {
                channel: 0,
                note: 60,
                velocity: 100,
            }
        );
    }

    #[test]
    fn test_note_on_velocity_zero() {
        let msg = MidiMessage::parse(&[0x90, 60, 0]).unwrap();
        assert!(matches!(msg, MidiMessage::NoteOff { note: 60, .. }));
    }

    #[test]
    fn test_truncated_and_running_status() {
        assert_eq!(MidiMessage::parse(&[0xB0, 7]), None);
        assert_eq!(MidiMessage::parse(&[0x40, 7, 1]), None);
        assert_eq!(MidiMessage::parse(&[]), None);
        assert_eq!(
            MidiMessage::parse(&[0xF8]),
            Some(MidiMessage::Other { status: 0xF8 })
        );
    }

    #[test]
    fn test_raw_event_channel_is_one_based() {
        let ev = MidiMessage::parse(&[0xB7, 7, 99])
            .unwrap()
            .to_raw_event("ctl")
            .unwrap();
        assert_eq!((ev.channel, ev.control, ev.value), (8, 7, 99));
        assert_eq!(&*ev.source, "ctl");

        let off = MidiMessage::parse(&[0x80, 64, 30])
            .unwrap()
            .to_raw_event("ctl")
            .unwrap();
        assert_eq!(off, RawEvent::release("ctl", 1, 64));
    }

    #[test]
    fn test_feedback_encoding() {
        let fb = Feedback {
            channel: 2,
            control: 40,
            level: 127,
        };
        assert_eq!(MidiMessage::from_feedback(&fb).encode(), vec![0x91, 40, 127]);
    }

    #[test]
    fn test_format_hex() {
        assert_eq!(format_hex(&[0x90, 0x3C, 0x7F]), "90 3C 7F");
    }
}
