//! Core types for the LightSwarm protocol

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::Instant;

use crate::error::ParseError;

/// Identity a device reports in its `MASTER` messages
pub type DeviceId = u32;

/// Raw photocell reading, nominally 0..=1023
pub type Reading = i32;

/// Upper bound of the photocell ADC range
pub const READING_MAX: Reading = 1023;

/// Prefix of inbound reading messages
pub const MASTER_PREFIX: &str = "MASTER";

/// Logical indicator output, mapped to a physical pin by the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IndicatorSlot(pub u8);

impl IndicatorSlot {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for IndicatorSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "slot{}", self.0)
    }
}

/// Point in time seen both by the monotonic clock (accounting) and the
/// wall clock (log timestamps)
#[derive(Debug, Clone, Copy)]
pub struct Stamp {
    pub at: Instant,
    pub wall: DateTime<Local>,
}

impl Stamp {
    pub fn now() -> Self {
        Self {
            at: Instant::now(),
            wall: Local::now(),
        }
    }

    /// Same stamp shifted forward; used to build deterministic timelines
    pub fn after(&self, elapsed: std::time::Duration) -> Self {
        Self {
            at: self.at + elapsed,
            wall: self.wall + chrono::Duration::from_std(elapsed).unwrap_or_else(|_| chrono::Duration::zero()),
        }
    }
}

/// One reading as received from the network
#[derive(Debug, Clone, Copy)]
pub struct Observation {
    pub device_id: DeviceId,
    pub reading: Reading,
    pub addr: IpAddr,
    pub stamp: Stamp,
}

/// Control tokens broadcast by the coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    Reset,
    Activate,
}

impl ControlSignal {
    pub fn token(self) -> &'static str {
        match self {
            ControlSignal::Reset => "RESET",
            ControlSignal::Activate => "ACTIVATE",
        }
    }

    fn from_token(token: &str) -> Option<Self> {
        match token {
            "RESET" => Some(ControlSignal::Reset),
            "ACTIVATE" => Some(ControlSignal::Activate),
            _ => None,
        }
    }
}

impl std::fmt::Display for ControlSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.token())
    }
}

/// Datagram payloads understood by the coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    /// `MASTER:<id>:<reading>`
    Master { device_id: DeviceId, reading: Reading },
    /// Our own broadcast coming back on the shared port
    Control(ControlSignal),
}

impl Message {
    /// Parse a text payload; surrounding whitespace is ignored
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let text = text.trim();

        if let Some(signal) = ControlSignal::from_token(text) {
            return Ok(Message::Control(signal));
        }

        let fields: Vec<&str> = text.split(':').collect();
        if fields[0] != MASTER_PREFIX {
            return Err(ParseError::UnknownPrefix(fields[0].to_string()));
        }
        if fields.len() != 3 {
            return Err(ParseError::FieldCount(fields.len()));
        }

        let device_id = fields[1]
            .parse::<DeviceId>()
            .map_err(|_| ParseError::InvalidInteger(fields[1].to_string()))?;
        let reading = fields[2]
            .parse::<Reading>()
            .map_err(|_| ParseError::InvalidInteger(fields[2].to_string()))?;

        Ok(Message::Master { device_id, reading })
    }

    /// Decode a raw datagram
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ParseError> {
        let text = std::str::from_utf8(bytes).map_err(|_| ParseError::NotUtf8)?;
        Self::parse(text)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Message::Master { device_id, reading } => {
                format!("{}:{}:{}", MASTER_PREFIX, device_id, reading).into_bytes()
            }
            Message::Control(signal) => signal.token().as_bytes().to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_master() {
        let msg = Message::parse("MASTER:5:200").unwrap();
        assert_eq!(msg, Message::Master { device_id: 5, reading: 200 });
    }

    #[test]
    fn test_parse_trims_newline() {
        let msg = Message::from_bytes(b"MASTER:7:1023\n").unwrap();
        assert_eq!(msg, Message::Master { device_id: 7, reading: 1023 });
    }

    #[test]
    fn test_out_of_range_reading_still_parses() {
        let msg = Message::parse("MASTER:1:4000").unwrap();
        assert_eq!(msg, Message::Master { device_id: 1, reading: 4000 });
    }

    #[test]
    fn test_control_echo() {
        assert_eq!(Message::parse("RESET").unwrap(), Message::Control(ControlSignal::Reset));
        assert_eq!(
            Message::from_bytes(ControlSignal::Activate.token().as_bytes()).unwrap(),
            Message::Control(ControlSignal::Activate)
        );
    }

    #[test]
    fn test_malformed() {
        assert!(matches!(Message::parse("MASTER:5"), Err(ParseError::FieldCount(2))));
        assert!(matches!(Message::parse("MASTER:5:1:2"), Err(ParseError::FieldCount(4))));
        assert!(matches!(Message::parse("MASTER:x:1"), Err(ParseError::InvalidInteger(_))));
        assert!(matches!(Message::parse("MASTER:5:bright"), Err(ParseError::InvalidInteger(_))));
        assert!(matches!(Message::parse("HELLO:5:1"), Err(ParseError::UnknownPrefix(_))));
        assert!(matches!(Message::from_bytes(&[0xff, 0xfe]), Err(ParseError::NotUtf8)));
    }

    #[test]
    fn test_stamp_after() {
        let base = Stamp::now();
        let later = base.after(std::time::Duration::from_millis(1500));
        assert_eq!(later.at - base.at, std::time::Duration::from_millis(1500));
        assert_eq!((later.wall - base.wall).num_milliseconds(), 1500);
    }
}
