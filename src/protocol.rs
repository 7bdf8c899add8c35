/*
 *  protocol.rs
 *
 *  Marquee - text in lights
 *  (c) 2017-26 David Walker
 *
 *  Controller to node wire messages
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

//! One UDP datagram carries one comma separated ASCII message:
//!
//! - `set,<i0>,<r0>,<g0>,<b0>,...` stages a colour for every lamp on the node
//! - `show` flushes the staged colours to the lamps
//! - `off` blanks every lamp
//! - `shutdown` stops the receiver process

use std::fmt;
use std::str;

use thiserror::Error;

use crate::display::color::Rgb;

pub const CMD_SET: &str = "set";
pub const CMD_SHOW: &str = "show";
pub const CMD_OFF: &str = "off";
pub const CMD_SHUTDOWN: &str = "shutdown";

/// One lamp's colour inside a `set` message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LampUpdate {
    pub index: usize,
    pub rgb: Rgb,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Set(Vec<LampUpdate>),
    Show,
    Off,
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("datagram is not valid UTF-8")]
    NotUtf8,
    #[error("empty datagram")]
    Empty,
    #[error("unknown command {0:?}")]
    UnknownCommand(String),
    #[error("set carries {found} fields, expected {expected} ({lamps} lamps)")]
    Arity { expected: usize, found: usize, lamps: usize },
    #[error("set field {position} ({value:?}) is not a number in 0-255")]
    BadField { position: usize, value: String },
    #[error("lamp index {index} out of range for {lamps} lamps")]
    IndexOutOfRange { index: usize, lamps: usize },
}

impl Message {
    /// `set` message for a node's lamps, indexed in slice order.
    pub fn set_frame(lamps: &[Rgb]) -> Self {
        Message::Set(
            lamps
                .iter()
                .enumerate()
                .map(|(index, rgb)| LampUpdate { index, rgb: *rgb })
                .collect(),
        )
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }

    /// Decode a datagram for a node with `lamps` lamps. A `set` must carry
    /// exactly one `index,r,g,b` quadruple per lamp.
    pub fn decode(datagram: &[u8], lamps: usize) -> Result<Self, ProtocolError> {
        let text = str::from_utf8(datagram).map_err(|_| ProtocolError::NotUtf8)?;
        let text = text.trim_matches(|c: char| c.is_ascii_whitespace() || c == '\0');
        if text.is_empty() {
            return Err(ProtocolError::Empty);
        }

        let mut fields = text.split(',');
        let command = fields.next().unwrap_or_default();
        match command {
            CMD_SET => decode_set(fields.collect(), lamps),
            CMD_SHOW => Ok(Message::Show),
            CMD_OFF => Ok(Message::Off),
            CMD_SHUTDOWN => Ok(Message::Shutdown),
            other => Err(ProtocolError::UnknownCommand(other.to_string())),
        }
    }
}

fn decode_set(fields: Vec<&str>, lamps: usize) -> Result<Message, ProtocolError> {
    let expected = lamps * 4;
    if fields.len() != expected {
        return Err(ProtocolError::Arity { expected, found: fields.len(), lamps });
    }

    let number = |position: usize| -> Result<u8, ProtocolError> {
        let value = fields[position].trim();
        value.parse::<u8>().map_err(|_| ProtocolError::BadField {
            // 1-based, counting the command as field 0
            position: position + 1,
            value: value.to_string(),
        })
    };

    let mut updates = Vec::with_capacity(lamps);
    for quad in 0..lamps {
        let base = quad * 4;
        let index = usize::from(number(base)?);
        if index >= lamps {
            return Err(ProtocolError::IndexOutOfRange { index, lamps });
        }
        let rgb = Rgb::new(number(base + 1)?, number(base + 2)?, number(base + 3)?);
        updates.push(LampUpdate { index, rgb });
    }
    Ok(Message::Set(updates))
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::Set(updates) => {
                f.write_str(CMD_SET)?;
                for LampUpdate { index, rgb } in updates {
                    write!(f, ",{},{}", index, rgb)?;
                }
                Ok(())
            }
            Message::Show => f.write_str(CMD_SHOW),
            Message::Off => f.write_str(CMD_OFF),
            Message::Shutdown => f.write_str(CMD_SHUTDOWN),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rainbow() -> Vec<Rgb> {
        (0..8u8).map(|i| Rgb::new(i * 30, 255 - i, i)).collect()
    }

    #[test]
    fn test_encode_set() {
        let message = Message::set_frame(&[Rgb::new(255, 0, 0), Rgb::BLACK]);
        assert_eq!(message.to_string(), "set,0,255,0,0,1,0,0,0");
    }

    #[test]
    fn test_encode_controls() {
        assert_eq!(Message::Show.to_bytes(), b"show");
        assert_eq!(Message::Off.to_bytes(), b"off");
        assert_eq!(Message::Shutdown.to_bytes(), b"shutdown");
    }

    #[test]
    fn test_set_round_trip_keeps_index_order() {
        let lamps = rainbow();
        let decoded = Message::decode(&Message::set_frame(&lamps).to_bytes(), 8).unwrap();
        let Message::Set(updates) = decoded else { panic!("expected set") };
        assert_eq!(updates.iter().map(|u| u.index).collect::<Vec<_>>(), (0..8).collect::<Vec<_>>());
        assert_eq!(updates.iter().map(|u| u.rgb).collect::<Vec<_>>(), lamps);
    }

    #[test]
    fn test_decode_controls() {
        assert_eq!(Message::decode(b"show", 8), Ok(Message::Show));
        assert_eq!(Message::decode(b"shutdown\n", 8), Ok(Message::Shutdown));
        assert_eq!(Message::decode(b"off", 8), Ok(Message::Off));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert_eq!(Message::decode(b"", 8), Err(ProtocolError::Empty));
        assert_eq!(Message::decode(&[0xff, 0xfe], 8), Err(ProtocolError::NotUtf8));
        assert_eq!(
            Message::decode(b"blink", 8),
            Err(ProtocolError::UnknownCommand("blink".into()))
        );
        assert_eq!(Message::decode(b"SHOW", 8), Err(ProtocolError::UnknownCommand("SHOW".into())));
    }

    #[test]
    fn test_decode_set_arity() {
        // seven quadruples for an eight lamp node
        let short = Message::set_frame(&rainbow()[..7]).to_bytes();
        assert_eq!(
            Message::decode(&short, 8),
            Err(ProtocolError::Arity { expected: 32, found: 28, lamps: 8 })
        );
        assert!(matches!(Message::decode(b"set", 8), Err(ProtocolError::Arity { found: 0, .. })));
    }

    #[test]
    fn test_decode_set_bad_values() {
        assert_eq!(
            Message::decode(b"set,0,256,0,0", 1),
            Err(ProtocolError::BadField { position: 2, value: "256".into() })
        );
        assert_eq!(
            Message::decode(b"set,0,1,x,3", 1),
            Err(ProtocolError::BadField { position: 3, value: "x".into() })
        );
        assert_eq!(
            Message::decode(b"set,1,0,0,0", 1),
            Err(ProtocolError::IndexOutOfRange { index: 1, lamps: 1 })
        );
    }
}
