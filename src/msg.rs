// Copyright 2019 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Control messages exchanged with units over their management ports
//!
//! Every message starts with a 16-bit type tag. PING and PONG carry one more
//! 16-bit port, SHUTDOWN carries nothing else. Fields are in host byte order,
//! both ends always live on the same machine.

use bincode::Options;
use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;
use crate::Error;

/// Large enough for any control message
pub const MAX_MESSAGE_LEN: usize = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u16)]
pub enum MessageType {
    Ping = 1,
    Pong = 2,
    Shutdown = 3,
}

impl MessageType {
    fn from_tag(tag: u16) -> Option<Self> {
        match tag {
            1 => Some(MessageType::Ping),
            2 => Some(MessageType::Pong),
            3 => Some(MessageType::Shutdown),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Message {
    /// Asks a unit to answer on `reply_port`
    Ping { reply_port: u16 },
    /// A unit's answer, `port` is the unit's own management port
    Pong { port: u16 },
    /// Asks a unit to exit
    Shutdown,
}

#[derive(Serialize, Deserialize)]
struct PortMessage {
    tag: u16,
    port: u16,
}

fn wire() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_native_endian()
        .allow_trailing_bytes()
}

impl Message {
    pub fn message_type(&self) -> MessageType {
        match self {
            Message::Ping { .. } => MessageType::Ping,
            Message::Pong { .. } => MessageType::Pong,
            Message::Shutdown => MessageType::Shutdown,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        let tag = self.message_type() as u16;
        let bytes = match *self {
            Message::Ping { reply_port: port } | Message::Pong { port } => {
                wire().serialize(&PortMessage { tag, port })?
            }
            Message::Shutdown => wire().serialize(&tag)?,
        };

        Ok(bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let tag: u16 = wire().deserialize(bytes)?;
        let message_type =
            MessageType::from_tag(tag).ok_or_else(|| Error::from(ErrorKind::UnknownMessage(tag)))?;

        let message = match message_type {
            MessageType::Ping => {
                let PortMessage { port, .. } = wire().deserialize(bytes)?;
                Message::Ping { reply_port: port }
            }
            MessageType::Pong => {
                let PortMessage { port, .. } = wire().deserialize(bytes)?;
                Message::Pong { port }
            }
            MessageType::Shutdown => Message::Shutdown,
        };

        Ok(message)
    }
}
