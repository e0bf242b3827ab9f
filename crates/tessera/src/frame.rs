// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Frame header.
//!
//! Every frame starts with a 3-byte little-endian header:
//!
//! ```text
//! 0        1                 3
//! +--------+--------+--------+---------------------------+
//! |  kind  |     type id     |  kind header + payload    |
//! +--------+--------+--------+---------------------------+
//! ```
//!
//! | Kind            | Byte | Kind header                   |
//! |-----------------|------|-------------------------------|
//! | `Handshake`     | 0x01 | registry table + fingerprint  |
//! | `HandshakeAck`  | 0x02 | u8 accept                     |
//! | `Message`       | 0x10 | none                          |
//! | `Request`       | 0x20 | u8 correlation id             |
//! | `Response`      | 0x21 | u8 correlation id, u8 status  |
//! | `SyncCreate`    | 0x30 | u16 root id                   |
//! | `SyncUpdate`    | 0x31 | u16 root id, u16 field id     |
//! | `SyncDestroy`   | 0x32 | u16 root id                   |

use crate::config::CONTROL_TYPE_ID;
use crate::error::ProtocolError;
use crate::ser::{Deserializer, SerResult, Serializer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FrameKind {
    Handshake = 0x01,
    HandshakeAck = 0x02,
    Message = 0x10,
    Request = 0x20,
    Response = 0x21,
    SyncCreate = 0x30,
    SyncUpdate = 0x31,
    SyncDestroy = 0x32,
}

impl FrameKind {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(FrameKind::Handshake),
            0x02 => Some(FrameKind::HandshakeAck),
            0x10 => Some(FrameKind::Message),
            0x20 => Some(FrameKind::Request),
            0x21 => Some(FrameKind::Response),
            0x30 => Some(FrameKind::SyncCreate),
            0x31 => Some(FrameKind::SyncUpdate),
            0x32 => Some(FrameKind::SyncDestroy),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Handshake frames travel before authentication; everything else is gated.
    pub fn is_control(self) -> bool {
        matches!(self, FrameKind::Handshake | FrameKind::HandshakeAck)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub kind: FrameKind,
    pub type_id: u16,
}

impl FrameHeader {
    pub const SIZE: usize = 3;

    pub fn new(kind: FrameKind, type_id: u16) -> Self {
        Self { kind, type_id }
    }

    /// Header for a frame without a typed payload.
    pub fn control(kind: FrameKind) -> Self {
        Self::new(kind, CONTROL_TYPE_ID)
    }

    pub fn write(&self, w: &mut Serializer) -> SerResult<()> {
        w.put_u8(self.kind.as_u8())?;
        w.put_u16(self.type_id)
    }

    pub fn read(r: &mut Deserializer) -> Result<Self, ProtocolError> {
        let raw = r.read_u8()?;
        let kind = FrameKind::from_u8(raw).ok_or(ProtocolError::UnknownKind(raw))?;
        let type_id = r.read_u16()?;
        Ok(Self { kind, type_id })
    }
}
