// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Type registry handshake (authentication feature).
//!
//! Symmetric: each side sends its registry table once connected, verifies the
//! peer's table and answers with an ack. The link opens when the local check
//! passed and the peer acked ours; either side refusing makes it `Rejected`.
//!
//! ```text
//!   A                              B
//!   |-- Handshake(table A) ------->|  verify
//!   |<------- Handshake(table B) --|
//!   |  verify                      |
//!   |-- HandshakeAck(1) ---------->|
//!   |<--------- HandshakeAck(1) ---|
//!   Open                         Open
//! ```

use super::{Feature, FeatureKind, FeatureState};
use crate::error::ProtocolError;
use crate::frame::{FrameHeader, FrameKind};
use crate::node::{Link, LinkState};
use crate::ser::Deserializer;
use parking_lot::Mutex;
use std::any::Any;
use std::io;
use std::sync::Arc;

#[derive(Debug, Default)]
struct Progress {
    sent: bool,
    /// Our verdict on the peer's table.
    local: Option<bool>,
    /// The peer's verdict on ours.
    remote: Option<bool>,
}

pub struct HandshakeFeature {
    link: Arc<Link>,
    state: FeatureState,
    progress: Mutex<Progress>,
}

impl HandshakeFeature {
    pub fn new(link: Arc<Link>) -> Self {
        Self {
            link,
            state: FeatureState::new(),
            progress: Mutex::new(Progress::default()),
        }
    }

    /// Send the local table. Later calls do nothing.
    pub fn start(&self) -> io::Result<()> {
        let mut progress = self.progress.lock();
        self.send_table(&mut progress)
    }

    fn send_table(&self, progress: &mut Progress) -> io::Result<()> {
        if progress.sent {
            return Ok(());
        }
        let mut w = self
            .link
            .frame(FrameKind::Handshake, crate::config::CONTROL_TYPE_ID)
            .map_err(to_io)?;
        self.link.registry().write(&mut w).map_err(to_io)?;
        self.link.send(&w)?;
        progress.sent = true;
        log::debug!(
            "[handshake] sent {} types to {}",
            self.link.registry().len(),
            self.link.peer()
        );
        Ok(())
    }

    fn send_ack(&self, accept: bool) {
        let result = self
            .link
            .frame(FrameKind::HandshakeAck, crate::config::CONTROL_TYPE_ID)
            .map_err(to_io)
            .and_then(|mut w| {
                w.put_u8(u8::from(accept)).map_err(to_io)?;
                self.link.send(&w)
            });
        if let Err(e) = result {
            log::warn!("[handshake] ack to {} failed: {}", self.link.peer(), e);
        }
    }

    fn settle(&self, progress: &Progress) {
        match (progress.local, progress.remote) {
            (Some(false), _) | (_, Some(false)) => {
                if self.link.set_state(LinkState::Rejected).is_some() {
                    log::warn!("[handshake] {} rejected", self.link.peer());
                }
            }
            (Some(true), Some(true)) => {
                if self.link.set_state(LinkState::Open).is_some() {
                    log::info!("[handshake] {} authenticated", self.link.peer());
                }
            }
            _ => {}
        }
    }

    /// True once both verdicts are in and positive.
    pub fn is_complete(&self) -> bool {
        let progress = self.progress.lock();
        progress.local == Some(true) && progress.remote == Some(true)
    }
}

fn to_io(e: crate::ser::SerError) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, e)
}

impl Feature for HandshakeFeature {
    fn kind(&self) -> FeatureKind {
        FeatureKind::Authentication
    }

    fn enable(&self) -> bool {
        self.state.enable()
    }

    fn disable(&self) -> bool {
        self.state.disable()
    }

    fn is_enabled(&self) -> bool {
        self.state.is_enabled()
    }

    fn handle_frame(
        &self,
        header: &FrameHeader,
        reader: &mut Deserializer,
    ) -> Result<(), ProtocolError> {
        let mut progress = self.progress.lock();
        match header.kind {
            FrameKind::Handshake => {
                if progress.local.is_some() {
                    log::debug!("[handshake] duplicate table from {}", self.link.peer());
                    return Ok(());
                }
                if let Err(e) = self.send_table(&mut progress) {
                    log::warn!("[handshake] table to {} failed: {}", self.link.peer(), e);
                }
                let verdict = self.link.registry().verify(reader);
                let accept = matches!(verdict, Ok(true));
                progress.local = Some(accept);
                self.send_ack(accept);
                self.settle(&progress);
                verdict.map(|_| ()).map_err(ProtocolError::from)
            }
            FrameKind::HandshakeAck => {
                let accept = reader.read_u8()? != 0;
                progress.remote = Some(accept);
                self.settle(&progress);
                Ok(())
            }
            other => Err(ProtocolError::UnknownKind(other.as_u8())),
        }
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
