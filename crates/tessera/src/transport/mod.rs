// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Transport seam.
//!
//! Tessera does not own sockets. A transport delivers whole frames reliably and
//! in order per peer, and reports connection events to the node:
//!
//! - outbound: the node calls [`Transport::send`] with one encoded frame
//! - inbound: the transport calls `Node::on_connected`, `Node::on_data` and
//!   `Node::on_disconnected`
//!
//! [`LoopbackTransport`] wires two in-process nodes together.

mod loopback;

pub use loopback::{LoopbackLink, LoopbackTransport};

use std::fmt;
use std::io;

/// Opaque peer identifier assigned by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(pub u64);

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer#{}", self.0)
    }
}

/// Frame-preserving, ordered, reliable channel to connected peers.
pub trait Transport: Send + Sync + 'static {
    /// Send one complete frame.
    fn send(&self, peer: PeerId, frame: &[u8]) -> io::Result<()>;

    /// Ask the transport to drop the connection.
    ///
    /// The transport reports the resulting disconnect through
    /// `Node::on_disconnected`.
    fn close(&self, _peer: PeerId, _reason: &str) {}
}
