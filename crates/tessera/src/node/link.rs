// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Outbound side of a connection, shared by its features.

use super::Role;
use crate::config::NodeConfig;
use crate::frame::{FrameHeader, FrameKind};
use crate::pool::{Pooled, Pools};
use crate::registry::TypeRegistry;
use crate::ser::{SerResult, Serializer};
use crate::transport::{PeerId, Transport};
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Connection lifecycle.
///
/// ```text
/// Handshaking --accept--> Open --teardown--> Closed
///      |
///      +------reject----> Rejected (terminal)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Handshaking,
    Open,
    Rejected,
    Closed,
}

impl LinkState {
    pub fn is_terminal(self) -> bool {
        matches!(self, LinkState::Rejected | LinkState::Closed)
    }
}

/// Everything a feature needs to put frames on the wire for one peer.
pub struct Link {
    peer: PeerId,
    role: Role,
    transport: Arc<dyn Transport>,
    pools: Arc<Pools>,
    registry: Arc<TypeRegistry>,
    config: Arc<NodeConfig>,
    /// Single writer section around `Transport::send`.
    writer: Mutex<()>,
    state: Mutex<LinkState>,
    state_changed: Condvar,
}

impl Link {
    pub(crate) fn new(
        peer: PeerId,
        role: Role,
        transport: Arc<dyn Transport>,
        pools: Arc<Pools>,
        registry: Arc<TypeRegistry>,
        config: Arc<NodeConfig>,
    ) -> Self {
        let initial = if config.handshake {
            LinkState::Handshaking
        } else {
            LinkState::Open
        };
        Self {
            peer,
            role,
            transport,
            pools,
            registry,
            config,
            writer: Mutex::new(()),
            state: Mutex::new(initial),
            state_changed: Condvar::new(),
        }
    }

    pub fn peer(&self) -> PeerId {
        self.peer
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn pools(&self) -> &Pools {
        &self.pools
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Rent a serializer with the frame header already written.
    pub fn frame(&self, kind: FrameKind, type_id: u16) -> SerResult<Pooled<Serializer>> {
        let mut w = self.pools.writer();
        FrameHeader::new(kind, type_id).write(&mut w)?;
        Ok(w)
    }

    /// Hand a finished frame to the transport.
    pub fn send(&self, frame: &Serializer) -> io::Result<()> {
        let _writer = self.writer.lock();
        self.transport.send(self.peer, frame.as_bytes())
    }

    /// Ask the transport to drop this peer.
    pub fn close(&self, reason: &str) {
        self.transport.close(self.peer, reason);
    }

    pub fn state(&self) -> LinkState {
        *self.state.lock()
    }

    pub fn is_open(&self) -> bool {
        self.state() == LinkState::Open
    }

    /// Move to `next`; returns the previous state if anything changed.
    ///
    /// Terminal states are never left.
    pub(crate) fn set_state(&self, next: LinkState) -> Option<LinkState> {
        let mut state = self.state.lock();
        let previous = *state;
        if previous == next || previous.is_terminal() {
            return None;
        }
        *state = next;
        drop(state);
        self.state_changed.notify_all();
        log::debug!("[link] {} {:?} -> {:?}", self.peer, previous, next);
        Some(previous)
    }

    /// Block until the link leaves `Handshaking` or `timeout` elapses.
    pub fn wait_settled(&self, timeout: Duration) -> LinkState {
        let deadline = crate::config::deadline_after(Instant::now(), timeout);
        let mut state = self.state.lock();
        while *state == LinkState::Handshaking {
            if self.state_changed.wait_until(&mut state, deadline).timed_out() {
                break;
            }
        }
        *state
    }
}

impl fmt::Debug for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Link")
            .field("peer", &self.peer)
            .field("role", &self.role)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::ser::Deserializer;

    /// Transport that records frames instead of sending them.
    #[derive(Default)]
    pub(crate) struct RecordingTransport {
        pub(crate) frames: Mutex<Vec<Vec<u8>>>,
        pub(crate) closed: Mutex<Vec<String>>,
    }

    impl RecordingTransport {
        pub(crate) fn take(&self) -> Vec<Vec<u8>> {
            std::mem::take(&mut *self.frames.lock())
        }
    }

    impl Transport for RecordingTransport {
        fn send(&self, _peer: PeerId, frame: &[u8]) -> io::Result<()> {
            self.frames.lock().push(frame.to_vec());
            Ok(())
        }

        fn close(&self, _peer: PeerId, reason: &str) {
            self.closed.lock().push(reason.to_string());
        }
    }

    pub(crate) fn test_link(
        registry: TypeRegistry,
        config: NodeConfig,
    ) -> (Arc<Link>, Arc<RecordingTransport>) {
        let transport = Arc::new(RecordingTransport::default());
        let link = Link::new(
            PeerId(1),
            Role::Peer,
            transport.clone(),
            Arc::new(Pools::from_config(&config)),
            Arc::new(registry),
            Arc::new(config),
        );
        (Arc::new(link), transport)
    }

    #[test]
    fn test_initial_state_follows_handshake_setting() {
        let (link, _) = test_link(TypeRegistry::new(), NodeConfig::default());
        assert_eq!(link.state(), LinkState::Handshaking);

        let (link, _) = test_link(
            TypeRegistry::new(),
            NodeConfig::default().with_handshake(false),
        );
        assert!(link.is_open());
    }

    #[test]
    fn test_terminal_states_are_sticky() {
        let (link, _) = test_link(TypeRegistry::new(), NodeConfig::default());
        assert_eq!(link.set_state(LinkState::Rejected), Some(LinkState::Handshaking));
        assert_eq!(link.set_state(LinkState::Open), None);
        assert_eq!(link.state(), LinkState::Rejected);
    }

    #[test]
    fn test_frame_and_send() {
        let (link, transport) = test_link(TypeRegistry::new(), NodeConfig::default());
        let mut w = link.frame(FrameKind::Message, 9).expect("frame");
        w.put_u8(0xEE).expect("payload");
        link.send(&w).expect("send");

        let frames = transport.take();
        assert_eq!(frames, vec![vec![0x10, 9, 0, 0xEE]]);
        let mut r = Deserializer::from_bytes(&frames[0]);
        assert_eq!(
            FrameHeader::read(&mut r).expect("header"),
            FrameHeader::new(FrameKind::Message, 9)
        );
    }

    #[test]
    fn test_wait_settled_wakes_on_state_change() {
        let (link, _) = test_link(TypeRegistry::new(), NodeConfig::default());
        let waiter = {
            let link = Arc::clone(&link);
            std::thread::spawn(move || link.wait_settled(Duration::from_secs(5)))
        };
        std::thread::sleep(Duration::from_millis(20));
        link.set_state(LinkState::Open);
        assert_eq!(waiter.join().expect("waiter"), LinkState::Open);

        let (link, _) = test_link(TypeRegistry::new(), NodeConfig::default());
        assert_eq!(
            link.wait_settled(Duration::from_millis(10)),
            LinkState::Handshaking
        );
    }
}
