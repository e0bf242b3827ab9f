// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Node and connection lifecycle.
//!
//! A [`Node`] owns one [`Connection`] per peer reported by its transport.
//! The transport drives it through three entry points:
//!
//! - [`Node::on_connected`]: create the connection, install features, run
//!   connection initializers, start the handshake
//! - [`Node::on_data`]: route one frame
//! - [`Node::on_disconnected`]: tear the connection down
//!
//! Lifecycle changes are published as [`NodeEvent`]s to listeners added with
//! [`Node::subscribe`].

mod builder;
mod connection;
mod events;
pub(crate) mod link;
mod sweeper;

pub use builder::NodeBuilder;
pub use connection::Connection;
pub use events::{ListenerId, NodeEvent};
pub use link::{Link, LinkState};

use crate::config::NodeConfig;
use crate::error::{Error, Result};
use crate::pool::Pools;
use crate::registry::TypeRegistry;
use crate::ser::Message;
use crate::transport::{PeerId, Transport};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use events::EventBus;
use std::fmt;
use std::sync::Arc;
use sweeper::SweeperHandle;

/// Side a node plays. Informational: every role runs the same protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Client,
    Server,
    Peer,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Client => write!(f, "client"),
            Role::Server => write!(f, "server"),
            Role::Peer => write!(f, "peer"),
        }
    }
}

pub(crate) type ConnectionInit = Box<dyn Fn(&Arc<Connection>) + Send + Sync>;

pub struct Node {
    name: String,
    role: Role,
    config: Arc<NodeConfig>,
    registry: Arc<TypeRegistry>,
    pools: Arc<Pools>,
    transport: Arc<dyn Transport>,
    connections: Arc<DashMap<PeerId, Arc<Connection>>>,
    events: Arc<EventBus>,
    initializers: Vec<ConnectionInit>,
    _sweeper: Option<SweeperHandle>,
}

impl Node {
    /// Create a node builder.
    ///
    /// # Example
    /// ```no_run
    /// use tessera::{LoopbackTransport, Node, Role};
    /// let node = Node::builder("server")
    ///     .role(Role::Server)
    ///     .transport(LoopbackTransport::new())
    ///     .build()?;
    /// # Ok::<(), tessera::Error>(())
    /// ```
    pub fn builder(name: &str) -> NodeBuilder {
        NodeBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    pub fn pools(&self) -> &Arc<Pools> {
        &self.pools
    }

    /// Transport reported a new peer.
    pub fn on_connected(&self, peer: PeerId) {
        if self.connections.contains_key(&peer) {
            log::warn!("[node] {} already connected to {}", self.name, peer);
            return;
        }
        let link = Arc::new(Link::new(
            peer,
            self.role,
            Arc::clone(&self.transport),
            Arc::clone(&self.pools),
            Arc::clone(&self.registry),
            Arc::clone(&self.config),
        ));
        let conn = Connection::new(link, Arc::clone(&self.events));
        for init in &self.initializers {
            init(&conn);
        }
        // Initializers run outside the shard lock; a racing report for the
        // same peer loses here and its unstarted connection is discarded.
        match self.connections.entry(peer) {
            Entry::Occupied(_) => {
                log::warn!("[node] {} already connected to {}", self.name, peer);
                conn.teardown("duplicate connect");
                return;
            }
            Entry::Vacant(slot) => {
                slot.insert(Arc::clone(&conn));
            }
        }
        log::info!("[node] {} connected to {}", self.name, peer);
        self.events.emit(NodeEvent::Connected(peer));
        conn.start();
    }

    /// One inbound frame from `peer`.
    pub fn on_data(&self, peer: PeerId, bytes: &[u8]) {
        match self.connection(peer) {
            Some(conn) => conn.on_data(bytes),
            None => log::debug!("[node] {} frame from unknown {}", self.name, peer),
        }
    }

    /// Transport lost `peer`. Pending requests resolve `Disconnected` and
    /// roots are destroyed before this returns.
    pub fn on_disconnected(&self, peer: PeerId, reason: &str) {
        let Some((_, conn)) = self.connections.remove(&peer) else {
            log::debug!("[node] {} disconnect for unknown {}", self.name, peer);
            return;
        };
        conn.teardown(reason);
        self.events
            .emit(NodeEvent::Disconnected(peer, reason.to_string()));
    }

    pub fn connection(&self, peer: PeerId) -> Option<Arc<Connection>> {
        self.connections
            .get(&peer)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Connected peers, sorted.
    pub fn peers(&self) -> Vec<PeerId> {
        let mut peers: Vec<_> = self.connections.iter().map(|entry| *entry.key()).collect();
        peers.sort();
        peers
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Send a direct message to `peer`.
    pub fn send<T: Message>(&self, peer: PeerId, message: &T) -> Result<()> {
        self.connection(peer)
            .ok_or(Error::UnknownPeer(peer))?
            .send(message)
    }

    /// Ask the transport to drop `peer`.
    pub fn disconnect(&self, peer: PeerId, reason: &str) -> Result<()> {
        if !self.connections.contains_key(&peer) {
            return Err(Error::UnknownPeer(peer));
        }
        self.transport.close(peer, reason);
        Ok(())
    }

    pub fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&NodeEvent) + Send + Sync + 'static,
    {
        self.events.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.events.unsubscribe(id)
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        let peers: Vec<PeerId> = self.connections.iter().map(|entry| *entry.key()).collect();
        for peer in peers {
            if let Some((_, conn)) = self.connections.remove(&peer) {
                conn.teardown("node dropped");
            }
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("name", &self.name)
            .field("role", &self.role)
            .field("connections", &self.connections.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct NullTransport {
        closed: AtomicUsize,
    }

    impl Transport for NullTransport {
        fn send(&self, _peer: PeerId, _frame: &[u8]) -> std::io::Result<()> {
            Ok(())
        }

        fn close(&self, _peer: PeerId, _reason: &str) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_build_requires_transport() {
        assert!(matches!(
            Node::builder("lonely").build(),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_build_rejects_bad_config() {
        let result = Node::builder("bad")
            .config(NodeConfig::default().with_timeout_tick(std::time::Duration::ZERO))
            .transport(Arc::new(NullTransport::default()))
            .build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_connect_and_disconnect_lifecycle() {
        let transport = Arc::new(NullTransport::default());
        let inits = Arc::new(AtomicUsize::new(0));
        let node = {
            let inits = Arc::clone(&inits);
            Node::builder("n")
                .role(Role::Server)
                .transport(transport.clone())
                .on_connection(move |conn| {
                    assert_eq!(conn.role(), Role::Server);
                    inits.fetch_add(1, Ordering::SeqCst);
                })
                .build()
                .expect("node")
        };
        let events = Arc::new(parking_lot::Mutex::new(Vec::new()));
        {
            let events = Arc::clone(&events);
            node.subscribe(move |event| events.lock().push(event.clone()));
        }

        node.on_connected(PeerId(9));
        node.on_connected(PeerId(9));
        assert_eq!(inits.load(Ordering::SeqCst), 1);
        assert_eq!(node.peers(), vec![PeerId(9)]);

        node.disconnect(PeerId(9), "bye").expect("known peer");
        assert_eq!(transport.closed.load(Ordering::SeqCst), 1);
        node.on_disconnected(PeerId(9), "bye");
        node.on_disconnected(PeerId(9), "bye");
        assert_eq!(node.connection_count(), 0);
        assert!(matches!(
            node.disconnect(PeerId(9), "again"),
            Err(Error::UnknownPeer(_))
        ));

        assert_eq!(
            *events.lock(),
            vec![
                NodeEvent::Connected(PeerId(9)),
                NodeEvent::Disconnected(PeerId(9), "bye".to_string()),
            ]
        );
    }
    #[test]
    fn test_concurrent_connect_reports_keep_one_connection() {
        let node = Node::builder("racy")
            .transport(Arc::new(NullTransport::default()))
            .build()
            .expect("node");
        let connected = Arc::new(AtomicUsize::new(0));
        {
            let connected = Arc::clone(&connected);
            node.subscribe(move |event| {
                if matches!(event, NodeEvent::Connected(_)) {
                    connected.fetch_add(1, Ordering::SeqCst);
                }
            });
        }

        let barrier = Arc::new(std::sync::Barrier::new(8));
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let node = Arc::clone(&node);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    node.on_connected(PeerId(5));
                })
            })
            .collect();
        for t in threads {
            t.join().expect("connect thread");
        }

        assert_eq!(node.connection_count(), 1);
        assert_eq!(connected.load(Ordering::SeqCst), 1);
        let conn = node.connection(PeerId(5)).expect("kept");
        assert_ne!(conn.state(), LinkState::Closed);
    }
}
