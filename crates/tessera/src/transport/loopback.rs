// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-memory transport.
//!
//! Each direction of a [`LoopbackLink`] is an unbounded crossbeam channel
//! drained by a delivery thread, so a send never re-enters the receiving node
//! on the sender's stack (a handler replying from inside `on_data` cannot
//! deadlock on its own connection).

use super::{PeerId, Transport};
use crate::node::Node;
use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;

static NEXT_PEER_ID: AtomicU64 = AtomicU64::new(1);

enum Delivery {
    Frame(Vec<u8>),
    Close(String),
    Stop,
}

/// One node's view of its in-memory peers.
#[derive(Default)]
pub struct LoopbackTransport {
    routes: RwLock<HashMap<PeerId, Sender<Delivery>>>,
    frames_sent: AtomicU64,
}

impl LoopbackTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Frames accepted by [`Transport::send`] so far.
    pub fn frames_sent(&self) -> u64 {
        self.frames_sent.load(Ordering::Relaxed)
    }

    pub fn is_connected(&self, peer: PeerId) -> bool {
        self.routes.read().contains_key(&peer)
    }

    fn route(&self, peer: PeerId, tx: Sender<Delivery>) {
        self.routes.write().insert(peer, tx);
    }

    fn unroute(&self, peer: PeerId) {
        self.routes.write().remove(&peer);
    }
}

impl Transport for LoopbackTransport {
    fn send(&self, peer: PeerId, frame: &[u8]) -> io::Result<()> {
        let routes = self.routes.read();
        let tx = routes.get(&peer).ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotConnected, format!("{} not connected", peer))
        })?;
        tx.send(Delivery::Frame(frame.to_vec()))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "loopback link stopped"))?;
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn close(&self, peer: PeerId, reason: &str) {
        let tx = self.routes.write().remove(&peer);
        if let Some(tx) = tx {
            log::debug!("[loopback] closing {}: {}", peer, reason);
            let _ = tx.send(Delivery::Close(reason.to_string()));
        }
    }
}

/// Two nodes connected through a pair of [`LoopbackTransport`]s.
///
/// Dropping the link stops both delivery threads; it does not report a
/// disconnect to the nodes (use [`LoopbackLink::disconnect`] for that).
pub struct LoopbackLink {
    /// How node A addresses node B.
    peer_b: PeerId,
    /// How node B addresses node A.
    peer_a: PeerId,
    stops: Vec<Sender<Delivery>>,
    workers: Vec<JoinHandle<()>>,
}

/// One end of the link, as seen by a delivery thread.
struct Side {
    node: Weak<Node>,
    transport: Arc<LoopbackTransport>,
    /// Id this side uses for the other.
    remote: PeerId,
}

impl LoopbackLink {
    /// Connect `a` (sending through `a_transport`) with `b`.
    ///
    /// Both nodes see `on_connected` before any frame is delivered, so
    /// connection initializers run ahead of the first handshake frame.
    pub fn connect(
        a: &Arc<Node>,
        a_transport: &Arc<LoopbackTransport>,
        b: &Arc<Node>,
        b_transport: &Arc<LoopbackTransport>,
    ) -> io::Result<Self> {
        let peer_a = PeerId(NEXT_PEER_ID.fetch_add(1, Ordering::Relaxed));
        let peer_b = PeerId(NEXT_PEER_ID.fetch_add(1, Ordering::Relaxed));

        let (a_to_b, b_inbox) = channel::unbounded();
        let (b_to_a, a_inbox) = channel::unbounded();
        a_transport.route(peer_b, a_to_b.clone());
        b_transport.route(peer_a, b_to_a.clone());

        a.on_connected(peer_b);
        b.on_connected(peer_a);

        let side_a = || Side {
            node: Arc::downgrade(a),
            transport: Arc::clone(a_transport),
            remote: peer_b,
        };
        let side_b = || Side {
            node: Arc::downgrade(b),
            transport: Arc::clone(b_transport),
            remote: peer_a,
        };

        let mut workers = Vec::with_capacity(2);
        // A -> B: frames A sent, delivered to B.
        workers.push(spawn_pump("tessera-loopback-ab", b_inbox, side_b(), side_a())?);
        // B -> A
        workers.push(spawn_pump("tessera-loopback-ba", a_inbox, side_a(), side_b())?);

        log::debug!("[loopback] linked {} <-> {}", peer_a, peer_b);
        Ok(Self {
            peer_b,
            peer_a,
            stops: vec![a_to_b, b_to_a],
            workers,
        })
    }

    /// Peer id node A uses for node B.
    pub fn peer_b(&self) -> PeerId {
        self.peer_b
    }

    /// Peer id node B uses for node A.
    pub fn peer_a(&self) -> PeerId {
        self.peer_a
    }

    /// Simulate a dropped connection: both nodes receive `on_disconnected`
    /// after every frame already in flight has been delivered.
    pub fn disconnect(&self, reason: &str) {
        if let Some(tx) = self.stops.first() {
            let _ = tx.send(Delivery::Close(reason.to_string()));
        }
    }
}

impl Drop for LoopbackLink {
    fn drop(&mut self) {
        for tx in &self.stops {
            let _ = tx.send(Delivery::Stop);
        }
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

fn spawn_pump(
    name: &str,
    inbox: Receiver<Delivery>,
    receiver: Side,
    sender: Side,
) -> io::Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name(name.to_string())
        .spawn(move || {
            for delivery in inbox.iter() {
                match delivery {
                    Delivery::Frame(bytes) => match receiver.node.upgrade() {
                        Some(node) => node.on_data(receiver.remote, &bytes),
                        None => break,
                    },
                    Delivery::Close(reason) => {
                        receiver.transport.unroute(receiver.remote);
                        sender.transport.unroute(sender.remote);
                        if let Some(node) = receiver.node.upgrade() {
                            node.on_disconnected(receiver.remote, &reason);
                        }
                        if let Some(node) = sender.node.upgrade() {
                            node.on_disconnected(sender.remote, &reason);
                        }
                    }
                    Delivery::Stop => break,
                }
            }
        })
}
