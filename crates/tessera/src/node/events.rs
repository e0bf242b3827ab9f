// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Connection lifecycle notifications.

use crate::transport::PeerId;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeEvent {
    /// Transport reported a new peer; the connection exists and its features
    /// are installed.
    Connected(PeerId),
    /// Handshake completed on both sides.
    Authenticated(PeerId),
    /// Handshake failed. The transport was asked to close the peer.
    Rejected(PeerId),
    /// Connection torn down, with the transport's reason.
    Disconnected(PeerId, String),
}

impl NodeEvent {
    pub fn peer(&self) -> PeerId {
        match self {
            NodeEvent::Connected(peer)
            | NodeEvent::Authenticated(peer)
            | NodeEvent::Rejected(peer)
            | NodeEvent::Disconnected(peer, _) => *peer,
        }
    }
}

/// Returned by `Node::subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Arc<dyn Fn(&NodeEvent) + Send + Sync>;

/// Listeners run synchronously on the thread that caused the event, outside
/// any connection lock.
#[derive(Default)]
pub(crate) struct EventBus {
    listeners: RwLock<Vec<(ListenerId, Listener)>>,
    next: AtomicU64,
}

impl EventBus {
    pub(crate) fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&NodeEvent) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push((id, Arc::new(listener)));
        id
    }

    pub(crate) fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    pub(crate) fn emit(&self, event: NodeEvent) {
        log::debug!("[node] event {:?}", event);
        let listeners: Vec<Listener> = self
            .listeners
            .read()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(&event);
        }
    }
}
