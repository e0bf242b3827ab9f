// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-peer connection: inbound routing and installed features.

use super::events::{EventBus, NodeEvent};
use super::{Link, LinkState, Role};
use crate::error::{Error, ProtocolError, Result};
use crate::feature::{Feature, FeatureKind, FeatureSet, HandshakeFeature};
use crate::frame::{FrameHeader, FrameKind};
use crate::rpc::RequestManager;
use crate::ser::{Deserializer, Message};
use crate::sync::SyncManager;
use crate::transport::PeerId;
use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

type MessageHandler = Arc<dyn Fn(&(dyn Any + Send)) + Send + Sync>;

/// One connected peer.
///
/// Created by the node when the transport reports the peer. Inbound frames
/// are decoded one at a time: the header selects either a feature (by frame
/// kind) or a direct-message handler (by type id). Until the link is open,
/// every non-control frame is dropped.
pub struct Connection {
    link: Arc<Link>,
    features: FeatureSet,
    /// One in-flight decode per connection.
    inbound: Mutex<()>,
    messages: RwLock<HashMap<u16, MessageHandler>>,
    events: Arc<EventBus>,
}

impl Connection {
    /// Build the connection and install the features enabled in the link's
    /// config.
    pub(crate) fn new(link: Arc<Link>, events: Arc<EventBus>) -> Arc<Self> {
        let conn = Arc::new(Self {
            link: Arc::clone(&link),
            features: FeatureSet::new(),
            inbound: Mutex::new(()),
            messages: RwLock::new(HashMap::new()),
            events,
        });

        let config = link.config();
        if config.handshake {
            conn.features
                .add(Arc::new(HandshakeFeature::new(Arc::clone(&link))));
        }
        if config.request_response {
            conn.features
                .add(Arc::new(RequestManager::new(Arc::clone(&link))));
        }
        if config.synchronization {
            conn.features.add(SyncManager::new(Arc::clone(&link)));
        }
        conn
    }

    /// Send the handshake table, if authentication is installed.
    pub(crate) fn start(&self) {
        if let Some(handshake) = self.handshake() {
            if let Err(e) = handshake.start() {
                log::warn!("[conn] {} handshake send failed: {}", self.peer(), e);
            }
        }
    }

    pub fn peer(&self) -> PeerId {
        self.link.peer()
    }

    pub fn role(&self) -> Role {
        self.link.role()
    }

    pub fn link(&self) -> &Arc<Link> {
        &self.link
    }

    pub fn state(&self) -> LinkState {
        self.link.state()
    }

    pub fn is_open(&self) -> bool {
        self.link.is_open()
    }

    /// Block until the handshake settles. `true` if the link is open.
    pub fn wait_open(&self, timeout: Duration) -> bool {
        self.link.wait_settled(timeout) == LinkState::Open
    }

    pub fn features(&self) -> &FeatureSet {
        &self.features
    }

    /// Install a feature after the fact (or get the existing one of its kind).
    pub fn add_feature(&self, feature: Arc<dyn Feature>) -> Arc<dyn Feature> {
        self.features.add(feature)
    }

    pub fn remove_feature(&self, kind: FeatureKind) -> bool {
        self.features.remove(kind).is_some()
    }

    pub fn handshake(&self) -> Option<Arc<HandshakeFeature>> {
        self.features.get_as(FeatureKind::Authentication)
    }

    pub fn rpc(&self) -> Option<Arc<RequestManager>> {
        self.features.get_as(FeatureKind::RequestResponse)
    }

    pub fn sync(&self) -> Option<Arc<SyncManager>> {
        self.features.get_as(FeatureKind::Synchronization)
    }

    /// Send a direct message `[Message][type id][payload]`.
    pub fn send<T: Message>(&self, message: &T) -> Result<()> {
        if !self.link.is_open() {
            return Err(Error::Protocol(ProtocolError::NotAuthenticated));
        }
        let type_id = self.link.registry().message_id::<T>()?;
        let mut w = self.link.frame(FrameKind::Message, type_id)?;
        w.put_message(message)?;
        self.link.send(&w)?;
        Ok(())
    }

    /// Handle direct messages of type `T`. Returns `true` if an earlier
    /// handler was replaced.
    pub fn on_message<T, F>(&self, handler: F) -> Result<bool>
    where
        T: Message,
        F: Fn(&T) + Send + Sync + 'static,
    {
        let type_id = self.link.registry().message_id::<T>()?;
        let erased: MessageHandler = Arc::new(move |payload: &(dyn Any + Send)| {
            match payload.downcast_ref::<T>() {
                Some(message) => handler(message),
                None => log::warn!("[conn] decoded payload is not a {}", T::TYPE_NAME),
            }
        });
        let replaced = self.messages.write().insert(type_id, erased).is_some();
        if replaced {
            log::warn!("[conn] message handler for {} replaced", T::TYPE_NAME);
        }
        Ok(replaced)
    }

    pub fn remove_message_handler<T: Message>(&self) -> bool {
        match self.link.registry().message_id::<T>() {
            Ok(type_id) => self.messages.write().remove(&type_id).is_some(),
            Err(_) => false,
        }
    }

    /// Decode and route one inbound frame.
    pub(crate) fn on_data(&self, bytes: &[u8]) {
        let (before, after) = {
            let _inbound = self.inbound.lock();
            let before = self.link.state();
            if let Err(e) = self.route(bytes) {
                match e {
                    ProtocolError::NotAuthenticated => {
                        log::debug!("[conn] {} dropped frame before handshake", self.peer());
                    }
                    other => log::warn!("[conn] {} dropped frame: {}", self.peer(), other),
                }
            }
            (before, self.link.state())
        };
        if before != after {
            self.on_state_change(after);
        }
    }

    fn route(&self, bytes: &[u8]) -> std::result::Result<(), ProtocolError> {
        let mut r = self.link.pools().reader(bytes)?;
        let header = FrameHeader::read(&mut r)?;
        if !header.kind.is_control() && !self.link.is_open() {
            return Err(ProtocolError::NotAuthenticated);
        }
        match FeatureKind::for_frame(header.kind) {
            Some(kind) => {
                let feature = self
                    .features
                    .get(kind)
                    .ok_or(ProtocolError::FeatureMissing(kind.name()))?;
                feature.handle_frame(&header, &mut r)
            }
            None => self.dispatch_message(header.type_id, &mut r),
        }
    }

    fn dispatch_message(
        &self,
        type_id: u16,
        r: &mut Deserializer,
    ) -> std::result::Result<(), ProtocolError> {
        let handler = self
            .messages
            .read()
            .get(&type_id)
            .cloned()
            .ok_or(ProtocolError::NoHandler(type_id))?;
        let payload = self.link.registry().decode(type_id, r)?;
        handler(payload.as_ref());
        Ok(())
    }

    fn on_state_change(&self, state: LinkState) {
        match state {
            LinkState::Open => self.events.emit(NodeEvent::Authenticated(self.peer())),
            LinkState::Rejected => {
                self.events.emit(NodeEvent::Rejected(self.peer()));
                self.link.close("handshake rejected");
            }
            LinkState::Handshaking | LinkState::Closed => {}
        }
    }

    /// Resolve requests whose deadline passed.
    pub(crate) fn expire(&self, now: Instant) -> usize {
        self.rpc().map_or(0, |rpc| rpc.expire(now))
    }

    /// Close the link and disable every feature: outstanding requests resolve
    /// `Disconnected`, roots are destroyed locally.
    pub(crate) fn teardown(&self, reason: &str) {
        let _inbound = self.inbound.lock();
        self.link.set_state(LinkState::Closed);
        self.features.disable_all();
        self.messages.write().clear();
        log::info!("[conn] {} torn down: {}", self.peer(), reason);
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("link", &self.link)
            .field("features", &self.features.kinds())
            .finish()
    }
}
