// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Pluggable per-connection features.
//!
//! A connection owns a [`FeatureSet`] with at most one feature per
//! [`FeatureKind`]. The connection routes each inbound frame by kind to the
//! feature that owns it:
//!
//! | Frame kinds                              | Feature kind       |
//! |------------------------------------------|--------------------|
//! | `Handshake`, `HandshakeAck`              | `Authentication`   |
//! | `Request`, `Response`                    | `RequestResponse`  |
//! | `SyncCreate`, `SyncUpdate`, `SyncDestroy`| `Synchronization`  |
//!
//! Built-in features: [`HandshakeFeature`], [`crate::rpc::RequestManager`],
//! [`crate::sync::SyncManager`].

mod handshake;

pub use handshake::HandshakeFeature;

use crate::error::ProtocolError;
use crate::frame::{FrameHeader, FrameKind};
use crate::ser::Deserializer;
use parking_lot::RwLock;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Capability tag used to look features up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureKind {
    Authentication,
    RequestResponse,
    Synchronization,
}

impl FeatureKind {
    /// Feature responsible for a frame kind, `None` for direct messages.
    pub fn for_frame(kind: FrameKind) -> Option<Self> {
        match kind {
            FrameKind::Handshake | FrameKind::HandshakeAck => Some(FeatureKind::Authentication),
            FrameKind::Request | FrameKind::Response => Some(FeatureKind::RequestResponse),
            FrameKind::SyncCreate | FrameKind::SyncUpdate | FrameKind::SyncDestroy => {
                Some(FeatureKind::Synchronization)
            }
            FrameKind::Message => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            FeatureKind::Authentication => "authentication",
            FeatureKind::RequestResponse => "request/response",
            FeatureKind::Synchronization => "synchronization",
        }
    }
}

impl fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Optional unit of per-connection behavior.
pub trait Feature: Send + Sync + 'static {
    fn kind(&self) -> FeatureKind;

    /// Called when installed. Returns `false` if already enabled.
    fn enable(&self) -> bool;

    /// Called when removed or on teardown. Returns `false` if already disabled.
    fn disable(&self) -> bool;

    fn is_enabled(&self) -> bool;

    /// Handle one inbound frame routed to this feature.
    ///
    /// The reader is positioned right after the frame header.
    fn handle_frame(
        &self,
        header: &FrameHeader,
        reader: &mut Deserializer,
    ) -> Result<(), ProtocolError>;

    /// Upcast for typed lookup, see [`FeatureSet::get_as`].
    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

/// Idempotent enabled flag shared by feature implementations.
#[derive(Debug, Default)]
pub struct FeatureState {
    enabled: AtomicBool,
}

impl FeatureState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if this call changed the state.
    pub fn enable(&self) -> bool {
        !self.enabled.swap(true, Ordering::AcqRel)
    }

    /// Returns `true` if this call changed the state.
    pub fn disable(&self) -> bool {
        self.enabled.swap(false, Ordering::AcqRel)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }
}

/// Features installed on one connection, keyed by kind.
#[derive(Default)]
pub struct FeatureSet {
    features: RwLock<HashMap<FeatureKind, Arc<dyn Feature>>>,
}

impl FeatureSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable and install `feature`, or return the one already installed
    /// for its kind (the argument is then dropped untouched).
    pub fn add(&self, feature: Arc<dyn Feature>) -> Arc<dyn Feature> {
        let kind = feature.kind();
        let mut features = self.features.write();
        if let Some(existing) = features.get(&kind) {
            log::debug!("[feature] {} already installed", kind);
            return Arc::clone(existing);
        }
        feature.enable();
        features.insert(kind, Arc::clone(&feature));
        log::debug!("[feature] {} installed", kind);
        feature
    }

    /// Disable and detach the feature of `kind`.
    pub fn remove(&self, kind: FeatureKind) -> Option<Arc<dyn Feature>> {
        let removed = self.features.write().remove(&kind);
        if let Some(feature) = &removed {
            feature.disable();
            log::debug!("[feature] {} removed", kind);
        }
        removed
    }

    pub fn get(&self, kind: FeatureKind) -> Option<Arc<dyn Feature>> {
        self.features.read().get(&kind).cloned()
    }

    /// Typed lookup: `None` if absent or not a `T`.
    pub fn get_as<T: Feature>(&self, kind: FeatureKind) -> Option<Arc<T>> {
        self.get(kind)?.as_any().downcast::<T>().ok()
    }

    pub fn contains(&self, kind: FeatureKind) -> bool {
        self.features.read().contains_key(&kind)
    }

    pub fn kinds(&self) -> Vec<FeatureKind> {
        self.features.read().keys().copied().collect()
    }

    /// Disable and detach everything (connection teardown).
    pub fn disable_all(&self) {
        let drained: Vec<_> = self.features.write().drain().collect();
        for (kind, feature) in drained {
            feature.disable();
            log::debug!("[feature] {} disabled on teardown", kind);
        }
    }
}
