// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Crate-level error aggregation and inbound protocol errors.

use crate::registry::RegistryError;
use crate::rpc::RpcError;
use crate::ser::SerError;
use crate::sync::SyncError;
use crate::transport::PeerId;
use std::fmt;

/// Result type for node-level operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Reason an inbound frame was dropped.
///
/// Protocol errors never propagate to the caller of `Node::on_data`; the frame
/// is logged and discarded, and the connection keeps running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Frame could not be decoded.
    Malformed(SerError),
    /// First byte is not a known frame kind.
    UnknownKind(u8),
    /// Type id absent from the local registry, or of the wrong kind.
    UnknownType(u16),
    /// Reply for a correlation id that is not outstanding.
    UnknownCorrelation(u8),
    /// Sync frame for a root that is not live.
    UnknownRoot(u16),
    /// Sync update for a field the root type does not declare.
    UnknownField { root: u16, field: u16 },
    /// Create for a root id that is already live.
    DuplicateRoot(u16),
    /// No handler registered for the type id.
    NoHandler(u16),
    /// Typed traffic received before the handshake completed.
    NotAuthenticated,
    /// The connection has no feature able to handle the frame.
    FeatureMissing(&'static str),
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::Malformed(e) => write!(f, "malformed frame: {}", e),
            ProtocolError::UnknownKind(kind) => write!(f, "unknown frame kind 0x{:02x}", kind),
            ProtocolError::UnknownType(id) => write!(f, "unknown type id {}", id),
            ProtocolError::UnknownCorrelation(id) => {
                write!(f, "no outstanding request with correlation id {}", id)
            }
            ProtocolError::UnknownRoot(id) => write!(f, "no live root with id {}", id),
            ProtocolError::UnknownField { root, field } => {
                write!(f, "root {} has no field {}", root, field)
            }
            ProtocolError::DuplicateRoot(id) => write!(f, "root {} already exists", id),
            ProtocolError::NoHandler(id) => write!(f, "no handler for type id {}", id),
            ProtocolError::NotAuthenticated => write!(f, "handshake not completed"),
            ProtocolError::FeatureMissing(name) => write!(f, "{} feature not installed", name),
        }
    }
}

impl std::error::Error for ProtocolError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProtocolError::Malformed(e) => Some(e),
            _ => None,
        }
    }
}

impl From<SerError> for ProtocolError {
    fn from(e: SerError) -> Self {
        ProtocolError::Malformed(e)
    }
}

/// Errors surfaced by [`crate::node::Node`] and friends.
#[derive(Debug)]
pub enum Error {
    /// Invalid configuration (bad value, unreadable file).
    Config(String),
    /// Thread spawn or transport failure.
    Io(std::io::Error),
    Serialization(SerError),
    Registry(RegistryError),
    Protocol(ProtocolError),
    Rpc(RpcError),
    Sync(SyncError),
    /// No connection for the peer.
    UnknownPeer(PeerId),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(msg) => write!(f, "configuration error: {}", msg),
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Serialization(e) => write!(f, "serialization error: {}", e),
            Error::Registry(e) => write!(f, "registry error: {}", e),
            Error::Protocol(e) => write!(f, "protocol error: {}", e),
            Error::Rpc(e) => write!(f, "request error: {}", e),
            Error::Sync(e) => write!(f, "synchronization error: {}", e),
            Error::UnknownPeer(peer) => write!(f, "no connection for peer {}", peer),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Serialization(e) => Some(e),
            Error::Registry(e) => Some(e),
            Error::Protocol(e) => Some(e),
            Error::Rpc(e) => Some(e),
            Error::Sync(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<SerError> for Error {
    fn from(e: SerError) -> Self {
        Error::Serialization(e)
    }
}

impl From<RegistryError> for Error {
    fn from(e: RegistryError) -> Self {
        Error::Registry(e)
    }
}

impl From<ProtocolError> for Error {
    fn from(e: ProtocolError) -> Self {
        Error::Protocol(e)
    }
}

impl From<RpcError> for Error {
    fn from(e: RpcError) -> Self {
        Error::Rpc(e)
    }
}

impl From<SyncError> for Error {
    fn from(e: SyncError) -> Self {
        Error::Sync(e)
    }
}
