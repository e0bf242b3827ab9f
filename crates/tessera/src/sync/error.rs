// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use crate::registry::RegistryError;
use crate::ser::SerError;
use std::fmt;

pub type SyncResult<T> = Result<T, SyncError>;

/// Errors raised by local synchronization operations.
#[derive(Debug)]
pub enum SyncError {
    /// Only the creating side may mutate or destroy a root.
    NotAuthority,
    /// The root was destroyed.
    Destroyed,
    /// Every root id is live on this connection.
    RootIdsExhausted,
    /// The root type does not declare this field id.
    UnknownField(u16),
    /// The feature was removed or the connection torn down.
    Disabled,
    /// The handshake has not completed.
    NotAuthenticated,
    Registry(RegistryError),
    Serialization(SerError),
    Send(std::io::Error),
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAuthority => write!(f, "root is owned by the peer"),
            Self::Destroyed => write!(f, "root was destroyed"),
            Self::RootIdsExhausted => write!(f, "no free root ids"),
            Self::UnknownField(id) => write!(f, "no field with id {}", id),
            Self::Disabled => write!(f, "synchronization feature disabled"),
            Self::NotAuthenticated => write!(f, "connection not authenticated"),
            Self::Registry(e) => write!(f, "registry error: {}", e),
            Self::Serialization(e) => write!(f, "serialization error: {}", e),
            Self::Send(e) => write!(f, "send failed: {}", e),
        }
    }
}

impl std::error::Error for SyncError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Registry(e) => Some(e),
            Self::Serialization(e) => Some(e),
            Self::Send(e) => Some(e),
            _ => None,
        }
    }
}

impl From<RegistryError> for SyncError {
    fn from(e: RegistryError) -> Self {
        Self::Registry(e)
    }
}

impl From<SerError> for SyncError {
    fn from(e: SerError) -> Self {
        Self::Serialization(e)
    }
}

impl From<std::io::Error> for SyncError {
    fn from(e: std::io::Error) -> Self {
        Self::Send(e)
    }
}
