// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error types for request/response operations.

use crate::registry::RegistryError;
use crate::rpc::ResponseStatus;
use crate::ser::SerError;
use std::fmt;

/// Result type for request/response operations
pub type RpcResult<T> = Result<T, RpcError>;

/// Errors raised locally by the request/response engine.
///
/// Remote outcomes (failure statuses, timeouts) are not errors: they arrive
/// as the `status` of a [`crate::rpc::Response`].
#[derive(Debug)]
pub enum RpcError {
    /// All 256 correlation ids are outstanding on this connection.
    Saturated,
    /// The handshake has not completed.
    NotAuthenticated,
    /// The feature was removed or the connection torn down.
    Disabled,
    /// A reply was already sent for this inbound request.
    AlreadyResponded,
    /// `Timeout` and `Disconnected` are local outcomes and cannot be sent.
    InvalidStatus(ResponseStatus),
    /// Payload type is not registered as a message.
    Registry(RegistryError),
    /// Payload failed to encode.
    Serialization(SerError),
    /// Transport refused the frame.
    Send(std::io::Error),
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Saturated => write!(f, "all correlation ids are in use"),
            Self::NotAuthenticated => write!(f, "connection not authenticated"),
            Self::Disabled => write!(f, "request/response feature disabled"),
            Self::AlreadyResponded => write!(f, "request already answered"),
            Self::InvalidStatus(status) => write!(f, "status {:?} cannot be sent", status),
            Self::Registry(e) => write!(f, "registry error: {}", e),
            Self::Serialization(e) => write!(f, "serialization error: {}", e),
            Self::Send(e) => write!(f, "send failed: {}", e),
        }
    }
}

impl std::error::Error for RpcError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Registry(e) => Some(e),
            Self::Serialization(e) => Some(e),
            Self::Send(e) => Some(e),
            _ => None,
        }
    }
}

impl From<RegistryError> for RpcError {
    fn from(e: RegistryError) -> Self {
        Self::Registry(e)
    }
}

impl From<SerError> for RpcError {
    fn from(e: SerError) -> Self {
        Self::Serialization(e)
    }
}

impl From<std::io::Error> for RpcError {
    fn from(e: std::io::Error) -> Self {
        Self::Send(e)
    }
}
