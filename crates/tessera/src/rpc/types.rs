// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Request/response value types.

use super::Responder;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Outcome of a request.
///
/// `Success`, `Failure` and `Custom` travel on the wire as one byte
/// (0, 1, and 2..=255). `Timeout` and `Disconnected` are produced locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseStatus {
    Success,
    Failure,
    /// Application-defined code, 2..=255.
    Custom(u8),
    /// No reply before the deadline.
    Timeout,
    /// Connection lost or feature disabled while outstanding.
    Disconnected,
}

impl ResponseStatus {
    /// Wire byte, `None` for local-only statuses and for `Custom(0 | 1)`.
    pub fn to_wire(self) -> Option<u8> {
        match self {
            ResponseStatus::Success => Some(0),
            ResponseStatus::Failure => Some(1),
            ResponseStatus::Custom(code) if code >= 2 => Some(code),
            _ => None,
        }
    }

    pub fn from_wire(byte: u8) -> Self {
        match byte {
            0 => ResponseStatus::Success,
            1 => ResponseStatus::Failure,
            code => ResponseStatus::Custom(code),
        }
    }

    pub fn is_success(self) -> bool {
        self == ResponseStatus::Success
    }

    /// True for statuses that never come from the peer.
    pub fn is_local(self) -> bool {
        matches!(self, ResponseStatus::Timeout | ResponseStatus::Disconnected)
    }
}

/// Caller-side record of one request.
#[derive(Debug, Clone)]
pub struct RequestRecord {
    pub(crate) correlation_id: u8,
    pub(crate) type_id: u16,
    pub(crate) sent_at: Instant,
    pub(crate) received_at: Option<Instant>,
    pub(crate) responded: Arc<AtomicBool>,
}

impl RequestRecord {
    pub(crate) fn new(correlation_id: u8, type_id: u16) -> Self {
        Self {
            correlation_id,
            type_id,
            sent_at: Instant::now(),
            received_at: None,
            responded: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn correlation_id(&self) -> u8 {
        self.correlation_id
    }

    /// Registry id of the request payload.
    pub fn type_id(&self) -> u16 {
        self.type_id
    }

    pub fn sent_at(&self) -> Instant {
        self.sent_at
    }

    /// `None` until a reply arrived.
    pub fn received_at(&self) -> Option<Instant> {
        self.received_at
    }

    pub fn round_trip(&self) -> Option<Duration> {
        self.received_at.map(|at| at.duration_since(self.sent_at))
    }

    /// Shared with every clone: flips once the request is resolved.
    pub fn has_responded(&self) -> bool {
        self.responded.load(Ordering::Acquire)
    }
}

/// Resolution of a request, delivered once to its callback.
#[derive(Debug)]
pub struct Response<R> {
    pub status: ResponseStatus,
    /// Decoded reply payload, when the peer sent one of type `R`.
    pub payload: Option<R>,
    pub record: RequestRecord,
}

impl<R> Response<R> {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Payload of a successful response.
    pub fn into_payload(self) -> Result<R, ResponseStatus> {
        match (self.status, self.payload) {
            (ResponseStatus::Success, Some(payload)) => Ok(payload),
            (ResponseStatus::Success, None) => Err(ResponseStatus::Failure),
            (status, _) => Err(status),
        }
    }
}

/// Receiving side of one request.
pub struct InboundRequest<T> {
    pub correlation_id: u8,
    pub payload: T,
    pub responder: Responder,
}

/// Per-connection counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RpcStats {
    pub requests_sent: u64,
    pub responses_received: u64,
    pub timeouts: u64,
    pub disconnected: u64,
    /// Replies whose correlation id was no longer outstanding.
    pub late_replies: u64,
    pub requests_handled: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_mapping() {
        assert_eq!(ResponseStatus::Success.to_wire(), Some(0));
        assert_eq!(ResponseStatus::Failure.to_wire(), Some(1));
        assert_eq!(ResponseStatus::Custom(42).to_wire(), Some(42));
        assert_eq!(ResponseStatus::Custom(1).to_wire(), None);
        assert_eq!(ResponseStatus::Timeout.to_wire(), None);
        assert_eq!(ResponseStatus::Disconnected.to_wire(), None);

        assert_eq!(ResponseStatus::from_wire(0), ResponseStatus::Success);
        assert_eq!(ResponseStatus::from_wire(1), ResponseStatus::Failure);
        assert_eq!(ResponseStatus::from_wire(200), ResponseStatus::Custom(200));
        assert!(ResponseStatus::Timeout.is_local());
    }

    #[test]
    fn test_record_shares_responded_flag() {
        let record = RequestRecord::new(3, 7);
        let copy = record.clone();
        assert!(!copy.has_responded());
        record.responded.store(true, Ordering::Release);
        assert!(copy.has_responded());
        assert_eq!(copy.round_trip(), None);
    }

    #[test]
    fn test_into_payload() {
        let ok = Response {
            status: ResponseStatus::Success,
            payload: Some(5u8),
            record: RequestRecord::new(0, 1),
        };
        assert_eq!(ok.into_payload(), Ok(5));

        let failed: Response<u8> = Response {
            status: ResponseStatus::Custom(9),
            payload: None,
            record: RequestRecord::new(0, 1),
        };
        assert_eq!(failed.into_payload(), Err(ResponseStatus::Custom(9)));
    }
}
