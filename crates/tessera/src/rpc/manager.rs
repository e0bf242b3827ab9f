// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Request/response feature.

use super::outstanding::{Completion, Outstanding, Pending};
use super::{
    InboundRequest, RequestRecord, Responder, Response, ResponseStatus, RpcError, RpcResult,
    RpcStats,
};
use crate::config::{deadline_after, CONTROL_TYPE_ID};
use crate::error::ProtocolError;
use crate::feature::{Feature, FeatureKind, FeatureState};
use crate::frame::{FrameHeader, FrameKind};
use crate::node::Link;
use crate::ser::{Deserializer, Message};
use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Grace added on top of the request timeout before `call` sweeps by itself.
const CALL_GRACE: Duration = Duration::from_millis(250);

type InboundHandler = Arc<dyn Fn(u8, &mut Deserializer) -> Result<(), ProtocolError> + Send + Sync>;

#[derive(Default)]
struct Counters {
    requests_sent: AtomicU64,
    responses_received: AtomicU64,
    timeouts: AtomicU64,
    disconnected: AtomicU64,
    late_replies: AtomicU64,
    requests_handled: AtomicU64,
}

/// Correlates outgoing requests with replies and dispatches inbound requests
/// to per-type handlers.
///
/// Ids are one byte, so at most 256 requests can be outstanding per
/// connection; the 257th fails with [`RpcError::Saturated`]. Every request is
/// resolved exactly once: by its reply, by the timeout sweep, or by teardown
/// (`Disconnected`), whichever removes its slot first.
pub struct RequestManager {
    link: Arc<Link>,
    state: FeatureState,
    outstanding: Mutex<Outstanding>,
    handlers: RwLock<HashMap<u16, InboundHandler>>,
    counters: Arc<Counters>,
}

impl RequestManager {
    pub fn new(link: Arc<Link>) -> Self {
        Self {
            link,
            state: FeatureState::new(),
            outstanding: Mutex::new(Outstanding::new()),
            handlers: RwLock::new(HashMap::new()),
            counters: Arc::new(Counters::default()),
        }
    }

    /// Send `payload` and invoke `on_response` once with the outcome.
    ///
    /// An `Err` means nothing was sent and `on_response` will never run.
    pub fn request<T, R, F>(
        &self,
        payload: &T,
        timeout: Duration,
        on_response: F,
    ) -> RpcResult<RequestRecord>
    where
        T: Message,
        R: Message,
        F: FnOnce(Response<R>) + Send + 'static,
    {
        if !self.state.is_enabled() {
            return Err(RpcError::Disabled);
        }
        if !self.link.is_open() {
            return Err(RpcError::NotAuthenticated);
        }
        let registry = self.link.registry();
        let request_type = registry.message_id::<T>()?;
        let response_type = registry.message_id::<R>()?;

        let deadline = deadline_after(Instant::now(), timeout);
        let resolver = Box::new(move |done: Completion<'_>| {
            let Completion {
                status,
                type_id,
                reader,
                record,
            } = done;
            let payload = reader.and_then(|r| decode_reply::<R>(response_type, type_id, r));
            on_response(Response {
                status,
                payload,
                record,
            });
        });

        let mut record = None;
        let id = self
            .outstanding
            .lock()
            .allocate(|id| {
                let r = RequestRecord::new(id, request_type);
                record = Some(r.clone());
                Pending::new(r, deadline, resolver)
            })
            .ok_or(RpcError::Saturated)?;
        let record = record.ok_or(RpcError::Saturated)?;
        if !self.state.is_enabled() {
            // Disabled while allocating; teardown already drained the set.
            self.outstanding.lock().take(id);
            return Err(RpcError::Disabled);
        }

        if let Err(e) = self.send_request(request_type, id, payload) {
            // Reclaim the slot; the callback is dropped unrun.
            self.outstanding.lock().take(id);
            return Err(e);
        }
        self.counters.requests_sent.fetch_add(1, Ordering::Relaxed);
        log::debug!(
            "[rpc] request {} ({}) to {}, timeout {:?}",
            id,
            T::TYPE_NAME,
            self.link.peer(),
            timeout
        );
        Ok(record)
    }

    /// [`request`](Self::request) with the configured default timeout.
    pub fn request_default<T, R, F>(&self, payload: &T, on_response: F) -> RpcResult<RequestRecord>
    where
        T: Message,
        R: Message,
        F: FnOnce(Response<R>) + Send + 'static,
    {
        let timeout = self.link.config().default_timeout;
        self.request(payload, timeout, on_response)
    }

    /// Blocking request.
    ///
    /// Must not be called from a request handler or an `on_response` callback
    /// running on this connection's inbound path: the reply could only be
    /// decoded after the callback returns, so the call would run into its
    /// timeout. Sync create/update/destroy callbacks run on the same path.
    pub fn call<T: Message, R: Message>(
        &self,
        payload: &T,
        timeout: Duration,
    ) -> RpcResult<Response<R>> {
        let (tx, rx) = crossbeam::channel::bounded(1);
        self.request::<T, R, _>(payload, timeout, move |response| {
            let _ = tx.send(response);
        })?;
        match rx.recv_timeout(timeout.saturating_add(CALL_GRACE)) {
            Ok(response) => Ok(response),
            Err(_) => {
                // No sweeper running (standalone use): expire here.
                self.expire(Instant::now());
                rx.try_recv().map_err(|_| RpcError::Disabled)
            }
        }
    }

    pub fn call_default<T: Message, R: Message>(&self, payload: &T) -> RpcResult<Response<R>> {
        let timeout = self.link.config().default_timeout;
        self.call(payload, timeout)
    }

    /// Register the handler for requests carrying `T`.
    ///
    /// Returns `true` if a previous handler for `T` was replaced.
    pub fn on_request<T, F>(&self, handler: F) -> RpcResult<bool>
    where
        T: Message,
        F: Fn(InboundRequest<T>) + Send + Sync + 'static,
    {
        let type_id = self.link.registry().message_id::<T>()?;
        let link = Arc::clone(&self.link);
        let counters = Arc::clone(&self.counters);
        let dispatch: InboundHandler =
            Arc::new(move |correlation_id: u8, reader: &mut Deserializer| {
                let payload = T::decode(reader)?;
                counters.requests_handled.fetch_add(1, Ordering::Relaxed);
                handler(InboundRequest {
                    correlation_id,
                    payload,
                    responder: Responder::new(Arc::clone(&link), correlation_id),
                });
                Ok(())
            });
        let replaced = self.handlers.write().insert(type_id, dispatch).is_some();
        if replaced {
            log::warn!("[rpc] request handler for {} replaced", T::TYPE_NAME);
        }
        Ok(replaced)
    }

    /// Register a function that maps a request to a reply.
    ///
    /// `Ok(reply)` is sent with `Success`; `Err(status)` is sent without payload.
    pub fn create_handler<T, R, F>(&self, handler: F) -> RpcResult<bool>
    where
        T: Message,
        R: Message,
        F: Fn(&T) -> Result<R, ResponseStatus> + Send + Sync + 'static,
    {
        self.link.registry().message_id::<R>()?;
        self.on_request::<T, _>(move |request| {
            let sent = match handler(&request.payload) {
                Ok(reply) => request.responder.respond(&reply, ResponseStatus::Success),
                Err(status) => request.responder.respond_status(status),
            };
            if let Err(e) = sent {
                log::warn!(
                    "[rpc] reply to request {} failed: {}",
                    request.correlation_id,
                    e
                );
            }
        })
    }

    /// Drop the handler for `T`.
    pub fn remove_handler<T: Message>(&self) -> bool {
        match self.link.registry().message_id::<T>() {
            Ok(type_id) => self.handlers.write().remove(&type_id).is_some(),
            Err(_) => false,
        }
    }

    /// Resolve every request whose deadline passed with `Timeout`.
    pub fn expire(&self, now: Instant) -> usize {
        let expired = self.outstanding.lock().take_expired(now);
        let count = expired.len();
        for pending in expired {
            log::debug!(
                "[rpc] request {} to {} timed out",
                pending.record.correlation_id,
                self.link.peer()
            );
            pending.resolve(ResponseStatus::Timeout, CONTROL_TYPE_ID, None);
        }
        self.counters
            .timeouts
            .fetch_add(count as u64, Ordering::Relaxed);
        count
    }

    pub fn outstanding(&self) -> usize {
        self.outstanding.lock().len()
    }

    pub fn is_outstanding(&self, correlation_id: u8) -> bool {
        self.outstanding.lock().contains(correlation_id)
    }

    pub fn stats(&self) -> RpcStats {
        let c = &self.counters;
        RpcStats {
            requests_sent: c.requests_sent.load(Ordering::Relaxed),
            responses_received: c.responses_received.load(Ordering::Relaxed),
            timeouts: c.timeouts.load(Ordering::Relaxed),
            disconnected: c.disconnected.load(Ordering::Relaxed),
            late_replies: c.late_replies.load(Ordering::Relaxed),
            requests_handled: c.requests_handled.load(Ordering::Relaxed),
        }
    }

    fn send_request<T: Message>(&self, type_id: u16, id: u8, payload: &T) -> RpcResult<()> {
        let mut w = self.link.frame(FrameKind::Request, type_id)?;
        w.put_u8(id)?;
        payload.encode(&mut w)?;
        self.link.send(&w)?;
        Ok(())
    }

    fn handle_request(&self, type_id: u16, reader: &mut Deserializer) -> Result<(), ProtocolError> {
        let correlation_id = reader.read_u8()?;
        let handler = self
            .handlers
            .read()
            .get(&type_id)
            .cloned()
            .ok_or(ProtocolError::NoHandler(type_id))?;
        handler(correlation_id, reader)
    }

    fn handle_response(
        &self,
        type_id: u16,
        reader: &mut Deserializer,
    ) -> Result<(), ProtocolError> {
        let correlation_id = reader.read_u8()?;
        let status = ResponseStatus::from_wire(reader.read_u8()?);
        let pending = self.outstanding.lock().take(correlation_id);
        match pending {
            Some(pending) => {
                self.counters
                    .responses_received
                    .fetch_add(1, Ordering::Relaxed);
                pending.resolve(status, type_id, Some(reader));
                Ok(())
            }
            None => {
                self.counters.late_replies.fetch_add(1, Ordering::Relaxed);
                Err(ProtocolError::UnknownCorrelation(correlation_id))
            }
        }
    }
}

fn decode_reply<R: Message>(expected: u16, received: u16, reader: &mut Deserializer) -> Option<R> {
    if received == CONTROL_TYPE_ID {
        return None;
    }
    if received != expected {
        log::warn!(
            "[rpc] reply carries type id {}, expected {} ({})",
            received,
            expected,
            R::TYPE_NAME
        );
        return None;
    }
    match R::decode(reader) {
        Ok(payload) => Some(payload),
        Err(e) => {
            log::warn!("[rpc] reply payload {} failed to decode: {}", R::TYPE_NAME, e);
            None
        }
    }
}

impl Feature for RequestManager {
    fn kind(&self) -> FeatureKind {
        FeatureKind::RequestResponse
    }

    fn enable(&self) -> bool {
        self.state.enable()
    }

    /// Resolves every outstanding request with `Disconnected` and drops all
    /// handlers.
    fn disable(&self) -> bool {
        if !self.state.disable() {
            return false;
        }
        let drained = self.outstanding.lock().drain();
        self.counters
            .disconnected
            .fetch_add(drained.len() as u64, Ordering::Relaxed);
        for pending in drained {
            pending.resolve(ResponseStatus::Disconnected, CONTROL_TYPE_ID, None);
        }
        self.handlers.write().clear();
        true
    }

    fn is_enabled(&self) -> bool {
        self.state.is_enabled()
    }

    fn handle_frame(
        &self,
        header: &FrameHeader,
        reader: &mut Deserializer,
    ) -> Result<(), ProtocolError> {
        match header.kind {
            FrameKind::Request => self.handle_request(header.type_id, reader),
            FrameKind::Response => self.handle_response(header.type_id, reader),
            other => Err(ProtocolError::UnknownKind(other.as_u8())),
        }
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
