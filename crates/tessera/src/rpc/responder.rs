// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Reply handle for one inbound request.

use super::{ResponseStatus, RpcError, RpcResult};
use crate::config::CONTROL_TYPE_ID;
use crate::frame::FrameKind;
use crate::node::Link;
use crate::ser::Message;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Sends exactly one reply for an inbound request.
///
/// Can be moved to another thread and used later; the requester's timeout
/// bounds how long that may take.
pub struct Responder {
    link: Arc<Link>,
    correlation_id: u8,
    responded: AtomicBool,
}

impl Responder {
    pub(crate) fn new(link: Arc<Link>, correlation_id: u8) -> Self {
        Self {
            link,
            correlation_id,
            responded: AtomicBool::new(false),
        }
    }

    pub fn correlation_id(&self) -> u8 {
        self.correlation_id
    }

    pub fn has_responded(&self) -> bool {
        self.responded.load(Ordering::Acquire)
    }

    /// Reply with a payload.
    pub fn respond<R: Message>(&self, payload: &R, status: ResponseStatus) -> RpcResult<()> {
        let type_id = self.link.registry().message_id::<R>()?;
        self.send(type_id, status, Some(payload))
    }

    /// Reply with a status only.
    pub fn respond_status(&self, status: ResponseStatus) -> RpcResult<()> {
        self.send::<NoPayload>(CONTROL_TYPE_ID, status, None)
    }

    fn send<R: Message>(
        &self,
        type_id: u16,
        status: ResponseStatus,
        payload: Option<&R>,
    ) -> RpcResult<()> {
        let wire_status = status.to_wire().ok_or(RpcError::InvalidStatus(status))?;
        if !self.link.is_open() {
            return Err(RpcError::NotAuthenticated);
        }
        if self.responded.swap(true, Ordering::AcqRel) {
            return Err(RpcError::AlreadyResponded);
        }

        let encoded = self
            .link
            .frame(FrameKind::Response, type_id)
            .and_then(|mut w| {
                w.put_u8(self.correlation_id)?;
                w.put_u8(wire_status)?;
                if let Some(payload) = payload {
                    payload.encode(&mut w)?;
                }
                Ok(w)
            });
        let frame = match encoded {
            Ok(frame) => frame,
            Err(e) => {
                // Nothing left the process; allow another attempt.
                self.responded.store(false, Ordering::Release);
                return Err(e.into());
            }
        };
        self.link.send(&frame)?;
        log::debug!(
            "[rpc] replied {:?} to request {} from {}",
            status,
            self.correlation_id,
            self.link.peer()
        );
        Ok(())
    }
}

impl Drop for Responder {
    fn drop(&mut self) {
        if !self.has_responded() {
            log::debug!(
                "[rpc] request {} from {} dropped without reply",
                self.correlation_id,
                self.link.peer()
            );
        }
    }
}

/// Stand-in type parameter for status-only replies.
struct NoPayload;

impl Message for NoPayload {
    const TYPE_NAME: &'static str = "";

    fn encode(&self, _w: &mut crate::ser::Serializer) -> crate::ser::SerResult<()> {
        Ok(())
    }

    fn decode(_r: &mut crate::ser::Deserializer) -> crate::ser::SerResult<Self> {
        Ok(NoPayload)
    }
}
