// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Request/response correlation.
//!
//! # Overview
//!
//! - **Callers** send a typed request and receive exactly one [`Response`]:
//!   the peer's reply, `Timeout`, or `Disconnected`.
//! - **Handlers** receive an [`InboundRequest`] and answer through its
//!   [`Responder`], at most once.
//!
//! # Wire format
//!
//! ```text
//! Request : [0x20][u16 type id T][u8 correlation id][payload T]
//! Response: [0x21][u16 type id R or 0][u8 correlation id][u8 status][payload R]
//! ```
//!
//! # Correlation
//!
//! Each connection has 256 correlation ids. An id is unique among the
//! requests currently outstanding on that connection; it is freed when the
//! request resolves and reused as late as possible.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use tessera::rpc::{RequestManager, ResponseStatus};
//! # use tessera::ser::{Deserializer, Message, SerResult, Serializer};
//! # struct Ping(u32);
//! # impl Message for Ping {
//! #     const TYPE_NAME: &'static str = "demo::Ping";
//! #     fn encode(&self, w: &mut Serializer) -> SerResult<()> { w.put_u32(self.0) }
//! #     fn decode(r: &mut Deserializer) -> SerResult<Self> { Ok(Ping(r.read_u32()?)) }
//! # }
//! # struct Pong(u32);
//! # impl Message for Pong {
//! #     const TYPE_NAME: &'static str = "demo::Pong";
//! #     fn encode(&self, w: &mut Serializer) -> SerResult<()> { w.put_u32(self.0) }
//! #     fn decode(r: &mut Deserializer) -> SerResult<Self> { Ok(Pong(r.read_u32()?)) }
//! # }
//! # fn demo(server: &RequestManager, client: &RequestManager) -> tessera::rpc::RpcResult<()> {
//! server.create_handler::<Ping, Pong, _>(|ping| Ok(Pong(ping.0 + 1)))?;
//!
//! let response = client.call::<Ping, Pong>(&Ping(41), Duration::from_secs(2))?;
//! assert_eq!(response.status, ResponseStatus::Success);
//! # Ok(())
//! # }
//! ```

mod error;
mod manager;
mod outstanding;
mod responder;
mod types;

pub use error::{RpcError, RpcResult};
pub use manager::RequestManager;
pub use responder::Responder;
pub use types::{InboundRequest, RequestRecord, Response, ResponseStatus, RpcStats};
