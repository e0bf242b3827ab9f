// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # Tessera - peer-to-peer messaging middleware
//!
//! Typed messages, correlated request/response calls and replicated object
//! state between long-lived peers, over any transport that delivers whole
//! frames reliably and in order.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tessera::{
//!     Deserializer, LoopbackLink, LoopbackTransport, Message, Node, Result, SerResult,
//!     Serializer, TypeRegistry,
//! };
//!
//! struct Ping(u32);
//!
//! impl Message for Ping {
//!     const TYPE_NAME: &'static str = "demo::Ping";
//!     fn encode(&self, w: &mut Serializer) -> SerResult<()> {
//!         w.put_u32(self.0)
//!     }
//!     fn decode(r: &mut Deserializer) -> SerResult<Self> {
//!         Ok(Ping(r.read_u32()?))
//!     }
//! }
//!
//! fn main() -> Result<()> {
//!     let mut registry = TypeRegistry::new();
//!     registry.register::<Ping>()?;
//!     let registry = Arc::new(registry);
//!
//!     let (ta, tb) = (LoopbackTransport::new(), LoopbackTransport::new());
//!     let server = Node::builder("server")
//!         .registry(Arc::clone(&registry))
//!         .transport(tb.clone())
//!         .on_connection(|conn| {
//!             if let Some(rpc) = conn.rpc() {
//!                 let _ = rpc.create_handler::<Ping, Ping, _>(|p| Ok(Ping(p.0 + 1)));
//!             }
//!         })
//!         .build()?;
//!     let client = Node::builder("client")
//!         .registry(registry)
//!         .transport(ta.clone())
//!         .build()?;
//!
//!     let link = LoopbackLink::connect(&client, &ta, &server, &tb)?;
//!     let conn = client.connection(link.peer_b()).expect("connected");
//!     assert!(conn.wait_open(Duration::from_secs(1)));
//!
//!     let rpc = conn.rpc().expect("rpc installed");
//!     let reply = rpc.call::<Ping, Ping>(&Ping(41), Duration::from_secs(1))?;
//!     assert_eq!(reply.into_payload().map(|p| p.0), Ok(42));
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +-----------------------------------------------------------+
//! |  Node: connections by peer, events, timeout sweeper        |
//! +-----------------------------------------------------------+
//! |  Connection: one decode at a time, routing by frame kind   |
//! |    HandshakeFeature | RequestManager | SyncManager | msgs  |
//! +-----------------------------------------------------------+
//! |  Link: writer section, state, pools, registry              |
//! +-----------------------------------------------------------+
//! |  TypeRegistry | Pools<Serializer/Deserializer> | frame     |
//! +-----------------------------------------------------------+
//! |  Transport (LoopbackTransport, or your own)                |
//! +-----------------------------------------------------------+
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Node`] | Owns connections, entry point for transports |
//! | [`Connection`] | One peer: features and direct messages |
//! | [`RequestManager`] | Correlated requests with timeouts |
//! | [`SyncManager`] | Replicated roots with per-field updates |
//! | [`TypeRegistry`] | Type ids shared by both ends |

/// Protocol constants and node configuration.
pub mod config;
/// Crate-level error types.
pub mod error;
/// Pluggable per-connection features.
pub mod feature;
/// Frame header codec.
pub mod frame;
/// Node, connections and lifecycle events.
pub mod node;
/// Object pools for serializers.
pub mod pool;
/// Type ids and the handshake table.
pub mod registry;
/// Request/response correlation.
pub mod rpc;
/// Binary serialization.
pub mod ser;
/// Replicated roots.
pub mod sync;
/// Transport seam and the in-memory loopback.
pub mod transport;

pub use config::NodeConfig;
pub use error::{Error, ProtocolError, Result};
pub use feature::{Feature, FeatureKind, FeatureSet, HandshakeFeature};
pub use frame::{FrameHeader, FrameKind};
pub use node::{Connection, LinkState, ListenerId, Node, NodeBuilder, NodeEvent, Role};
pub use pool::{Pool, PoolStats, Pooled, Pools};
pub use registry::{EntryKind, RegistryError, TypeEntry, TypeRegistry};
pub use rpc::{
    InboundRequest, RequestManager, RequestRecord, Responder, Response, ResponseStatus, RpcError,
};
pub use ser::{Deserializer, Message, SerError, SerResult, Serializer, WireValue};
pub use sync::{FieldTable, RootHandle, SyncError, SyncManager, SyncRoot};
pub use transport::{LoopbackLink, LoopbackTransport, PeerId, Transport};
