// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Synchronization roots.
//!
//! A root is a value replicated from its creator (the authority) to the peer.
//! The authority mutates it through a [`RootHandle`]; changed fields are found
//! by comparing each field's encoding with the last one sent, and go out as
//! one update frame per field.
//!
//! # Wire frames
//!
//! ```text
//! SyncCreate  [0x30][type id u16][root id u16][field 0]..[field N-1]
//! SyncUpdate  [0x31][type id u16][root id u16][field id u16][value]
//! SyncDestroy [0x32][type id u16][root id u16]
//! ```
//!
//! # Example
//!
//! ```ignore
//! #[derive(Default)]
//! struct Score { home: u32, away: u32 }
//!
//! impl SyncRoot for Score {
//!     const TYPE_NAME: &'static str = "game::Score";
//!
//!     fn describe(table: &mut FieldTable<Self>) {
//!         table
//!             .value("home", |s| &s.home, |s| &mut s.home)
//!             .value("away", |s| &s.away, |s| &mut s.away);
//!     }
//! }
//!
//! let score = sync.create(Score::default())?;
//! score.write(|s| s.home += 1)?; // one SyncUpdate for field 0
//! ```

mod error;
mod manager;
mod root;
mod table;

#[cfg(test)]
mod tests;

pub use error::{SyncError, SyncResult};
pub use manager::SyncManager;
pub use root::RootHandle;
pub use table::FieldTable;

pub(crate) use root::{spawn_observed, RootFactory};

/// A type that can be replicated as a root.
///
/// Observers construct instances with `Default` and then apply the create
/// frame's fields, so `describe` must list every replicated field.
pub trait SyncRoot: Default + Send + Sync + 'static {
    /// Stable cross-peer name, part of the handshake fingerprint.
    const TYPE_NAME: &'static str;

    /// Declare replicated fields in id order.
    fn describe(table: &mut FieldTable<Self>);
}
