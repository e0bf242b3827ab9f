// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Protocol constants and node configuration.
//!
//! - **Static**: wire constants shared by every peer (never change without a
//!   protocol version bump).
//! - **Dynamic**: [`NodeConfig`], per-node tuning (timeouts, pool sizes,
//!   which features each connection gets). With the `config-loaders` feature a
//!   config can be read from YAML, see [`NodeConfig::from_yaml_str`].

#[cfg(feature = "config-loaders")]
mod yaml;

#[cfg(feature = "config-loaders")]
pub use yaml::YamlNodeConfig;

use std::time::{Duration, Instant};

/// Type id carried by control frames (handshake, acks, responses without payload).
pub const CONTROL_TYPE_ID: u16 = 0;

/// Number of distinct correlation ids (1-byte id space).
pub const CORRELATION_SPACE: usize = 256;

/// Default request timeout when the caller does not pass one.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Default period of the request timeout sweep.
pub const DEFAULT_TIMEOUT_TICK: Duration = Duration::from_millis(20);

/// Default number of idle serializers/deserializers retained per pool.
pub const DEFAULT_POOL_CAPACITY: usize = 64;

/// Default initial buffer size for pooled instances.
pub const DEFAULT_INITIAL_BUFFER: usize = 256;

/// Default upper bound of an encoded frame (1 MB).
pub const DEFAULT_MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Stand-in for timeouts past what `Instant` can represent (about 100 years).
const FAR_DEADLINE: Duration = Duration::from_secs(100 * 365 * 24 * 3600);

/// `now + timeout`, clamped when the sum does not fit in an `Instant`.
pub(crate) fn deadline_after(now: Instant, timeout: Duration) -> Instant {
    now.checked_add(timeout)
        .or_else(|| now.checked_add(FAR_DEADLINE))
        .unwrap_or(now)
}

/// Per-node runtime configuration.
///
/// ```
/// use std::time::Duration;
/// use tessera::config::NodeConfig;
///
/// let config = NodeConfig::default()
///     .with_default_timeout(Duration::from_secs(2))
///     .with_synchronization(false);
/// assert!(config.request_response);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeConfig {
    /// Timeout used by `call_default`/`request_default`.
    pub default_timeout: Duration,
    /// Period of the background sweep that expires requests.
    pub timeout_tick: Duration,
    /// Idle instances retained by each pool.
    pub pool_capacity: usize,
    /// Instances constructed up front by each pool.
    pub pool_warm: usize,
    /// Initial byte capacity of pooled buffers.
    pub initial_buffer_capacity: usize,
    /// Hard limit on an encoded outbound frame.
    pub max_frame_size: usize,
    /// Run the type-registry handshake and gate typed traffic until it succeeds.
    pub handshake: bool,
    /// Install the request/response feature on every connection.
    pub request_response: bool,
    /// Install the synchronization feature on every connection.
    pub synchronization: bool,
    /// Flush replicated field changes as soon as they are written.
    pub auto_flush: bool,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            default_timeout: DEFAULT_REQUEST_TIMEOUT,
            timeout_tick: DEFAULT_TIMEOUT_TICK,
            pool_capacity: DEFAULT_POOL_CAPACITY,
            pool_warm: 0,
            initial_buffer_capacity: DEFAULT_INITIAL_BUFFER,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            handshake: true,
            request_response: true,
            synchronization: true,
            auto_flush: true,
        }
    }
}

impl NodeConfig {
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn with_timeout_tick(mut self, tick: Duration) -> Self {
        self.timeout_tick = tick;
        self
    }

    pub fn with_pool_capacity(mut self, capacity: usize) -> Self {
        self.pool_capacity = capacity;
        self
    }

    pub fn with_pool_warm(mut self, count: usize) -> Self {
        self.pool_warm = count;
        self
    }

    pub fn with_initial_buffer_capacity(mut self, bytes: usize) -> Self {
        self.initial_buffer_capacity = bytes;
        self
    }

    pub fn with_max_frame_size(mut self, bytes: usize) -> Self {
        self.max_frame_size = bytes;
        self
    }

    pub fn with_handshake(mut self, enabled: bool) -> Self {
        self.handshake = enabled;
        self
    }

    pub fn with_request_response(mut self, enabled: bool) -> Self {
        self.request_response = enabled;
        self
    }

    pub fn with_synchronization(mut self, enabled: bool) -> Self {
        self.synchronization = enabled;
        self
    }

    pub fn with_auto_flush(mut self, enabled: bool) -> Self {
        self.auto_flush = enabled;
        self
    }

    /// Check internal consistency.
    pub fn validate(&self) -> Result<(), String> {
        if self.timeout_tick.is_zero() {
            return Err("timeout_tick must be greater than zero".to_string());
        }
        if self.max_frame_size < crate::frame::FrameHeader::SIZE {
            return Err(format!(
                "max_frame_size {} cannot hold a frame header",
                self.max_frame_size
            ));
        }
        if self.pool_warm > self.pool_capacity {
            return Err(format!(
                "pool_warm {} exceeds pool_capacity {}",
                self.pool_warm, self.pool_capacity
            ));
        }
        Ok(())
    }
}
