// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Request timeout sweeper.
//!
//! One background thread per node wakes every `timeout_tick` and resolves
//! expired requests on every connection with `ResponseStatus::Timeout`.

use super::Connection;
use crate::transport::PeerId;
use dashmap::DashMap;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Stops and joins the sweeper thread when dropped.
pub(crate) struct SweeperHandle {
    stop: Arc<AtomicBool>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.thread.take() {
            // A timeout callback may hold the last reference to the node.
            if handle.thread().id() == std::thread::current().id() {
                return;
            }
            let _ = handle.join();
        }
    }
}

pub(crate) fn spawn_sweeper(
    name: &str,
    connections: Arc<DashMap<PeerId, Arc<Connection>>>,
    tick: Duration,
) -> io::Result<SweeperHandle> {
    let stop = Arc::new(AtomicBool::new(false));
    let stop_clone = Arc::clone(&stop);

    let thread = std::thread::Builder::new()
        .name(format!("tessera-sweeper-{}", name))
        .spawn(move || {
            log::debug!("[sweeper] started with tick {:?}", tick);

            while !stop_clone.load(Ordering::Acquire) {
                std::thread::sleep(tick);

                if stop_clone.load(Ordering::Acquire) {
                    break;
                }

                // Collect first: callbacks must not run under a map shard lock.
                let live: Vec<Arc<Connection>> = connections
                    .iter()
                    .map(|entry| Arc::clone(entry.value()))
                    .collect();
                let now = Instant::now();
                let expired: usize = live.iter().map(|conn| conn.expire(now)).sum();
                if expired > 0 {
                    log::debug!("[sweeper] {} request(s) timed out", expired);
                }
            }

            log::debug!("[sweeper] stopped");
        })?;

    Ok(SweeperHandle {
        stop,
        thread: Some(thread),
    })
}
