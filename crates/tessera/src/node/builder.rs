// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use super::events::EventBus;
use super::sweeper::spawn_sweeper;
use super::{Connection, ConnectionInit, Node, Role};
use crate::config::NodeConfig;
use crate::error::{Error, Result};
use crate::pool::Pools;
use crate::registry::TypeRegistry;
use crate::transport::Transport;
use dashmap::DashMap;
use std::sync::Arc;

/// Builder for [`Node`].
pub struct NodeBuilder {
    name: String,
    role: Role,
    config: NodeConfig,
    registry: Option<Arc<TypeRegistry>>,
    transport: Option<Arc<dyn Transport>>,
    initializers: Vec<ConnectionInit>,
}

impl NodeBuilder {
    pub(super) fn new(name: &str) -> Self {
        NodeBuilder {
            name: name.to_string(),
            role: Role::Peer,
            config: NodeConfig::default(),
            registry: None,
            transport: None,
            initializers: Vec::new(),
        }
    }

    /// Set the node role (default: `Peer`).
    pub fn role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    pub fn config(mut self, config: NodeConfig) -> Self {
        self.config = config;
        self
    }

    /// Shared type registry. Both ends must register the same types in the
    /// same order for the handshake to pass.
    pub fn registry(mut self, registry: Arc<TypeRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Required.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Run `init` on every new connection before its first frame is sent or
    /// received. Use it to install handlers.
    pub fn on_connection<F>(mut self, init: F) -> Self
    where
        F: Fn(&Arc<Connection>) + Send + Sync + 'static,
    {
        self.initializers.push(Box::new(init));
        self
    }

    /// Validate the configuration and start the timeout sweeper.
    pub fn build(self) -> Result<Arc<Node>> {
        self.config.validate().map_err(Error::Config)?;
        let transport = self
            .transport
            .ok_or_else(|| Error::Config("no transport configured".to_string()))?;
        let registry = self
            .registry
            .unwrap_or_else(|| Arc::new(TypeRegistry::new()));

        let pools = Arc::new(Pools::from_config(&self.config));
        let connections = Arc::new(DashMap::new());
        let sweeper = if self.config.request_response {
            Some(spawn_sweeper(
                &self.name,
                Arc::clone(&connections),
                self.config.timeout_tick,
            )?)
        } else {
            None
        };

        log::info!(
            "[node] {} ({}) ready: {} registered types",
            self.name,
            self.role,
            registry.len()
        );

        Ok(Arc::new(Node {
            name: self.name,
            role: self.role,
            config: Arc::new(self.config),
            registry,
            pools,
            transport,
            connections,
            events: Arc::new(EventBus::default()),
            initializers: self.initializers,
            _sweeper: sweeper,
        }))
    }
}
