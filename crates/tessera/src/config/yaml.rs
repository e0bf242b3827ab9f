// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! YAML node configuration loader.
//!
//! # Example YAML
//!
//! ```yaml
//! default_timeout_ms: 2000
//! timeout_tick_ms: 10
//! pool:
//!   capacity: 32
//!   warm: 8
//!   initial_buffer: 512
//! max_frame_size: 65536
//! features:
//!   handshake: true
//!   request_response: true
//!   synchronization: false
//! auto_flush: true
//! ```
//!
//! Every key is optional; missing keys keep [`NodeConfig::default`] values.

use super::NodeConfig;
use crate::error::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Root YAML document.
#[derive(Debug, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct YamlNodeConfig {
    pub default_timeout_ms: Option<u64>,
    pub timeout_tick_ms: Option<u64>,
    pub pool: Option<YamlPool>,
    pub max_frame_size: Option<usize>,
    pub features: Option<YamlFeatures>,
    pub auto_flush: Option<bool>,
}

/// Pool sizing in YAML.
#[derive(Debug, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct YamlPool {
    pub capacity: Option<usize>,
    pub warm: Option<usize>,
    pub initial_buffer: Option<usize>,
}

/// Per-connection feature switches in YAML.
#[derive(Debug, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct YamlFeatures {
    pub handshake: Option<bool>,
    pub request_response: Option<bool>,
    pub synchronization: Option<bool>,
}

impl YamlNodeConfig {
    /// Overlay the document onto the defaults.
    pub fn into_config(self) -> NodeConfig {
        let mut config = NodeConfig::default();
        if let Some(ms) = self.default_timeout_ms {
            config.default_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = self.timeout_tick_ms {
            config.timeout_tick = Duration::from_millis(ms);
        }
        if let Some(pool) = self.pool {
            if let Some(capacity) = pool.capacity {
                config.pool_capacity = capacity;
            }
            if let Some(warm) = pool.warm {
                config.pool_warm = warm;
            }
            if let Some(bytes) = pool.initial_buffer {
                config.initial_buffer_capacity = bytes;
            }
        }
        if let Some(bytes) = self.max_frame_size {
            config.max_frame_size = bytes;
        }
        if let Some(features) = self.features {
            if let Some(on) = features.handshake {
                config.handshake = on;
            }
            if let Some(on) = features.request_response {
                config.request_response = on;
            }
            if let Some(on) = features.synchronization {
                config.synchronization = on;
            }
        }
        if let Some(on) = self.auto_flush {
            config.auto_flush = on;
        }
        config
    }
}

impl NodeConfig {
    /// Parse and validate a YAML document.
    pub fn from_yaml_str(text: &str) -> Result<Self, Error> {
        let doc: YamlNodeConfig = serde_yaml::from_str(text)
            .map_err(|e| Error::Config(format!("invalid YAML config: {}", e)))?;
        let config = doc.into_config();
        config.validate().map_err(Error::Config)?;
        Ok(config)
    }

    /// Read, parse and validate a YAML file.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read config {}: {}", path.display(), e))
        })?;
        log::debug!("[config] loading node config from {}", path.display());
        Self::from_yaml_str(&text)
    }
}
