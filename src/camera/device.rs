//! Camera device selection.
//!
//! The frame source asks for a camera by `Facing`, not by path: the registry
//! maps each facing to a device URI. `stub://` URIs select the synthetic
//! backend; other URIs are device paths for real capture (feature
//! `camera-v4l2`).
//!
//! An unmapped facing is not an error. It is the "no device" condition: the
//! frame source idles and renders nothing until a device is registered.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Error, Result};
use serde::{Deserialize, Serialize};

/// Which way the requested camera points.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Facing {
    Front,
    Back,
}

impl Facing {
    pub fn as_str(&self) -> &'static str {
        match self {
            Facing::Front => "front",
            Facing::Back => "back",
        }
    }
}

impl fmt::Display for Facing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Facing {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "front" => Ok(Facing::Front),
            "back" => Ok(Facing::Back),
            other => Err(anyhow!("unknown facing '{}' (expected front|back)", other)),
        }
    }
}

/// Facing-to-URI device map.
#[derive(Clone, Debug, Default)]
pub struct DeviceRegistry {
    devices: HashMap<Facing, String>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with synthetic cameras on both facings.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.insert(Facing::Front, "stub://front_camera");
        registry.insert(Facing::Back, "stub://back_camera");
        registry
    }

    /// Build a registry from string facings, as read from a config file.
    pub fn from_map(devices: &HashMap<String, String>) -> Result<Self> {
        let mut registry = Self::new();
        for (facing, uri) in devices {
            registry.insert(facing.parse()?, uri);
        }
        Ok(registry)
    }

    pub fn insert(&mut self, facing: Facing, uri: &str) {
        self.devices.insert(facing, uri.to_string());
    }

    /// Resolve the URI for a facing. `None` means no device is available.
    pub fn resolve(&self, facing: Facing) -> Option<&str> {
        self.devices.get(&facing).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
