// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bridge configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, Result};
use crate::types::PhotoFilter;

/// Tunables for the bridge facade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// How long to wait for `camera-permission-result` (milliseconds).
    pub camera_permission_timeout_ms: u64,
    /// How long to wait for the photo picker to answer (milliseconds).
    /// Generous because the user is interacting with the picker.
    pub photo_library_timeout_ms: u64,
    /// Selection limit used by `pick_photos_default`.
    pub default_selection_limit: u32,
    /// Media filter used by `pick_photos_default`.
    pub default_photo_filter: PhotoFilter,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            camera_permission_timeout_ms: 30_000,
            photo_library_timeout_ms: 120_000,
            default_selection_limit: 1,
            default_photo_filter: PhotoFilter::Images,
        }
    }
}

impl BridgeConfig {
    pub fn camera_permission_timeout(&self) -> Duration {
        Duration::from_millis(self.camera_permission_timeout_ms)
    }

    pub fn photo_library_timeout(&self) -> Duration {
        Duration::from_millis(self.photo_library_timeout_ms)
    }

    /// Parse from JSON; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file on disk.
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        if self.camera_permission_timeout_ms == 0 {
            return Err(BridgeError::Config(
                "camera_permission_timeout_ms must be greater than zero".into(),
            ));
        }
        if self.photo_library_timeout_ms == 0 {
            return Err(BridgeError::Config(
                "photo_library_timeout_ms must be greater than zero".into(),
            ));
        }
        if self.default_selection_limit == 0 {
            return Err(BridgeError::Config(
                "default_selection_limit must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
