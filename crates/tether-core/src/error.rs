// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Tether.

use std::time::Duration;

use thiserror::Error;

/// Top-level error type for all bridge operations.
#[derive(Debug, Error)]
pub enum BridgeError {
    // -- Lifecycle --
    #[error("bridge transport is unavailable (bridge has been shut down)")]
    TransportUnavailable,

    // -- Correlated requests --
    #[error("no `{kind}` response within {after:?}")]
    Timeout { kind: String, after: Duration },

    #[error("request cancelled: {0}")]
    Cancelled(String),

    #[error("host reported failure: {}", .reason.as_deref().unwrap_or("no reason given"))]
    HostReportedFailure { reason: Option<String> },

    #[error("unrecognized response shape: {0}")]
    UnrecognizedResponseShape(String),

    // -- Envelope / config --
    #[error("invalid envelope: {0}")]
    InvalidEnvelope(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BridgeError {
    /// Whether this failure is a caller-side or host-side cancellation rather
    /// than a fault.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, BridgeError>;
