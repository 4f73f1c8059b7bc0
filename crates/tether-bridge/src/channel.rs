// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-process transport backed by a tokio channel. Used on desktop/CI, in
// tests, and by the loopback host binary.

use serde_json::Value;
use tokio::sync::mpsc;

use crate::traits::Transport;

/// Transport whose "host" is the receiving half of an unbounded channel.
pub struct ChannelTransport {
    tx: mpsc::UnboundedSender<Value>,
}

impl ChannelTransport {
    /// Returns the transport and the receiver the simulated host reads from.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Value>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Transport for ChannelTransport {
    fn post(&self, envelope: Value) {
        if self.tx.send(envelope).is_err() {
            tracing::warn!("channel transport has no host attached; envelope dropped");
        }
    }

    fn name(&self) -> &str {
        "channel"
    }
}
