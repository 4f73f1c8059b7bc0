// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The seam between the bridge and whatever carries messages across the
// process boundary (WKScriptMessageHandler, addJavascriptInterface, a
// postMessage shim, a test channel).

use serde_json::Value;

/// Outbound half of the host transport.
///
/// The transport delivers envelopes in send order and never acknowledges
/// them. Inbound traffic is pushed by the transport into
/// [`crate::Dispatcher::on_inbound`]; it has no pull side here.
pub trait Transport: Send + Sync {
    /// Hand one serialized envelope to the host.
    fn post(&self, envelope: Value);

    /// Short label for logs (e.g. "ios-webkit", "channel").
    fn name(&self) -> &str;
}
