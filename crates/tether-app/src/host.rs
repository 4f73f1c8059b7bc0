// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Simulated native host.
//
// Reads envelopes off the channel transport and answers the way an iOS or
// Android shell would, including each platform's own photo field names.

use serde_json::{Value, json};
use tether_bridge::Bridge;
use tether_core::types::wire;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{info, warn};

/// Which platform dialect the simulated host speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostPlatform {
    Ios,
    Android,
}

impl HostPlatform {
    fn photo(&self, index: u64) -> Value {
        let data = format!("data:image/jpeg;base64,/9j/{index:04}");
        match self {
            Self::Ios => json!({ "data": data, "type": "jpeg", "filename": format!("IMG_{index:04}.JPG") }),
            Self::Android => json!({ "dataUrl": data, "format": "jpeg", "size": 1024 + index }),
        }
    }
}

/// Answer envelopes as the host would.
///
/// `bridge` keeps the dispatcher, and with it the channel's sender, alive, so
/// the loop never sees the channel close on its own. The session ends it by
/// aborting the task.
pub async fn run(bridge: Bridge, mut outbound: UnboundedReceiver<Value>, platform: HostPlatform) {
    while let Some(envelope) = outbound.recv().await {
        let kind = envelope.get(wire::KIND).and_then(Value::as_str).unwrap_or_default();
        match kind {
            "camera-blocked" => {
                info!(?platform, "host: prompting for camera access");
                bridge.on_inbound(json!({ "name": wire::CAMERA_PERMISSION_RESULT, "granted": true }));
            }
            "photo-library" => {
                let limit = envelope
                    .get(wire::SELECTION_LIMIT)
                    .and_then(Value::as_u64)
                    .unwrap_or(1);
                let photos: Vec<Value> = (0..limit).map(|i| platform.photo(i)).collect();
                info!(?platform, count = photos.len(), "host: returning picked photos");
                bridge.on_inbound(json!({ "success": true, "cancelled": false, "photos": photos }));
            }
            "intent" => {
                let intent_type = envelope.get(wire::TYPE).and_then(Value::as_str).unwrap_or_default();
                if intent_type == "pdf" {
                    info!(url = %envelope[wire::URL], "host: opening PDF viewer");
                } else {
                    bridge.on_inbound(json!({
                        "name": wire::APPLICATION_ERROR,
                        "message": format!("no viewer for intent type `{intent_type}`"),
                    }));
                }
            }
            "open" => info!(url = %envelope[wire::URL], "host: navigating"),
            "close" => info!("host: closing web view"),
            "application-error" => warn!(message = %envelope[wire::MESSAGE], "host: web layer reported an error"),
            other => {
                warn!(kind = other, "host: unknown envelope kind");
                bridge.on_inbound(json!({
                    "name": wire::APPLICATION_ERROR,
                    "message": format!("unsupported kind `{other}`"),
                }));
            }
        }
    }
    info!(?platform, "host: bridge went away");
}
