// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Tether loopback. Runs the bridge against a simulated iOS host and a
// simulated Android host and logs every outcome.
//
// Usage: tether-loopback [config.json]

mod host;

use std::sync::Arc;
use std::time::Duration;

use tether_bridge::{Bridge, ChannelTransport};
use tether_core::human_errors::humanize_error;
use tether_core::types::IntentRequest;
use tether_core::{BridgeConfig, BridgeError};

use host::HostPlatform;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("Tether loopback starting");

    let config = match std::env::args().nth(1) {
        Some(path) => match BridgeConfig::load(&path) {
            Ok(config) => config,
            Err(e) => {
                let human = humanize_error(&e);
                tracing::error!(error = %e, path = %path, suggestion = %human.suggestion, "could not load config");
                std::process::exit(2);
            }
        },
        None => BridgeConfig::default(),
    };

    for platform in [HostPlatform::Ios, HostPlatform::Android] {
        if let Err(e) = session(platform, config.clone()).await {
            tracing::error!(?platform, error = %e, "session failed");
        }
    }
}

/// One page lifetime: start the bridge, use every operation, tear down.
async fn session(platform: HostPlatform, config: BridgeConfig) -> Result<(), BridgeError> {
    let (transport, outbound) = ChannelTransport::new();
    let bridge = Bridge::new(Arc::new(transport), config)?;
    let host_task = tokio::spawn(host::run(bridge.clone(), outbound, platform));

    bridge.on_application_error(move |message| {
        tracing::warn!(?platform, message = message.unwrap_or("-"), "host reported an application error");
    })?;

    let granted = bridge.request_camera_permission(Some("scan a document")).await?;
    tracing::info!(?platform, granted, "camera permission");

    let selection = bridge.pick_photos(2, bridge.config().default_photo_filter).await?;
    for photo in selection.photos() {
        tracing::info!(?platform, format = %photo.format, bytes = photo.data.len(), filename = ?photo.filename, "picked photo");
    }

    bridge.open("https://portal.example.org/welcome")?;
    bridge.show_intent(&IntentRequest::pdf("https://portal.example.org/terms.pdf").with_title("Terms"))?;
    bridge.show_intent(&IntentRequest {
        intent_type: "spreadsheet".into(),
        url: "https://portal.example.org/report.xlsx".into(),
        title: None,
    })?;
    bridge.show_error(Some("demo error from the web layer"))?;
    bridge.close()?;

    // Let the host drain what we sent before tearing down.
    tokio::time::sleep(Duration::from_millis(50)).await;
    bridge.shutdown();
    drop(bridge);
    host_task.abort();
    Ok(())
}
