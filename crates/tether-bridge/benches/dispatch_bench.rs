// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for the inbound hot path: normalization, and the
// linear registry scan with a realistic handful of pending requests.

use std::sync::Arc;
use std::time::Duration;

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use serde_json::json;

use tether_bridge::{Dispatcher, PendingHandle, TopicFilter, normalize};
use tether_bridge::ChannelTransport;
use tether_core::types::{InboundMessage, ResponseMatcher};

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

/// Alias collapsing on an Android-shaped picker answer with several photos.
fn bench_normalize_android_photos(c: &mut Criterion) {
    let photos: Vec<_> = (0..8)
        .map(|i| json!({ "dataUrl": format!("data:image/jpeg;base64,{i:04}"), "format": "jpeg" }))
        .collect();
    let raw = json!({ "success": true, "cancelled": false, "photos": photos });

    c.bench_function("normalize android photos (8)", |b| {
        b.iter(|| {
            let message = normalize(InboundMessage::from_value(black_box(raw.clone())));
            black_box(message);
        });
    });
}

/// Unclaimed inbound message scanned against N pending requests, then fanned
/// out to one wildcard subscriber.
fn bench_unclaimed_dispatch(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().expect("tokio runtime");
    let _enter = runtime.enter();

    let mut group = c.benchmark_group("unclaimed_dispatch");
    for pending in [1usize, 4, 16] {
        let (transport, _host) = ChannelTransport::new();
        let dispatcher = Dispatcher::new(Arc::new(transport));
        dispatcher.subscribe(TopicFilter::Any, |m| {
            black_box(m);
        })
        .expect("subscribe");
        let _handles: Vec<PendingHandle> = (0..pending)
            .map(|_| {
                dispatcher
                    .registry()
                    .register("bench", ResponseMatcher::by_name("never"), Duration::from_secs(3600))
                    .expect("register")
            })
            .collect();

        group.bench_function(format!("{pending} pending"), |b| {
            b.iter(|| {
                dispatcher.on_inbound_value(black_box(json!({ "name": "status", "ok": true })));
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_normalize_android_photos, bench_unclaimed_dispatch);
criterion_main!(benches);
