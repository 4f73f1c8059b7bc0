// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Dispatcher: the single choke point for bridge traffic.
//
// Outbound: serialize the envelope and hand it to the transport, nothing else.
//
// Inbound: normalize -> offer to the correlation registry -> if unclaimed,
// fan out to topic subscribers. A claimed message is never also delivered to
// subscribers.
//
// Inbound messages are processed one at a time in arrival order. A message
// pushed while another is being processed (from another thread, or from
// inside a subscriber callback) is queued and handled by the call that is
// already draining, after the current message has fully completed.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tether_core::error::{BridgeError, Result};
use tether_core::types::{InboundMessage, OutboundMessage, SubscriptionId};
use tracing::{debug, info, warn};

use crate::normalizer::{HostEvent, NormalizedMessage, Topic, normalize};
use crate::registry::{CorrelationRegistry, Resolution};
use crate::traits::Transport;

/// Callback invoked synchronously for each unclaimed message on its topic.
pub type SubscriberCallback = Arc<dyn Fn(&NormalizedMessage) + Send + Sync>;

/// Which unclaimed messages a subscription receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopicFilter {
    Exact(Topic),
    /// Every unclaimed message, whatever its topic.
    Any,
}

impl TopicFilter {
    pub fn accepts(&self, topic: &Topic) -> bool {
        match self {
            Self::Exact(wanted) => wanted == topic,
            Self::Any => true,
        }
    }
}

impl From<Topic> for TopicFilter {
    fn from(topic: Topic) -> Self {
        Self::Exact(topic)
    }
}

struct Subscription {
    id: SubscriptionId,
    filter: TopicFilter,
    callback: SubscriberCallback,
}

#[derive(Default)]
struct InboundQueue {
    queue: VecDeque<InboundMessage>,
    draining: bool,
}

/// Resets the drain flag if a subscriber panics mid-drain so the next
/// `on_inbound` call picks the queue back up.
struct DrainGuard<'a>(&'a Mutex<InboundQueue>);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            lock(self.0).draining = false;
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct Dispatcher {
    transport: Arc<dyn Transport>,
    registry: CorrelationRegistry,
    /// Registration order is delivery order.
    subscriptions: Mutex<Vec<Subscription>>,
    inbound: Mutex<InboundQueue>,
    closed: AtomicBool,
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        info!(transport = transport.name(), "dispatcher started");
        Self {
            transport,
            registry: CorrelationRegistry::new(),
            subscriptions: Mutex::new(Vec::new()),
            inbound: Mutex::new(InboundQueue::default()),
            closed: AtomicBool::new(false),
        }
    }

    pub fn registry(&self) -> &CorrelationRegistry {
        &self.registry
    }

    /// Emit exactly one envelope. Never waits for an answer.
    pub fn send(&self, envelope: &OutboundMessage) -> Result<()> {
        if self.is_closed() {
            return Err(BridgeError::TransportUnavailable);
        }
        let wire = envelope.to_value()?;
        debug!(kind = envelope.kind(), transport = self.transport.name(), "sending envelope");
        self.transport.post(wire);
        Ok(())
    }

    /// Transport entry point for any JSON value.
    pub fn on_inbound_value(&self, raw: Value) {
        self.on_inbound(InboundMessage::from_value(raw));
    }

    /// Transport entry point. See the module docs for ordering guarantees.
    pub fn on_inbound(&self, raw: InboundMessage) {
        if self.is_closed() {
            debug!("dropping inbound message received after shutdown");
            return;
        }

        {
            let mut inbound = lock(&self.inbound);
            inbound.queue.push_back(raw);
            if inbound.draining {
                return;
            }
            inbound.draining = true;
        }

        let _guard = DrainGuard(&self.inbound);
        loop {
            let next = {
                let mut inbound = lock(&self.inbound);
                match inbound.queue.pop_front() {
                    Some(message) => message,
                    None => {
                        inbound.draining = false;
                        return;
                    }
                }
            };
            self.process(next);
        }
    }

    fn process(&self, raw: InboundMessage) {
        let message = normalize(raw);
        let topic = message.topic();
        match self.registry.resolve_matching(message) {
            Resolution::Claimed(pending_id) => {
                debug!(%pending_id, %topic, "inbound message claimed by pending request");
            }
            Resolution::Unclaimed(message) => {
                self.fan_out(&topic, &message);
            }
        }
    }

    /// Deliver to every subscription accepting `topic`, in registration order.
    /// Returns the number of callbacks invoked.
    fn fan_out(&self, topic: &Topic, message: &NormalizedMessage) -> usize {
        // Callbacks run outside the lock so they may subscribe or unsubscribe.
        let callbacks: Vec<SubscriberCallback> = lock(&self.subscriptions)
            .iter()
            .filter(|s| s.filter.accepts(topic))
            .map(|s| Arc::clone(&s.callback))
            .collect();

        if callbacks.is_empty() {
            if message.event == HostEvent::Unrecognized {
                let keys: Vec<&str> = message.fields.keys().map(String::as_str).collect();
                warn!(?keys, "unrecognized inbound shape; no subscriber claimed it");
            } else {
                debug!(%topic, "unclaimed inbound message had no subscribers");
            }
            return 0;
        }

        debug!(%topic, subscribers = callbacks.len(), "fanning out inbound message");
        for callback in &callbacks {
            callback(message);
        }
        callbacks.len()
    }

    pub fn subscribe<F>(&self, filter: impl Into<TopicFilter>, callback: F) -> Result<SubscriptionId>
    where
        F: Fn(&NormalizedMessage) + Send + Sync + 'static,
    {
        if self.is_closed() {
            return Err(BridgeError::TransportUnavailable);
        }
        let id = SubscriptionId::new();
        let filter = filter.into();
        debug!(subscription_id = %id, ?filter, "subscribing");
        lock(&self.subscriptions).push(Subscription {
            id,
            filter,
            callback: Arc::new(callback),
        });
        Ok(id)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscriptions = lock(&self.subscriptions);
        let before = subscriptions.len();
        subscriptions.retain(|s| s.id != id);
        before != subscriptions.len()
    }

    pub fn subscription_count(&self) -> usize {
        lock(&self.subscriptions).len()
    }

    /// Tear down: refuse further traffic, cancel every pending request and
    /// drop all subscriptions. Idempotent.
    pub fn shutdown(&self, reason: &str) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let cancelled = self.registry.close(reason);
        lock(&self.subscriptions).clear();
        lock(&self.inbound).queue.clear();
        info!(reason, cancelled, "dispatcher shut down");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.shutdown("dispatcher dropped");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Weak;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use super::*;
    use crate::channel::ChannelTransport;
    use serde_json::json;
    use tether_core::types::{MessageKind, ResponseMatcher};

    fn dispatcher() -> (Arc<Dispatcher>, tokio::sync::mpsc::UnboundedReceiver<Value>) {
        let (transport, host) = ChannelTransport::new();
        (Arc::new(Dispatcher::new(Arc::new(transport))), host)
    }

    fn recorder(
        dispatcher: &Dispatcher,
        filter: impl Into<TopicFilter>,
        label: &'static str,
        log: &Arc<Mutex<Vec<String>>>,
    ) {
        let log = Arc::clone(log);
        dispatcher
            .subscribe(filter, move |m| {
                let tag = m.fields.get("tag").and_then(Value::as_str).unwrap_or("-");
                log.lock().unwrap().push(format!("{label}:{tag}"));
            })
            .unwrap();
    }

    #[test]
    fn send_emits_exactly_one_envelope() {
        let (dispatcher, mut host) = dispatcher();
        let envelope = OutboundMessage::for_kind(MessageKind::Close, Default::default()).unwrap();
        dispatcher.send(&envelope).unwrap();
        assert_eq!(host.try_recv().unwrap(), json!({ "kind": "close" }));
        assert!(host.try_recv().is_err());
    }

    #[test]
    fn send_after_shutdown_fails() {
        let (dispatcher, mut host) = dispatcher();
        dispatcher.shutdown("test");
        let envelope = OutboundMessage::for_kind(MessageKind::Close, Default::default()).unwrap();
        assert!(matches!(dispatcher.send(&envelope), Err(BridgeError::TransportUnavailable)));
        assert!(host.try_recv().is_err());
    }

    #[test]
    fn subscribers_run_in_registration_order_per_message() {
        let (dispatcher, _host) = dispatcher();
        let log = Arc::new(Mutex::new(Vec::new()));
        recorder(&dispatcher, Topic::Named("ping".into()), "first", &log);
        recorder(&dispatcher, TopicFilter::Any, "second", &log);

        dispatcher.on_inbound_value(json!({ "name": "ping", "tag": "A" }));
        dispatcher.on_inbound_value(json!({ "name": "ping", "tag": "B" }));

        assert_eq!(
            *log.lock().unwrap(),
            vec!["first:A", "second:A", "first:B", "second:B"]
        );
    }

    #[test]
    fn topic_filter_limits_delivery() {
        let (dispatcher, _host) = dispatcher();
        let log = Arc::new(Mutex::new(Vec::new()));
        recorder(&dispatcher, Topic::Camera, "camera", &log);

        dispatcher.on_inbound_value(json!({ "photos": [], "tag": "P" }));
        dispatcher.on_inbound_value(json!({ "name": "camera-permission-result", "granted": false, "tag": "C" }));

        assert_eq!(*log.lock().unwrap(), vec!["camera:C"]);
    }

    #[test]
    fn reentrant_inbound_is_processed_after_current_message() {
        let (dispatcher, _host) = dispatcher();
        let log = Arc::new(Mutex::new(Vec::new()));

        let weak: Weak<Dispatcher> = Arc::downgrade(&dispatcher);
        let inner_log = Arc::clone(&log);
        dispatcher
            .subscribe(TopicFilter::Any, move |m| {
                let tag = m.fields["tag"].as_str().unwrap_or("-").to_owned();
                inner_log.lock().unwrap().push(format!("start:{tag}"));
                if tag == "A" {
                    if let Some(d) = weak.upgrade() {
                        d.on_inbound_value(json!({ "name": "x", "tag": "B" }));
                    }
                }
                inner_log.lock().unwrap().push(format!("end:{tag}"));
            })
            .unwrap();

        dispatcher.on_inbound_value(json!({ "name": "x", "tag": "A" }));
        assert_eq!(
            *log.lock().unwrap(),
            vec!["start:A", "end:A", "start:B", "end:B"]
        );
    }

    #[tokio::test]
    async fn claimed_message_is_not_fanned_out() {
        let (dispatcher, _host) = dispatcher();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        dispatcher
            .subscribe(Topic::Photos, move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        let handle = dispatcher
            .registry()
            .register("photo-library", ResponseMatcher::by_shape_key("photos"), Duration::from_secs(60))
            .unwrap();
        dispatcher.on_inbound_value(json!({ "success": true, "photos": [] }));
        assert!(handle.wait().await.is_ok());
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        dispatcher.on_inbound_value(json!({ "success": true, "photos": [] }));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn message_after_cancel_reaches_subscribers() {
        let (dispatcher, _host) = dispatcher();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        dispatcher
            .subscribe(Topic::Camera, move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        let handle = dispatcher
            .registry()
            .register("camera-blocked", ResponseMatcher::by_name("camera-permission-result"), Duration::from_secs(60))
            .unwrap();
        assert!(handle.cancel());

        dispatcher.on_inbound_value(json!({ "name": "camera-permission-result", "granted": true }));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let (dispatcher, _host) = dispatcher();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let id = dispatcher
            .subscribe(TopicFilter::Any, move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        dispatcher.on_inbound_value(json!({ "name": "a" }));
        assert!(dispatcher.unsubscribe(id));
        assert!(!dispatcher.unsubscribe(id));
        dispatcher.on_inbound_value(json!({ "name": "a" }));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn shutdown_cancels_pending_and_clears_subscriptions() {
        let (dispatcher, _host) = dispatcher();
        dispatcher.subscribe(TopicFilter::Any, |_| {}).unwrap();
        let handle = dispatcher
            .registry()
            .register("photo-library", ResponseMatcher::by_shape_key("photos"), Duration::from_secs(60))
            .unwrap();

        dispatcher.shutdown("page closed");
        assert!(handle.wait().await.unwrap_err().is_cancellation());
        assert_eq!(dispatcher.subscription_count(), 0);
        assert!(dispatcher.subscribe(TopicFilter::Any, |_| {}).is_err());
    }
}
