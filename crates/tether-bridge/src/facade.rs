// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bridge facade: typed operations over the dispatcher and registry.
//
// Fire-and-forget calls (`close`, `open`, `show_intent`, `show_error`) return
// as soon as the envelope is handed to the transport. The host never confirms
// them; if the visible effect fails, the only signal is an `application-error`
// message the host may choose to send back.
//
// Correlated calls (`request_camera_permission`, `pick_photos`) register a
// matcher, send, and wait. The host embeds no request id, so two concurrent
// requests of the same family are told apart only by arrival order: the first
// matching answer goes to the earliest registration. Callers that cannot
// tolerate that should not overlap same-family requests.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use tether_core::config::BridgeConfig;
use tether_core::error::{BridgeError, Result};
use tether_core::human_errors::humanize_error;
use tether_core::types::{
    IntentRequest, MessageKind, OutboundMessage, PhotoFilter, PhotoSelection, ResponseMatcher,
    SubscriptionId, wire,
};
use tracing::{debug, info, instrument};

use crate::dispatcher::{Dispatcher, TopicFilter};
use crate::normalizer::{HostEvent, NormalizedMessage, Topic};
use crate::registry::PendingHandle;
use crate::traits::Transport;

/// Public bridge API. Cheap to clone; clones share one dispatcher.
#[derive(Clone)]
pub struct Bridge {
    dispatcher: Arc<Dispatcher>,
    config: Arc<BridgeConfig>,
}

impl Bridge {
    pub fn new(transport: Arc<dyn Transport>, config: BridgeConfig) -> Result<Self> {
        config.validate()?;
        info!(transport = transport.name(), "bridge starting");
        Ok(Self {
            dispatcher: Arc::new(Dispatcher::new(transport)),
            config: Arc::new(config),
        })
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Where the transport delivers host messages.
    pub fn on_inbound(&self, raw: Value) {
        self.dispatcher.on_inbound_value(raw);
    }

    // -- Fire-and-forget -----------------------------------------------------

    /// Ask the host to close the web view.
    pub fn close(&self) -> Result<()> {
        self.fire(MessageKind::Close, Map::new())
    }

    /// Ask the host to navigate to `url`.
    pub fn open(&self, url: &str) -> Result<()> {
        require_non_empty(wire::URL, url)?;
        let mut params = Map::new();
        params.insert(wire::URL.into(), url.into());
        self.fire(MessageKind::Open, params)
    }

    /// Ask the host to open a document in a native viewer.
    pub fn show_intent(&self, intent: &IntentRequest) -> Result<()> {
        require_non_empty(wire::TYPE, &intent.intent_type)?;
        require_non_empty(wire::URL, &intent.url)?;
        let params = match serde_json::to_value(intent)? {
            Value::Object(params) => params,
            _ => return Err(BridgeError::InvalidEnvelope("intent must serialize to an object".into())),
        };
        self.fire(MessageKind::Intent, params)
    }

    /// Tell the host the web layer hit an error, optionally with a message.
    pub fn show_error(&self, message: Option<&str>) -> Result<()> {
        let mut params = Map::new();
        if let Some(message) = message {
            params.insert(wire::MESSAGE.into(), message.into());
        }
        self.fire(MessageKind::ApplicationError, params)
    }

    /// `show_error` with the plain-language text for `err`.
    pub fn report_error(&self, err: &BridgeError) -> Result<()> {
        let human = humanize_error(err);
        let mut params = Map::new();
        params.insert(wire::MESSAGE.into(), human.message.into());
        params.insert(wire::SUGGESTION.into(), human.suggestion.into());
        self.fire(MessageKind::ApplicationError, params)
    }

    fn fire(&self, kind: MessageKind, params: Map<String, Value>) -> Result<()> {
        let envelope = OutboundMessage::for_kind(kind, params)?;
        self.dispatcher.send(&envelope)
    }

    // -- Correlated ----------------------------------------------------------

    /// Register `matcher`, then send `envelope`. Registration comes first so a
    /// transport that answers synchronously cannot outrun it.
    pub fn request(
        &self,
        envelope: OutboundMessage,
        matcher: ResponseMatcher,
        timeout: Duration,
    ) -> Result<PendingHandle> {
        let handle = self
            .dispatcher
            .registry()
            .register(envelope.kind(), matcher, timeout)?;
        // On failure the handle is dropped, which cancels the registration.
        self.dispatcher.send(&envelope)?;
        Ok(handle)
    }

    /// Ask the host for camera access. Resolves with the host's `granted`.
    #[instrument(skip(self))]
    pub async fn request_camera_permission(&self, reason: Option<&str>) -> Result<bool> {
        let mut params = Map::new();
        if let Some(reason) = reason {
            params.insert(wire::REASON.into(), reason.into());
        }
        let envelope = OutboundMessage::for_kind(MessageKind::CameraBlocked, params)?;
        let response = self
            .request(
                envelope,
                ResponseMatcher::by_name(wire::CAMERA_PERMISSION_RESULT),
                self.config.camera_permission_timeout(),
            )?
            .wait()
            .await?;

        match response.event {
            HostEvent::CameraPermission { granted } => {
                debug!(granted, "camera permission answered");
                Ok(granted)
            }
            _ => Err(BridgeError::UnrecognizedResponseShape(
                "camera-permission-result without a boolean `granted`".into(),
            )),
        }
    }

    /// Present the photo picker.
    ///
    /// `Ok(PhotoSelection::Cancelled)` when the user dismissed it (even if the
    /// host also said `success: false`), `Err(HostReportedFailure)` when the
    /// host failed, otherwise the canonical photos.
    #[instrument(skip(self))]
    pub async fn pick_photos(
        &self,
        selection_limit: u32,
        filter: PhotoFilter,
    ) -> Result<PhotoSelection> {
        if selection_limit == 0 {
            return Err(BridgeError::InvalidEnvelope(
                "selectionLimit must be at least 1".into(),
            ));
        }
        let mut params = Map::new();
        params.insert(wire::SELECTION_LIMIT.into(), selection_limit.into());
        params.insert(wire::FILTER.into(), filter.as_str().into());
        let envelope = OutboundMessage::for_kind(MessageKind::PhotoLibrary, params)?;

        let response = self
            .request(
                envelope,
                ResponseMatcher::by_shape_key(wire::PHOTOS),
                self.config.photo_library_timeout(),
            )?
            .wait()
            .await?;

        let selection = match response.event {
            HostEvent::PhotoLibrary(library) => library.into_selection()?,
            _ => {
                return Err(BridgeError::UnrecognizedResponseShape(
                    "`photos` is not a list of photo objects".into(),
                ));
            }
        };
        debug!(
            cancelled = selection.is_cancelled(),
            count = selection.photos().len(),
            "photo picker answered"
        );
        Ok(selection)
    }

    /// `pick_photos` with the configured defaults.
    pub async fn pick_photos_default(&self) -> Result<PhotoSelection> {
        self.pick_photos(
            self.config.default_selection_limit,
            self.config.default_photo_filter,
        )
        .await
    }

    // -- Publish / subscribe -------------------------------------------------

    /// Receive unclaimed host messages matching `filter`.
    pub fn subscribe<F>(&self, filter: impl Into<TopicFilter>, callback: F) -> Result<SubscriptionId>
    where
        F: Fn(&NormalizedMessage) + Send + Sync + 'static,
    {
        self.dispatcher.subscribe(filter, callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.dispatcher.unsubscribe(id)
    }

    /// Receive host-originated `application-error` notifications.
    pub fn on_application_error<F>(&self, callback: F) -> Result<SubscriptionId>
    where
        F: Fn(Option<&str>) + Send + Sync + 'static,
    {
        self.dispatcher.subscribe(Topic::ApplicationError, move |normalized| {
            if let HostEvent::ApplicationError { message } = &normalized.event {
                callback(message.as_deref());
            }
        })
    }

    // -- Lifecycle -----------------------------------------------------------

    pub fn pending_count(&self) -> usize {
        self.dispatcher.registry().pending_count()
    }

    /// Cancel everything in flight and stop accepting traffic.
    pub fn shutdown(&self) {
        self.dispatcher.shutdown("bridge shut down");
    }
}

fn require_non_empty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(BridgeError::InvalidEnvelope(format!("`{field}` must not be empty")));
    }
    Ok(())
}
