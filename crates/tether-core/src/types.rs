// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Tether bridge: the two envelope shapes, response
// matchers, and the canonical payloads handed back to callers.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{BridgeError, Result};

/// Field names that appear on the wire.
pub mod wire {
    pub const KIND: &str = "kind";
    pub const NAME: &str = "name";

    pub const URL: &str = "url";
    pub const REASON: &str = "reason";
    pub const TYPE: &str = "type";
    pub const TITLE: &str = "title";
    pub const MESSAGE: &str = "message";
    pub const SUGGESTION: &str = "suggestion";

    pub const SELECTION_LIMIT: &str = "selectionLimit";
    pub const FILTER: &str = "filter";

    pub const GRANTED: &str = "granted";
    pub const SUCCESS: &str = "success";
    pub const CANCELLED: &str = "cancelled";
    pub const PHOTOS: &str = "photos";

    /// Canonical photo payload key (iOS already uses it).
    pub const DATA: &str = "data";
    /// Android alias of [`DATA`].
    pub const DATA_URL: &str = "dataUrl";
    /// Canonical photo format key (Android already uses it).
    pub const FORMAT: &str = "format";
    /// iOS alias of [`FORMAT`]; same spelling as [`TYPE`].
    pub const FORMAT_ALIAS: &str = "type";
    /// Alias some hosts use instead of [`REASON`].
    pub const ERROR: &str = "error";
    pub const FILENAME: &str = "filename";
    pub const SIZE: &str = "size";

    /// `name` carried by a camera permission answer.
    pub const CAMERA_PERMISSION_RESULT: &str = "camera-permission-result";
    /// `name` carried by a host-originated error notification.
    pub const APPLICATION_ERROR: &str = "application-error";
}

/// Unique identifier for a pending correlated request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PendingId(pub Uuid);

impl PendingId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PendingId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PendingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a topic subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(pub Uuid);

impl SubscriptionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The native operations the host understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MessageKind {
    /// Close the hosting window.
    Close,
    /// Navigate the host to a URL (opens the portal).
    Open,
    /// Ask the host for camera access; answered by `camera-permission-result`.
    CameraBlocked,
    /// Present the photo picker; answered by a `photos`-bearing message.
    PhotoLibrary,
    /// Hand a document (typically a PDF) to a native viewer.
    Intent,
    /// Tell the host the web layer hit an error.
    ApplicationError,
}

impl MessageKind {
    /// Wire name used in the `kind` field.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Close => "close",
            Self::Open => "open",
            Self::CameraBlocked => "camera-blocked",
            Self::PhotoLibrary => "photo-library",
            Self::Intent => "intent",
            Self::ApplicationError => "application-error",
        }
    }

    /// Whether the host is expected to answer this kind.
    pub fn expects_response(&self) -> bool {
        matches!(self, Self::CameraBlocked | Self::PhotoLibrary)
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Envelope travelling from the web layer to the host.
///
/// Serializes as `{"kind": ..., <params flattened>}`. Fields are private so an
/// envelope cannot be altered once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundMessage {
    kind: String,
    #[serde(flatten)]
    params: Map<String, Value>,
}

impl OutboundMessage {
    /// Build an envelope. `kind` must be non-empty and `params` must not
    /// shadow the `kind` tag.
    pub fn new(kind: impl Into<String>, params: Map<String, Value>) -> Result<Self> {
        let kind = kind.into();
        if kind.trim().is_empty() {
            return Err(BridgeError::InvalidEnvelope("kind must not be empty".into()));
        }
        if params.contains_key(wire::KIND) {
            return Err(BridgeError::InvalidEnvelope(
                "params must not contain a `kind` key".into(),
            ));
        }
        Ok(Self { kind, params })
    }

    /// Envelope for a catalog operation.
    pub fn for_kind(kind: MessageKind, params: Map<String, Value>) -> Result<Self> {
        Self::new(kind.as_str(), params)
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn params(&self) -> &Map<String, Value> {
        &self.params
    }

    /// Wire form handed to the transport.
    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Envelope travelling from the host to the web layer.
///
/// Untyped on the wire: there is no universal discriminator. Some answers
/// carry a `name`, others are only recognisable by a payload key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InboundMessage {
    pub fields: Map<String, Value>,
}

impl InboundMessage {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Accept any JSON value; non-objects are wrapped under `value` so they
    /// stay inspectable instead of being dropped.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(fields) => Self { fields },
            other => {
                let mut fields = Map::new();
                fields.insert("value".into(), other);
                Self { fields }
            }
        }
    }

    /// The `name` field, when present and a string.
    pub fn name(&self) -> Option<&str> {
        self.fields.get(wire::NAME).and_then(Value::as_str)
    }
}

impl From<Map<String, Value>> for InboundMessage {
    fn from(fields: Map<String, Value>) -> Self {
        Self { fields }
    }
}

/// Predicate deciding whether an inbound message answers a pending request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResponseMatcher {
    /// `fields.name == expected`.
    ByName(String),
    /// `fields` contains this key, whatever its `name`.
    ByShapeKey(String),
}

impl ResponseMatcher {
    pub fn by_name(name: impl Into<String>) -> Self {
        Self::ByName(name.into())
    }

    pub fn by_shape_key(key: impl Into<String>) -> Self {
        Self::ByShapeKey(key.into())
    }

    pub fn matches(&self, fields: &Map<String, Value>) -> bool {
        match self {
            Self::ByName(expected) => {
                fields.get(wire::NAME).and_then(Value::as_str) == Some(expected.as_str())
            }
            Self::ByShapeKey(key) => fields.contains_key(key),
        }
    }
}

impl std::fmt::Display for ResponseMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ByName(name) => write!(f, "name={name}"),
            Self::ByShapeKey(key) => write!(f, "has:{key}"),
        }
    }
}

/// Which media the photo picker should offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhotoFilter {
    #[default]
    Images,
    Videos,
    All,
}

impl PhotoFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Images => "images",
            Self::Videos => "videos",
            Self::All => "all",
        }
    }
}

/// One picked photo in canonical form, whichever platform produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Photo {
    /// Payload, usually a data URL or base64 string.
    pub data: String,
    /// Image format as reported by the host (e.g. `jpeg`).
    pub format: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

/// Outcome of a photo picker request that the host answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhotoSelection {
    /// The user picked zero or more photos.
    Picked(Vec<Photo>),
    /// The user dismissed the picker.
    Cancelled,
}

impl PhotoSelection {
    pub fn photos(&self) -> &[Photo] {
        match self {
            Self::Picked(photos) => photos,
            Self::Cancelled => &[],
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Parameters of an `intent` request (open a document in a native viewer).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentRequest {
    /// Intent type, e.g. `pdf`.
    #[serde(rename = "type")]
    pub intent_type: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl IntentRequest {
    pub fn pdf(url: impl Into<String>) -> Self {
        Self {
            intent_type: "pdf".into(),
            url: url.into(),
            title: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}
