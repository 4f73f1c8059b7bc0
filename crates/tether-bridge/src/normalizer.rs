// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Platform normalizer.
//
// iOS and Android hosts answer the same request with different key names.
// Everything downstream of the dispatcher sees one canonical shape:
//
//   photo entry   dataUrl -> data      (Android)
//                 type    -> format    (iOS)
//   photo answer  error   -> reason      (top level)
//
// The canonical key wins when both spellings are present. A canonical key is
// never invented: if neither spelling exists it stays absent. Aliases are only
// collapsed inside the family that owns them, and keys we do not know pass
// through untouched.

use serde_json::{Map, Value};
use tether_core::error::{BridgeError, Result};
use tether_core::types::{InboundMessage, Photo, PhotoSelection, wire};
use tracing::debug;

/// An inbound message after alias collapsing and classification.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedMessage {
    /// Canonical fields. Matchers run against these.
    pub fields: Map<String, Value>,
    /// What the message turned out to be.
    pub event: HostEvent,
}

impl NormalizedMessage {
    pub fn topic(&self) -> Topic {
        self.event.topic()
    }

    pub fn name(&self) -> Option<&str> {
        self.fields.get(wire::NAME).and_then(Value::as_str)
    }
}

/// Discriminated view of an inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    /// `{name: "camera-permission-result", granted: bool}`
    CameraPermission { granted: bool },
    /// Anything carrying a well-formed `photos` array.
    PhotoLibrary(PhotoLibraryResponse),
    /// `{name: "application-error", message?}`
    ApplicationError { message: Option<String> },
    /// A `name` we have no typed view for (or a known name with a broken body).
    Named(String),
    /// Neither a `name` nor a recognised payload key.
    Unrecognized,
}

impl HostEvent {
    pub fn topic(&self) -> Topic {
        match self {
            Self::CameraPermission { .. } => Topic::Camera,
            Self::PhotoLibrary(_) => Topic::Photos,
            Self::ApplicationError { .. } => Topic::ApplicationError,
            Self::Named(name) => Topic::Named(name.clone()),
            Self::Unrecognized => Topic::Unrecognized,
        }
    }
}

/// Logical grouping key for subscriber fan-out.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Topic {
    Camera,
    Photos,
    ApplicationError,
    Named(String),
    Unrecognized,
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Camera => f.write_str("camera"),
            Self::Photos => f.write_str("photos"),
            Self::ApplicationError => f.write_str("application-error"),
            Self::Named(name) => write!(f, "named:{name}"),
            Self::Unrecognized => f.write_str("unrecognized"),
        }
    }
}

/// Photo picker answer in canonical form, before tri-state validation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhotoLibraryResponse {
    pub success: Option<bool>,
    pub cancelled: Option<bool>,
    pub reason: Option<String>,
    pub photos: Vec<PhotoEntry>,
}

/// One photo entry with canonical keys; either may still be missing if the
/// host sent neither spelling.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhotoEntry {
    pub data: Option<String>,
    pub format: Option<String>,
    pub filename: Option<String>,
    pub size: Option<u64>,
}

impl PhotoEntry {
    /// Read an entry leniently. Optional fields in a form we cannot use are
    /// dropped rather than failing the whole answer.
    fn from_fields(entry: &Map<String, Value>) -> Self {
        let text = |key: &str| entry.get(key).and_then(Value::as_str).map(str::to_owned);
        Self {
            data: text(wire::DATA),
            format: text(wire::FORMAT),
            filename: text(wire::FILENAME),
            size: entry.get(wire::SIZE).and_then(byte_count),
        }
    }
}

/// Non-negative integral sizes, including `1024.0` from hosts that bridge
/// every number as a double.
fn byte_count(value: &Value) -> Option<u64> {
    if let Some(size) = value.as_u64() {
        return Some(size);
    }
    let size = value.as_f64()?;
    (size >= 0.0 && size.fract() == 0.0 && size <= u64::MAX as f64).then_some(size as u64)
}

impl PhotoLibraryResponse {
    /// Apply the picker's tri-state rules:
    ///
    /// 1. `cancelled == true` is a cancellation, whatever `success` says.
    /// 2. `success == false` is a host failure carrying `reason`.
    /// 3. Otherwise every entry must have `data` and `format`.
    pub fn into_selection(self) -> Result<PhotoSelection> {
        if self.cancelled == Some(true) {
            return Ok(PhotoSelection::Cancelled);
        }
        if self.success == Some(false) {
            return Err(BridgeError::HostReportedFailure {
                reason: self.reason,
            });
        }

        let mut photos = Vec::with_capacity(self.photos.len());
        for (index, entry) in self.photos.into_iter().enumerate() {
            let (Some(data), Some(format)) = (entry.data, entry.format) else {
                return Err(BridgeError::UnrecognizedResponseShape(format!(
                    "photo #{index} has no data/dataUrl or format/type"
                )));
            };
            photos.push(Photo {
                data,
                format,
                filename: entry.filename,
                size: entry.size,
            });
        }
        Ok(PhotoSelection::Picked(photos))
    }
}

/// Collapse aliases and classify. Never fails.
pub fn normalize(raw: InboundMessage) -> NormalizedMessage {
    let mut fields = raw.fields;

    if let Some(Value::Array(photos)) = fields.get_mut(wire::PHOTOS) {
        for entry in photos.iter_mut() {
            if let Value::Object(entry) = entry {
                collapse_alias(entry, wire::DATA, wire::DATA_URL);
                collapse_alias(entry, wire::FORMAT, wire::FORMAT_ALIAS);
            }
        }
    }

    let event = classify(&fields);
    if matches!(event, HostEvent::PhotoLibrary(_)) {
        collapse_alias(&mut fields, wire::REASON, wire::ERROR);
    }
    NormalizedMessage { fields, event }
}

/// Move `alias` to `canonical` unless `canonical` is already present.
fn collapse_alias(fields: &mut Map<String, Value>, canonical: &str, alias: &str) {
    if fields.contains_key(canonical) {
        return;
    }
    if let Some(value) = fields.remove(alias) {
        fields.insert(canonical.to_owned(), value);
    }
}

fn classify(fields: &Map<String, Value>) -> HostEvent {
    let name = fields.get(wire::NAME).and_then(Value::as_str);

    if name == Some(wire::CAMERA_PERMISSION_RESULT) {
        return match fields.get(wire::GRANTED).and_then(Value::as_bool) {
            Some(granted) => HostEvent::CameraPermission { granted },
            None => HostEvent::Named(wire::CAMERA_PERMISSION_RESULT.to_owned()),
        };
    }

    if let Some(photos) = fields.get(wire::PHOTOS) {
        match photo_library_response(fields, photos) {
            Some(response) => return HostEvent::PhotoLibrary(response),
            None => debug!("`photos` present but not a list of objects"),
        }
    }

    match name {
        Some(wire::APPLICATION_ERROR) => HostEvent::ApplicationError {
            message: fields
                .get(wire::MESSAGE)
                .or_else(|| fields.get(wire::REASON))
                .or_else(|| fields.get(wire::ERROR))
                .and_then(Value::as_str)
                .map(str::to_owned),
        },
        Some(other) => HostEvent::Named(other.to_owned()),
        None => HostEvent::Unrecognized,
    }
}

fn photo_library_response(fields: &Map<String, Value>, photos: &Value) -> Option<PhotoLibraryResponse> {
    let photos = match photos {
        Value::Null => Vec::new(),
        Value::Array(entries) => entries
            .iter()
            .map(|entry| entry.as_object().map(PhotoEntry::from_fields))
            .collect::<Option<Vec<_>>>()?,
        _ => return None,
    };
    Some(PhotoLibraryResponse {
        success: fields.get(wire::SUCCESS).and_then(Value::as_bool),
        cancelled: fields.get(wire::CANCELLED).and_then(Value::as_bool),
        reason: fields
            .get(wire::REASON)
            .or_else(|| fields.get(wire::ERROR))
            .and_then(opaque_reason),
        photos,
    })
}

/// Host reasons are opaque: strings as-is, anything else as its JSON text.
fn opaque_reason(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(reason) => Some(reason.clone()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn norm(value: Value) -> NormalizedMessage {
        normalize(InboundMessage::from_value(value))
    }

    fn selection(value: Value) -> Result<PhotoSelection> {
        match norm(value).event {
            HostEvent::PhotoLibrary(response) => response.into_selection(),
            other => panic!("expected photo library event, got {other:?}"),
        }
    }

    #[test]
    fn ios_and_android_photos_normalize_identically() {
        let ios = selection(json!({
            "success": true, "cancelled": false,
            "photos": [{ "data": "x", "type": "jpeg" }]
        }))
        .unwrap();
        let android = selection(json!({
            "success": true, "cancelled": false,
            "photos": [{ "dataUrl": "x", "format": "jpeg" }]
        }))
        .unwrap();
        assert_eq!(ios, android);
        assert_eq!(ios.photos()[0].data, "x");
        assert_eq!(ios.photos()[0].format, "jpeg");
    }

    #[test]
    fn canonical_key_wins_over_alias() {
        let msg = norm(json!({ "photos": [{ "data": "canon", "dataUrl": "alias", "format": "png" }] }));
        let entry = &msg.fields["photos"][0];
        assert_eq!(entry["data"], "canon");
        assert_eq!(entry["dataUrl"], "alias");
    }

    #[test]
    fn missing_aliases_stay_absent() {
        let msg = norm(json!({ "photos": [{ "filename": "a.jpg" }] }));
        let entry = msg.fields["photos"][0].as_object().unwrap();
        assert!(!entry.contains_key("data"));
        assert!(!entry.contains_key("format"));
        let HostEvent::PhotoLibrary(response) = msg.event else {
            panic!("expected photo library event");
        };
        assert!(matches!(
            response.into_selection(),
            Err(BridgeError::UnrecognizedResponseShape(_))
        ));
    }

    #[test]
    fn cancelled_beats_success_false() {
        let result = selection(json!({ "success": false, "cancelled": true, "photos": [] }));
        assert_eq!(result.unwrap(), PhotoSelection::Cancelled);
    }

    #[test]
    fn success_false_carries_reason_alias() {
        let err = selection(json!({ "success": false, "cancelled": false, "photos": [], "error": "no access" }))
            .unwrap_err();
        match err {
            BridgeError::HostReportedFailure { reason } => {
                assert_eq!(reason.as_deref(), Some("no access"))
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn camera_result_is_discriminated_by_name() {
        let msg = norm(json!({ "name": "camera-permission-result", "granted": true }));
        assert_eq!(msg.event, HostEvent::CameraPermission { granted: true });
        assert_eq!(msg.topic(), Topic::Camera);
    }

    #[test]
    fn camera_result_without_granted_is_only_named() {
        let msg = norm(json!({ "name": "camera-permission-result" }));
        assert_eq!(msg.event, HostEvent::Named("camera-permission-result".into()));
    }

    #[test]
    fn application_error_reads_message() {
        let msg = norm(json!({ "name": "application-error", "message": "viewer crashed" }));
        assert_eq!(
            msg.event,
            HostEvent::ApplicationError { message: Some("viewer crashed".into()) }
        );
        assert_eq!(msg.topic().to_string(), "application-error");
    }

    #[test]
    fn unknown_shapes_pass_through_verbatim() {
        let msg = norm(json!({ "foo": 1, "bar": [true] }));
        assert_eq!(msg.event, HostEvent::Unrecognized);
        assert_eq!(msg.fields["foo"], 1);
        assert_eq!(msg.fields["bar"], json!([true]));
    }

    #[test]
    fn malformed_photos_fall_back_to_name() {
        let msg = norm(json!({ "name": "picker", "photos": "nope" }));
        assert_eq!(msg.event, HostEvent::Named("picker".into()));
        // the raw key is still there for shape matchers and inspection
        assert_eq!(msg.fields["photos"], "nope");
    }

    #[test]
    fn loosely_typed_optional_fields_do_not_reject_the_answer() {
        let result = selection(json!({
            "success": true, "cancelled": false,
            "photos": [
                { "data": "x", "type": "jpeg", "size": 1024.0, "filename": 7 },
                { "dataUrl": "y", "format": "png", "size": -3 }
            ]
        }))
        .unwrap();
        let photos = result.photos();
        assert_eq!(photos[0].data, "x");
        assert_eq!(photos[0].format, "jpeg");
        assert_eq!(photos[0].size, Some(1024));
        assert_eq!(photos[0].filename, None);
        assert_eq!(photos[1].data, "y");
        assert_eq!(photos[1].size, None);
    }

    #[test]
    fn non_object_photo_entry_is_not_a_photo_answer() {
        let msg = norm(json!({ "photos": ["x"] }));
        assert_eq!(msg.event, HostEvent::Unrecognized);
    }

    #[test]
    fn error_key_is_left_alone_outside_photo_answers() {
        let msg = norm(json!({ "name": "status", "error": "disk" }));
        assert_eq!(msg.event, HostEvent::Named("status".into()));
        assert_eq!(msg.fields["error"], "disk");
        assert!(!msg.fields.contains_key("reason"));

        let msg = norm(json!({ "error": "disk" }));
        assert_eq!(msg.event, HostEvent::Unrecognized);
        assert_eq!(msg.fields["error"], "disk");
    }

    #[test]
    fn photo_answer_error_collapses_to_reason() {
        let msg = norm(json!({ "success": false, "photos": [], "error": "no access" }));
        assert_eq!(msg.fields["reason"], "no access");
        assert!(!msg.fields.contains_key("error"));
    }

    #[test]
    fn structured_host_reason_is_kept_as_json_text() {
        let err = selection(json!({ "success": false, "photos": [], "reason": { "code": 3 } }))
            .unwrap_err();
        match err {
            BridgeError::HostReportedFailure { reason } => {
                assert_eq!(reason.as_deref(), Some(r#"{"code":3}"#))
            }
            other => panic!("unexpected {other:?}"),
        }

        let err = selection(json!({ "success": false, "photos": [], "error": 403 })).unwrap_err();
        match err {
            BridgeError::HostReportedFailure { reason } => assert_eq!(reason.as_deref(), Some("403")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn null_photos_is_an_empty_selection() {
        let result = selection(json!({ "success": true, "photos": null })).unwrap();
        assert_eq!(result, PhotoSelection::Picked(Vec::new()));
    }
}
