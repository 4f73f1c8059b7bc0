// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable error messages.
//
// Every bridge error is mapped to plain English with a clear suggestion. The
// result is what the web layer shows to the user and what it forwards to the
// host in an `application-error` envelope.

use serde::Serialize;

use crate::error::BridgeError;

/// Severity of an error from the user's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Severity {
    /// The host was slow or briefly unreachable; trying again may work.
    Transient,
    /// The user must do something (grant a permission, pick again).
    ActionRequired,
    /// Retrying will not help (bridge shut down, host speaks another dialect).
    Permanent,
}

/// A human-readable error with plain English message and actionable suggestion.
#[derive(Debug, Clone, Serialize)]
pub struct HumanError {
    /// Plain English summary (shown as a heading).
    pub message: String,
    /// What the user should try (shown as body text).
    pub suggestion: String,
    /// Whether the caller may simply repeat the request.
    pub retriable: bool,
    /// Severity level (drives icon/colour in UI).
    pub severity: Severity,
}

/// Convert a `BridgeError` into a `HumanError`.
pub fn humanize_error(err: &BridgeError) -> HumanError {
    match err {
        BridgeError::TransportUnavailable => HumanError {
            message: "The app is no longer connected to this page.".into(),
            suggestion: "Close this screen and open it again.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },

        BridgeError::Timeout { kind, .. } => humanize_timeout(kind),

        BridgeError::Cancelled(_) => HumanError {
            message: "The request was stopped.".into(),
            suggestion: "Nothing went wrong. Start again whenever you're ready.".into(),
            retriable: true,
            severity: Severity::ActionRequired,
        },

        BridgeError::HostReportedFailure { reason } => HumanError {
            message: "The app couldn't finish that for you.".into(),
            suggestion: match reason {
                Some(reason) => format!("Try again in a moment. (Detail: {reason})"),
                None => "Try again in a moment.".into(),
            },
            retriable: true,
            severity: Severity::Transient,
        },

        BridgeError::UnrecognizedResponseShape(_) => HumanError {
            message: "The app answered in a way this page doesn't understand.".into(),
            suggestion: "Updating the app usually fixes this.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },

        BridgeError::InvalidEnvelope(_) | BridgeError::Serialization(_) => HumanError {
            message: "This page sent the app a request it couldn't read.".into(),
            suggestion: "Try again. If this keeps happening, please report it.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },

        BridgeError::Config(_) => HumanError {
            message: "The page's settings are invalid.".into(),
            suggestion: "Check the bridge configuration file.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },

        BridgeError::Io(io_err) => {
            if io_err.kind() == std::io::ErrorKind::NotFound {
                HumanError {
                    message: "A settings file couldn't be found.".into(),
                    suggestion: "It may have been moved or deleted. Check the path and try again."
                        .into(),
                    retriable: false,
                    severity: Severity::ActionRequired,
                }
            } else {
                HumanError {
                    message: "There was a problem reading a file.".into(),
                    suggestion: "Try again. If this keeps happening, check file permissions."
                        .into(),
                    retriable: true,
                    severity: Severity::Transient,
                }
            }
        }
    }
}

/// Timeouts read differently depending on what we were waiting for.
fn humanize_timeout(kind: &str) -> HumanError {
    match kind {
        "camera-blocked" => HumanError {
            message: "We didn't hear back about camera access.".into(),
            suggestion: "Check whether a permission prompt is waiting, then try again.".into(),
            retriable: true,
            severity: Severity::ActionRequired,
        },
        "photo-library" => HumanError {
            message: "The photo picker didn't respond.".into(),
            suggestion: "Close the picker if it's still open, then try again.".into(),
            retriable: true,
            severity: Severity::Transient,
        },
        other => HumanError {
            message: "The app didn't respond in time.".into(),
            suggestion: format!("Try again. (Waiting for: {other})"),
            retriable: true,
            severity: Severity::Transient,
        },
    }
}
