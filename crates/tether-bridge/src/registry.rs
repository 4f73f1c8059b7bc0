// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Correlation registry.
//
// Owns every in-flight correlated request from registration until it reaches
// exactly one terminal state:
//
//   Registered -> Resolved | Rejected | Expired | Cancelled
//
// Whoever removes the entry from the list is the only one allowed to complete
// it, which makes the four outcomes mutually exclusive without extra flags.
//
// Inbound messages are offered to entries in registration order and the
// first matcher that accepts wins. The scan is linear in the number of
// pending requests; a bridge rarely has more than a handful in flight, so no
// index is kept.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tether_core::error::{BridgeError, Result};
use tether_core::types::{PendingId, ResponseMatcher};
use tokio::sync::oneshot;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use crate::normalizer::NormalizedMessage;

type Completion = oneshot::Sender<Result<NormalizedMessage>>;

struct PendingRequest {
    id: PendingId,
    /// Outbound kind this request answers; used in timeout errors and logs.
    kind: String,
    matcher: ResponseMatcher,
    created_at: DateTime<Utc>,
    timeout: Duration,
    completion: Completion,
    timer: Option<AbortHandle>,
}

impl PendingRequest {
    fn finish(self, outcome: Result<NormalizedMessage>) {
        if let Some(timer) = &self.timer {
            timer.abort();
        }
        // The receiver may already be gone (caller dropped the handle).
        let _ = self.completion.send(outcome);
    }

    fn age_ms(&self) -> i64 {
        (Utc::now() - self.created_at).num_milliseconds()
    }
}

#[derive(Default)]
struct RegistryState {
    /// Registration order is matching priority.
    pending: Vec<PendingRequest>,
    closed: bool,
}

impl RegistryState {
    fn take(&mut self, id: PendingId) -> Option<PendingRequest> {
        let pos = self.pending.iter().position(|p| p.id == id)?;
        Some(self.pending.remove(pos))
    }
}

/// Read-only snapshot of one pending request.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingInfo {
    pub id: PendingId,
    pub kind: String,
    pub matcher: ResponseMatcher,
    pub created_at: DateTime<Utc>,
    pub timeout: Duration,
}

/// Outcome of offering an inbound message to the registry.
#[derive(Debug)]
pub enum Resolution {
    /// A pending request took the message.
    Claimed(PendingId),
    /// Nobody matched; the message is handed back for fan-out.
    Unclaimed(NormalizedMessage),
}

impl Resolution {
    pub fn is_claimed(&self) -> bool {
        matches!(self, Self::Claimed(_))
    }
}

/// Shared handle to the set of pending requests.
#[derive(Clone, Default)]
pub struct CorrelationRegistry {
    state: Arc<Mutex<RegistryState>>,
}

impl CorrelationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a request and arm its timeout.
    ///
    /// Returns immediately; await [`PendingHandle::wait`] for the answer. The
    /// timer is a tokio task, so this must run inside a tokio runtime for the
    /// request to ever expire.
    pub fn register(
        &self,
        kind: &str,
        matcher: ResponseMatcher,
        timeout: Duration,
    ) -> Result<PendingHandle> {
        let (completion, rx) = oneshot::channel();
        let id = {
            let mut state = self.lock();
            if state.closed {
                return Err(BridgeError::TransportUnavailable);
            }
            let mut id = PendingId::new();
            while state.pending.iter().any(|p| p.id == id) {
                id = PendingId::new();
            }
            debug!(pending_id = %id, kind, %matcher, timeout_ms = timeout.as_millis() as u64, "registering pending request");
            state.pending.push(PendingRequest {
                id,
                kind: kind.to_owned(),
                matcher,
                created_at: Utc::now(),
                timeout,
                completion,
                timer: None,
            });
            id
        };

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let weak = Arc::downgrade(&self.state);
                let timer = runtime
                    .spawn(async move {
                        tokio::time::sleep(timeout).await;
                        if let Some(state) = weak.upgrade() {
                            CorrelationRegistry { state }.expire(id);
                        }
                    })
                    .abort_handle();
                let mut state = self.lock();
                match state.pending.iter_mut().find(|p| p.id == id) {
                    Some(entry) => entry.timer = Some(timer),
                    // Already finished (zero timeout, or resolved on another thread).
                    None => timer.abort(),
                }
            }
            Err(_) => {
                warn!(pending_id = %id, kind, "no tokio runtime; request will never time out");
            }
        }

        Ok(PendingHandle {
            id,
            rx,
            registry: Arc::downgrade(&self.state),
        })
    }

    /// Offer `message` to pending requests in registration order.
    ///
    /// The first live entry whose matcher accepts it is removed and completed.
    /// Entries whose caller has already gone away are pruned as they are met.
    pub fn resolve_matching(&self, message: NormalizedMessage) -> Resolution {
        let claimed = {
            let mut state = self.lock();
            state.pending.retain(|p| {
                let live = !p.completion.is_closed();
                if !live {
                    debug!(pending_id = %p.id, "pruning request whose caller went away");
                    if let Some(timer) = &p.timer {
                        timer.abort();
                    }
                }
                live
            });
            state
                .pending
                .iter()
                .position(|p| p.matcher.matches(&message.fields))
                .map(|pos| state.pending.remove(pos))
        };

        match claimed {
            Some(request) => {
                let id = request.id;
                debug!(pending_id = %id, kind = %request.kind, age_ms = request.age_ms(), "pending request resolved");
                request.finish(Ok(message));
                Resolution::Claimed(id)
            }
            None => Resolution::Unclaimed(message),
        }
    }

    /// Time a request out. Called by its own timer; a no-op if the request has
    /// already reached another terminal state.
    pub fn expire(&self, id: PendingId) -> bool {
        let Some(request) = self.lock().take(id) else {
            return false;
        };
        warn!(pending_id = %id, kind = %request.kind, age_ms = request.age_ms(), "pending request timed out");
        let err = BridgeError::Timeout {
            kind: request.kind.clone(),
            after: request.timeout,
        };
        request.finish(Err(err));
        true
    }

    /// Caller-initiated cancellation. Idempotent.
    pub fn cancel(&self, id: PendingId) -> bool {
        let Some(request) = self.lock().take(id) else {
            return false;
        };
        debug!(pending_id = %id, kind = %request.kind, "pending request cancelled");
        request.finish(Err(BridgeError::Cancelled("cancelled by caller".into())));
        true
    }

    /// Complete a request with a caller-supplied failure.
    pub fn reject(&self, id: PendingId, error: BridgeError) -> bool {
        let Some(request) = self.lock().take(id) else {
            return false;
        };
        debug!(pending_id = %id, kind = %request.kind, error = %error, "pending request rejected");
        request.finish(Err(error));
        true
    }

    /// Cancel every outstanding request. Returns how many were cancelled.
    pub fn cancel_all(&self, reason: &str) -> usize {
        let drained: Vec<PendingRequest> = self.lock().pending.drain(..).collect();
        let count = drained.len();
        if count > 0 {
            warn!(count, reason, "cancelling all pending requests");
        }
        for request in drained {
            request.finish(Err(BridgeError::Cancelled(reason.to_owned())));
        }
        count
    }

    /// Tear down: cancel everything and refuse further registrations.
    pub fn close(&self, reason: &str) -> usize {
        let already_closed = std::mem::replace(&mut self.lock().closed, true);
        if !already_closed {
            info!(reason, "correlation registry closed");
        }
        self.cancel_all(reason)
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn pending_count(&self) -> usize {
        self.lock().pending.len()
    }

    /// Snapshot of pending requests in matching order.
    pub fn pending(&self) -> Vec<PendingInfo> {
        self.lock()
            .pending
            .iter()
            .map(|p| PendingInfo {
                id: p.id,
                kind: p.kind.clone(),
                matcher: p.matcher.clone(),
                created_at: p.created_at,
                timeout: p.timeout,
            })
            .collect()
    }
}

/// Caller's side of a pending request.
///
/// Dropping the handle before it completes cancels the request, so a
/// `select!` branch that loses or an aborted task never leaves an orphan
/// matcher behind.
pub struct PendingHandle {
    id: PendingId,
    rx: oneshot::Receiver<Result<NormalizedMessage>>,
    registry: Weak<Mutex<RegistryState>>,
}

impl PendingHandle {
    pub fn id(&self) -> PendingId {
        self.id
    }

    /// Wait for the matching response, a timeout, or cancellation.
    pub async fn wait(mut self) -> Result<NormalizedMessage> {
        match (&mut self.rx).await {
            Ok(outcome) => outcome,
            Err(_) => Err(BridgeError::Cancelled("bridge dropped".into())),
        }
    }

    /// Cancel now. Returns false if the request had already finished.
    pub fn cancel(self) -> bool {
        self.registry()
            .map(|registry| registry.cancel(self.id))
            .unwrap_or(false)
    }

    fn registry(&self) -> Option<CorrelationRegistry> {
        self.registry
            .upgrade()
            .map(|state| CorrelationRegistry { state })
    }
}

impl Drop for PendingHandle {
    fn drop(&mut self) {
        if let Some(registry) = self.registry() {
            registry.cancel(self.id);
        }
    }
}

impl std::fmt::Debug for PendingHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingHandle").field("id", &self.id).finish()
    }
}
