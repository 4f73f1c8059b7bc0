// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>

//! Tether: the protocol layer between sandboxed web content and its native
//! host.
//!
//! Messages leave through [`Dispatcher::send`] and come back, uncorrelated,
//! through [`Dispatcher::on_inbound`]. Each inbound message is normalized
//! (platform aliases collapsed, discriminated into a [`HostEvent`]), offered
//! to the pending requests in registration order, and only if nobody claims it
//! fanned out to topic subscribers.
//!
//! [`Bridge`] is the typed surface most callers want.

pub mod channel;
pub mod dispatcher;
pub mod facade;
pub mod normalizer;
pub mod registry;
pub mod traits;

pub use channel::ChannelTransport;
pub use dispatcher::{Dispatcher, TopicFilter};
pub use facade::Bridge;
pub use normalizer::{HostEvent, NormalizedMessage, PhotoEntry, PhotoLibraryResponse, Topic, normalize};
pub use registry::{CorrelationRegistry, PendingHandle, PendingInfo, Resolution};
pub use traits::Transport;
