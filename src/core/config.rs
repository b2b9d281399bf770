//! # Hub configuration.
//!
//! Provides [`HubConfig`] centralized settings for one hub instance, passed to
//! [`HubBuilder::new`](crate::HubBuilder::new) or [`EventHub::new`](crate::EventHub::new).
//!
//! ## Sentinel values
//! - `handler_timeout = 0s` → no per-handler deadline (a stuck listener stalls the hub)
//! - `grace = 0s` → `shutdown` does not wait; the dispatcher is aborted unless already stopped

use std::time::Duration;

/// What `shutdown` does with events that are still queued.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DrainPolicy {
    /// Deliver everything already queued, then stop.
    #[default]
    Drain,
    /// Cancel the in-flight handler and discard everything still queued.
    Abort,
}

/// Configuration for one hub.
///
/// ## Field semantics
/// - `grace`: Maximum wait for the dispatcher to stop during `shutdown`
/// - `drain`: Whether `shutdown` delivers or discards queued events
/// - `handler_timeout`: Deadline for a single `Listener::handle` call (`0s` = none)
/// - `notify_capacity`: Ring size of the queue-change broadcast (min 1; clamped)
///
/// ## Notes
/// All fields are public for flexibility. Prefer using helper accessors to avoid
/// sprinkling sentinel checks (`0`) across the codebase.
#[derive(Clone, Debug)]
pub struct HubConfig {
    /// Maximum time `shutdown` waits for the dispatcher.
    ///
    /// If exceeded, the dispatcher is aborted, remaining events are discarded and
    /// `HubError::GraceExceeded` is returned.
    pub grace: Duration,

    /// Shutdown policy for queued events.
    pub drain: DrainPolicy,

    /// Per-handler deadline.
    ///
    /// - `Duration::ZERO` = no deadline
    /// - `> 0` = a `handle` call running longer is cancelled and reported to
    ///   `on_error` as `ListenerError::Timeout`
    pub handler_timeout: Duration,

    /// Capacity of the queue-change broadcast channel.
    ///
    /// Observers lagging behind more than `notify_capacity` changes skip older ones;
    /// the queue itself is never affected.
    pub notify_capacity: usize,
}

impl HubConfig {
    /// Returns the per-handler deadline as an `Option`.
    ///
    /// - `None` → no deadline
    /// - `Some(d)` → deadline applied to every `handle` call
    #[inline]
    pub fn handler_timeout(&self) -> Option<Duration> {
        if self.handler_timeout == Duration::ZERO {
            None
        } else {
            Some(self.handler_timeout)
        }
    }

    /// Returns the notification capacity clamped to a minimum of 1.
    #[inline]
    pub fn notify_capacity_clamped(&self) -> usize {
        self.notify_capacity.max(1)
    }
}

impl Default for HubConfig {
    /// Default configuration:
    ///
    /// - `grace = 30s`
    /// - `drain = DrainPolicy::Drain`
    /// - `handler_timeout = 0s` (no deadline)
    /// - `notify_capacity = 1024`
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(30),
            drain: DrainPolicy::Drain,
            handler_timeout: Duration::ZERO,
            notify_capacity: 1024,
        }
    }
}
