//! # Listener trait.
//!
//! Provides [`Listener`], the extension point for reacting to published events.
//!
//! Each listener:
//! - **declares one event type** via [`Listener::event_type`] and only ever sees envelopes of it;
//! - is called from the hub's **single dispatcher task**, never concurrently with itself
//!   or with other listeners of the same hub;
//! - gets **fault isolation**: errors, panics and timeouts in `handle` are routed to
//!   [`Listener::on_error`] and never stop the dispatcher.
//!
//! ## Call sequence per event
//! ```text
//! handle(&env, ctx) ──► Ok(())  ──► on_complete(&env)
//!                   └─► Err(e)  ──► on_error(&env, &e)
//!                   └─► panic   ──► on_error(&env, &ListenerError::Panicked { .. })
//!                   └─► timeout ──► on_error(&env, &ListenerError::Timeout { .. })
//! ```
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use tokio_util::sync::CancellationToken;
//! use eventhub::{Envelope, EventType, Listener, ListenerError};
//!
//! struct OrderPlaced { total: u64 }
//!
//! struct Billing;
//!
//! #[async_trait]
//! impl Listener for Billing {
//!     fn event_type(&self) -> EventType { EventType::of::<OrderPlaced>() }
//!
//!     async fn handle(&self, env: &Envelope, _ctx: CancellationToken) -> Result<(), ListenerError> {
//!         let order = env.downcast_ref::<OrderPlaced>().ok_or_else(|| ListenerError::fail("bad payload"))?;
//!         if order.total == 0 {
//!             return Err(ListenerError::fail("empty order"));
//!         }
//!         Ok(())
//!     }
//!
//!     fn name(&self) -> &str { "billing" }
//! }
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::ListenerError;
use crate::events::{Envelope, EventType};

/// Shared handle to a listener.
///
/// The hub keeps clones of these; it never drops the listener's last reference on
/// its own terms and never mutates it.
pub type ListenerRef = Arc<dyn Listener>;

/// Reacts to events of exactly one type.
///
/// ### Implementation requirements
/// - Use async I/O; avoid blocking the executor. A `handle` that never finishes
///   stalls the whole hub unless a handler timeout is configured.
/// - Do not await [`EventHub::wait_idle`](crate::EventHub::wait_idle) on the hub
///   delivering to you: it cannot become idle while you run. Calling
///   [`EventHub::shutdown`](crate::EventHub::shutdown) from `handle` is fine; it
///   returns without waiting for the dispatcher.
/// - Check `ctx.is_cancelled()` in long operations and return
///   [`ListenerError::Canceled`] to honor shutdown.
/// - `on_complete`/`on_error` are synchronous and should be quick.
#[async_trait]
pub trait Listener: Send + Sync + 'static {
    /// The single event type this listener wants.
    fn event_type(&self) -> EventType;

    /// Processes one event. `ctx` is cancelled when the hub aborts.
    async fn handle(&self, event: &Envelope, ctx: CancellationToken) -> Result<(), ListenerError>;

    /// Called after `handle` returned `Ok(())` for `event`.
    fn on_complete(&self, _event: &Envelope) {}

    /// Called when `handle` failed, panicked or timed out for `event`.
    fn on_error(&self, _event: &Envelope, _error: &ListenerError) {}

    /// Returns the listener name used in logs.
    ///
    /// The default uses `type_name::<Self>()`, which can be verbose - override it when possible.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}
