//! # eventhub
//!
//! **eventhub** is a small in-process event hub for tokio applications.
//!
//! Components publish typed events; the hub delivers them, in arrival order, to
//! every listener registered for the event's exact type. Publishing never waits
//! for delivery: it appends to a queue that one dispatcher task drains.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │  producer 1  │   │  producer 2  │   │  producer N  │
//!     │ (any thread) │   │ (any thread) │   │ (any thread) │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            │ publish(ev)      │ publish(ev)      │ publish(ev)
//!            ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  EventHub (facade)                                                │
//! │  - ObservableQueue (global FIFO, add/remove notifications)        │
//! │  - ListenerSet (frozen at build time, registration order)         │
//! │  - Dispatcher task (exactly one per hub)                          │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                                   ▼ wake
//!                       ┌────────────────────────┐
//!                       │       Dispatcher       │
//!                       │  one event at a time   │
//!                       └───┬────────────────┬───┘
//!                           ▼                ▼
//!                     listener 1  ──►  listener 2  ──► ...   (same event type,
//!                     handle()         handle()               strictly sequential)
//!                     on_complete()    on_error()
//! ```
//!
//! ### Guarantees
//! - **Global FIFO**: events are dispatched in the order they entered the queue.
//! - **Single flight**: at most one dispatch cycle runs at any instant.
//! - **Ordered fan-out**: listeners of one event run in registration order, one after another.
//! - **Exact-type routing**: a listener only sees events of its declared [`EventType`].
//! - **Fault isolation**: errors, panics and timeouts go to the listener's own
//!   [`Listener::on_error`]; the hub keeps running.
//!
//! ## Features
//! | Area              | Description                                                   | Key types / traits                          |
//! |-------------------|---------------------------------------------------------------|---------------------------------------------|
//! | **Hub**           | Publish, observe, shut down.                                  | [`EventHub`], [`DispatchState`]             |
//! | **Registration**  | Assemble and freeze the listener set.                         | [`HubBuilder`]                              |
//! | **Listeners**     | React to one event type; closures or custom types.            | [`Listener`], [`ListenerFn`], [`ListenerRef`] |
//! | **Events**        | Any `Send + Sync + 'static` value, routed by type.            | [`Event`], [`EventType`], [`Envelope`]      |
//! | **Queue**         | Observable FIFO between producers and the dispatcher.        | [`ObservableQueue`], [`QueueChange`]        |
//! | **Errors**        | Typed errors for the hub and for listener faults.             | [`HubError`], [`ListenerError`]             |
//! | **Configuration** | Grace period, drain policy, handler timeout.                  | [`HubConfig`], [`DrainPolicy`]              |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in `LogListener` _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use tokio_util::sync::CancellationToken;
//! use eventhub::{Envelope, EventHub, EventType, HubConfig, Listener, ListenerError, ListenerFn, ListenerRef};
//!
//! #[derive(Debug)]
//! struct UserCreated { name: String }
//!
//! struct Welcome;
//!
//! #[async_trait]
//! impl Listener for Welcome {
//!     fn event_type(&self) -> EventType { EventType::of::<UserCreated>() }
//!
//!     async fn handle(&self, env: &Envelope, _ctx: CancellationToken) -> Result<(), ListenerError> {
//!         let user = env.downcast_ref::<UserCreated>().ok_or_else(|| ListenerError::fail("bad payload"))?;
//!         println!("welcome, {}", user.name);
//!         Ok(())
//!     }
//!
//!     fn on_error(&self, _env: &Envelope, err: &ListenerError) {
//!         eprintln!("welcome failed: {err}");
//!     }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let audit: ListenerRef = ListenerFn::arc("audit", |u: Arc<UserCreated>, _ctx: CancellationToken| async move {
//!         println!("audit: {:?}", u);
//!         Ok::<_, ListenerError>(())
//!     });
//!
//!     let hub = EventHub::builder()
//!         .with_config(HubConfig::default())
//!         .with_listener(Arc::new(Welcome))
//!         .with_listener(audit)
//!         .build()?;
//!
//!     hub.publish(UserCreated { name: "ada".into() })?;
//!
//!     hub.wait_idle().await;
//!     hub.shutdown().await?;
//!     Ok(())
//! }
//! ```
mod core;
mod error;
mod events;
mod listeners;

// ---- Public re-exports ----

pub use crate::core::{DispatchState, DrainPolicy, EventHub, HubBuilder, HubConfig};
pub use error::{HubError, ListenerError};
pub use events::{Envelope, Event, EventType, ObservableQueue, QueueChange, QueueClosed};
pub use listeners::{Listener, ListenerFn, ListenerRef, ListenerSet};

// Optional: expose a simple built-in logger listener (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use listeners::LogListener;
