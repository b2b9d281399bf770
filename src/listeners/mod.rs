//! # Listeners: what the hub delivers events to.
//!
//! This module provides the [`Listener`] trait, the closure adapter [`ListenerFn`]
//! and the frozen [`ListenerSet`] a hub routes with.
//!
//! ## Architecture
//! ```text
//! Dispatch cycle for one envelope:
//!   dispatcher ── matching(env.event_type()) ──► ListenerSet
//!                                                   │  (registration order)
//!                                                   ├──► listener 1: handle → on_complete | on_error
//!                                                   ├──► listener 2: handle → on_complete | on_error
//!                                                   └──► listener N: ...
//! ```
//!
//! ## Listener types
//! - **Typed structs** implementing [`Listener`] directly (business logic)
//! - **Closures** wrapped with [`ListenerFn`]
//! - **`LogListener`** (`logging` feature) prints every event of one type

mod listener;
mod listener_fn;
#[cfg(feature = "logging")]
mod log;
mod set;

pub use listener::{Listener, ListenerRef};
pub use listener_fn::ListenerFn;
#[cfg(feature = "logging")]
pub use log::LogListener;
pub use set::ListenerSet;

pub(crate) use set::same_listener;
