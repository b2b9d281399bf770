//! Hub core: construction, dispatch and lifecycle.
//!
//! The public API from this module is [`EventHub`] (the facade), [`HubBuilder`]
//! (listener registration), [`HubConfig`]/[`DrainPolicy`] (settings) and
//! [`DispatchState`] (what the dispatcher is doing).
//!
//! Internal modules:
//! - [`builder`]: assembles and freezes the listener set, spawns the dispatcher;
//! - [`dispatcher`]: single consumer loop with per-listener fault isolation;
//! - [`hub`]: publish, observation and shutdown;
//! - [`config`]: hub settings.

mod builder;
mod config;
mod dispatcher;
mod hub;

pub use builder::HubBuilder;
pub use config::{DrainPolicy, HubConfig};
pub use dispatcher::DispatchState;
pub use hub::EventHub;
