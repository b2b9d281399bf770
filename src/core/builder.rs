use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::core::{DispatchState, EventHub, HubConfig, dispatcher::Dispatcher};
use crate::error::HubError;
use crate::events::ObservableQueue;
use crate::listeners::{ListenerRef, ListenerSet, same_listener};

/// Assembles the listener set of a hub, then freezes it and starts the dispatcher.
///
/// Registration happens only here: [`build`](Self::build) consumes the builder, so
/// the set of a running hub can never change.
pub struct HubBuilder {
    cfg: HubConfig,
    listeners: Vec<ListenerRef>,
}

impl HubBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: HubConfig) -> Self {
        Self {
            cfg,
            listeners: Vec::new(),
        }
    }

    /// Appends `listener`. The same listener may be registered more than once;
    /// it is then called once per registration.
    pub fn register(&mut self, listener: ListenerRef) -> &mut Self {
        self.listeners.push(listener);
        self
    }

    /// Removes the first registration of `listener` (same allocation).
    ///
    /// Returns `false` if it was not registered.
    pub fn unregister(&mut self, listener: &ListenerRef) -> bool {
        match self
            .listeners
            .iter()
            .position(|l| same_listener(l, listener))
        {
            Some(idx) => {
                self.listeners.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Appends every listener yielded by `listeners`, in order.
    ///
    /// Use it to feed listeners discovered elsewhere (a plugin list, an app registry).
    pub fn register_all<I>(&mut self, listeners: I) -> &mut Self
    where
        I: IntoIterator<Item = ListenerRef>,
    {
        self.listeners.extend(listeners);
        self
    }

    /// Chaining form of [`register`](Self::register).
    pub fn with_listener(mut self, listener: ListenerRef) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Chaining form of [`register_all`](Self::register_all).
    pub fn with_listeners(mut self, listeners: Vec<ListenerRef>) -> Self {
        self.listeners.extend(listeners);
        self
    }

    /// Replaces the configuration.
    pub fn with_config(mut self, cfg: HubConfig) -> Self {
        self.cfg = cfg;
        self
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    /// True if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Freezes the listener set and spawns the dispatcher.
    ///
    /// This consumes the builder and initializes all runtime components:
    /// - Observable queue with its change channel
    /// - Frozen listener set
    /// - Dispatcher task on the current tokio runtime
    ///
    /// Returns [`HubError::NoRuntime`] when called outside a tokio runtime.
    pub fn build(self) -> Result<EventHub, HubError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| HubError::NoRuntime)?;

        let queue = Arc::new(ObservableQueue::new(self.cfg.notify_capacity_clamped()));
        let listeners = ListenerSet::new(self.listeners);
        let token = CancellationToken::new();
        let (state_tx, state_rx) = watch::channel(DispatchState::Idle);
        let state_tx = Arc::new(state_tx);

        let dispatcher = Dispatcher::new(
            Arc::clone(&queue),
            listeners.clone(),
            Arc::clone(&state_tx),
            token.clone(),
            self.cfg.handler_timeout(),
        );
        let worker = runtime.spawn(dispatcher.run());
        debug!(listeners = listeners.len(), "hub built");

        Ok(EventHub::from_parts(
            self.cfg, queue, listeners, state_tx, state_rx, token, worker,
        ))
    }
}

impl Default for HubBuilder {
    fn default() -> Self {
        Self::new(HubConfig::default())
    }
}
