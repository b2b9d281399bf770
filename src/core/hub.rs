//! # EventHub: the public facade.
//!
//! The [`EventHub`] owns the [`ObservableQueue`], the frozen [`ListenerSet`] and the
//! lifetime of the dispatcher task. Publishing only appends to the queue; every
//! suspension happens inside the dispatcher.
//!
//! ## High-level architecture
//! ```text
//! Producers (any thread):
//!   hub.publish(ev) ──► ObservableQueue::enqueue_with(seq ─► Envelope)   (never awaits)
//!                           │
//!                           ├─► wake ──► Dispatcher (one tokio task per hub)
//!                           │               └─► matching listeners, one by one
//!                           └─► QueueChange::Added ──► hub.subscribe_queue() observers
//!
//! Observation:
//!   hub.state() / hub.watch_state()   DispatchState { Idle | Processing { seq } | Stopped }
//!   hub.wait_idle()                   queue empty && dispatcher Idle
//!
//! Shutdown path:
//!   hub.shutdown()
//!     └─► queue.close()                      → publish() returns HubError::Closed
//!     └─► DrainPolicy::Abort ─► token.cancel()
//!     └─► wait dispatcher up to cfg.grace:
//!            ├─ Ok         → Ok(())
//!            └─ exceeded   → token.cancel(), abort task, discard queue
//!                            → HubError::GraceExceeded { grace, pending }
//! ```
//!
//! Dropping the last `EventHub` handle closes the queue and cancels the dispatcher.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use eventhub::{EventHub, HubConfig, ListenerError, ListenerFn, ListenerRef};
//!
//! struct Greeting(&'static str);
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let hello: ListenerRef = ListenerFn::arc("hello", |g: Arc<Greeting>, _ctx: CancellationToken| async move {
//!         println!("hello, {}", g.0);
//!         Ok::<_, ListenerError>(())
//!     });
//!
//!     let hub = EventHub::new(HubConfig::default(), vec![hello])?;
//!     hub.publish(Greeting("world"))?;
//!
//!     hub.wait_idle().await;
//!     hub.shutdown().await?;
//!     Ok(())
//! }
//! ```

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::core::dispatcher::is_dispatching;
use crate::core::{DispatchState, DrainPolicy, HubBuilder, HubConfig};
use crate::error::HubError;
use crate::events::{Envelope, Event, EventType, ObservableQueue, QueueChange};
use crate::listeners::{ListenerRef, ListenerSet};

struct Inner {
    cfg: HubConfig,
    queue: Arc<ObservableQueue<Envelope>>,
    listeners: ListenerSet,
    state_tx: Arc<watch::Sender<DispatchState>>,
    state: watch::Receiver<DispatchState>,
    token: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.queue.close();
        self.token.cancel();
    }
}

/// Publishes events to a fixed set of listeners through one ordered dispatcher.
///
/// Cheap to clone; all clones share the same queue and dispatcher.
#[derive(Clone)]
pub struct EventHub {
    inner: Arc<Inner>,
}

impl EventHub {
    /// Returns a builder with the default configuration.
    pub fn builder() -> HubBuilder {
        HubBuilder::new(HubConfig::default())
    }

    /// Builds a hub directly from an already-assembled listener list.
    ///
    /// Must be called inside a tokio runtime; see [`HubBuilder::build`].
    pub fn new(cfg: HubConfig, listeners: Vec<ListenerRef>) -> Result<Self, HubError> {
        HubBuilder::new(cfg).with_listeners(listeners).build()
    }

    pub(crate) fn from_parts(
        cfg: HubConfig,
        queue: Arc<ObservableQueue<Envelope>>,
        listeners: ListenerSet,
        state_tx: Arc<watch::Sender<DispatchState>>,
        state: watch::Receiver<DispatchState>,
        token: CancellationToken,
        worker: JoinHandle<()>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                cfg,
                queue,
                listeners,
                state_tx,
                state,
                token,
                worker: Mutex::new(Some(worker)),
            }),
        }
    }

    /// Enqueues `event` for delivery and returns immediately.
    ///
    /// Never waits for listeners. Fails only with [`HubError::Closed`] once
    /// [`shutdown`](Self::shutdown) has started.
    pub fn publish<E: Event>(&self, event: E) -> Result<(), HubError> {
        let seq = self
            .inner
            .queue
            .enqueue_with(|seq| Envelope::new(seq, event))
            .map_err(|_| HubError::Closed)?;
        trace!(seq, event_type = %EventType::of::<E>(), "event published");
        Ok(())
    }

    /// Number of events waiting to be dispatched (the one in flight is not counted).
    pub fn pending(&self) -> usize {
        self.inner.queue.len()
    }

    /// The frozen listener set.
    pub fn listeners(&self) -> &ListenerSet {
        &self.inner.listeners
    }

    /// The configuration this hub was built with.
    pub fn config(&self) -> &HubConfig {
        &self.inner.cfg
    }

    /// True once shutdown started (or the hub is being dropped).
    pub fn is_closed(&self) -> bool {
        self.inner.queue.is_closed()
    }

    /// Current dispatcher state.
    pub fn state(&self) -> DispatchState {
        *self.inner.state.borrow()
    }

    /// Receiver that observes every dispatcher state change.
    pub fn watch_state(&self) -> watch::Receiver<DispatchState> {
        self.inner.state.clone()
    }

    /// Subscribes to queue add/remove notifications raised from now on.
    pub fn subscribe_queue(&self) -> broadcast::Receiver<QueueChange> {
        self.inner.queue.subscribe()
    }

    /// Resolves once nothing is queued and the dispatcher is not processing.
    ///
    /// This is a snapshot: events published concurrently with the call may or may
    /// not be covered. Also resolves if the dispatcher has stopped.
    pub async fn wait_idle(&self) {
        let mut rx = self.inner.state.clone();
        loop {
            // Queue first: the dispatcher dequeues and leaves Idle in one step.
            if self.inner.queue.is_empty()
                && matches!(
                    *rx.borrow_and_update(),
                    DispatchState::Idle | DispatchState::Stopped
                )
            {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Stops the hub.
    ///
    /// Closes the queue (further `publish` calls fail with [`HubError::Closed`]), then
    /// applies [`HubConfig::drain`] and waits up to [`HubConfig::grace`] for the
    /// dispatcher to exit. Past the grace period the dispatcher is aborted and the
    /// remaining events are discarded.
    ///
    /// Calling it again, or concurrently, waits for the dispatcher to stop and returns `Ok(())`.
    ///
    /// Called from a listener of this hub, it cannot wait for the dispatcher that is
    /// running the caller: it closes the queue, applies the drain policy and returns
    /// `Ok(())` at once. The dispatcher stops after the listener returns.
    pub async fn shutdown(&self) -> Result<(), HubError> {
        let inner = &self.inner;
        if inner.queue.close() {
            debug!(pending = inner.queue.len(), policy = ?inner.cfg.drain, "shutdown requested");
        }
        if inner.cfg.drain == DrainPolicy::Abort {
            inner.token.cancel();
        }
        if is_dispatching(&inner.queue) {
            debug!("shutdown requested by a listener; dispatcher stops after it returns");
            return Ok(());
        }

        let worker = inner
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(mut worker) = worker else {
            self.wait_stopped().await;
            return Ok(());
        };

        let grace = inner.cfg.grace;
        match time::timeout(grace, &mut worker).await {
            Ok(_) => {
                debug!("hub stopped within grace");
                Ok(())
            }
            Err(_elapsed) => {
                inner.token.cancel();
                worker.abort();
                // Resolves at the stuck handler's next suspension point.
                let _ = worker.await;
                let pending = inner.queue.drain_all().len();
                inner.state_tx.send_replace(DispatchState::Stopped);
                warn!(?grace, pending, "shutdown grace exceeded; dispatcher aborted");
                Err(HubError::GraceExceeded { grace, pending })
            }
        }
    }

    async fn wait_stopped(&self) {
        let mut rx = self.inner.state.clone();
        let _ = rx.wait_for(|s| *s == DispatchState::Stopped).await;
    }
}

impl std::fmt::Debug for EventHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventHub")
            .field("listeners", &self.inner.listeners)
            .field("pending", &self.pending())
            .field("state", &self.state())
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ListenerError, ListenerFn};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct Ping;

    fn counting(count: &Arc<AtomicUsize>) -> ListenerRef {
        let count = Arc::clone(count);
        ListenerFn::arc("count", move |_p: Arc<Ping>, _ctx: CancellationToken| {
            let count = Arc::clone(&count);
            async move {
                count.fetch_add(1, Ordering::SeqCst);
                Ok::<_, ListenerError>(())
            }
        })
    }

    #[tokio::test]
    async fn publish_is_delivered() {
        let count = Arc::new(AtomicUsize::new(0));
        let hub = EventHub::new(HubConfig::default(), vec![counting(&count)]).unwrap();

        hub.publish(Ping).unwrap();
        hub.publish(Ping).unwrap();
        hub.wait_idle().await;

        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert_eq!(hub.pending(), 0);
        assert_eq!(hub.state(), DispatchState::Idle);
    }

    #[tokio::test]
    async fn publish_after_shutdown_is_rejected() {
        let hub = EventHub::builder().build().unwrap();
        hub.shutdown().await.unwrap();

        assert!(hub.is_closed());
        assert_eq!(hub.publish(Ping), Err(HubError::Closed));
        assert_eq!(hub.state(), DispatchState::Stopped);
        hub.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn drain_policy_delivers_queued_events() {
        let count = Arc::new(AtomicUsize::new(0));
        let hub = EventHub::new(HubConfig::default(), vec![counting(&count)]).unwrap();
        for _ in 0..50 {
            hub.publish(Ping).unwrap();
        }
        hub.shutdown().await.unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 50);
    }

    #[tokio::test(start_paused = true)]
    async fn grace_exceeded_aborts_stuck_listener() {
        let stuck: ListenerRef =
            ListenerFn::arc("stuck", |_p: Arc<Ping>, _ctx: CancellationToken| async {
                // Ignores cancellation on purpose.
                std::future::pending::<()>().await;
                Ok::<_, ListenerError>(())
            });
        let cfg = HubConfig {
            grace: Duration::from_millis(200),
            ..HubConfig::default()
        };
        let hub = EventHub::new(cfg, vec![stuck]).unwrap();
        hub.publish(Ping).unwrap();
        hub.publish(Ping).unwrap();

        let mut state = hub.watch_state();
        state
            .wait_for(|s| s.is_processing())
            .await
            .expect("dispatcher picked up the first event");

        let err = hub.shutdown().await.unwrap_err();
        assert_eq!(
            err,
            HubError::GraceExceeded {
                grace: Duration::from_millis(200),
                pending: 1
            }
        );
        assert_eq!(hub.state(), DispatchState::Stopped);
        assert_eq!(*state.borrow_and_update(), DispatchState::Stopped);
        assert_eq!(hub.pending(), 0);
    }

    #[tokio::test]
    async fn shutdown_from_a_listener_returns_and_drains() {
        let slot: Arc<Mutex<Option<EventHub>>> = Arc::new(Mutex::new(None));
        let outcome: Arc<Mutex<Option<Result<(), HubError>>>> = Arc::new(Mutex::new(None));
        let closer: ListenerRef = {
            let slot = Arc::clone(&slot);
            let outcome = Arc::clone(&outcome);
            ListenerFn::arc("closer", move |_p: Arc<Ping>, _ctx: CancellationToken| {
                let slot = Arc::clone(&slot);
                let outcome = Arc::clone(&outcome);
                async move {
                    let hub = slot.lock().unwrap().take();
                    if let Some(hub) = hub {
                        let res = hub.shutdown().await;
                        *outcome.lock().unwrap() = Some(res);
                    }
                    Ok::<_, ListenerError>(())
                }
            })
        };
        let count = Arc::new(AtomicUsize::new(0));
        let hub = EventHub::new(HubConfig::default(), vec![closer, counting(&count)]).unwrap();
        *slot.lock().unwrap() = Some(hub.clone());
        hub.publish(Ping).unwrap();
        hub.publish(Ping).unwrap();

        let mut state = hub.watch_state();
        let _ = time::timeout(
            Duration::from_secs(5),
            state.wait_for(|s| *s == DispatchState::Stopped),
        )
        .await
        .expect("dispatcher stops after the listener returns");

        assert_eq!(*outcome.lock().unwrap(), Some(Ok(())));
        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert_eq!(hub.publish(Ping), Err(HubError::Closed));
        hub.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn dropping_last_handle_stops_dispatcher() {
        let hub = EventHub::builder().build().unwrap();
        let mut state = hub.watch_state();
        drop(hub);

        let _ = tokio::time::timeout(
            Duration::from_secs(1),
            state.wait_for(|s| *s == DispatchState::Stopped),
        )
        .await
        .expect("dispatcher stops after drop");
    }

    #[test]
    fn build_outside_runtime_is_a_usage_error() {
        let err = EventHub::builder().build().unwrap_err();
        assert_eq!(err, HubError::NoRuntime);
    }
}
