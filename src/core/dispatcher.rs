//! # Dispatcher: the single consumer of a hub's queue.
//!
//! One [`Dispatcher`] runs per hub as a long-lived tokio task. Being the only
//! consumer makes "at most one dispatch cycle at a time" structural: there is no
//! processing flag to guard, only a state value published for observers.
//!
//! ## Loop
//! ```text
//! loop {
//!   ├─► next(): dequeue head + publish state (one critical section)
//!   │     ├─ Some(env) ──► Processing { seq }
//!   │     │                 for listener in set.matching(env.event_type()):   (registration order)
//!   │     │                     handle(env, child_token)  (catch_unwind, optional timeout)
//!   │     │                     ├─ Ok  ──► on_complete(env)
//!   │     │                     └─ Err ──► on_error(env, err)
//!   │     │                 continue
//!   │     └─ None ──────► Idle
//!   ├─► queue closed and empty ──► exit
//!   └─► select! { token.cancelled() ──► exit, queue.wait_added() ──► continue }
//! }
//! on exit: cancelled ──► discard remaining events; publish Stopped
//! ```
//!
//! ## Rules
//! - Listeners of one event run strictly one after another, never concurrently.
//! - The next event is dequeued only after every listener of the current one finished.
//! - A failing, panicking or timed-out listener is reported to its own `on_error`;
//!   the loop itself never exits because of a listener.
//! - Panics in `on_complete`/`on_error` are caught and logged.
//!
//! **Warning**: `AssertUnwindSafe` is used, which can leave shared state inconsistent
//! if a listener uses `Arc<Mutex<T>>` and panics while holding the lock.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::watch;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

use crate::error::ListenerError;
use crate::events::{Envelope, ObservableQueue};
use crate::listeners::{Listener, ListenerRef, ListenerSet};

/// Observable state of a hub's dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    /// Waiting for the next event; nothing is being delivered.
    Idle,
    /// A dispatch cycle is delivering the event with this sequence number.
    Processing {
        /// Sequence number of the event in flight.
        seq: u64,
    },
    /// The dispatcher has exited; no further events will be delivered.
    Stopped,
}

impl DispatchState {
    /// True while a dispatch cycle is in flight.
    #[inline]
    pub fn is_processing(&self) -> bool {
        matches!(self, DispatchState::Processing { .. })
    }
}

pub(crate) struct Dispatcher {
    queue: Arc<ObservableQueue<Envelope>>,
    listeners: ListenerSet,
    state: Arc<watch::Sender<DispatchState>>,
    token: CancellationToken,
    handler_timeout: Option<Duration>,
}

tokio::task_local! {
    /// Queue address of the hub whose dispatcher owns the current task.
    static DISPATCHING: usize;
}

fn queue_id(queue: &Arc<ObservableQueue<Envelope>>) -> usize {
    Arc::as_ptr(queue) as usize
}

/// True when called from a listener running on the dispatcher of the hub owning `queue`.
pub(crate) fn is_dispatching(queue: &Arc<ObservableQueue<Envelope>>) -> bool {
    DISPATCHING
        .try_with(|id| *id == queue_id(queue))
        .unwrap_or(false)
}

impl Dispatcher {
    pub(crate) fn new(
        queue: Arc<ObservableQueue<Envelope>>,
        listeners: ListenerSet,
        state: Arc<watch::Sender<DispatchState>>,
        token: CancellationToken,
        handler_timeout: Option<Duration>,
    ) -> Self {
        Self {
            queue,
            listeners,
            state,
            token,
            handler_timeout,
        }
    }

    /// Drains the queue until it is closed and empty, or until cancelled.
    pub(crate) async fn run(self) {
        let id = queue_id(&self.queue);
        DISPATCHING.scope(id, self.run_loop()).await;
    }

    async fn run_loop(self) {
        debug!(listeners = self.listeners.len(), "dispatcher started");

        loop {
            while let Some(env) = self.next() {
                self.dispatch(env).await;
            }
            if self.token.is_cancelled() || self.queue_drained() {
                break;
            }
            tokio::select! {
                biased;
                _ = self.token.cancelled() => break,
                _ = self.queue.wait_added() => {}
            }
        }

        if self.token.is_cancelled() {
            let discarded = self.queue.drain_all().len();
            if discarded > 0 {
                warn!(discarded, "dispatcher cancelled; queued events discarded");
            }
        }
        self.state.send_replace(DispatchState::Stopped);
        debug!("dispatcher stopped");
    }

    /// Dequeues the head and publishes the matching state in one step, so an
    /// observer never sees an empty queue together with a stale `Idle`.
    fn next(&self) -> Option<Envelope> {
        if self.token.is_cancelled() {
            return None;
        }
        let mut next = None;
        self.state.send_if_modified(|state| {
            next = self.queue.try_dequeue();
            let new = match &next {
                Some(env) => DispatchState::Processing { seq: env.seq },
                None => DispatchState::Idle,
            };
            let changed = *state != new;
            *state = new;
            changed
        });
        next
    }

    fn queue_drained(&self) -> bool {
        // Once closed nothing can be added, so an empty check after it is final.
        self.queue.is_closed() && self.queue.is_empty()
    }

    /// One dispatch cycle: every matching listener, in order, one at a time.
    async fn dispatch(&self, env: Envelope) {
        let mut delivered = 0usize;
        for listener in self.listeners.matching(env.event_type()) {
            if self.token.is_cancelled() {
                debug!(seq = env.seq, "dispatch cycle cut short by cancellation");
                break;
            }
            self.deliver(listener, &env).await;
            delivered += 1;
        }

        if delivered == 0 {
            trace!(seq = env.seq, event_type = %env.event_type(), "no listeners; event consumed");
        }
    }

    async fn deliver(&self, listener: &ListenerRef, env: &Envelope) {
        let ctx = self.token.child_token();
        match run_handler(listener.as_ref(), env, ctx, self.handler_timeout).await {
            Ok(()) => {
                trace!(seq = env.seq, listener = listener.name(), "event handled");
                guard_callback(listener.name(), "on_complete", || listener.on_complete(env));
            }
            Err(err) => {
                if matches!(err, ListenerError::Canceled) {
                    debug!(seq = env.seq, listener = listener.name(), "handling cancelled");
                } else {
                    warn!(
                        seq = env.seq,
                        event_type = %env.event_type(),
                        listener = listener.name(),
                        label = err.as_label(),
                        error = %err,
                        "listener failed"
                    );
                }
                guard_callback(listener.name(), "on_error", || listener.on_error(env, &err));
            }
        }
    }
}

/// Runs one `handle` call with panic isolation and an optional deadline.
///
/// On timeout the handler's token is cancelled before the error is returned.
async fn run_handler(
    listener: &dyn Listener,
    env: &Envelope,
    ctx: CancellationToken,
    timeout: Option<Duration>,
) -> Result<(), ListenerError> {
    // The call itself sits inside the guard: a listener may panic before returning a future.
    let fut = AssertUnwindSafe(async { listener.handle(env, ctx.clone()).await }).catch_unwind();

    let res = match timeout {
        Some(dur) => match time::timeout(dur, fut).await {
            Ok(r) => r,
            Err(_elapsed) => {
                ctx.cancel();
                return Err(ListenerError::Timeout { timeout: dur });
            }
        },
        None => fut.await,
    };

    res.unwrap_or_else(|panic| {
        Err(ListenerError::Panicked {
            info: panic_message(&*panic),
        })
    })
}

fn guard_callback(listener: &str, callback: &'static str, f: impl FnOnce()) {
    if let Err(panic) = std::panic::catch_unwind(AssertUnwindSafe(f)) {
        error!(
            listener,
            callback,
            info = %panic_message(&*panic),
            "listener callback panicked"
        );
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventType;
    use crate::listeners::ListenerFn;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct Job(u32);

    /// Records every callback as a string.
    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
        fail_on: Option<u32>,
        panic_on: Option<u32>,
    }

    impl Recorder {
        fn arc(name: &'static str, log: &Arc<Mutex<Vec<String>>>) -> ListenerRef {
            Arc::new(Self {
                name,
                log: Arc::clone(log),
                fail_on: None,
                panic_on: None,
            })
        }
    }

    #[async_trait]
    impl Listener for Recorder {
        fn event_type(&self) -> EventType {
            EventType::of::<Job>()
        }

        async fn handle(
            &self,
            env: &Envelope,
            _ctx: CancellationToken,
        ) -> Result<(), ListenerError> {
            let job = env.downcast_ref::<Job>().unwrap();
            if self.panic_on == Some(job.0) {
                panic!("boom {}", job.0);
            }
            if self.fail_on == Some(job.0) {
                return Err(ListenerError::fail("nope"));
            }
            self.log.lock().unwrap().push(format!("{}:handle:{}", self.name, job.0));
            Ok(())
        }

        fn on_complete(&self, env: &Envelope) {
            let job = env.downcast_ref::<Job>().unwrap();
            self.log.lock().unwrap().push(format!("{}:complete:{}", self.name, job.0));
        }

        fn on_error(&self, env: &Envelope, error: &ListenerError) {
            let job = env.downcast_ref::<Job>().unwrap();
            self.log
                .lock()
                .unwrap()
                .push(format!("{}:error:{}:{}", self.name, job.0, error.as_label()));
        }

        fn name(&self) -> &str {
            self.name
        }
    }

    fn dispatcher(
        listeners: Vec<ListenerRef>,
        timeout: Option<Duration>,
    ) -> (
        Dispatcher,
        Arc<ObservableQueue<Envelope>>,
        watch::Receiver<DispatchState>,
        CancellationToken,
    ) {
        let queue = Arc::new(ObservableQueue::new(64));
        let (tx, rx) = watch::channel(DispatchState::Idle);
        let token = CancellationToken::new();
        let d = Dispatcher::new(
            Arc::clone(&queue),
            ListenerSet::new(listeners),
            Arc::new(tx),
            token.clone(),
            timeout,
        );
        (d, queue, rx, token)
    }

    fn push(queue: &ObservableQueue<Envelope>, job: u32) {
        queue.enqueue_with(|seq| Envelope::new(seq, Job(job))).unwrap();
    }

    #[tokio::test]
    async fn listeners_run_in_order_then_complete() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let (d, queue, mut rx, _token) = dispatcher(
            vec![Recorder::arc("a", &log), Recorder::arc("b", &log)],
            None,
        );
        push(&queue, 1);
        push(&queue, 2);
        queue.close();

        d.run().await;

        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "a:handle:1",
                "a:complete:1",
                "b:handle:1",
                "b:complete:1",
                "a:handle:2",
                "a:complete:2",
                "b:handle:2",
                "b:complete:2",
            ]
        );
        assert_eq!(*rx.borrow_and_update(), DispatchState::Stopped);
    }

    #[tokio::test]
    async fn failure_and_panic_reach_on_error_only() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let failing: ListenerRef = Arc::new(Recorder {
            name: "f",
            log: Arc::clone(&log),
            fail_on: Some(1),
            panic_on: Some(2),
        });
        let (d, queue, _rx, _token) = dispatcher(vec![failing, Recorder::arc("ok", &log)], None);
        push(&queue, 1);
        push(&queue, 2);
        push(&queue, 3);
        queue.close();

        d.run().await;

        let log = log.lock().unwrap();
        assert!(log.contains(&"f:error:1:listener_failed".to_string()));
        assert!(log.contains(&"f:error:2:listener_panicked".to_string()));
        assert!(log.contains(&"f:complete:3".to_string()));
        for job in 1..=3 {
            assert!(log.contains(&format!("ok:complete:{job}")));
        }
        assert!(!log.iter().any(|l| l == "f:complete:1" || l == "f:complete:2"));
    }

    #[tokio::test]
    async fn panicking_callback_does_not_stop_the_loop() {
        struct LoudComplete(Arc<AtomicUsize>);

        #[async_trait]
        impl Listener for LoudComplete {
            fn event_type(&self) -> EventType {
                EventType::of::<Job>()
            }
            async fn handle(
                &self,
                _env: &Envelope,
                _ctx: CancellationToken,
            ) -> Result<(), ListenerError> {
                self.0.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            fn on_complete(&self, _env: &Envelope) {
                panic!("on_complete exploded");
            }
        }

        let handled = Arc::new(AtomicUsize::new(0));
        let (d, queue, _rx, _token) =
            dispatcher(vec![Arc::new(LoudComplete(Arc::clone(&handled))) as ListenerRef], None);
        for i in 0..3 {
            push(&queue, i);
        }
        queue.close();

        d.run().await;
        assert_eq!(handled.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn panic_while_building_the_future_is_isolated() {
        use std::future::Future;
        use std::pin::Pin;

        /// Implements `handle` by hand and panics before any future exists.
        struct Eager;

        impl Listener for Eager {
            fn event_type(&self) -> EventType {
                EventType::of::<Job>()
            }

            fn handle<'a, 'b, 'f>(
                &'a self,
                _env: &'b Envelope,
                _ctx: CancellationToken,
            ) -> Pin<Box<dyn Future<Output = Result<(), ListenerError>> + Send + 'f>>
            where
                'a: 'f,
                'b: 'f,
                Self: 'f,
            {
                panic!("no future for you");
            }

            fn name(&self) -> &str {
                "eager"
            }
        }

        let log = Arc::new(Mutex::new(Vec::new()));
        let (d, queue, mut rx, _token) =
            dispatcher(vec![Arc::new(Eager) as ListenerRef, Recorder::arc("ok", &log)], None);
        push(&queue, 1);
        push(&queue, 2);
        queue.close();

        d.run().await;

        assert_eq!(
            *log.lock().unwrap(),
            vec!["ok:handle:1", "ok:complete:1", "ok:handle:2", "ok:complete:2"]
        );
        assert_eq!(*rx.borrow_and_update(), DispatchState::Stopped);
    }

    #[tokio::test]
    async fn routing_does_not_call_event_type_again() {
        /// Answers once, then panics on every later call.
        struct Fickle(AtomicUsize);

        #[async_trait]
        impl Listener for Fickle {
            fn event_type(&self) -> EventType {
                if self.0.fetch_add(1, Ordering::SeqCst) > 0 {
                    panic!("event_type asked twice");
                }
                EventType::of::<String>()
            }
            async fn handle(
                &self,
                _env: &Envelope,
                _ctx: CancellationToken,
            ) -> Result<(), ListenerError> {
                Ok(())
            }
        }

        let log = Arc::new(Mutex::new(Vec::new()));
        let fickle = Arc::new(Fickle(AtomicUsize::new(0)));
        let (d, queue, mut rx, _token) = dispatcher(
            vec![Recorder::arc("ok", &log), fickle.clone() as ListenerRef],
            None,
        );
        push(&queue, 1);
        push(&queue, 2);
        queue.close();

        d.run().await;

        assert_eq!(
            *log.lock().unwrap(),
            vec!["ok:handle:1", "ok:complete:1", "ok:handle:2", "ok:complete:2"]
        );
        assert_eq!(fickle.0.load(Ordering::SeqCst), 1);
        assert_eq!(*rx.borrow_and_update(), DispatchState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn handler_timeout_cancels_and_reports() {
        let errors = Arc::new(Mutex::new(Vec::new()));

        struct Sleeper(Arc<Mutex<Vec<ListenerError>>>);

        #[async_trait]
        impl Listener for Sleeper {
            fn event_type(&self) -> EventType {
                EventType::of::<Job>()
            }
            async fn handle(
                &self,
                _env: &Envelope,
                ctx: CancellationToken,
            ) -> Result<(), ListenerError> {
                tokio::select! {
                    _ = ctx.cancelled() => Err(ListenerError::Canceled),
                    _ = time::sleep(Duration::from_secs(3600)) => Ok(()),
                }
            }
            fn on_error(&self, _env: &Envelope, error: &ListenerError) {
                self.0.lock().unwrap().push(error.clone());
            }
        }

        let (d, queue, _rx, _token) = dispatcher(
            vec![Arc::new(Sleeper(Arc::clone(&errors))) as ListenerRef],
            Some(Duration::from_millis(100)),
        );
        push(&queue, 1);
        queue.close();

        d.run().await;
        assert_eq!(
            *errors.lock().unwrap(),
            vec![ListenerError::Timeout {
                timeout: Duration::from_millis(100)
            }]
        );
    }

    #[tokio::test]
    async fn cancellation_discards_queued_events() {
        let count = Arc::new(AtomicUsize::new(0));
        let listener: ListenerRef = {
            let count = Arc::clone(&count);
            ListenerFn::arc("count", move |_job: Arc<Job>, _ctx: CancellationToken| {
                let count = Arc::clone(&count);
                async move {
                    count.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, ListenerError>(())
                }
            })
        };
        let (d, queue, rx, token) = dispatcher(vec![listener], None);
        for i in 0..10 {
            push(&queue, i);
        }
        token.cancel();

        d.run().await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert!(queue.is_empty());
        assert_eq!(*rx.borrow(), DispatchState::Stopped);
    }

    #[test]
    fn panic_message_reads_str_and_string() {
        let a: Box<dyn Any + Send> = Box::new("static");
        let b: Box<dyn Any + Send> = Box::new(String::from("owned"));
        let c: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(&*a), "static");
        assert_eq!(panic_message(&*b), "owned");
        assert_eq!(panic_message(&*c), "unknown panic payload");
    }
}
