//! # Observable FIFO of pending events.
//!
//! [`ObservableQueue`] is the only structure the hub mutates from many threads.
//! Producers append through [`ObservableQueue::enqueue_with`]; the single dispatcher
//! removes through [`ObservableQueue::try_dequeue`].
//!
//! ## Architecture
//! ```text
//! Producers (many):                        Consumer (one):
//!   publish ──┐                 ┌──► wake (Notify) ──► dispatcher.wait_added()
//!   publish ──┼──► [VecDeque] ──┤
//!   publish ──┘   (Mutex)       └──► changes (broadcast) ──► any number of observers
//! ```
//!
//! ## Rules
//! - **Global FIFO**: order is decided by the order in which producers take the lock.
//! - **Tickets**: every accepted item gets a ticket (0, 1, 2, ...) in that same order.
//! - **No lost wakeups**: a wake raised while nobody waits is stored as a single permit.
//! - **Non-blocking notifications**: `QueueChange` is sent with `broadcast::Sender::send`;
//!   a lagging or absent observer never aborts the mutation.
//! - **Close**: after [`ObservableQueue::close`], new items are rejected; queued items
//!   stay until dequeued or drained.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::{Notify, broadcast};

/// Change notification raised by the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueChange {
    /// An item was appended to the tail.
    Added {
        /// Ticket of the appended item.
        ticket: u64,
        /// Queue length after the append.
        depth: usize,
    },
    /// An item was removed from the head.
    Removed {
        /// Ticket of the removed item.
        ticket: u64,
        /// Queue length after the removal.
        depth: usize,
    },
}

/// Returned by enqueue operations once the queue has been closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueClosed;

struct State<T> {
    items: VecDeque<T>,
    closed: bool,
    next_ticket: u64,
    head_ticket: u64,
}

/// Thread-safe FIFO that notifies about every add/remove.
pub struct ObservableQueue<T> {
    state: Mutex<State<T>>,
    wake: Notify,
    changes: broadcast::Sender<QueueChange>,
}

impl<T> ObservableQueue<T> {
    /// Creates an empty, open queue.
    ///
    /// `notify_capacity` is the ring size of the change channel (min 1; clamped).
    pub fn new(notify_capacity: usize) -> Self {
        let (changes, _rx) = broadcast::channel(notify_capacity.max(1));
        Self {
            state: Mutex::new(State {
                items: VecDeque::new(),
                closed: false,
                next_ticket: 0,
                head_ticket: 0,
            }),
            wake: Notify::new(),
            changes,
        }
    }

    fn lock(&self) -> MutexGuard<'_, State<T>> {
        // No user code runs under this lock, so a poisoned state is still consistent.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends `item` to the tail. Returns the item's ticket.
    pub fn enqueue(&self, item: T) -> Result<u64, QueueClosed> {
        self.enqueue_with(|_| item)
    }

    /// Appends the item built by `make(ticket)` to the tail.
    ///
    /// `make` runs under the queue lock and receives the ticket the item will get,
    /// so callers can stamp items with a number that matches FIFO order.
    pub fn enqueue_with<F>(&self, make: F) -> Result<u64, QueueClosed>
    where
        F: FnOnce(u64) -> T,
    {
        let mut state = self.lock();
        if state.closed {
            return Err(QueueClosed);
        }
        let ticket = state.next_ticket;
        state.next_ticket += 1;
        state.items.push_back(make(ticket));

        let depth = state.items.len();
        let _ = self.changes.send(QueueChange::Added { ticket, depth });
        self.wake.notify_one();
        Ok(ticket)
    }

    /// Removes and returns the head, if any.
    ///
    /// An empty queue yields `None` and raises no notification.
    pub fn try_dequeue(&self) -> Option<T> {
        let mut state = self.lock();
        let item = state.items.pop_front()?;
        let ticket = state.head_ticket;
        state.head_ticket += 1;

        let depth = state.items.len();
        let _ = self.changes.send(QueueChange::Removed { ticket, depth });
        Some(item)
    }

    /// Removes and returns everything still queued, head first.
    pub fn drain_all(&self) -> Vec<T> {
        let mut state = self.lock();
        let mut out = Vec::with_capacity(state.items.len());
        while let Some(item) = state.items.pop_front() {
            let ticket = state.head_ticket;
            state.head_ticket += 1;
            let depth = state.items.len();
            let _ = self.changes.send(QueueChange::Removed { ticket, depth });
            out.push(item);
        }
        out
    }

    /// Rejects all further enqueues and wakes the consumer.
    ///
    /// Returns `false` if the queue was already closed.
    pub fn close(&self) -> bool {
        let mut state = self.lock();
        if state.closed {
            return false;
        }
        state.closed = true;
        self.wake.notify_one();
        true
    }

    /// Resolves after the next enqueue or close (or immediately if one happened
    /// since the previous call and nobody was waiting).
    pub async fn wait_added(&self) {
        self.wake.notified().await;
    }

    /// Subscribes to add/remove notifications raised from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<QueueChange> {
        self.changes.subscribe()
    }

    /// Number of queued items.
    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    /// True if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }

    /// True once [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }
}
