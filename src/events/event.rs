//! # Published events and their routing tag.
//!
//! - [`Event`] is a marker trait implemented for every `Send + Sync + 'static` type.
//! - [`EventType`] is the routing tag: the runtime type id plus the type name for logs.
//! - [`Envelope`] is what actually travels through the queue: the shared payload
//!   together with its tag, a per-hub sequence number and a wall-clock timestamp.
//!
//! ## Ordering guarantees
//! The hub assigns `seq` under the queue lock, so `seq` order equals FIFO order.
//!
//! ## Example
//! ```rust
//! use eventhub::{Envelope, EventType};
//!
//! #[derive(Debug, PartialEq)]
//! struct UserCreated { id: u64 }
//!
//! let env = Envelope::new(1, UserCreated { id: 7 });
//!
//! assert_eq!(env.event_type(), EventType::of::<UserCreated>());
//! assert_eq!(env.downcast_ref::<UserCreated>(), Some(&UserCreated { id: 7 }));
//! assert!(env.downcast_ref::<String>().is_none());
//! ```

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::SystemTime;

/// Anything that can be published to the hub.
///
/// Implemented for every `Send + Sync + 'static` type; no payload shape is imposed.
pub trait Event: Any + Send + Sync + 'static {}

impl<T: Any + Send + Sync + 'static> Event for T {}

/// Routing tag of an event: its exact runtime type.
///
/// Equality and hashing use the [`TypeId`] only; `name` is kept for logs.
#[derive(Clone, Copy)]
pub struct EventType {
    id: TypeId,
    name: &'static str,
}

impl EventType {
    /// Tag for the event type `E`.
    #[inline]
    pub fn of<E: Event>() -> Self {
        Self {
            id: TypeId::of::<E>(),
            name: std::any::type_name::<E>(),
        }
    }

    /// Fully qualified type name, as reported by `std::any::type_name`.
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Runtime type id.
    #[inline]
    pub fn id(&self) -> TypeId {
        self.id
    }
}

impl PartialEq for EventType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for EventType {}

impl Hash for EventType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EventType").field(&self.name).finish()
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// A published event as seen by listeners.
///
/// Cloning is cheap: the payload is shared behind an `Arc` and never mutated.
#[derive(Clone)]
pub struct Envelope {
    /// Per-hub sequence number, strictly increasing in enqueue order.
    pub seq: u64,
    /// Wall-clock time of publishing.
    pub at: SystemTime,
    event_type: EventType,
    payload: Arc<dyn Any + Send + Sync>,
}

impl Envelope {
    /// Wraps `event` with the given sequence number and the current time.
    pub fn new<E: Event>(seq: u64, event: E) -> Self {
        Self {
            seq,
            at: SystemTime::now(),
            event_type: EventType::of::<E>(),
            payload: Arc::new(event),
        }
    }

    /// Routing tag of the wrapped event.
    #[inline]
    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    /// True if the wrapped event is exactly of type `E`.
    #[inline]
    pub fn is<E: Event>(&self) -> bool {
        self.event_type == EventType::of::<E>()
    }

    /// Borrows the payload as `E`, or `None` if the type differs.
    pub fn downcast_ref<E: Event>(&self) -> Option<&E> {
        self.payload.downcast_ref::<E>()
    }

    /// Returns a shared handle to the payload as `E`, or `None` if the type differs.
    pub fn downcast<E: Event>(&self) -> Option<Arc<E>> {
        Arc::clone(&self.payload).downcast::<E>().ok()
    }
}

impl fmt::Debug for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Envelope")
            .field("seq", &self.seq)
            .field("event_type", &self.event_type)
            .field("at", &self.at)
            .finish_non_exhaustive()
    }
}
