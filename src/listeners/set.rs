//! # ListenerSet: the frozen, ordered listener list of a hub.
//!
//! [`ListenerSet`] is built once by [`HubBuilder`](crate::HubBuilder) and never
//! changes afterwards. Each listener's [`EventType`] is read once, when the set is
//! frozen; routing uses that stored tag and never calls back into the listener.
//! The dispatcher asks for the listeners matching an envelope's type; they come
//! back in registration order.
//!
//! ## Diagram
//! ```text
//!    matching(EventType::of::<A>())
//!        │
//!        ├── [0] Listener<A>  ✔
//!        ├── [1] Listener<B>  ✘
//!        └── [2] Listener<A>  ✔   → yields [0], [2]
//! ```

use std::sync::Arc;

use crate::events::EventType;

use super::ListenerRef;

/// Immutable, ordered listener list. Cheap to clone.
#[derive(Clone)]
pub struct ListenerSet {
    entries: Arc<[(EventType, ListenerRef)]>,
}

impl ListenerSet {
    /// Freezes `listeners` in the given order.
    ///
    /// [`Listener::event_type`](crate::Listener::event_type) is called exactly once per
    /// listener, here, on the caller's task.
    #[must_use]
    pub fn new(listeners: Vec<ListenerRef>) -> Self {
        Self {
            entries: listeners.into_iter().map(|l| (l.event_type(), l)).collect(),
        }
    }

    /// Listeners declared for exactly `event_type`, in registration order.
    pub fn matching(&self, event_type: EventType) -> impl Iterator<Item = &ListenerRef> + '_ {
        self.entries
            .iter()
            .filter(move |(declared, _)| *declared == event_type)
            .map(|(_, l)| l)
    }

    /// All listeners, in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &ListenerRef> + '_ {
        self.entries.iter().map(|(_, l)| l)
    }

    /// True if `listener` (the same allocation) is part of the set.
    #[must_use]
    pub fn contains(&self, listener: &ListenerRef) -> bool {
        self.iter().any(|l| same_listener(l, listener))
    }

    /// True if there are no listeners.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of listeners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl std::fmt::Debug for ListenerSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|(ty, l)| (l.name(), ty.name())))
            .finish()
    }
}

/// Listener identity: two handles are the same listener if they point at the same allocation.
pub(crate) fn same_listener(a: &ListenerRef, b: &ListenerRef) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}
