//! # Function-backed listener (`ListenerFn`)
//!
//! [`ListenerFn`] wraps a closure `F: Fn(Arc<E>, CancellationToken) -> Fut`, producing a
//! fresh future per event. The event type is fixed by the closure's first argument.
//!
//! ## Concurrency semantics
//! - Each call creates a **new** future that owns its state.
//! - No hidden mutation between events; share state through an explicit `Arc<...>`
//!   captured by the closure.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use eventhub::{EventType, Listener, ListenerError, ListenerFn, ListenerRef};
//!
//! struct Tick(u32);
//!
//! let l: ListenerRef = ListenerFn::arc("ticker", |tick: Arc<Tick>, _ctx: CancellationToken| async move {
//!     let _ = tick.0;
//!     Ok::<_, ListenerError>(())
//! });
//!
//! assert_eq!(l.name(), "ticker");
//! assert_eq!(l.event_type(), EventType::of::<Tick>());
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::ListenerError;
use crate::events::{Envelope, Event, EventType};
use crate::listeners::Listener;

/// Function-backed listener implementation.
pub struct ListenerFn<E, F> {
    name: Cow<'static, str>,
    f: F,
    _event: PhantomData<fn(Arc<E>)>,
}

impl<E, F> ListenerFn<E, F> {
    /// Creates a new function-backed listener.
    ///
    /// Prefer [`ListenerFn::arc`] when you immediately need a [`ListenerRef`](crate::ListenerRef).
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
            _event: PhantomData,
        }
    }

    /// Creates the listener and returns it as a shared handle.
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

impl<E, F> std::fmt::Debug for ListenerFn<E, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerFn")
            .field("name", &self.name)
            .field("event_type", &std::any::type_name::<E>())
            .finish()
    }
}

#[async_trait]
impl<E, F, Fut> Listener for ListenerFn<E, F>
where
    E: Event,
    F: Fn(Arc<E>, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), ListenerError>> + Send + 'static,
{
    fn event_type(&self) -> EventType {
        EventType::of::<E>()
    }

    async fn handle(&self, event: &Envelope, ctx: CancellationToken) -> Result<(), ListenerError> {
        let payload = event.downcast::<E>().ok_or_else(|| {
            ListenerError::fail(format!(
                "expected {}, got {}",
                std::any::type_name::<E>(),
                event.event_type()
            ))
        })?;
        (self.f)(payload, ctx).await
    }

    fn name(&self) -> &str {
        &self.name
    }
}
