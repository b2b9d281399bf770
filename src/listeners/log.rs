//! # LogListener: simple event printer
//!
//! A minimal listener that writes every event of one type to `tracing` at `INFO`.
//! Use it for tests or demos.
//!
//! ## Example output (with a fmt subscriber)
//! ```text
//! INFO eventhub::listeners::log: event seq=0 event_type=demo::Ping listener="log" payload=Ping(1)
//! WARN eventhub::listeners::log: event failed seq=4 event_type=demo::Ping listener="log" error=...
//! ```

use std::fmt::Debug;
use std::marker::PhantomData;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::ListenerError;
use crate::events::{Envelope, Event, EventType};
use crate::listeners::Listener;

/// Logs every event of type `E`.
pub struct LogListener<E> {
    _event: PhantomData<fn(E)>,
}

impl<E> LogListener<E> {
    /// Construct a new [`LogListener`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            _event: PhantomData,
        }
    }
}

impl<E> Default for LogListener<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<E: Event + Debug> Listener for LogListener<E> {
    fn event_type(&self) -> EventType {
        EventType::of::<E>()
    }

    async fn handle(&self, env: &Envelope, _ctx: CancellationToken) -> Result<(), ListenerError> {
        match env.downcast_ref::<E>() {
            Some(payload) => {
                tracing::info!(
                    seq = env.seq,
                    event_type = %env.event_type(),
                    listener = self.name(),
                    ?payload,
                    "event"
                );
                Ok(())
            }
            None => Err(ListenerError::fail("payload type mismatch")),
        }
    }

    fn on_error(&self, env: &Envelope, error: &ListenerError) {
        tracing::warn!(
            seq = env.seq,
            event_type = %env.event_type(),
            listener = self.name(),
            error = %error,
            "event failed"
        );
    }

    fn name(&self) -> &str {
        "log"
    }
}
