//! Published events and the queue that holds them.
//!
//! This module groups the event **data model** and the **observable queue**
//! sitting between publishers and the dispatcher.
//!
//! ## Contents
//! - [`Event`], [`EventType`], [`Envelope`] what is published and how it is routed
//! - [`ObservableQueue`], [`QueueChange`] thread-safe FIFO with add/remove notifications
//!
//! ## Quick reference
//! - **Producers**: `EventHub::publish` (any thread).
//! - **Consumer**: the hub's dispatcher task (exactly one per hub).
//! - **Observers**: anyone holding `EventHub::subscribe_queue()`.

mod event;
mod queue;

pub use event::{Envelope, Event, EventType};
pub use queue::{ObservableQueue, QueueChange, QueueClosed};
