//! # Example: basic
//!
//! One hub, three listeners, two event types, one flaky listener.
//!
//! Demonstrates how to:
//! - Register listeners with [`HubBuilder`] (a typed struct, a closure, the built-in [`LogListener`]).
//! - Publish from several threads without waiting for delivery.
//! - Observe failures through `on_error` while the hub keeps running.
//! - Shut down with the default drain policy.
//!
//! ## Flow
//! ```text
//! threads ──► hub.publish(Deposit | Withdrawal)
//!     └─► Dispatcher (one event at a time)
//!          ├─► LogListener<Deposit>   → tracing INFO
//!          ├─► Ledger                 → Deposit only
//!          └─► overdraft guard        → Withdrawal only, fails above the limit
//! hub.shutdown() ──► drain queue ──► exit
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example basic --features logging
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use eventhub::{
    Envelope, EventType, HubBuilder, HubConfig, Listener, ListenerError, ListenerFn, ListenerRef,
    LogListener,
};
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
struct Deposit {
    account: u32,
    amount: u64,
}

#[derive(Debug)]
struct Withdrawal {
    account: u32,
    amount: u64,
}

#[derive(Default)]
struct Ledger {
    total: AtomicU64,
}

#[async_trait]
impl Listener for Ledger {
    fn event_type(&self) -> EventType {
        EventType::of::<Deposit>()
    }

    async fn handle(&self, env: &Envelope, _ctx: CancellationToken) -> Result<(), ListenerError> {
        let deposit = env
            .downcast_ref::<Deposit>()
            .ok_or_else(|| ListenerError::fail("not a deposit"))?;
        self.total.fetch_add(deposit.amount, Ordering::Relaxed);
        println!("[ledger] account={} +{}", deposit.account, deposit.amount);
        Ok(())
    }

    fn on_complete(&self, env: &Envelope) {
        println!("[ledger] booked seq={}", env.seq);
    }

    fn name(&self) -> &str {
        "ledger"
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,eventhub=debug".into()),
        )
        .init();

    let ledger = Arc::new(Ledger::default());
    let guard: ListenerRef = ListenerFn::arc(
        "overdraft-guard",
        |w: Arc<Withdrawal>, _ctx: CancellationToken| async move {
            if w.amount > 500 {
                return Err(ListenerError::fail(format!(
                    "account {} overdrawn by {}",
                    w.account,
                    w.amount - 500
                )));
            }
            println!("[guard] withdrawal ok account={} amount={}", w.account, w.amount);
            Ok(())
        },
    );

    let hub = HubBuilder::new(HubConfig::default())
        .with_listener(Arc::new(LogListener::<Deposit>::new()))
        .with_listener(ledger.clone())
        .with_listener(guard)
        .build()?;

    let producers: Vec<_> = (0..3u32)
        .map(|account| {
            let hub = hub.clone();
            std::thread::spawn(move || -> Result<(), eventhub::HubError> {
                for i in 1..=3u64 {
                    hub.publish(Deposit { account, amount: i * 100 })?;
                    hub.publish(Withdrawal { account, amount: i * 250 })?;
                }
                Ok(())
            })
        })
        .collect();
    for p in producers {
        p.join().expect("producer thread panicked")?;
    }

    hub.shutdown().await?;
    println!("[main] ledger total={}", ledger.total.load(Ordering::Relaxed));
    Ok(())
}
