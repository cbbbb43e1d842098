//! `opsgate-events` — change-notification pub/sub.
//!
//! A write to the roles/users tables is announced on a bus; every backend
//! instance (the writer included) refreshes its permission projection on
//! receipt. The bus contract is deliberately weak (at-least-once, no
//! ordering) because the projection refresh is idempotent and
//! watermark-gated, so duplicate or reordered delivery is harmless.

pub mod bus;
pub mod event;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use event::{AccessChangedEvent, ChangedEntity, Event};
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
