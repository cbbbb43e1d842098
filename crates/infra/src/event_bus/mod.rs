//! Infrastructure event bus implementations.
//!
//! The pub/sub abstraction lives in `opsgate-events` as pure mechanics.
//! This module provides the infrastructure-backed implementation (Redis)
//! used to fan change notifications out across backend instances.

#[cfg(feature = "redis")]
pub mod redis_pubsub;

#[cfg(feature = "redis")]
pub use redis_pubsub::{RedisBusError, RedisPubSubEventBus};
