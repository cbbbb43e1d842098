//! Event publishing/subscription abstraction (mechanics only).
//!
//! The bus is intentionally lightweight and makes minimal assumptions:
//!
//! - **Transport-agnostic**: in-memory channels for tests/dev, Redis pub/sub
//!   across backend instances.
//! - **At-least-once delivery**: messages may arrive more than once;
//!   consumers must be idempotent.
//! - **No ordering guarantees**: messages may arrive out of order.
//! - **No persistence**: the bus distributes "something changed" signals;
//!   the roles/users tables remain the source of truth, so a dropped
//!   message only delays convergence until the next trigger.

use std::sync::Arc;
use std::sync::mpsc::Receiver;
use std::time::Duration;

/// A subscription to a message stream.
///
/// Each subscription gets a copy of every message published to the bus
/// (broadcast semantics). Subscriptions are designed for single-threaded
/// consumption (one worker per subscription).
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: Receiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: Receiver<M>) -> Self {
        Self { receiver }
    }

    /// Block until the next message is available.
    pub fn recv(&self) -> Result<M, std::sync::mpsc::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive a message without blocking.
    pub fn try_recv(&self) -> Result<M, std::sync::mpsc::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Block for up to `timeout` waiting for a message.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<M, std::sync::mpsc::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }
}

/// Domain-agnostic pub/sub bus.
///
/// `publish()` is fire-and-forget from the writer's point of view; failures
/// are surfaced so the caller can log them, but the write that triggered the
/// event has already happened and the data tables remain authoritative.
///
/// Implementations must be safe to share across threads (`Send + Sync`);
/// multiple writers may publish concurrently.
pub trait EventBus<M>: Send + Sync {
    type Error: core::fmt::Debug + Send + Sync + 'static;

    fn publish(&self, message: M) -> Result<(), Self::Error>;

    fn subscribe(&self) -> Subscription<M>;
}

impl<M, B> EventBus<M> for Arc<B>
where
    B: EventBus<M> + ?Sized,
{
    type Error = B::Error;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        (**self).publish(message)
    }

    fn subscribe(&self) -> Subscription<M> {
        (**self).subscribe()
    }
}
