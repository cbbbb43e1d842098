//! Generic bus-consumer worker loop, plus the two concrete consumers the
//! engine wires up: the projection refresher and the audit writer.

use std::sync::Arc;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use tracing::warn;

use opsgate_events::{AccessChangedEvent, EventBus, Subscription};

use crate::audit::AuditLog;
use crate::projection::AccessProjection;

/// Handle to control and join a background worker.
#[derive(Debug)]
pub struct WorkerHandle {
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
}

impl WorkerHandle {
    /// Request graceful shutdown and wait for the worker to stop.
    pub fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
    }
}

/// Bus-consumer worker loop.
///
/// - Subscribes to the change-notification bus
/// - Applies an idempotent handler for each message
/// - Supports graceful shutdown
#[derive(Debug)]
pub struct AccessWorker;

impl AccessWorker {
    /// Spawn a worker thread that processes messages from a bus subscription.
    ///
    /// `handler` must be idempotent (at-least-once delivery safe). Handler
    /// failures are logged and the loop continues; transient failures are
    /// retried naturally by the next message.
    pub fn spawn<M, B, H, E>(name: &'static str, bus: B, mut handler: H) -> WorkerHandle
    where
        M: Send + 'static,
        B: EventBus<M> + Send + Sync + 'static,
        H: FnMut(M) -> Result<(), E> + Send + 'static,
        E: core::fmt::Debug + Send + 'static,
    {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let sub: Subscription<M> = bus.subscribe();

        let join = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || worker_loop(name, sub, shutdown_rx, &mut handler))
            .expect("failed to spawn access worker thread");

        WorkerHandle {
            shutdown: shutdown_tx,
            join: Some(join),
        }
    }

    /// Consumer 1: refresh the permission projection on every change event.
    ///
    /// The payload is ignored on purpose: `refresh()` re-fetches with its
    /// own watermark, which is what makes duplicates and reordering safe.
    pub fn spawn_refresher<B>(
        bus: B,
        projection: Arc<AccessProjection>,
        runtime: tokio::runtime::Handle,
    ) -> WorkerHandle
    where
        B: EventBus<AccessChangedEvent> + Send + Sync + 'static,
    {
        AccessWorker::spawn("access-projection-refresher", bus, move |_event| {
            runtime
                .block_on(projection.refresh())
                .map(|_outcome| ())
        })
    }

    /// Consumer 2: record every change event in the audit log.
    pub fn spawn_audit_writer<B>(bus: B, audit: Arc<AuditLog>) -> WorkerHandle
    where
        B: EventBus<AccessChangedEvent> + Send + Sync + 'static,
    {
        AccessWorker::spawn(
            "access-audit-writer",
            bus,
            move |event: AccessChangedEvent| {
                audit.record(&event);
                Ok::<(), std::convert::Infallible>(())
            },
        )
    }
}

fn worker_loop<M, H, E>(
    name: &'static str,
    sub: Subscription<M>,
    shutdown_rx: mpsc::Receiver<()>,
    handler: &mut H,
) where
    H: FnMut(M) -> Result<(), E>,
    E: core::fmt::Debug,
{
    let tick = Duration::from_millis(250);

    loop {
        // Shutdown check (non-blocking)
        if shutdown_rx.try_recv().is_ok() {
            break;
        }

        match sub.recv_timeout(tick) {
            Ok(msg) => {
                if let Err(err) = handler(msg) {
                    warn!(worker = name, error = ?err, "access worker handler failed");
                }
            }
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => continue,
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::InMemoryAccessSource;
    use chrono::Utc;
    use opsgate_auth::RecordStatus;
    use opsgate_core::{OperateId, RoleId, UserId};
    use opsgate_events::InMemoryEventBus;
    use std::collections::HashSet;

    #[test]
    fn audit_writer_consumes_published_events() {
        let bus = Arc::new(InMemoryEventBus::<AccessChangedEvent>::new());
        let audit = Arc::new(AuditLog::new(16));
        let worker = AccessWorker::spawn_audit_writer(Arc::clone(&bus), Arc::clone(&audit));

        bus.publish(AccessChangedEvent::role(1, OperateId::new(1), Utc::now()))
            .unwrap();

        // The worker thread drains on its own clock.
        for _ in 0..100 {
            if !audit.is_empty() {
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }

        worker.shutdown();
        assert_eq!(audit.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn refresher_converges_the_projection() {
        let bus = Arc::new(InMemoryEventBus::<AccessChangedEvent>::new());
        let source = Arc::new(InMemoryAccessSource::new());
        let projection = Arc::new(AccessProjection::new(
            Arc::clone(&source) as Arc<dyn crate::source::AccessSource>
        ));

        let worker = AccessWorker::spawn_refresher(
            Arc::clone(&bus),
            Arc::clone(&projection),
            tokio::runtime::Handle::current(),
        );

        let mut abilities = HashSet::new();
        abilities.insert(opsgate_core::AbilityId::new(100));
        source.put_role(RoleId::new(1), abilities, RecordStatus::Enabled);
        let mut roles = HashSet::new();
        roles.insert(RoleId::new(1));
        let operate_id = source.put_user(UserId::new(10), roles, RecordStatus::Enabled);

        bus.publish(AccessChangedEvent::user(10, operate_id, Utc::now()))
            .unwrap();

        for _ in 0..200 {
            if projection.effective_abilities(UserId::new(10)).is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        worker.shutdown();
        assert_eq!(
            projection
                .effective_abilities(UserId::new(10))
                .map(|s| s.len()),
            Some(1)
        );
    }
}
