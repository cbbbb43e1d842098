//! Infrastructure wiring: the composition root that owns every engine
//! singleton (registry, source, projection, sessions, passport, workers).

use std::sync::Arc;

use tracing::{info, warn};

use opsgate_auth::{AbilityRegistry, RecordStatus};
use opsgate_core::RoleId;
use opsgate_events::{AccessChangedEvent, EventBus};
use opsgate_infra::{
    AccessProjection, AccessSource, AccessWorker, AuditLog, InMemoryAccessSource, Passport,
    SessionStore, WorkerHandle,
};

use super::AppConfig;
use crate::catalog;

#[cfg(not(feature = "redis"))]
type ChangeBus = opsgate_events::InMemoryEventBus<AccessChangedEvent>;
#[cfg(feature = "redis")]
type ChangeBus = opsgate_infra::event_bus::RedisPubSubEventBus;

/// Everything the handlers need, built once at startup.
///
/// The projection's maps and the registry are owned here and exposed only
/// through `refresh()` and read accessors; nothing outside can mutate them.
pub struct AppServices {
    pub registry: Arc<AbilityRegistry>,
    pub source: Arc<InMemoryAccessSource>,
    pub projection: Arc<AccessProjection>,
    pub sessions: Arc<dyn SessionStore>,
    pub passport: Passport,
    pub audit: Arc<AuditLog>,
    bus: Arc<ChangeBus>,
    _workers: Vec<WorkerHandle>,
}

impl AppServices {
    /// Announce a role/user write to every instance (the writer included).
    ///
    /// Fire-and-forget: the write is already durable, so a missed
    /// notification only delays propagation until the next trigger.
    pub fn publish_change(&self, event: AccessChangedEvent) {
        if let Err(err) = self.bus.publish(event) {
            warn!(error = ?err, "failed to publish access change");
        }
    }
}

pub async fn build_services(config: &AppConfig) -> AppServices {
    let registry = Arc::new(AbilityRegistry::new());
    registry.register(catalog::console_abilities());

    let source = Arc::new(InMemoryAccessSource::new());

    if let Some(admin) = config.bootstrap_admin {
        source.put_role(
            RoleId::new(1),
            [catalog::CONSOLE_ADMIN].into_iter().collect(),
            RecordStatus::Enabled,
        );
        source.put_user(
            admin,
            [RoleId::new(1)].into_iter().collect(),
            RecordStatus::Enabled,
        );
        info!(user_id = admin.as_i64(), "bootstrap admin seeded");
    }

    let projection = Arc::new(AccessProjection::new(
        Arc::clone(&source) as Arc<dyn AccessSource>
    ));
    if let Err(err) = projection.refresh().await {
        warn!(error = %err, "initial projection load failed; starting stale");
    }

    let bus: Arc<ChangeBus> = build_bus();
    let sessions: Arc<dyn SessionStore> = build_sessions();
    let passport = Passport::new(Arc::clone(&sessions), config.passport);
    let audit = Arc::new(AuditLog::new(1024));

    // Exactly two bus consumers: the projection refresher and the audit
    // writer.
    let workers = vec![
        AccessWorker::spawn_refresher(
            Arc::clone(&bus),
            Arc::clone(&projection),
            tokio::runtime::Handle::current(),
        ),
        AccessWorker::spawn_audit_writer(Arc::clone(&bus), Arc::clone(&audit)),
    ];

    AppServices {
        registry,
        source,
        projection,
        sessions,
        passport,
        audit,
        bus,
        _workers: workers,
    }
}

#[cfg(not(feature = "redis"))]
fn build_bus() -> Arc<ChangeBus> {
    Arc::new(opsgate_events::InMemoryEventBus::new())
}

#[cfg(feature = "redis")]
fn build_bus() -> Arc<ChangeBus> {
    let url = redis_url();
    let channel = std::env::var("OPSGATE_CHANGE_CHANNEL")
        .unwrap_or_else(|_| "opsgate.access.changed".to_string());
    Arc::new(
        opsgate_infra::event_bus::RedisPubSubEventBus::new(&url, channel)
            .expect("failed to connect redis change bus"),
    )
}

#[cfg(not(feature = "redis"))]
fn build_sessions() -> Arc<dyn SessionStore> {
    Arc::new(opsgate_infra::InMemorySessionStore::new())
}

#[cfg(feature = "redis")]
fn build_sessions() -> Arc<dyn SessionStore> {
    Arc::new(
        opsgate_infra::RedisSessionStore::new(redis_url())
            .expect("failed to connect redis session store"),
    )
}

#[cfg(feature = "redis")]
fn redis_url() -> String {
    std::env::var("REDIS_URL").unwrap_or_else(|_| {
        warn!("REDIS_URL not set; using local default");
        "redis://127.0.0.1:6379".to_string()
    })
}
