//! Infrastructure layer: data sources, session store, projection state,
//! workers, and Redis adapters.

pub mod audit;
pub mod event_bus;
pub mod passport;
pub mod postgres;
pub mod projection;
#[cfg(feature = "redis")]
pub mod redis_session;
pub mod session;
pub mod source;
pub mod workers;

pub use audit::{AuditEntry, AuditLog};
pub use passport::{Passport, PassportConfig, PassportError};
pub use postgres::PostgresAccessSource;
pub use projection::{AccessProjection, RefreshError, RefreshOutcome};
#[cfg(feature = "redis")]
pub use redis_session::RedisSessionStore;
pub use session::{
    InMemorySessionStore, SessionRecord, SessionStore, SessionStoreError, session_key,
};
pub use source::{AccessSource, InMemoryAccessSource, OperateSequence, SourceError};
pub use workers::{AccessWorker, WorkerHandle};
