//! Background bus consumers.

pub mod access_worker;

pub use access_worker::{AccessWorker, WorkerHandle};
