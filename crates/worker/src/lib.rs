//! Block jobs execution engine.
//!
//! - [`store`]: the [`JobStore`](store::JobStore) accessor and its
//!   PostgreSQL and in-memory implementations.
//! - [`dependencies`]: prerequisite checks against fresh store reads.
//! - [`router`]: per-type dispatch to [`JobHandler`](router::JobHandler)s.
//! - [`handlers`]: the handlers for each registered job type.
//! - [`executor`]: the batch fan-out/fan-in executor.
//! - [`reconciler`]: the sweep for orphaned `PROCESSING` jobs.

pub mod config;
pub mod dependencies;
pub mod error;
pub mod executor;
pub mod handlers;
pub mod reconciler;
pub mod router;
pub mod store;

pub use error::EngineError;
pub use executor::BatchExecutor;
pub use reconciler::{ReconcileReport, Reconciler};
pub use router::{JobHandler, JobRouter};
pub use store::{JobStore, StoreError};
