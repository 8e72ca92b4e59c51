//! Domain model for block jobs.
//!
//! Holds the job record, its status and type enums, the append-only
//! lifecycle log, per-job batch outcomes, and the pure rules the engine
//! applies (dependency satisfaction, replacement validation, orphan
//! detection). This crate performs no I/O.

pub mod error;
pub mod job;
pub mod orphan;
pub mod outcome;
pub mod types;
