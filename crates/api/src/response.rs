//! Shared response envelope types for API handlers.
//!
//! Responses use a `{ "data": ... }` envelope. The batch endpoint adds a
//! top-level `message`.

use serde::Serialize;

/// Standard `{ "data": T }` response envelope.
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}

/// `{ "message": ..., "data": T }` envelope returned by batch execution.
#[derive(Debug, Serialize)]
pub struct BatchResponse<T: Serialize> {
    pub message: &'static str,
    pub data: T,
}
