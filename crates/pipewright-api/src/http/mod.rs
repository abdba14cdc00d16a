//! HTTP surface for the workflow engine.
//!
//! Axum router exposing `POST /execute` and `GET /health` with CORS and
//! request tracing.

pub mod error;
pub mod handlers;
pub mod router;
