//! HTTP health check API.
//!
//! Only served when `HEALTH_BIND_ADDR` is set, for use as a Kubernetes liveness or readiness
//! probe.
//!
//! # API Endpoints
//!
//! ## `/healthcheck` (GET)
//!
//!   Returns HTTP 200 (OK) and the JSON body `{"ok":"healthy"}` when the service is operational.

mod routes;
pub mod server;

pub use server::serve;
