//! # Observability
//!
//! Reload outcome reporting: Prometheus metrics, Kubernetes Events, and the
//! optional outbound webhooks. All of it is best-effort; nothing here may
//! fail a reload that already happened.

pub mod events;
pub mod metrics;
pub mod webhook;
