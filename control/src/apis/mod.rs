//! Kubernetes API integrations
//!
//! Ingress polling, TLS Secret storage and controller metrics.

pub mod ingress;
pub mod metrics;
pub mod secret;
