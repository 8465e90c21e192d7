//! Ingress TLS management
//!
//! - tls: renewal decision and issuance for one TLS entry
//! - ingress: polling loop over annotated Ingresses
//! - secret_locks: per-Secret serialization for the polling loop

#[allow(clippy::module_inception)]
pub mod ingress;
pub mod secret_locks;
pub mod tls;

pub use ingress::{CycleSummary, IngressReconciler, IngressSource, KubeIngressSource};
pub use tls::{validate, IngressContext, ProcessOutcome, TlsProcessor};
