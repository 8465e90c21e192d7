//! Certificate authority clients
//!
//! The controller only needs one operation from a CA: turn a set of
//! hostnames into signed certificate material. The ACME exchange itself
//! (account, orders, challenges) lives behind this trait.

mod self_signed;

pub use self_signed::SelfSignedAuthority;

use crate::error::Result;
use async_trait::async_trait;
use tlsward_common::CertificateMaterial;

#[cfg(test)]
use mockall::automock;

/// Issues certificates for a set of hostnames
///
/// `hosts` holds 1..N lowercase hostnames. An error means issuance failed
/// (rate limit, validation failure, network); callers must not retry it
/// themselves, the next polling cycle does.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CertificateAuthority: Send + Sync {
    async fn obtain_certificate(&self, hosts: &[String]) -> Result<CertificateMaterial>;
}
