//! Self-signed certificate authority
//!
//! Mints a fresh key pair and a certificate whose SANs are exactly the
//! requested hostnames. Meant for development clusters and tests where no
//! ACME endpoint is reachable; browsers will not trust the result.

use super::CertificateAuthority;
use crate::error::{Error, Result};
use async_trait::async_trait;
use rcgen::{CertificateParams, DistinguishedName, DnType, DnValue, KeyPair};
use tlsward_common::CertificateMaterial;
use tracing::info;

/// Organization written into every self-signed subject
const ORGANIZATION: &str = "tlsward";

/// Self-signed issuer with a fixed certificate lifetime
#[derive(Debug, Clone)]
pub struct SelfSignedAuthority {
    validity_days: i64,
}

impl SelfSignedAuthority {
    pub fn new(validity_days: u32) -> Self {
        Self {
            validity_days: i64::from(validity_days),
        }
    }

    /// Issue material valid from `not_before` until `not_after`
    pub fn issue(
        &self,
        hosts: &[String],
        not_before: time::OffsetDateTime,
        not_after: time::OffsetDateTime,
    ) -> Result<CertificateMaterial> {
        let first = hosts
            .first()
            .ok_or_else(|| Error::Issuance("no hostnames requested".to_string()))?;

        let mut params = CertificateParams::new(hosts.to_vec())
            .map_err(|e| Error::Issuance(format!("invalid hostnames: {}", e)))?;

        let mut dn = DistinguishedName::new();
        dn.push(DnType::CommonName, DnValue::Utf8String(first.clone()));
        dn.push(
            DnType::OrganizationName,
            DnValue::Utf8String(ORGANIZATION.to_string()),
        );
        params.distinguished_name = dn;
        params.not_before = not_before;
        params.not_after = not_after;

        let key_pair = KeyPair::generate()
            .map_err(|e| Error::Issuance(format!("failed to generate key pair: {}", e)))?;
        let cert = params
            .self_signed(&key_pair)
            .map_err(|e| Error::Issuance(format!("failed to sign certificate: {}", e)))?;

        Ok(CertificateMaterial::from_pem(
            cert.pem().into_bytes(),
            key_pair.serialize_pem().into_bytes(),
        ))
    }
}

#[async_trait]
impl CertificateAuthority for SelfSignedAuthority {
    async fn obtain_certificate(&self, hosts: &[String]) -> Result<CertificateMaterial> {
        let now = time::OffsetDateTime::now_utc();
        let material = self.issue(hosts, now, now + time::Duration::days(self.validity_days))?;

        info!(
            hosts = %hosts.join(","),
            validity_days = self.validity_days,
            "issued self-signed certificate"
        );
        Ok(material)
    }
}
