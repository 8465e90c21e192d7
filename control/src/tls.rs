//! TLS certificate inspection
//!
//! Reads what the renewal decision needs out of stored PEM material:
//! - the DNS names a certificate covers
//! - its `notAfter` timestamp
//!
//! PEM framing is handled by rustls-pemfile, X.509 decoding by x509-parser.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use rustls::pki_types::CertificateDer;
use rustls_pemfile::certs;
use std::io::BufReader;
use x509_parser::extensions::GeneralName;
use x509_parser::prelude::*;

/// Decode the first (leaf) certificate of a PEM chain
fn leaf_der(cert_pem: &[u8]) -> Result<CertificateDer<'static>> {
    let mut cert_reader = BufReader::new(cert_pem);
    let leaf = certs(&mut cert_reader)
        .next()
        .ok_or_else(|| Error::Persistence("no certificate found in PEM data".to_string()))?
        .map_err(|e| Error::Persistence(format!("invalid certificate PEM: {}", e)));
    leaf
}

/// Coverage and validity of a leaf certificate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateInfo {
    /// Lowercase DNS names from the SAN extension, or the subject CN without one
    pub dns_names: Vec<String>,
    pub not_after: DateTime<Utc>,
}

impl CertificateInfo {
    pub fn from_pem(cert_pem: &[u8]) -> Result<Self> {
        let der = leaf_der(cert_pem)?;
        Self::from_der(der.as_ref())
    }

    pub fn from_der(der: &[u8]) -> Result<Self> {
        let (_, cert) = X509Certificate::from_der(der)
            .map_err(|e| Error::Persistence(format!("failed to parse certificate: {}", e)))?;

        let not_after = DateTime::from_timestamp(cert.validity().not_after.timestamp(), 0)
            .ok_or_else(|| Error::Persistence("certificate notAfter out of range".to_string()))?;

        let san = cert
            .subject_alternative_name()
            .map_err(|e| Error::Persistence(format!("invalid SAN extension: {}", e)))?;

        let dns_names = match san {
            Some(san) => san
                .value
                .general_names
                .iter()
                .filter_map(|name| match name {
                    GeneralName::DNSName(dns) => Some(dns.to_ascii_lowercase()),
                    _ => None,
                })
                .collect(),
            None => cert
                .subject()
                .iter_common_name()
                .next()
                .and_then(|cn| cn.as_str().ok())
                .map(|cn| vec![cn.to_ascii_lowercase()])
                .unwrap_or_default(),
        };

        Ok(Self {
            dns_names,
            not_after,
        })
    }

    /// True when every host is listed verbatim (case-insensitive) in the certificate
    pub fn covers(&self, hosts: &[String]) -> bool {
        hosts.iter().all(|host| {
            self.dns_names
                .iter()
                .any(|name| name.eq_ignore_ascii_case(host))
        })
    }
}
