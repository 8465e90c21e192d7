#![no_std]

//! tlsward common types
//!
//! Domain types shared by the controller and its tests: the TLS entry of an
//! Ingress, the address of its backing Secret, and the certificate material
//! a certificate authority hands back. No I/O happens here.

extern crate alloc;

use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::fmt;

/// Annotation that opts an Ingress into management and tags the Secrets we write
pub const ANNOTATION_TLS_ACME: &str = "kubernetes.io/tls-acme";

/// Kubernetes Secret type for TLS material
pub const SECRET_TYPE_TLS: &str = "kubernetes.io/tls";

/// Secret data key holding the PEM certificate chain
pub const TLS_CERT_KEY: &str = "tls.crt";

/// Secret data key holding the PEM private key
pub const TLS_PRIVATE_KEY_KEY: &str = "tls.key";

/// Lowercase and trim hostnames, keeping first-seen order and dropping repeats
pub fn normalize_hosts<I, S>(hosts: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut normalized: Vec<String> = Vec::new();
    for host in hosts {
        let host = host.as_ref().trim().to_lowercase();
        if host.is_empty() || normalized.contains(&host) {
            continue;
        }
        normalized.push(host);
    }
    normalized
}

/// TLS entry of an Ingress: the hostnames to cover and the Secret to store them in
///
/// Hostnames are normalized on construction, so every consumer sees the same
/// lowercase, ordered set.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TlsConfig {
    hosts: Vec<String>,
    secret_name: String,
}

impl TlsConfig {
    pub fn new<I, S>(hosts: I, secret_name: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            hosts: normalize_hosts(hosts),
            secret_name: secret_name.into().trim().to_string(),
        }
    }

    /// Lowercase hostnames in declaration order
    pub fn hosts(&self) -> &[String] {
        &self.hosts
    }

    pub fn secret_name(&self) -> &str {
        &self.secret_name
    }

    /// Address of the backing Secret inside the given namespace
    pub fn secret_key(&self, namespace: &str) -> SecretKey {
        SecretKey::new(namespace, self.secret_name.as_str())
    }
}

/// (namespace, name) address of a Secret
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SecretKey {
    pub namespace: String,
    pub name: String,
}

impl SecretKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Opaque key/value bytes returned by a certificate authority
///
/// Written verbatim into the Secret data. At minimum a successful issuance
/// carries [`TLS_CERT_KEY`] and [`TLS_PRIVATE_KEY_KEY`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CertificateMaterial(BTreeMap<String, Vec<u8>>);

impl CertificateMaterial {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Material with the conventional certificate and private key entries
    pub fn from_pem(cert_chain: impl Into<Vec<u8>>, private_key: impl Into<Vec<u8>>) -> Self {
        let mut material = Self::new();
        material.insert(TLS_CERT_KEY, cert_chain);
        material.insert(TLS_PRIVATE_KEY_KEY, private_key);
        material
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&[u8]> {
        self.0.get(key).map(Vec::as_slice)
    }

    pub fn certificate(&self) -> Option<&[u8]> {
        self.get(TLS_CERT_KEY)
    }

    pub fn private_key(&self) -> Option<&[u8]> {
        self.get(TLS_PRIVATE_KEY_KEY)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<u8>)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> BTreeMap<String, Vec<u8>> {
        self.0
    }
}

impl From<BTreeMap<String, Vec<u8>>> for CertificateMaterial {
    fn from(map: BTreeMap<String, Vec<u8>>) -> Self {
        Self(map)
    }
}

impl FromIterator<(String, Vec<u8>)> for CertificateMaterial {
    fn from_iter<T: IntoIterator<Item = (String, Vec<u8>)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
