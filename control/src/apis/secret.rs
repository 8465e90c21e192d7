//! TLS Secret storage
//!
//! Reads and writes the Secrets backing Ingress TLS entries.
//!
//! ## Secret Format
//!
//! Secrets written by the controller look like:
//! ```yaml
//! apiVersion: v1
//! kind: Secret
//! metadata:
//!   name: tls-example
//!   annotations:
//!     kubernetes.io/tls-acme: "true"
//! type: kubernetes.io/tls
//! data:
//!   tls.crt: <base64-encoded-cert>
//!   tls.key: <base64-encoded-key>
//! ```

use crate::error::{Error, Result};
use crate::tls::CertificateInfo;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use kube::api::{Api, PostParams};
use kube::Client;
use std::collections::BTreeMap;
use tlsward_common::{CertificateMaterial, SecretKey, ANNOTATION_TLS_ACME, SECRET_TYPE_TLS};
use tracing::{debug, info};

#[cfg(test)]
use mockall::automock;

/// Contents of a TLS Secret as far as the controller is concerned
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsSecret {
    pub annotations: BTreeMap<String, String>,
    pub secret_type: Option<String>,
    pub data: CertificateMaterial,
}

impl TlsSecret {
    /// Secret contents for freshly issued material
    ///
    /// Annotations are replaced wholesale by the enabled marker.
    pub fn issued(material: CertificateMaterial) -> Self {
        let mut annotations = BTreeMap::new();
        annotations.insert(ANNOTATION_TLS_ACME.to_string(), "true".to_string());

        Self {
            annotations,
            secret_type: Some(SECRET_TYPE_TLS.to_string()),
            data: material,
        }
    }

    /// Whether the Secret carries the `kubernetes.io/tls-acme: "true"` marker
    pub fn is_enabled(&self) -> bool {
        self.annotations
            .get(ANNOTATION_TLS_ACME)
            .is_some_and(|v| v == "true")
    }

    /// Inspect the stored leaf certificate
    pub fn certificate_info(&self) -> Result<CertificateInfo> {
        let cert_pem = self
            .data
            .certificate()
            .ok_or_else(|| Error::Persistence("secret has no tls.crt".to_string()))?;
        CertificateInfo::from_pem(cert_pem)
    }

    /// True when the stored certificate names every host
    ///
    /// A missing or unreadable certificate covers nothing.
    pub fn covers_domains(&self, hosts: &[String]) -> bool {
        match self.certificate_info() {
            Ok(info) => info.covers(hosts),
            Err(e) => {
                debug!(error = %e, "stored certificate unreadable, treating as uncovered");
                false
            }
        }
    }

    /// `notAfter` of the stored certificate
    pub fn expiry_time(&self) -> Result<DateTime<Utc>> {
        Ok(self.certificate_info()?.not_after)
    }

    pub fn from_secret(secret: &Secret) -> Self {
        let data = secret
            .data
            .as_ref()
            .map(|data| {
                data.iter()
                    .map(|(k, v)| (k.clone(), v.0.clone()))
                    .collect::<CertificateMaterial>()
            })
            .unwrap_or_default();

        Self {
            annotations: secret.metadata.annotations.clone().unwrap_or_default(),
            secret_type: secret.type_.clone(),
            data,
        }
    }

    /// Overwrite annotations, type and data of `secret` with ours
    pub fn apply_to(&self, secret: &mut Secret) {
        secret.metadata.annotations = Some(self.annotations.clone());
        secret.type_ = self.secret_type.clone();
        secret.data = Some(
            self.data
                .iter()
                .map(|(k, v)| (k.clone(), ByteString(v.clone())))
                .collect(),
        );
    }
}

/// Secret storage keyed by (namespace, name)
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// `Ok(None)` when the Secret does not exist
    async fn get(&self, key: &SecretKey) -> Result<Option<TlsSecret>>;

    /// Create or overwrite the Secret
    async fn write(&self, key: &SecretKey, secret: &TlsSecret) -> Result<()>;
}

/// Secret store backed by the Kubernetes API
pub struct KubeSecretStore {
    client: Client,
}

impl KubeSecretStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, namespace: &str) -> Api<Secret> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl SecretStore for KubeSecretStore {
    async fn get(&self, key: &SecretKey) -> Result<Option<TlsSecret>> {
        let secret = self.api(&key.namespace).get_opt(&key.name).await?;
        Ok(secret.as_ref().map(TlsSecret::from_secret))
    }

    async fn write(&self, key: &SecretKey, tls_secret: &TlsSecret) -> Result<()> {
        let api = self.api(&key.namespace);

        match api.get_opt(&key.name).await? {
            Some(mut existing) => {
                tls_secret.apply_to(&mut existing);
                api.replace(&key.name, &PostParams::default(), &existing)
                    .await?;
                info!(secret = %key, "updated TLS secret");
            }
            None => {
                let mut secret = Secret {
                    metadata: ObjectMeta {
                        name: Some(key.name.clone()),
                        namespace: Some(key.namespace.clone()),
                        ..Default::default()
                    },
                    ..Default::default()
                };
                tls_secret.apply_to(&mut secret);
                api.create(&PostParams::default(), &secret).await?;
                info!(secret = %key, "created TLS secret");
            }
        }

        Ok(())
    }
}
