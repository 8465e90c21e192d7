//! Ingress TLS processing
//!
//! Decides whether the certificate behind one Ingress TLS entry must be
//! (re)issued, and if so issues it and stores it in the entry's Secret.
//!
//! Each call is stateless: nothing is cached between calls and nothing is
//! retried here. The polling loop calling [`TlsProcessor::process`] every
//! cycle is the retry mechanism.

use crate::apis::metrics::record_certificate_issuance;
use crate::apis::secret::{SecretStore, TlsSecret};
use crate::authority::CertificateAuthority;
use crate::error::{Error, Result};
use chrono::{DateTime, TimeDelta, Utc};
use k8s_openapi::api::networking::v1::{Ingress, IngressTLS};
use kube::ResourceExt;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tlsward_common::TlsConfig;
use tracing::{debug, info, info_span, warn, Instrument, Span};

/// Identity of the Ingress owning a TLS entry
///
/// Passed into every operation instead of a back-reference to the Ingress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngressContext {
    pub namespace: String,
    pub name: String,
}

impl IngressContext {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    pub fn from_ingress(ingress: &Ingress) -> Self {
        Self {
            namespace: ingress.namespace().unwrap_or_else(|| "default".to_string()),
            name: ingress.name_any(),
        }
    }

    /// Span every log line about this entry is emitted in
    pub fn span(&self) -> Span {
        info_span!(
            "ingress_tls",
            namespace = %self.namespace,
            ingress = %self.name,
            context = "ingress_tls"
        )
    }
}

impl fmt::Display for IngressContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Build a TLS entry from an Ingress `spec.tls[]` item
pub fn tls_config_from_ingress_tls(tls: &IngressTLS) -> TlsConfig {
    TlsConfig::new(
        tls.hosts.as_deref().unwrap_or_default(),
        tls.secret_name.clone().unwrap_or_default(),
    )
}

/// Reject TLS entries that cannot be processed
pub fn validate(tls: &TlsConfig) -> Result<()> {
    if tls.hosts().is_empty() {
        return Err(Error::Config("no hosts specified".to_string()));
    }

    if tls.secret_name().is_empty() {
        return Err(Error::Config("no secret name specified".to_string()));
    }
    Ok(())
}

/// Result of one successful [`TlsProcessor::process`] call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Stored certificate is still good, nothing was done
    Unchanged,
    /// A certificate was issued and stored
    Issued,
}

impl ProcessOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessOutcome::Unchanged => "unchanged",
            ProcessOutcome::Issued => "issued",
        }
    }
}

/// Renewal decision and issuance for Ingress TLS entries
#[derive(Clone)]
pub struct TlsProcessor {
    store: Arc<dyn SecretStore>,
    authority: Arc<dyn CertificateAuthority>,
}

impl TlsProcessor {
    pub fn new(store: Arc<dyn SecretStore>, authority: Arc<dyn CertificateAuthority>) -> Self {
        Self { store, authority }
    }

    /// Issue and store a certificate if [`needs_renewal`](Self::needs_renewal) says so
    pub async fn process(
        &self,
        ctx: &IngressContext,
        tls: &TlsConfig,
        minimum_validity: Duration,
    ) -> Result<ProcessOutcome> {
        async {
            if !self
                .evaluate(ctx, tls, minimum_validity, Utc::now())
                .await
            {
                info!("no cert request needed");
                return Ok(ProcessOutcome::Unchanged);
            }

            self.issue(ctx, tls).await?;
            Ok(ProcessOutcome::Issued)
        }
        .instrument(ctx.span())
        .await
    }

    /// Whether the entry needs a new certificate right now
    pub async fn needs_renewal(
        &self,
        ctx: &IngressContext,
        tls: &TlsConfig,
        minimum_validity: Duration,
    ) -> bool {
        self.needs_renewal_at(ctx, tls, minimum_validity, Utc::now())
            .await
    }

    /// [`needs_renewal`](Self::needs_renewal) evaluated against a fixed clock
    pub async fn needs_renewal_at(
        &self,
        ctx: &IngressContext,
        tls: &TlsConfig,
        minimum_validity: Duration,
        now: DateTime<Utc>,
    ) -> bool {
        self.evaluate(ctx, tls, minimum_validity, now)
            .instrument(ctx.span())
            .await
    }

    /// Issue a certificate for the entry's hosts and overwrite its Secret
    pub async fn request_cert(&self, ctx: &IngressContext, tls: &TlsConfig) -> Result<()> {
        self.issue(ctx, tls).instrument(ctx.span()).await
    }

    async fn evaluate(
        &self,
        ctx: &IngressContext,
        tls: &TlsConfig,
        minimum_validity: Duration,
        now: DateTime<Utc>,
    ) -> bool {
        if tls.hosts().is_empty() {
            info!("no host associated with ingress");
            return false;
        }

        let key = tls.secret_key(&ctx.namespace);
        let secret = match self.store.get(&key).await {
            Ok(Some(secret)) => secret,
            Ok(None) => {
                info!(secret = %key, "no cert associated with ingress");
                return true;
            }
            Err(e) => {
                warn!(secret = %key, error = %e, "error while reading secret, renewing");
                return true;
            }
        };

        debug!(secret = %key, managed = secret.is_enabled(), "found existing secret");

        if !secret.covers_domains(tls.hosts()) {
            info!(domains = %tls.hosts().join(","), "cert does not cover all domains");
            return true;
        }

        let expire_time = match secret.expiry_time() {
            Ok(expire_time) => expire_time,
            Err(e) => {
                warn!(error = %e, "error while reading expiry time");
                return true;
            }
        };

        let time_left = expire_time - now;
        let minimum = TimeDelta::from_std(minimum_validity).unwrap_or(TimeDelta::MAX);
        if time_left < minimum {
            info!(expire_time = %expire_time, "cert expires soon > renew");
            return true;
        }

        info!(
            expire_time = %expire_time,
            "cert expires in {:.1} days, no renewal needed",
            time_left.num_seconds() as f64 / 86400.0
        );
        false
    }

    async fn issue(&self, ctx: &IngressContext, tls: &TlsConfig) -> Result<()> {
        info!("requesting certificate for {}", tls.hosts().join(","));

        let material = match self.authority.obtain_certificate(tls.hosts()).await {
            Ok(material) => {
                record_certificate_issuance("success");
                material
            }
            Err(e) => {
                record_certificate_issuance("failure");
                return Err(e);
            }
        };

        let key = tls.secret_key(&ctx.namespace);
        self.store.write(&key, &TlsSecret::issued(material)).await?;

        info!(secret = %key, "stored certificate");
        Ok(())
    }
}
