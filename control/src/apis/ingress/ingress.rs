//! Ingress polling loop
//!
//! Lists Ingress resources every check interval and processes each TLS
//! entry of the ones annotated `kubernetes.io/tls-acme: "true"`.
//!
//! A failing entry is logged and counted, then the cycle moves on: one
//! Ingress never blocks another. Failed entries are retried on the next
//! cycle, there is no backoff of our own.

use crate::apis::ingress::secret_locks::SecretLocks;
use crate::apis::ingress::tls::{
    tls_config_from_ingress_tls, validate, IngressContext, ProcessOutcome, TlsProcessor,
};
use crate::apis::metrics::{gather_controller_metrics, record_tls_process};
use crate::config::ControllerConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use futures::StreamExt;
use k8s_openapi::api::networking::v1::Ingress;
use kube::api::{Api, ListParams};
use kube::{Client, ResourceExt};
use std::sync::Arc;
use std::time::Instant;
use tlsward_common::{TlsConfig, ANNOTATION_TLS_ACME};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

#[cfg(test)]
use mockall::automock;

/// Whether an Ingress opted into certificate management
pub fn is_tls_acme_enabled(ingress: &Ingress) -> bool {
    ingress
        .annotations()
        .get(ANNOTATION_TLS_ACME)
        .is_some_and(|v| v == "true")
}

/// TLS entries declared in `spec.tls`
pub fn tls_entries(ingress: &Ingress) -> Vec<TlsConfig> {
    ingress
        .spec
        .as_ref()
        .and_then(|spec| spec.tls.as_ref())
        .map(|tls| tls.iter().map(tls_config_from_ingress_tls).collect())
        .unwrap_or_default()
}

/// Source of Ingress resources to poll
#[cfg_attr(test, automock)]
#[async_trait]
pub trait IngressSource: Send + Sync {
    async fn list_ingresses(&self) -> Result<Vec<Ingress>>;
}

/// Lists Ingresses from the Kubernetes API
pub struct KubeIngressSource {
    client: Client,
    /// `None` lists across all namespaces
    namespace: Option<String>,
}

impl KubeIngressSource {
    pub fn new(client: Client, namespace: Option<String>) -> Self {
        Self { client, namespace }
    }
}

#[async_trait]
impl IngressSource for KubeIngressSource {
    async fn list_ingresses(&self) -> Result<Vec<Ingress>> {
        let api: Api<Ingress> = match &self.namespace {
            Some(namespace) => Api::namespaced(self.client.clone(), namespace),
            None => Api::all(self.client.clone()),
        };
        let list = api.list(&ListParams::default()).await?;
        Ok(list.items)
    }
}

/// Per-cycle tally of TLS entry results
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub unchanged: usize,
    pub issued: usize,
    pub invalid: usize,
    pub failed: usize,
}

impl CycleSummary {
    pub fn total(&self) -> usize {
        self.unchanged + self.issued + self.invalid + self.failed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryStatus {
    Done(ProcessOutcome),
    Invalid,
    Failed,
}

/// Ingress TLS reconciler
pub struct IngressReconciler {
    source: Arc<dyn IngressSource>,
    processor: TlsProcessor,
    config: ControllerConfig,
    locks: SecretLocks,
}

impl IngressReconciler {
    pub fn new(
        source: Arc<dyn IngressSource>,
        processor: TlsProcessor,
        config: ControllerConfig,
    ) -> Self {
        Self {
            source,
            processor,
            config,
            locks: SecretLocks::new(),
        }
    }

    /// Process every managed TLS entry once
    ///
    /// Only a failure to list Ingresses is returned; per-entry failures are
    /// counted in the summary.
    pub async fn reconcile_once(&self) -> Result<CycleSummary> {
        let ingresses = self.source.list_ingresses().await?;

        let entries: Vec<(IngressContext, TlsConfig)> = ingresses
            .iter()
            .filter(|ingress| is_tls_acme_enabled(ingress))
            .flat_map(|ingress| {
                let ctx = IngressContext::from_ingress(ingress);
                tls_entries(ingress)
                    .into_iter()
                    .map(move |tls| (ctx.clone(), tls))
            })
            .collect();

        debug!(
            ingresses = ingresses.len(),
            entries = entries.len(),
            "Processing ingress TLS entries"
        );

        let statuses: Vec<EntryStatus> = futures::stream::iter(entries)
            .map(|(ctx, tls)| async move { self.process_entry(&ctx, &tls).await })
            .buffer_unordered(self.config.concurrency)
            .collect()
            .await;

        self.locks.prune();
        debug!(held = self.locks.len(), "Pruned secret locks");

        let mut summary = CycleSummary::default();
        for status in statuses {
            match status {
                EntryStatus::Done(ProcessOutcome::Unchanged) => summary.unchanged += 1,
                EntryStatus::Done(ProcessOutcome::Issued) => summary.issued += 1,
                EntryStatus::Invalid => summary.invalid += 1,
                EntryStatus::Failed => summary.failed += 1,
            }
        }
        Ok(summary)
    }

    async fn process_entry(&self, ctx: &IngressContext, tls: &TlsConfig) -> EntryStatus {
        let start = Instant::now();

        if let Err(e) = validate(tls) {
            warn!(ingress = %ctx, error = %e, "Skipping invalid TLS entry");
            record_tls_process(
                &ctx.namespace,
                &ctx.name,
                start.elapsed().as_secs_f64(),
                "invalid",
            );
            return EntryStatus::Invalid;
        }

        let _guard = self.locks.lock(&tls.secret_key(&ctx.namespace)).await;

        let timeout = self.config.process_timeout();
        let result = tokio::time::timeout(
            timeout,
            self.processor
                .process(ctx, tls, self.config.minimum_validity()),
        )
        .await
        .unwrap_or(Err(Error::Timeout(timeout)));

        let elapsed = start.elapsed().as_secs_f64();
        match result {
            Ok(outcome) => {
                record_tls_process(&ctx.namespace, &ctx.name, elapsed, outcome.as_str());
                EntryStatus::Done(outcome)
            }
            Err(e) => {
                error!(
                    ingress = %ctx,
                    secret = %tls.secret_name(),
                    error = %e,
                    "Failed to process TLS entry"
                );
                record_tls_process(&ctx.namespace, &ctx.name, elapsed, e.kind());
                EntryStatus::Failed
            }
        }
    }

    /// Poll until the task is dropped
    pub async fn run(self) -> Result<()> {
        let mut interval = tokio::time::interval(self.config.check_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            check_interval_secs = self.config.check_interval_secs,
            minimum_validity_secs = self.config.minimum_validity_secs,
            namespace = self.config.namespace.as_deref().unwrap_or("*"),
            "Starting ingress TLS controller"
        );

        loop {
            interval.tick().await;
            let start = Instant::now();

            match self.reconcile_once().await {
                Ok(summary) => info!(
                    entries = summary.total(),
                    issued = summary.issued,
                    unchanged = summary.unchanged,
                    invalid = summary.invalid,
                    failed = summary.failed,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Ingress TLS cycle complete"
                ),
                Err(e) => error!("Failed to list ingresses: {}", e),
            }

            if self.config.metrics_enabled {
                match gather_controller_metrics() {
                    Ok(metrics) => debug!("Controller metrics:\n{}", metrics),
                    Err(e) => warn!("Failed to gather metrics: {}", e),
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::apis::secret::MockSecretStore;
    use crate::authority::{CertificateAuthority, MockCertificateAuthority};
    use k8s_openapi::api::networking::v1::{IngressSpec, IngressTLS};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use std::collections::BTreeMap;
    use std::time::Duration;
    use tlsward_common::CertificateMaterial;

    /// Authority that never answers within a cycle
    struct StalledAuthority;

    #[async_trait]
    impl CertificateAuthority for StalledAuthority {
        async fn obtain_certificate(&self, _hosts: &[String]) -> Result<CertificateMaterial> {
            tokio::time::sleep(Duration::from_secs(24 * 3600)).await;
            Ok(CertificateMaterial::from_pem(b"X".to_vec(), b"Y".to_vec()))
        }
    }

    fn ingress(name: &str, enabled: bool, tls: Vec<(Vec<&str>, Option<&str>)>) -> Ingress {
        let mut annotations = BTreeMap::new();
        if enabled {
            annotations.insert(ANNOTATION_TLS_ACME.to_string(), "true".to_string());
        }

        Ingress {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("default".to_string()),
                annotations: Some(annotations),
                ..Default::default()
            },
            spec: Some(IngressSpec {
                tls: Some(
                    tls.into_iter()
                        .map(|(hosts, secret)| IngressTLS {
                            hosts: Some(hosts.into_iter().map(String::from).collect()),
                            secret_name: secret.map(String::from),
                        })
                        .collect(),
                ),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn source_returning(ingresses: Vec<Ingress>) -> Arc<MockIngressSource> {
        let mut source = MockIngressSource::new();
        source
            .expect_list_ingresses()
            .returning(move || Ok(ingresses.clone()));
        Arc::new(source)
    }

    fn reconciler(
        source: Arc<dyn IngressSource>,
        store: MockSecretStore,
        authority: MockCertificateAuthority,
    ) -> IngressReconciler {
        let processor = TlsProcessor::new(Arc::new(store), Arc::new(authority));
        IngressReconciler::new(source, processor, ControllerConfig::default())
    }

    #[test]
    fn test_annotation_opt_in() {
        assert!(is_tls_acme_enabled(&ingress("web", true, vec![])));
        assert!(!is_tls_acme_enabled(&ingress("web", false, vec![])));

        let mut other_value = ingress("web", false, vec![]);
        other_value
            .annotations_mut()
            .insert(ANNOTATION_TLS_ACME.to_string(), "yes".to_string());
        assert!(!is_tls_acme_enabled(&other_value));
    }

    #[test]
    fn test_tls_entries_from_spec() {
        let ing = ingress(
            "web",
            true,
            vec![
                (vec!["Example.com"], Some("tls-a")),
                (vec!["b.example.com", "c.example.com"], Some("tls-b")),
            ],
        );

        let entries = tls_entries(&ing);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].hosts(), ["example.com"]);
        assert_eq!(entries[1].secret_name(), "tls-b");
    }

    #[test]
    fn test_ingress_without_spec_has_no_entries() {
        let ing = Ingress::default();
        assert!(tls_entries(&ing).is_empty());
    }

    #[tokio::test]
    async fn test_cycle_skips_unannotated_ingresses() {
        let source = source_returning(vec![ingress(
            "web",
            false,
            vec![(vec!["example.com"], Some("tls-example"))],
        )]);

        let mut store = MockSecretStore::new();
        store.expect_get().never();
        let mut authority = MockCertificateAuthority::new();
        authority.expect_obtain_certificate().never();

        let summary = reconciler(source, store, authority)
            .reconcile_once()
            .await
            .expect("Cycle should succeed");

        assert_eq!(summary, CycleSummary::default());
    }

    #[tokio::test]
    async fn test_cycle_isolates_failures() {
        let source = source_returning(vec![
            ingress("good", true, vec![(vec!["example.com"], Some("tls-good"))]),
            ingress("bad", true, vec![(vec!["fail.example.com"], Some("tls-bad"))]),
            ingress("broken", true, vec![(vec!["broken.example.com"], None)]),
        ]);

        let mut store = MockSecretStore::new();
        store.expect_get().returning(|_| Ok(None));
        store
            .expect_write()
            .withf(|key, _| key.name == "tls-good")
            .times(1)
            .returning(|_, _| Ok(()));

        let mut authority = MockCertificateAuthority::new();
        authority
            .expect_obtain_certificate()
            .times(2)
            .returning(|hosts| {
                if hosts[0].starts_with("fail") {
                    Err(Error::Issuance("validation failed".to_string()))
                } else {
                    Ok(CertificateMaterial::from_pem(b"X".to_vec(), b"Y".to_vec()))
                }
            });

        let summary = reconciler(source, store, authority)
            .reconcile_once()
            .await
            .expect("Cycle should succeed despite entry failures");

        assert_eq!(
            summary,
            CycleSummary {
                unchanged: 0,
                issued: 1,
                invalid: 1,
                failed: 1,
            }
        );
    }

    #[tokio::test]
    async fn test_cycle_propagates_listing_error() {
        let mut source = MockIngressSource::new();
        source
            .expect_list_ingresses()
            .returning(|| Err(Error::Persistence("apiserver unavailable".to_string())));

        let result = reconciler(
            Arc::new(source),
            MockSecretStore::new(),
            MockCertificateAuthority::new(),
        )
        .reconcile_once()
        .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_entries_sharing_a_secret_are_both_processed() {
        let source = source_returning(vec![
            ingress("one", true, vec![(vec!["example.com"], Some("tls-shared"))]),
            ingress("two", true, vec![(vec!["example.com"], Some("tls-shared"))]),
        ]);

        let mut store = MockSecretStore::new();
        store.expect_get().returning(|_| Ok(None));
        store.expect_write().times(2).returning(|_, _| Ok(()));

        let mut authority = MockCertificateAuthority::new();
        authority
            .expect_obtain_certificate()
            .times(2)
            .returning(|_| Ok(CertificateMaterial::from_pem(b"X".to_vec(), b"Y".to_vec())));

        let summary = reconciler(source, store, authority)
            .reconcile_once()
            .await
            .expect("Cycle should succeed");

        assert_eq!(summary.issued, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_issuance_times_out() {
        let source = source_returning(vec![ingress(
            "web",
            true,
            vec![(vec!["example.com"], Some("tls-example"))],
        )]);

        let mut store = MockSecretStore::new();
        store.expect_get().returning(|_| Ok(None));
        store.expect_write().never();

        let config = ControllerConfig {
            process_timeout_secs: 5,
            ..ControllerConfig::default()
        };
        let processor = TlsProcessor::new(Arc::new(store), Arc::new(StalledAuthority));
        let reconciler = IngressReconciler::new(source, processor, config);

        let start = tokio::time::Instant::now();
        let summary = reconciler
            .reconcile_once()
            .await
            .expect("Cycle should succeed despite the timeout");

        assert_eq!(
            summary,
            CycleSummary {
                failed: 1,
                ..CycleSummary::default()
            }
        );
        let elapsed = start.elapsed();
        assert!(
            elapsed >= Duration::from_secs(5) && elapsed < Duration::from_secs(60),
            "Entry should be abandoned at the deadline, took {:?}",
            elapsed
        );
        assert!(reconciler.locks.is_empty(), "Secret lock should be released");
    }
}
