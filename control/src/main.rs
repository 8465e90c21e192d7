use anyhow::{Context, Result};
use control::apis::ingress::{IngressReconciler, KubeIngressSource, TlsProcessor};
use control::apis::secret::KubeSecretStore;
use control::authority::{CertificateAuthority, SelfSignedAuthority};
use control::config::{ControllerConfig, IssuerKind};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// tlsward - Ingress TLS certificate controller
#[tokio::main]
async fn main() -> Result<()> {
    // Initialize rustls crypto provider (needed for Kubernetes TLS client)
    rustls::crypto::ring::default_provider()
        .install_default()
        .ok(); // Ignore error if already installed

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ControllerConfig::from_env().context("Invalid configuration")?;

    info!("tlsward: Ingress TLS certificate controller");
    info!("   Minimum validity: {}s", config.minimum_validity_secs);
    info!("   Check interval: {}s", config.check_interval_secs);
    info!("   Issuer: {:?}", config.issuer);

    let client = kube::Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    let authority: Arc<dyn CertificateAuthority> = match config.issuer {
        IssuerKind::SelfSigned => {
            Arc::new(SelfSignedAuthority::new(config.self_signed_validity_days))
        }
    };
    let store = Arc::new(KubeSecretStore::new(client.clone()));
    let source = Arc::new(KubeIngressSource::new(client, config.namespace.clone()));

    let reconciler =
        IngressReconciler::new(source, TlsProcessor::new(store, authority), config);

    tokio::select! {
        result = reconciler.run() => {
            if let Err(e) = result {
                error!("Controller error: {}", e);
            }
        }
        _ = signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
    }

    Ok(())
}
