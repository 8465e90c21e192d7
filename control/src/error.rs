use std::time::Duration;
use thiserror::Error;

/// tlsward controller errors
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed TLS entry or controller configuration; never retried
    #[error("Configuration error: {0}")]
    Config(String),

    /// Certificate authority refused or failed to issue
    #[error("Certificate issuance failed: {0}")]
    Issuance(String),

    /// Secret store read/write failure or unreadable stored certificate
    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Kubernetes error: {0}")]
    Kubernetes(#[from] kube::Error),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),
}

impl Error {
    /// Short label used for metrics and log fields
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Config(_) => "config",
            Error::Issuance(_) => "issuance",
            Error::Persistence(_) => "persistence",
            Error::Kubernetes(_) => "kubernetes",
            Error::Timeout(_) => "timeout",
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
