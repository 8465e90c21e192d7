//! Configuration for the tlsward controller
//!
//! Defaults match a typical ACME setup: certificates are renewed when less
//! than 30 days of validity remain, and ingresses are checked every 8 hours.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Controller configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ControllerConfig {
    /// Renew when the stored certificate has less than this left (default: 720h)
    #[serde(default = "default_minimum_validity")]
    pub minimum_validity_secs: u64,

    /// Interval between ingress polling cycles (default: 8h)
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,

    /// Deadline for one TLS entry (issuance + persistence) (default: 10m)
    #[serde(default = "default_process_timeout")]
    pub process_timeout_secs: u64,

    /// TLS entries processed in parallel per cycle (default: 4)
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Restrict polling to one namespace (default: all namespaces)
    pub namespace: Option<String>,

    /// Certificate authority used for issuance
    #[serde(default)]
    pub issuer: IssuerKind,

    /// Lifetime of certificates minted by the self-signed issuer (default: 90 days)
    #[serde(default = "default_self_signed_validity_days")]
    pub self_signed_validity_days: u32,

    /// Dump controller metrics to the log after each cycle (default: false)
    #[serde(default)]
    pub metrics_enabled: bool,
}

/// Certificate authority backends
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum IssuerKind {
    /// Locally signed certificates, for development clusters
    #[default]
    SelfSigned,
}

impl FromStr for IssuerKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "self-signed" | "selfsigned" => Ok(IssuerKind::SelfSigned),
            other => Err(Error::Config(format!("unknown issuer '{}'", other))),
        }
    }
}

fn default_minimum_validity() -> u64 {
    30 * 24 * 3600
}

fn default_check_interval() -> u64 {
    8 * 3600
}

fn default_process_timeout() -> u64 {
    600
}

fn default_concurrency() -> usize {
    4
}

fn default_self_signed_validity_days() -> u32 {
    90
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            minimum_validity_secs: default_minimum_validity(),
            check_interval_secs: default_check_interval(),
            process_timeout_secs: default_process_timeout(),
            concurrency: default_concurrency(),
            namespace: None,
            issuer: IssuerKind::default(),
            self_signed_validity_days: default_self_signed_validity_days(),
            metrics_enabled: false,
        }
    }
}

impl ControllerConfig {
    /// Load configuration from `TLSWARD_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(val) = lookup("TLSWARD_MINIMUM_VALIDITY_SECS") {
            config.minimum_validity_secs = parse_var("TLSWARD_MINIMUM_VALIDITY_SECS", &val)?;
        }

        if let Some(val) = lookup("TLSWARD_CHECK_INTERVAL_SECS") {
            config.check_interval_secs = parse_var("TLSWARD_CHECK_INTERVAL_SECS", &val)?;
        }

        if let Some(val) = lookup("TLSWARD_PROCESS_TIMEOUT_SECS") {
            config.process_timeout_secs = parse_var("TLSWARD_PROCESS_TIMEOUT_SECS", &val)?;
        }

        if let Some(val) = lookup("TLSWARD_CONCURRENCY") {
            config.concurrency = parse_var("TLSWARD_CONCURRENCY", &val)?;
        }

        if let Some(val) = lookup("TLSWARD_NAMESPACE") {
            if !val.trim().is_empty() {
                config.namespace = Some(val.trim().to_string());
            }
        }

        if let Some(val) = lookup("TLSWARD_ISSUER") {
            config.issuer = val.parse()?;
        }

        if let Some(val) = lookup("TLSWARD_SELF_SIGNED_VALIDITY_DAYS") {
            config.self_signed_validity_days =
                parse_var("TLSWARD_SELF_SIGNED_VALIDITY_DAYS", &val)?;
        }

        if let Some(val) = lookup("TLSWARD_METRICS") {
            config.metrics_enabled = parse_var("TLSWARD_METRICS", &val)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject values the polling loop cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.check_interval_secs == 0 {
            return Err(Error::Config("check interval must be non-zero".to_string()));
        }
        if self.process_timeout_secs == 0 {
            return Err(Error::Config("process timeout must be non-zero".to_string()));
        }
        if self.concurrency == 0 {
            return Err(Error::Config("concurrency must be non-zero".to_string()));
        }
        if self.self_signed_validity_days == 0 {
            return Err(Error::Config(
                "self-signed validity must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn minimum_validity(&self) -> Duration {
        Duration::from_secs(self.minimum_validity_secs)
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    pub fn process_timeout(&self) -> Duration {
        Duration::from_secs(self.process_timeout_secs)
    }
}

fn parse_var<T>(name: &str, val: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    val.trim()
        .parse()
        .map_err(|e| Error::Config(format!("invalid {} '{}': {}", name, val, e)))
}
