//! tlsward controller library
//!
//! Keeps the TLS Secrets of annotated Ingresses issued and renewed.

pub mod apis;
pub mod authority;
pub mod config;
pub mod error;
pub mod tls;

#[cfg(test)]
mod testing;

pub use error::{Error, Result};
