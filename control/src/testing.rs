//! Test fixtures shared by unit tests

#![allow(clippy::expect_used)]

use crate::authority::SelfSignedAuthority;

/// Mint a self-signed (cert PEM, key PEM) pair that expires `days_valid` days from now
///
/// Negative values produce an already expired certificate.
pub(crate) fn issue_test_certificate(hosts: &[&str], days_valid: i64) -> (String, String) {
    let hosts: Vec<String> = hosts.iter().map(|h| h.to_string()).collect();
    let now = time::OffsetDateTime::now_utc();
    let not_after = now + time::Duration::days(days_valid);
    let not_before = not_after.min(now) - time::Duration::days(365);

    let material = SelfSignedAuthority::new(1)
        .issue(&hosts, not_before, not_after)
        .expect("Should issue test certificate");

    let cert = String::from_utf8(material.certificate().expect("tls.crt").to_vec())
        .expect("PEM is UTF-8");
    let key = String::from_utf8(material.private_key().expect("tls.key").to_vec())
        .expect("PEM is UTF-8");
    (cert, key)
}
