// Contract tests for the shared TLS entry types
//
// The controller relies on these guarantees:
// - hostnames reach the certificate authority lowercase and in declared order
// - a TLS entry always addresses its Secret inside the Ingress namespace
// - certificate material keeps the conventional tls.crt / tls.key entries

use tlsward_common::{
    normalize_hosts, CertificateMaterial, SecretKey, TlsConfig, TLS_CERT_KEY, TLS_PRIVATE_KEY_KEY,
};

#[test]
fn test_hosts_are_lowercased_in_order() {
    let tls = TlsConfig::new(["WWW.Example.com", "api.EXAMPLE.com"], "tls-example");

    assert_eq!(tls.hosts(), ["www.example.com", "api.example.com"]);
    assert_eq!(tls.secret_name(), "tls-example");
}

#[test]
fn test_duplicate_hosts_after_normalization_are_dropped() {
    let hosts = normalize_hosts(["example.com", "EXAMPLE.COM", " example.com ", "b.example.com"]);

    assert_eq!(hosts, vec!["example.com", "b.example.com"]);
}

#[test]
fn test_blank_hosts_are_dropped() {
    let tls = TlsConfig::new(["", "   "], "tls-example");

    assert!(tls.hosts().is_empty(), "Blank hostnames should not count as hosts");
}

#[test]
fn test_secret_key_uses_ingress_namespace() {
    let tls = TlsConfig::new(["example.com"], "tls-example");
    let key = tls.secret_key("web");

    assert_eq!(key, SecretKey::new("web", "tls-example"));
    assert_eq!(key.to_string(), "web/tls-example");
}

#[test]
fn test_certificate_material_conventional_keys() {
    let material = CertificateMaterial::from_pem(b"CERT".to_vec(), b"KEY".to_vec());

    assert_eq!(material.len(), 2);
    assert_eq!(material.certificate(), Some(&b"CERT"[..]));
    assert_eq!(material.private_key(), Some(&b"KEY"[..]));
    assert_eq!(material.get(TLS_CERT_KEY), material.certificate());
    assert_eq!(material.get(TLS_PRIVATE_KEY_KEY), material.private_key());
}

#[test]
fn test_certificate_material_keeps_extra_entries() {
    let mut material = CertificateMaterial::from_pem(b"CERT".to_vec(), b"KEY".to_vec());
    material.insert("ca.crt", b"CA".to_vec());

    let keys: Vec<&String> = material.iter().map(|(k, _)| k).collect();
    assert_eq!(keys, ["ca.crt", "tls.crt", "tls.key"]);
}
