//! Certificate expectations.

use serde::{Deserialize, Serialize};

use super::{Certificate, PublicKeyAlgorithm};
use crate::errors::AssertionError;

/// A structural property a decoded certificate must have
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "property", content = "value")]
pub enum Expectation {
    PublicKeyAlgorithm(PublicKeyAlgorithm),
    /// Dotted OID, e.g. `1.2.840.10045.4.3.2` for ECDSA with SHA-256
    SignatureAlgorithm(String),
    /// A URI SAN, typically the SPIFFE identity of the workload
    UriSan(String),
    DnsSan(String),
}

impl Expectation {
    /// Human-readable property name used in failure reports
    pub fn property(&self) -> &'static str {
        match self {
            Expectation::PublicKeyAlgorithm(_) => "public key algorithm",
            Expectation::SignatureAlgorithm(_) => "signature algorithm",
            Expectation::UriSan(_) => "URI SAN",
            Expectation::DnsSan(_) => "DNS SAN",
        }
    }
}

fn contains_or_report(
    property: &str,
    expected: &str,
    actual: &[String],
) -> Result<(), AssertionError> {
    if actual.iter().any(|v| v == expected) {
        return Ok(());
    }
    let actual = if actual.is_empty() { "none".to_string() } else { actual.join(", ") };
    Err(AssertionError::new(property, expected, actual))
}

/// Check a single expectation against a decoded certificate.
pub fn assert(cert: &Certificate, expectation: &Expectation) -> Result<(), AssertionError> {
    let property = expectation.property();
    match expectation {
        Expectation::PublicKeyAlgorithm(expected) => {
            if &cert.public_key_algorithm == expected {
                Ok(())
            } else {
                Err(AssertionError::new(
                    property,
                    expected.to_string(),
                    cert.public_key_algorithm.to_string(),
                ))
            }
        }
        Expectation::SignatureAlgorithm(expected) => {
            if &cert.signature_algorithm == expected {
                Ok(())
            } else {
                Err(AssertionError::new(property, expected, &cert.signature_algorithm))
            }
        }
        Expectation::UriSan(expected) => contains_or_report(property, expected, &cert.uris),
        Expectation::DnsSan(expected) => contains_or_report(property, expected, &cert.dns_names),
    }
}
