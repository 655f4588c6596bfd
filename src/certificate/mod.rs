//! # Property Checker
//!
//! Decodes captured artifacts into a structural [`Certificate`] view and
//! asserts properties on it. Decoding is strict and fails closed: input
//! without a `CERTIFICATE` block is [`DecodeError::MalformedInput`], never an
//! empty or default certificate.

pub mod expect;

use std::fmt;
use std::sync::LazyLock;

use base64::Engine;
use chrono::{DateTime, Utc};
use regex::bytes::Regex;
use serde::{Deserialize, Serialize};
use x509_parser::pem::parse_x509_pem;
use x509_parser::prelude::*;

use crate::errors::DecodeError;

pub use expect::{assert, Expectation};

const PEM_LABEL: &str = "CERTIFICATE";

static CERTIFICATE_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)-----BEGIN CERTIFICATE-----.*?-----END CERTIFICATE-----")
        .expect("certificate block pattern")
});

/// Public key algorithm of a certificate's subjectPublicKeyInfo
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PublicKeyAlgorithm {
    Rsa,
    Dsa,
    Ecdsa,
    Ed25519,
    /// Anything else, by dotted OID
    Unknown(String),
}

impl PublicKeyAlgorithm {
    pub const OID_RSA: &'static str = "1.2.840.113549.1.1.1";
    pub const OID_DSA: &'static str = "1.2.840.10040.4.1";
    pub const OID_EC_PUBLIC_KEY: &'static str = "1.2.840.10045.2.1";
    pub const OID_ED25519: &'static str = "1.3.101.112";

    pub fn from_oid(oid: &str) -> Self {
        match oid {
            Self::OID_RSA => Self::Rsa,
            Self::OID_DSA => Self::Dsa,
            Self::OID_EC_PUBLIC_KEY => Self::Ecdsa,
            Self::OID_ED25519 => Self::Ed25519,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// Parse a user-supplied name (`ecdsa`, `RSA`, `ed25519`, ...)
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "rsa" => Some(Self::Rsa),
            "dsa" => Some(Self::Dsa),
            "ecdsa" | "ec" => Some(Self::Ecdsa),
            "ed25519" => Some(Self::Ed25519),
            _ => None,
        }
    }
}

impl fmt::Display for PublicKeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rsa => f.write_str("RSA"),
            Self::Dsa => f.write_str("DSA"),
            Self::Ecdsa => f.write_str("ECDSA"),
            Self::Ed25519 => f.write_str("Ed25519"),
            Self::Unknown(oid) => write!(f, "unknown({})", oid),
        }
    }
}

/// Decoded structural view of an X.509 certificate
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Certificate {
    pub subject: String,
    pub issuer: String,
    pub serial: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    pub public_key_algorithm: PublicKeyAlgorithm,
    /// Dotted OID of the issuer's signature algorithm
    pub signature_algorithm: String,
    pub dns_names: Vec<String>,
    pub uris: Vec<String>,
    #[serde(skip)]
    pub der: Vec<u8>,
}

impl Certificate {
    /// First `spiffe://` URI SAN, the mesh workload identity
    pub fn spiffe_id(&self) -> Option<&str> {
        self.uris.iter().map(String::as_str).find(|uri| uri.starts_with("spiffe://"))
    }

    /// Parse a single DER certificate
    pub fn from_der(der: &[u8]) -> Result<Self, DecodeError> {
        let (_, x509) =
            X509Certificate::from_der(der).map_err(|e| DecodeError::invalid(e.to_string()))?;

        let mut dns_names = Vec::new();
        let mut uris = Vec::new();
        for ext in x509.extensions() {
            if let ParsedExtension::SubjectAlternativeName(san) = ext.parsed_extension() {
                for name in &san.general_names {
                    match name {
                        GeneralName::DNSName(dns) => dns_names.push(dns.to_string()),
                        GeneralName::URI(uri) => uris.push(uri.to_string()),
                        _ => {}
                    }
                }
            }
        }

        let validity = x509.validity();
        Ok(Self {
            subject: x509.subject().to_string(),
            issuer: x509.issuer().to_string(),
            serial: format!("{:x}", x509.serial),
            not_before: timestamp(validity.not_before.timestamp())?,
            not_after: timestamp(validity.not_after.timestamp())?,
            public_key_algorithm: PublicKeyAlgorithm::from_oid(
                &x509.public_key().algorithm.algorithm.to_id_string(),
            ),
            signature_algorithm: x509.signature_algorithm.algorithm.to_id_string(),
            dns_names,
            uris,
            der: der.to_vec(),
        })
    }
}

fn timestamp(seconds: i64) -> Result<DateTime<Utc>, DecodeError> {
    DateTime::from_timestamp(seconds, 0)
        .ok_or_else(|| DecodeError::invalid(format!("validity timestamp {} out of range", seconds)))
}

fn certificate_blocks(raw: &[u8]) -> impl Iterator<Item = &[u8]> {
    CERTIFICATE_BLOCK.find_iter(raw).map(|m| m.as_bytes())
}

fn decode_block(block: &[u8]) -> Result<Certificate, DecodeError> {
    let (_, pem) = parse_x509_pem(block).map_err(|e| DecodeError::malformed(e.to_string()))?;
    if pem.label != PEM_LABEL {
        return Err(DecodeError::malformed(format!("unexpected PEM label '{}'", pem.label)));
    }
    Certificate::from_der(&pem.contents)
}

/// Decode the first certificate block found in `raw`.
///
/// Surrounding text (e.g. a full `openssl s_client` transcript) is ignored.
pub fn decode(raw: &[u8]) -> Result<Certificate, DecodeError> {
    let block = certificate_blocks(raw)
        .next()
        .ok_or_else(|| DecodeError::malformed("no CERTIFICATE block found"))?;
    decode_block(block)
}

/// Decode every certificate block in `raw`, leaf first.
pub fn decode_chain(raw: &[u8]) -> Result<Vec<Certificate>, DecodeError> {
    let chain = certificate_blocks(raw).map(decode_block).collect::<Result<Vec<_>, _>>()?;
    if chain.is_empty() {
        return Err(DecodeError::malformed("no CERTIFICATE block found"));
    }
    Ok(chain)
}

/// Encode DER bytes as a `CERTIFICATE` block with 64-column lines.
pub fn encode_pem(der: &[u8]) -> String {
    let body = base64::engine::general_purpose::STANDARD.encode(der);
    let mut pem = String::with_capacity(body.len() + body.len() / 64 + 64);
    pem.push_str("-----BEGIN CERTIFICATE-----\n");
    for line in body.as_bytes().chunks(64) {
        // base64 output is ASCII
        pem.push_str(std::str::from_utf8(line).unwrap_or_default());
        pem.push('\n');
    }
    pem.push_str("-----END CERTIFICATE-----\n");
    pem
}
