use thiserror::Error;

/// Failures turning captured bytes into a [`Certificate`](crate::certificate::Certificate).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// No `CERTIFICATE` block could be located, or its body is not valid base64.
    #[error("malformed certificate input: {reason}")]
    MalformedInput { reason: String },

    /// A block was found but its DER contents are not a parseable X.509 certificate.
    #[error("failed to parse certificate: {reason}")]
    InvalidCertificate { reason: String },
}

impl DecodeError {
    pub fn malformed<S: Into<String>>(reason: S) -> Self {
        Self::MalformedInput { reason: reason.into() }
    }

    pub fn invalid<S: Into<String>>(reason: S) -> Self {
        Self::InvalidCertificate { reason: reason.into() }
    }
}

/// A certificate property did not hold.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("certificate {property} mismatch: expected {expected}, got {actual}")]
pub struct AssertionError {
    pub property: String,
    pub expected: String,
    pub actual: String,
}

impl AssertionError {
    pub fn new(
        property: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self { property: property.into(), expected: expected.into(), actual: actual.into() }
    }
}
