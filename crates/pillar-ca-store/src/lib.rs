//! File-system-backed root CA and leaf certificate store.
//!
//! Artifacts live under `<base>/<ca_name>/` (see [`CaLayout`]). Private keys
//! are always written `0600` and certificates `0644` through
//! [`SecureArtifactWriter`].

mod artifact_fs;
mod authority;
mod certificate_params;
mod errors;
mod freshness;
mod issuer;
mod layout;
mod metrics;
mod openssl_check;
mod options;
mod secure_write;
mod serial;

pub use authority::CertificateAuthorityStore;
pub use errors::{ArtifactKind, CaError, CaErrorKind};
pub use freshness::{FreshnessPolicy, PresentOnDisk};
pub use issuer::{CertificateIssuer, LeafArtifacts};
pub use layout::{validate_artifact_name, CaLayout, LeafPaths, CERTS_DIR, PRIVATE_DIR};
pub use metrics::{StoreMetrics, StoreMetricsSnapshot};
pub use options::{
    CaKeyPresence, CertificateOptions, DigestAlgorithm, SubjectFields, DEFAULT_KEY_BITS,
    DEFAULT_VALIDITY_DAYS,
};
pub use secure_write::{SecureArtifactWriter, CERTIFICATE_MODE, PRIVATE_KEY_MODE};
pub use serial::{SerialNumber, SerialNumberGenerator, SERIAL_NUMBER_BYTES};

/// Result of an idempotent `ensure` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnsureOutcome {
    AlreadyPresent,
    Created(SerialNumber),
}

impl EnsureOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AlreadyPresent => "already_present",
            Self::Created(_) => "created",
        }
    }

    pub fn created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

#[cfg(test)]
mod test_support {
    use x509_parser::certificate::X509Certificate;

    /// Serial magnitude with the DER sign octet and leading zeros removed.
    pub(crate) fn serial_magnitude<'a>(cert: &'a X509Certificate<'_>) -> &'a [u8] {
        let raw = cert.raw_serial();
        let first = raw
            .iter()
            .position(|byte| *byte != 0)
            .unwrap_or(raw.len().saturating_sub(1));
        &raw[first..]
    }
}
