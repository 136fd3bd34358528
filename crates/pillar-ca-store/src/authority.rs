use std::path::Path;
use std::sync::Arc;

use crate::artifact_fs::{ensure_dir, purge_leaf_artifacts, read_artifact, remove_stale};
use crate::certificate_params::{build_ca_params, generate_key_pair};
use crate::{
    ArtifactKind, CaError, CaKeyPresence, CaLayout, CertificateIssuer, CertificateOptions,
    EnsureOutcome, FreshnessPolicy, PresentOnDisk, SecureArtifactWriter, SerialNumberGenerator,
    StoreMetrics, StoreMetricsSnapshot, CERTIFICATE_MODE, PRIVATE_KEY_MODE,
};

/// Root CA lifecycle for one `<base>/<name>` directory.
///
/// Nothing is cached between calls; every operation re-reads the filesystem.
#[derive(Debug, Clone)]
pub struct CertificateAuthorityStore {
    layout: CaLayout,
    writer: SecureArtifactWriter,
    serials: SerialNumberGenerator,
    freshness: Arc<dyn FreshnessPolicy>,
    key_presence: CaKeyPresence,
}

impl CertificateAuthorityStore {
    pub fn open(base_path: impl AsRef<Path>, ca_name: &str) -> Result<Self, CaError> {
        Ok(Self {
            layout: CaLayout::new(base_path, ca_name)?,
            writer: SecureArtifactWriter::new(),
            serials: SerialNumberGenerator,
            freshness: Arc::new(PresentOnDisk),
            key_presence: CaKeyPresence::default(),
        })
    }

    pub fn with_freshness_policy(mut self, freshness: Arc<dyn FreshnessPolicy>) -> Self {
        self.freshness = freshness;
        self
    }

    pub fn with_key_presence(mut self, key_presence: CaKeyPresence) -> Self {
        self.key_presence = key_presence;
        self
    }

    /// Shares `metrics` with every writer and issuer derived from this store.
    pub fn with_metrics(mut self, metrics: Arc<StoreMetrics>) -> Self {
        self.writer = SecureArtifactWriter::with_metrics(metrics);
        self
    }

    pub fn layout(&self) -> &CaLayout {
        &self.layout
    }

    pub fn metrics_snapshot(&self) -> StoreMetricsSnapshot {
        self.writer.metrics().snapshot()
    }

    pub fn exists(&self) -> bool {
        let cert_fresh = self
            .freshness
            .is_fresh(ArtifactKind::CaCertificate, &self.layout.ca_cert_path());
        match self.key_presence {
            CaKeyPresence::CertificateOnly => cert_fresh,
            CaKeyPresence::RequireKey => {
                cert_fresh
                    && self
                        .freshness
                        .is_fresh(ArtifactKind::CaPrivateKey, &self.layout.ca_key_path())
            }
        }
    }

    pub fn ensure(&self, options: &CertificateOptions) -> Result<EnsureOutcome, CaError> {
        options.validate()?;
        let ca_name = self.layout.ca_name();
        let cert_path = self.layout.ca_cert_path();
        let key_path = self.layout.ca_key_path();

        if self.exists() {
            tracing::debug!(ca_name, path = %cert_path.display(), "CA already present");
            return Ok(EnsureOutcome::AlreadyPresent);
        }
        if self.key_presence == CaKeyPresence::RequireKey && cert_path.exists() {
            tracing::warn!(
                ca_name,
                path = %key_path.display(),
                "CA private key missing; regenerating CA"
            );
        }

        ensure_dir(self.layout.ca_dir())?;
        remove_stale(ArtifactKind::CaCertificate, &cert_path)?;
        remove_stale(ArtifactKind::CaPrivateKey, &key_path)?;
        // Any leaf still on disk was signed by a key this CA no longer holds.
        let purged = purge_leaf_artifacts(&self.layout)?;
        if purged > 0 {
            tracing::warn!(
                ca_name,
                purged,
                "removed leaf artifacts issued by the previous CA key"
            );
        }

        let key = generate_key_pair(options)?;
        let serial = self.serials.next_serial();
        let certificate = build_ca_params(options, serial)?.self_signed(&key)?;

        self.writer
            .write(&key_path, PRIVATE_KEY_MODE, key.serialize_pem().as_bytes())?;
        self.writer
            .write(&cert_path, CERTIFICATE_MODE, certificate.pem().as_bytes())?;
        self.writer.metrics().record_ca_created();

        tracing::info!(
            ca_name,
            path = %cert_path.display(),
            serial = %serial,
            digest = %options.digest,
            key_bits = options.key_bits,
            "created certificate authority"
        );
        Ok(EnsureOutcome::Created(serial))
    }

    /// PEM of the CA certificate.
    pub fn retrieve(&self) -> Result<String, CaError> {
        read_artifact(ArtifactKind::CaCertificate, &self.layout.ca_cert_path())
    }

    /// Leaf issuer signing with this CA and sharing its writer and policy.
    pub fn issuer(&self) -> CertificateIssuer {
        CertificateIssuer::from_parts(
            self.layout.clone(),
            self.writer.clone(),
            self.serials,
            Arc::clone(&self.freshness),
        )
    }
}
