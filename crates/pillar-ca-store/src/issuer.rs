use std::path::Path;
use std::sync::Arc;

use rcgen::{Issuer, KeyPair};
use rustls_pki_types::pem::PemObject;
use rustls_pki_types::CertificateDer;

use crate::artifact_fs::{ensure_dir, read_artifact, remove_stale};
use crate::certificate_params::{build_leaf_params, generate_key_pair};
use crate::openssl_check::validate_ca_material_with_openssl;
use crate::{
    ArtifactKind, CaError, CaLayout, CertificateOptions, EnsureOutcome, FreshnessPolicy,
    PresentOnDisk, SecureArtifactWriter, SerialNumberGenerator, CERTIFICATE_MODE,
    PRIVATE_KEY_MODE,
};

/// PEM pair for one issued leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafArtifacts {
    pub cert_pem: String,
    pub key_pem: String,
}

/// Issues leaf certificates signed by the CA under the same layout.
#[derive(Debug, Clone)]
pub struct CertificateIssuer {
    layout: CaLayout,
    writer: SecureArtifactWriter,
    serials: SerialNumberGenerator,
    freshness: Arc<dyn FreshnessPolicy>,
}

impl CertificateIssuer {
    pub fn open(base_path: impl AsRef<Path>, ca_name: &str) -> Result<Self, CaError> {
        Ok(Self::from_parts(
            CaLayout::new(base_path, ca_name)?,
            SecureArtifactWriter::new(),
            SerialNumberGenerator,
            Arc::new(PresentOnDisk),
        ))
    }

    pub(crate) fn from_parts(
        layout: CaLayout,
        writer: SecureArtifactWriter,
        serials: SerialNumberGenerator,
        freshness: Arc<dyn FreshnessPolicy>,
    ) -> Self {
        Self {
            layout,
            writer,
            serials,
            freshness,
        }
    }

    pub fn layout(&self) -> &CaLayout {
        &self.layout
    }

    /// True only when both the certificate and the key are fresh.
    pub fn exists(&self, common_name: &str) -> Result<bool, CaError> {
        let paths = self.layout.leaf_paths(common_name)?;
        Ok(self
            .freshness
            .is_fresh(ArtifactKind::LeafCertificate, &paths.cert_path)
            && self
                .freshness
                .is_fresh(ArtifactKind::LeafPrivateKey, &paths.key_path))
    }

    pub fn ensure(
        &self,
        common_name: &str,
        options: &CertificateOptions,
    ) -> Result<EnsureOutcome, CaError> {
        options.validate()?;
        let paths = self.layout.leaf_paths(common_name)?;
        let ca_name = self.layout.ca_name();

        if self.exists(common_name)? {
            tracing::debug!(ca_name, common_name, "leaf certificate already present");
            return Ok(EnsureOutcome::AlreadyPresent);
        }

        ensure_dir(&self.layout.certs_dir())?;
        ensure_dir(&self.layout.private_dir())?;
        remove_stale(ArtifactKind::LeafCertificate, &paths.cert_path)?;
        remove_stale(ArtifactKind::LeafPrivateKey, &paths.key_path)?;

        let ca_cert_pem = read_artifact(ArtifactKind::CaCertificate, &self.layout.ca_cert_path())?;
        let ca_key_pem = read_artifact(ArtifactKind::CaPrivateKey, &self.layout.ca_key_path())?;
        let ca_cert_der = self.load_ca_certificate(&ca_cert_pem, &ca_key_pem)?;
        let ca_key = KeyPair::from_pem_and_sign_algo(
            &ca_key_pem,
            options.digest.rsa_signature_algorithm(),
        )
        .map_err(|error| {
            CaError::InvalidMaterial(format!(
                "failed to load CA private key {}: {error}",
                self.layout.ca_key_path().display()
            ))
        })?;
        let issuer = Issuer::from_ca_cert_der(&ca_cert_der, ca_key).map_err(|error| {
            CaError::InvalidMaterial(format!(
                "failed to read issuer metadata from {}: {error}",
                self.layout.ca_cert_path().display()
            ))
        })?;

        let leaf_key = generate_key_pair(options)?;
        let serial = self.serials.next_serial();
        let certificate = build_leaf_params(options, common_name, serial)?
            .signed_by(&leaf_key, &issuer)?;

        self.writer.write(
            &paths.key_path,
            PRIVATE_KEY_MODE,
            leaf_key.serialize_pem().as_bytes(),
        )?;
        self.writer
            .write(&paths.cert_path, CERTIFICATE_MODE, certificate.pem().as_bytes())?;
        self.writer.metrics().record_leaf_issued();

        tracing::info!(
            ca_name,
            common_name,
            serial = %serial,
            path = %paths.cert_path.display(),
            "issued leaf certificate"
        );
        Ok(EnsureOutcome::Created(serial))
    }

    pub fn retrieve(&self, common_name: &str) -> Result<LeafArtifacts, CaError> {
        let paths = self.layout.leaf_paths(common_name)?;
        Ok(LeafArtifacts {
            cert_pem: read_artifact(ArtifactKind::LeafCertificate, &paths.cert_path)?,
            key_pem: read_artifact(ArtifactKind::LeafPrivateKey, &paths.key_path)?,
        })
    }

    fn load_ca_certificate(
        &self,
        cert_pem: &str,
        key_pem: &str,
    ) -> Result<CertificateDer<'static>, CaError> {
        let cert_path = self.layout.ca_cert_path();
        validate_ca_material_with_openssl(&cert_path, cert_pem, key_pem)?;
        CertificateDer::from_pem_slice(cert_pem.as_bytes()).map_err(|error| {
            CaError::InvalidMaterial(format!(
                "failed to parse CA certificate PEM from {}: {error}",
                cert_path.display()
            ))
        })
    }
}
