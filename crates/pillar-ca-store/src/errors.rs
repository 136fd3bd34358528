use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// The four files a CA directory can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    CaCertificate,
    CaPrivateKey,
    LeafCertificate,
    LeafPrivateKey,
}

impl ArtifactKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CaCertificate => "ca_certificate",
            Self::CaPrivateKey => "ca_private_key",
            Self::LeafCertificate => "leaf_certificate",
            Self::LeafPrivateKey => "leaf_private_key",
        }
    }

    /// Permission bits every write of this artifact must carry.
    pub fn mode(self) -> u32 {
        match self {
            Self::CaCertificate | Self::LeafCertificate => crate::CERTIFICATE_MODE,
            Self::CaPrivateKey | Self::LeafPrivateKey => crate::PRIVATE_KEY_MODE,
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum CaError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("lost creation race for {}: the path was recreated by another writer", path.display())]
    FilesystemRace { path: PathBuf },
    #[error("{kind} not found at {}", path.display())]
    MissingArtifact { kind: ArtifactKind, path: PathBuf },
    #[error("I/O error during {operation} on {}: {source}", path.display())]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("certificate generation failed: {0}")]
    CertificateGeneration(#[from] rcgen::Error),
    #[error("invalid certificate authority material: {0}")]
    InvalidMaterial(String),
}

/// Coarse classification of [`CaError`] with stable codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaErrorKind {
    Configuration,
    FilesystemRace,
    Io,
    Crypto,
}

impl CaErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::FilesystemRace => "filesystem_race",
            Self::Io => "io",
            Self::Crypto => "crypto",
        }
    }
}

impl CaError {
    pub fn kind(&self) -> CaErrorKind {
        match self {
            Self::InvalidConfiguration(_) => CaErrorKind::Configuration,
            Self::FilesystemRace { .. } => CaErrorKind::FilesystemRace,
            Self::MissingArtifact { .. } | Self::Io { .. } => CaErrorKind::Io,
            Self::CertificateGeneration(_) | Self::InvalidMaterial(_) => CaErrorKind::Crypto,
        }
    }

    pub(crate) fn io(operation: &'static str, path: &Path, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.to_path_buf(),
            source,
        }
    }
}
