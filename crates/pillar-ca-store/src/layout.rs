use std::path::{is_separator, Path, PathBuf};

use crate::CaError;

pub const CERTS_DIR: &str = "certs";
pub const PRIVATE_DIR: &str = "private";

/// On-disk layout of one CA:
///
/// ```text
/// <base>/<name>/<name>_ca_cert.crt
/// <base>/<name>/<name>_ca_cert.key
/// <base>/<name>/certs/<cn>.crt
/// <base>/<name>/private/<cn>.key
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaLayout {
    ca_name: String,
    ca_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafPaths {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

impl CaLayout {
    pub fn new(base_path: impl AsRef<Path>, ca_name: &str) -> Result<Self, CaError> {
        validate_artifact_name("CA name", ca_name)?;
        Ok(Self {
            ca_name: ca_name.to_string(),
            ca_dir: base_path.as_ref().join(ca_name),
        })
    }

    pub fn ca_name(&self) -> &str {
        &self.ca_name
    }

    pub fn ca_dir(&self) -> &Path {
        &self.ca_dir
    }

    pub fn ca_cert_path(&self) -> PathBuf {
        self.ca_dir.join(format!("{}_ca_cert.crt", self.ca_name))
    }

    pub fn ca_key_path(&self) -> PathBuf {
        self.ca_dir.join(format!("{}_ca_cert.key", self.ca_name))
    }

    pub fn certs_dir(&self) -> PathBuf {
        self.ca_dir.join(CERTS_DIR)
    }

    pub fn private_dir(&self) -> PathBuf {
        self.ca_dir.join(PRIVATE_DIR)
    }

    pub fn leaf_paths(&self, common_name: &str) -> Result<LeafPaths, CaError> {
        validate_artifact_name("common name", common_name)?;
        Ok(LeafPaths {
            cert_path: self.certs_dir().join(format!("{common_name}.crt")),
            key_path: self.private_dir().join(format!("{common_name}.key")),
        })
    }
}

/// Names become path components, so anything that could step outside the CA
/// directory is refused.
pub fn validate_artifact_name(label: &str, name: &str) -> Result<(), CaError> {
    if name.is_empty() {
        return Err(CaError::InvalidConfiguration(format!(
            "{label} must not be empty"
        )));
    }
    if name == "." || name == ".." {
        return Err(CaError::InvalidConfiguration(format!(
            "{label} '{name}' is not a valid file name"
        )));
    }
    if name.chars().any(|c| is_separator(c) || c == '\0') {
        return Err(CaError::InvalidConfiguration(format!(
            "{label} '{}' must not contain path separators or NUL bytes",
            name.escape_debug()
        )));
    }
    Ok(())
}
