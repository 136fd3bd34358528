use std::fmt;
use std::path::Path;

use crate::ArtifactKind;

/// Decides whether an artifact already on disk can be reused as-is.
pub trait FreshnessPolicy: fmt::Debug + Send + Sync {
    fn is_fresh(&self, kind: ArtifactKind, path: &Path) -> bool;
}

/// Any artifact that exists is fresh. Expiry is not inspected.
#[derive(Debug, Clone, Copy, Default)]
pub struct PresentOnDisk;

impl FreshnessPolicy for PresentOnDisk {
    fn is_fresh(&self, _kind: ArtifactKind, path: &Path) -> bool {
        path.exists()
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::{FreshnessPolicy, PresentOnDisk};
    use crate::ArtifactKind;

    #[test]
    fn present_on_disk_tracks_file_existence() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("svc1.crt");
        assert!(!PresentOnDisk.is_fresh(ArtifactKind::LeafCertificate, &path));
        fs::write(&path, b"pem").expect("write");
        assert!(PresentOnDisk.is_fresh(ArtifactKind::LeafCertificate, &path));
    }
}
