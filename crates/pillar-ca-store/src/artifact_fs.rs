use std::fs;
use std::io;
use std::path::Path;

use crate::{ArtifactKind, CaError, CaLayout};

pub(crate) fn ensure_dir(path: &Path) -> Result<(), CaError> {
    fs::create_dir_all(path).map_err(|source| CaError::io("create directory", path, source))
}

pub(crate) fn read_artifact(kind: ArtifactKind, path: &Path) -> Result<String, CaError> {
    fs::read_to_string(path).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            CaError::MissingArtifact {
                kind,
                path: path.to_path_buf(),
            }
        } else {
            CaError::io("read artifact", path, source)
        }
    })
}

/// Removes an artifact that is about to be regenerated. Absence is fine.
pub(crate) fn remove_stale(kind: ArtifactKind, path: &Path) -> Result<(), CaError> {
    match fs::remove_file(path) {
        Ok(()) => {
            tracing::debug!(kind = %kind, path = %path.display(), "removed stale artifact");
            Ok(())
        }
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(error) => Err(CaError::io("remove stale artifact", path, error)),
    }
}

/// Unlinks every entry in `certs/` and `private/`. Leaves signed by a CA key
/// that is being replaced would no longer chain to the new root.
pub(crate) fn purge_leaf_artifacts(layout: &CaLayout) -> Result<usize, CaError> {
    let mut removed = 0;
    for dir in [layout.certs_dir(), layout.private_dir()] {
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(error) if error.kind() == io::ErrorKind::NotFound => continue,
            Err(error) => return Err(CaError::io("list leaf artifacts", &dir, error)),
        };
        for entry in entries {
            let entry =
                entry.map_err(|source| CaError::io("list leaf artifacts", &dir, source))?;
            let path = entry.path();
            let file_type = entry
                .file_type()
                .map_err(|source| CaError::io("inspect leaf artifact", &path, source))?;
            if file_type.is_dir() {
                continue;
            }
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(error) if error.kind() == io::ErrorKind::NotFound => {}
                Err(error) => {
                    return Err(CaError::io("remove stale leaf artifact", &path, error));
                }
            }
        }
    }
    Ok(removed)
}
