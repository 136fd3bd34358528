use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

use crate::{CaError, StoreMetrics};

pub const PRIVATE_KEY_MODE: u32 = 0o600;
pub const CERTIFICATE_MODE: u32 = 0o644;

/// Creates secret files without following symlinks or reusing an existing inode.
///
/// A write first unlinks whatever sits at the target path, then creates the
/// file with `O_CREAT | O_EXCL | O_NOFOLLOW`. Anything that reappears at the
/// path in between makes the create fail with [`CaError::FilesystemRace`];
/// the writer never retries. A write that fails after the create removes the
/// partial file again.
#[derive(Debug, Clone, Default)]
pub struct SecureArtifactWriter {
    metrics: Arc<StoreMetrics>,
}

impl SecureArtifactWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_metrics(metrics: Arc<StoreMetrics>) -> Self {
        Self { metrics }
    }

    pub fn metrics(&self) -> &Arc<StoreMetrics> {
        &self.metrics
    }

    pub fn write(&self, path: &Path, mode: u32, content: &[u8]) -> Result<(), CaError> {
        discard_existing(path)?;
        let file = open_exclusive(path, mode)?;
        fill_or_remove(path, file, |file| {
            file.write_all(content)
                .map_err(|source| CaError::io("write artifact", path, source))?;
            file.sync_all()
                .map_err(|source| CaError::io("sync artifact", path, source))
        })?;

        self.metrics.record_artifact_written();
        tracing::debug!(
            path = %path.display(),
            mode = %format!("{mode:04o}"),
            bytes = content.len(),
            "artifact written"
        );
        Ok(())
    }
}

// A removal that fails for any reason other than absence is an I/O error,
// not a race: the exclusive create would only trip over the same file.
fn discard_existing(path: &Path) -> Result<(), CaError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(error) => Err(CaError::io("remove existing artifact", path, error)),
    }
}

/// Runs `fill` on a freshly created file and unlinks it if `fill` fails, so a
/// short or unsynced artifact never stays at `path`.
fn fill_or_remove<F>(path: &Path, mut file: File, fill: F) -> Result<(), CaError>
where
    F: FnOnce(&mut File) -> Result<(), CaError>,
{
    let result = fill(&mut file);
    drop(file);
    if let Err(error) = &result {
        match fs::remove_file(path) {
            Ok(()) => {
                tracing::warn!(
                    path = %path.display(),
                    %error,
                    "removed partially written artifact"
                );
            }
            Err(remove_error) if remove_error.kind() == io::ErrorKind::NotFound => {}
            Err(remove_error) => {
                tracing::error!(
                    path = %path.display(),
                    %error,
                    %remove_error,
                    "failed to remove partially written artifact"
                );
            }
        }
    }
    result
}

pub(crate) fn open_exclusive(path: &Path, mode: u32) -> Result<File, CaError> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;

        options.mode(mode).custom_flags(libc::O_NOFOLLOW);
    }

    let file = options.open(path).map_err(|source| {
        if lost_creation_race(&source) {
            CaError::FilesystemRace {
                path: path.to_path_buf(),
            }
        } else {
            CaError::io("create artifact", path, source)
        }
    })?;
    enforce_mode(&file, path, mode)?;
    Ok(file)
}

fn lost_creation_race(error: &io::Error) -> bool {
    if error.kind() == io::ErrorKind::AlreadyExists {
        return true;
    }
    #[cfg(unix)]
    {
        if error.raw_os_error() == Some(libc::ELOOP) {
            return true;
        }
    }
    false
}

// The creation mode is filtered through the umask; set it again on the open
// descriptor so the bits on disk are exactly `mode`.
#[cfg(unix)]
fn enforce_mode(file: &File, path: &Path, mode: u32) -> Result<(), CaError> {
    use std::os::unix::fs::PermissionsExt;

    file.set_permissions(fs::Permissions::from_mode(mode))
        .map_err(|source| CaError::io("set artifact permissions", path, source))
}

#[cfg(not(unix))]
fn enforce_mode(_file: &File, _path: &Path, _mode: u32) -> Result<(), CaError> {
    Ok(())
}
