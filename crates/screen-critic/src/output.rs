//! Atomic review output file.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::types::{CritiqueResult, ReviewText};

/// A destination that has been checked for writability but not yet touched.
///
/// The review is staged in a temp file next to the destination and renamed
/// into place on [`OutputFile::commit`]. Dropping without committing removes
/// the staging file and leaves the destination as it was.
#[derive(Debug)]
pub struct OutputFile {
    path: PathBuf,
    staging: NamedTempFile,
}

impl OutputFile {
    /// Check that `path` can receive the review.
    pub fn prepare(path: &Path) -> CritiqueResult<Self> {
        if path.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("output path {} is a directory", path.display()),
            )
            .into());
        }

        if let Ok(meta) = std::fs::metadata(path) {
            if meta.permissions().readonly() {
                return Err(io::Error::new(
                    io::ErrorKind::PermissionDenied,
                    format!("output file {} is read-only", path.display()),
                )
                .into());
            }
        }

        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut builder = tempfile::Builder::new();
        builder.prefix(".screen-critic-").suffix(".tmp");
        // Regular file mode (before umask) rather than the owner-only default.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            builder.permissions(std::fs::Permissions::from_mode(0o644));
        }
        let staging = builder
            .tempfile_in(dir)
            .map_err(|e| {
                io::Error::new(
                    e.kind(),
                    format!("cannot write to {}: {e}", dir.display()),
                )
            })?;

        tracing::debug!("Staging output for {} at {}", path.display(), staging.path().display());
        Ok(Self {
            path: path.to_path_buf(),
            staging,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the review, flush, and move it over the destination.
    pub fn commit(mut self, review: &ReviewText) -> CritiqueResult<()> {
        let file = self.staging.as_file_mut();
        file.write_all(review.as_str().as_bytes())?;
        file.flush()?;
        file.sync_all()?;

        // An existing destination keeps its mode across the rename.
        if let Ok(meta) = std::fs::metadata(&self.path) {
            file.set_permissions(meta.permissions())?;
        }

        self.staging
            .persist(&self.path)
            .map_err(|e| io::Error::new(e.error.kind(), e.error.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn review(text: &str) -> ReviewText {
        ReviewText::new(text).unwrap()
    }

    #[test]
    fn test_commit_writes_exact_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ReplyText.txt");
        let out = OutputFile::prepare(&path).unwrap();
        assert!(!path.exists(), "prepare must not create the destination");

        assert_eq!(out.path(), path.as_path());
        out.commit(&review("Derivative, yet oddly compelling.")).unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "Derivative, yet oddly compelling."
        );
    }

    #[test]
    fn test_commit_overwrites_existing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ReplyText.txt");
        std::fs::write(&path, "an older and much longer review text").unwrap();

        OutputFile::prepare(&path)
            .unwrap()
            .commit(&review("short"))
            .unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "short");
    }

    #[test]
    fn test_drop_leaves_destination_and_dir_clean() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ReplyText.txt");
        std::fs::write(&path, "previous").unwrap();

        drop(OutputFile::prepare(&path).unwrap());

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "previous");
        let entries = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(entries, 1, "staging file must be removed");
    }

    #[test]
    fn test_missing_parent_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no/such/dir/ReplyText.txt");
        assert!(matches!(
            OutputFile::prepare(&path),
            Err(crate::CritiqueError::Io(_))
        ));
    }

    #[test]
    fn test_directory_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            OutputFile::prepare(dir.path()),
            Err(crate::CritiqueError::Io(_))
        ));
    }

    #[test]
    fn test_read_only_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("locked.txt");
        std::fs::write(&path, "keep").unwrap();
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        perms.set_readonly(true);
        std::fs::set_permissions(&path, perms).unwrap();

        assert!(matches!(
            OutputFile::prepare(&path),
            Err(crate::CritiqueError::Io(_))
        ));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "keep");
    }

    #[cfg(unix)]
    #[test]
    fn test_commit_keeps_existing_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ReplyText.txt");
        std::fs::write(&path, "old").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o640)).unwrap();

        OutputFile::prepare(&path)
            .unwrap()
            .commit(&review("new"))
            .unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o640);
    }

    #[cfg(unix)]
    #[test]
    fn test_new_file_is_not_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        // A plain write shows what the current umask allows.
        let reference = dir.path().join("reference.txt");
        std::fs::write(&reference, "x").unwrap();
        let umask_allowed = std::fs::metadata(&reference).unwrap().permissions().mode() & 0o777;

        let path = dir.path().join("ReplyText.txt");
        OutputFile::prepare(&path)
            .unwrap()
            .commit(&review("fresh"))
            .unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, umask_allowed & 0o644);
    }
}
