use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use snafu::{ResultExt, Snafu};

/// Who may read a file written by [`write_json_file`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FileAccess {
    Shared,
    /// Owner only. Used for files holding credentials.
    Private,
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SettingsError {
    #[snafu(display("cannot create directory {path:?} on `{stage}`: {source}"))]
    CreateDirectory {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("cannot encode {path:?} on `{stage}`: {source}"))]
    Encode {
        stage: &'static str,
        path: PathBuf,
        source: serde_json::Error,
    },
    #[snafu(display("cannot write {path:?} on `{stage}`: {source}"))]
    Write {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("cannot replace {path:?} on `{stage}`: {source}"))]
    Replace {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("cannot remove {path:?} on `{stage}`: {source}"))]
    Remove {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Writes `value` as pretty JSON next to `path`, then renames it into place so
/// readers never see a half-written file.
pub(crate) fn write_json_file<T: Serialize>(
    path: &Path,
    value: &T,
    access: FileAccess,
) -> Result<(), SettingsError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).context(CreateDirectorySnafu {
            stage: "write-json-file",
            path: parent.to_path_buf(),
        })?;
    }

    let content = serde_json::to_vec_pretty(value).context(EncodeSnafu {
        stage: "write-json-file",
        path: path.to_path_buf(),
    })?;

    let staged = path.with_extension("json.tmp");
    let mut file = open_for_write(&staged, access).context(WriteSnafu {
        stage: "open-staged-file",
        path: staged.clone(),
    })?;
    file.write_all(&content).context(WriteSnafu {
        stage: "write-staged-file",
        path: staged.clone(),
    })?;
    drop(file);

    std::fs::rename(&staged, path).context(ReplaceSnafu {
        stage: "rename-staged-file",
        path: path.to_path_buf(),
    })
}

/// Removes `path`; a file that is already gone counts as removed.
pub(crate) fn remove_file(path: &Path) -> Result<(), SettingsError> {
    match std::fs::remove_file(path) {
        Err(error) if error.kind() != std::io::ErrorKind::NotFound => Err(error).context(
            RemoveSnafu {
                stage: "remove-file",
                path: path.to_path_buf(),
            },
        ),
        _ => Ok(()),
    }
}

fn open_for_write(path: &Path, access: FileAccess) -> std::io::Result<std::fs::File> {
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    if access == FileAccess::Private {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    #[cfg(not(unix))]
    let _ = access;
    options.open(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_through_a_staged_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("deep").join("value.json");

        write_json_file(&path, &serde_json::json!({ "a": 1 }), FileAccess::Shared)
            .expect("write json");

        let written: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).expect("read back")).expect("json");
        assert_eq!(written, serde_json::json!({ "a": 1 }));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[cfg(unix)]
    #[test]
    fn private_files_are_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("secret.json");

        write_json_file(&path, &"token", FileAccess::Private).expect("write json");

        let mode = std::fs::metadata(&path).expect("metadata").permissions().mode();
        assert_eq!(mode & 0o077, 0);
    }

    #[test]
    fn removing_a_missing_file_succeeds() {
        let dir = tempfile::tempdir().expect("temp dir");
        assert!(remove_file(&dir.path().join("absent.json")).is_ok());
    }
}
