//! Resolution of the server jar's effective path.
//!
//! Precedence: a non-empty configured override wins verbatim; otherwise
//! the default location under the persistent storage directory is used,
//! creating the directory if needed. A path is only returned when a file
//! actually exists there — "not found" is an outcome, not an error.

use std::path::{Path, PathBuf};

use crate::types::{HostConfig, SERVER_JAR_NAME};

/// Result of resolving the server artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocateOutcome {
    /// A file exists at this path; launch it.
    Found(PathBuf),
    /// No file at the effective path; `searched` is where we looked.
    NotFound { searched: PathBuf },
}

#[derive(Debug, thiserror::Error)]
pub enum LocateError {
    #[error("creating storage directory {path}: {source}")]
    CreateStorageDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Resolve the effective jar path for this start attempt.
///
/// Recomputed on every call; never cached, so configuration edits take
/// effect on the next restart. Creating the storage directory is
/// idempotent and only happens when no override is set.
pub fn resolve_artifact(config: &HostConfig, storage_dir: &Path) -> Result<LocateOutcome, LocateError> {
    let candidate = match config.server_path_override() {
        Some(override_path) => override_path.to_path_buf(),
        None => {
            std::fs::create_dir_all(storage_dir).map_err(|source| {
                LocateError::CreateStorageDir {
                    path: storage_dir.to_path_buf(),
                    source,
                }
            })?;
            storage_dir.join(SERVER_JAR_NAME)
        }
    };

    if candidate.is_file() {
        tracing::debug!(path = %candidate.display(), "resolved server artifact");
        Ok(LocateOutcome::Found(candidate))
    } else {
        tracing::debug!(path = %candidate.display(), "server artifact not found");
        Ok(LocateOutcome::NotFound { searched: candidate })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_override(path: &Path) -> HostConfig {
        HostConfig {
            server_path: Some(path.to_path_buf()),
            ..HostConfig::default()
        }
    }

    #[test]
    fn override_wins_when_file_exists() {
        let dir = tempfile::tempdir().unwrap();
        let jar = dir.path().join("custom.jar");
        std::fs::write(&jar, b"jar").unwrap();

        let outcome = resolve_artifact(&config_with_override(&jar), dir.path()).unwrap();
        assert_eq!(outcome, LocateOutcome::Found(jar));
    }

    #[test]
    fn missing_override_is_not_found_at_the_override() {
        let dir = tempfile::tempdir().unwrap();
        let jar = dir.path().join("absent.jar");

        let outcome = resolve_artifact(&config_with_override(&jar), dir.path()).unwrap();
        assert_eq!(outcome, LocateOutcome::NotFound { searched: jar });
    }

    #[test]
    fn default_location_is_storage_dir_jar() {
        let dir = tempfile::tempdir().unwrap();
        let storage = dir.path().join("storage");
        let jar = storage.join(SERVER_JAR_NAME);
        std::fs::create_dir_all(&storage).unwrap();
        std::fs::write(&jar, b"jar").unwrap();

        let outcome = resolve_artifact(&HostConfig::default(), &storage).unwrap();
        assert_eq!(outcome, LocateOutcome::Found(jar));
    }

    #[test]
    fn creates_storage_dir_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        let storage = dir.path().join("nested").join("storage");

        let outcome = resolve_artifact(&HostConfig::default(), &storage).unwrap();
        assert!(storage.is_dir());
        assert_eq!(
            outcome,
            LocateOutcome::NotFound {
                searched: storage.join(SERVER_JAR_NAME)
            }
        );
    }

    #[test]
    fn resolving_twice_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let storage = dir.path().join("storage");
        let first = resolve_artifact(&HostConfig::default(), &storage).unwrap();
        let second = resolve_artifact(&HostConfig::default(), &storage).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn empty_override_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let storage = dir.path().join("storage");
        let config = config_with_override(Path::new(""));

        let outcome = resolve_artifact(&config, &storage).unwrap();
        assert_eq!(
            outcome,
            LocateOutcome::NotFound {
                searched: storage.join(SERVER_JAR_NAME)
            }
        );
    }

    #[test]
    fn directory_at_jar_path_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let storage = dir.path().to_path_buf();
        std::fs::create_dir_all(storage.join(SERVER_JAR_NAME)).unwrap();

        let outcome = resolve_artifact(&HostConfig::default(), &storage).unwrap();
        assert!(matches!(outcome, LocateOutcome::NotFound { .. }));
    }
}
