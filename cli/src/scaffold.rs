//! The new-file-pair scaffold: one `.egx` and one `.egl`, both empty.

use std::path::{Path, PathBuf};

/// Paired extensions created by the scaffold.
pub const PAIR_EXTENSIONS: (&str, &str) = ("egx", "egl");

/// The two files created by a scaffold invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScaffoldPair {
    pub egx: PathBuf,
    pub egl: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum ScaffoldError {
    #[error("no file name was provided")]
    EmptyName,
    #[error("folder {} does not exist", path.display())]
    MissingFolder { path: PathBuf },
    #[error("creating {}: {source}", path.display())]
    Create {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Create `<folder>/<name>.egx` and `<folder>/<name>.egl`, both zero-length.
///
/// Existing files at either path are truncated, matching the editor
/// command this replaces. The two writes are not transactional: if the
/// second fails the first is left in place.
pub fn create_pair(folder: &Path, name: &str) -> Result<ScaffoldPair, ScaffoldError> {
    if name.trim().is_empty() {
        return Err(ScaffoldError::EmptyName);
    }
    if !folder.is_dir() {
        return Err(ScaffoldError::MissingFolder {
            path: folder.to_path_buf(),
        });
    }

    let (ext_a, ext_b) = PAIR_EXTENSIONS;
    let egx = folder.join(format!("{name}.{ext_a}"));
    let egl = folder.join(format!("{name}.{ext_b}"));

    for path in [&egx, &egl] {
        std::fs::File::create(path).map_err(|source| ScaffoldError::Create {
            path: path.clone(),
            source,
        })?;
    }

    tracing::info!(egx = %egx.display(), egl = %egl.display(), "scaffolded file pair");
    Ok(ScaffoldPair { egx, egl })
}
