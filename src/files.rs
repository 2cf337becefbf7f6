//! File summaries.

use std::{
    env, fmt, fs, io,
    path::{Path, PathBuf},
};

use crate::error::UtilError;

/// The size of a file on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSummary {
    pub path: PathBuf,
    pub size_bytes: u64,
}

impl fmt::Display for FileSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "File '{}' has size {} bytes",
            self.path.display(),
            self.size_bytes
        )
    }
}

/// Summarizes the file at `path`. Relative paths are resolved against the working directory.
///
/// The summary, and any error, carry the resolved path. A file that doesn't exist is reported as
/// [`UtilError::ResourceMissing`].
pub fn summarize_file(path: &Path) -> Result<FileSummary, UtilError> {
    let resolved = if path.is_absolute() {
        path.to_path_buf()
    } else {
        let cwd = env::current_dir().map_err(|source| UtilError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        cwd.join(path)
    };

    let metadata = match fs::metadata(&resolved) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(UtilError::ResourceMissing(resolved))
        }
        Err(source) => {
            return Err(UtilError::Read {
                path: resolved,
                source,
            })
        }
    };

    Ok(FileSummary {
        path: resolved,
        size_bytes: metadata.len(),
    })
}
