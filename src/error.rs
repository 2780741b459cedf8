use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Problems that can arise while ingesting trace files.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{path}: line {line} is {size} bytes, over the {limit} byte limit")]
    LineTooLong {
        path: PathBuf,
        line: u64,
        size: usize,
        limit: usize,
    },

    #[error(transparent)]
    Database(#[from] duckdb::Error),

    #[error("worker thread panicked")]
    WorkerPanicked,
}

impl IngestError {
    pub fn io(path: &std::path::Path, source: io::Error) -> Self {
        IngestError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// File-level errors are accounted for in `files_with_errors` and do
    /// not abort the run; everything else is critical.
    pub fn is_file_level(&self) -> bool {
        match self {
            IngestError::LineTooLong { .. } => true,
            IngestError::Io { source, .. } => matches!(
                source.kind(),
                io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied
            ),
            _ => false,
        }
    }
}
