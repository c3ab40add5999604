//! Local store error types

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum LocalStoreError {
    #[error("store I/O failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("manifest is not valid JSON: {0}")]
    Manifest(#[from] serde_json::Error),
}

impl LocalStoreError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl crate::core::error_handling::ContextualError for LocalStoreError {
    fn is_user_actionable(&self) -> bool {
        false
    }

    fn user_message(&self) -> Option<&str> {
        None
    }
}
