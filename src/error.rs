use crate::source::SourceError;
use thiserror::Error;

/// Failures of a sync cycle stage.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The sheet could not be read; the cycle writes nothing.
    #[error("song sheet unavailable after {attempts} attempts: {source}")]
    SourceUnavailable {
        attempts: u32,
        #[source]
        source: SourceError,
    },
    /// A transaction for one entity was rolled back.
    #[error("failed to persist {entity}: {message}")]
    PersistenceConflict {
        entity: &'static str,
        message: String,
    },
}

impl SyncError {
    pub(crate) fn persistence(entity: &'static str, err: anyhow::Error) -> Self {
        SyncError::PersistenceConflict {
            entity,
            message: format!("{:#}", err),
        }
    }
}
