use crate::db::{CampaignId, DatabaseError};
use crate::ingest::IngestError;
use thiserror::Error;

/// Service-level error taxonomy surfaced to the transport layer
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Campaign {0} not found")]
    NotFound(CampaignId),

    #[error("Invalid campaign request: {0}")]
    Validation(String),

    #[error("{context}: {source}")]
    Storage {
        context: String,
        #[source]
        source: anyhow::Error,
    },

    /// One side of a concurrent write pair stuck after its compensation
    /// also failed; `remnant` names the side effect left behind.
    #[error("{op} left a partial side effect ({remnant}): {source}")]
    Partial {
        op: &'static str,
        remnant: String,
        #[source]
        source: anyhow::Error,
    },
}

impl ServiceError {
    pub(crate) fn storage(
        context: impl Into<String>,
        source: impl Into<anyhow::Error>,
    ) -> Self {
        ServiceError::Storage {
            context: context.into(),
            source: source.into(),
        }
    }

    /// Map a repository error, translating the typed not-found
    pub(crate) fn from_db(context: &str, error: DatabaseError) -> Self {
        match error {
            DatabaseError::NotFound(id) => ServiceError::NotFound(id),
            other => ServiceError::storage(context, other),
        }
    }

    /// Map an ingest error: malformed stream shapes are the caller's fault,
    /// transport failures are I/O.
    pub(crate) fn from_ingest(error: IngestError) -> Self {
        match error {
            IngestError::Transport(_) | IngestError::Other(_) => {
                ServiceError::storage("receiving upload stream", error)
            }
            shape => ServiceError::Validation(shape.to_string()),
        }
    }
}
