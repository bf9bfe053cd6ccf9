use std::{error::Error, fmt};

use thiserror::Error;
use uuid::Uuid;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by storage backends regardless of the underlying database.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage unavailable: {message}")]
    Unavailable {
        message: String,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// The record changed since the revision used for the write was read.
    #[error("game `{id}` was modified concurrently")]
    Conflict { id: Uuid },
    /// The record does not exist (anymore).
    #[error("game `{id}` not found")]
    NotFound { id: Uuid },
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }
}

/// Opaque token identifying one committed version of a record.
///
/// Each backend picks its own encoding (CouchDB `_rev`, a counter elsewhere);
/// callers only hand it back on the next compare-and-swap.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Revision(String);

impl Revision {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Generation number of this revision, when the backend encodes one.
    ///
    /// Counters (`"7"`) and CouchDB revisions (`"7-9a0f…"`) both grow by one
    /// per committed write of a record.
    pub fn generation(&self) -> Option<u64> {
        let prefix = self.0.split_once('-').map_or(self.0.as_str(), |(head, _)| head);
        prefix.parse().ok()
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A record together with the revision it was read at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned<T> {
    pub revision: Revision,
    pub value: T,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_reads_counters_and_couch_revisions() {
        assert_eq!(Revision::new("7").generation(), Some(7));
        assert_eq!(Revision::new("12-4c2f9e").generation(), Some(12));
        assert_eq!(Revision::new("opaque").generation(), None);
    }
}
