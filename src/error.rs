//! Unified error type for the engine, the ticket desk and the fan-out.
//!
//! Every fallible operation in the crate returns [`Result`]. The variants map
//! onto the failure classes callers have to tell apart:
//!
//! - rejected requests ([`Error::UnknownTicketKind`], [`Error::UnknownCounter`],
//!   [`Error::UnknownTopic`], [`Error::UnknownClient`]) never touch a document;
//! - [`Error::Write`], [`Error::Encode`] and [`Error::Timeout`] mean the
//!   mutation did not advance any counter;
//! - [`Error::PartialCommit`] means one document advanced and the other could
//!   not be brought along or restored;
//! - [`Error::Print`] means the numbers were issued and persisted, only the
//!   physical ticket is missing.
//!
//! Read and parse failures of stored documents are not errors at all: the
//! store heals them with a freshly seeded document.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::desk::PrintError;
use crate::document::Topic;
use crate::fanout::ClientId;
use crate::tickets::IssuedTicket;

/// Error type for all engine operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The requested ticket kind does not exist.
    #[error("unknown ticket kind: {0}")]
    UnknownTicketKind(String),

    /// The counter does not exist in the topic or cannot be mutated that way.
    #[error("unknown counter {name} in {topic}")]
    UnknownCounter { topic: Topic, name: String },

    /// The topic name does not match any document.
    #[error("unknown topic: {0}")]
    UnknownTopic(String),

    /// The client never connected or has already disconnected.
    #[error("unknown client: {0}")]
    UnknownClient(ClientId),

    /// Reading a document failed. The store heals this on load; it only
    /// surfaces from raw reads.
    #[error("failed to read {topic} document: {source}")]
    Read {
        topic: Topic,
        #[source]
        source: io::Error,
    },

    /// Persisting a document failed; nothing was advanced.
    #[error("failed to write {topic} document: {source}")]
    Write {
        topic: Topic,
        #[source]
        source: io::Error,
    },

    /// Serializing a document failed before any write happened.
    #[error("failed to encode {topic} document: {source}")]
    Encode {
        topic: Topic,
        #[source]
        source: serde_json::Error,
    },

    /// Storage did not answer within the configured bound.
    #[error("storage for {topic} did not respond within {timeout:?}")]
    Timeout { topic: Topic, timeout: Duration },

    /// The first document of a linked update is persisted but the second is
    /// not, and restoring the first failed as well.
    #[error("{committed} document committed but {failed} document is behind: {source}")]
    PartialCommit {
        committed: Topic,
        failed: Topic,
        #[source]
        source: Box<Error>,
    },

    /// The spawned mutation task panicked or was cancelled by the runtime.
    #[error("mutation task aborted: {0}")]
    Aborted(#[from] tokio::task::JoinError),

    /// The ticket was issued and persisted but could not be printed.
    #[error("ticket {ticket} issued but not printed: {source}")]
    Print {
        ticket: IssuedTicket,
        #[source]
        source: PrintError,
    },

    /// The configuration file could not be read.
    #[error("failed to read config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The configuration file is not valid JSON for [`EngineConfig`](crate::config::EngineConfig).
    #[error("invalid config {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns `true` if no counter was advanced by the failed operation.
    ///
    /// Only [`Error::PartialCommit`] and [`Error::Print`] leave persisted
    /// state behind.
    pub fn is_clean(&self) -> bool {
        !matches!(self, Error::PartialCommit { .. } | Error::Print { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_unknown_counter() {
        let err = Error::UnknownCounter {
            topic: Topic::Inventory,
            name: "GIN".to_string(),
        };
        assert_eq!(err.to_string(), "unknown counter GIN in inventory");
    }

    #[test]
    fn test_partial_commit_is_not_clean() {
        let err = Error::PartialCommit {
            committed: Topic::Visits,
            failed: Topic::Inventory,
            source: Box::new(Error::Write {
                topic: Topic::Inventory,
                source: io::Error::new(io::ErrorKind::Other, "disk full"),
            }),
        };
        assert!(!err.is_clean());
        assert!(err.to_string().contains("visits document committed"));
    }

    #[test]
    fn test_write_is_clean() {
        let err = Error::Write {
            topic: Topic::Visits,
            source: io::Error::new(io::ErrorKind::PermissionDenied, "read-only"),
        };
        assert!(err.is_clean());
    }
}
