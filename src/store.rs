//! Durable load/save of counter documents.
//!
//! Storage is split in two layers:
//!
//! - a [`Backend`] moves raw bytes for a [`Topic`] in and out of some medium
//!   ([`FileBackend`] for JSON files on disk, [`MemoryBackend`] for tests);
//! - the [`DocumentStore`] turns those bytes into [`CounterDocument`]s, bounds
//!   every I/O call with a timeout and heals unreadable documents.
//!
//! Loading never fails because of missing or corrupt data: the store seeds a
//! default document for the current day, persists it and hands it back. Only
//! a storage call that does not return within the configured timeout fails a
//! load, since that is a failure of the request and not of the data.

use std::fmt;
use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::document::{CounterDocument, Topic};
use crate::epoch::{Clock, Serial, SystemClock};
use crate::error::{Error, Result};

pub mod file;
pub mod memory;

pub use file::FileBackend;
pub use memory::MemoryBackend;

/// Default bound on a single storage call.
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(5);

/// Raw byte storage with one slot per topic.
pub trait Backend: Send + Sync + 'static {
    /// Reads the bytes stored for `topic`, or `None` if nothing is stored.
    fn read(&self, topic: Topic) -> impl Future<Output = io::Result<Option<Vec<u8>>>> + Send;

    /// Replaces the bytes stored for `topic`.
    fn write(&self, topic: Topic, bytes: Vec<u8>) -> impl Future<Output = io::Result<()>> + Send;

    /// Wakes `changed` whenever the bytes of `topic` may have changed, by
    /// this process or any other writer. Backends that poll check every
    /// `poll_interval`. Reports stop when the returned guard is dropped.
    fn watch(
        &self,
        topic: Topic,
        changed: Arc<Notify>,
        poll_interval: Duration,
    ) -> io::Result<StorageWatch>;
}

/// Keeps a [`Backend::watch`] registration alive.
pub struct StorageWatch {
    _guard: Box<dyn Send>,
}

impl StorageWatch {
    /// Wraps whatever keeps the reports flowing.
    pub fn new(guard: impl Send + 'static) -> Self {
        Self {
            _guard: Box::new(guard),
        }
    }
}

impl fmt::Debug for StorageWatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageWatch").finish_non_exhaustive()
    }
}

/// A document as returned by [`DocumentStore::load`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Loaded {
    /// The document.
    pub document: CounterDocument,
    /// `true` if the stored data was missing or unusable and the document
    /// was freshly seeded.
    pub seeded: bool,
}

/// Typed access to the documents held by a [`Backend`].
pub struct DocumentStore<B> {
    backend: Arc<B>,
    clock: Arc<dyn Clock>,
    io_timeout: Duration,
}

impl<B: Backend> DocumentStore<B> {
    /// Creates a store on top of `backend`, using the system clock.
    pub fn new(backend: B) -> Self {
        Self {
            backend: Arc::new(backend),
            clock: Arc::new(SystemClock),
            io_timeout: DEFAULT_IO_TIMEOUT,
        }
    }

    /// Replaces the clock used to stamp seeded documents and detect rollover.
    pub fn with_clock(mut self, clock: impl Clock) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Sets the bound on every storage call.
    pub fn with_io_timeout(mut self, io_timeout: Duration) -> Self {
        self.io_timeout = io_timeout;
        self
    }

    /// Returns the backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Returns the clock.
    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Returns the storage timeout.
    pub fn io_timeout(&self) -> Duration {
        self.io_timeout
    }

    /// Loads the document of `topic`, healing missing or corrupt data.
    ///
    /// A healed document is persisted right away; if that write fails the
    /// failure is logged and the seeded document is still returned.
    pub async fn load(&self, topic: Topic) -> Result<Loaded> {
        match self.read_raw(topic).await {
            Ok(Some(bytes)) => match CounterDocument::from_json(&bytes) {
                Ok(document) => {
                    return Ok(Loaded {
                        document,
                        seeded: false,
                    })
                }
                Err(err) => warn!(%topic, %err, "stored document is unreadable, reseeding"),
            },
            Ok(None) => debug!(%topic, "no stored document, seeding"),
            Err(err @ Error::Timeout { .. }) => return Err(err),
            Err(err) => warn!(%topic, %err, "failed to read stored document, reseeding"),
        }

        let document = self.seed(topic);
        if let Err(err) = self.save(topic, &document).await {
            warn!(%topic, %err, "failed to persist seeded document");
        }
        Ok(Loaded {
            document,
            seeded: true,
        })
    }

    /// Persists `document` as the document of `topic`.
    pub async fn save(&self, topic: Topic, document: &CounterDocument) -> Result<()> {
        let bytes = document
            .to_json_pretty()
            .map_err(|source| Error::Encode { topic, source })?;
        self.write_raw(topic, bytes).await
    }

    /// Reads the raw bytes of `topic` within the storage timeout.
    pub async fn read_raw(&self, topic: Topic) -> Result<Option<Vec<u8>>> {
        match timeout(self.io_timeout, self.backend.read(topic)).await {
            Ok(Ok(bytes)) => Ok(bytes),
            Ok(Err(source)) => Err(Error::Read { topic, source }),
            Err(_) => Err(Error::Timeout {
                topic,
                timeout: self.io_timeout,
            }),
        }
    }

    /// Writes raw bytes for `topic` within the storage timeout.
    ///
    /// A backend may not be able to abandon a write it has already handed to
    /// the operating system, so a write reported as [`Error::Timeout`] can
    /// still land later. The stored document then stays self-consistent, and
    /// the change watcher picks it up like any other edit.
    pub(crate) async fn write_raw(&self, topic: Topic, bytes: Vec<u8>) -> Result<()> {
        match timeout(self.io_timeout, self.backend.write(topic, bytes)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(source)) => Err(Error::Write { topic, source }),
            Err(_) => Err(Error::Timeout {
                topic,
                timeout: self.io_timeout,
            }),
        }
    }

    /// Builds the default document of `topic` for today.
    ///
    /// The visits document gets a fresh serial; the inventory document gets
    /// the placeholder until it is aligned with visits.
    pub fn seed(&self, topic: Topic) -> CounterDocument {
        let serial = match topic {
            Topic::Visits => Serial::generate(&mut rand::thread_rng()),
            Topic::Inventory => Serial::placeholder(),
        };
        CounterDocument::seeded(topic, self.clock.today(), serial)
    }
}

impl<B> fmt::Debug for DocumentStore<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentStore")
            .field("io_timeout", &self.io_timeout)
            .finish_non_exhaustive()
    }
}
