//! In-memory backend with fault injection.
//!
//! Clones share the same storage, so a test can keep a handle to play the
//! part of an external process editing a document, or schedule write
//! failures and delays for a topic. Every stored change wakes the watchers
//! registered for the topic.

use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::document::{CounterDocument, Topic};
use crate::store::{Backend, StorageWatch};

/// Scheduled write failures for one topic: let `skip` writes through, then
/// fail the next `fail` writes.
#[derive(Debug, Clone, Copy, Default)]
struct WriteFault {
    skip: usize,
    fail: usize,
}

#[derive(Debug, Default)]
struct State {
    slots: HashMap<Topic, Vec<u8>>,
    faults: HashMap<Topic, WriteFault>,
    writes: HashMap<Topic, usize>,
    write_delay: Option<Duration>,
    watchers: HashMap<Topic, Vec<Arc<Notify>>>,
}

impl State {
    fn store(&mut self, topic: Topic, bytes: Vec<u8>) {
        self.slots.insert(topic, bytes);
        for watcher in self.watchers.get(&topic).into_iter().flatten() {
            watcher.notify_one();
        }
    }
}

/// Stores documents in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    state: Arc<Mutex<State>>,
}

impl MemoryBackend {
    /// Creates an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores raw bytes for `topic`, bypassing fault injection.
    pub fn put_raw(&self, topic: Topic, bytes: Vec<u8>) {
        self.state.lock().store(topic, bytes);
    }

    /// Stores `document` for `topic`, bypassing fault injection.
    pub fn put_document(&self, topic: Topic, document: &CounterDocument) {
        if let Ok(bytes) = document.to_json_pretty() {
            self.put_raw(topic, bytes);
        }
    }

    /// Returns the raw bytes stored for `topic`.
    pub fn raw(&self, topic: Topic) -> Option<Vec<u8>> {
        self.state.lock().slots.get(&topic).cloned()
    }

    /// Returns the parsed document stored for `topic`, if any parses.
    pub fn document(&self, topic: Topic) -> Option<CounterDocument> {
        self.raw(topic)
            .and_then(|bytes| CounterDocument::from_json(&bytes).ok())
    }

    /// Fails the next `count` writes to `topic`.
    pub fn fail_next_writes(&self, topic: Topic, count: usize) {
        self.fail_writes_after(topic, 0, count);
    }

    /// Lets `skip` writes to `topic` succeed, then fails the next `count`.
    pub fn fail_writes_after(&self, topic: Topic, skip: usize, count: usize) {
        self.state
            .lock()
            .faults
            .insert(topic, WriteFault { skip, fail: count });
    }

    /// Delays every write by `delay`.
    pub fn set_write_delay(&self, delay: Duration) {
        self.state.lock().write_delay = Some(delay);
    }

    /// Number of successful writes to `topic`.
    pub fn writes(&self, topic: Topic) -> usize {
        self.state.lock().writes.get(&topic).copied().unwrap_or(0)
    }
}

impl Backend for MemoryBackend {
    async fn read(&self, topic: Topic) -> io::Result<Option<Vec<u8>>> {
        Ok(self.raw(topic))
    }

    async fn write(&self, topic: Topic, bytes: Vec<u8>) -> io::Result<()> {
        let delay = self.state.lock().write_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock();
        if let Some(fault) = state.faults.get_mut(&topic) {
            if fault.skip > 0 {
                fault.skip -= 1;
            } else if fault.fail > 0 {
                fault.fail -= 1;
                return Err(io::Error::new(
                    io::ErrorKind::Other,
                    format!("injected write failure on {topic}"),
                ));
            }
        }
        state.store(topic, bytes);
        *state.writes.entry(topic).or_insert(0) += 1;
        Ok(())
    }

    fn watch(
        &self,
        topic: Topic,
        changed: Arc<Notify>,
        _poll_interval: Duration,
    ) -> io::Result<StorageWatch> {
        self.state
            .lock()
            .watchers
            .entry(topic)
            .or_default()
            .push(changed);
        Ok(StorageWatch::new(()))
    }
}
