//! Topic subscriptions for live displays.
//!
//! The [`Hub`] keeps, for every connected client, a mailbox and the one topic
//! the client currently follows. Every change of a topic is sent as a full
//! document snapshot to all of its subscribers.
//!
//! A mailbox holds only the newest update: a client that reads slower than
//! documents change skips the intermediate snapshots and always ends on the
//! current one. Sends never block. A client whose [`Updates`] is gone is
//! dropped from the hub.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, trace};

use crate::document::{CounterDocument, Topic};
use crate::error::{Error, Result};

/// Identifies a connected client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(u64);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client-{}", self.0)
    }
}

/// A full snapshot of a topic, as sent to clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Update {
    /// Topic of the snapshot.
    pub topic: Topic,
    /// The document.
    pub document: Arc<CounterDocument>,
}

/// Receiving end of a client's mailbox.
#[derive(Debug)]
pub struct Updates(watch::Receiver<Option<Update>>);

impl Updates {
    /// Waits for the next update. Returns `None` once the client has been
    /// disconnected and nothing is left to read.
    pub async fn recv(&mut self) -> Option<Update> {
        loop {
            self.0.changed().await.ok()?;
            if let Some(update) = self.0.borrow_and_update().clone() {
                return Some(update);
            }
        }
    }

    /// Returns the pending update, if one arrived since the last read.
    pub fn try_recv(&mut self) -> Option<Update> {
        if !matches!(self.0.has_changed(), Ok(true)) {
            return None;
        }
        self.0.borrow_and_update().clone()
    }
}

#[derive(Debug)]
struct Client {
    mailbox: watch::Sender<Option<Update>>,
    topic: Option<Topic>,
    /// A broadcast reached the client after it joined `topic`.
    current: bool,
}

impl Client {
    /// Replaces the pending update. Returns `false` if the receiver is gone.
    fn send(&self, update: Update) -> bool {
        self.mailbox.send(Some(update)).is_ok()
    }
}

#[derive(Debug, Default)]
struct State {
    clients: HashMap<ClientId, Client>,
    topics: HashMap<Topic, BTreeSet<ClientId>>,
}

impl State {
    fn leave(&mut self, client: ClientId) -> Option<Topic> {
        let entry = self.clients.get_mut(&client)?;
        entry.current = false;
        let topic = entry.topic.take()?;
        if let Some(members) = self.topics.get_mut(&topic) {
            members.remove(&client);
        }
        Some(topic)
    }

    fn remove(&mut self, client: ClientId) -> bool {
        self.leave(client);
        self.clients.remove(&client).is_some()
    }
}

#[derive(Debug)]
struct Inner {
    state: Mutex<State>,
    next_client_id: AtomicU64,
}

/// Registry of clients and the topic each one follows.
///
/// Cloning is cheap; clones share the registry.
#[derive(Debug, Clone)]
pub struct Hub(Arc<Inner>);

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}

impl Hub {
    /// Creates an empty hub.
    pub fn new() -> Self {
        Self(Arc::new(Inner {
            state: Mutex::new(State::default()),
            next_client_id: AtomicU64::new(1),
        }))
    }

    /// Registers a client and returns the receiving end of its mailbox.
    pub fn connect(&self) -> (ClientId, Updates) {
        let id = ClientId(self.0.next_client_id.fetch_add(1, Ordering::Relaxed));
        let (mailbox, receiver) = watch::channel(None);
        self.0.state.lock().clients.insert(
            id,
            Client {
                mailbox,
                topic: None,
                current: false,
            },
        );
        debug!(client = %id, "client connected");
        (id, Updates(receiver))
    }

    /// Forgets a client. Returns `false` if it was not connected.
    pub fn disconnect(&self, client: ClientId) -> bool {
        let removed = self.0.state.lock().remove(client);
        if removed {
            debug!(%client, "client disconnected");
        }
        removed
    }

    /// Makes `client` follow `topic`, leaving the topic it followed before.
    pub fn join(&self, client: ClientId, topic: Topic) -> Result<()> {
        let mut state = self.0.state.lock();
        if !state.clients.contains_key(&client) {
            return Err(Error::UnknownClient(client));
        }
        let previous = state.leave(client);
        state.topics.entry(topic).or_default().insert(client);
        if let Some(entry) = state.clients.get_mut(&client) {
            entry.topic = Some(topic);
        }
        debug!(%client, %topic, previous = ?previous, "client joined topic");
        Ok(())
    }

    /// Stops `client` from following any topic. Returns the topic it left.
    pub fn unsubscribe(&self, client: ClientId) -> Option<Topic> {
        let left = self.0.state.lock().leave(client);
        if let Some(topic) = left {
            debug!(%client, %topic, "client left topic");
        }
        left
    }

    /// Sends the snapshot taken right after `client` joined `topic`.
    ///
    /// The snapshot is discarded when the client no longer follows `topic`,
    /// or when a broadcast for it already reached the client since it joined:
    /// that broadcast is at least as recent as the snapshot, or is followed
    /// by one that is. Returns whether it was sent.
    pub fn deliver(&self, client: ClientId, topic: Topic, document: Arc<CounterDocument>) -> bool {
        let mut state = self.0.state.lock();
        let Some(entry) = state.clients.get(&client) else {
            return false;
        };
        if entry.topic != Some(topic) || entry.current {
            trace!(%client, %topic, "snapshot superseded, not sent");
            return false;
        }
        if entry.send(Update { topic, document }) {
            return true;
        }
        debug!(%client, "client mailbox closed, pruning");
        state.remove(client);
        false
    }

    /// Sends `document` to every subscriber of `topic`. Returns how many
    /// clients it was sent to.
    pub fn on_document_changed(&self, topic: Topic, document: Arc<CounterDocument>) -> usize {
        let mut state = self.0.state.lock();
        let Some(members) = state.topics.get(&topic).cloned() else {
            return 0;
        };

        let mut delivered = 0;
        let mut closed = Vec::new();
        for id in members {
            let Some(client) = state.clients.get_mut(&id) else {
                continue;
            };
            let update = Update {
                topic,
                document: Arc::clone(&document),
            };
            if client.send(update) {
                client.current = true;
                delivered += 1;
            } else {
                closed.push(id);
            }
        }
        for id in closed {
            debug!(client = %id, "client mailbox closed, pruning");
            state.remove(id);
        }
        trace!(%topic, delivered, "broadcast update");
        delivered
    }

    /// Number of clients following `topic`.
    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.0
            .state
            .lock()
            .topics
            .get(&topic)
            .map_or(0, BTreeSet::len)
    }

    /// Topic `client` follows, if any.
    pub fn topic_of(&self, client: ClientId) -> Option<Topic> {
        self.0.state.lock().clients.get(&client)?.topic
    }

    /// Number of connected clients.
    pub fn client_count(&self) -> usize {
        self.0.state.lock().clients.len()
    }
}
