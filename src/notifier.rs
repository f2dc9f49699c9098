//! Change detection for both documents.
//!
//! One watch task per topic merges two triggers:
//!
//! ```text
//!   engine commit ──► change signal ─┐
//!                                    ├─► quiet window ─► snapshot ─► changed? ─► DocumentChanged
//!   storage watch ──► file event ────┘    (restarts on
//!                                          every trigger)
//! ```
//!
//! The engine raises the signal after each persisted write, so in-process
//! mutations are seen immediately. External edits of the backing files are
//! reported by the backend's [`Backend::watch`], which for files is a
//! `notify` poll watcher running at the configured poll interval. A burst of
//! triggers is coalesced: the document is reloaded once storage has been quiet
//! for the configured window.
//!
//! An event is only emitted when the reloaded document differs from the last
//! one emitted for the topic. The reload itself may write (a rollover, a
//! healed file), which triggers the watcher again, but the second reload
//! yields the same document and is swallowed. On startup each topic is
//! announced once.

use std::future::pending;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, Notify};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, trace, warn};

use crate::config::EngineConfig;
use crate::document::{CounterDocument, Topic};
use crate::engine::CounterEngine;
use crate::store::Backend;

/// Events buffered for slow listeners before they start lagging.
const EVENT_CAPACITY: usize = 64;

/// A document settled into a new state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentChanged {
    /// The topic that changed.
    pub topic: Topic,
    /// The freshly reloaded document.
    pub document: Arc<CounterDocument>,
}

/// Watches both documents and broadcasts [`DocumentChanged`] events.
///
/// The watch tasks stop when the notifier is dropped.
#[derive(Debug)]
pub struct ChangeNotifier {
    events: broadcast::Sender<DocumentChanged>,
    tasks: Vec<JoinHandle<()>>,
}

impl ChangeNotifier {
    /// Starts one watch task per topic.
    pub fn spawn<B: Backend>(engine: CounterEngine<B>, config: &EngineConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let tasks = Topic::ALL
            .into_iter()
            .map(|topic| {
                let watcher = Watcher {
                    topic,
                    engine: engine.clone(),
                    events: events.clone(),
                    poll_interval: config.poll_interval.max(Duration::from_millis(1)),
                    quiet_window: config.quiet_window,
                };
                tokio::spawn(watcher.run())
            })
            .collect();
        Self { events, tasks }
    }

    /// Returns a receiver of all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<DocumentChanged> {
        self.events.subscribe()
    }
}

impl Drop for ChangeNotifier {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

struct Watcher<B> {
    topic: Topic,
    engine: CounterEngine<B>,
    events: broadcast::Sender<DocumentChanged>,
    poll_interval: Duration,
    quiet_window: Duration,
}

impl<B: Backend> Watcher<B> {
    async fn run(self) {
        let signal = self.engine.change_signal(self.topic);
        let storage_changed = Arc::new(Notify::new());
        let _watch = match self.engine.store().backend().watch(
            self.topic,
            Arc::clone(&storage_changed),
            self.poll_interval,
        ) {
            Ok(watch) => Some(watch),
            Err(err) => {
                warn!(topic = %self.topic, %err, "cannot watch storage, external edits go unseen");
                None
            }
        };

        let mut last_emitted: Option<Arc<CounterDocument>> = None;
        // Announce the current document once.
        let mut deadline = Some(Instant::now());

        debug!(topic = %self.topic, "watching document");
        loop {
            let quiet_at = deadline;
            let quiet = async move {
                match quiet_at {
                    Some(at) => sleep_until(at).await,
                    None => pending::<()>().await,
                }
            };

            tokio::select! {
                _ = signal.notified() => {
                    trace!(topic = %self.topic, "commit signalled");
                    deadline = Some(Instant::now() + self.quiet_window);
                }
                _ = storage_changed.notified() => {
                    trace!(topic = %self.topic, "storage changed");
                    deadline = Some(Instant::now() + self.quiet_window);
                }
                _ = quiet => {
                    deadline = None;
                    self.reload(&mut last_emitted).await;
                }
            }
        }
    }

    async fn reload(&self, last_emitted: &mut Option<Arc<CounterDocument>>) {
        let document = match self.engine.snapshot(self.topic).await {
            Ok(document) => document,
            Err(err) => {
                warn!(topic = %self.topic, %err, "failed to reload changed document");
                return;
            }
        };
        if last_emitted.as_deref() == Some(&document) {
            trace!(topic = %self.topic, "document unchanged, not emitting");
            return;
        }

        let document = Arc::new(document);
        *last_emitted = Some(Arc::clone(&document));
        debug!(topic = %self.topic, serial = %document.serial, "document changed");
        // No listeners is fine.
        let _ = self.events.send(DocumentChanged {
            topic: self.topic,
            document,
        });
    }
}
