//! The counter mutation API.
//!
//! [`CounterEngine`] is the single owner of both documents. Every read and
//! every mutation goes through it, and each one runs as a transaction that
//! holds the per-topic critical section from load to persist:
//!
//! ```text
//!   increment_sequence("B")
//!     │
//!     ├─ lock visits ─ load ─ rollover? ─────────────┐
//!     ├─ lock inventory ─ load ─ align with visits   │  staged in memory
//!     ├─ visits.B += 1, visits.BBS += 1              │
//!     ├─ inventory.B += 1 ───────────────────────────┘
//!     ├─ persist visits ─ persist inventory (retry, compensate)
//!     └─ release both sections
//! ```
//!
//! Sections are always taken in the order `visits` → `inventory`, so two
//! linked transactions cannot deadlock. Each operation runs on its own tokio
//! task: if the caller stops waiting, the mutation still completes and
//! persists.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{Mutex, Notify};
use tracing::{debug, info};

use crate::document::{Catalog, CounterDocument, CounterKind, CounterSpec, Link, Topic};
use crate::error::{Error, Result};
use crate::store::{Backend, DocumentStore};
use crate::tickets::{IssuedStep, IssuedTicket, TicketCode, TicketKind};

mod transaction;

use transaction::Transaction;

/// Shared state behind every [`CounterEngine`] clone.
pub(crate) struct Inner<B> {
    store: DocumentStore<B>,
    visits: Mutex<()>,
    inventory: Mutex<()>,
    visits_changed: Notify,
    inventory_changed: Notify,
}

impl<B> Inner<B> {
    fn section(&self, topic: Topic) -> &Mutex<()> {
        match topic {
            Topic::Visits => &self.visits,
            Topic::Inventory => &self.inventory,
        }
    }

    fn signal(&self, topic: Topic) -> &Notify {
        match topic {
            Topic::Visits => &self.visits_changed,
            Topic::Inventory => &self.inventory_changed,
        }
    }
}

/// Serialized, persistent access to the visits and inventory documents.
///
/// Cloning is cheap; clones share the same documents and sections.
///
/// # Examples
///
/// ```rust,ignore
/// use turnero::engine::CounterEngine;
/// use turnero::store::{DocumentStore, FileBackend};
/// use turnero::tickets::TicketKind;
///
/// let engine = CounterEngine::new(DocumentStore::new(FileBackend::new("data")));
/// let ticket = engine.issue_ticket(TicketKind::MealPaid).await?;
/// println!("{ticket}"); // FORTINA BU01 B01 P01
/// ```
pub struct CounterEngine<B> {
    inner: Arc<Inner<B>>,
}

impl<B> Clone for CounterEngine<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B> std::fmt::Debug for CounterEngine<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CounterEngine")
            .field("store", &self.inner.store)
            .finish()
    }
}

impl<B: Backend> CounterEngine<B> {
    /// Creates an engine owning the documents of `store`.
    pub fn new(store: DocumentStore<B>) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                visits: Mutex::new(()),
                inventory: Mutex::new(()),
                visits_changed: Notify::new(),
                inventory_changed: Notify::new(),
            }),
        }
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &DocumentStore<B> {
        &self.inner.store
    }

    /// Signal raised after every persisted write to `topic`.
    pub fn change_signal(&self, topic: Topic) -> &Notify {
        self.inner.signal(topic)
    }

    /// Increments a visits cursor and returns the issued code.
    ///
    /// Shared cursors (`B`, `P`) also bump their issued total in visits and
    /// their aggregate in inventory, in the same transaction.
    pub async fn increment_sequence(&self, counter: &str) -> Result<TicketCode> {
        let spec = cursor_spec(counter)?;
        self.spawn(move |inner| async move {
            let mut tx = Transaction::begin(&inner, Topic::Visits).await?;
            let code = tx.increment(spec.name).await?;
            tx.commit().await?;
            debug!(%code, "sequence incremented");
            Ok(code)
        })
        .await
    }

    /// Runs the recipe of `kind` as one transaction.
    pub async fn issue_ticket(&self, kind: TicketKind) -> Result<IssuedTicket> {
        self.spawn(move |inner| async move {
            let mut tx = Transaction::begin(&inner, Topic::Visits).await?;
            let mut steps = Vec::with_capacity(kind.recipe().len());
            for step in kind.recipe() {
                let code = tx.increment(step.counter).await?;
                steps.push(IssuedStep {
                    code,
                    label: step.label,
                });
            }
            let (date, serial) = tx.epoch();
            tx.commit().await?;

            let ticket = IssuedTicket {
                kind,
                date,
                serial,
                steps,
            };
            info!(%ticket, "ticket issued");
            Ok(ticket)
        })
        .await
    }

    /// Parses a button name and issues that ticket kind.
    pub async fn issue_ticket_named(&self, name: &str) -> Result<IssuedTicket> {
        let kind: TicketKind = name.parse()?;
        self.issue_ticket(kind).await
    }

    /// Moves an inventory item by `delta` and returns its new level.
    ///
    /// The item's category aggregate moves by `-delta`; the matching issued
    /// total in visits moves by `delta`.
    pub async fn adjust_stock(&self, item: &str, delta: i64) -> Result<i64> {
        let (spec, link) = item_spec(item)?;
        self.spawn(move |inner| async move {
            let mut tx = Transaction::begin(&inner, Topic::Inventory).await?;
            let level = tx.adjust(spec.name, link, delta).await?;
            tx.commit().await?;
            debug!(item = spec.name, delta, level, "stock adjusted");
            Ok(level)
        })
        .await
    }

    /// Returns the current document of `topic`, rolling it over first if the
    /// day changed.
    pub async fn snapshot(&self, topic: Topic) -> Result<CounterDocument> {
        self.spawn(move |inner| async move {
            let mut tx = Transaction::begin(&inner, topic).await?;
            let document = tx.document(topic).await?;
            tx.commit().await?;
            Ok(document)
        })
        .await
    }

    /// Runs `task` on its own tokio task so it outlives a dropped caller.
    async fn spawn<T, F, Fut>(&self, task: F) -> Result<T>
    where
        F: FnOnce(Arc<Inner<B>>) -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        tokio::spawn(task(Arc::clone(&self.inner))).await?
    }
}

fn cursor_spec(name: &str) -> Result<&'static CounterSpec> {
    Catalog::visits()
        .spec(name)
        .filter(|spec| spec.kind == CounterKind::Cursor)
        .ok_or_else(|| Error::UnknownCounter {
            topic: Topic::Visits,
            name: name.to_string(),
        })
}

fn item_spec(name: &str) -> Result<(&'static CounterSpec, &'static Link)> {
    Catalog::inventory()
        .spec(name)
        .and_then(|spec| {
            spec.category
                .and_then(Link::for_category)
                .map(|link| (spec, link))
        })
        .ok_or_else(|| Error::UnknownCounter {
            topic: Topic::Inventory,
            name: name.to_string(),
        })
}
