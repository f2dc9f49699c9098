//! Staged read-modify-write over one or both documents.
//!
//! A [`Transaction`] owns the critical section of every document it touched
//! until it is committed or dropped. Mutations only change the staged copies;
//! nothing reaches storage before [`Transaction::commit`]. Dropping a
//! transaction without committing discards it.

use tokio::sync::MutexGuard;
use tracing::{debug, error, info, warn};

use super::Inner;
use crate::document::{Catalog, CounterDocument, Link, Topic};
use crate::epoch::{align_epoch, ensure_current_epoch, EpochDate, Serial};
use crate::error::{Error, Result};
use crate::store::Backend;
use crate::tickets::TicketCode;

/// A document held under its section, with the copy it was loaded as.
struct Staged<'a> {
    topic: Topic,
    _section: MutexGuard<'a, ()>,
    prior: CounterDocument,
    doc: CounterDocument,
    dirty: bool,
}

impl<'a> Staged<'a> {
    fn new(topic: Topic, section: MutexGuard<'a, ()>, doc: CounterDocument) -> Self {
        Self {
            topic,
            _section: section,
            prior: doc.clone(),
            doc,
            dirty: false,
        }
    }

    fn bump(&mut self, name: &str, delta: i64) -> i64 {
        self.dirty = true;
        let seed = self.topic.catalog().seed_of(name);
        self.doc.add(name, seed, delta)
    }
}

pub(super) struct Transaction<'a, B> {
    inner: &'a Inner<B>,
    primary: Topic,
    visits: Staged<'a>,
    inventory: Option<Staged<'a>>,
}

impl<'a, B: Backend> Transaction<'a, B> {
    /// Enters the visits section, loads visits and rolls it over if needed.
    ///
    /// The inventory section is entered right away when `primary` is the
    /// inventory or when visits just changed epoch, so the inventory is
    /// brought onto the same day batch in this transaction.
    pub(super) async fn begin(inner: &'a Inner<B>, primary: Topic) -> Result<Self> {
        let section = inner.section(Topic::Visits).lock().await;
        let loaded = inner.store.load(Topic::Visits).await?;
        let mut visits = Staged::new(Topic::Visits, section, loaded.document);

        let today = inner.store.clock().today();
        if ensure_current_epoch(&mut visits.doc, Catalog::visits(), today) {
            info!(
                date = %visits.doc.date,
                serial = %visits.doc.serial,
                previous = %visits.prior.date,
                "visits rolled over"
            );
            visits.dirty = true;
        }

        let epoch_changed = loaded.seeded || visits.dirty;
        let mut tx = Self {
            inner,
            primary,
            visits,
            inventory: None,
        };
        if epoch_changed || primary == Topic::Inventory {
            tx.inventory().await?;
        }
        Ok(tx)
    }

    /// Enters the inventory section on first use and aligns it with visits.
    async fn inventory(&mut self) -> Result<&mut Staged<'a>> {
        let staged = match self.inventory.take() {
            Some(staged) => staged,
            None => {
                let inner = self.inner;
                let section = inner.section(Topic::Inventory).lock().await;
                let loaded = inner.store.load(Topic::Inventory).await?;
                let mut staged = Staged::new(Topic::Inventory, section, loaded.document);
                if align_epoch(&mut staged.doc, &self.visits.doc, Catalog::inventory()) {
                    debug!(
                        date = %staged.doc.date,
                        serial = %staged.doc.serial,
                        "inventory aligned with visits"
                    );
                    staged.dirty = true;
                }
                staged
            }
        };
        Ok(self.inventory.insert(staged))
    }

    /// Advances a visits cursor, dragging its linked counters along.
    pub(super) async fn increment(&mut self, counter: &str) -> Result<TicketCode> {
        let stored = self.visits.bump(counter, 1);
        if let Some(link) = Link::for_cursor(counter) {
            self.visits.bump(link.issued_total, 1);
            self.inventory().await?.bump(link.inventory_aggregate, 1);
        }
        Ok(TicketCode::from_cursor(counter, stored))
    }

    /// Moves an inventory item and mirrors the delta into its aggregates.
    pub(super) async fn adjust(&mut self, item: &str, link: &Link, delta: i64) -> Result<i64> {
        let level = {
            let inventory = self.inventory().await?;
            inventory.bump(link.inventory_aggregate, -delta);
            inventory.bump(item, delta)
        };
        self.visits.bump(link.issued_total, delta);
        Ok(level)
    }

    /// Returns the staged document of `topic`.
    pub(super) async fn document(&mut self, topic: Topic) -> Result<CounterDocument> {
        match topic {
            Topic::Visits => Ok(self.visits.doc.clone()),
            Topic::Inventory => Ok(self.inventory().await?.doc.clone()),
        }
    }

    /// Date and serial of the day batch this transaction works in.
    pub(super) fn epoch(&self) -> (EpochDate, Serial) {
        (self.visits.doc.date, self.visits.doc.serial.clone())
    }

    /// Persists every changed document, primary first.
    ///
    /// Both documents are encoded before the first write. If the second
    /// write fails it is retried once; if the retry fails too, the first
    /// document is written back as it was loaded. Only when that restore
    /// fails as well does the caller see [`Error::PartialCommit`].
    pub(super) async fn commit(self) -> Result<()> {
        let mut staged: Vec<&Staged<'a>> = std::iter::once(&self.visits)
            .chain(self.inventory.as_ref())
            .filter(|staged| staged.dirty)
            .collect();
        staged.sort_by_key(|staged| staged.topic != self.primary);

        let mut pending = Vec::with_capacity(staged.len());
        for staged in staged {
            let bytes = staged
                .doc
                .to_json_pretty()
                .map_err(|source| Error::Encode {
                    topic: staged.topic,
                    source,
                })?;
            pending.push((staged, bytes));
        }

        let store = &self.inner.store;
        let mut pending = pending.into_iter();
        let Some((first, bytes)) = pending.next() else {
            return Ok(());
        };
        store.write_raw(first.topic, bytes).await?;
        self.inner.signal(first.topic).notify_waiters();

        let Some((second, bytes)) = pending.next() else {
            return Ok(());
        };
        let err = match store.write_raw(second.topic, bytes.clone()).await {
            Ok(()) => None,
            Err(err) => {
                warn!(topic = %second.topic, %err, "linked write failed, retrying");
                store.write_raw(second.topic, bytes).await.err()
            }
        };
        let Some(err) = err else {
            self.inner.signal(second.topic).notify_waiters();
            return Ok(());
        };

        match store.save(first.topic, &first.prior).await {
            Ok(()) => {
                warn!(
                    restored = %first.topic,
                    failed = %second.topic,
                    %err,
                    "linked write failed, first document restored"
                );
                self.inner.signal(first.topic).notify_waiters();
                Err(err)
            }
            Err(restore) => {
                error!(
                    committed = %first.topic,
                    failed = %second.topic,
                    %err,
                    %restore,
                    "documents out of step, manual reconciliation needed"
                );
                Err(Error::PartialCommit {
                    committed: first.topic,
                    failed: second.topic,
                    source: Box::new(err),
                })
            }
        }
    }
}
