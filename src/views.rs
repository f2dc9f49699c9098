//! Display values of a document.
//!
//! Screens show the number of the last ticket issued, not the stored
//! cursor: a cursor at -1 (nothing issued yet) reads `0`, a cursor at 4 reads
//! `5`. Stock counters are shown as stored.
//!
//! [`DocumentView`] lists the counters in catalog order, followed by any
//! counter the catalog does not know, and can be serialized as-is for a
//! display client.
//!
//! With the `table` feature, [`table::TableRenderer`] renders a view as a
//! text table.

use serde::Serialize;

use crate::document::{CounterDocument, CounterKind, Topic};
use crate::epoch::{EpochDate, Serial};

#[cfg(feature = "table")]
pub mod table;

/// One counter as shown on a screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewEntry {
    /// Counter name.
    pub name: String,
    /// Cursor or stock.
    pub kind: CounterKind,
    /// Value as stored.
    pub stored: i64,
    /// Value as displayed.
    pub display: i64,
}

/// A document prepared for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentView {
    /// Topic of the document.
    pub topic: Topic,
    /// Day of the document.
    pub date: EpochDate,
    /// Serial of the day.
    pub serial: Serial,
    /// Counters in display order.
    pub entries: Vec<ViewEntry>,
}

impl DocumentView {
    /// Builds the view of `document`, read as a document of `topic`.
    pub fn new(topic: Topic, document: &CounterDocument) -> Self {
        let catalog = topic.catalog();
        let known = catalog.iter().map(|spec| spec.name);
        let unknown = document
            .counters
            .keys()
            .map(String::as_str)
            .filter(|name| catalog.spec(name).is_none());

        let entries = known
            .chain(unknown)
            .map(|name| {
                let kind = catalog.kind_of(name);
                let stored = document.value_or(name, kind.seed());
                ViewEntry {
                    name: name.to_string(),
                    kind,
                    stored,
                    display: display_value(kind, stored),
                }
            })
            .collect();

        Self {
            topic,
            date: document.date,
            serial: document.serial.clone(),
            entries,
        }
    }

    /// Returns the entry of `name`.
    pub fn get(&self, name: &str) -> Option<&ViewEntry> {
        self.entries.iter().find(|entry| entry.name == name)
    }
}

/// Display value of a counter of `kind` storing `stored`.
pub fn display_value(kind: CounterKind, stored: i64) -> i64 {
    match kind {
        CounterKind::Cursor => stored.saturating_add(1),
        CounterKind::Stock => stored,
    }
}
