//! Counter documents and the topics they live under.
//!
//! A [`CounterDocument`] is a flat map of counter names to signed integers,
//! stamped with the [`EpochDate`] it belongs to and the day's [`Serial`]. On
//! disk it is a single JSON object with the counters next to the stamp:
//!
//! ```json
//! {
//!   "date": "01-01-2025",
//!   "serial": "K7Q2",
//!   "B": 3,
//!   "BBS": 4,
//!   "BU": 2
//! }
//! ```
//!
//! Which counters a document is expected to hold, and how each one resets, is
//! described by the topic's [`Catalog`].

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::epoch::{EpochDate, Serial};
use crate::error::Error;

pub mod catalog;

pub use catalog::{Catalog, CounterKind, CounterSpec, Link, LINKS};

/// One of the two logical documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Topic {
    /// Issued ticket cursors and issued totals.
    Visits,
    /// Stock levels and outstanding-ticket aggregates.
    Inventory,
}

impl Topic {
    /// Both topics, in lock order.
    pub const ALL: [Topic; 2] = [Topic::Visits, Topic::Inventory];

    /// Returns the topic's stable identifier.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Topic::Visits => "visits",
            Topic::Inventory => "inventory",
        }
    }

    /// Returns the other topic.
    pub const fn other(&self) -> Topic {
        match self {
            Topic::Visits => Topic::Inventory,
            Topic::Inventory => Topic::Visits,
        }
    }

    /// Returns the counter catalog of this topic.
    pub fn catalog(&self) -> &'static Catalog {
        match self {
            Topic::Visits => Catalog::visits(),
            Topic::Inventory => Catalog::inventory(),
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Topic {
    type Err = Error;

    /// Accepts the topic identifiers and the display room names the
    /// counting screens use (`recuento`, `barra`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "visits" | "recuento" => Ok(Topic::Visits),
            "inventory" | "barra" => Ok(Topic::Inventory),
            _ => Err(Error::UnknownTopic(s.to_string())),
        }
    }
}

/// The persisted state of one topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterDocument {
    /// Day this document belongs to.
    pub date: EpochDate,
    /// Batch token shared by both documents for the day.
    pub serial: Serial,
    /// Counter values, keyed by counter name.
    #[serde(flatten)]
    pub counters: BTreeMap<String, i64>,
}

impl CounterDocument {
    /// Creates a document holding every counter of `topic` at its seed value.
    pub fn seeded(topic: Topic, date: EpochDate, serial: Serial) -> Self {
        Self {
            date,
            serial,
            counters: topic.catalog().seed_counters(),
        }
    }

    /// Returns the stored value of `name`, if present.
    pub fn get(&self, name: &str) -> Option<i64> {
        self.counters.get(name).copied()
    }

    /// Returns the stored value of `name`, or `seed` if it is absent.
    pub fn value_or(&self, name: &str, seed: i64) -> i64 {
        self.get(name).unwrap_or(seed)
    }

    /// Adds `delta` to `name`, starting from `seed` if it is absent, and
    /// returns the new value.
    pub fn add(&mut self, name: &str, seed: i64, delta: i64) -> i64 {
        let value = self.counters.entry(name.to_string()).or_insert(seed);
        *value = value.saturating_add(delta);
        *value
    }

    /// Parses a document from its JSON representation.
    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// Serializes the document as pretty-printed JSON.
    pub fn to_json_pretty(&self) -> Result<Vec<u8>, serde_json::Error> {
        let mut bytes = serde_json::to_vec_pretty(self)?;
        bytes.push(b'\n');
        Ok(bytes)
    }

    /// Returns `true` if both documents belong to the same day batch.
    pub fn same_epoch(&self, other: &CounterDocument) -> bool {
        self.date == other.date && self.serial == other.serial
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> EpochDate {
        EpochDate::from_ymd(2025, 1, 1).unwrap()
    }

    #[test]
    fn test_topic_from_str() {
        assert_eq!("visits".parse::<Topic>().unwrap(), Topic::Visits);
        assert_eq!("Recuento".parse::<Topic>().unwrap(), Topic::Visits);
        assert_eq!("barra".parse::<Topic>().unwrap(), Topic::Inventory);
        assert!(matches!(
            "kitchen".parse::<Topic>(),
            Err(Error::UnknownTopic(name)) if name == "kitchen"
        ));
    }

    #[test]
    fn test_topic_other() {
        assert_eq!(Topic::Visits.other(), Topic::Inventory);
        assert_eq!(Topic::Inventory.other(), Topic::Visits);
    }

    #[test]
    fn test_seeded_visits() {
        let doc = CounterDocument::seeded(Topic::Visits, today(), Serial::new("AAAA"));
        assert_eq!(doc.get("B"), Some(-1));
        assert_eq!(doc.get("BU"), Some(-1));
        assert_eq!(doc.get("BBS"), Some(0));
        assert_eq!(doc.get("COCA"), None);
    }

    #[test]
    fn test_seeded_inventory() {
        let doc = CounterDocument::seeded(Topic::Inventory, today(), Serial::placeholder());
        assert_eq!(doc.get("B"), Some(0));
        assert_eq!(doc.get("MAMON-QUESO"), Some(0));
    }

    #[test]
    fn test_add_uses_seed_for_missing() {
        let mut doc = CounterDocument {
            date: today(),
            serial: Serial::new("AAAA"),
            counters: BTreeMap::new(),
        };
        assert_eq!(doc.add("J", -1, 1), 0);
        assert_eq!(doc.add("J", -1, 1), 1);
        assert_eq!(doc.add("COCA", 0, -3), -3);
    }

    #[test]
    fn test_parse_flat_json() {
        let json = br#"{"date":"01-01-2025","serial":"AAAA","B":-1,"COCA-ZERO":7}"#;
        let doc = CounterDocument::from_json(json).unwrap();
        assert_eq!(doc.date, today());
        assert_eq!(doc.serial.as_str(), "AAAA");
        assert_eq!(doc.get("B"), Some(-1));
        assert_eq!(doc.get("COCA-ZERO"), Some(7));
        assert_eq!(doc.counters.len(), 2);
    }

    #[test]
    fn test_parse_rejects_non_integer_counter() {
        let json = br#"{"date":"01-01-2025","serial":"AAAA","B":"three"}"#;
        assert!(CounterDocument::from_json(json).is_err());
    }

    #[test]
    fn test_parse_rejects_missing_date() {
        let json = br#"{"serial":"AAAA","B":1}"#;
        assert!(CounterDocument::from_json(json).is_err());
    }

    #[test]
    fn test_pretty_json_is_flat() {
        let mut doc = CounterDocument::seeded(Topic::Visits, today(), Serial::new("AAAA"));
        doc.add("B", -1, 1);
        let text = String::from_utf8(doc.to_json_pretty().unwrap()).unwrap();
        assert!(text.contains("\"date\": \"01-01-2025\""));
        assert!(text.contains("\"B\": 0"));
        assert!(!text.contains("counters"));
        assert_eq!(CounterDocument::from_json(text.as_bytes()).unwrap(), doc);
    }

    #[test]
    fn test_same_epoch() {
        let a = CounterDocument::seeded(Topic::Visits, today(), Serial::new("AAAA"));
        let mut b = CounterDocument::seeded(Topic::Inventory, today(), Serial::new("AAAA"));
        assert!(a.same_epoch(&b));
        b.serial = Serial::placeholder();
        assert!(!a.same_epoch(&b));
    }
}
