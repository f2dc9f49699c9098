//! Daily epoch handling: dates, serials and the rollover policy.
//!
//! Every document carries the calendar date it belongs to and a short random
//! serial identifying the day's batch of tickets. When a document is loaded on
//! a different day than the one it is stamped with, [`ensure_current_epoch`]
//! resets it in place:
//!
//! ```text
//!   stored                       today = 02-03-2025
//!   ┌──────────────────────┐     ┌──────────────────────┐
//!   │ date   01-03-2025    │     │ date   02-03-2025    │
//!   │ serial K7Q2          │ ──► │ serial 9ZB4 (fresh)  │
//!   │ B      41   (cursor) │     │ B      -1            │
//!   │ BBS    42   (stock)  │     │ BBS    0             │
//!   └──────────────────────┘     └──────────────────────┘
//! ```
//!
//! The `visits` document leads the epoch; [`align_epoch`] pushes its date and
//! serial into the `inventory` document so both share one batch per day.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{Local, NaiveDate};
use parking_lot::RwLock;
use rand::Rng;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::document::{Catalog, CounterDocument};

/// Number of symbols in a serial.
pub const SERIAL_LEN: usize = 4;

/// Symbols a generated serial is drawn from.
pub const SERIAL_ALPHABET: &[u8; 36] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

const DATE_FORMAT: &str = "%d-%m-%Y";

/// A calendar date, stored as `DD-MM-YYYY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EpochDate(NaiveDate);

impl EpochDate {
    /// Wraps a [`NaiveDate`].
    pub const fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    /// Builds a date from its parts, returning `None` if it does not exist.
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Self)
    }

    /// Returns the underlying [`NaiveDate`].
    pub fn as_naive_date(&self) -> NaiveDate {
        self.0
    }

    /// Returns the following day.
    pub fn next_day(&self) -> Option<Self> {
        self.0.succ_opt().map(Self)
    }

    /// Returns the preceding day.
    pub fn previous_day(&self) -> Option<Self> {
        self.0.pred_opt().map(Self)
    }
}

impl fmt::Display for EpochDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(DATE_FORMAT))
    }
}

impl FromStr for EpochDate {
    type Err = chrono::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveDate::parse_from_str(s, DATE_FORMAT).map(Self)
    }
}

impl Serialize for EpochDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EpochDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

/// Short token identifying one day's batch of tickets.
///
/// Generated serials are [`SERIAL_LEN`] symbols from [`SERIAL_ALPHABET`].
/// Stored serials are accepted as-is so a hand-edited document still loads.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Serial(String);

impl Serial {
    /// Serial written into an inventory document before it is aligned.
    pub const PLACEHOLDER: &'static str = "XXXX";

    /// Wraps an arbitrary serial string.
    pub fn new(serial: impl Into<String>) -> Self {
        Self(serial.into())
    }

    /// Returns the placeholder serial.
    pub fn placeholder() -> Self {
        Self::new(Self::PLACEHOLDER)
    }

    /// Draws a serial uniformly from [`SERIAL_ALPHABET`].
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let serial = (0..SERIAL_LEN)
            .map(|_| SERIAL_ALPHABET[rng.gen_range(0..SERIAL_ALPHABET.len())] as char)
            .collect();
        Self(serial)
    }

    /// Draws a serial that differs from `previous`.
    pub fn generate_distinct<R: Rng + ?Sized>(rng: &mut R, previous: &Serial) -> Self {
        loop {
            let serial = Self::generate(rng);
            if &serial != previous {
                return serial;
            }
        }
    }

    /// Returns the serial as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if the serial has the shape of a generated one.
    pub fn is_well_formed(&self) -> bool {
        self.0.len() == SERIAL_LEN && self.0.bytes().all(|b| SERIAL_ALPHABET.contains(&b))
    }
}

impl fmt::Display for Serial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Source of the current calendar date.
pub trait Clock: Send + Sync + 'static {
    /// Returns today's date.
    fn today(&self) -> EpochDate;
}

/// Reads the local calendar date from the system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> EpochDate {
        EpochDate(Local::now().date_naive())
    }
}

/// A clock that reports a settable date. Clones share the same date.
#[derive(Debug, Clone)]
pub struct FixedClock {
    date: Arc<RwLock<EpochDate>>,
}

impl FixedClock {
    /// Creates a clock stuck at `date`.
    pub fn new(date: EpochDate) -> Self {
        Self {
            date: Arc::new(RwLock::new(date)),
        }
    }

    /// Moves the clock to `date`.
    pub fn set(&self, date: EpochDate) {
        *self.date.write() = date;
    }

    /// Moves the clock forward by one day.
    pub fn advance_day(&self) {
        let mut date = self.date.write();
        if let Some(next) = date.next_day() {
            *date = next;
        }
    }
}

impl Clock for FixedClock {
    fn today(&self) -> EpochDate {
        *self.date.read()
    }
}

/// Rolls `doc` over to `today` if it is stamped with any other date.
///
/// On rollover the serial is regenerated, every cursor is reset to -1 and
/// every stock counter to 0. Returns whether a rollover happened; calling it
/// again with the same date is a no-op.
pub fn ensure_current_epoch(doc: &mut CounterDocument, catalog: &Catalog, today: EpochDate) -> bool {
    ensure_current_epoch_with(doc, catalog, today, &mut rand::thread_rng())
}

/// [`ensure_current_epoch`] with an explicit random source.
pub fn ensure_current_epoch_with<R: Rng + ?Sized>(
    doc: &mut CounterDocument,
    catalog: &Catalog,
    today: EpochDate,
    rng: &mut R,
) -> bool {
    if doc.date == today {
        return false;
    }
    doc.date = today;
    doc.serial = Serial::generate_distinct(rng, &doc.serial);
    reset_counters(doc, catalog);
    true
}

/// Brings `follower` onto the epoch of `leader`.
///
/// A follower stamped with another date is reset like a rollover; a follower
/// on the same date only adopts the leader's serial. Returns whether the
/// follower changed.
pub fn align_epoch(follower: &mut CounterDocument, leader: &CounterDocument, catalog: &Catalog) -> bool {
    let mut changed = false;
    if follower.date != leader.date {
        follower.date = leader.date;
        reset_counters(follower, catalog);
        changed = true;
    }
    if follower.serial != leader.serial {
        follower.serial = leader.serial.clone();
        changed = true;
    }
    changed
}

/// Resets every counter to its seed. Counters unknown to the catalog count
/// as stock and go to 0.
fn reset_counters(doc: &mut CounterDocument, catalog: &Catalog) {
    for (name, value) in doc.counters.iter_mut() {
        *value = catalog.seed_of(name);
    }
    for spec in catalog.iter() {
        doc.counters
            .entry(spec.name.to_string())
            .or_insert(spec.kind.seed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Topic;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn date(day: u32) -> EpochDate {
        EpochDate::from_ymd(2025, 3, day).unwrap()
    }

    fn stale_visits() -> CounterDocument {
        let mut doc = CounterDocument::seeded(Topic::Visits, date(1), Serial::new("AAAA"));
        doc.counters.insert("B".to_string(), 5);
        doc.counters.insert("BU".to_string(), 12);
        doc.counters.insert("BBS".to_string(), 6);
        doc
    }

    #[test]
    fn test_date_format() {
        let d = EpochDate::from_ymd(2025, 1, 7).unwrap();
        assert_eq!(d.to_string(), "07-01-2025");
        assert_eq!("07-01-2025".parse::<EpochDate>().unwrap(), d);
    }

    #[test]
    fn test_date_rejects_iso() {
        assert!("2025-01-07".parse::<EpochDate>().is_err());
    }

    #[test]
    fn test_date_serde() {
        let json = serde_json::to_string(&date(9)).unwrap();
        assert_eq!(json, "\"09-03-2025\"");
        let back: EpochDate = serde_json::from_str(&json).unwrap();
        assert_eq!(back, date(9));
    }

    #[test]
    fn test_generated_serial_shape() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let serial = Serial::generate(&mut rng);
            assert!(serial.is_well_formed(), "bad serial {serial}");
        }
    }

    #[test]
    fn test_placeholder_is_well_formed() {
        assert!(Serial::placeholder().is_well_formed());
        assert!(!Serial::new("abc").is_well_formed());
    }

    #[test]
    fn test_generate_distinct() {
        let mut rng = StdRng::seed_from_u64(11);
        let previous = Serial::new("AAAA");
        for _ in 0..100 {
            assert_ne!(Serial::generate_distinct(&mut rng, &previous), previous);
        }
    }

    #[test]
    fn test_rollover_resets_counters() {
        let mut doc = stale_visits();
        let rolled = ensure_current_epoch(&mut doc, Catalog::visits(), date(2));

        assert!(rolled);
        assert_eq!(doc.date, date(2));
        assert_ne!(doc.serial, Serial::new("AAAA"));
        assert!(doc.serial.is_well_formed());
        assert_eq!(doc.get("B"), Some(-1));
        assert_eq!(doc.get("BU"), Some(-1));
        assert_eq!(doc.get("BBS"), Some(0));
    }

    #[test]
    fn test_rollover_is_idempotent() {
        let mut doc = stale_visits();
        ensure_current_epoch(&mut doc, Catalog::visits(), date(2));
        let after_first = doc.clone();

        let rolled = ensure_current_epoch(&mut doc, Catalog::visits(), date(2));
        assert!(!rolled);
        assert_eq!(doc, after_first);
    }

    #[test]
    fn test_rollover_current_document_untouched() {
        let mut doc = stale_visits();
        let before = doc.clone();
        assert!(!ensure_current_epoch(&mut doc, Catalog::visits(), date(1)));
        assert_eq!(doc, before);
    }

    #[test]
    fn test_rollover_from_future_date() {
        let mut doc = stale_visits();
        assert!(ensure_current_epoch(&mut doc, Catalog::visits(), date(1).previous_day().unwrap()));
        assert_eq!(doc.get("B"), Some(-1));
    }

    #[test]
    fn test_rollover_unknown_counter_is_stock() {
        let mut doc = stale_visits();
        doc.counters.insert("LEGACY".to_string(), 9);
        ensure_current_epoch(&mut doc, Catalog::visits(), date(2));
        assert_eq!(doc.get("LEGACY"), Some(0));
    }

    #[test]
    fn test_rollover_fills_missing_counters() {
        let mut doc = stale_visits();
        doc.counters.remove("PT");
        ensure_current_epoch(&mut doc, Catalog::visits(), date(2));
        assert_eq!(doc.get("PT"), Some(-1));
    }

    #[test]
    fn test_align_adopts_serial_only_on_same_day() {
        let leader = CounterDocument::seeded(Topic::Visits, date(2), Serial::new("K7Q2"));
        let mut follower =
            CounterDocument::seeded(Topic::Inventory, date(2), Serial::placeholder());
        follower.counters.insert("COCA".to_string(), 4);

        assert!(align_epoch(&mut follower, &leader, Catalog::inventory()));
        assert_eq!(follower.serial, leader.serial);
        assert_eq!(follower.get("COCA"), Some(4));
        assert!(!align_epoch(&mut follower, &leader, Catalog::inventory()));
    }

    #[test]
    fn test_align_resets_stale_follower() {
        let leader = CounterDocument::seeded(Topic::Visits, date(2), Serial::new("K7Q2"));
        let mut follower = CounterDocument::seeded(Topic::Inventory, date(1), Serial::new("AAAA"));
        follower.counters.insert("COCA".to_string(), 4);

        assert!(align_epoch(&mut follower, &leader, Catalog::inventory()));
        assert_eq!(follower.date, date(2));
        assert_eq!(follower.serial, leader.serial);
        assert_eq!(follower.get("COCA"), Some(0));
    }

    #[test]
    fn test_fixed_clock_shared() {
        let clock = FixedClock::new(date(1));
        let other = clock.clone();
        clock.advance_day();
        assert_eq!(other.today(), date(2));
        other.set(date(5));
        assert_eq!(clock.today(), date(5));
    }
}
