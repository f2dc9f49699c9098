//! Runtime configuration.
//!
//! [`EngineConfig`] works like the other builder-style configs in the crate:
//! start from [`Default`] and override what you need, or read it from a JSON
//! file where every field is optional.
//!
//! ```json
//! {
//!   "data_dir": "/var/lib/turnero",
//!   "visits_file": "data.json",
//!   "inventory_file": "bar.json",
//!   "io_timeout_ms": 2000,
//!   "stations": { "cashier": "192.168.0.21:9100" }
//! }
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::document::Topic;
use crate::error::{Error, Result};
use crate::store::file::{INVENTORY_FILE, VISITS_FILE};
use crate::store::{DocumentStore, FileBackend, DEFAULT_IO_TIMEOUT};
use crate::tickets::Station;

/// Default interval between storage polls of the change notifier.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(75);

/// Default quiet window the change notifier waits for before emitting.
pub const DEFAULT_QUIET_WINDOW: Duration = Duration::from_millis(150);

/// Printer addresses of the operator stations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Stations {
    /// Printer at the cashier desk.
    pub cashier: String,
    /// Printer at the reception desk.
    pub reception: String,
}

impl Default for Stations {
    fn default() -> Self {
        Self {
            cashier: "127.0.0.1:9100".to_string(),
            reception: "127.0.0.1:9101".to_string(),
        }
    }
}

impl Stations {
    /// Returns the printer address of `station`.
    pub fn address(&self, station: Station) -> &str {
        match station {
            Station::Cashier => &self.cashier,
            Station::Reception => &self.reception,
        }
    }
}

/// Configuration of the engine, the change notifier and the fan-out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Directory holding both documents.
    pub data_dir: PathBuf,
    /// File name of the visits document.
    pub visits_file: String,
    /// File name of the inventory document.
    pub inventory_file: String,
    /// Bound on every storage call.
    #[serde(rename = "io_timeout_ms", with = "millis")]
    pub io_timeout: Duration,
    /// How often the change notifier polls storage.
    #[serde(rename = "poll_interval_ms", with = "millis")]
    pub poll_interval: Duration,
    /// How long storage must stay unchanged before an event is emitted.
    #[serde(rename = "quiet_window_ms", with = "millis")]
    pub quiet_window: Duration,
    /// Printer addresses.
    pub stations: Stations,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            visits_file: VISITS_FILE.to_string(),
            inventory_file: INVENTORY_FILE.to_string(),
            io_timeout: DEFAULT_IO_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            quiet_window: DEFAULT_QUIET_WINDOW,
            stations: Stations::default(),
        }
    }
}

impl EngineConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a configuration from a JSON file. Missing fields keep their
    /// defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_slice(&bytes).map_err(|source| Error::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Sets the data directory.
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    /// Sets both document file names.
    pub fn with_file_names(
        mut self,
        visits: impl Into<String>,
        inventory: impl Into<String>,
    ) -> Self {
        self.visits_file = visits.into();
        self.inventory_file = inventory.into();
        self
    }

    /// Sets the storage timeout.
    pub fn with_io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = timeout;
        self
    }

    /// Sets the notifier poll interval. Zero is raised to one millisecond.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(Duration::from_millis(1));
        self
    }

    /// Sets the notifier quiet window.
    pub fn with_quiet_window(mut self, window: Duration) -> Self {
        self.quiet_window = window;
        self
    }

    /// Sets the printer addresses.
    pub fn with_stations(mut self, stations: Stations) -> Self {
        self.stations = stations;
        self
    }

    /// Builds the file backend described by this configuration.
    pub fn file_backend(&self) -> FileBackend {
        FileBackend::new(&self.data_dir)
            .with_file_name(Topic::Visits, &self.visits_file)
            .with_file_name(Topic::Inventory, &self.inventory_file)
    }

    /// Builds a store on the file backend, using the system clock.
    pub fn store(&self) -> DocumentStore<FileBackend> {
        DocumentStore::new(self.file_backend()).with_io_timeout(self.io_timeout)
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.poll_interval, Duration::from_millis(75));
        assert_eq!(config.quiet_window, Duration::from_millis(150));
        assert_eq!(config.io_timeout, Duration::from_secs(5));
        assert_eq!(config.visits_file, "visits.json");
    }

    #[test]
    fn test_builder() {
        let config = EngineConfig::new()
            .with_data_dir("/tmp/counters")
            .with_file_names("data.json", "bar.json")
            .with_poll_interval(Duration::ZERO);

        assert_eq!(config.poll_interval, Duration::from_millis(1));
        assert_eq!(
            config.file_backend().path(Topic::Inventory),
            PathBuf::from("/tmp/counters/bar.json")
        );
    }

    #[test]
    fn test_from_json_file_partial() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"visits_file":"data.json","io_timeout_ms":2000,"stations":{{"cashier":"10.0.0.5:9100"}}}}"#
        )
        .unwrap();

        let config = EngineConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.visits_file, "data.json");
        assert_eq!(config.inventory_file, "inventory.json");
        assert_eq!(config.io_timeout, Duration::from_secs(2));
        assert_eq!(config.stations.address(Station::Cashier), "10.0.0.5:9100");
        assert_eq!(config.stations.address(Station::Reception), "127.0.0.1:9101");
    }

    #[test]
    fn test_from_json_file_rejects_unknown_field() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"pol_interval_ms":10}}"#).unwrap();

        let err = EngineConfig::from_json_file(file.path()).unwrap_err();
        assert!(matches!(err, Error::ConfigParse { .. }));
    }

    #[test]
    fn test_from_json_file_missing() {
        let err = EngineConfig::from_json_file("/nonexistent/turnero.json").unwrap_err();
        assert!(matches!(err, Error::ConfigRead { .. }));
    }
}
