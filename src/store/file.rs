//! JSON files on disk, one per topic.
//!
//! Each write goes to a fresh temporary file next to the target and is
//! renamed into place, so a reader (or the change watcher) never sees a
//! half-written document and two writes never share a temporary file.
//! External tools may edit the files directly; the next load picks the edit
//! up, and [`Backend::watch`] reports it.

use std::ffi::OsString;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{Config, Event, PollWatcher, RecursiveMode, Watcher};
use tempfile::NamedTempFile;
use tokio::fs;
use tokio::sync::Notify;
use tokio::task;
use tracing::debug;

use crate::document::Topic;
use crate::store::{Backend, StorageWatch};

/// Default file name of the visits document.
pub const VISITS_FILE: &str = "visits.json";

/// Default file name of the inventory document.
pub const INVENTORY_FILE: &str = "inventory.json";

/// Stores each topic as a pretty-printed JSON file in one directory.
#[derive(Debug, Clone)]
pub struct FileBackend {
    dir: PathBuf,
    visits_file: String,
    inventory_file: String,
}

impl FileBackend {
    /// Creates a backend storing its files in `dir`.
    ///
    /// The directory is created on first write or watch.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            visits_file: VISITS_FILE.to_string(),
            inventory_file: INVENTORY_FILE.to_string(),
        }
    }

    /// Overrides the file name used for `topic`.
    pub fn with_file_name(mut self, topic: Topic, name: impl Into<String>) -> Self {
        match topic {
            Topic::Visits => self.visits_file = name.into(),
            Topic::Inventory => self.inventory_file = name.into(),
        }
        self
    }

    /// Returns the directory holding the documents.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the path of the document of `topic`.
    pub fn path(&self, topic: Topic) -> PathBuf {
        self.dir.join(self.file_name(topic))
    }

    fn file_name(&self, topic: Topic) -> &str {
        match topic {
            Topic::Visits => &self.visits_file,
            Topic::Inventory => &self.inventory_file,
        }
    }
}

impl Backend for FileBackend {
    async fn read(&self, topic: Topic) -> io::Result<Option<Vec<u8>>> {
        match fs::read(self.path(topic)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn write(&self, topic: Topic, bytes: Vec<u8>) -> io::Result<()> {
        let dir = self.dir.clone();
        let path = self.path(topic);
        task::spawn_blocking(move || -> io::Result<()> {
            std::fs::create_dir_all(&dir)?;
            let mut temp = NamedTempFile::new_in(&dir)?;
            temp.write_all(&bytes)?;
            temp.persist(&path).map_err(|err| err.error)?;
            Ok(())
        })
        .await
        .map_err(io::Error::other)?
    }

    /// Polls the data directory and wakes `changed` for events on the
    /// document of `topic`. The directory is watched rather than the file, so
    /// a document created later is still seen.
    fn watch(
        &self,
        topic: Topic,
        changed: Arc<Notify>,
        poll_interval: Duration,
    ) -> io::Result<StorageWatch> {
        std::fs::create_dir_all(&self.dir)?;
        let name = OsString::from(self.file_name(topic));
        let handler = move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if event
                    .paths
                    .iter()
                    .any(|path| path.file_name() == Some(name.as_os_str()))
                {
                    changed.notify_one();
                }
            }
            Err(err) => debug!(%topic, %err, "storage watch error"),
        };
        let config = Config::default()
            .with_poll_interval(poll_interval)
            .with_compare_contents(true);
        let mut watcher = PollWatcher::new(handler, config).map_err(io::Error::other)?;
        watcher
            .watch(&self.dir, RecursiveMode::NonRecursive)
            .map_err(io::Error::other)?;
        debug!(%topic, dir = %self.dir.display(), "watching storage");
        Ok(StorageWatch::new(watcher))
    }
}

#[cfg(test)]
mod tests {
    use tokio::time::timeout;

    use super::*;

    #[tokio::test]
    async fn test_read_missing() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(dir.path());
        assert_eq!(backend.read(Topic::Visits).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(dir.path().join("nested"));

        backend
            .write(Topic::Inventory, b"{\"x\":1}".to_vec())
            .await
            .unwrap();

        assert_eq!(
            backend.read(Topic::Inventory).await.unwrap(),
            Some(b"{\"x\":1}".to_vec())
        );
        assert!(backend.path(Topic::Inventory).ends_with("nested/inventory.json"));
        let entries: Vec<_> = std::fs::read_dir(backend.dir())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(entries, [OsString::from("inventory.json")]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writes_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(dir.path());

        let writes = (0..16u8).map(|i| {
            let backend = backend.clone();
            tokio::spawn(async move { backend.write(Topic::Visits, vec![b'a' + i; 4096]).await })
        });
        for write in writes.collect::<Vec<_>>() {
            write.await.unwrap().unwrap();
        }

        let stored = backend.read(Topic::Visits).await.unwrap().unwrap();
        assert_eq!(stored.len(), 4096);
        assert!(stored.iter().all(|&byte| byte == stored[0]));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_topics_use_separate_files() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(dir.path())
            .with_file_name(Topic::Visits, "data.json")
            .with_file_name(Topic::Inventory, "bar.json");

        backend.write(Topic::Visits, b"v".to_vec()).await.unwrap();
        backend.write(Topic::Inventory, b"i".to_vec()).await.unwrap();

        assert_eq!(std::fs::read(dir.path().join("data.json")).unwrap(), b"v");
        assert_eq!(std::fs::read(dir.path().join("bar.json")).unwrap(), b"i");
    }

    #[tokio::test]
    async fn test_external_edit_is_visible() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(dir.path());
        backend.write(Topic::Visits, b"old".to_vec()).await.unwrap();

        std::fs::write(backend.path(Topic::Visits), b"new").unwrap();
        assert_eq!(
            backend.read(Topic::Visits).await.unwrap(),
            Some(b"new".to_vec())
        );
    }

    #[tokio::test]
    async fn test_watch_reports_external_edit() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(dir.path());
        backend.write(Topic::Visits, b"old".to_vec()).await.unwrap();

        let changed = Arc::new(Notify::new());
        let _watch = backend
            .watch(Topic::Visits, Arc::clone(&changed), Duration::from_millis(10))
            .unwrap();
        std::fs::write(backend.path(Topic::Visits), b"edited").unwrap();

        timeout(Duration::from_secs(5), changed.notified())
            .await
            .expect("edit not reported");
    }

    #[tokio::test]
    async fn test_watch_sees_document_created_later() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(dir.path().join("later"));

        let changed = Arc::new(Notify::new());
        let _watch = backend
            .watch(Topic::Inventory, Arc::clone(&changed), Duration::from_millis(10))
            .unwrap();
        backend.write(Topic::Inventory, b"{}".to_vec()).await.unwrap();

        timeout(Duration::from_secs(5), changed.notified())
            .await
            .expect("creation not reported");
    }
}
