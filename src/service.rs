//! The assembled counter service.
//!
//! [`Service`] wires the pieces together:
//!
//! ```text
//!   issue_ticket / adjust_inventory
//!        │
//!        ▼
//!   CounterEngine ──► store ◄── external edits
//!        │              │
//!        └── signal ──► ChangeNotifier ──► pump ──► Hub ──► clients
//! ```
//!
//! Request routing and rendering live outside; they call in through the
//! methods here and read [`Update`](crate::fanout::Update)s from the client
//! mailboxes.

use std::sync::Arc;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::document::Topic;
use crate::engine::CounterEngine;
use crate::error::Result;
use crate::fanout::{ClientId, Hub, Updates};
use crate::notifier::{ChangeNotifier, DocumentChanged};
use crate::store::{Backend, DocumentStore, FileBackend};
use crate::tickets::{IssuedTicket, TicketKind};

/// Engine, change notifier and fan-out running together.
///
/// Background tasks stop when the service is dropped.
#[derive(Debug)]
pub struct Service<B> {
    engine: CounterEngine<B>,
    hub: Hub,
    _notifier: ChangeNotifier,
    pump: JoinHandle<()>,
}

impl Service<FileBackend> {
    /// Starts a service on the JSON files described by `config`.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::start(config.store(), config)
    }
}

impl<B: Backend> Service<B> {
    /// Starts the notifier and the fan-out on top of `store`.
    pub fn start(store: DocumentStore<B>, config: &EngineConfig) -> Self {
        let engine = CounterEngine::new(store);
        let hub = Hub::new();
        let notifier = ChangeNotifier::spawn(engine.clone(), config);
        let pump = tokio::spawn(pump(notifier.subscribe(), hub.clone()));
        Self {
            engine,
            hub,
            _notifier: notifier,
            pump,
        }
    }

    /// Returns the engine.
    pub fn engine(&self) -> &CounterEngine<B> {
        &self.engine
    }

    /// Returns the fan-out hub.
    pub fn hub(&self) -> &Hub {
        &self.hub
    }

    /// Registers a new client.
    pub fn connect(&self) -> (ClientId, Updates) {
        self.hub.connect()
    }

    /// Forgets a client.
    pub fn disconnect(&self, client: ClientId) -> bool {
        self.hub.disconnect(client)
    }

    /// Makes `client` follow `topic` and sends it the current document.
    ///
    /// The client joins before the snapshot is taken, so no change can fall
    /// between the snapshot and the first broadcast. If a broadcast reaches
    /// the client before the snapshot is handed over, the snapshot is dropped
    /// instead of overwriting it.
    pub async fn subscribe(&self, client: ClientId, topic: Topic) -> Result<()> {
        self.hub.join(client, topic)?;
        let document = self.engine.snapshot(topic).await?;
        if !self.hub.deliver(client, topic, Arc::new(document)) {
            debug!(%client, %topic, "initial snapshot superseded");
        }
        Ok(())
    }

    /// [`Service::subscribe`] with a topic or room name.
    pub async fn subscribe_named(&self, client: ClientId, topic: &str) -> Result<()> {
        let topic: Topic = topic.parse()?;
        self.subscribe(client, topic).await
    }

    /// Stops `client` from following its topic.
    pub fn unsubscribe(&self, client: ClientId) -> Option<Topic> {
        self.hub.unsubscribe(client)
    }

    /// Issues a ticket.
    pub async fn issue_ticket(&self, kind: TicketKind) -> Result<IssuedTicket> {
        self.engine.issue_ticket(kind).await
    }

    /// Moves an inventory item by `delta`.
    pub async fn adjust_inventory(&self, item: &str, delta: i64) -> Result<i64> {
        self.engine.adjust_stock(item, delta).await
    }
}

impl<B> Drop for Service<B> {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

async fn pump(mut events: broadcast::Receiver<DocumentChanged>, hub: Hub) {
    loop {
        match events.recv().await {
            Ok(event) => {
                hub.on_document_changed(event.topic, event.document);
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "fan-out fell behind change events");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::timeout;

    use super::*;
    use crate::document::CounterDocument;
    use crate::epoch::{EpochDate, FixedClock, Serial};
    use crate::error::Error;
    use crate::fanout::Update;
    use crate::store::MemoryBackend;

    fn today() -> EpochDate {
        EpochDate::from_ymd(2025, 1, 1).unwrap()
    }

    fn service() -> (MemoryBackend, Service<MemoryBackend>) {
        let backend = MemoryBackend::new();
        for topic in Topic::ALL {
            backend.put_document(
                topic,
                &CounterDocument::seeded(topic, today(), Serial::new("AAAA")),
            );
        }
        let store = DocumentStore::new(backend.clone()).with_clock(FixedClock::new(today()));
        (backend, Service::start(store, &EngineConfig::default()))
    }

    /// Receives updates until one satisfies `pred`.
    async fn wait_for(rx: &mut Updates, pred: impl Fn(&Update) -> bool) -> Update {
        timeout(Duration::from_secs(5), async {
            loop {
                let update = rx.recv().await.unwrap();
                if pred(&update) {
                    return update;
                }
            }
        })
        .await
        .unwrap()
    }

    /// Collects every update arriving within two seconds.
    async fn drain(rx: &mut Updates) -> Vec<Update> {
        let mut updates = Vec::new();
        while let Ok(Some(update)) = timeout(Duration::from_secs(2), rx.recv()).await {
            updates.push(update);
        }
        updates
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscribe_yields_snapshot_immediately() {
        let (_backend, service) = service();
        let (client, mut rx) = service.connect();

        service.subscribe(client, Topic::Visits).await.unwrap();

        let update = rx.try_recv().unwrap();
        assert_eq!(update.topic, Topic::Visits);
        assert_eq!(update.document.get("B"), Some(-1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticket_reaches_subscribers() {
        let (_backend, service) = service();
        let (visits_client, mut visits_rx) = service.connect();
        let (bar_client, mut bar_rx) = service.connect();
        service.subscribe(visits_client, Topic::Visits).await.unwrap();
        service.subscribe_named(bar_client, "barra").await.unwrap();

        service.issue_ticket(TicketKind::MealPaid).await.unwrap();

        let update = wait_for(&mut visits_rx, |u| u.document.get("B") == Some(0)).await;
        assert_eq!(update.document.get("BU"), Some(0));
        let update = wait_for(&mut bar_rx, |u| u.document.get("B") == Some(1)).await;
        assert_eq!(update.topic, Topic::Inventory);
    }

    #[tokio::test(start_paused = true)]
    async fn test_adjust_inventory_reaches_subscribers() {
        let (_backend, service) = service();
        let (client, mut rx) = service.connect();
        service.subscribe(client, Topic::Inventory).await.unwrap();

        assert_eq!(service.adjust_inventory("SPRITE", -2).await.unwrap(), -2);

        let update = wait_for(&mut rx, |u| u.document.get("SPRITE") == Some(-2)).await;
        assert_eq!(update.document.get("B"), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_external_edit_reaches_subscribers() {
        let (backend, service) = service();
        let (client, mut rx) = service.connect();
        service.subscribe(client, Topic::Visits).await.unwrap();

        let mut visits = backend.document(Topic::Visits).unwrap();
        visits.counters.insert("PA".to_string(), 6);
        backend.put_document(Topic::Visits, &visits);

        wait_for(&mut rx, |u| u.document.get("PA") == Some(6)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_resubscribe_stops_previous_topic() {
        let (_backend, service) = service();
        let (client, mut rx) = service.connect();
        service.subscribe(client, Topic::Visits).await.unwrap();
        service.subscribe(client, Topic::Inventory).await.unwrap();
        drain(&mut rx).await;

        service.engine().increment_sequence("J").await.unwrap();

        assert!(drain(&mut rx).await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsubscribe_stops_updates() {
        let (_backend, service) = service();
        let (client, mut rx) = service.connect();
        service.subscribe(client, Topic::Visits).await.unwrap();
        drain(&mut rx).await;

        assert_eq!(service.unsubscribe(client), Some(Topic::Visits));
        service.engine().increment_sequence("J").await.unwrap();

        assert!(drain(&mut rx).await.is_empty());
        assert!(service.disconnect(client));
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscribe_unknown_client_or_topic() {
        let (_backend, service) = service();
        let (client, _rx) = service.connect();

        assert!(matches!(
            service.subscribe_named(client, "kitchen").await,
            Err(Error::UnknownTopic(_))
        ));

        service.disconnect(client);
        assert!(matches!(
            service.subscribe(client, Topic::Visits).await,
            Err(Error::UnknownClient(_))
        ));
    }
}
