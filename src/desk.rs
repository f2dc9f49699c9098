//! Ticket issuance with printing.
//!
//! A [`TicketDesk`] issues a ticket through the [`CounterEngine`] and then
//! hands every printable step to a [`Printer`], addressed to the station the
//! ticket kind belongs to. Printing only starts once the numbers are
//! persisted, and a printer failure never takes a number back: the caller
//! gets [`Error::Print`] with the ticket that was issued, so it can be
//! reprinted by hand.

use std::future::Future;

use thiserror::Error;
use tracing::{debug, warn};

use crate::config::Stations;
use crate::engine::CounterEngine;
use crate::epoch::{EpochDate, Serial};
use crate::error::{Error, Result};
use crate::store::Backend;
use crate::tickets::{IssuedTicket, Station, TicketCode, TicketKind};

/// One printed slip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintJob {
    /// Text heading the slip.
    pub label: &'static str,
    /// The issued code.
    pub code: TicketCode,
    /// Day the code belongs to.
    pub date: EpochDate,
    /// Serial of the day, printed as the slip's barcode.
    pub serial: Serial,
    /// Station the slip is printed at.
    pub station: Station,
    /// Printer address of that station.
    pub address: String,
}

/// Failure reported by a [`Printer`].
#[derive(Debug, Error)]
pub enum PrintError {
    /// The printer could not be reached.
    #[error("printer {address} unreachable: {source}")]
    Connect {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// The printer refused the job.
    #[error("printer {address} rejected the job: {reason}")]
    Rejected { address: String, reason: String },
}

/// A receipt printer.
pub trait Printer: Send + Sync + 'static {
    /// Prints one slip.
    fn print(&self, job: &PrintJob) -> impl Future<Output = std::result::Result<(), PrintError>> + Send;
}

/// A printer that prints nothing and only logs the job.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullPrinter;

impl Printer for NullPrinter {
    async fn print(&self, job: &PrintJob) -> std::result::Result<(), PrintError> {
        debug!(
            label = job.label,
            code = %job.code,
            serial = %job.serial,
            address = %job.address,
            "print skipped"
        );
        Ok(())
    }
}

/// Issues tickets and prints them.
#[derive(Debug)]
pub struct TicketDesk<B, P> {
    engine: CounterEngine<B>,
    printer: P,
    stations: Stations,
}

impl<B: Backend, P: Printer> TicketDesk<B, P> {
    /// Creates a desk printing to the given stations.
    pub fn new(engine: CounterEngine<B>, printer: P, stations: Stations) -> Self {
        Self {
            engine,
            printer,
            stations,
        }
    }

    /// Returns the engine.
    pub fn engine(&self) -> &CounterEngine<B> {
        &self.engine
    }

    /// Issues a ticket of `kind` and prints each labeled step.
    pub async fn issue(&self, kind: TicketKind) -> Result<IssuedTicket> {
        let ticket = self.engine.issue_ticket(kind).await?;
        for job in self.jobs(&ticket) {
            if let Err(source) = self.printer.print(&job).await {
                warn!(%ticket, code = %job.code, %source, "ticket issued but not printed");
                return Err(Error::Print { ticket, source });
            }
        }
        Ok(ticket)
    }

    /// Parses a button name and issues that ticket kind.
    pub async fn issue_named(&self, name: &str) -> Result<IssuedTicket> {
        let kind: TicketKind = name.parse()?;
        self.issue(kind).await
    }

    /// Builds the slips of an issued ticket, skipping counted-only steps.
    pub fn jobs(&self, ticket: &IssuedTicket) -> Vec<PrintJob> {
        let station = ticket.kind.station();
        let address = self.stations.address(station);
        ticket
            .steps
            .iter()
            .filter_map(|step| {
                step.label.map(|label| PrintJob {
                    label,
                    code: step.code.clone(),
                    date: ticket.date,
                    serial: ticket.serial.clone(),
                    station,
                    address: address.to_string(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;
    use crate::document::{CounterDocument, Topic};
    use crate::epoch::FixedClock;
    use crate::store::{DocumentStore, MemoryBackend};

    #[derive(Debug, Clone, Default)]
    struct RecordingPrinter {
        jobs: Arc<Mutex<Vec<PrintJob>>>,
        fail_after: Option<usize>,
    }

    impl Printer for RecordingPrinter {
        async fn print(&self, job: &PrintJob) -> std::result::Result<(), PrintError> {
            let mut jobs = self.jobs.lock();
            if self.fail_after.is_some_and(|limit| jobs.len() >= limit) {
                return Err(PrintError::Rejected {
                    address: job.address.clone(),
                    reason: "out of paper".to_string(),
                });
            }
            jobs.push(job.clone());
            Ok(())
        }
    }

    fn today() -> EpochDate {
        EpochDate::from_ymd(2025, 1, 1).unwrap()
    }

    fn desk(printer: RecordingPrinter) -> (MemoryBackend, TicketDesk<MemoryBackend, RecordingPrinter>) {
        let backend = MemoryBackend::new();
        for topic in Topic::ALL {
            backend.put_document(
                topic,
                &CounterDocument::seeded(topic, today(), Serial::new("K7Q2")),
            );
        }
        let engine = CounterEngine::new(
            DocumentStore::new(backend.clone()).with_clock(FixedClock::new(today())),
        );
        (backend, TicketDesk::new(engine, printer, Stations::default()))
    }

    #[tokio::test]
    async fn test_prints_every_labeled_step() {
        let printer = RecordingPrinter::default();
        let (_backend, desk) = desk(printer.clone());

        desk.issue(TicketKind::MealPaid).await.unwrap();

        let jobs = printer.jobs.lock();
        let labels: Vec<_> = jobs.iter().map(|job| job.label).collect();
        assert_eq!(labels, ["BUFFET FORTIN", "BEBIDA FORTIN", "POSTRE FORTIN"]);
        assert!(jobs.iter().all(|job| job.station == Station::Cashier));
        assert!(jobs.iter().all(|job| job.address == "127.0.0.1:9100"));
        assert!(jobs.iter().all(|job| job.serial == Serial::new("K7Q2")));
        assert_eq!(jobs[1].code.to_string(), "B01");
    }

    #[tokio::test]
    async fn test_counted_only_step_is_not_printed() {
        let printer = RecordingPrinter::default();
        let (backend, desk) = desk(printer.clone());

        let ticket = desk.issue_named("fortinb").await.unwrap();

        assert_eq!(ticket.steps.len(), 3);
        let jobs = printer.jobs.lock();
        assert_eq!(jobs.len(), 2);
        assert!(jobs.iter().all(|job| job.station == Station::Reception));
        assert_eq!(backend.document(Topic::Visits).unwrap().get("BL"), Some(0));
    }

    #[tokio::test]
    async fn test_print_failure_keeps_issued_numbers() {
        let printer = RecordingPrinter {
            fail_after: Some(1),
            ..Default::default()
        };
        let (backend, desk) = desk(printer.clone());

        let err = desk.issue(TicketKind::CrewMeal).await.unwrap_err();

        let Error::Print { ticket, .. } = &err else {
            panic!("expected print error, got {err}");
        };
        assert_eq!(ticket.to_string(), "TRIPULANTE AT01 BT01 PT01");
        assert!(!err.is_clean());
        assert_eq!(backend.document(Topic::Visits).unwrap().get("PT"), Some(0));

        let next = desk.engine().issue_ticket(TicketKind::CrewMeal).await.unwrap();
        assert_eq!(next.to_string(), "TRIPULANTE AT02 BT02 PT02");
    }

    #[tokio::test]
    async fn test_unknown_button_prints_nothing() {
        let printer = RecordingPrinter::default();
        let (_backend, desk) = desk(printer.clone());

        assert!(matches!(
            desk.issue_named("FORTINE").await,
            Err(Error::UnknownTicketKind(_))
        ));
        assert!(printer.jobs.lock().is_empty());
    }

    #[tokio::test]
    async fn test_null_printer_accepts_jobs() {
        let backend = MemoryBackend::new();
        let engine = CounterEngine::new(
            DocumentStore::new(backend).with_clock(FixedClock::new(today())),
        );
        let desk = TicketDesk::new(engine, NullPrinter, Stations::default());

        let ticket = desk.issue(TicketKind::StandaloneB).await.unwrap();
        assert_eq!(ticket.to_string(), "BAR BF01");
    }
}
