//! # Turnero - Daily Ticket Counters Shared Between Stations
//!
//! A Rust library that hands out sequential ticket numbers (meals, drinks,
//! desserts, standalone tickets) at a site with two operator stations, tracks
//! the matching stock levels, and keeps every connected display in sync.
//!
//! ## The Problem
//!
//! Ticket numbers live in two small JSON documents: **visits** (one cursor
//! per ticket sequence) and **inventory** (stock levels per item). Several
//! requests may issue tickets at the same moment, some tickets touch both
//! documents at once, the numbering restarts every day, and other tools may
//! edit the files by hand while the service runs.
//!
//! Done naively this loses updates (two guests get `B07`), lets the two
//! documents drift apart when only one of two writes lands, and floods the
//! displays with duplicate refreshes.
//!
//! ## The Solution
//!
//! ```text
//! ┌──────────────┐   ┌───────────────────────────┐   ┌────────────────┐
//! │ TicketDesk   │──►│ CounterEngine             │──►│ DocumentStore  │
//! │  (+ Printer) │   │  per-topic sections       │   │  visits.json   │
//! └──────────────┘   │  rollover + alignment     │   │  inventory.json│
//!                    │  staged two-phase commit  │   └───────▲────────┘
//!                    └────────────┬──────────────┘           │ watched
//!                                 │ signal           ┌───────┴────────┐
//!                                 └─────────────────►│ ChangeNotifier │
//!                                                    └───────┬────────┘
//!                                                            ▼
//!                                                    ┌────────────────┐
//!                                                    │ Hub ──► clients│
//!                                                    └────────────────┘
//! ```
//!
//! ### Design Principles
//!
//! 1. **One owner per document**: every read and write goes through the
//!    [`CounterEngine`](engine::CounterEngine), which holds an async mutex per
//!    document for the whole load-modify-persist sequence. Linked updates take
//!    both sections, always `visits` before `inventory`.
//!
//! 2. **Daily epoch**: each document carries a `date` and a 4-character
//!    `serial`. The first access on a new day resets cursors to -1 and stock
//!    to 0, draws a new serial and brings the inventory onto the same batch.
//!
//! 3. **Linked writes commit together**: both documents are staged in memory,
//!    then written primary first. A failed second write is retried once and
//!    otherwise the first is restored; only if that fails too does the caller
//!    see [`Error::PartialCommit`].
//!
//! 4. **Heal, don't block**: a missing or corrupt document is replaced with a
//!    seeded one. Only failed or timed-out writes fail a request.
//!
//! 5. **Full snapshots downstream**: displays always receive the whole
//!    document, deduplicated by content. A client's mailbox keeps only the
//!    newest one, so a slow display skips states but never ends on a stale
//!    one.
//!
//! ## Ticket Kinds
//!
//! | Button | Kind | Numbers issued | Station |
//! |--------|------|----------------|---------|
//! | `FORTINA` | [`MealPaid`](tickets::TicketKind::MealPaid) | `BU` `B` `P` | cashier |
//! | `FORTINB` | [`MealFree`](tickets::TicketKind::MealFree) | `BL` `B` `P` | reception |
//! | `FORTINC` | [`GrillPaid`](tickets::TicketKind::GrillPaid) | `PA` `B` `P` | cashier |
//! | `FORTIND` | [`GrillFree`](tickets::TicketKind::GrillFree) | `PL` `B` `P` | reception |
//! | `TRIPULANTE` | [`CrewMeal`](tickets::TicketKind::CrewMeal) | `AT` `BT` `PT` | reception |
//! | `JAGUAR` | [`StandaloneA`](tickets::TicketKind::StandaloneA) | `J` | reception |
//! | `BAR` | [`StandaloneB`](tickets::TicketKind::StandaloneB) | `BF` | reception |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use turnero::config::EngineConfig;
//! use turnero::document::Topic;
//! use turnero::service::Service;
//! use turnero::tickets::TicketKind;
//!
//! let config = EngineConfig::new().with_data_dir("data");
//! let service = Service::from_config(&config);
//!
//! // A display follows the visits document.
//! let (client, mut updates) = service.connect();
//! service.subscribe(client, Topic::Visits).await?;
//!
//! // An operator presses FORTINA.
//! let ticket = service.issue_ticket(TicketKind::MealPaid).await?;
//! println!("{ticket}"); // FORTINA BU01 B01 P01
//!
//! // The display receives the new document.
//! let update = updates.recv().await;
//! ```
//!
//! ## Features
//!
//! | Feature | Module | Description |
//! |---------|--------|-------------|
//! | `table` | [`views::table`] | Render documents as text tables |
//! | `demo` | - | Builds the `ticket_desk` demo binary |

pub mod config;
pub mod desk;
pub mod document;
pub mod engine;
pub mod epoch;
pub mod error;
pub mod fanout;
pub mod notifier;
pub mod service;
pub mod store;
pub mod tickets;
pub mod views;

pub use error::{Error, Result};
