//! Ticket kinds, their recipes and the codes they produce.
//!
//! Each [`TicketKind`] is a fixed recipe of cursor increments in the visits
//! document. A meal ticket, for example, issues a buffet number, a drink
//! number and a dessert number in one go:
//!
//! ```text
//!   MealPaid ──► BU ──► B ──► P        =>  BU04  B11  P11
//! ```
//!
//! The number printed on a ticket is the cursor's display value: cursors
//! start at -1, so the first ticket of the day carries `01`.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::epoch::{EpochDate, Serial};
use crate::error::Error;

/// Where a ticket kind is printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Station {
    /// The cashier desk, for paying guests.
    Cashier,
    /// The reception desk, for released meals, crews and standalone tickets.
    Reception,
}

/// One increment of a recipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    /// Visits cursor to increment.
    pub counter: &'static str,
    /// Text printed on the ticket, or `None` if the step is counted only.
    pub label: Option<&'static str>,
}

const fn printed(counter: &'static str, label: &'static str) -> Step {
    Step {
        counter,
        label: Some(label),
    }
}

const fn counted(counter: &'static str) -> Step {
    Step {
        counter,
        label: None,
    }
}

const MEAL_PAID: &[Step] = &[
    printed("BU", "BUFFET FORTIN"),
    printed("B", "BEBIDA FORTIN"),
    printed("P", "POSTRE FORTIN"),
];
const MEAL_FREE: &[Step] = &[
    counted("BL"),
    printed("B", "BEBIDA FORTIN"),
    printed("P", "POSTRE FORTIN"),
];
const GRILL_PAID: &[Step] = &[
    printed("PA", "PARRILLA PAGANTE"),
    printed("B", "BEBIDA FORTIN"),
    printed("P", "POSTRE FORTIN"),
];
const GRILL_FREE: &[Step] = &[
    printed("PL", "PARRILLA LIBERADO"),
    printed("B", "BEBIDA FORTIN"),
    printed("P", "POSTRE FORTIN"),
];
const CREW_MEAL: &[Step] = &[
    printed("AT", "ALMUERZO TRIPULANTE"),
    printed("BT", "BEBIDA TRIPULANTE"),
    printed("PT", "POSTRE TRIPULANTE"),
];
const STANDALONE_A: &[Step] = &[printed("J", "JAGUAR")];
const STANDALONE_B: &[Step] = &[printed("BF", "BAR FORTIN")];

/// The kinds of ticket the operator stations can issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TicketKind {
    /// Paying buffet guest.
    MealPaid,
    /// Released (free) buffet guest.
    MealFree,
    /// Paying grill guest.
    GrillPaid,
    /// Released (free) grill guest.
    GrillFree,
    /// Crew meal for drivers and guides.
    CrewMeal,
    /// Standalone ticket A.
    StandaloneA,
    /// Standalone ticket B.
    StandaloneB,
}

impl TicketKind {
    /// Every kind, in button order.
    pub const ALL: [TicketKind; 7] = [
        TicketKind::MealPaid,
        TicketKind::MealFree,
        TicketKind::GrillPaid,
        TicketKind::GrillFree,
        TicketKind::CrewMeal,
        TicketKind::StandaloneA,
        TicketKind::StandaloneB,
    ];

    /// Name of the button that issues this kind.
    pub const fn wire_name(&self) -> &'static str {
        match self {
            TicketKind::MealPaid => "FORTINA",
            TicketKind::MealFree => "FORTINB",
            TicketKind::GrillPaid => "FORTINC",
            TicketKind::GrillFree => "FORTIND",
            TicketKind::CrewMeal => "TRIPULANTE",
            TicketKind::StandaloneA => "JAGUAR",
            TicketKind::StandaloneB => "BAR",
        }
    }

    /// The increments this kind performs, in order.
    pub const fn recipe(&self) -> &'static [Step] {
        match self {
            TicketKind::MealPaid => MEAL_PAID,
            TicketKind::MealFree => MEAL_FREE,
            TicketKind::GrillPaid => GRILL_PAID,
            TicketKind::GrillFree => GRILL_FREE,
            TicketKind::CrewMeal => CREW_MEAL,
            TicketKind::StandaloneA => STANDALONE_A,
            TicketKind::StandaloneB => STANDALONE_B,
        }
    }

    /// Station the tickets of this kind are printed at.
    pub const fn station(&self) -> Station {
        match self {
            TicketKind::MealPaid | TicketKind::GrillPaid => Station::Cashier,
            _ => Station::Reception,
        }
    }
}

impl fmt::Display for TicketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

impl FromStr for TicketKind {
    type Err = Error;

    /// Parses a button name, ignoring case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TicketKind::ALL
            .into_iter()
            .find(|kind| kind.wire_name().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::UnknownTicketKind(s.to_string()))
    }
}

/// A ticket number as printed: counter name plus a two-digit number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct TicketCode {
    counter: String,
    number: i64,
}

impl TicketCode {
    /// Builds the code for a cursor that now stores `stored`.
    pub fn from_cursor(counter: impl Into<String>, stored: i64) -> Self {
        Self {
            counter: counter.into(),
            number: stored.saturating_add(1),
        }
    }

    /// Counter the code was issued from.
    pub fn counter(&self) -> &str {
        &self.counter
    }

    /// Display number of the code.
    pub fn number(&self) -> i64 {
        self.number
    }
}

impl fmt::Display for TicketCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:02}", self.counter, self.number)
    }
}

/// A code together with what gets printed for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssuedStep {
    /// The issued code.
    pub code: TicketCode,
    /// Printed label, `None` for counted-only steps.
    pub label: Option<&'static str>,
}

/// The result of issuing a ticket kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssuedTicket {
    /// Kind that was issued.
    pub kind: TicketKind,
    /// Day the numbers belong to.
    pub date: EpochDate,
    /// Batch serial of that day.
    pub serial: Serial,
    /// One entry per recipe step, in recipe order.
    pub steps: Vec<IssuedStep>,
}

impl IssuedTicket {
    /// Iterates the issued codes.
    pub fn codes(&self) -> impl Iterator<Item = &TicketCode> {
        self.steps.iter().map(|step| &step.code)
    }
}

impl fmt::Display for IssuedTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        for code in self.codes() {
            write!(f, " {code}")?;
        }
        Ok(())
    }
}
