//! Static description of the counters each topic holds.
//!
//! | Topic | Counter | Kind | Seed |
//! |-------|---------|------|------|
//! | visits | `BU` `BL` `PA` `PL` `B` `P` `AT` `BT` `PT` `J` `BF` | cursor | -1 |
//! | visits | `BBS` `PPS` | stock (issued totals) | 0 |
//! | inventory | `B` `P` | stock (category aggregates) | 0 |
//! | inventory | drink and dessert items | stock | 0 |
//!
//! The shared cursors `B` (drink) and `P` (dessert) are tied to an aggregate
//! in the inventory and an issued total in visits through [`LINKS`].

use std::collections::BTreeMap;

use serde::Serialize;

/// How a counter behaves on rollover and on display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CounterKind {
    /// Last ticket number issued; starts at -1 meaning "none issued".
    Cursor,
    /// A level that may move up or down; starts at 0.
    Stock,
}

impl CounterKind {
    /// Value the counter takes on a fresh document or after rollover.
    pub const fn seed(self) -> i64 {
        match self {
            CounterKind::Cursor => -1,
            CounterKind::Stock => 0,
        }
    }
}

/// One counter of a catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterSpec {
    /// Counter name as stored in the document.
    pub name: &'static str,
    /// Rollover and display behavior.
    pub kind: CounterKind,
    /// For inventory items, the aggregate the item is drawn from.
    pub category: Option<&'static str>,
}

impl CounterSpec {
    const fn cursor(name: &'static str) -> Self {
        Self {
            name,
            kind: CounterKind::Cursor,
            category: None,
        }
    }

    const fn stock(name: &'static str) -> Self {
        Self {
            name,
            kind: CounterKind::Stock,
            category: None,
        }
    }

    const fn item(name: &'static str, category: &'static str) -> Self {
        Self {
            name,
            kind: CounterKind::Stock,
            category: Some(category),
        }
    }
}

/// Ties a shared visits cursor to the counters it drags along.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Link {
    /// Shared cursor in the visits document.
    pub cursor: &'static str,
    /// Outstanding-ticket aggregate in the inventory document.
    pub inventory_aggregate: &'static str,
    /// Issued total in the visits document.
    pub issued_total: &'static str,
}

/// Every linked cursor.
pub const LINKS: [Link; 2] = [
    Link {
        cursor: "B",
        inventory_aggregate: "B",
        issued_total: "BBS",
    },
    Link {
        cursor: "P",
        inventory_aggregate: "P",
        issued_total: "PPS",
    },
];

impl Link {
    /// Returns the link of a visits cursor, if it is shared.
    pub fn for_cursor(name: &str) -> Option<&'static Link> {
        LINKS.iter().find(|link| link.cursor == name)
    }

    /// Returns the link of an inventory category aggregate.
    pub fn for_category(category: &str) -> Option<&'static Link> {
        LINKS.iter().find(|link| link.inventory_aggregate == category)
    }
}

/// The counters a topic is expected to hold.
#[derive(Debug)]
pub struct Catalog {
    specs: &'static [CounterSpec],
}

static VISITS: Catalog = Catalog {
    specs: &[
        CounterSpec::cursor("BU"),
        CounterSpec::cursor("BL"),
        CounterSpec::cursor("PA"),
        CounterSpec::cursor("PL"),
        CounterSpec::cursor("B"),
        CounterSpec::cursor("P"),
        CounterSpec::cursor("AT"),
        CounterSpec::cursor("BT"),
        CounterSpec::cursor("PT"),
        CounterSpec::cursor("J"),
        CounterSpec::cursor("BF"),
        CounterSpec::stock("BBS"),
        CounterSpec::stock("PPS"),
    ],
};

static INVENTORY: Catalog = Catalog {
    specs: &[
        CounterSpec::stock("B"),
        CounterSpec::stock("P"),
        CounterSpec::item("AGUA-SGAS", "B"),
        CounterSpec::item("AGUA-CGAS", "B"),
        CounterSpec::item("AGUA-SGAS-DESC", "B"),
        CounterSpec::item("AGUA-CGAS-DESC", "B"),
        CounterSpec::item("COCA", "B"),
        CounterSpec::item("COCA-ZERO", "B"),
        CounterSpec::item("PEPSI", "B"),
        CounterSpec::item("PEPSI-ZERO", "B"),
        CounterSpec::item("FANTA", "B"),
        CounterSpec::item("MIRINDA", "B"),
        CounterSpec::item("SPRITE", "B"),
        CounterSpec::item("SEVEN-UP", "B"),
        CounterSpec::item("SEVEN-UP-ZERO", "B"),
        CounterSpec::item("PDLT-POMA", "B"),
        CounterSpec::item("PDLT-TONICA", "B"),
        CounterSpec::item("LEV-PERA", "B"),
        CounterSpec::item("LEV-MANZANA", "B"),
        CounterSpec::item("LEV-POMELO", "B"),
        CounterSpec::item("LEV-NARANJA", "B"),
        CounterSpec::item("LEV-LIMONADA", "B"),
        CounterSpec::item("TE", "B"),
        CounterSpec::item("CAFE", "B"),
        CounterSpec::item("ENS-FRUTA", "P"),
        CounterSpec::item("CHOCOTORTA", "P"),
        CounterSpec::item("FLAN", "P"),
        CounterSpec::item("MAMON-QUESO", "P"),
    ],
};

impl Catalog {
    /// Catalog of the visits document.
    pub fn visits() -> &'static Catalog {
        &VISITS
    }

    /// Catalog of the inventory document.
    pub fn inventory() -> &'static Catalog {
        &INVENTORY
    }

    /// Looks up a counter by name.
    pub fn spec(&self, name: &str) -> Option<&'static CounterSpec> {
        self.specs.iter().find(|spec| spec.name == name)
    }

    /// Kind of `name`; counters outside the catalog are stock.
    pub fn kind_of(&self, name: &str) -> CounterKind {
        self.spec(name)
            .map(|spec| spec.kind)
            .unwrap_or(CounterKind::Stock)
    }

    /// Seed value of `name`.
    pub fn seed_of(&self, name: &str) -> i64 {
        self.kind_of(name).seed()
    }

    /// Iterates the catalog in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &'static CounterSpec> {
        self.specs.iter()
    }

    /// Returns every counter at its seed value.
    pub fn seed_counters(&self) -> BTreeMap<String, i64> {
        self.specs
            .iter()
            .map(|spec| (spec.name.to_string(), spec.kind.seed()))
            .collect()
    }
}
