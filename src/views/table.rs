//! Text tables of a document.
//!
//! [`TableRenderer`] renders a [`DocumentView`] using the `tabled` crate.
//!
//! # Feature Flag
//!
//! This module requires the `table` feature:
//!
//! ```toml
//! [dependencies]
//! turnero = { version = "0.1", features = ["table"] }
//! ```
//!
//! # Examples
//!
//! ## Standard format (vertical list)
//!
//! ```rust,ignore
//! use turnero::views::DocumentView;
//! use turnero::views::table::{TableRenderer, TableStyle};
//!
//! let view = DocumentView::new(Topic::Visits, &document);
//! println!("{}", TableRenderer::new().with_style(TableStyle::Rounded).render(&view));
//! // visits 01-01-2025 K7Q2
//! // ╭─────────┬────────┬───────╮
//! // │ Counter │ Kind   │ Shown │
//! // ├─────────┼────────┼───────┤
//! // │ BU      │ cursor │ 4     │
//! // │ B       │ cursor │ 11    │
//! // ...
//! ```
//!
//! ## Compact format (multiple columns)
//!
//! ```rust,ignore
//! let renderer = TableRenderer::new().compact(true).columns(4);
//! println!("{}", renderer.render(&view));
//! // visits 01-01-2025 K7Q2
//! // ╭───────┬───────┬───────┬───────╮
//! // │ BU: 4 │ BL: 0 │ PA: 2 │ PL: 0 │
//! // ├───────┼───────┼───────┼───────┤
//! // ...
//! ```

use tabled::{builder::Builder, settings::Style, Table, Tabled};

use super::DocumentView;
use crate::document::CounterKind;

/// Available table styles for rendering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TableStyle {
    /// ASCII table with simple characters: +, -, |
    Ascii,
    /// Modern rounded corners (default)
    #[default]
    Rounded,
    /// Sharp corners with box-drawing characters
    Sharp,
    /// GitHub-flavored Markdown table
    Markdown,
    /// No borders, just spacing
    Blank,
}

/// Configuration for the table renderer.
#[derive(Debug, Clone)]
pub struct TableConfig {
    /// The style to use for rendering.
    pub style: TableStyle,
    /// Whether to show the header row (only in non-compact mode).
    pub show_header: bool,
    /// Whether to print the topic, date and serial above the table.
    pub show_epoch: bool,
    /// Whether to use compact format (name: value in cells).
    pub compact: bool,
    /// Number of columns in compact mode (default: 1).
    pub columns: usize,
    /// Whether to add the stored value next to the displayed one.
    pub show_stored: bool,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            style: TableStyle::default(),
            show_header: true,
            show_epoch: true,
            compact: false,
            columns: 1,
            show_stored: false,
        }
    }
}

#[derive(Tabled)]
struct EntryRow {
    #[tabled(rename = "Counter")]
    name: String,
    #[tabled(rename = "Kind")]
    kind: &'static str,
    #[tabled(rename = "Shown")]
    display: String,
}

/// Renders a [`DocumentView`] as a text table.
///
/// Two layouts are available: a vertical list with one counter per row, and
/// a compact grid of `name: value` cells.
#[derive(Debug, Clone, Default)]
pub struct TableRenderer {
    config: TableConfig,
}

impl TableRenderer {
    /// Creates a renderer with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a renderer with the specified configuration.
    pub fn with_config(config: TableConfig) -> Self {
        Self { config }
    }

    /// Sets the table style.
    pub fn with_style(mut self, style: TableStyle) -> Self {
        self.config.style = style;
        self
    }

    /// Sets whether to show the header row.
    pub fn with_header(mut self, show: bool) -> Self {
        self.config.show_header = show;
        self
    }

    /// Sets whether to print the epoch line above the table.
    pub fn with_epoch(mut self, show: bool) -> Self {
        self.config.show_epoch = show;
        self
    }

    /// Appends the stored value in brackets, e.g. `5 [4]`.
    pub fn with_stored(mut self, show: bool) -> Self {
        self.config.show_stored = show;
        self
    }

    /// Enables or disables compact mode.
    pub fn compact(mut self, enabled: bool) -> Self {
        self.config.compact = enabled;
        self
    }

    /// Sets the number of columns in compact mode. Values less than 1 are
    /// treated as 1.
    pub fn columns(mut self, count: usize) -> Self {
        self.config.columns = count.max(1);
        self
    }

    fn apply_style(&self, table: &mut Table) {
        match self.config.style {
            TableStyle::Ascii => {
                table.with(Style::ascii());
            }
            TableStyle::Rounded => {
                table.with(Style::rounded());
            }
            TableStyle::Sharp => {
                table.with(Style::sharp());
            }
            TableStyle::Markdown => {
                table.with(Style::markdown());
            }
            TableStyle::Blank => {
                table.with(Style::blank());
            }
        }
    }

    fn value(&self, display: i64, stored: i64) -> String {
        if self.config.show_stored {
            format!("{display} [{stored}]")
        } else {
            display.to_string()
        }
    }

    fn render_compact(&self, view: &DocumentView) -> String {
        let cells: Vec<String> = view
            .entries
            .iter()
            .map(|entry| format!("{}: {}", entry.name, self.value(entry.display, entry.stored)))
            .collect();
        if cells.is_empty() {
            return String::new();
        }

        let cols = self.config.columns;
        let mut builder = Builder::default();
        for chunk in cells.chunks(cols) {
            let mut row = chunk.to_vec();
            row.resize(cols, String::new());
            builder.push_record(row);
        }

        let mut table = builder.build();
        self.apply_style(&mut table);
        table.to_string()
    }

    fn render_standard(&self, view: &DocumentView) -> String {
        let rows: Vec<EntryRow> = view
            .entries
            .iter()
            .map(|entry| EntryRow {
                name: entry.name.clone(),
                kind: match entry.kind {
                    CounterKind::Cursor => "cursor",
                    CounterKind::Stock => "stock",
                },
                display: self.value(entry.display, entry.stored),
            })
            .collect();

        let mut table = Table::new(&rows);
        self.apply_style(&mut table);
        if !self.config.show_header {
            table.with(tabled::settings::Remove::row(
                tabled::settings::object::Rows::first(),
            ));
        }
        table.to_string()
    }

    /// Renders the view as a table string.
    pub fn render(&self, view: &DocumentView) -> String {
        let table = if self.config.compact {
            self.render_compact(view)
        } else {
            self.render_standard(view)
        };
        if self.config.show_epoch {
            format!("{} {} {}\n{}", view.topic, view.date, view.serial, table)
        } else {
            table
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{CounterDocument, Topic};
    use crate::epoch::{EpochDate, Serial};

    fn view() -> DocumentView {
        let date = EpochDate::from_ymd(2025, 1, 1).unwrap();
        let mut doc = CounterDocument::seeded(Topic::Visits, date, Serial::new("K7Q2"));
        doc.counters.insert("B".to_string(), 10);
        DocumentView::new(Topic::Visits, &doc)
    }

    #[test]
    fn test_render_standard() {
        let output = TableRenderer::new().render(&view());
        assert!(output.starts_with("visits 01-01-2025 K7Q2\n"));
        assert!(output.contains("Counter"));
        assert!(output.contains("11"));
    }

    #[test]
    fn test_render_without_header_and_epoch() {
        let output = TableRenderer::new()
            .with_header(false)
            .with_epoch(false)
            .render(&view());
        assert!(!output.contains("Counter"));
        assert!(!output.contains("K7Q2"));
    }

    #[test]
    fn test_render_compact_columns() {
        let output = TableRenderer::new()
            .compact(true)
            .columns(4)
            .with_style(TableStyle::Ascii)
            .render(&view());
        assert!(output.contains("B: 11"));
        assert!(output.contains("BU: 0"));
        // 13 visits counters in rows of 4.
        let rows = output.lines().filter(|line| line.starts_with('|')).count();
        assert_eq!(rows, 4);
    }

    #[test]
    fn test_render_stored_value() {
        let output = TableRenderer::new().compact(true).with_stored(true).render(&view());
        assert!(output.contains("B: 11 [10]"));
        assert!(output.contains("BU: 0 [-1]"));
    }

    #[test]
    fn test_columns_minimum() {
        let renderer = TableRenderer::new().columns(0);
        assert_eq!(renderer.config.columns, 1);
    }
}
