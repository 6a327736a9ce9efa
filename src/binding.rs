//! UI binding for sortable tables
//!
//! `UiBinding` is what an environment has to provide: access to its tables,
//! a way to rewrite a header cell, and a way to reorder rows. `Sorter` holds
//! per-table sort state and drives a binding from header clicks.

use std::collections::HashMap;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::table::sort::{sort_permutation, SortDirection, SortState};
use crate::table::Table;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SortError {
    #[error("no table with id '{0}'")]
    UnknownTable(String),
    #[error("table '{0}' is not sortable")]
    NotInstalled(String),
    #[error("row permutation covers {got} rows, table has {expected}")]
    InvalidPermutation { expected: usize, got: usize },
}

/// Environment a `Sorter` operates on
pub trait UiBinding {
    /// Ids of all tables that have one, in document order
    fn table_ids(&self) -> Vec<String>;

    fn table(&self, id: &str) -> Option<&Table>;

    /// Replace the content of header cell `column` with `markup`
    fn set_header(&mut self, id: &str, column: usize, markup: &str) -> Result<(), SortError>;

    /// Move rows so that new row `i` is old row `permutation[i]`
    fn reorder_rows(&mut self, id: &str, permutation: &[usize]) -> Result<(), SortError>;
}

/// Result of a header click
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortOutcome {
    pub state: SortState,
    /// Number of data rows that were ordered; zero for a no-op
    pub rows: usize,
}

#[derive(Debug)]
struct Installed {
    /// Original header texts, used to redraw the arrows
    labels: Vec<String>,
    state: SortState,
}

/// Header link markup for one column
pub fn header_markup(config: &Config, label: &str, column: usize, glyph: &str) -> String {
    format!(
        "<a href=\"#\" class=\"{}\" data-column=\"{}\">{}<span class=\"{}\">{}</span></a>",
        config.header_link_class, column, label, config.arrow_class, glyph
    )
}

pub struct Sorter {
    config: Config,
    tables: HashMap<String, Installed>,
}

impl Sorter {
    pub fn new(config: Config) -> Self {
        Self { config, tables: HashMap::new() }
    }

    /// Whether `table` opts into sorting
    pub fn qualifies(&self, table: &Table) -> bool {
        table.id().is_some() && table.has_class(&self.config.class_token)
    }

    /// Rewrite the headers of every qualifying table. Returns how many tables were newly installed.
    pub fn install<B: UiBinding>(&mut self, binding: &mut B) -> usize {
        let mut installed = 0;

        for id in binding.table_ids() {
            if self.tables.contains_key(&id) {
                continue;
            }
            let labels: Vec<String> = match binding.table(&id) {
                Some(table) if self.qualifies(table) => match table.header() {
                    Some(header) => header.cells.iter().map(|c| c.text()).collect(),
                    None => continue,
                },
                _ => continue,
            };

            let glyph = self.config.glyphs.for_direction(None);
            for (column, label) in labels.iter().enumerate() {
                let markup = header_markup(&self.config, label, column, glyph);
                if let Err(e) = binding.set_header(&id, column, &markup) {
                    warn!(table = %id, column, error = %e, "Failed to install header");
                }
            }

            debug!(table = %id, columns = labels.len(), "Installed sortable table");
            self.tables.insert(id, Installed { labels, state: SortState::default() });
            installed += 1;
        }

        info!(count = installed, "Sortable tables installed");
        installed
    }

    #[cfg(test)]
    pub fn is_installed(&self, id: &str) -> bool {
        self.tables.contains_key(id)
    }

    /// Current sort state of an installed table
    #[cfg(test)]
    pub fn state(&self, id: &str) -> Option<SortState> {
        self.tables.get(id).map(|t| t.state)
    }

    /// Handle a click on header `column` of table `id`
    pub fn click<B: UiBinding>(
        &mut self,
        binding: &mut B,
        id: &str,
        column: usize,
    ) -> Result<SortOutcome, SortError> {
        let table = binding.table(id).ok_or_else(|| SortError::UnknownTable(id.to_string()))?;
        let installed = self.tables.get_mut(id).ok_or_else(|| SortError::NotInstalled(id.to_string()))?;

        let state = installed.state.click(column);
        let Some(permutation) = sort_permutation(table, column, state.direction) else {
            debug!(table = %id, column, "No data rows to sort");
            return Ok(SortOutcome { state: installed.state, rows: 0 });
        };
        let rows = permutation.len() - 1;

        binding.reorder_rows(id, &permutation)?;
        installed.state = state;

        for (i, label) in installed.labels.iter().enumerate() {
            let direction: Option<SortDirection> = (i == column).then_some(state.direction);
            let glyph = self.config.glyphs.for_direction(direction);
            binding.set_header(id, i, &header_markup(&self.config, label, i, glyph))?;
        }

        debug!(table = %id, column, direction = ?state.direction, rows, "Sorted table");
        Ok(SortOutcome { state, rows })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::html::Document;

    const PAGE: &str = "<p>intro</p>\
<table class=\"grid sortable\" id=\"people\">\
<tr><th>Name</th><th><b>Age</b></th></tr>\
<tr><td>Bob</td><td>30</td></tr>\
<tr><td>Al</td><td>5</td></tr>\
<tr><td>Cy</td><td>5</td></tr>\
</table>\
<table id=\"plain\"><tr><th>x</th></tr><tr><td>2</td></tr><tr><td>1</td></tr></table>\
<table class=\"sortable\"><tr><th>no id</th></tr></table>\
<table class=\"sortable\" id=\"empty\"><tr><th>Only</th></tr></table>";

    fn setup() -> (Sorter, Document) {
        let mut doc = Document::parse(PAGE).unwrap();
        let mut sorter = Sorter::new(Config::default());
        sorter.install(&mut doc);
        (sorter, doc)
    }

    fn names(doc: &Document) -> Vec<String> {
        doc.find("people").unwrap().data_rows().iter().map(|r| r.cells[0].text()).collect()
    }

    fn header(doc: &Document, id: &str, column: usize) -> String {
        doc.find(id).unwrap().rows[0].cells[column].content.clone()
    }

    #[test]
    fn install_rewrites_qualifying_headers() {
        let (sorter, doc) = setup();

        assert!(sorter.is_installed("people"));
        assert!(sorter.is_installed("empty"));
        assert!(!sorter.is_installed("plain"));

        assert_eq!(
            header(&doc, "people", 1),
            "<a href=\"#\" class=\"sortheader\" data-column=\"1\">Age<span class=\"sortarrow\">&nbsp;&nbsp;&nbsp;</span></a>"
        );
        assert_eq!(header(&doc, "plain", 0), "x");
    }

    #[test]
    fn install_is_idempotent() {
        let (mut sorter, mut doc) = setup();
        let before = doc.render();

        assert_eq!(sorter.install(&mut doc), 0);
        assert_eq!(doc.render(), before);
    }

    #[test]
    fn click_sorts_and_updates_arrows() {
        let (mut sorter, mut doc) = setup();

        let outcome = sorter.click(&mut doc, "people", 1).unwrap();
        assert_eq!(outcome.state, SortState { column: Some(1), direction: SortDirection::Ascending });
        assert_eq!(outcome.rows, 3);
        assert_eq!(names(&doc), vec!["Al", "Cy", "Bob"]);

        assert!(header(&doc, "people", 1).contains("&nbsp;&darr;"));
        assert!(header(&doc, "people", 0).contains("&nbsp;&nbsp;&nbsp;"));
        // Labels are not nested on redraw
        assert_eq!(header(&doc, "people", 1).matches("<a ").count(), 1);
    }

    // Repeat clicks on one column toggle direction instead of always sorting ascending
    #[test]
    fn repeat_click_reverses() {
        let (mut sorter, mut doc) = setup();

        sorter.click(&mut doc, "people", 1).unwrap();
        let outcome = sorter.click(&mut doc, "people", 1).unwrap();

        assert_eq!(outcome.state.direction, SortDirection::Descending);
        assert_eq!(names(&doc), vec!["Bob", "Cy", "Al"]);
        assert!(header(&doc, "people", 1).contains("&nbsp;&uarr;"));
    }

    #[test]
    fn other_column_resets_to_ascending() {
        let (mut sorter, mut doc) = setup();

        sorter.click(&mut doc, "people", 1).unwrap();
        sorter.click(&mut doc, "people", 1).unwrap();
        let outcome = sorter.click(&mut doc, "people", 0).unwrap();

        assert_eq!(outcome.state, SortState { column: Some(0), direction: SortDirection::Ascending });
        assert_eq!(names(&doc), vec!["Al", "Bob", "Cy"]);
        assert_eq!(sorter.state("people"), Some(outcome.state));
    }

    #[test]
    fn click_on_empty_table_is_noop() {
        let (mut sorter, mut doc) = setup();
        let before = doc.render();

        let outcome = sorter.click(&mut doc, "empty", 0).unwrap();
        assert_eq!(outcome.rows, 0);
        assert_eq!(sorter.state("empty"), Some(SortState::default()));
        assert_eq!(doc.render(), before);
    }

    #[test]
    fn click_errors_leave_document_unchanged() {
        let (mut sorter, mut doc) = setup();
        let before = doc.render();

        assert_eq!(
            sorter.click(&mut doc, "nowhere", 0),
            Err(SortError::UnknownTable("nowhere".into()))
        );
        assert_eq!(
            sorter.click(&mut doc, "plain", 0),
            Err(SortError::NotInstalled("plain".into()))
        );
        assert_eq!(doc.render(), before);
    }

    #[test]
    fn out_of_range_column_does_not_panic() {
        let (mut sorter, mut doc) = setup();

        // Falls back to the last cell of each row, the age column
        sorter.click(&mut doc, "people", 9).unwrap();
        assert_eq!(names(&doc), vec!["Al", "Cy", "Bob"]);
    }

    #[test]
    fn custom_class_token() {
        let mut doc = Document::parse(PAGE).unwrap();
        let config = Config { class_token: "grid".to_string(), ..Config::default() };
        let mut sorter = Sorter::new(config);

        assert_eq!(sorter.install(&mut doc), 1);
        assert!(sorter.is_installed("people"));
        assert!(!sorter.is_installed("empty"));
    }
}
