//! Sorting functionality for Table
//!
//! Everything here is pure: it reads a table's rows and returns an ordering.
//! Applying the ordering is left to the caller.

use std::cmp::Ordering;

use rayon::prelude::*;

use crate::util::is_all_digits;
use super::table::{Cell, Row, Table};

/// Threshold (row groups) for using parallel processing
const PARALLEL_THRESHOLD: usize = 10_000;

/// Sorting direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn reversed(self) -> Self {
        match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        }
    }
}

/// Per-table sort state. Passed into a click and returned updated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SortState {
    /// Currently sorted column, if any
    pub column: Option<usize>,
    pub direction: SortDirection,
}

impl SortState {
    /// State after a header click on `column`.
    /// Repeating the active column flips direction, a new column starts ascending.
    pub fn click(self, column: usize) -> Self {
        if self.column == Some(column) {
            Self { column: Some(column), direction: self.direction.reversed() }
        } else {
            Self { column: Some(column), direction: SortDirection::Ascending }
        }
    }
}

/// Value a record is ordered by
#[derive(Debug, Clone, PartialEq)]
pub enum SortKey {
    /// The row had no cell for the column
    Null,
    /// Digits-only text, with its original spelling kept for string comparison
    Number { value: f64, text: String },
    Text(String),
}

impl SortKey {
    pub fn from_text(text: String) -> Self {
        if is_all_digits(&text) {
            // Digit strings always parse; empty text is zero
            let value = if text.is_empty() { 0.0 } else { text.parse().unwrap_or(f64::INFINITY) };
            SortKey::Number { value, text }
        } else {
            SortKey::Text(text)
        }
    }

    fn text(&self) -> Option<&str> {
        match self {
            SortKey::Null => None,
            SortKey::Number { text, .. } => Some(text),
            SortKey::Text(text) => Some(text),
        }
    }

    fn is_numeric_or_null(&self) -> bool {
        !matches!(self, SortKey::Text(_))
    }
}

/// How the keys of one column are compared
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOrdering {
    Numeric,
    Text,
}

/// Numeric only when every non-null key in the column is numeric
pub fn probe_key_ordering<'a>(keys: impl IntoIterator<Item = &'a SortKey>) -> KeyOrdering {
    if keys.into_iter().all(SortKey::is_numeric_or_null) {
        KeyOrdering::Numeric
    } else {
        KeyOrdering::Text
    }
}

/// Three-way comparison. Null is lower than any value.
pub fn compare_keys(a: &SortKey, b: &SortKey, ordering: KeyOrdering) -> Ordering {
    match (a, b) {
        (SortKey::Null, SortKey::Null) => Ordering::Equal,
        (SortKey::Null, _) => Ordering::Less,
        (_, SortKey::Null) => Ordering::Greater,
        (SortKey::Number { value: x, .. }, SortKey::Number { value: y, .. })
            if ordering == KeyOrdering::Numeric =>
        {
            x.total_cmp(y)
        }
        _ => a.text().cmp(&b.text()),
    }
}

/// Find the cell that owns logical column `col`, counting column spans.
/// Past the end of the row the last cell is returned.
pub fn resolve_cell(row: &Row, col: usize) -> Option<&Cell> {
    let mut remaining = col;
    for cell in &row.cells {
        let span = cell.colspan();
        if remaining < span {
            return Some(cell);
        }
        remaining -= span;
    }
    row.cells.last()
}

/// Sort key for a row at logical column `col`
pub fn column_value(row: &Row, col: usize) -> SortKey {
    match resolve_cell(row, col) {
        Some(cell) => SortKey::from_text(cell.text()),
        None => SortKey::Null,
    }
}

/// Physical rows that move together, keyed by their first row
#[derive(Debug, Clone, PartialEq)]
pub struct RowGroup {
    /// Index of the first physical row in the table
    pub start: usize,
    pub len: usize,
    pub key: SortKey,
}

impl RowGroup {
    pub fn rows(&self) -> std::ops::Range<usize> {
        self.start..self.start + self.len
    }
}

/// (start, len) of every row group after the header
fn group_bounds(table: &Table) -> Vec<(usize, usize)> {
    let total = table.row_count();
    let mut bounds = Vec::new();
    let mut i = 1;
    while i < total {
        let len = table.rows[i].span().min(total - i);
        bounds.push((i, len));
        i += len;
    }
    bounds
}

/// Split the data rows into row groups keyed on column `col`
pub fn group_rows(table: &Table, col: usize) -> Vec<RowGroup> {
    let bounds = group_bounds(table);
    let make = |&(start, len): &(usize, usize)| RowGroup {
        start,
        len,
        key: column_value(&table.rows[start], col),
    };

    if bounds.len() >= PARALLEL_THRESHOLD {
        bounds.par_iter().map(make).collect()
    } else {
        bounds.iter().map(make).collect()
    }
}

/// Row groups of `table` ordered by column `col`.
/// Ascending is a stable sort; descending is its exact reverse.
pub fn sorted_groups(table: &Table, col: usize, direction: SortDirection) -> Vec<RowGroup> {
    let mut groups = group_rows(table, col);
    let ordering = probe_key_ordering(groups.iter().map(|g| &g.key));
    let cmp_fn = |a: &RowGroup, b: &RowGroup| compare_keys(&a.key, &b.key, ordering);

    if groups.len() >= PARALLEL_THRESHOLD {
        groups.par_sort_by(cmp_fn);
    } else {
        groups.sort_by(cmp_fn);
    }

    if direction == SortDirection::Descending {
        groups.reverse();
    }
    groups
}

/// Physical row permutation that sorts `table` by `col`, header kept first.
/// Returns None when there are no data rows to sort.
pub fn sort_permutation(table: &Table, col: usize, direction: SortDirection) -> Option<Vec<usize>> {
    if table.row_count() < 2 {
        return None;
    }

    let groups = sorted_groups(table, col, direction);
    let mut order = Vec::with_capacity(table.row_count());
    order.push(0);
    for group in &groups {
        order.extend(group.rows());
    }
    Some(order)
}
