use crate::util::{parse_span, strip_tags};

/// A single attribute as written in the markup. Valueless attributes keep `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attr {
    pub name: String,
    pub value: Option<String>,
}

impl Attr {
    pub fn new(name: &str, value: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            value: value.map(|v| v.to_string()),
        }
    }
}

/// Case-insensitive attribute lookup
fn find_attr<'a>(attrs: &'a [Attr], name: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|a| a.name.eq_ignore_ascii_case(name))
        .map(|a| a.value.as_deref().unwrap_or(""))
}

/// A `td` or `th` element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub tag: String,
    pub attrs: Vec<Attr>,
    /// Raw inner markup, untouched by parsing
    pub content: String,
}

impl Cell {
    #[cfg(test)]
    pub fn new(tag: &str, content: &str) -> Self {
        Self {
            tag: tag.to_string(),
            attrs: Vec::new(),
            content: content.to_string(),
        }
    }

    #[cfg(test)]
    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.push(Attr::new(name, Some(value)));
        self
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        find_attr(&self.attrs, name)
    }

    pub fn rowspan(&self) -> usize {
        parse_span(self.attr("rowspan"))
    }

    pub fn colspan(&self) -> usize {
        parse_span(self.attr("colspan"))
    }

    /// Rendered text: markup stripped, surrounding whitespace trimmed.
    /// Trimming lets pretty-printed numeric cells like `" 5 "` sort as numbers.
    pub fn text(&self) -> String {
        strip_tags(&self.content).trim().to_string()
    }
}

/// A `tr` element
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    pub attrs: Vec<Attr>,
    pub cells: Vec<Cell>,
}

impl Row {
    #[cfg(test)]
    pub fn new(cells: Vec<Cell>) -> Self {
        Self { attrs: Vec::new(), cells }
    }

    /// Largest row-span declared by any cell, at least 1
    pub fn span(&self) -> usize {
        self.cells.iter().map(Cell::rowspan).max().unwrap_or(1).max(1)
    }
}

/// A `table` element. Row 0 is the header, the rest are data rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub attrs: Vec<Attr>,
    /// Markup before the first row (caption, colgroup), kept verbatim
    pub prefix: String,
    pub rows: Vec<Row>,
}

impl Table {
    #[cfg(test)]
    pub fn new(rows: Vec<Row>) -> Self {
        Self { attrs: Vec::new(), prefix: String::new(), rows }
    }

    #[cfg(test)]
    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.push(Attr::new(name, Some(value)));
        self
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        find_attr(&self.attrs, name)
    }

    /// Non-empty `id` attribute
    pub fn id(&self) -> Option<&str> {
        self.attr("id").filter(|id| !id.is_empty())
    }

    /// Whether the class attribute contains `token` as a whole word
    pub fn has_class(&self, token: &str) -> bool {
        self.attr("class")
            .map(|c| c.split_ascii_whitespace().any(|t| t == token))
            .unwrap_or(false)
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn header(&self) -> Option<&Row> {
        self.rows.first()
    }

    #[cfg(test)]
    pub fn data_rows(&self) -> &[Row] {
        self.rows.get(1..).unwrap_or(&[])
    }

    /// Reorder rows in place. `permutation[i] = j` means new row `i` is old row `j`.
    /// Rows are moved, never cloned.
    pub fn apply_row_permutation(&mut self, permutation: &[usize]) -> bool {
        if !is_permutation(permutation, self.rows.len()) {
            return false;
        }

        let mut old: Vec<Option<Row>> = std::mem::take(&mut self.rows).into_iter().map(Some).collect();
        self.rows = permutation
            .iter()
            .filter_map(|&src| old[src].take())
            .collect();
        true
    }
}

/// True when `perm` contains each index in `0..len` exactly once
pub fn is_permutation(perm: &[usize], len: usize) -> bool {
    if perm.len() != len {
        return false;
    }
    let mut seen = vec![false; len];
    for &i in perm {
        if i >= len || seen[i] {
            return false;
        }
        seen[i] = true;
    }
    true
}
