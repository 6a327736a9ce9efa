//! HTML document binding
//!
//! A document is kept as verbatim text segments with parsed tables in
//! between. Only the table structure (`tr`, `td`, `th` and the section
//! wrappers) is understood; everything else passes through untouched.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use thiserror::Error;

use crate::binding::{SortError, UiBinding};
use crate::table::{Attr, Cell, Row, Table};

static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<!--[\s\S]*?-->|<(/?)([A-Za-z][A-Za-z0-9]*)((?:[^>"']|"[^"]*"|'[^']*')*)>"#).unwrap()
});

static ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([^\s"'>/=]+)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+)))?"#).unwrap()
});

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HtmlError {
    #[error("unterminated <table> starting at byte {offset}")]
    UnterminatedTable { offset: usize },
}

/// A parsed table and the markup it was parsed from
#[derive(Debug, Clone, PartialEq)]
pub struct TableSegment {
    pub table: Table,
    /// Original `<table>...</table>` markup
    pub source: String,
    /// Set once the table is modified; clean tables render as `source`
    pub dirty: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Text(String),
    Table(TableSegment),
}

/// One markup tag found in the input
#[derive(Debug)]
struct Tag {
    start: usize,
    end: usize,
    closing: bool,
    name: String,
    attrs: String,
}

impl Tag {
    fn from_captures(caps: &Captures) -> Option<Self> {
        let whole = caps.get(0)?;
        let name = caps.get(2)?;
        Some(Self {
            start: whole.start(),
            end: whole.end(),
            closing: caps.get(1).map(|m| !m.as_str().is_empty()).unwrap_or(false),
            name: name.as_str().to_ascii_lowercase(),
            attrs: caps.get(3).map(|m| m.as_str().to_string()).unwrap_or_default(),
        })
    }

    fn is(&self, name: &str) -> bool {
        self.name == name
    }
}

/// Tags in `src`, comments skipped
fn tags(src: &str) -> impl Iterator<Item = Tag> + '_ {
    TOKEN_RE.captures_iter(src).filter_map(|caps| Tag::from_captures(&caps))
}

pub fn parse_attrs(src: &str) -> Vec<Attr> {
    ATTR_RE
        .captures_iter(src)
        .map(|caps| {
            let value = caps.get(2).or_else(|| caps.get(3)).or_else(|| caps.get(4));
            Attr::new(&caps[1], value.map(|m| m.as_str()))
        })
        .collect()
}

fn render_attrs(attrs: &[Attr], out: &mut String) {
    for attr in attrs {
        out.push(' ');
        out.push_str(&attr.name);
        if let Some(value) = &attr.value {
            out.push_str("=\"");
            out.push_str(&value.replace('"', "&quot;"));
            out.push('"');
        }
    }
}

/// Incremental builder for the rows of one table
#[derive(Default)]
struct TableBuilder {
    rows: Vec<Row>,
    row: Option<Row>,
    /// Open cell and the offset its content starts at
    cell: Option<(Cell, usize)>,
    /// Offset of the first structural tag, if seen
    body_start: Option<usize>,
}

impl TableBuilder {
    fn close_cell(&mut self, src: &str, at: usize) {
        if let Some((mut cell, start)) = self.cell.take() {
            cell.content = src[start..at].to_string();
            self.row.get_or_insert_with(Row::default).cells.push(cell);
        }
    }

    fn close_row(&mut self, src: &str, at: usize) {
        self.close_cell(src, at);
        if let Some(row) = self.row.take() {
            self.rows.push(row);
        }
    }

    fn mark_body(&mut self, at: usize) {
        self.body_start.get_or_insert(at);
    }
}

/// Parse the markup between `<table ...>` and `</table>`
fn parse_table_body(attrs: Vec<Attr>, src: &str) -> Table {
    let mut builder = TableBuilder::default();
    let mut nested = 0usize;

    for tag in tags(src) {
        if tag.is("table") {
            if tag.closing {
                nested = nested.saturating_sub(1);
            } else {
                nested += 1;
            }
            continue;
        }
        if nested > 0 {
            continue;
        }

        match tag.name.as_str() {
            "td" | "th" => {
                builder.mark_body(tag.start);
                builder.close_cell(src, tag.start);
                if !tag.closing {
                    let cell = Cell {
                        tag: tag.name.clone(),
                        attrs: parse_attrs(&tag.attrs),
                        content: String::new(),
                    };
                    builder.cell = Some((cell, tag.end));
                }
            }
            "tr" => {
                builder.mark_body(tag.start);
                builder.close_row(src, tag.start);
                if !tag.closing {
                    builder.row = Some(Row { attrs: parse_attrs(&tag.attrs), cells: Vec::new() });
                }
            }
            "thead" | "tbody" | "tfoot" => {
                builder.mark_body(tag.start);
                builder.close_row(src, tag.start);
            }
            _ => {}
        }
    }
    builder.close_row(src, src.len());

    let prefix_end = builder.body_start.unwrap_or(src.len());
    Table {
        attrs,
        prefix: src[..prefix_end].to_string(),
        rows: builder.rows,
    }
}

/// Parsed HTML document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    pub segments: Vec<Segment>,
}

impl Document {
    pub fn parse(src: &str) -> Result<Self, HtmlError> {
        let mut segments = Vec::new();
        let mut text_start = 0;
        // Open top-level table: (tag start, content start, raw attrs)
        let mut open: Option<(usize, usize, String)> = None;
        let mut depth = 0usize;

        for tag in tags(src).filter(|t| t.is("table")) {
            if !tag.closing {
                if depth == 0 {
                    open = Some((tag.start, tag.end, tag.attrs.clone()));
                }
                depth += 1;
                continue;
            }
            if depth == 0 {
                // Stray close tag stays in the surrounding text
                continue;
            }
            depth -= 1;
            if depth == 0 {
                if let Some((start, body_start, attrs)) = open.take() {
                    if start > text_start {
                        segments.push(Segment::Text(src[text_start..start].to_string()));
                    }
                    let table = parse_table_body(parse_attrs(&attrs), &src[body_start..tag.start]);
                    segments.push(Segment::Table(TableSegment {
                        table,
                        source: src[start..tag.end].to_string(),
                        dirty: false,
                    }));
                    text_start = tag.end;
                }
            }
        }

        if let Some((offset, _, _)) = open {
            return Err(HtmlError::UnterminatedTable { offset });
        }
        if text_start < src.len() {
            segments.push(Segment::Text(src[text_start..].to_string()));
        }

        Ok(Self { segments })
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Table(seg) if !seg.dirty => out.push_str(&seg.source),
                Segment::Table(seg) => render_table(&seg.table, &mut out),
            }
        }
        out
    }

    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Table(seg) => Some(&seg.table),
            Segment::Text(_) => None,
        })
    }

    fn table_segments_mut(&mut self) -> impl Iterator<Item = &mut TableSegment> {
        self.segments.iter_mut().filter_map(|s| match s {
            Segment::Table(seg) => Some(seg),
            Segment::Text(_) => None,
        })
    }

    /// First table with the given id
    pub fn find(&self, id: &str) -> Option<&Table> {
        self.tables().find(|t| t.id() == Some(id))
    }

    fn find_mut(&mut self, id: &str) -> Result<&mut TableSegment, SortError> {
        self.table_segments_mut()
            .find(|seg| seg.table.id() == Some(id))
            .ok_or_else(|| SortError::UnknownTable(id.to_string()))
    }
}

fn render_table(table: &Table, out: &mut String) {
    out.push_str("<table");
    render_attrs(&table.attrs, out);
    out.push('>');
    out.push_str(&table.prefix);
    for row in &table.rows {
        out.push_str("\n<tr");
        render_attrs(&row.attrs, out);
        out.push('>');
        for cell in &row.cells {
            out.push('<');
            out.push_str(&cell.tag);
            render_attrs(&cell.attrs, out);
            out.push('>');
            out.push_str(&cell.content);
            out.push_str("</");
            out.push_str(&cell.tag);
            out.push('>');
        }
        out.push_str("</tr>");
    }
    out.push_str("\n</table>");
}

impl UiBinding for Document {
    fn table_ids(&self) -> Vec<String> {
        self.tables().filter_map(|t| t.id()).map(String::from).collect()
    }

    fn table(&self, id: &str) -> Option<&Table> {
        self.find(id)
    }

    fn set_header(&mut self, id: &str, column: usize, markup: &str) -> Result<(), SortError> {
        let seg = self.find_mut(id)?;
        if let Some(cell) = seg.table.rows.first_mut().and_then(|r| r.cells.get_mut(column)) {
            if cell.content != markup {
                cell.content = markup.to_string();
                seg.dirty = true;
            }
        }
        Ok(())
    }

    fn reorder_rows(&mut self, id: &str, permutation: &[usize]) -> Result<(), SortError> {
        let seg = self.find_mut(id)?;
        let expected = seg.table.row_count();
        if seg.table.apply_row_permutation(permutation) {
            seg.dirty = true;
            Ok(())
        } else {
            Err(SortError::InvalidPermutation { expected, got: permutation.len() })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><body>
<h1>Results</h1>
<table class="data sortable" id="results">
<caption>Runs</caption>
<thead><tr><th>Name</th><th>Count</th></tr></thead>
<tbody>
<tr class="odd"><td>beta</td><td>30</td></tr>
<tr><td>alpha</td><td>5</td></tr>
</tbody>
</table>
<p>footer</p>
</body></html>"#;

    fn first_table(doc: &Document) -> &Table {
        doc.tables().next().unwrap()
    }

    #[test]
    fn test_parse_splits_text_and_tables() {
        let doc = Document::parse(PAGE).unwrap();
        assert_eq!(doc.segments.len(), 3);
        assert!(matches!(&doc.segments[0], Segment::Text(t) if t.ends_with("<h1>Results</h1>\n")));
        assert!(matches!(&doc.segments[2], Segment::Text(t) if t.starts_with("\n<p>footer</p>")));
    }

    #[test]
    fn test_parse_table_structure() {
        let doc = Document::parse(PAGE).unwrap();
        let table = first_table(&doc);

        assert_eq!(table.id(), Some("results"));
        assert!(table.has_class("sortable"));
        assert_eq!(table.prefix, "\n<caption>Runs</caption>\n");
        assert_eq!(table.row_count(), 3);
        assert_eq!(table.rows[0].cells[0].tag, "th");
        assert_eq!(table.rows[1].attrs, vec![Attr::new("class", Some("odd"))]);
        assert_eq!(table.rows[2].cells[0].content, "alpha");
    }

    #[test]
    fn test_text_segments_survive_render() {
        let doc = Document::parse(PAGE).unwrap();
        let html = doc.render();
        assert!(html.starts_with("<html><body>\n<h1>Results</h1>\n<table class=\"data sortable\" id=\"results\">"));
        assert!(html.ends_with("</table>\n<p>footer</p>\n</body></html>"));

        // A second pass is stable
        let again = Document::parse(&html).unwrap();
        assert_eq!(again.render(), html);
    }

    #[test]
    fn test_implicitly_closed_cells_and_rows() {
        let doc = Document::parse("<table id=t><tr><td>1<td>2<tr><td>3</table>").unwrap();
        let table = first_table(&doc);

        assert_eq!(table.row_count(), 2);
        assert_eq!(table.rows[0].cells.len(), 2);
        assert_eq!(table.rows[0].cells[1].content, "2");
        assert_eq!(table.rows[1].cells[0].content, "3");
    }

    #[test]
    fn test_nested_table_stays_in_cell() {
        let src = "<table id=outer><tr><td><table><tr><td>inner</td></tr></table></td><td>x</td></tr></table>";
        let doc = Document::parse(src).unwrap();
        assert_eq!(doc.tables().count(), 1);

        let table = first_table(&doc);
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0].cells.len(), 2);
        assert_eq!(table.rows[0].cells[0].content, "<table><tr><td>inner</td></tr></table>");
    }

    #[test]
    fn test_attribute_forms() {
        let attrs = parse_attrs(r#" id=plain class='a b' title="x > y" hidden"#);
        assert_eq!(attrs, vec![
            Attr::new("id", Some("plain")),
            Attr::new("class", Some("a b")),
            Attr::new("title", Some("x > y")),
            Attr::new("hidden", None),
        ]);
    }

    #[test]
    fn test_comments_are_not_tags() {
        let doc = Document::parse("<!-- <table> --><p>no tables</p>").unwrap();
        assert_eq!(doc.tables().count(), 0);
        assert_eq!(doc.render(), "<!-- <table> --><p>no tables</p>");
    }

    #[test]
    fn test_unterminated_table_is_error() {
        let err = Document::parse("<p>x</p><table id=t><tr><td>1").unwrap_err();
        assert_eq!(err, HtmlError::UnterminatedTable { offset: 8 });
    }

    #[test]
    fn test_untouched_tables_render_verbatim() {
        let src = "<p>x</p><table id=\"plain\">\n  <thead><tr><th>x</th></tr></thead>\n  \
<!-- keep me -->\n  <tbody><tr><td>1</td></tr></tbody>\n</table>\n\
<table class='sortable' id=t2><TBODY><tr><th>n</th></tr></TBODY></table>";
        let mut doc = Document::parse(src).unwrap();
        let mut sorter = crate::binding::Sorter::new(crate::config::Config::default());
        sorter.install(&mut doc);

        let html = doc.render();
        // The non-sortable table keeps its wrappers, comment and whitespace
        assert!(html.starts_with(
            "<p>x</p><table id=\"plain\">\n  <thead><tr><th>x</th></tr></thead>\n  \
<!-- keep me -->\n  <tbody><tr><td>1</td></tr></tbody>\n</table>\n"
        ));
        // The installed one is rebuilt with its header link
        assert!(html.contains("class=\"sortheader\""));
    }

    #[test]
    fn test_parse_then_render_without_changes_is_identity() {
        let doc = Document::parse(PAGE).unwrap();
        assert_eq!(doc.render(), PAGE);
    }

    #[test]
    fn test_binding_marks_tables_dirty() {
        let mut doc = Document::parse(PAGE).unwrap();
        doc.set_header("results", 0, "Name").unwrap();
        assert_eq!(doc.render(), PAGE);

        doc.reorder_rows("results", &[0, 2, 1]).unwrap();
        let html = doc.render();
        assert_ne!(html, PAGE);
        assert!(html.find("alpha").unwrap() < html.find("beta").unwrap());
    }

    #[test]
    fn test_binding_reorder_rejects_bad_permutation() {
        let mut doc = Document::parse(PAGE).unwrap();
        let err = doc.reorder_rows("results", &[0, 1]).unwrap_err();
        assert_eq!(err, SortError::InvalidPermutation { expected: 3, got: 2 });
        assert_eq!(doc.render(), PAGE);

        let err = doc.reorder_rows("missing", &[0]).unwrap_err();
        assert_eq!(err, SortError::UnknownTable("missing".into()));
    }
}
