use std::io::{self, Write};

use crate::table::{Row, Table};
use crate::util::{display_width, truncate_to_width};

/// Cell texts of a row, with column spans padded out by empty fields
fn row_fields(row: &Row) -> Vec<String> {
    let mut fields = Vec::with_capacity(row.cells.len());
    for cell in &row.cells {
        fields.push(cell.text());
        for _ in 1..cell.colspan() {
            fields.push(String::new());
        }
    }
    fields
}

/// Write every physical row of `table` as CSV
pub fn write_csv<W: Write>(table: &Table, writer: W) -> io::Result<()> {
    let mut csv_writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(writer);

    for row in &table.rows {
        csv_writer
            .write_record(row_fields(row))
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
    }

    csv_writer.flush()
}

/// Aligned plain-text rendering, columns capped at `max_width`
pub fn preview(table: &Table, max_width: usize) -> String {
    let rows: Vec<Vec<String>> = table.rows.iter().map(row_fields).collect();
    let col_count = rows.iter().map(Vec::len).max().unwrap_or(0);

    let widths: Vec<usize> = (0..col_count)
        .map(|col| {
            rows.iter()
                .filter_map(|r| r.get(col))
                .map(|s| display_width(s))
                .max()
                .unwrap_or(1)
                .max(1)
                .min(max_width.max(1))
        })
        .collect();

    let mut out = String::new();
    for (i, row) in rows.iter().enumerate() {
        let line: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(field, &width)| {
                let shown = truncate_to_width(field, width);
                let pad = width - display_width(&shown);
                format!("{}{}", shown, " ".repeat(pad))
            })
            .collect();
        out.push_str(line.join(" | ").trim_end());
        out.push('\n');

        if i == 0 {
            let rule: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
            out.push_str(&rule.join("-+-"));
            out.push('\n');
        }
    }
    out
}
