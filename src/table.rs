//! Plain-text tables for console output.

use std::borrow::Cow;
use std::fmt::Write as _;

/// Longer cells are cut and suffixed with `...`.
const MAX_CELL_WIDTH: usize = 72;
const ELLIPSIS: &str = "...";

pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let headers = headers.iter().map(|h| clean_cell(h)).collect::<Vec<_>>();
    let rows = rows
        .iter()
        .map(|row| {
            row.iter()
                .take(headers.len())
                .map(|cell| clean_cell(cell))
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();

    let mut widths = headers
        .iter()
        .map(|h| h.chars().count().max(3))
        .collect::<Vec<_>>();
    // A column is right-aligned when every non-empty cell is numeric.
    let mut numeric = vec![true; headers.len()];
    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(cell.chars().count());
            if !cell.is_empty() && cell.parse::<f64>().is_err() {
                numeric[idx] = false;
            }
        }
    }

    let mut output = String::new();
    let _ = writeln!(output, "{}", format_row(&headers, &widths, &[]));
    let rule = widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>();
    let _ = writeln!(output, "{}", format_row(&rule, &widths, &[]));
    for row in &rows {
        let _ = writeln!(output, "{}", format_row(row, &widths, &numeric));
    }
    output
}

pub fn print_table(headers: &[String], rows: &[Vec<String>]) {
    print!("{}", render_table(headers, rows));
}

fn format_row<S: AsRef<str>>(cells: &[S], widths: &[usize], right_align: &[bool]) -> String {
    let mut line = cells
        .iter()
        .zip(widths)
        .enumerate()
        .map(|(idx, (cell, &width))| {
            if right_align.get(idx).copied().unwrap_or(false) {
                format!("{:>width$}", cell.as_ref())
            } else {
                format!("{:<width$}", cell.as_ref())
            }
        })
        .collect::<Vec<_>>()
        .join("  ");
    line.truncate(line.trim_end().len());
    line
}

fn clean_cell(value: &str) -> String {
    let flattened: Cow<'_, str> = if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    };
    if flattened.chars().count() <= MAX_CELL_WIDTH {
        return flattened.into_owned();
    }
    let mut cut = flattened
        .chars()
        .take(MAX_CELL_WIDTH - ELLIPSIS.len())
        .collect::<String>();
    cut.push_str(ELLIPSIS);
    cut
}
