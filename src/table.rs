//! Plain-text table rendering for the diagnostic reports.

use std::borrow::Cow;
use std::fmt::Write as _;

pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let column_count = headers.len();
    let mut widths = headers
        .iter()
        .map(|header| header.chars().count())
        .collect::<Vec<_>>();

    for row in rows {
        for (index, cell) in row.iter().enumerate().take(column_count) {
            widths[index] = widths[index].max(cell.chars().count());
        }
    }

    for width in &mut widths {
        *width = (*width).max(1);
    }

    let mut output = String::new();

    let header_line = format_row(headers, &widths);
    let _ = writeln!(output, "{header_line}");

    let separator = widths
        .iter()
        .map(|width| "-".repeat(*width))
        .collect::<Vec<_>>();
    let separator_line = format_row(&separator, &widths);
    let _ = writeln!(output, "{separator_line}");

    for row in rows {
        let row_line = format_row(row, &widths);
        let _ = writeln!(output, "{row_line}");
    }

    output
}

pub fn print_table(headers: &[String], rows: &[Vec<String>]) {
    print!("{}", render_table(headers, rows));
}

fn format_row(values: &[String], widths: &[usize]) -> String {
    let mut cells = Vec::with_capacity(values.len());
    for (index, value) in values.iter().enumerate() {
        if index >= widths.len() {
            break;
        }
        let sanitized = sanitize_cell(value);
        let display = sanitized.chars().count();
        let mut cell = sanitized.into_owned();
        let padding = widths[index].saturating_sub(display);
        if padding > 0 {
            cell.push_str(&" ".repeat(padding));
        }
        cells.push(cell);
    }
    let mut line = cells.join("  ");
    while line.ends_with(' ') {
        line.pop();
    }
    line
}

fn sanitize_cell(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        let mut sanitized = String::with_capacity(value.len());
        for ch in value.chars() {
            match ch {
                '\n' | '\r' | '\t' => sanitized.push(' '),
                other => sanitized.push(other),
            }
        }
        Cow::Owned(sanitized)
    } else {
        Cow::Borrowed(value)
    }
}
