#![allow(dead_code)]

use table_probe::Value;

pub fn text_row(cells: &[&str]) -> Vec<Value> {
    cells.iter().map(|cell| Value::from(*cell)).collect()
}

/// Parses raw CSV text into untyped rows, preserving every line.
pub fn parse_csv_rows(raw: &str) -> anyhow::Result<Vec<Vec<Value>>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(raw.as_bytes());
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(Value::from).collect());
    }
    Ok(rows)
}

/// A small report file the way exports often look: a title line, a blank
/// line, a two-line header, a contiguous data block, and footer junk.
///
/// Layout: index 0 title comment, 1 blank, 2-3 header rows, 4..=63 data
/// rows, 64 blank, 65 footer comment. 66 rows total.
pub fn messy_report() -> Vec<Vec<Value>> {
    let mut rows = Vec::new();
    rows.push(text_row(&["Quarterly Widget Report", "", "", ""]));
    rows.push(text_row(&["", "", "", ""]));
    rows.push(text_row(&["Region", "Units", "Price", "Updated"]));
    rows.push(text_row(&["", "Qty", "USD", "Day"]));

    let regions = ["East", "West", "North", "South"];
    for i in 0..60 {
        let region = regions[i % regions.len()];
        let units = (i * 7) % 90 + 1;
        let price = 2.25 + (i % 10) as f64;
        let day = i % 28 + 1;
        rows.push(vec![
            Value::from(region),
            Value::from(units.to_string()),
            Value::from(format!("{price:.2}")),
            Value::from(format!("2024-01-{day:02}")),
        ]);
    }

    rows.push(text_row(&["", "", "", ""]));
    rows.push(text_row(&["Source: internal", "", "", ""]));
    rows
}
