//! Column type intuition over a row stream.
//!
//! Each value is run through an ordered, short-circuiting list of type
//! tests; per-column tallies of the outcomes are resolved into a single
//! best type plus a has-codes flag once the stream ends. Classification is
//! deliberately tolerant: a value that fits nothing falls through to the
//! string catch-all rather than failing the run.

use std::collections::{BTreeMap, VecDeque};

use encoding_rs::WINDOWS_1252;
use itertools::Itertools;
use serde::Serialize;

use crate::{
    data::{TypeTag, Value, decode_bytes, parse_naive_date, parse_naive_datetime, parse_naive_time},
    error::ProbeError,
    table,
};

/// Distinct string values retained per column as a rolling sample.
const STRING_SAMPLE_LIMIT: usize = 1000;
/// Values past which date parsing is skipped unless one already succeeded.
const DATE_PARSE_WINDOW: usize = 1000;
/// Stream sizes above this are subsampled down to roughly this many rows.
const SUBSAMPLE_THRESHOLD: usize = 10_000;
/// String share above which a column resolves to string outright.
const STRING_DOMINANCE_RATIO: f64 = 0.05;

/// Textual not-a-number spellings, matched case-sensitively per entry.
const NAN_TEXTS: &[&str] = &[
    "nan", "NaN", "NAN", "-nan", "n/a", "N/A", "NA", "#N/A", "#NA", "null", "NULL", "None",
];

/// Per-column tally accumulator.
///
/// Created lazily the first time a value appears at its position, mutated
/// once per observed value, and read-only after the stream ends. `count`
/// includes nulls.
#[derive(Debug, Clone)]
pub struct Column {
    pub position: usize,
    pub header: Option<String>,
    pub count: usize,
    /// Maximum observed serialized length, in bytes.
    pub length: usize,
    pub date_successes: usize,
    type_counts: BTreeMap<TypeTag, usize>,
    strings: VecDeque<String>,
    ascii_values: usize,
    latin1_values: usize,
    unicode_values: usize,
}

impl Column {
    fn new(position: usize) -> Self {
        Self {
            position,
            header: None,
            count: 0,
            length: 0,
            date_successes: 0,
            type_counts: BTreeMap::new(),
            strings: VecDeque::new(),
            ascii_values: 0,
            latin1_values: 0,
            unicode_values: 0,
        }
    }

    pub fn tally(&self, tag: TypeTag) -> usize {
        self.type_counts.get(&tag).copied().unwrap_or(0)
    }

    /// Rolling sample of distinct string values (at most 1000).
    pub fn strings(&self) -> impl Iterator<Item = &str> {
        self.strings.iter().map(String::as_str)
    }

    /// Counts of string values by narrowest sufficient encoding.
    pub fn encoding_tallies(&self) -> (usize, usize, usize) {
        (self.ascii_values, self.latin1_values, self.unicode_values)
    }

    /// Classifies one value, updating tallies and the string sample.
    /// Returns the matched tag.
    pub fn observe(&mut self, value: &Value) -> TypeTag {
        self.count += 1;
        let tag = match value {
            Value::Null => TypeTag::Null,
            Value::Bool(_) => TypeTag::Bool,
            Value::List(_) => TypeTag::Array,
            Value::Bytes(bytes) => {
                let text = decode_bytes(bytes);
                self.observe_text(&text)
            }
            Value::Int(_) | Value::Float(_) | Value::Text(_) => {
                let text = value.as_display();
                self.observe_text(&text)
            }
        };
        *self.type_counts.entry(tag).or_insert(0) += 1;
        tag
    }

    fn observe_text(&mut self, text: &str) -> TypeTag {
        self.length = self.length.max(text.len());
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return TypeTag::Null;
        }
        if NAN_TEXTS.contains(&trimmed) {
            return TypeTag::NaN;
        }
        if let Ok(parsed) = trimmed.parse::<f64>() {
            if parsed.is_finite() && parsed.fract() == 0.0 {
                return TypeTag::Int;
            }
            if !parsed.is_nan() {
                return TypeTag::Float;
            }
        }

        self.record_string(trimmed);

        // Date parsing is costly, so only the head of the stream is probed
        // unless the column has already produced temporal values.
        if (self.count < DATE_PARSE_WINDOW || self.date_successes != 0)
            && trimmed.contains(['-', '/', ':', 'T'])
        {
            if parse_naive_datetime(trimmed).is_some() {
                self.date_successes += 1;
                return TypeTag::DateTime;
            }
            if parse_naive_date(trimmed).is_some() {
                self.date_successes += 1;
                return TypeTag::Date;
            }
            if parse_naive_time(trimmed).is_some() {
                self.date_successes += 1;
                return TypeTag::Time;
            }
        }

        TypeTag::Str
    }

    fn record_string(&mut self, value: &str) {
        if !self.strings.iter().any(|existing| existing == value) {
            if self.strings.len() == STRING_SAMPLE_LIMIT {
                self.strings.pop_front();
            }
            self.strings.push_back(value.to_string());
        }
        if value.is_ascii() {
            self.ascii_values += 1;
        } else if !WINDOWS_1252.encode(value).2 {
            self.latin1_values += 1;
        } else {
            self.unicode_values += 1;
        }
    }

    /// Resolves the column's type and has-codes flag from the tallies.
    ///
    /// Strings dominate once they exceed 5% of all values; otherwise the
    /// highest-precedence type with a nonzero tally wins. Resolution is a
    /// pure function of the tallies, so it is idempotent.
    pub fn resolved(&self) -> (TypeTag, bool) {
        let strings = self.tally(TypeTag::Str);
        let nans = self.tally(TypeTag::NaN);

        if self.count > 0 && strings > 0 {
            let ratio = strings as f64 / self.count as f64;
            if ratio > STRING_DOMINANCE_RATIO {
                return (TypeTag::Str, false);
            }
        }

        const PRECEDENCE: &[TypeTag] = &[
            TypeTag::DateTime,
            TypeTag::Date,
            TypeTag::Time,
            TypeTag::Float,
            TypeTag::Int,
        ];
        let mut resolved = TypeTag::Unknown;
        for tag in PRECEDENCE {
            if self.tally(*tag) > 0 {
                resolved = *tag;
                break;
            }
        }
        if resolved == TypeTag::Unknown && (strings > 0 || nans > 0) {
            resolved = TypeTag::Str;
        }

        let has_codes = resolved != TypeTag::Str && strings + nans > 0;
        (resolved, has_codes)
    }

    pub fn resolved_type(&self) -> TypeTag {
        self.resolved().0
    }

    /// True when the column holds embedded non-numeric codes (for example
    /// `N/A` mixed into a numeric column) below the string-dominance share.
    pub fn has_codes(&self) -> bool {
        self.resolved().1
    }
}

/// Per-column diagnostic summary, one row of the report table.
#[derive(Debug, Clone, Serialize)]
pub struct ColumnReport {
    pub position: usize,
    pub header: Option<String>,
    pub length: usize,
    pub resolved_type: TypeTag,
    pub has_codes: bool,
    pub count: usize,
    pub ints: usize,
    pub floats: usize,
    pub strings: usize,
    pub nans: usize,
    pub nulls: usize,
    pub datetimes: usize,
    pub dates: usize,
    pub times: usize,
    pub sample_values: Vec<String>,
}

/// Determines the types of the columns of a row stream.
///
/// Single-use: construct a fresh intuiter per stream.
#[derive(Debug, Default)]
pub struct TypeIntuiter {
    columns: Vec<Column>,
}

impl TypeIntuiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds the first row's values as column labels.
    pub fn process_header(&mut self, row: &[Value]) {
        for (position, value) in row.iter().enumerate() {
            if self.columns.len() <= position {
                self.columns.push(Column::new(position));
            }
            self.columns[position].header = Some(value.as_display());
        }
    }

    /// Classifies one data row, creating columns lazily as positions appear.
    pub fn process_row(&mut self, row: &[Value]) {
        for (position, value) in row.iter().enumerate() {
            if self.columns.len() <= position {
                self.columns.push(Column::new(position));
            }
            self.columns[position].observe(value);
        }
    }

    /// Drives classification over a whole stream.
    ///
    /// The first row is always treated as the header. When `total_rows` is
    /// known and exceeds 10 000, only every `total_rows / 10_000`-th row is
    /// visited to bound cost.
    pub fn run<I>(mut self, source: I, total_rows: Option<usize>) -> Self
    where
        I: IntoIterator<Item = Vec<Value>>,
    {
        let stride = total_rows
            .filter(|total| *total > SUBSAMPLE_THRESHOLD)
            .map(|total| total / SUBSAMPLE_THRESHOLD)
            .filter(|stride| *stride > 1);

        for (index, row) in source.into_iter().enumerate() {
            if index == 0 {
                self.process_header(&row);
                continue;
            }
            if let Some(stride) = stride
                && index % stride != 0
            {
                continue;
            }
            self.process_row(&row);
        }
        self
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_at(&self, position: usize) -> Result<&Column, ProbeError> {
        self.columns
            .get(position)
            .ok_or_else(|| ProbeError::UnknownColumn(position.to_string()))
    }

    /// Looks a column up by its header label.
    pub fn column_named(&self, name: &str) -> Result<&Column, ProbeError> {
        self.columns
            .iter()
            .find(|column| column.header.as_deref() == Some(name))
            .ok_or_else(|| ProbeError::UnknownColumn(name.to_string()))
    }

    /// The resolved schema as ordered (label, type) pairs, suitable for the
    /// statistics accumulator. Unlabeled positions get synthetic names.
    pub fn schema(&self) -> Vec<(String, TypeTag)> {
        self.columns
            .iter()
            .map(|column| {
                let name = column
                    .header
                    .clone()
                    .filter(|header| !header.trim().is_empty())
                    .unwrap_or_else(|| format!("field_{}", column.position));
                (name, column.resolved_type())
            })
            .collect()
    }

    pub fn reports(&self) -> Vec<ColumnReport> {
        self.columns
            .iter()
            .map(|column| {
                let (resolved_type, has_codes) = column.resolved();
                ColumnReport {
                    position: column.position,
                    header: column.header.clone(),
                    length: column.length,
                    resolved_type,
                    has_codes,
                    count: column.count,
                    ints: column.tally(TypeTag::Int),
                    floats: column.tally(TypeTag::Float),
                    strings: column.tally(TypeTag::Str),
                    nans: column.tally(TypeTag::NaN),
                    nulls: column.tally(TypeTag::Null),
                    datetimes: column.tally(TypeTag::DateTime),
                    dates: column.tally(TypeTag::Date),
                    times: column.tally(TypeTag::Time),
                    sample_values: column.strings().take(20).map(str::to_string).collect(),
                }
            })
            .collect()
    }

    /// Renders the per-column diagnostic report as a plain-text table.
    pub fn render(&self) -> String {
        let headers = [
            "#", "header", "size", "type", "codes", "count", "ints", "floats", "strs", "nans",
            "nones", "dt", "dates", "times", "strvals",
        ]
        .iter()
        .map(|header| header.to_string())
        .collect::<Vec<_>>();

        let rows = self
            .reports()
            .iter()
            .map(|report| {
                vec![
                    report.position.to_string(),
                    report.header.clone().unwrap_or_default(),
                    report.length.to_string(),
                    report.resolved_type.to_string(),
                    report.has_codes.to_string(),
                    report.count.to_string(),
                    report.ints.to_string(),
                    report.floats.to_string(),
                    report.strings.to_string(),
                    report.nans.to_string(),
                    report.nulls.to_string(),
                    report.datetimes.to_string(),
                    report.dates.to_string(),
                    report.times.to_string(),
                    report.sample_values.iter().take(5).join(","),
                ]
            })
            .collect::<Vec<_>>();

        table::render_table(&headers, &rows)
    }
}

impl std::fmt::Display for TypeIntuiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TypeIntuiter\n{}", self.render())
    }
}
