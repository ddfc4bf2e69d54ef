//! Row shape classification and row-type intuition.
//!
//! The [`RowIntuiter`] decides which rows of a stream are comments, blank
//! lines, multi-line headers, or actual data. Each row is reduced to a
//! *picture* — one character per cell, `_` for blanks, `n` for numbers, `X`
//! for everything else — and pictures are matched against an ordered pattern
//! list. Most patterns are fixed; the data pattern is learned empirically
//! from a window in the middle of the stream, where rows are most likely to
//! be data, and then used to locate where the data block starts and ends.

use std::collections::BTreeSet;

use itertools::Itertools;
use log::debug;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{
    data::Value,
    error::ProbeError,
};

const MIN_SKIP_ROWS: usize = 30;
const PATTERN_ATTEMPTS: usize = 50;
const PATTERN_WINDOW_ROWS: usize = 20;
const PATTERN_CONTRIBUTION_RATIO: f64 = 0.75;
const HEADER_RUN_FLOOR: usize = 3;
const TAIL_PREVIEW_ROWS: usize = 10;

/// Structural classification of one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RowLabel {
    Blank,
    Comment,
    Header,
    Data,
}

impl RowLabel {
    pub fn code(self) -> char {
        match self {
            RowLabel::Blank => 'B',
            RowLabel::Comment => 'C',
            RowLabel::Header => 'H',
            RowLabel::Data => 'D',
        }
    }
}

/// Builds the picture string for a row: `_` blank, `n` numeric, `X` other.
pub fn picture(row: &[Value]) -> String {
    row.iter().map(cell_symbol).collect()
}

fn cell_symbol(value: &Value) -> char {
    match value {
        Value::Null => '_',
        Value::Int(_) | Value::Float(_) => 'n',
        other => {
            let text = other.as_display();
            let trimmed = text.trim();
            if trimmed.is_empty() {
                '_'
            } else if trimmed.parse::<f64>().is_ok() {
                'n'
            } else {
                'X'
            }
        }
    }
}

/// Returns the label of the first pattern whose matcher finds the picture.
pub fn match_picture(picture: &str, patterns: &[(RowLabel, Regex)]) -> Option<RowLabel> {
    patterns
        .iter()
        .find(|(_, matcher)| matcher.is_match(picture))
        .map(|(label, _)| *label)
}

fn builtin_patterns() -> Vec<(RowLabel, Regex)> {
    const TABLE: &[(RowLabel, &str)] = &[
        (RowLabel::Blank, r"^_+$"),
        (RowLabel::Comment, r"^XX_+$"),
        (RowLabel::Comment, r"^X_+$"),
        (RowLabel::Header, r"^X+$"),
        (RowLabel::Header, r"^_{0,6}X+$"),
        (RowLabel::Header, r"X_"),
    ];
    TABLE
        .iter()
        .map(|(label, source)| {
            let matcher = Regex::new(source).expect("built-in picture pattern");
            (*label, matcher)
        })
        .collect()
}

/// Boundaries and labels for one source, handed to a row-selection
/// collaborator such as [`SelectiveRows`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RowSpec {
    /// Coalesced column labels synthesized from the header rows.
    pub headers: Vec<String>,
    /// Indices of the raw rows classified as headers.
    pub header_lines: Vec<usize>,
    /// Index of the first data row.
    pub start: usize,
    /// Indices of the rows classified as comments.
    pub comments: Vec<usize>,
    /// Index of the last data row, when a trailing non-data run was found.
    pub end: Option<usize>,
}

/// Intuits row types over head and tail windows of a stream.
///
/// An intuiter is single-use: construct a fresh one per stream.
#[derive(Debug)]
pub struct RowIntuiter {
    pub comment_lines: Vec<usize>,
    pub header_lines: Vec<usize>,
    pub start_line: usize,
    pub end_line: Option<usize>,
    pub headers: Vec<String>,
    data_pattern_source: Option<String>,
    patterns: Vec<(RowLabel, Regex)>,
    change_divisor: usize,
    header_density_divisors: (usize, usize),
    debug: bool,
}

impl Default for RowIntuiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RowIntuiter {
    pub fn new() -> Self {
        Self {
            comment_lines: Vec::new(),
            header_lines: Vec::new(),
            start_line: 0,
            end_line: None,
            headers: Vec::new(),
            data_pattern_source: None,
            patterns: builtin_patterns(),
            change_divisor: 4,
            header_density_divisors: (8, 4),
            debug: false,
        }
    }

    /// Enables per-row trace output through the `log` facade.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Overrides the pattern-rejection threshold divisor (default 4: a row
    /// may change at most `row_len / 4` cells of the accumulated pattern).
    pub fn with_change_divisor(mut self, divisor: usize) -> Self {
        self.change_divisor = divisor.max(1);
        self
    }

    /// Overrides the string-density header heuristic divisors
    /// (default `(8, 4)`: a run of `max(3, cols/8)` to `max(3, cols/4)`
    /// string cells reads as a header).
    pub fn with_header_density_divisors(mut self, lower: usize, upper: usize) -> Self {
        self.header_density_divisors = (lower.max(1), upper.max(1));
        self
    }

    /// The regex source of the learned data pattern, once one was found.
    pub fn data_pattern_source(&self) -> Option<&str> {
        self.data_pattern_source.as_deref()
    }

    /// Values that can be fed directly into [`SelectiveRows`].
    pub fn spec(&self) -> RowSpec {
        RowSpec {
            headers: self.headers.clone(),
            header_lines: self.header_lines.clone(),
            start: self.start_line,
            comments: self.comment_lines.clone(),
            end: self.end_line,
        }
    }

    /// Accumulates a per-position character-class pattern over `rows`.
    ///
    /// A row whose picture would change more than `change_limit` accumulated
    /// cells is assumed structurally different (still inside the header,
    /// a stray footnote) and contributes nothing. Returns the pattern
    /// source, the number of contributing rows, and the pattern width.
    fn data_pattern_source_for(
        &self,
        rows: &[Vec<Value>],
        change_limit: f64,
    ) -> (String, usize, usize) {
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        let mut cells: Vec<BTreeSet<char>> = vec![BTreeSet::new(); width];
        let mut contributors = 0usize;

        for (index, row) in rows.iter().enumerate() {
            let pic = picture(row);
            let changes = pic
                .chars()
                .enumerate()
                .filter(|(position, symbol)| !cells[*position].contains(symbol))
                .count();
            if index > 0 && changes as f64 > change_limit {
                continue;
            }
            contributors += 1;
            for (position, symbol) in pic.chars().enumerate() {
                cells[position].insert(symbol);
            }
        }

        let source = cells
            .iter()
            .map(|symbols| format!("(?:{})", symbols.iter().join("|")))
            .collect::<String>();
        (source, contributors, width)
    }

    /// Learns the data pattern from rows past the likely header noise.
    ///
    /// Slides a window of up to 20 rows forward through `rows`, at most 50
    /// times, and accepts the first window where at least 75% of the rows
    /// contributed to the accumulated pattern.
    fn learn_data_pattern(
        &self,
        rows: &[Vec<Value>],
    ) -> Result<(Regex, String, usize), ProbeError> {
        let window = PATTERN_WINDOW_ROWS.min(rows.len());

        for attempt in 0..PATTERN_ATTEMPTS {
            let Some(first) = rows.first() else {
                break;
            };
            let change_limit = first.len() as f64 / self.change_divisor as f64;
            let lower = attempt.min(rows.len());
            let upper = (attempt + window).min(rows.len());
            let slice = &rows[lower..upper];
            if slice.is_empty() {
                continue;
            }

            let (source, contributors, _) = self.data_pattern_source_for(slice, change_limit);
            let cell_total: usize = slice.iter().map(Vec::len).sum();
            let average_columns = cell_total / slice.len();

            if contributors as f64 > window as f64 * PATTERN_CONTRIBUTION_RATIO {
                let matcher = Regex::new(&source).expect("picture alphabet pattern");
                return Ok((matcher, source, average_columns));
            }
        }

        Err(ProbeError::DataPattern {
            attempts: PATTERN_ATTEMPTS,
        })
    }

    /// Runs the intuition process.
    ///
    /// `head_rows` is a materialized window from the start of the stream
    /// (at least ~38 rows strongly recommended), `tail_rows` an optional
    /// window from the end, and `n_rows` the total row count when the
    /// windows are partial. Results land in the public fields and
    /// [`RowIntuiter::spec`].
    pub fn run(
        &mut self,
        head_rows: &[Vec<Value>],
        tail_rows: Option<&[Vec<Value>]>,
        n_rows: Option<usize>,
    ) -> Result<(), ProbeError> {
        if head_rows.is_empty() {
            return Err(ProbeError::EmptyHeadRows);
        }

        let skip = MIN_SKIP_ROWS.min(head_rows.len().saturating_sub(8));
        let (data_pattern, source, columns) = self.learn_data_pattern(&head_rows[skip..])?;
        self.data_pattern_source = Some(source);

        let (lower_divisor, upper_divisor) = self.header_density_divisors;
        let run_lower = HEADER_RUN_FLOOR.max(columns / lower_divisor);
        let run_upper = HEADER_RUN_FLOOR.max(columns / upper_divisor);
        let density = Regex::new(&format!("X{{{run_lower},{run_upper}}}"))
            .expect("header density pattern");

        let mut patterns = vec![(RowLabel::Data, data_pattern), (RowLabel::Header, density)];
        patterns.extend(self.patterns.iter().map(|(label, matcher)| (*label, matcher.clone())));

        if self.debug {
            debug!("--- patterns");
            for (label, matcher) in &patterns {
                debug!("    {} {}", label.code(), matcher.as_str());
            }
        }

        let mut header_rows: Vec<Vec<Value>> = Vec::new();
        let mut found_header = false;

        for (index, row) in head_rows.iter().enumerate() {
            let pic = picture(row);
            let mut label = match_picture(&pic, &patterns);

            // A long contiguous blank run reads as comment formatting no
            // matter what else matched.
            if label != Some(RowLabel::Blank)
                && let Some(run) = first_blank_run(&pic)
                && run * 2 > row.len()
            {
                label = Some(RowLabel::Comment);
            }

            if !found_header && label == Some(RowLabel::Header) {
                found_header = true;
            }

            let label = match label {
                Some(label) => label,
                None if found_header => RowLabel::Data,
                None => {
                    // Could be a really wacky header.
                    found_header = true;
                    RowLabel::Header
                }
            };

            if self.debug {
                debug!("HEAD: {index:<5} {} {pic} {row:?}", label.code());
            }

            match label {
                RowLabel::Blank => {}
                RowLabel::Comment => self.comment_lines.push(index),
                RowLabel::Header => {
                    self.header_lines.push(index);
                    header_rows.push(row.clone());
                }
                RowLabel::Data => {
                    self.start_line = index;
                    self.headers = coalesce_headers(&header_rows);
                    break;
                }
            }
        }

        if let Some(tail) = tail_rows
            && !tail.is_empty()
        {
            if self.debug {
                for (index, row) in tail.iter().rev().take(TAIL_PREVIEW_ROWS).enumerate() {
                    let pic = picture(row);
                    let label = match_picture(&pic, &patterns);
                    debug!(
                        "TAIL: {index:<5} {} {pic} {row:?}",
                        label.map(RowLabel::code).unwrap_or('?')
                    );
                }
            }

            // Count the contiguous run of trailing comment/blank/header rows.
            let trailing = tail
                .iter()
                .rev()
                .map(|row| match_picture(&picture(row), &patterns))
                .take_while(|label| {
                    matches!(
                        label,
                        Some(RowLabel::Comment) | Some(RowLabel::Blank) | Some(RowLabel::Header)
                    )
                })
                .count();

            if trailing > 0
                && let Some(total) = n_rows
            {
                self.end_line = Some(total.saturating_sub(trailing + 1));
            }
        }

        Ok(())
    }
}

fn first_blank_run(picture: &str) -> Option<usize> {
    let mut run = 0usize;
    for symbol in picture.chars() {
        if symbol == '_' {
            run += 1;
        } else if run > 0 {
            break;
        }
    }
    (run > 0).then_some(run)
}

/// Collects header rows that are spread across multiple lines into a single
/// row of column labels.
///
/// Blank cells are forward-filled within each row, positions are joined
/// across rows with a space, and the joined labels are slugified. A single
/// non-empty header row is used verbatim.
pub fn coalesce_headers(header_rows: &[Vec<Value>]) -> Vec<String> {
    let mut rows: Vec<Vec<String>> = header_rows
        .iter()
        .filter(|row| !row.is_empty())
        .map(|row| row.iter().map(Value::as_display).collect())
        .collect();

    match rows.len() {
        0 => Vec::new(),
        1 => rows.remove(0),
        _ => {
            for row in &mut rows {
                forward_fill(row);
            }
            let width = rows.iter().map(Vec::len).min().unwrap_or(0);
            (0..width)
                .map(|position| {
                    let joined = rows
                        .iter()
                        .map(|row| row[position].trim())
                        .join(" ");
                    slugify(joined.trim())
                })
                .collect()
        }
    }
}

/// Copies the last non-blank value forward over blank cells, left to right.
fn forward_fill(row: &mut [String]) {
    let mut last = String::new();
    for cell in row.iter_mut() {
        if cell.trim().is_empty() {
            *cell = last.clone();
        } else {
            last = cell.clone();
        }
    }
}

/// Normalizes a label into a slug: strips characters outside word, space,
/// and hyphen classes, lowercases, and collapses whitespace and hyphens to
/// single underscores.
pub fn slugify(value: &str) -> String {
    use std::sync::LazyLock;
    static NON_SLUG: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"[^\w\s-]").expect("slug strip pattern"));
    static SEPARATORS: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"[-\s]+").expect("slug separator pattern"));

    let stripped = NON_SLUG.replace_all(value, "");
    let lowered = stripped.trim().to_lowercase();
    SEPARATORS.replace_all(&lowered, "_").into_owned()
}

/// Filters a row stream using the boundaries of a [`RowSpec`].
///
/// Header-index rows are collected and coalesced, comment-index rows and
/// rows before `start` are dropped, and the coalesced header is emitted once
/// immediately before the first data row. The `end` marker is carried as
/// metadata for consumers that know the total row count; the streaming
/// filter itself does not truncate on it.
#[derive(Debug)]
pub struct SelectiveRows<I> {
    rows: I,
    spec: RowSpec,
    collected: Vec<Vec<Value>>,
    pending: Option<Vec<Value>>,
    started: bool,
    index: usize,
}

impl<I: Iterator<Item = Vec<Value>>> SelectiveRows<I> {
    pub fn new<T>(rows: T, spec: RowSpec) -> Self
    where
        T: IntoIterator<Item = Vec<Value>, IntoIter = I>,
    {
        Self {
            rows: rows.into_iter(),
            spec,
            collected: Vec::new(),
            pending: None,
            started: false,
            index: 0,
        }
    }
}

impl<I: Iterator<Item = Vec<Value>>> Iterator for SelectiveRows<I> {
    type Item = Vec<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(row) = self.pending.take() {
            return Some(row);
        }
        loop {
            let row = self.rows.next()?;
            let index = self.index;
            self.index += 1;

            if self.spec.header_lines.contains(&index) {
                self.collected.push(row);
                continue;
            }
            if self.spec.comments.contains(&index) {
                continue;
            }
            if index < self.spec.start {
                continue;
            }
            if !self.started {
                self.started = true;
                let labels = coalesce_headers(&self.collected);
                if !labels.is_empty() {
                    self.pending = Some(row);
                    return Some(labels.into_iter().map(Value::Text).collect());
                }
            }
            return Some(row);
        }
    }
}
