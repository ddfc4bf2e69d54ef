//! Single-pass per-column statistics over typed rows.
//!
//! A [`StatSet`] accumulates one column: a frequency table for nominal and
//! ordinal columns, and an online quantile/moment estimator plus an adaptive
//! histogram for numeric ones. Quantiles use the P² algorithm (Jain &
//! Chlamtac), so updates are O(1) with constant memory regardless of stream
//! length. Histogram bins are deferred until a priming threshold of samples
//! fixes the bin range from the observed mean and spread.
//!
//! [`Stats`] drives a set of accumulators over a row source in one pass,
//! optionally subsampling a bounded number of rows from a stream of known
//! size.

use std::collections::HashMap;

use log::warn;
use serde::Serialize;

use crate::{
    data::{TypeTag, Value, decode_bytes},
    error::ProbeError,
    table,
};

/// Samples to collect before histogram bins are constructed.
pub const BIN_PRIMER_COUNT: usize = 5000;
/// Number of histogram bins.
pub const NUM_BINS: usize = 16;
/// Rows drawn from a larger stream when sampling is requested.
const SAMPLE_ROWS: usize = 10_000;
/// Frequency-table representations longer than this are truncated.
const VALUE_TRUNCATE_CHARS: usize = 100;
/// Distinct representations tracked before overflowing to a single counter.
const MAX_TRACKED_VALUES: usize = 10_000;
/// Share of distinct values below which a numeric column is reclassified
/// as ordinal at bin-build time.
const ORDINAL_UNIQUE_SHARE: u64 = 100;

/// Level of measurement, more or less.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Lom {
    /// Categorical, usually strings.
    Nominal,
    /// A number which counts or ranks; subtraction is not defined.
    Ordinal,
    /// A number for which subtraction is defined, but not division.
    Interval,
    /// A number for which division is defined and zero means "nothing".
    Ratio,
}

impl Lom {
    pub fn code(self) -> char {
        match self {
            Lom::Nominal => 'n',
            Lom::Ordinal => 'o',
            Lom::Interval => 'i',
            Lom::Ratio => 'r',
        }
    }
}

/// Optional-stats toggles, all enabled by default.
#[derive(Debug, Clone, Copy)]
pub struct StatsOptions {
    /// Quantile and moment estimation for numeric columns.
    pub descriptive: bool,
    /// Histogram bin construction.
    pub distribution: bool,
    /// Top-value reporting from the frequency table.
    pub sample_values: bool,
}

impl Default for StatsOptions {
    fn default() -> Self {
        Self {
            descriptive: true,
            distribution: true,
            sample_values: true,
        }
    }
}

/// One P² quantile marker set.
///
/// Exact while fewer than five observations have arrived; afterwards five
/// markers track the target quantile with parabolic adjustment.
#[derive(Debug, Clone)]
struct P2Quantile {
    p: f64,
    heights: [f64; 5],
    positions: [f64; 5],
    desired: [f64; 5],
    increments: [f64; 5],
    count: usize,
    initial: Vec<f64>,
}

impl P2Quantile {
    fn new(p: f64) -> Self {
        Self {
            p,
            heights: [0.0; 5],
            positions: [0.0; 5],
            desired: [0.0; 5],
            increments: [0.0, p / 2.0, p, (1.0 + p) / 2.0, 1.0],
            count: 0,
            initial: Vec::with_capacity(5),
        }
    }

    fn add(&mut self, x: f64) {
        if self.count < 5 {
            self.initial.push(x);
            self.count += 1;
            if self.count == 5 {
                self.initial.sort_by(f64::total_cmp);
                for (index, value) in self.initial.iter().enumerate() {
                    self.heights[index] = *value;
                    self.positions[index] = (index + 1) as f64;
                }
                let p = self.p;
                self.desired = [1.0, 1.0 + 2.0 * p, 1.0 + 4.0 * p, 3.0 + 2.0 * p, 5.0];
            }
            return;
        }

        self.count += 1;
        let cell = if x < self.heights[0] {
            self.heights[0] = x;
            0
        } else if x < self.heights[1] {
            0
        } else if x < self.heights[2] {
            1
        } else if x < self.heights[3] {
            2
        } else if x <= self.heights[4] {
            3
        } else {
            self.heights[4] = x;
            3
        };

        for position in &mut self.positions[cell + 1..] {
            *position += 1.0;
        }
        for (desired, increment) in self.desired.iter_mut().zip(self.increments) {
            *desired += increment;
        }

        for marker in 1..4 {
            let offset = self.desired[marker] - self.positions[marker];
            let room_right = self.positions[marker + 1] - self.positions[marker] > 1.0;
            let room_left = self.positions[marker - 1] - self.positions[marker] < -1.0;
            if (offset >= 1.0 && room_right) || (offset <= -1.0 && room_left) {
                let direction = offset.signum();
                let candidate = self.parabolic(marker, direction);
                if self.heights[marker - 1] < candidate && candidate < self.heights[marker + 1] {
                    self.heights[marker] = candidate;
                } else {
                    self.heights[marker] = self.linear(marker, direction);
                }
                self.positions[marker] += direction;
            }
        }
    }

    fn parabolic(&self, i: usize, d: f64) -> f64 {
        let q = &self.heights;
        let n = &self.positions;
        q[i] + d / (n[i + 1] - n[i - 1])
            * ((n[i] - n[i - 1] + d) * (q[i + 1] - q[i]) / (n[i + 1] - n[i])
                + (n[i + 1] - n[i] - d) * (q[i] - q[i - 1]) / (n[i] - n[i - 1]))
    }

    fn linear(&self, i: usize, d: f64) -> f64 {
        let j = if d > 0.0 { i + 1 } else { i - 1 };
        self.heights[i]
            + d * (self.heights[j] - self.heights[i]) / (self.positions[j] - self.positions[i])
    }

    fn estimate(&self) -> Option<f64> {
        if self.count == 0 {
            return None;
        }
        if self.count < 5 {
            let mut sorted = self.initial.clone();
            sorted.sort_by(f64::total_cmp);
            let rank = (self.p * (sorted.len() - 1) as f64).round() as usize;
            return sorted.get(rank).copied();
        }
        Some(self.heights[2])
    }
}

/// Online moments plus P² quartile markers.
///
/// Tracks count, mean, central moments up to order four (for variance,
/// skewness, and kurtosis), exact min/max, and the 25th/50th/75th
/// percentiles, all with O(1) updates and constant memory.
#[derive(Debug, Clone)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    m3: f64,
    m4: f64,
    min: f64,
    max: f64,
    quartiles: [P2Quantile; 3],
}

impl Default for RunningStats {
    fn default() -> Self {
        Self::new()
    }
}

impl RunningStats {
    pub fn new() -> Self {
        Self {
            count: 0,
            mean: 0.0,
            m2: 0.0,
            m3: 0.0,
            m4: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            quartiles: [
                P2Quantile::new(0.25),
                P2Quantile::new(0.50),
                P2Quantile::new(0.75),
            ],
        }
    }

    pub fn add(&mut self, x: f64) {
        if x.is_nan() {
            return;
        }
        let previous = self.count as f64;
        self.count += 1;
        let n = self.count as f64;
        let delta = x - self.mean;
        let delta_n = delta / n;
        let delta_n2 = delta_n * delta_n;
        let term = delta * delta_n * previous;
        self.mean += delta_n;
        self.m4 += term * delta_n2 * (n * n - 3.0 * n + 3.0) + 6.0 * delta_n2 * self.m2
            - 4.0 * delta_n * self.m3;
        self.m3 += term * delta_n * (n - 2.0) - 3.0 * delta_n * self.m2;
        self.m2 += term;
        self.min = self.min.min(x);
        self.max = self.max.max(x);
        for quartile in &mut self.quartiles {
            quartile.add(x);
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then_some(self.mean)
    }

    /// Sample variance.
    pub fn variance(&self) -> Option<f64> {
        (self.count > 1).then(|| self.m2 / (self.count as f64 - 1.0))
    }

    pub fn stddev(&self) -> Option<f64> {
        self.variance().map(|variance| variance.max(0.0).sqrt())
    }

    pub fn minimum(&self) -> Option<f64> {
        (self.count > 0).then_some(self.min)
    }

    pub fn maximum(&self) -> Option<f64> {
        (self.count > 0).then_some(self.max)
    }

    pub fn p25(&self) -> Option<f64> {
        self.quartiles[0].estimate()
    }

    pub fn median(&self) -> Option<f64> {
        self.quartiles[1].estimate()
    }

    pub fn p75(&self) -> Option<f64> {
        self.quartiles[2].estimate()
    }

    pub fn skewness(&self) -> Option<f64> {
        if self.count < 2 || self.m2 <= 0.0 {
            return None;
        }
        let n = self.count as f64;
        Some(n.sqrt() * self.m3 / self.m2.powf(1.5))
    }

    /// Excess kurtosis.
    pub fn kurtosis(&self) -> Option<f64> {
        if self.count < 2 || self.m2 <= 0.0 {
            return None;
        }
        let n = self.count as f64;
        Some(n * self.m4 / (self.m2 * self.m2) - 3.0)
    }
}

/// Renders histogram bins as a sparkline.
pub fn text_hist(bins: &[u64], ascii: bool) -> String {
    let glyphs: Vec<char> = if ascii {
        " _.,,-=T#".chars().collect()
    } else {
        " \u{2581}\u{2582}\u{2583}\u{2584}\u{2585}\u{2586}\u{2587}\u{2589}"
            .chars()
            .collect()
    };
    let top = bins.iter().max().copied().unwrap_or(0);
    if top == 0 {
        return String::new();
    }
    let fraction = top as f64 / (glyphs.len() - 1) as f64;
    bins.iter()
        .map(|count| glyphs[(*count as f64 / fraction).round() as usize])
        .collect()
}

/// Serializable per-column report.
#[derive(Debug, Clone, Serialize)]
pub struct StatSummary {
    pub name: String,
    pub flags: String,
    pub lom: Lom,
    pub count: u64,
    pub nuniques: usize,
    pub mean: Option<f64>,
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub p25: Option<f64>,
    pub p50: Option<f64>,
    pub p75: Option<f64>,
    pub max: Option<f64>,
    pub width: usize,
    pub skewness: Option<f64>,
    pub kurtosis: Option<f64>,
    pub hist: Vec<u64>,
    pub text_hist: String,
    pub uvalues: Vec<(String, u64)>,
}

/// Running statistics for one column.
#[derive(Debug, Clone)]
pub struct StatSet {
    pub name: String,
    pub tag: TypeTag,
    options: StatsOptions,
    lom: Lom,
    flags: String,
    is_time: bool,
    is_date: bool,
    n: u64,
    size: usize,
    counts: HashMap<String, u64>,
    counts_overflow: u64,
    stats: RunningStats,
    bin_min: Option<f64>,
    bin_max: Option<f64>,
    bin_width: f64,
    bins: Vec<u64>,
    hist_built: bool,
}

impl StatSet {
    pub fn new(name: &str, tag: TypeTag, options: StatsOptions) -> Self {
        let is_geo = name.contains("gvid") || name.contains("geoid");
        let is_year = name.contains("year");
        let is_time = tag == TypeTag::Time;
        let is_date = matches!(tag, TypeTag::Date | TypeTag::DateTime);

        let flags = [(is_geo, 'G'), (is_year, 'Y'), (is_time, 'T'), (is_date, 'D')]
            .iter()
            .map(|(set, flag)| if *set { *flag } else { ' ' })
            .collect();

        let lom = if tag.is_temporal() {
            Lom::Ordinal
        } else if tag.is_numeric() {
            Lom::Interval
        } else {
            Lom::Nominal
        };

        Self {
            name: name.to_string(),
            tag,
            options,
            lom,
            flags,
            is_time,
            is_date,
            n: 0,
            size: 0,
            counts: HashMap::new(),
            counts_overflow: 0,
            stats: RunningStats::new(),
            bin_min: None,
            bin_max: None,
            bin_width: 0.0,
            bins: Vec::new(),
            hist_built: false,
        }
    }

    pub fn lom(&self) -> Lom {
        self.lom
    }

    pub fn flags(&self) -> &str {
        &self.flags
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self.lom, Lom::Interval | Lom::Ratio)
    }

    pub fn count(&self) -> u64 {
        self.n
    }

    /// Maximum encoded byte length seen.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Records one value.
    pub fn add(&mut self, value: &Value) {
        self.n += 1;
        let text = match value {
            Value::Bytes(bytes) => decode_bytes(bytes),
            other => other.as_display(),
        };
        self.size = self.size.max(text.len());

        if !self.is_numeric() || !self.options.descriptive {
            self.add_categorical(value, text);
            return;
        }

        match coerce_float(value) {
            Some(numeric) => {
                if !self.hist_built {
                    // Representations are kept until the bin range is known,
                    // then folded into bins retroactively.
                    let key = if value.is_null() { "NULL".to_string() } else { text };
                    self.tally_count(key);
                    if self.options.distribution && self.n >= BIN_PRIMER_COUNT as u64 {
                        self.build_hist_bins();
                    }
                } else if let Some(bin) = self.bin_index(numeric) {
                    self.bins[bin] += 1;
                }
                self.stats.add(numeric);
            }
            None => {
                // Non-coercible values on the numeric path land in the
                // frequency table rather than the estimator.
                let key = if value.is_null() { "NULL".to_string() } else { text };
                self.tally_count(key);
            }
        }
    }

    fn add_categorical(&mut self, value: &Value, text: String) {
        if self.is_time || self.is_date {
            self.tally_count(text);
        } else if value.is_null() {
            self.tally_count("NULL".to_string());
        } else if text.chars().count() > VALUE_TRUNCATE_CHARS {
            self.tally_count(text.chars().take(VALUE_TRUNCATE_CHARS).collect());
        } else {
            self.tally_count(text);
        }
    }

    fn tally_count(&mut self, key: String) {
        if let Some(count) = self.counts.get_mut(&key) {
            *count += 1;
        } else if self.counts.len() < MAX_TRACKED_VALUES {
            self.counts.insert(key, 1);
        } else {
            self.counts_overflow += 1;
        }
    }

    /// Constructs histogram bins once from the primed sample.
    ///
    /// The bin range is mean ± 2σ split into [`NUM_BINS`] bins; primed
    /// representations are folded in from the frequency table, and leading
    /// all-zero bins are trimmed so the visible histogram starts at the
    /// first populated bin. Zero spread means no histogram.
    pub fn build_hist_bins(&mut self) {
        if self.hist_built {
            return;
        }
        self.hist_built = true;
        if !self.is_numeric() || !self.options.distribution {
            return;
        }
        // A numeric column with almost no distinct values behaves like an
        // ordinal; keep the frequency counts instead of binning.
        if (self.counts.len() as u64) < self.n / ORDINAL_UNIQUE_SHARE {
            self.lom = Lom::Ordinal;
            return;
        }
        let (Some(mean), Some(stddev)) = (self.stats.mean(), self.stats.stddev()) else {
            return;
        };
        let mut bin_min = mean - 2.0 * stddev;
        let bin_max = mean + 2.0 * stddev;
        let mut bin_width = (bin_max - bin_min) / NUM_BINS as f64;
        if bin_width == 0.0 {
            warn!("column '{}' has zero spread, skipping histogram", self.name);
            return;
        }

        let mut bins = fill_bins(&self.counts, bin_min, bin_max, bin_width);
        if let Some(first_nonzero) = bins.iter().position(|count| *count != 0)
            && first_nonzero > 0
        {
            bin_min += bin_width * first_nonzero as f64;
            bin_width = (bin_max - bin_min) / NUM_BINS as f64;
            bins = fill_bins(&self.counts, bin_min, bin_max, bin_width);
        }

        self.bin_min = Some(bin_min);
        self.bin_max = Some(bin_max);
        self.bin_width = bin_width;
        self.bins = bins;
    }

    fn bin_index(&self, numeric: f64) -> Option<usize> {
        let bin_min = self.bin_min?;
        let bin_max = self.bin_max?;
        if numeric < bin_min || numeric > bin_max || self.bin_width == 0.0 || self.bins.is_empty() {
            return None;
        }
        Some((((numeric - bin_min) / self.bin_width) as usize).min(self.bins.len() - 1))
    }

    pub fn uniques(&self) -> Vec<&str> {
        self.counts.keys().map(String::as_str).collect()
    }

    pub fn nuniques(&self) -> usize {
        self.counts.len()
    }

    /// Distinct representations that overflowed the tracking bound.
    pub fn overflowed(&self) -> u64 {
        self.counts_overflow
    }

    pub fn bins(&self) -> &[u64] {
        &self.bins
    }

    pub fn bin_range(&self) -> Option<(f64, f64, f64)> {
        Some((self.bin_min?, self.bin_max?, self.bin_width))
    }

    pub fn mean(&self) -> Option<f64> {
        self.is_numeric().then(|| self.stats.mean()).flatten()
    }

    pub fn stddev(&self) -> Option<f64> {
        self.is_numeric().then(|| self.stats.stddev()).flatten()
    }

    pub fn min(&self) -> Option<f64> {
        self.is_numeric().then(|| self.stats.minimum()).flatten()
    }

    pub fn max(&self) -> Option<f64> {
        self.is_numeric().then(|| self.stats.maximum()).flatten()
    }

    pub fn p25(&self) -> Option<f64> {
        self.is_numeric().then(|| self.stats.p25()).flatten()
    }

    pub fn median(&self) -> Option<f64> {
        self.is_numeric().then(|| self.stats.median()).flatten()
    }

    pub fn p75(&self) -> Option<f64> {
        self.is_numeric().then(|| self.stats.p75()).flatten()
    }

    pub fn skewness(&self) -> Option<f64> {
        self.is_numeric().then(|| self.stats.skewness()).flatten()
    }

    pub fn kurtosis(&self) -> Option<f64> {
        self.is_numeric().then(|| self.stats.kurtosis()).flatten()
    }

    pub fn hist(&self) -> String {
        text_hist(&self.bins, false)
    }

    /// The most frequent representations, highest count first, ties by key.
    pub fn most_common(&self, limit: usize) -> Vec<(String, u64)> {
        let mut items: Vec<(String, u64)> = self
            .counts
            .iter()
            .map(|(key, count)| (key.clone(), *count))
            .collect();
        items.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        items.truncate(limit);
        items
    }

    pub fn summary(&self) -> StatSummary {
        StatSummary {
            name: self.name.clone(),
            flags: self.flags.clone(),
            lom: self.lom,
            count: self.n,
            nuniques: self.nuniques(),
            mean: self.mean(),
            std: self.stddev(),
            min: self.min(),
            p25: self.p25(),
            p50: self.median(),
            p75: self.p75(),
            max: self.max(),
            width: self.size,
            skewness: self.skewness(),
            kurtosis: self.kurtosis(),
            hist: self.bins.clone(),
            text_hist: self.hist(),
            uvalues: if self.options.sample_values {
                self.most_common(100)
            } else {
                Vec::new()
            },
        }
    }
}

fn fill_bins(counts: &HashMap<String, u64>, bin_min: f64, bin_max: f64, bin_width: f64) -> Vec<u64> {
    let mut bins = vec![0u64; NUM_BINS];
    for (representation, count) in counts {
        let Ok(numeric) = representation.trim().parse::<f64>() else {
            continue;
        };
        if numeric >= bin_min && numeric <= bin_max {
            let index = (((numeric - bin_min) / bin_width) as usize).min(NUM_BINS - 1);
            bins[index] += count;
        }
    }
    bins
}

fn coerce_float(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Null | Value::List(_) => None,
        Value::Bool(b) => Some(*b as i64 as f64),
        Value::Int(i) => Some(*i as f64),
        Value::Float(f) => Some(*f),
        Value::Text(s) => s.trim().parse::<f64>().ok(),
        Value::Bytes(b) => decode_bytes(b).trim().parse::<f64>().ok(),
    };
    parsed.filter(|x| x.is_finite())
}

/// Drives a set of per-column accumulators over a row source in one pass.
///
/// Single-use: construct a fresh driver per stream.
#[derive(Debug)]
pub struct Stats {
    columns: Vec<(String, StatSet)>,
    processed: usize,
}

impl Stats {
    /// Builds one accumulator per schema column.
    ///
    /// The column dispatch list is precomputed here and iterated directly
    /// per row.
    pub fn new(schema: &[(String, TypeTag)], options: StatsOptions) -> Result<Self, ProbeError> {
        if schema.is_empty() {
            return Err(ProbeError::EmptySchema);
        }
        let columns = schema
            .iter()
            .map(|(name, tag)| (name.clone(), StatSet::new(name, *tag, options)))
            .collect();
        Ok(Self {
            columns,
            processed: 0,
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.columns.iter().any(|(column, _)| column == name)
    }

    pub fn get(&self, name: &str) -> Result<&StatSet, ProbeError> {
        self.columns
            .iter()
            .find(|(column, _)| column == name)
            .map(|(_, set)| set)
            .ok_or_else(|| ProbeError::UnknownColumn(name.to_string()))
    }

    pub fn stat_sets(&self) -> impl Iterator<Item = &StatSet> {
        self.columns.iter().map(|(_, set)| set)
    }

    /// Rows processed by the last [`Stats::run`].
    pub fn processed(&self) -> usize {
        self.processed
    }

    fn process_row(
        &mut self,
        index: usize,
        row: &HashMap<String, Value>,
    ) -> Result<(), ProbeError> {
        for (name, set) in &mut self.columns {
            let value = row.get(name).ok_or_else(|| ProbeError::MissingColumn {
                column: name.clone(),
                row: index,
            })?;
            set.add(value);
        }
        self.processed += 1;
        Ok(())
    }

    /// Runs one pass over `source`.
    ///
    /// With `sample_from` set to the stream's estimated total row count and
    /// a stride above 4, roughly 10 000 rows are sampled via a running
    /// fractional-skip accumulator, which distributes picks evenly and
    /// avoids aliasing with periodic data. Small streams (< 5000 processed
    /// rows) get their histogram bins force-built at end of stream.
    pub fn run<I>(&mut self, source: I, sample_from: Option<usize>) -> Result<(), ProbeError>
    where
        I: IntoIterator<Item = HashMap<String, Value>>,
    {
        let stride = sample_from
            .map(|total| total as f64 / SAMPLE_ROWS as f64)
            .filter(|stride| *stride > 4.0);

        match stride {
            Some(stride) => {
                let mut credit = 0.0f64;
                for (index, row) in source.into_iter().enumerate() {
                    credit += 1.0;
                    if credit >= stride {
                        credit -= stride;
                        self.process_row(index, &row)?;
                    }
                }
            }
            None => {
                for (index, row) in source.into_iter().enumerate() {
                    self.process_row(index, &row)?;
                }
            }
        }

        if self.processed < BIN_PRIMER_COUNT {
            for (_, set) in &mut self.columns {
                set.build_hist_bins();
            }
        }
        Ok(())
    }

    pub fn summaries(&self) -> Vec<StatSummary> {
        self.stat_sets().map(StatSet::summary).collect()
    }

    /// Serializes the per-column reports for downstream collaborators.
    pub fn summary_json(&self) -> serde_json::Value {
        serde_json::to_value(self.summaries()).unwrap_or(serde_json::Value::Null)
    }

    /// Renders the per-column reports as a plain-text table.
    pub fn render(&self) -> String {
        let headers = [
            "name", "flags", "lom", "count", "nuniques", "mean", "std", "min", "p25", "p50",
            "p75", "max", "width", "skew", "kurt", "hist",
        ]
        .iter()
        .map(|header| header.to_string())
        .collect::<Vec<_>>();

        let rows = self
            .stat_sets()
            .map(|set| {
                vec![
                    set.name.clone(),
                    set.flags.trim_end().to_string(),
                    set.lom.code().to_string(),
                    set.n.to_string(),
                    set.nuniques().to_string(),
                    format_metric(set.mean()),
                    format_metric(set.stddev()),
                    format_metric(set.min()),
                    format_metric(set.p25()),
                    format_metric(set.median()),
                    format_metric(set.p75()),
                    format_metric(set.max()),
                    set.size.to_string(),
                    format_metric(set.skewness()),
                    format_metric(set.kurtosis()),
                    set.hist(),
                ]
            })
            .collect::<Vec<_>>();

        table::render_table(&headers, &rows)
    }
}

impl std::fmt::Display for Stats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Statistics\n{}", self.render())
    }
}

fn format_metric(metric: Option<f64>) -> String {
    match metric {
        None => String::new(),
        Some(value) if value.fract() == 0.0 => format!("{value:.0}"),
        Some(value) => format!("{value:.4}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: Option<f64>, expected: f64, tolerance: f64) {
        let actual = actual.expect("value present");
        assert!(
            (actual - expected).abs() <= tolerance,
            "expected {expected} +/- {tolerance}, got {actual}"
        );
    }

    #[test]
    fn running_stats_match_known_moments() {
        let mut stats = RunningStats::new();
        for i in 1..=100 {
            stats.add(i as f64);
        }
        assert_eq!(stats.count(), 100);
        assert_close(stats.mean(), 50.5, 1e-9);
        assert_close(stats.stddev(), 29.011_49, 1e-4);
        assert_eq!(stats.minimum(), Some(1.0));
        assert_eq!(stats.maximum(), Some(100.0));
        assert_close(stats.skewness(), 0.0, 1e-6);
    }

    #[test]
    fn p2_median_of_one_to_hundred_is_near_center() {
        let mut stats = RunningStats::new();
        for i in 1..=100 {
            stats.add(i as f64);
        }
        assert_close(stats.median(), 50.5, 2.5);
        assert_close(stats.p25(), 25.75, 5.0);
        assert_close(stats.p75(), 75.25, 5.0);
    }

    #[test]
    fn quantiles_are_exact_below_five_samples() {
        let mut stats = RunningStats::new();
        for x in [9.0, 1.0, 5.0] {
            stats.add(x);
        }
        assert_eq!(stats.median(), Some(5.0));
        assert_eq!(stats.minimum(), Some(1.0));
        assert_eq!(stats.maximum(), Some(9.0));
    }

    #[test]
    fn nan_inputs_are_ignored() {
        let mut stats = RunningStats::new();
        stats.add(1.0);
        stats.add(f64::NAN);
        stats.add(3.0);
        assert_eq!(stats.count(), 2);
        assert_eq!(stats.mean(), Some(2.0));
    }

    #[test]
    fn nominal_columns_bucket_representations() {
        let mut set = StatSet::new("status", TypeTag::Str, StatsOptions::default());
        set.add(&Value::from("good"));
        set.add(&Value::from("good"));
        set.add(&Value::Null);
        let long = "x".repeat(150);
        set.add(&Value::from(long.as_str()));

        assert_eq!(set.lom(), Lom::Nominal);
        assert_eq!(set.count(), 4);
        assert_eq!(set.most_common(1), vec![("good".to_string(), 2)]);
        assert_eq!(set.nuniques(), 3);
        assert!(set.uniques().iter().any(|key| *key == "NULL"));
        assert!(set.uniques().iter().all(|key| key.chars().count() <= 100));
    }

    #[test]
    fn temporal_columns_keep_full_representations() {
        let mut set = StatSet::new("seen_at", TypeTag::DateTime, StatsOptions::default());
        assert_eq!(set.lom(), Lom::Ordinal);
        assert_eq!(set.flags(), "   D");
        set.add(&Value::from("2024-05-06T14:30:00"));
        assert_eq!(set.nuniques(), 1);
    }

    #[test]
    fn name_markers_only_set_flags() {
        let set = StatSet::new("start_year", TypeTag::Int, StatsOptions::default());
        assert_eq!(set.lom(), Lom::Interval);
        assert_eq!(set.flags(), " Y  ");
        let set = StatSet::new("county_geoid", TypeTag::Str, StatsOptions::default());
        assert_eq!(set.flags(), "G   ");
    }

    #[test]
    fn forced_small_stream_histogram_bins_account_for_every_value() {
        let mut set = StatSet::new("value", TypeTag::Int, StatsOptions::default());
        for i in 1..=100 {
            set.add(&Value::Int(i));
        }
        assert!(set.bins().is_empty());
        set.build_hist_bins();
        assert_eq!(set.bins().len(), NUM_BINS);
        let total: u64 = set.bins().iter().sum();
        assert_eq!(total, 100);
    }

    #[test]
    fn leading_zero_bins_are_trimmed() {
        let mut set = StatSet::new("value", TypeTag::Float, StatsOptions::default());
        // Strong right skew: the mean sits far right of the low values, so
        // mean - 2 sigma starts well below the first observation.
        for i in 1..=60 {
            set.add(&Value::Float(100.0 + i as f64));
        }
        set.add(&Value::Float(1000.0));
        set.build_hist_bins();
        let (bin_min, _, _) = set.bin_range().expect("bins built");
        assert!(set.bins()[0] > 0, "leading bins should be trimmed");
        assert!(bin_min > 0.0);
    }

    #[test]
    fn few_distinct_numeric_values_demote_to_ordinal() {
        let mut set = StatSet::new("code", TypeTag::Int, StatsOptions::default());
        for i in 0..600 {
            set.add(&Value::Int(i % 3));
        }
        set.build_hist_bins();
        assert_eq!(set.lom(), Lom::Ordinal);
        assert!(set.bins().is_empty());
    }

    #[test]
    fn non_coercible_values_fall_back_to_the_frequency_table() {
        let mut set = StatSet::new("value", TypeTag::Int, StatsOptions::default());
        set.add(&Value::Int(5));
        set.add(&Value::from("oops"));
        set.add(&Value::Null);
        assert_eq!(set.stats.count(), 1);
        assert!(set.uniques().iter().any(|key| *key == "oops"));
        assert!(set.uniques().iter().any(|key| *key == "NULL"));
    }

    #[test]
    fn descriptive_toggle_disables_the_estimator() {
        let options = StatsOptions {
            descriptive: false,
            ..StatsOptions::default()
        };
        let mut set = StatSet::new("value", TypeTag::Int, options);
        for i in 0..10 {
            set.add(&Value::Int(i));
        }
        assert_eq!(set.stats.count(), 0);
        assert_eq!(set.nuniques(), 10);
    }

    #[test]
    fn text_hist_scales_to_the_tallest_bin() {
        assert_eq!(text_hist(&[], false), "");
        assert_eq!(text_hist(&[0, 0], false), "");
        let rendered = text_hist(&[0, 4, 8], true);
        assert_eq!(rendered.chars().count(), 3);
        assert!(rendered.ends_with('#'));
        assert!(rendered.starts_with(' '));
    }

    #[test]
    fn stats_driver_requires_a_schema_and_matching_rows() {
        assert!(matches!(
            Stats::new(&[], StatsOptions::default()),
            Err(ProbeError::EmptySchema)
        ));

        let schema = vec![("n".to_string(), TypeTag::Int)];
        let mut stats = Stats::new(&schema, StatsOptions::default()).unwrap();
        let rows = vec![HashMap::from([("other".to_string(), Value::Int(1))])];
        let err = stats.run(rows, None).unwrap_err();
        assert!(matches!(err, ProbeError::MissingColumn { .. }));
    }

    #[test]
    fn fractional_skip_sampling_processes_roughly_the_target() {
        let schema = vec![("n".to_string(), TypeTag::Int)];
        let mut stats = Stats::new(&schema, StatsOptions::default()).unwrap();
        let total = 100_000;
        let rows = (0..total).map(|i| HashMap::from([("n".to_string(), Value::Int(i as i64))]));
        stats.run(rows, Some(total)).unwrap();
        let processed = stats.processed();
        assert!(
            (9_000..=10_001).contains(&processed),
            "processed {processed}"
        );
    }

    #[test]
    fn small_sample_streams_are_processed_exhaustively() {
        let schema = vec![("n".to_string(), TypeTag::Int)];
        let mut stats = Stats::new(&schema, StatsOptions::default()).unwrap();
        let rows = (0..100).map(|i| HashMap::from([("n".to_string(), Value::Int(i as i64))]));
        // Stride of 100/10000 is under the sampling floor.
        stats.run(rows, Some(100)).unwrap();
        assert_eq!(stats.processed(), 100);
    }

    #[test]
    fn summary_serializes_to_json() {
        let schema = vec![("n".to_string(), TypeTag::Int)];
        let mut stats = Stats::new(&schema, StatsOptions::default()).unwrap();
        let rows = (1..=10).map(|i| HashMap::from([("n".to_string(), Value::Int(i))]));
        stats.run(rows, None).unwrap();
        let json = stats.summary_json();
        assert_eq!(json[0]["name"], "n");
        assert_eq!(json[0]["count"], 10);
    }
}
