//! Clusters header sets across sources whose headers may have drifted.
//!
//! The same logical table often arrives as many files whose header rows
//! differ slightly between deliveries. [`ClusterHeaders`] collects the
//! header list of each named source, scores pairwise similarity with a
//! sequence diff, and groups sources whose headers changed little enough to
//! be treated as one destination table.

use std::collections::BTreeMap;

use heck::ToSnakeCase;
use itertools::Itertools;
use similar::{ChangeTag, TextDiff};

/// Pairwise change ratios below this cluster two sources together.
const CLUSTER_THRESHOLD: f64 = 0.3;

#[derive(Debug, Default)]
pub struct ClusterHeaders {
    headers: BTreeMap<String, Vec<String>>,
}

impl ClusterHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_header(&mut self, name: &str, headers: Vec<String>) {
        self.headers.insert(name.to_string(), headers);
    }

    /// Change ratio between two header lists: edits divided by unchanged
    /// positions. Identical lists score 0.0; fully disjoint lists score
    /// infinity.
    pub fn match_headers(a: &[String], b: &[String]) -> f64 {
        let left: Vec<&str> = a.iter().map(String::as_str).collect();
        let right: Vec<&str> = b.iter().map(String::as_str).collect();
        let diff = TextDiff::from_slices(&left, &right);

        let mut same = 0usize;
        let mut edits = 0usize;
        for change in diff.iter_all_changes() {
            match change.tag() {
                ChangeTag::Equal => same += 1,
                ChangeTag::Delete | ChangeTag::Insert => edits += 1,
            }
        }

        if same == 0 {
            return f64::INFINITY;
        }
        edits as f64 / same as f64
    }

    /// Unordered pairs of registered source names.
    pub fn pairs(&self) -> Vec<(&str, &str)> {
        self.headers
            .keys()
            .tuple_combinations()
            .map(|(a, b)| (a.as_str(), b.as_str()))
            .collect()
    }

    /// Groups sources whose pairwise change ratio stays under the
    /// threshold, keyed by a destination name derived from the longest
    /// substring their names share.
    pub fn cluster(&self) -> BTreeMap<String, Vec<String>> {
        let mut scored: Vec<(f64, &str, &str)> = self
            .pairs()
            .into_iter()
            .map(|(a, b)| {
                let ratio = Self::match_headers(&self.headers[a], &self.headers[b]);
                (ratio, a, b)
            })
            .collect();
        scored.sort_by(|left, right| left.0.total_cmp(&right.0));

        let mut clusters: Vec<Vec<String>> = Vec::new();
        for (ratio, a, b) in scored {
            if ratio >= CLUSTER_THRESHOLD {
                continue;
            }
            match clusters
                .iter_mut()
                .find(|cluster| cluster.iter().any(|name| name == a || name == b))
            {
                Some(cluster) => {
                    for name in [a, b] {
                        if !cluster.iter().any(|existing| existing == name) {
                            cluster.push(name.to_string());
                        }
                    }
                }
                None => clusters.push(vec![a.to_string(), b.to_string()]),
            }
        }

        clusters
            .into_iter()
            .map(|mut members| {
                members.sort();
                let names: Vec<&str> = members.iter().map(String::as_str).collect();
                let destination = longest_common_substring(&names)
                    .to_snake_case()
                    .trim_matches('_')
                    .to_string();
                (destination, members)
            })
            .collect()
    }
}

/// Longest substring shared by every value.
pub fn longest_common_substring(values: &[&str]) -> String {
    let Some(first) = values.first() else {
        return String::new();
    };
    if values.len() == 1 {
        return (*first).to_string();
    }

    let chars: Vec<char> = first.chars().collect();
    let mut best = String::new();
    for start in 0..chars.len() {
        for end in (start + best.chars().count() + 1)..=chars.len() {
            let candidate: String = chars[start..end].iter().collect();
            if values.iter().all(|value| value.contains(&candidate)) {
                best = candidate;
            } else {
                break;
            }
        }
    }
    best
}
