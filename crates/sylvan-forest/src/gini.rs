//! Gini impurity and split gain for continuous and discrete attributes.

use sylvan_data::partition::two_way_partitions;
use tracing::warn;

use crate::node::SplitRule;

/// Distinct-value count above which discrete split search logs a warning.
///
/// Enumeration cost grows as `2^(n-1) - 1`; no bound is applied.
pub const DISCRETE_WARN_CARDINALITY: usize = 12;

/// Gini impurity `1 - Σ p_c²` of a class histogram.
///
/// Returns 0.0 when `n_samples` is zero.
#[must_use]
pub fn gini_impurity(class_counts: &[usize], n_samples: usize) -> f64 {
    if n_samples == 0 {
        return 0.0;
    }
    let n = n_samples as f64;
    let sum_sq: f64 = class_counts
        .iter()
        .map(|&c| {
            let p = c as f64 / n;
            p * p
        })
        .sum();
    1.0 - sum_sq
}

/// Best split found for one attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct GainRecord {
    /// Best candidate, or `None` when no candidate has a positive gain.
    pub split: Option<SplitRule>,
    /// Impurity reduction of `split`; always `>= 0`.
    pub gain: f64,
    /// Gini impurity of all rows before splitting.
    pub impurity: f64,
    /// For continuous attributes, the stable permutation that sorts the rows
    /// by value. `sorted_index[k]` is the input position of the k-th smallest.
    pub sorted_index: Option<Vec<usize>>,
    /// Attribute excluded from the search (split ancestor, class column, or
    /// outside the random feature subset).
    pub skip: bool,
}

impl GainRecord {
    /// A record for an attribute the caller excluded.
    #[must_use]
    pub fn skipped() -> Self {
        Self {
            split: None,
            gain: 0.0,
            impurity: 0.0,
            sorted_index: None,
            skip: true,
        }
    }

    /// Return `true` when the record holds a split worth taking.
    #[must_use]
    pub fn is_informative(&self) -> bool {
        !self.skip && self.split.is_some() && self.gain > 0.0
    }
}

/// Candidate thresholds over ascending `sorted` values.
///
/// The first candidate is half the smallest value and the last is that first
/// candidate plus the largest value. In between, the midpoint of every
/// consecutive pair, except a midpoint equal to a value at or after the pair.
fn continuous_candidates(sorted: &[f64]) -> Vec<f64> {
    let Some((&first, _)) = sorted.split_first() else {
        return Vec::new();
    };
    let lower = first / 2.0;
    let mut candidates = vec![lower];
    for i in 0..sorted.len() - 1 {
        let mid = (sorted[i] + sorted[i + 1]) / 2.0;
        if !sorted[i..].contains(&mid) {
            candidates.push(mid);
        }
    }
    candidates.push(lower + sorted[sorted.len() - 1]);
    candidates
}

/// Score every threshold of a continuous attribute.
///
/// `values[i]` and `classes[i]` describe row `i`; `classes` holds indices
/// into a value space of `n_classes` labels. Rows with `value < threshold`
/// form the left side. Ties in gain keep the first candidate.
#[must_use]
pub fn evaluate_continuous(values: &[f64], classes: &[usize], n_classes: usize) -> GainRecord {
    let n = values.len();
    let mut sorted_index: Vec<usize> = (0..n).collect();
    sorted_index.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let sorted: Vec<f64> = sorted_index.iter().map(|&i| values[i]).collect();

    // prefix[k * n_classes + c]: rows of class c among the first k sorted rows.
    let mut prefix = vec![0usize; (n + 1) * n_classes];
    for (k, &i) in sorted_index.iter().enumerate() {
        let (done, rest) = prefix.split_at_mut((k + 1) * n_classes);
        rest[..n_classes].copy_from_slice(&done[k * n_classes..]);
        rest[classes[i]] += 1;
    }
    let totals = &prefix[n * n_classes..];
    let impurity = gini_impurity(totals, n);

    let mut best_gain = 0.0;
    let mut best: Option<f64> = None;
    let mut right = vec![0usize; n_classes];

    for threshold in continuous_candidates(&sorted) {
        let n_left = sorted.partition_point(|&v| v < threshold);
        let left = &prefix[n_left * n_classes..(n_left + 1) * n_classes];
        for c in 0..n_classes {
            right[c] = totals[c] - left[c];
        }
        let gain = split_gain(impurity, left, n_left, &right, n - n_left);
        if gain > best_gain {
            best_gain = gain;
            best = Some(threshold);
        }
    }

    GainRecord {
        split: best.map(SplitRule::Threshold),
        gain: best_gain,
        impurity,
        sorted_index: Some(sorted_index),
        skip: false,
    }
}

/// Score every two-way partition of a discrete attribute's values.
///
/// Only values of `value_space` that occur in `values` are partitioned, in
/// value-space order. Rows whose value is in the kept subset form the left
/// side. Ties in gain keep the first partition.
#[must_use]
pub fn evaluate_discrete(
    values: &[String],
    value_space: &[String],
    classes: &[usize],
    n_classes: usize,
) -> GainRecord {
    let n = values.len();

    // Per-value class histograms, indexed like `value_space`.
    let mut by_value = vec![vec![0usize; n_classes]; value_space.len()];
    let mut totals = vec![0usize; n_classes];
    for (v, &c) in values.iter().zip(classes) {
        if let Some(pos) = value_space.iter().position(|s| s == v) {
            by_value[pos][c] += 1;
        }
        totals[c] += 1;
    }
    let impurity = gini_impurity(&totals, n);

    let present: Vec<usize> = (0..value_space.len())
        .filter(|&p| by_value[p].iter().any(|&c| c > 0))
        .collect();
    if present.len() > DISCRETE_WARN_CARDINALITY {
        warn!(
            n_values = present.len(),
            "high-cardinality discrete attribute, partition search is exponential"
        );
    }

    let mut best_gain = 0.0;
    let mut best: Option<Vec<usize>> = None;
    let mut left = vec![0usize; n_classes];
    let mut right = vec![0usize; n_classes];

    for (subset, _) in two_way_partitions(&present) {
        left.iter_mut().for_each(|c| *c = 0);
        for &p in &subset {
            for c in 0..n_classes {
                left[c] += by_value[p][c];
            }
        }
        let n_left: usize = left.iter().sum();
        for c in 0..n_classes {
            right[c] = totals[c] - left[c];
        }
        let gain = split_gain(impurity, &left, n_left, &right, n - n_left);
        if gain > best_gain {
            best_gain = gain;
            best = Some(subset);
        }
    }

    GainRecord {
        split: best.map(|subset| {
            SplitRule::Subset(subset.into_iter().map(|p| value_space[p].clone()).collect())
        }),
        gain: best_gain,
        impurity,
        sorted_index: None,
        skip: false,
    }
}

/// Parent impurity minus the size-weighted impurity of both sides.
fn split_gain(parent: f64, left: &[usize], n_left: usize, right: &[usize], n_right: usize) -> f64 {
    let n = (n_left + n_right) as f64;
    if n == 0.0 {
        return 0.0;
    }
    let pl = n_left as f64 / n;
    let pr = n_right as f64 / n;
    parent - (pl * gini_impurity(left, n_left) + pr * gini_impurity(right, n_right))
}
