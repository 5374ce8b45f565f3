//! Confusion matrix, binary-framed counts and derived rates.

use std::fmt;

use crate::error::ForestError;

/// A confusion matrix over an ordered class value space.
///
/// Entry `matrix[actual][predicted]` counts how many samples of class
/// `actual` were predicted as `predicted`. Index 0 of the value space is the
/// positive class for [`counts`](Self::counts).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ConfusionMatrix {
    value_space: Vec<String>,
    matrix: Vec<Vec<usize>>,
}

/// True/false positive/negative counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct BinaryCounts {
    /// True positives.
    pub tp: u64,
    /// False positives.
    pub fp: u64,
    /// True negatives.
    pub tn: u64,
    /// False negatives.
    #[serde(rename = "fn")]
    pub fn_: u64,
}

impl BinaryCounts {
    /// Sum of all four counts.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.tp + self.fp + self.tn + self.fn_
    }

    /// Add another set of counts to this one.
    pub fn add(&mut self, other: &BinaryCounts) {
        self.tp += other.tp;
        self.fp += other.fp;
        self.tn += other.tn;
        self.fn_ += other.fn_;
    }
}

/// Rates derived from [`BinaryCounts`]. A zero denominator yields 0.
#[derive(Debug, Clone, Copy, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct Rates {
    /// TP / (TP + FN), also called recall.
    pub tp_rate: f64,
    /// FP / (FP + TN).
    pub fp_rate: f64,
    /// TN / (FP + TN).
    pub tn_rate: f64,
    /// TP / (TP + FP).
    pub precision: f64,
    /// 2 / (1/precision + 1/tp_rate); 0 when either is 0.
    pub f_measure: f64,
    /// (TP + TN) / total.
    pub accuracy: f64,
}

impl Rates {
    /// Derive every rate from the four counts.
    #[must_use]
    pub fn from_counts(c: &BinaryCounts) -> Self {
        let tp_rate = ratio(c.tp, c.tp + c.fn_);
        let precision = ratio(c.tp, c.tp + c.fp);
        let f_measure = if tp_rate == 0.0 || precision == 0.0 {
            0.0
        } else {
            2.0 / (1.0 / precision + 1.0 / tp_rate)
        };
        Self {
            tp_rate,
            fp_rate: ratio(c.fp, c.fp + c.tn),
            tn_rate: ratio(c.tn, c.fp + c.tn),
            precision,
            f_measure,
            accuracy: ratio(c.tp + c.tn, c.total()),
        }
    }
}

fn ratio(num: u64, den: u64) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// Per-class precision, recall, and F1 score.
#[derive(Debug, Clone)]
pub struct ClassMetrics {
    /// The class index.
    pub class: usize,
    /// Precision: TP / (TP + FP). 0.0 if no predictions for this class.
    pub precision: f64,
    /// Recall: TP / (TP + FN). 0.0 if no true samples for this class.
    pub recall: f64,
    /// F1: 2 * precision * recall / (precision + recall). 0.0 if both are zero.
    pub f1: f64,
    /// Number of true samples in this class.
    pub support: usize,
}

/// Sample ids grouped by binary outcome, positive class at index 0.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexGroups {
    /// Positive samples predicted positive.
    pub tp: Vec<usize>,
    /// Positive samples predicted negative.
    pub fn_: Vec<usize>,
    /// Negative samples predicted positive.
    pub fp: Vec<usize>,
    /// Negative samples predicted negative.
    pub tn: Vec<usize>,
}

impl ConfusionMatrix {
    /// An all-zero matrix over `value_space`.
    #[must_use]
    pub fn empty(value_space: &[String]) -> Self {
        let n = value_space.len();
        Self {
            value_space: value_space.to_vec(),
            matrix: vec![vec![0usize; n]; n],
        }
    }

    /// Build a matrix from actual and predicted class indices.
    ///
    /// Zero samples is allowed and yields an all-zero matrix.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ForestError::LabelCountMismatch`] | `actual` and `predicted` differ in length |
    /// | [`ForestError::ClassIndexOutOfRange`] | an index is `>= value_space.len()` |
    pub fn from_labels(
        actual: &[usize],
        predicted: &[usize],
        value_space: &[String],
    ) -> Result<Self, ForestError> {
        if actual.len() != predicted.len() {
            return Err(ForestError::LabelCountMismatch {
                actual: actual.len(),
                predicted: predicted.len(),
            });
        }
        let mut cm = Self::empty(value_space);
        let n_classes = value_space.len();
        for (&a, &p) in actual.iter().zip(predicted) {
            if let Some(&index) = [a, p].iter().find(|&&i| i >= n_classes) {
                return Err(ForestError::ClassIndexOutOfRange { index, n_classes });
            }
            cm.matrix[a][p] += 1;
        }
        Ok(cm)
    }

    /// Build a matrix from actual and predicted label strings.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ForestError::LabelCountMismatch`] | `actual` and `predicted` differ in length |
    /// | [`ForestError::UnknownClassValue`] | a label is not in `value_space` |
    pub fn from_strings<S: AsRef<str>>(
        value_space: &[String],
        actual: &[S],
        predicted: &[S],
    ) -> Result<Self, ForestError> {
        let index_of = |label: &S| {
            value_space
                .iter()
                .position(|v| v == label.as_ref())
                .ok_or_else(|| ForestError::UnknownClassValue {
                    label: label.as_ref().to_string(),
                })
        };
        let actual: Vec<usize> = actual.iter().map(index_of).collect::<Result<_, _>>()?;
        let predicted: Vec<usize> = predicted.iter().map(index_of).collect::<Result<_, _>>()?;
        Self::from_labels(&actual, &predicted, value_space)
    }

    /// Total number of tabulated samples.
    #[must_use]
    pub fn n_samples(&self) -> usize {
        self.matrix.iter().flatten().sum()
    }

    /// Binary-framed counts with value-space index 0 as positive.
    ///
    /// With one or two classes this is the usual TP/FP/TN/FN. With more
    /// classes, the one-vs-rest counts of every class are summed, so the
    /// four counts add up to `n_classes * n_samples`. The identity
    /// `tp + fp + tn + fn == n_samples` therefore holds only for binary data.
    #[must_use]
    pub fn counts(&self) -> BinaryCounts {
        let n = self.n_classes();
        if n <= 2 {
            return self.one_vs_rest(0);
        }
        let mut total = BinaryCounts::default();
        for c in 0..n {
            total.add(&self.one_vs_rest(c));
        }
        total
    }

    fn one_vs_rest(&self, c: usize) -> BinaryCounts {
        if c >= self.n_classes() {
            return BinaryCounts::default();
        }
        let tp = self.matrix[c][c];
        let fn_: usize = self.matrix[c].iter().sum::<usize>() - tp;
        let fp: usize = self.matrix.iter().map(|row| row[c]).sum::<usize>() - tp;
        let tn = self.n_samples() - tp - fn_ - fp;
        BinaryCounts {
            tp: tp as u64,
            fp: fp as u64,
            tn: tn as u64,
            fn_: fn_ as u64,
        }
    }

    /// Rates derived from [`counts`](Self::counts).
    #[must_use]
    pub fn rates(&self) -> Rates {
        Rates::from_counts(&self.counts())
    }

    /// Overall accuracy: proportion of correct predictions. 0 with no samples.
    #[must_use]
    pub fn accuracy(&self) -> f64 {
        let correct: usize = (0..self.n_classes()).map(|i| self.matrix[i][i]).sum();
        ratio(correct as u64, self.n_samples() as u64)
    }

    /// Misclassification rate. 0 with no samples.
    #[must_use]
    pub fn error_rate(&self) -> f64 {
        let n = self.n_samples();
        if n == 0 {
            0.0
        } else {
            1.0 - self.accuracy()
        }
    }

    /// Per-class precision, recall, F1, and support.
    #[must_use]
    pub fn class_metrics(&self) -> Vec<ClassMetrics> {
        (0..self.n_classes())
            .map(|c| {
                let counts = self.one_vs_rest(c);
                let support = (counts.tp + counts.fn_) as usize;
                let precision = ratio(counts.tp, counts.tp + counts.fp);
                let recall = ratio(counts.tp, counts.tp + counts.fn_);
                let f1 = if precision + recall == 0.0 {
                    0.0
                } else {
                    2.0 * precision * recall / (precision + recall)
                };
                ClassMetrics {
                    class: c,
                    precision,
                    recall,
                    f1,
                    support,
                }
            })
            .collect()
    }

    /// Add the counts of `other` to this matrix.
    ///
    /// # Errors
    ///
    /// [`ForestError::ValueSpaceMismatch`] if the value spaces differ.
    pub fn merge(&mut self, other: &ConfusionMatrix) -> Result<(), ForestError> {
        if self.value_space != other.value_space {
            return Err(ForestError::ValueSpaceMismatch);
        }
        for (row, other_row) in self.matrix.iter_mut().zip(&other.matrix) {
            for (cell, &v) in row.iter_mut().zip(other_row) {
                *cell += v;
            }
        }
        Ok(())
    }

    /// Group `sample_ids` by binary outcome, index 0 being positive.
    ///
    /// `sample_ids`, `actual` and `predicted` are parallel; extra elements of
    /// the longer slices are ignored.
    #[must_use]
    pub fn group_indices(sample_ids: &[usize], actual: &[usize], predicted: &[usize]) -> IndexGroups {
        let mut groups = IndexGroups::default();
        for ((&id, &a), &p) in sample_ids.iter().zip(actual).zip(predicted) {
            match (a == 0, p == 0) {
                (true, true) => groups.tp.push(id),
                (true, false) => groups.fn_.push(id),
                (false, true) => groups.fp.push(id),
                (false, false) => groups.tn.push(id),
            }
        }
        groups
    }

    /// Return the underlying matrix rows.
    #[must_use]
    pub fn as_rows(&self) -> &[Vec<usize>] {
        &self.matrix
    }

    /// Return the class value space.
    #[must_use]
    pub fn value_space(&self) -> &[String] {
        &self.value_space
    }

    /// Return the number of classes.
    #[must_use]
    pub fn n_classes(&self) -> usize {
        self.value_space.len()
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .value_space
            .iter()
            .map(String::len)
            .max()
            .unwrap_or(0)
            .max(7);

        write!(f, "{:>width$}", "")?;
        for name in &self.value_space {
            write!(f, " {name:>width$}")?;
        }
        writeln!(f, " {:>width$}", "error")?;

        for (i, (name, row)) in self.value_space.iter().zip(&self.matrix).enumerate() {
            write!(f, "{name:>width$}")?;
            for val in row {
                write!(f, " {val:>width$}")?;
            }
            let total: usize = row.iter().sum();
            let error = ratio((total - row[i]) as u64, total as u64);
            writeln!(f, " {error:>width$.4}")?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn space(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| (*s).to_string()).collect()
    }

    // --- Construction ---

    #[test]
    fn binary_counts_from_strings() {
        // Positive is "1".
        let vs = space(&["1", "0"]);
        let actual = ["1", "1", "1", "0", "0", "0", "0"];
        let predicted = ["1", "1", "0", "0", "0", "0", "1"];
        let cm = ConfusionMatrix::from_strings(&vs, &actual, &predicted).unwrap();
        let c = cm.counts();
        assert_eq!(c, BinaryCounts { tp: 2, fp: 1, tn: 3, fn_: 1 });
        assert_eq!(c.total(), cm.n_samples() as u64);
    }

    #[test]
    fn zero_samples_allowed() {
        let cm = ConfusionMatrix::from_labels(&[], &[], &space(&["a", "b"])).unwrap();
        assert_eq!(cm.n_samples(), 0);
        assert_eq!(cm.error_rate(), 0.0);
        assert_eq!(cm.rates(), Rates::default());
    }

    #[test]
    fn length_mismatch_error() {
        let err = ConfusionMatrix::from_labels(&[0, 1], &[0], &space(&["a", "b"])).unwrap_err();
        assert!(matches!(err, ForestError::LabelCountMismatch { actual: 2, predicted: 1 }));
    }

    #[test]
    fn index_out_of_range_error() {
        let err = ConfusionMatrix::from_labels(&[0], &[2], &space(&["a", "b"])).unwrap_err();
        assert!(matches!(err, ForestError::ClassIndexOutOfRange { index: 2, n_classes: 2 }));
    }

    #[test]
    fn unknown_label_error() {
        let err = ConfusionMatrix::from_strings(&space(&["a"]), &["a"], &["z"]).unwrap_err();
        assert!(matches!(err, ForestError::UnknownClassValue { .. }));
    }

    // --- Rates ---

    #[test]
    fn rates_from_known_counts() {
        let r = Rates::from_counts(&BinaryCounts { tp: 2, fp: 1, tn: 3, fn_: 1 });
        assert!((r.tp_rate - 2.0 / 3.0).abs() < 1e-12);
        assert!((r.fp_rate - 0.25).abs() < 1e-12);
        assert!((r.tn_rate - 0.75).abs() < 1e-12);
        assert!((r.precision - 2.0 / 3.0).abs() < 1e-12);
        assert!((r.f_measure - 2.0 / 3.0).abs() < 1e-12);
        assert!((r.accuracy - 5.0 / 7.0).abs() < 1e-12);
    }

    #[test]
    fn zero_denominators_give_zero_rates() {
        // No positives at all: TPR, precision and F have zero denominators.
        let r = Rates::from_counts(&BinaryCounts { tp: 0, fp: 0, tn: 4, fn_: 0 });
        assert_eq!(r.tp_rate, 0.0);
        assert_eq!(r.precision, 0.0);
        assert_eq!(r.f_measure, 0.0);
        assert_eq!(r.tn_rate, 1.0);
        assert!(!r.f_measure.is_nan());
    }

    #[test]
    fn rates_are_bounded() {
        let cm = ConfusionMatrix::from_labels(
            &[0, 1, 2, 2, 1, 0, 0],
            &[0, 2, 2, 1, 1, 1, 0],
            &space(&["a", "b", "c"]),
        )
        .unwrap();
        let r = cm.rates();
        for v in [r.tp_rate, r.fp_rate, r.tn_rate, r.precision, r.f_measure, r.accuracy] {
            assert!((0.0..=1.0).contains(&v), "rate = {v}");
        }
    }

    #[test]
    fn multi_class_counts_sum_one_vs_rest() {
        let cm = ConfusionMatrix::from_labels(
            &[0, 0, 0, 1, 1, 1, 2, 2, 2],
            &[0, 0, 1, 1, 1, 2, 2, 2, 0],
            &space(&["a", "b", "c"]),
        )
        .unwrap();
        let c = cm.counts();
        // Each class: TP=2, FP=1, FN=1, TN=5.
        assert_eq!(c, BinaryCounts { tp: 6, fp: 3, tn: 15, fn_: 3 });
        assert_eq!(c.total(), 3 * 9);
    }

    #[test]
    fn known_class_metrics() {
        let cm = ConfusionMatrix::from_labels(
            &[0, 0, 0, 1, 1, 1, 2, 2, 2],
            &[0, 0, 1, 1, 1, 2, 2, 2, 0],
            &space(&["a", "b", "c"]),
        )
        .unwrap();
        let metrics = cm.class_metrics();
        assert!((metrics[0].precision - 2.0 / 3.0).abs() < 1e-10);
        assert!((metrics[0].recall - 2.0 / 3.0).abs() < 1e-10);
        assert_eq!(metrics[0].support, 3);
        assert!((cm.accuracy() - 6.0 / 9.0).abs() < 1e-10);
        assert!((cm.error_rate() - 3.0 / 9.0).abs() < 1e-10);
    }

    // --- Aggregation ---

    #[test]
    fn merge_sums_counts() {
        let vs = space(&["a", "b"]);
        let mut a = ConfusionMatrix::from_labels(&[0, 1], &[0, 0], &vs).unwrap();
        let b = ConfusionMatrix::from_labels(&[1, 1], &[1, 0], &vs).unwrap();
        a.merge(&b).unwrap();
        assert_eq!(a.as_rows(), &[vec![1usize, 0], vec![2, 1]]);
    }

    #[test]
    fn merge_rejects_other_value_space() {
        let mut a = ConfusionMatrix::empty(&space(&["a", "b"]));
        let b = ConfusionMatrix::empty(&space(&["b", "a"]));
        assert!(matches!(a.merge(&b), Err(ForestError::ValueSpaceMismatch)));
    }

    #[test]
    fn group_indices_by_outcome() {
        let ids = [10, 11, 12, 13, 14, 15, 16];
        let actual = [0, 0, 0, 1, 1, 1, 1];
        let predicted = [0, 0, 1, 1, 1, 1, 0];
        let g = ConfusionMatrix::group_indices(&ids, &actual, &predicted);
        assert_eq!(g.tp, vec![10, 11]);
        assert_eq!(g.fn_, vec![12]);
        assert_eq!(g.tn, vec![13, 14, 15]);
        assert_eq!(g.fp, vec![16]);
    }

    #[test]
    fn display_has_error_column() {
        let cm = ConfusionMatrix::from_labels(&[0, 1, 1], &[0, 0, 1], &space(&["yes", "no"]))
            .unwrap();
        let output = format!("{cm}");
        assert!(output.contains("error"));
        assert!(output.contains("0.5000"));
        assert!(output.contains("yes"));
    }
}
