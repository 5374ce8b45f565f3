//! Per-tree training statistics and their running aggregates.

use std::time::{Instant, SystemTime, UNIX_EPOCH};

use crate::confusion::{BinaryCounts, ConfusionMatrix, Rates};
use crate::error::ForestError;

/// One statistics row: a tree of a forest, or the totals of a run.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Stat {
    /// Tree number in construction order, or the tree count for a totals row.
    pub id: usize,
    /// Start time in seconds since the Unix epoch.
    pub start_time: u64,
    /// End time in seconds since the Unix epoch.
    pub end_time: u64,
    /// Wall-clock duration in seconds.
    pub elapsed: f64,
    /// True positives.
    pub tp: u64,
    /// False positives.
    pub fp: u64,
    /// True negatives.
    pub tn: u64,
    /// False negatives.
    #[serde(rename = "fn")]
    pub fn_: u64,
    /// Out-of-bag misclassification rate.
    pub oob_error: f64,
    /// Mean of `oob_error` over every row recorded so far.
    pub oob_error_mean: f64,
    /// TP / (TP + FN).
    pub tp_rate: f64,
    /// FP / (FP + TN).
    pub fp_rate: f64,
    /// TN / (FP + TN).
    pub tn_rate: f64,
    /// TP / (TP + FP).
    pub precision: f64,
    /// Harmonic mean of precision and TP rate.
    pub f_measure: f64,
    /// (TP + TN) / total.
    pub accuracy: f64,
}

impl Stat {
    /// Set the four counts and recompute every rate from them.
    pub fn set_counts(&mut self, counts: BinaryCounts) {
        let rates = Rates::from_counts(&counts);
        self.tp = counts.tp;
        self.fp = counts.fp;
        self.tn = counts.tn;
        self.fn_ = counts.fn_;
        self.tp_rate = rates.tp_rate;
        self.fp_rate = rates.fp_rate;
        self.tn_rate = rates.tn_rate;
        self.precision = rates.precision;
        self.f_measure = rates.f_measure;
        self.accuracy = rates.accuracy;
    }

    /// Return the four counts.
    #[must_use]
    pub fn counts(&self) -> BinaryCounts {
        BinaryCounts {
            tp: self.tp,
            fp: self.fp,
            tn: self.tn,
            fn_: self.fn_,
        }
    }

    /// Fields in statistics-file column order.
    ///
    /// `id, start, end, TP, FP, TN, FN, oob_error, oob_error_mean, TPR, FPR,
    /// precision, F, accuracy`. Downstream tooling reads columns by position.
    #[must_use]
    pub fn to_record(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.start_time.to_string(),
            self.end_time.to_string(),
            self.tp.to_string(),
            self.fp.to_string(),
            self.tn.to_string(),
            self.fn_.to_string(),
            self.oob_error.to_string(),
            self.oob_error_mean.to_string(),
            self.tp_rate.to_string(),
            self.fp_rate.to_string(),
            self.precision.to_string(),
            self.f_measure.to_string(),
            self.accuracy.to_string(),
        ]
    }
}

/// Times one unit of work and turns into a [`Stat`] when stopped.
#[derive(Debug)]
pub(crate) struct StatTimer {
    id: usize,
    start_time: u64,
    started: Instant,
}

impl StatTimer {
    pub(crate) fn start(id: usize) -> Self {
        Self {
            id,
            start_time: unix_now(),
            started: Instant::now(),
        }
    }

    pub(crate) fn stop(self) -> Stat {
        Stat {
            id: self.id,
            start_time: self.start_time,
            end_time: unix_now(),
            elapsed: self.started.elapsed().as_secs_f64(),
            ..Stat::default()
        }
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}

/// Statistics accumulated over a training run.
///
/// Holds one [`Stat`] per recorded step, the sum of every step's OOB
/// confusion matrix, and the sequence of OOB errors that drives
/// `oob_error_mean`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TrainingStats {
    per_step: Vec<Stat>,
    oob_matrix: ConfusionMatrix,
    oob_error_steps: Vec<f64>,
}

impl TrainingStats {
    /// Empty statistics over a class value space.
    #[must_use]
    pub fn new(value_space: &[String]) -> Self {
        Self {
            per_step: Vec::new(),
            oob_matrix: ConfusionMatrix::empty(value_space),
            oob_error_steps: Vec::new(),
        }
    }

    /// Append a row, filling in its `oob_error_mean` and folding `oob` into
    /// the accumulated matrix.
    ///
    /// # Errors
    ///
    /// [`ForestError::ValueSpaceMismatch`] if `oob` is over another value space.
    pub fn record(
        &mut self,
        mut stat: Stat,
        oob: Option<&ConfusionMatrix>,
    ) -> Result<&Stat, ForestError> {
        if let Some(matrix) = oob {
            self.oob_matrix.merge(matrix)?;
        }
        self.oob_error_steps.push(stat.oob_error);
        stat.oob_error_mean = mean(&self.oob_error_steps);
        self.per_step.push(stat);
        Ok(&self.per_step[self.per_step.len() - 1])
    }

    /// Totals row.
    ///
    /// `id` is the number of rows, the time span runs from the first start to
    /// the last end, counts are summed and rates recomputed from the sums.
    /// `oob_error` comes from the accumulated matrix and `oob_error_mean` is
    /// the mean of the per-row OOB errors.
    #[must_use]
    pub fn total(&self) -> Stat {
        let mut counts = BinaryCounts::default();
        for s in &self.per_step {
            counts.add(&s.counts());
        }
        let mut total = Stat {
            id: self.per_step.len(),
            start_time: self.per_step.first().map_or(0, |s| s.start_time),
            end_time: self.per_step.last().map_or(0, |s| s.end_time),
            elapsed: self.per_step.iter().map(|s| s.elapsed).sum(),
            oob_error: self.oob_matrix.error_rate(),
            oob_error_mean: mean(&self.oob_error_steps),
            ..Stat::default()
        };
        total.set_counts(counts);
        total
    }

    /// Return the recorded rows in order.
    #[must_use]
    pub fn per_step(&self) -> &[Stat] {
        &self.per_step
    }

    /// Return the sum of every recorded OOB confusion matrix.
    #[must_use]
    pub fn oob_matrix(&self) -> &ConfusionMatrix {
        &self.oob_matrix
    }

    /// Return the OOB error of every recorded row.
    #[must_use]
    pub fn oob_error_steps(&self) -> &[f64] {
        &self.oob_error_steps
    }

    /// Return the number of recorded rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.per_step.len()
    }

    /// Return `true` if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.per_step.is_empty()
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn space() -> Vec<String> {
        vec!["pos".to_string(), "neg".to_string()]
    }

    fn step(id: usize, actual: &[usize], predicted: &[usize]) -> (Stat, ConfusionMatrix) {
        let matrix = ConfusionMatrix::from_labels(actual, predicted, &space()).unwrap();
        let mut stat = Stat {
            id,
            start_time: 100 + id as u64,
            end_time: 101 + id as u64,
            elapsed: 0.5,
            ..Stat::default()
        };
        stat.set_counts(matrix.counts());
        stat.oob_error = matrix.error_rate();
        (stat, matrix)
    }

    #[test]
    fn record_fills_running_mean() {
        let mut stats = TrainingStats::new(&space());
        let (a, ma) = step(0, &[0, 1], &[0, 0]);
        let (b, mb) = step(1, &[0, 1], &[0, 1]);
        assert!((stats.record(a, Some(&ma)).unwrap().oob_error_mean - 0.5).abs() < 1e-12);
        assert!((stats.record(b, Some(&mb)).unwrap().oob_error_mean - 0.25).abs() < 1e-12);
        assert_eq!(stats.oob_error_steps(), &[0.5, 0.0]);
        assert_eq!(stats.oob_matrix().n_samples(), 4);
    }

    #[test]
    fn total_sums_counts_and_recomputes_rates() {
        let mut stats = TrainingStats::new(&space());
        let (a, ma) = step(0, &[0, 0, 1], &[0, 1, 1]);
        let (b, mb) = step(1, &[0, 1, 1], &[0, 0, 1]);
        stats.record(a, Some(&ma)).unwrap();
        stats.record(b, Some(&mb)).unwrap();

        let total = stats.total();
        assert_eq!(total.id, 2);
        assert_eq!(total.start_time, 100);
        assert_eq!(total.end_time, 102);
        assert_eq!(total.counts(), BinaryCounts { tp: 2, fp: 1, tn: 2, fn_: 1 });
        assert!((total.tp_rate - 2.0 / 3.0).abs() < 1e-12);
        assert!((total.oob_error - 2.0 / 6.0).abs() < 1e-12);
        assert!((total.oob_error_mean - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn empty_total_is_zero() {
        let stats = TrainingStats::new(&space());
        let total = stats.total();
        assert_eq!(total, Stat::default());
        assert!(stats.is_empty());
    }

    #[test]
    fn record_column_order() {
        let (mut stat, _) = step(3, &[0, 1], &[0, 1]);
        stat.oob_error_mean = 0.25;
        let record = stat.to_record();
        assert_eq!(record.len(), 14);
        assert_eq!(&record[..7], &["3", "103", "104", "1", "0", "1", "0"]);
        assert_eq!(record[7], "0");
        assert_eq!(record[8], "0.25");
        assert_eq!(record[9], "1");
        assert_eq!(record[13], "1");
    }

    #[test]
    fn timer_orders_times() {
        let stat = StatTimer::start(4).stop();
        assert_eq!(stat.id, 4);
        assert!(stat.end_time >= stat.start_time);
        assert!(stat.elapsed >= 0.0);
    }
}
