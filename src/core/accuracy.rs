use crate::types::{PipelineError, PipelineResult};
use serde::Serialize;
use std::collections::BTreeMap;

/// Square count matrix of actual vs. predicted class labels.
///
/// Cell (i, j) counts test samples whose actual class is label i and whose
/// predicted class is label j. Labels are the sorted union of both input
/// sequences.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfusionMatrix {
    labels: Vec<String>,
    counts: Vec<Vec<u64>>,
}

/// Structured accuracy report for downstream consumers
#[derive(Debug, Clone, Serialize)]
pub struct AccuracyReport {
    /// (actual, predicted) -> count, zero cells omitted
    pub confusion_matrix: BTreeMap<String, u64>,
    pub overall_accuracy: f64,
    pub producers_accuracy: BTreeMap<String, f64>,
    pub consumers_accuracy: BTreeMap<String, f64>,
}

impl ConfusionMatrix {
    /// Cross-tabulate aligned actual/predicted label sequences.
    /// Fails with InvalidInput on length mismatch.
    pub fn build(actual: &[String], predicted: &[String]) -> PipelineResult<Self> {
        if actual.len() != predicted.len() {
            return Err(PipelineError::InvalidInput(format!(
                "Actual ({}) and predicted ({}) sequences differ in length",
                actual.len(),
                predicted.len()
            )));
        }

        let mut labels: Vec<String> = actual
            .iter()
            .chain(predicted.iter())
            .cloned()
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .collect();
        labels.sort();

        let n = labels.len();
        let mut counts = vec![vec![0u64; n]; n];
        for (a, p) in actual.iter().zip(predicted.iter()) {
            let i = labels.iter().position(|l| l == a).unwrap();
            let j = labels.iter().position(|l| l == p).unwrap();
            counts[i][j] += 1;
        }

        log::debug!(
            "Built {}x{} confusion matrix from {} samples",
            n,
            n,
            actual.len()
        );
        Ok(Self { labels, counts })
    }

    /// Sorted class labels indexing the matrix
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Count of samples with actual class `actual` predicted as `predicted`
    pub fn count(&self, actual: &str, predicted: &str) -> u64 {
        let i = self.labels.iter().position(|l| l == actual);
        let j = self.labels.iter().position(|l| l == predicted);
        match (i, j) {
            (Some(i), Some(j)) => self.counts[i][j],
            _ => 0,
        }
    }

    /// Total number of samples
    pub fn total(&self) -> u64 {
        self.counts.iter().flatten().sum()
    }

    /// Trace / total; NaN for an empty matrix
    pub fn overall_accuracy(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return f64::NAN;
        }
        let trace: u64 = (0..self.labels.len()).map(|i| self.counts[i][i]).sum();
        trace as f64 / total as f64
    }

    /// Per-class recall: diagonal / row sum; NaN when the class has no
    /// actual samples (expected for under-sampled classes, not an error)
    pub fn producers_accuracy(&self) -> BTreeMap<String, f64> {
        self.labels
            .iter()
            .enumerate()
            .map(|(i, label)| {
                let row_sum: u64 = self.counts[i].iter().sum();
                let value = if row_sum == 0 {
                    f64::NAN
                } else {
                    self.counts[i][i] as f64 / row_sum as f64
                };
                (label.clone(), value)
            })
            .collect()
    }

    /// Per-class precision: diagonal / column sum; NaN when the class was
    /// never predicted
    pub fn consumers_accuracy(&self) -> BTreeMap<String, f64> {
        self.labels
            .iter()
            .enumerate()
            .map(|(j, label)| {
                let col_sum: u64 = (0..self.labels.len()).map(|i| self.counts[i][j]).sum();
                let value = if col_sum == 0 {
                    f64::NAN
                } else {
                    self.counts[j][j] as f64 / col_sum as f64
                };
                (label.clone(), value)
            })
            .collect()
    }

    /// Assemble the structured report exposed to reporting layers
    pub fn report(&self) -> AccuracyReport {
        let mut cells = BTreeMap::new();
        for (i, actual) in self.labels.iter().enumerate() {
            for (j, predicted) in self.labels.iter().enumerate() {
                if self.counts[i][j] > 0 {
                    cells.insert(format!("{}|{}", actual, predicted), self.counts[i][j]);
                }
            }
        }
        AccuracyReport {
            confusion_matrix: cells,
            overall_accuracy: self.overall_accuracy(),
            producers_accuracy: self.producers_accuracy(),
            consumers_accuracy: self.consumers_accuracy(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn labels(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let result = ConfusionMatrix::build(&labels(&["a", "b"]), &labels(&["a"]));
        assert!(matches!(result, Err(PipelineError::InvalidInput(_))));
    }

    #[test]
    fn test_perfect_prediction() {
        let seq = labels(&["urban", "forest", "urban", "agriculture"]);
        let matrix = ConfusionMatrix::build(&seq, &seq).unwrap();

        assert_relative_eq!(matrix.overall_accuracy(), 1.0);
        for (_, v) in matrix.producers_accuracy() {
            assert_relative_eq!(v, 1.0);
        }
        for (_, v) in matrix.consumers_accuracy() {
            assert_relative_eq!(v, 1.0);
        }
    }

    #[test]
    fn test_two_class_example() {
        let actual = labels(&["A", "A", "B", "B"]);
        let predicted = labels(&["A", "B", "A", "B"]);
        let matrix = ConfusionMatrix::build(&actual, &predicted).unwrap();

        assert_eq!(matrix.count("A", "A"), 1);
        assert_eq!(matrix.count("A", "B"), 1);
        assert_eq!(matrix.count("B", "A"), 1);
        assert_eq!(matrix.count("B", "B"), 1);
        assert_relative_eq!(matrix.overall_accuracy(), 0.5);
        assert_relative_eq!(matrix.producers_accuracy()["A"], 0.5);
        assert_relative_eq!(matrix.consumers_accuracy()["A"], 0.5);
    }

    #[test]
    fn test_absent_class_yields_nan_sentinel() {
        // "forest" appears only in predictions: row sum 0
        let actual = labels(&["urban", "urban"]);
        let predicted = labels(&["urban", "forest"]);
        let matrix = ConfusionMatrix::build(&actual, &predicted).unwrap();

        assert!(matrix.producers_accuracy()["forest"].is_nan());
        assert_relative_eq!(matrix.consumers_accuracy()["urban"], 1.0);
        // "forest" predicted once, never correct
        assert_relative_eq!(matrix.consumers_accuracy()["forest"], 0.0);
    }

    #[test]
    fn test_empty_sequences() {
        let matrix = ConfusionMatrix::build(&[], &[]).unwrap();
        assert_eq!(matrix.total(), 0);
        assert!(matrix.overall_accuracy().is_nan());
    }

    #[test]
    fn test_report_cells_sum_to_total() {
        let actual = labels(&["a", "b", "a", "c", "b"]);
        let predicted = labels(&["a", "b", "b", "c", "a"]);
        let matrix = ConfusionMatrix::build(&actual, &predicted).unwrap();
        let report = matrix.report();

        let cell_sum: u64 = report.confusion_matrix.values().sum();
        assert_eq!(cell_sum, matrix.total());
        assert_eq!(matrix.total(), 5);
    }
}
