//! Binary classification metrics for scored datasets.

/// Counts of a thresholded binary classifier against known labels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfusionMatrix {
    pub true_positive: u64,
    pub false_positive: u64,
    pub true_negative: u64,
    pub false_negative: u64,
}

impl ConfusionMatrix {
    /// A probability at or above `threshold` counts as a positive prediction.
    pub fn from_scores(labels: &[bool], probabilities: &[f64], threshold: f64) -> Self {
        let mut matrix = Self::default();
        for (&label, &probability) in labels.iter().zip(probabilities) {
            match (label, probability >= threshold) {
                (true, true) => matrix.true_positive += 1,
                (false, true) => matrix.false_positive += 1,
                (false, false) => matrix.true_negative += 1,
                (true, false) => matrix.false_negative += 1,
            }
        }
        matrix
    }

    pub fn total(&self) -> u64 {
        self.true_positive + self.false_positive + self.true_negative + self.false_negative
    }

    /// Positive predictive value.
    pub fn precision(&self) -> f64 {
        ratio(self.true_positive, self.true_positive + self.false_positive)
    }

    pub fn negative_predictive_value(&self) -> f64 {
        ratio(self.true_negative, self.true_negative + self.false_negative)
    }

    /// Recall.
    pub fn sensitivity(&self) -> f64 {
        ratio(self.true_positive, self.true_positive + self.false_negative)
    }

    pub fn specificity(&self) -> f64 {
        ratio(self.true_negative, self.true_negative + self.false_positive)
    }

    pub fn accuracy(&self) -> f64 {
        ratio(self.true_positive + self.true_negative, self.total())
    }
}

fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_each_quadrant() {
        let labels = [true, true, false, false, true];
        let scores = [0.9, 0.2, 0.7, 0.1, 0.5];
        let matrix = ConfusionMatrix::from_scores(&labels, &scores, 0.5);
        assert_eq!(
            matrix,
            ConfusionMatrix {
                true_positive: 2,
                false_positive: 1,
                true_negative: 1,
                false_negative: 1,
            }
        );
        assert_eq!(matrix.total(), 5);
        assert!((matrix.precision() - 2.0 / 3.0).abs() < 1e-12);
        assert!((matrix.negative_predictive_value() - 0.5).abs() < 1e-12);
        assert!((matrix.sensitivity() - 2.0 / 3.0).abs() < 1e-12);
        assert!((matrix.specificity() - 0.5).abs() < 1e-12);
        assert!((matrix.accuracy() - 0.6).abs() < 1e-12);
    }

    #[test]
    fn empty_denominators_yield_zero() {
        let matrix = ConfusionMatrix::from_scores(&[false, false], &[0.1, 0.2], 0.5);
        assert_eq!(matrix.precision(), 0.0);
        assert_eq!(matrix.sensitivity(), 0.0);
        assert_eq!(matrix.specificity(), 1.0);
        assert_eq!(ConfusionMatrix::default().accuracy(), 0.0);
    }
}
