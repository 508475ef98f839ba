//! Classification result.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::labels::LabelSet;

/// Allowed deviation of a probability vector's sum from 1.
pub const PROBABILITY_TOLERANCE: f32 = 1e-5;

/// A predicted label together with the full probability distribution.
///
/// Construction checks the softmax postcondition (one finite, non-negative
/// entry per class, summing to 1) and picks the label as the argmax, so a
/// `Prediction` is always internally consistent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    label: String,
    index: usize,
    probabilities: Vec<f32>,
}

impl Prediction {
    /// Build a prediction from a softmax output.
    ///
    /// Ties resolve to the lowest class index.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidProbabilities`] if the vector length does not
    /// match the label set, an entry is negative or not finite, or the sum is
    /// not 1 within [`PROBABILITY_TOLERANCE`].
    pub fn from_probabilities(probabilities: Vec<f32>, labels: &LabelSet) -> Result<Self> {
        if probabilities.len() != labels.len() {
            return Err(CoreError::InvalidProbabilities(format!(
                "expected {} entries, got {}",
                labels.len(),
                probabilities.len()
            )));
        }
        if let Some(p) = probabilities.iter().find(|p| !p.is_finite() || **p < 0.0) {
            return Err(CoreError::InvalidProbabilities(format!(
                "entry {p} is not a probability"
            )));
        }
        let sum: f32 = probabilities.iter().sum();
        if (sum - 1.0).abs() > PROBABILITY_TOLERANCE {
            return Err(CoreError::InvalidProbabilities(format!(
                "entries sum to {sum}"
            )));
        }

        let mut index = 0;
        for (i, p) in probabilities.iter().enumerate() {
            if *p > probabilities[index] {
                index = i;
            }
        }
        let label = labels
            .get(index)
            .ok_or_else(|| CoreError::UnknownLabel(index.to_string()))?
            .to_string();

        Ok(Self {
            label,
            index,
            probabilities,
        })
    }

    /// Predicted class name.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Output unit of the predicted class.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Probability of every class, in output-unit order.
    #[must_use]
    pub fn probabilities(&self) -> &[f32] {
        &self.probabilities
    }

    /// Probability of the predicted class.
    #[must_use]
    pub fn confidence(&self) -> f32 {
        self.probabilities[self.index]
    }

    /// Confidence as a percentage with two decimals, e.g. `"97.31%"`.
    #[must_use]
    pub fn confidence_percent(&self) -> String {
        format!("{:.2}%", self.confidence() * 100.0)
    }

    /// Class names paired with their probabilities, most likely first.
    #[must_use]
    pub fn ranked<'a>(&self, labels: &'a LabelSet) -> Vec<(&'a str, f32)> {
        let mut ranked: Vec<(&str, f32)> = labels.iter().zip(self.probabilities.iter().copied()).collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argmax_label() {
        let labels = LabelSet::default();
        let pred = Prediction::from_probabilities(vec![0.1, 0.6, 0.2, 0.1], &labels).unwrap();

        assert_eq!(pred.label(), "meningioma");
        assert_eq!(pred.index(), 1);
        assert!((pred.confidence() - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_tie_picks_first() {
        let labels = LabelSet::default();
        let pred = Prediction::from_probabilities(vec![0.25; 4], &labels).unwrap();
        assert_eq!(pred.label(), "glioma");
    }

    #[test]
    fn test_confidence_percent() {
        let labels = LabelSet::default();
        let pred =
            Prediction::from_probabilities(vec![0.97314, 0.01, 0.01, 0.00686], &labels).unwrap();
        assert_eq!(pred.confidence_percent(), "97.31%");
    }

    #[test]
    fn test_rejects_wrong_length() {
        let labels = LabelSet::default();
        assert!(Prediction::from_probabilities(vec![0.5, 0.5], &labels).is_err());
    }

    #[test]
    fn test_rejects_negative_and_bad_sum() {
        let labels = LabelSet::default();
        assert!(Prediction::from_probabilities(vec![1.2, -0.2, 0.0, 0.0], &labels).is_err());
        assert!(Prediction::from_probabilities(vec![0.5, 0.5, 0.5, 0.0], &labels).is_err());
        assert!(Prediction::from_probabilities(vec![f32::NAN, 0.5, 0.5, 0.0], &labels).is_err());
    }

    #[test]
    fn test_ranked() {
        let labels = LabelSet::default();
        let pred = Prediction::from_probabilities(vec![0.1, 0.2, 0.3, 0.4], &labels).unwrap();

        let ranked = pred.ranked(&labels);
        assert_eq!(ranked[0].0, "pituitary");
        assert_eq!(ranked[3].0, "glioma");
        assert_eq!(ranked[1], ("notumor", 0.3));
    }
}
