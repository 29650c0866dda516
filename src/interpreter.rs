//! Numeric interpretation of raw model output.
//!
//! Turns the scorer's raw logits into a labeled, confidence-scored
//! prediction: argmax selection with lowest-index tie-breaking, and a
//! numerically stable softmax restricted to the winning class.

use crate::{PredictError, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Output class labels, index-aligned with the tokenizer's movement bands.
///
/// The semantic alignment between these labels and the model's trained
/// output classes is a training-time contract; this crate assumes it and
/// cannot verify it.
pub const REGIME_LABELS: [&str; 5] = ["BIG_DUMP", "DUMP", "FLAT", "PUMP", "BIG_PUMP"];

/// External scoring capability.
///
/// Implementors take one sequence of movement tokens and return the raw,
/// unnormalized score for each of the five output classes. The real
/// implementation wraps an ONNX session; tests inject deterministic fakes.
pub trait Scorer {
    /// Score one token sequence, returning exactly
    /// [`REGIME_LABELS`]`.len()` raw values.
    fn score(&self, tokens: &[i64]) -> Result<Vec<f32>>;
}

/// A labeled, confidence-scored regime prediction.
///
/// Serializes to the service response shape:
/// `{"prediction": "...", "confidence": 0.87, "token": 4}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    /// Predicted regime label from [`REGIME_LABELS`]
    #[serde(rename = "prediction")]
    pub label: String,

    /// Softmax probability of the winning class, in (0, 1]
    pub confidence: f64,

    /// Index of the winning class
    pub token: usize,
}

impl Prediction {
    /// Interpret a raw score vector.
    ///
    /// Selects the first-occurring maximum, then computes its softmax
    /// probability with the max subtracted before exponentiating so large
    /// logits cannot overflow.
    ///
    /// # Errors
    /// [`PredictError::ScorerFailure`] if the vector is not exactly five
    /// values or contains a non-finite value.
    pub fn from_scores(scores: &[f32]) -> Result<Self> {
        if scores.len() != REGIME_LABELS.len() {
            return Err(PredictError::ScorerFailure(format!(
                "expected {} scores, got {}",
                REGIME_LABELS.len(),
                scores.len()
            )));
        }
        if let Some(bad) = scores.iter().find(|s| !s.is_finite()) {
            return Err(PredictError::ScorerFailure(format!(
                "non-finite score {} in model output",
                bad
            )));
        }

        let mut token = 0;
        let mut max = scores[0];
        for (i, &score) in scores.iter().enumerate().skip(1) {
            if score > max {
                max = score;
                token = i;
            }
        }

        let sum: f64 = scores.iter().map(|&s| f64::from(s - max).exp()).sum();
        let confidence = f64::from(scores[token] - max).exp() / sum;

        Ok(Self {
            label: REGIME_LABELS[token].to_string(),
            confidence,
            token,
        })
    }
}

/// Run one scoring call and interpret the result.
///
/// Invokes `scorer` exactly once with the token sequence; any scorer error
/// or malformed output fails the request without retries or substituted
/// defaults.
pub fn interpret<S: Scorer + ?Sized>(tokens: &[i64], scorer: &S) -> Result<Prediction> {
    let scores = scorer.score(tokens)?;
    let prediction = Prediction::from_scores(&scores)?;

    debug!(
        label = %prediction.label,
        confidence = prediction.confidence,
        "interpreted model output"
    );
    Ok(prediction)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedScorer {
        scores: Vec<f32>,
        calls: AtomicUsize,
    }

    impl FixedScorer {
        fn new(scores: Vec<f32>) -> Self {
            Self {
                scores,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl Scorer for FixedScorer {
        fn score(&self, _tokens: &[i64]) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.scores.clone())
        }
    }

    #[test]
    fn test_argmax_selects_largest() {
        let p = Prediction::from_scores(&[0.1, 0.2, 3.0, 0.4, 0.5]).unwrap();
        assert_eq!(p.token, 2);
        assert_eq!(p.label, "FLAT");
    }

    #[test]
    fn test_argmax_tie_breaks_to_lowest_index() {
        let p = Prediction::from_scores(&[1.0, 1.0, 0.0, 0.0, 0.0]).unwrap();
        assert_eq!(p.token, 0);
        assert_eq!(p.label, "BIG_DUMP");
    }

    #[test]
    fn test_confidence_bounds() {
        let cases: [[f32; 5]; 4] = [
            [0.0, 0.0, 0.0, 0.0, 0.0],
            [100.0, -100.0, 0.0, 50.0, -50.0],
            [1e30, 1e30, 1e30, 1e30, 1e30],
            [-1e30, -1e30, -1e30, -1e30, 1e30],
        ];
        for scores in cases {
            let p = Prediction::from_scores(&scores).unwrap();
            assert!(p.confidence > 0.0, "scores {:?}", scores);
            assert!(p.confidence <= 1.0, "scores {:?}", scores);
        }
    }

    #[test]
    fn test_uniform_scores_give_uniform_confidence() {
        let p = Prediction::from_scores(&[2.0, 2.0, 2.0, 2.0, 2.0]).unwrap();
        assert!((p.confidence - 0.2).abs() < 1e-12);
        assert_eq!(p.token, 0);
    }

    #[test]
    fn test_large_logits_do_not_overflow() {
        // Without max subtraction exp(200) would already be inf in f32.
        let p = Prediction::from_scores(&[200.0, 190.0, 180.0, 170.0, 160.0]).unwrap();
        assert_eq!(p.token, 0);
        assert!(p.confidence > 0.99 && p.confidence <= 1.0);
    }

    #[test]
    fn test_confident_big_pump() {
        let p = Prediction::from_scores(&[-1.0, -1.0, -1.0, -1.0, 5.0]).unwrap();
        assert_eq!(p.token, 4);
        assert_eq!(p.label, "BIG_PUMP");
        assert!(p.confidence > 0.9);
        assert!(p.confidence < 1.0);
    }

    #[test]
    fn test_wrong_length_rejected() {
        assert!(matches!(
            Prediction::from_scores(&[1.0, 2.0, 3.0]),
            Err(PredictError::ScorerFailure(_))
        ));
        assert!(matches!(
            Prediction::from_scores(&[1.0; 6]),
            Err(PredictError::ScorerFailure(_))
        ));
    }

    #[test]
    fn test_non_finite_scores_rejected() {
        for bad in [f32::NAN, f32::INFINITY, f32::NEG_INFINITY] {
            let scores = [0.0, bad, 0.0, 0.0, 0.0];
            assert!(matches!(
                Prediction::from_scores(&scores),
                Err(PredictError::ScorerFailure(_))
            ));
        }
    }

    #[test]
    fn test_interpret_invokes_scorer_once() {
        let scorer = FixedScorer::new(vec![0.0, 1.0, 0.0, 0.0, 0.0]);
        let tokens = vec![2i64; 64];

        let p = interpret(&tokens, &scorer).unwrap();
        assert_eq!(p.token, 1);
        assert_eq!(p.label, "DUMP");
        assert_eq!(scorer.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_interpret_propagates_scorer_error() {
        struct FailingScorer;
        impl Scorer for FailingScorer {
            fn score(&self, _tokens: &[i64]) -> Result<Vec<f32>> {
                Err(PredictError::ScorerFailure("engine exploded".to_string()))
            }
        }

        let tokens = vec![2i64; 64];
        assert!(matches!(
            interpret(&tokens, &FailingScorer),
            Err(PredictError::ScorerFailure(_))
        ));
    }

    #[test]
    fn test_prediction_response_shape() {
        let p = Prediction::from_scores(&[-1.0, -1.0, -1.0, -1.0, 5.0]).unwrap();
        let json = serde_json::to_value(&p).unwrap();

        assert_eq!(json["prediction"], "BIG_PUMP");
        assert_eq!(json["token"], 4);
        assert!(json["confidence"].as_f64().unwrap() > 0.9);
    }
}
