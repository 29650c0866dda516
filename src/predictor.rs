//! Model loading and the end-to-end prediction pipeline.
//!
//! Provides the ONNX-backed [`Scorer`] implementation and the
//! [`RegimePredictor`] handle that composes tokenization, scoring, and
//! interpretation per request.

use crate::interpreter::{interpret, Prediction, Scorer, REGIME_LABELS};
use crate::tokenizer::{tokenize, TOKEN_COUNT};
use crate::{PredictError, Result};
use anyhow::Context;
use ndarray::Array2;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Value;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Configuration for model loading and inference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Enable full graph optimization
    pub optimize_graph: bool,

    /// Intra-op thread count for the inference session
    pub intra_threads: usize,

    /// Name of the model's token input tensor
    pub input_name: String,

    /// Name of the model's logits output tensor
    pub output_name: String,

    /// Optional inference deadline in milliseconds; `None` means the
    /// scorer call may block indefinitely
    pub inference_timeout_ms: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            optimize_graph: true,
            intra_threads: 1,
            // Tensor names from the model export contract
            input_name: "input_ids".to_string(),
            output_name: "logits".to_string(),
            inference_timeout_ms: None,
        }
    }
}

/// ONNX Runtime scorer.
///
/// Holds the loaded session behind a mutex so the scorer is `Sync` and one
/// handle can serve concurrent requests; inference calls on the same handle
/// serialize at the session boundary.
pub struct OnnxScorer {
    session: Mutex<Session>,
    input_name: String,
    output_name: String,
}

impl OnnxScorer {
    /// Load an ONNX model from disk.
    ///
    /// # Example
    /// ```no_run
    /// use regime_inference::{Config, OnnxScorer};
    /// use std::path::Path;
    ///
    /// let scorer = OnnxScorer::from_file(Path::new("model.onnx"), &Config::default()).unwrap();
    /// ```
    pub fn from_file(model_path: &Path, config: &Config) -> anyhow::Result<Self> {
        let session = Session::builder()?
            .with_optimization_level(if config.optimize_graph {
                GraphOptimizationLevel::Level3
            } else {
                GraphOptimizationLevel::Level1
            })?
            .with_intra_threads(config.intra_threads)?
            .commit_from_file(model_path)
            .with_context(|| format!("failed to load model from {}", model_path.display()))?;

        info!(model = %model_path.display(), "loaded ONNX model");

        Ok(Self {
            session: Mutex::new(session),
            input_name: config.input_name.clone(),
            output_name: config.output_name.clone(),
        })
    }
}

impl Scorer for OnnxScorer {
    /// Run one inference pass over a single token sequence.
    ///
    /// The sequence is reshaped into a batch of one (`[1, 64]`, int64) and
    /// the output logits (`[1, 5]`, f32) are returned flattened.
    fn score(&self, tokens: &[i64]) -> Result<Vec<f32>> {
        if tokens.len() != TOKEN_COUNT {
            return Err(PredictError::InvalidInput(format!(
                "expected {} tokens, got {}",
                TOKEN_COUNT,
                tokens.len()
            )));
        }

        let input = Array2::from_shape_vec((1, TOKEN_COUNT), tokens.to_vec())
            .map_err(|e| PredictError::ScorerFailure(e.to_string()))?;
        let input_tensor = Value::from_array(input)?;

        let mut session = self.session.lock();
        let outputs = session.run(ort::inputs![self.input_name.as_str() => input_tensor])?;

        let output = outputs.get(self.output_name.as_str()).ok_or_else(|| {
            PredictError::ScorerFailure(format!("model output {:?} not found", self.output_name))
        })?;

        let tensor_data = output.try_extract_tensor::<f32>()?;
        Ok(tensor_data.1.to_vec())
    }
}

/// Long-lived prediction handle.
///
/// Constructed once at startup around a loaded model, then cloned and shared
/// immutably across request handlers; each prediction is stateless and
/// independent.
pub struct RegimePredictor<S: Scorer = OnnxScorer> {
    scorer: Arc<S>,
    timeout: Option<Duration>,
}

impl<S: Scorer> Clone for RegimePredictor<S> {
    fn clone(&self) -> Self {
        Self {
            scorer: Arc::clone(&self.scorer),
            timeout: self.timeout,
        }
    }
}

impl RegimePredictor<OnnxScorer> {
    /// Load an ONNX model and build a predictor around it.
    pub fn from_file(model_path: &Path, config: &Config) -> anyhow::Result<Self> {
        let scorer = OnnxScorer::from_file(model_path, config)?;
        Ok(Self::new(scorer, config))
    }
}

impl<S: Scorer + Send + Sync + 'static> RegimePredictor<S> {
    /// Build a predictor around an existing scorer.
    pub fn new(scorer: S, config: &Config) -> Self {
        Self {
            scorer: Arc::new(scorer),
            timeout: config.inference_timeout_ms.map(Duration::from_millis),
        }
    }

    /// Classify the next short-term price movement.
    ///
    /// Tokenizes the price series, scores it once, and interprets the raw
    /// output into a labeled prediction with a confidence in (0, 1].
    ///
    /// # Errors
    /// - [`PredictError::InvalidInput`] for an unusable price series
    /// - [`PredictError::ScorerFailure`] if inference fails or produces
    ///   malformed output
    /// - [`PredictError::Timeout`] if a configured deadline elapses
    pub fn predict(&self, prices: &[f64]) -> Result<Prediction> {
        let tokens = tokenize(prices)?;

        let prediction = match self.timeout {
            None => interpret(&tokens, self.scorer.as_ref())?,
            Some(limit) => self.interpret_with_deadline(tokens, limit)?,
        };

        debug!(
            label = %prediction.label,
            confidence = prediction.confidence,
            token = prediction.token,
            "prediction complete"
        );
        Ok(prediction)
    }

    /// Run scoring and interpretation on a helper thread with a deadline.
    ///
    /// The helper thread is not cancelled on timeout; it finishes its
    /// inference call in the background and its result is dropped.
    fn interpret_with_deadline(&self, tokens: Vec<i64>, limit: Duration) -> Result<Prediction> {
        let (tx, rx) = mpsc::channel();
        let scorer = Arc::clone(&self.scorer);

        thread::spawn(move || {
            let _ = tx.send(interpret(&tokens, scorer.as_ref()));
        });

        match rx.recv_timeout(limit) {
            Ok(result) => result,
            Err(_) => {
                warn!(timeout_ms = limit.as_millis() as u64, "inference timed out");
                Err(PredictError::Timeout(limit))
            }
        }
    }

    /// Number of output classes this predictor reports.
    pub fn num_classes(&self) -> usize {
        REGIME_LABELS.len()
    }
}
