//! Short-term price movement regime inference.
//!
//! This crate turns a recent series of asset prices into one of five
//! movement regimes (big dump, dump, flat, pump, big pump) with a softmax
//! confidence score, using an ONNX sequence-classification model.
//!
//! The pipeline per request: quantize prices into a fixed-length token
//! sequence, run one inference pass, interpret the logits into a labeled
//! prediction. The scorer is an injectable trait so the numeric
//! interpretation is testable without a model runtime.
//!
//! ```no_run
//! use regime_inference::{Config, RegimePredictor};
//! use std::path::Path;
//!
//! let predictor =
//!     RegimePredictor::from_file(Path::new("model.onnx"), &Config::default()).unwrap();
//!
//! let prices = vec![100.0, 100.4, 99.8, 101.2];
//! let prediction = predictor.predict(&prices).unwrap();
//! println!("{} ({:.1}%)", prediction.label, prediction.confidence * 100.0);
//! ```

pub mod error;
pub mod interpreter;
pub mod predictor;
pub mod tokenizer;

pub use error::PredictError;
pub use interpreter::{interpret, Prediction, Scorer, REGIME_LABELS};
pub use predictor::{Config, OnnxScorer, RegimePredictor};
pub use tokenizer::{
    build_window, quantize, tokenize, Movement, TOKEN_COUNT, VOCAB_SIZE, WINDOW_LEN,
};

/// Library-wide result type.
pub type Result<T> = std::result::Result<T, PredictError>;
