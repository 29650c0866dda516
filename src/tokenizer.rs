//! Price-to-token quantization.
//!
//! Converts an ordered series of prices into a fixed-length sequence of
//! discrete movement tokens. The quantization thresholds must match the
//! model's training-time preprocessing exactly to avoid train/serve skew,
//! including the evaluation order of the threshold rules.

use crate::{PredictError, Result};

/// Number of prices in a fully constructed window.
pub const WINDOW_LEN: usize = 65;

/// Number of tokens produced per window (one per consecutive price pair).
pub const TOKEN_COUNT: usize = WINDOW_LEN - 1;

/// Size of the movement token vocabulary.
pub const VOCAB_SIZE: usize = 5;

/// Discrete price movement classes.
///
/// Discriminant values are the model's token ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Movement {
    /// Relative change below -2%
    BigDump = 0,
    /// Relative change in [-2%, -0.5%)
    Dump = 1,
    /// Relative change within ±0.5%
    Flat = 2,
    /// Relative change in (0.5%, 2%]
    Pump = 3,
    /// Relative change above +2%
    BigPump = 4,
}

impl Movement {
    /// Get the token id fed to the model.
    pub fn token(self) -> i64 {
        self as i64
    }

    /// Get all movements in token-id order.
    pub fn all() -> Vec<Movement> {
        vec![
            Movement::BigDump,
            Movement::Dump,
            Movement::Flat,
            Movement::Pump,
            Movement::BigPump,
        ]
    }
}

/// Ordered quantization rules, evaluated top to bottom, first match wins.
///
/// The order reproduces the training-time preprocessing: the Big-Pump check
/// runs before the Pump check, and the big-move thresholds are strict, so
/// pct = -0.02 lands in `Dump` and pct = 0.02 lands in `Pump`. The final
/// catch-all makes the table exhaustive for every finite pct.
static QUANT_RULES: [(fn(f64) -> bool, Movement); 5] = [
    (|pct| pct < -0.02, Movement::BigDump),
    (|pct| pct < -0.005, Movement::Dump),
    (|pct| pct > 0.02, Movement::BigPump),
    (|pct| pct > 0.005, Movement::Pump),
    (|_| true, Movement::Flat),
];

/// Map a relative price change to its movement class.
pub fn quantize(pct: f64) -> Movement {
    for (applies, movement) in QUANT_RULES.iter() {
        if applies(pct) {
            return *movement;
        }
    }
    // The last rule always matches.
    unreachable!("quantization rules are exhaustive")
}

/// Build a fixed-length window from a price series.
///
/// Short histories are left-padded by repeating the first price, so a short
/// series degrades into a flat start instead of failing; longer histories
/// keep only the most recent [`WINDOW_LEN`] values.
///
/// Every value in the resulting window must be finite and non-zero, since
/// each one (except the last) becomes a divisor during quantization.
///
/// # Errors
/// [`PredictError::InvalidInput`] if `prices` is empty or the window would
/// contain a zero or non-finite value.
pub fn build_window(prices: &[f64]) -> Result<Vec<f64>> {
    let first = match prices.first() {
        Some(&p) => p,
        None => {
            return Err(PredictError::InvalidInput(
                "price series is empty".to_string(),
            ))
        }
    };

    let mut window = Vec::with_capacity(WINDOW_LEN);
    if prices.len() < WINDOW_LEN {
        window.resize(WINDOW_LEN - prices.len(), first);
        window.extend_from_slice(prices);
    } else {
        window.extend_from_slice(&prices[prices.len() - WINDOW_LEN..]);
    }

    for (i, &price) in window.iter().enumerate() {
        if !price.is_finite() {
            return Err(PredictError::InvalidInput(format!(
                "non-finite price {} at window position {}",
                price, i
            )));
        }
        if price == 0.0 {
            return Err(PredictError::InvalidInput(format!(
                "zero price at window position {}",
                i
            )));
        }
    }

    Ok(window)
}

/// Tokenize a price series into the model's input sequence.
///
/// Builds the window, then quantizes each of the [`TOKEN_COUNT`] consecutive
/// price pairs into a movement token. Pure function of its input.
///
/// # Example
/// ```
/// use regime_inference::tokenize;
///
/// let prices = vec![100.0; 65];
/// let tokens = tokenize(&prices).unwrap();
/// assert_eq!(tokens.len(), 64);
/// assert!(tokens.iter().all(|&t| t == 2)); // all flat
/// ```
///
/// # Errors
/// [`PredictError::InvalidInput`] under the same conditions as
/// [`build_window`].
pub fn tokenize(prices: &[f64]) -> Result<Vec<i64>> {
    let window = build_window(prices)?;

    let tokens = window
        .windows(2)
        .map(|pair| {
            let (prev, curr) = (pair[0], pair[1]);
            let pct = (curr - prev) / prev;
            quantize(pct).token()
        })
        .collect::<Vec<i64>>();

    debug_assert_eq!(tokens.len(), TOKEN_COUNT);
    Ok(tokens)
}
