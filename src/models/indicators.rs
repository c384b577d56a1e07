//! Moving averages over closing prices
//!
//! Both functions return one value per input element so the output can be
//! appended to a frame as a column. Positions without a full window are
//! `None` and get dropped by the processor afterwards.

/// Calculate Simple Moving Average for a given period
///
/// # Arguments
/// * `closes` - Slice of closing prices, oldest first
/// * `period` - Window length (e.g., 10, 15, 20)
///
/// # Returns
/// * Vector of MA values; the first `period - 1` entries are `None`
pub fn calculate_sma(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut ma_values = vec![None; closes.len()];

    if period == 0 || closes.len() < period {
        return ma_values;
    }

    let mut sum: f64 = closes[..period].iter().sum();
    ma_values[period - 1] = Some(sum / period as f64);

    for i in period..closes.len() {
        sum += closes[i] - closes[i - period];
        ma_values[i] = Some(sum / period as f64);
    }

    ma_values
}

/// Calculate Exponential Moving Average with the given span
///
/// Uses `alpha = 2 / (span + 1)` and seeds with the first close, the
/// non-adjusted recursive form: `ema[t] = alpha * x[t] + (1 - alpha) * ema[t-1]`.
/// Every position is populated.
pub fn calculate_ema(closes: &[f64], span: usize) -> Vec<Option<f64>> {
    if closes.is_empty() {
        return Vec::new();
    }

    let alpha = 2.0 / (span as f64 + 1.0);
    let mut ema_values = Vec::with_capacity(closes.len());
    let mut prev = closes[0];
    ema_values.push(Some(prev));

    for &close in &closes[1..] {
        prev = alpha * close + (1.0 - alpha) * prev;
        ema_values.push(Some(prev));
    }

    ema_values
}
