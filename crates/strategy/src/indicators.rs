//! Indicator math over price series.
//!
//! Every function returns a vector aligned with its input: positions
//! where the indicator is not yet defined hold NaN. Smoothed indicators
//! (RSI, ATR, ADX) use Wilder's method seeded with a simple average of
//! the first period.

/// Simple moving average. Windows containing NaN produce NaN.
pub fn sma(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }
    for i in (period - 1)..values.len() {
        let window = &values[i + 1 - period..=i];
        if window.iter().any(|v| v.is_nan()) {
            continue;
        }
        out[i] = window.iter().sum::<f64>() / period as f64;
    }
    out
}

/// Exponential moving average, seeded with the SMA of the first period.
pub fn ema(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }
    let alpha = 2.0 / (period as f64 + 1.0);
    let seed = values[..period].iter().sum::<f64>() / period as f64;
    out[period - 1] = seed;
    let mut prev = seed;
    for i in period..values.len() {
        prev = alpha * values[i] + (1.0 - alpha) * prev;
        out[i] = prev;
    }
    out
}

/// MACD line, signal line, and histogram. The signal EMA is seeded where
/// the line first becomes defined.
pub fn macd(
    values: &[f64],
    fast: usize,
    slow: usize,
    signal: usize,
) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let ema_fast = ema(values, fast);
    let ema_slow = ema(values, slow);
    let line: Vec<f64> = ema_fast
        .iter()
        .zip(&ema_slow)
        .map(|(f, s)| f - s)
        .collect();

    let mut sig = vec![f64::NAN; line.len()];
    if let Some(start) = line.iter().position(|v| !v.is_nan()) {
        for (i, v) in ema(&line[start..], signal).into_iter().enumerate() {
            sig[start + i] = v;
        }
    }
    let hist: Vec<f64> = line.iter().zip(&sig).map(|(l, s)| l - s).collect();
    (line, sig, hist)
}

/// Relative strength index (Wilder). First defined at index `period`.
pub fn rsi(closes: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; closes.len()];
    if period == 0 || closes.len() <= period {
        return out;
    }
    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;
    for i in 1..=period {
        let change = closes[i] - closes[i - 1];
        if change > 0.0 {
            avg_gain += change;
        } else {
            avg_loss -= change;
        }
    }
    avg_gain /= period as f64;
    avg_loss /= period as f64;
    out[period] = rsi_value(avg_gain, avg_loss);

    for i in (period + 1)..closes.len() {
        let change = closes[i] - closes[i - 1];
        let gain = change.max(0.0);
        let loss = (-change).max(0.0);
        avg_gain = (avg_gain * (period as f64 - 1.0) + gain) / period as f64;
        avg_loss = (avg_loss * (period as f64 - 1.0) + loss) / period as f64;
        out[i] = rsi_value(avg_gain, avg_loss);
    }
    out
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        100.0
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}

/// True range per bar. The first bar has no prior close so its range
/// is simply high - low.
pub fn true_range(high: &[f64], low: &[f64], close: &[f64]) -> Vec<f64> {
    let mut out = vec![f64::NAN; high.len()];
    if high.is_empty() {
        return out;
    }
    out[0] = high[0] - low[0];
    for i in 1..high.len() {
        let hl = high[i] - low[i];
        let hc = (high[i] - close[i - 1]).abs();
        let lc = (low[i] - close[i - 1]).abs();
        out[i] = hl.max(hc).max(lc);
    }
    out
}

/// Wilder smoothing: SMA seed, then `(prev * (n - 1) + value) / n`.
pub fn wilder_smooth(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }
    let seed = values[..period].iter().sum::<f64>() / period as f64;
    out[period - 1] = seed;
    let mut prev = seed;
    for i in period..values.len() {
        prev = (prev * (period as f64 - 1.0) + values[i]) / period as f64;
        out[i] = prev;
    }
    out
}

/// Average true range.
pub fn atr(high: &[f64], low: &[f64], close: &[f64], period: usize) -> Vec<f64> {
    let tr = true_range(high, low, close);
    wilder_smooth(&tr, period)
}

/// Average directional index. First defined at index `2 * period - 1`.
pub fn adx(high: &[f64], low: &[f64], close: &[f64], period: usize) -> Vec<f64> {
    let len = high.len();
    let mut out = vec![f64::NAN; len];
    if period == 0 || len < 2 * period {
        return out;
    }

    let tr = true_range(high, low, close);
    let mut plus_dm = vec![0.0; len];
    let mut minus_dm = vec![0.0; len];
    for i in 1..len {
        let up = high[i] - high[i - 1];
        let down = low[i - 1] - low[i];
        if up > down && up > 0.0 {
            plus_dm[i] = up;
        }
        if down > up && down > 0.0 {
            minus_dm[i] = down;
        }
    }

    let mut sm_tr: f64 = tr[1..=period].iter().sum();
    let mut sm_plus: f64 = plus_dm[1..=period].iter().sum();
    let mut sm_minus: f64 = minus_dm[1..=period].iter().sum();
    let mut dx = vec![f64::NAN; len];
    dx[period] = dx_value(sm_plus, sm_minus, sm_tr);
    for i in (period + 1)..len {
        sm_tr = sm_tr - sm_tr / period as f64 + tr[i];
        sm_plus = sm_plus - sm_plus / period as f64 + plus_dm[i];
        sm_minus = sm_minus - sm_minus / period as f64 + minus_dm[i];
        dx[i] = dx_value(sm_plus, sm_minus, sm_tr);
    }

    // ADX is the Wilder average of DX.
    let first = 2 * period - 1;
    let seed = dx[period..=first].iter().sum::<f64>() / period as f64;
    out[first] = seed;
    let mut prev = seed;
    for i in (first + 1)..len {
        prev = (prev * (period as f64 - 1.0) + dx[i]) / period as f64;
        out[i] = prev;
    }
    out
}

fn dx_value(plus: f64, minus: f64, tr: f64) -> f64 {
    if tr == 0.0 {
        return 0.0;
    }
    let pdi = 100.0 * plus / tr;
    let mdi = 100.0 * minus / tr;
    let sum = pdi + mdi;
    if sum == 0.0 {
        0.0
    } else {
        100.0 * (pdi - mdi).abs() / sum
    }
}

/// Stochastic RSI. Returns the smoothed %K and %D lines scaled 0..100.
/// A flat RSI window (zero range) maps to the neutral 50.
pub fn stoch_rsi(
    closes: &[f64],
    rsi_period: usize,
    stoch_period: usize,
    k_smooth: usize,
    d_smooth: usize,
) -> (Vec<f64>, Vec<f64>) {
    let rsi_series = rsi(closes, rsi_period);
    let len = closes.len();
    let mut raw = vec![f64::NAN; len];
    if stoch_period == 0 {
        return (raw.clone(), raw);
    }
    for i in (stoch_period - 1)..len {
        let window = &rsi_series[i + 1 - stoch_period..=i];
        if window.iter().any(|v| v.is_nan()) {
            continue;
        }
        let min = window.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = window.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let range = max - min;
        raw[i] = if range == 0.0 {
            50.0
        } else {
            (rsi_series[i] - min) / range * 100.0
        };
    }
    let k = sma(&raw, k_smooth);
    let d = sma(&k, d_smooth);
    (k, d)
}
