// Indicator helpers for the built-in classifiers
// Outputs are aligned to the end of the input: the last element always
// corresponds to the last input bar. Insufficient input yields an empty Vec.

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacdPoint {
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StochPoint {
    pub k: f64,
    pub d: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandPoint {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

/// Simple moving average
pub fn sma(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }
    values
        .windows(period)
        .map(|w| w.iter().sum::<f64>() / period as f64)
        .collect()
}

/// Exponential moving average seeded with the SMA of the first `period` values
pub fn ema(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }
    let k = 2.0 / (period as f64 + 1.0);
    let seed = values[..period].iter().sum::<f64>() / period as f64;

    let mut out = Vec::with_capacity(values.len() - period + 1);
    out.push(seed);
    for value in &values[period..] {
        let prev = out[out.len() - 1];
        out.push((value - prev) * k + prev);
    }
    out
}

/// Relative strength index with Wilder smoothing
pub fn rsi(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() <= period {
        return Vec::new();
    }
    let changes: Vec<f64> = values.windows(2).map(|w| w[1] - w[0]).collect();

    let mut avg_gain = changes[..period].iter().filter(|c| **c > 0.0).sum::<f64>() / period as f64;
    let mut avg_loss = -changes[..period].iter().filter(|c| **c < 0.0).sum::<f64>() / period as f64;

    let mut out = Vec::with_capacity(changes.len() - period + 1);
    out.push(rsi_value(avg_gain, avg_loss));
    for change in &changes[period..] {
        avg_gain = (avg_gain * (period as f64 - 1.0) + change.max(0.0)) / period as f64;
        avg_loss = (avg_loss * (period as f64 - 1.0) + (-change).max(0.0)) / period as f64;
        out.push(rsi_value(avg_gain, avg_loss));
    }
    out
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return if avg_gain == 0.0 { 50.0 } else { 100.0 };
    }
    100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
}

/// MACD line, signal line and histogram
pub fn macd(values: &[f64], fast: usize, slow: usize, signal: usize) -> Vec<MacdPoint> {
    if fast >= slow {
        return Vec::new();
    }
    let fast_ema = ema(values, fast);
    let slow_ema = ema(values, slow);
    if slow_ema.is_empty() {
        return Vec::new();
    }

    let offset = fast_ema.len() - slow_ema.len();
    let line: Vec<f64> = slow_ema
        .iter()
        .zip(&fast_ema[offset..])
        .map(|(slow, fast)| fast - slow)
        .collect();
    let signal_line = ema(&line, signal);
    if signal_line.is_empty() {
        return Vec::new();
    }

    let offset = line.len() - signal_line.len();
    line[offset..]
        .iter()
        .zip(&signal_line)
        .map(|(macd, signal)| MacdPoint {
            macd: *macd,
            signal: *signal,
            histogram: macd - signal,
        })
        .collect()
}

/// Stochastic oscillator: %K over `period` bars, %D as SMA of %K over `signal_period`
pub fn stochastic(high: &[f64], low: &[f64], close: &[f64], period: usize, signal_period: usize) -> Vec<StochPoint> {
    let len = close.len().min(high.len()).min(low.len());
    if period == 0 || len < period {
        return Vec::new();
    }

    let k: Vec<f64> = (period - 1..len)
        .map(|i| {
            let window = i + 1 - period..=i;
            let highest = high[window.clone()].iter().cloned().fold(f64::MIN, f64::max);
            let lowest = low[window].iter().cloned().fold(f64::MAX, f64::min);
            if highest > lowest {
                100.0 * (close[i] - lowest) / (highest - lowest)
            } else {
                50.0
            }
        })
        .collect();
    let d = sma(&k, signal_period);
    if d.is_empty() {
        return Vec::new();
    }

    let offset = k.len() - d.len();
    k[offset..]
        .iter()
        .zip(&d)
        .map(|(k, d)| StochPoint { k: *k, d: *d })
        .collect()
}

/// Bollinger bands around an SMA using population standard deviation
pub fn bollinger(values: &[f64], period: usize, std_dev: f64) -> Vec<BandPoint> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }
    values
        .windows(period)
        .map(|w| {
            let mean = w.iter().sum::<f64>() / period as f64;
            let variance = w.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / period as f64;
            let width = variance.sqrt() * std_dev;
            BandPoint {
                upper: mean + width,
                middle: mean,
                lower: mean - width,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_sma() {
        assert_eq!(sma(&[1.0, 2.0, 3.0, 4.0], 2), vec![1.5, 2.5, 3.5]);
        assert!(sma(&[1.0], 2).is_empty());
    }

    #[test]
    fn test_ema_on_constant_series() {
        let values = vec![5.0; 20];
        let out = ema(&values, 10);
        assert_eq!(out.len(), 11);
        assert!(out.iter().all(|v| approx(*v, 5.0)));
    }

    #[test]
    fn test_rsi_extremes() {
        let rising: Vec<f64> = (0..30).map(|i| i as f64).collect();
        assert!(approx(*rsi(&rising, 14).last().unwrap(), 100.0));

        let falling: Vec<f64> = (0..30).rev().map(|i| i as f64).collect();
        assert!(approx(*rsi(&falling, 14).last().unwrap(), 0.0));
    }

    #[test]
    fn test_macd_lengths_and_sign() {
        let rising: Vec<f64> = (0..60).map(|i| 100.0 + i as f64).collect();
        let out = macd(&rising, 12, 26, 9);
        assert_eq!(out.len(), 60 - 26 + 1 - 9 + 1);
        assert!(out.last().unwrap().macd > 0.0);
    }

    #[test]
    fn test_stochastic_at_top_of_range() {
        let close: Vec<f64> = (0..20).map(|i| i as f64).collect();
        let high: Vec<f64> = close.iter().map(|c| c + 0.5).collect();
        let low: Vec<f64> = close.iter().map(|c| c - 0.5).collect();
        let out = stochastic(&high, &low, &close, 14, 3);
        assert_eq!(out.len(), 20 - 14 + 1 - 3 + 1);
        assert!(out.last().unwrap().k > 90.0);
    }

    #[test]
    fn test_bollinger_flat_series_collapses() {
        let band = *bollinger(&[2.0; 10], 10, 2.0).last().unwrap();
        assert!(approx(band.upper, 2.0) && approx(band.lower, 2.0));
    }
}
