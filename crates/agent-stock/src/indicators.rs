//! Indicator math over daily bars
//!
//! Series are `Vec<Option<f64>>` aligned with the input bars; `None` marks a
//! position where the indicator is not defined yet (incomplete window) or is
//! undefined (zero range). Rolling windows require a full window, exponential
//! means use the bias-adjusted weighting and start at the first defined input.

use ta::Next;
use ta::indicators::SimpleMovingAverage;

/// An indicator series aligned with the input
pub type Series = Vec<Option<f64>>;

/// Rolling mean over a full window
pub fn rolling_mean(values: &[f64], window: usize) -> Series {
    let Ok(mut sma) = SimpleMovingAverage::new(window) else {
        return vec![None; values.len()];
    };
    values
        .iter()
        .enumerate()
        .map(|(i, &v)| {
            let mean = sma.next(v);
            (i + 1 >= window).then_some(mean)
        })
        .collect()
}

/// Rolling sample standard deviation (n - 1 denominator)
pub fn rolling_std(values: &[f64], window: usize) -> Series {
    rolling(values, window, |w| {
        if w.len() < 2 {
            return None;
        }
        let mean = w.iter().sum::<f64>() / w.len() as f64;
        let var = w.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (w.len() - 1) as f64;
        Some(var.sqrt())
    })
}

/// Rolling maximum
pub fn rolling_max(values: &[f64], window: usize) -> Series {
    rolling(values, window, |w| w.iter().copied().reduce(f64::max))
}

/// Rolling minimum
pub fn rolling_min(values: &[f64], window: usize) -> Series {
    rolling(values, window, |w| w.iter().copied().reduce(f64::min))
}

fn rolling(values: &[f64], window: usize, f: impl Fn(&[f64]) -> Option<f64>) -> Series {
    if window == 0 {
        return vec![None; values.len()];
    }
    (0..values.len())
        .map(|i| {
            if i + 1 < window {
                None
            } else {
                f(&values[i + 1 - window..=i])
            }
        })
        .collect()
}

/// Bias-adjusted exponential mean with smoothing factor `alpha`.
///
/// Leading `None`s stay `None`. A `None` after the start repeats the previous
/// mean while older weights keep decaying.
pub fn ewm_mean(values: &[Option<f64>], alpha: f64) -> Series {
    let decay = 1.0 - alpha;
    let mut numerator = 0.0;
    let mut denominator = 0.0;
    let mut started = false;

    values
        .iter()
        .map(|value| match value {
            Some(v) => {
                numerator = v + decay * numerator;
                denominator = 1.0 + decay * denominator;
                started = true;
                Some(numerator / denominator)
            }
            None if started => {
                numerator *= decay;
                denominator *= decay;
                Some(numerator / denominator)
            }
            None => None,
        })
        .collect()
}

/// Exponential mean with `alpha = 2 / (span + 1)`
pub fn ewm_span(values: &[Option<f64>], span: usize) -> Series {
    ewm_mean(values, 2.0 / (span as f64 + 1.0))
}

/// Exponential mean with `alpha = 1 / (1 + com)`
pub fn ewm_com(values: &[Option<f64>], com: f64) -> Series {
    ewm_mean(values, 1.0 / (1.0 + com))
}

fn defined(values: &[f64]) -> Vec<Option<f64>> {
    values.iter().copied().map(Some).collect()
}

fn zip_with(a: &[Option<f64>], b: &[Option<f64>], f: impl Fn(f64, f64) -> f64) -> Series {
    a.iter()
        .zip(b)
        .map(|(x, y)| Some(f((*x)?, (*y)?)))
        .collect()
}

/// RSI with simple rolling means of gains and losses.
///
/// The first bar has no change and counts as zero gain and zero loss. A
/// window without losses reads 100; a window without any movement is `None`.
pub fn rsi(closes: &[f64], window: usize) -> Series {
    let mut gains = Vec::with_capacity(closes.len());
    let mut losses = Vec::with_capacity(closes.len());
    for i in 0..closes.len() {
        let delta = if i == 0 { 0.0 } else { closes[i] - closes[i - 1] };
        gains.push(delta.max(0.0));
        losses.push((-delta).max(0.0));
    }

    let avg_gain = rolling_mean(&gains, window);
    let avg_loss = rolling_mean(&losses, window);
    avg_gain
        .into_iter()
        .zip(avg_loss)
        .map(|(gain, loss)| {
            let (gain, loss) = (gain?, loss?);
            if loss == 0.0 {
                (gain > 0.0).then_some(100.0)
            } else {
                Some(100.0 - 100.0 / (1.0 + gain / loss))
            }
        })
        .collect()
}

/// MACD line, signal line and histogram
#[derive(Debug, Clone)]
pub struct Macd {
    pub macd: Series,
    pub signal: Series,
    pub histogram: Series,
}

/// MACD(fast, slow, signal) over closing prices
pub fn macd(closes: &[f64], fast: usize, slow: usize, signal: usize) -> Macd {
    let closes = defined(closes);
    let line = zip_with(&ewm_span(&closes, fast), &ewm_span(&closes, slow), |f, s| f - s);
    let signal_line = ewm_span(&line, signal);
    let histogram = zip_with(&line, &signal_line, |m, s| m - s);
    Macd {
        macd: line,
        signal: signal_line,
        histogram,
    }
}

/// Bollinger bands
#[derive(Debug, Clone)]
pub struct Bollinger {
    pub upper: Series,
    pub middle: Series,
    pub lower: Series,
}

/// Bollinger bands: rolling mean ± `num_std` sample deviations
pub fn bollinger(closes: &[f64], window: usize, num_std: f64) -> Bollinger {
    let middle = rolling_mean(closes, window);
    let std = rolling_std(closes, window);
    Bollinger {
        upper: zip_with(&middle, &std, |m, s| m + s * num_std),
        lower: zip_with(&middle, &std, |m, s| m - s * num_std),
        middle,
    }
}

/// KDJ stochastic lines
#[derive(Debug, Clone)]
pub struct Kdj {
    pub k: Series,
    pub d: Series,
    pub j: Series,
}

/// KDJ over `period` bars, K and D smoothed with `com = 2`
pub fn kdj(highs: &[f64], lows: &[f64], closes: &[f64], period: usize) -> Kdj {
    let highest = rolling_max(highs, period);
    let lowest = rolling_min(lows, period);
    let rsv: Series = closes
        .iter()
        .zip(highest.iter().zip(&lowest))
        .map(|(close, (high, low))| {
            let (high, low) = ((*high)?, (*low)?);
            let range = high - low;
            (range != 0.0).then(|| (close - low) / range * 100.0)
        })
        .collect();

    let k = ewm_com(&rsv, 2.0);
    let d = ewm_com(&k, 2.0);
    let j = zip_with(&k, &d, |k, d| 3.0 * k - 2.0 * d);
    Kdj { k, d, j }
}

/// Percentage changes between consecutive values
pub fn pct_change(values: &[f64]) -> Series {
    (0..values.len())
        .map(|i| {
            if i == 0 || values[i - 1] == 0.0 {
                None
            } else {
                Some(values[i] / values[i - 1] - 1.0)
            }
        })
        .collect()
}

/// Sample standard deviation of the defined values
pub fn sample_std(values: &[Option<f64>]) -> Option<f64> {
    let defined: Vec<f64> = values.iter().flatten().copied().collect();
    rolling_std(&defined, defined.len()).last().copied().flatten()
}

/// Arithmetic mean, `None` when empty
pub fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

/// Last value of a series, if defined
pub fn last(series: &[Option<f64>]) -> Option<f64> {
    series.last().copied().flatten()
}
