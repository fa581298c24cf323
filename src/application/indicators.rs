//! Price indicators over closes in chronological order (oldest first).

/// Simple moving average of the last `period` closes, `None` without enough history.
pub fn sma(closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || closes.len() < period {
        return None;
    }
    let window = &closes[closes.len() - period..];
    Some(window.iter().sum::<f64>() / period as f64)
}

/// Wilder-smoothed RSI. Needs `period + 1` closes.
pub fn rsi(closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || closes.len() < period + 1 {
        return None;
    }

    let mut gains = Vec::with_capacity(closes.len() - 1);
    let mut losses = Vec::with_capacity(closes.len() - 1);
    for pair in closes.windows(2) {
        let change = pair[1] - pair[0];
        gains.push(change.max(0.0));
        losses.push((-change).max(0.0));
    }

    let mut avg_gain = gains.iter().take(period).sum::<f64>() / period as f64;
    let mut avg_loss = losses.iter().take(period).sum::<f64>() / period as f64;
    for i in period..gains.len() {
        avg_gain = (avg_gain * (period - 1) as f64 + gains[i]) / period as f64;
        avg_loss = (avg_loss * (period - 1) as f64 + losses[i]) / period as f64;
    }

    if avg_loss == 0.0 {
        return Some(if avg_gain == 0.0 { 50.0 } else { 100.0 });
    }
    let rs = avg_gain / avg_loss;
    Some(100.0 - (100.0 / (1.0 + rs)))
}

/// Percent change from `prev` to `now`; zero when `prev` is zero.
pub fn pct_change(now: f64, prev: f64) -> f64 {
    if prev == 0.0 {
        0.0
    } else {
        (now - prev) / prev * 100.0
    }
}

pub fn momentum_label(change_pct: f64) -> &'static str {
    match change_pct {
        c if c > 2.0 => "strong upward",
        c if c > 0.0 => "upward",
        c if c < -2.0 => "strong downward",
        c if c < 0.0 => "downward",
        _ => "flat",
    }
}
