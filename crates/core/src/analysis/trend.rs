use crate::analysis::error::SignalError;
use crate::analysis::series::{Bar, PriceSeries};
use crate::domain::signal::{Action, SignalResult, TrendLabel};

/// Volume ratio above which a move counts as high-volume.
pub const VOLUME_SURGE_RATIO: f64 = 1.2;
/// Looser volume bar used by the golden-buy-point composite.
pub const GOLDEN_VOLUME_RATIO: f64 = 1.1;

/// Classifies the latest bar of `series` against the one before it.
pub fn analyze(series: &PriceSeries) -> Result<SignalResult, SignalError> {
    let (prev, today) = series
        .latest_pair()
        .ok_or_else(|| SignalError::InsufficientHistory {
            symbol: series.security().code.code.clone(),
            bars: series.len(),
        })?;
    Ok(classify(prev, today))
}

pub fn classify(prev: &Bar, today: &Bar) -> SignalResult {
    let price = today.close;
    let volume_ratio = volume_ratio(today);
    let above = |ma: Option<f64>| ma.map_or(false, |m| price > m);

    let bull = above(today.ma5);
    let surge = volume_ratio > VOLUME_SURGE_RATIO;
    let (mut label, mut score, mut action) = match (bull, surge) {
        (true, true) => (TrendLabel::AggressiveBreakout, 90, Action::Buy),
        (true, false) => (TrendLabel::MildUptrend, 70, Action::Hold),
        (false, true) => (TrendLabel::HighVolumeDecline, 85, Action::Sell),
        (false, false) => (TrendLabel::LowVolumePullback, 40, Action::Hold),
    };

    let golden = above(today.ma20)
        && above(today.ma5)
        && volume_ratio > GOLDEN_VOLUME_RATIO
        && price > prev.close;
    if golden {
        label = TrendLabel::GoldenBuyPoint;
        score = 100;
        action = Action::Buy;
    }

    SignalResult {
        price,
        pct_change: pct_change(prev.close, price),
        label,
        score,
        action,
        volume_ratio,
    }
}

/// Today's volume over its 5-bar average; 1.0 when the average is missing or zero.
pub fn volume_ratio(today: &Bar) -> f64 {
    match today.vol_ma5 {
        Some(avg) if avg > 0.0 => today.volume / avg,
        _ => 1.0,
    }
}

/// Percent move from `prev_close`; 0.0 when there is no base to divide by.
pub fn pct_change(prev_close: f64, price: f64) -> f64 {
    if prev_close == 0.0 {
        0.0
    } else {
        (price - prev_close) / prev_close * 100.0
    }
}
