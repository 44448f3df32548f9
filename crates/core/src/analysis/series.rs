use crate::analysis::error::SignalError;
use crate::domain::instrument::{InstrumentKind, SecurityRef};
use crate::ingest::provider::MarketDataProvider;
use crate::ingest::types::{Adjustment, DailyBar};
use crate::time::cn_market;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub const SHORT_WINDOW: usize = 5;
pub const LONG_WINDOW: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeriesOptions {
    pub start_date: NaiveDate,
    pub adjustment: Adjustment,
}

impl SeriesOptions {
    pub fn new(start_date: NaiveDate) -> Self {
        Self {
            start_date,
            adjustment: Adjustment::Forward,
        }
    }
}

impl Default for SeriesOptions {
    fn default() -> Self {
        Self::new(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or(NaiveDate::MIN))
    }
}

/// One daily bar plus its trailing averages. Averages stay `None` until the
/// window has filled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub date: NaiveDate,
    pub open: f64,
    pub close: f64,
    pub volume: f64,
    pub ma5: Option<f64>,
    pub ma20: Option<f64>,
    pub vol_ma5: Option<f64>,
    /// Built from an intraday quote during the session; never persisted.
    pub synthetic: bool,
}

impl Bar {
    fn from_daily(d: DailyBar, synthetic: bool) -> Self {
        Self {
            date: d.date,
            open: d.open,
            close: d.close,
            volume: d.volume,
            ma5: None,
            ma20: None,
            vol_ma5: None,
            synthetic,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    security: SecurityRef,
    bars: Vec<Bar>,
}

impl PriceSeries {
    /// Sorts ascending, keeps the last row for a repeated date, and derives
    /// the moving averages.
    pub fn from_daily_bars(
        symbol: &str,
        security: SecurityRef,
        mut daily: Vec<DailyBar>,
    ) -> Result<Self, SignalError> {
        if daily.is_empty() {
            return Err(SignalError::data_unavailable(symbol, "empty history"));
        }
        if let Some(bad) = daily.iter().find(|b| !is_valid_bar(b)) {
            return Err(SignalError::data_unavailable(
                symbol,
                format!("invalid bar on {}", bad.date),
            ));
        }

        daily.sort_by_key(|b| b.date);
        let mut bars: Vec<Bar> = Vec::with_capacity(daily.len());
        for d in daily {
            match bars.last_mut() {
                Some(last) if last.date == d.date => *last = Bar::from_daily(d, false),
                _ => bars.push(Bar::from_daily(d, false)),
            }
        }

        let mut series = Self { security, bars };
        series.recompute_averages();
        Ok(series)
    }

    /// Appends a bar for the current session without touching existing rows.
    pub fn push_synthetic(&mut self, bar: DailyBar) {
        self.bars.push(Bar::from_daily(bar, true));
        self.recompute_averages();
    }

    pub fn security(&self) -> &SecurityRef {
        &self.security
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// `(previous, latest)`, or `None` with fewer than two bars.
    pub fn latest_pair(&self) -> Option<(&Bar, &Bar)> {
        match self.bars.as_slice() {
            [.., prev, today] => Some((prev, today)),
            _ => None,
        }
    }

    pub fn recent_closes(&self, n: usize) -> Vec<f64> {
        let skip = self.bars.len().saturating_sub(n);
        self.bars.iter().skip(skip).map(|b| b.close).collect()
    }

    fn recompute_averages(&mut self) {
        let closes: Vec<f64> = self.bars.iter().map(|b| b.close).collect();
        let volumes: Vec<f64> = self.bars.iter().map(|b| b.volume).collect();
        let ma5 = rolling_mean(&closes, SHORT_WINDOW);
        let ma20 = rolling_mean(&closes, LONG_WINDOW);
        let vol_ma5 = rolling_mean(&volumes, SHORT_WINDOW);
        for (i, bar) in self.bars.iter_mut().enumerate() {
            bar.ma5 = ma5[i];
            bar.ma20 = ma20[i];
            bar.vol_ma5 = vol_ma5[i];
        }
    }
}

/// Trailing simple moving average; entry `i` only looks at `values[i+1-window..=i]`.
pub fn rolling_mean(values: &[f64], window: usize) -> Vec<Option<f64>> {
    if window == 0 {
        return vec![None; values.len()];
    }
    (0..values.len())
        .map(|i| {
            (i + 1 >= window)
                .then(|| values[i + 1 - window..=i].iter().sum::<f64>() / window as f64)
        })
        .collect()
}

fn is_valid_bar(b: &DailyBar) -> bool {
    [b.open, b.close, b.volume]
        .iter()
        .all(|v| v.is_finite() && *v >= 0.0)
}

/// Fetches and normalizes the daily series for `symbol`.
///
/// During the trading session a bar for today is synthesized from the intraday
/// quote; if that fails the historical series is returned unchanged.
pub async fn load_series(
    provider: &dyn MarketDataProvider,
    symbol: &str,
    kind_hint: InstrumentKind,
    opts: &SeriesOptions,
    now: DateTime<Utc>,
) -> Result<PriceSeries, SignalError> {
    let security = SecurityRef::classify(symbol, kind_hint);
    if !security.code.is_numeric() {
        return Err(SignalError::data_unavailable(
            symbol,
            "symbol does not contain a numeric security code",
        ));
    }

    let daily = provider
        .fetch_historical_bars(&security, opts.start_date, opts.adjustment)
        .await
        .map_err(|e| SignalError::data_unavailable(symbol, format!("{e:#}")))?;

    let mut series = PriceSeries::from_daily_bars(symbol, security, daily)?;

    if cn_market::is_trading_session_open(now) {
        match synthesize_session_bar(provider, series.security(), symbol, now).await {
            Ok(bar) => {
                tracing::debug!(
                    symbol,
                    price = bar.close,
                    projected_volume = bar.volume,
                    "appended intraday bar"
                );
                series.push_synthetic(bar);
            }
            Err(err) => {
                tracing::debug!(symbol, error = %err, "using historical series only");
            }
        }
    }

    Ok(series)
}

async fn synthesize_session_bar(
    provider: &dyn MarketDataProvider,
    security: &SecurityRef,
    symbol: &str,
    now: DateTime<Utc>,
) -> Result<DailyBar, SignalError> {
    let quote = provider
        .fetch_intraday_quote(security)
        .await
        .map_err(|e| SignalError::intraday_unavailable(symbol, format!("{e:#}")))?
        .ok_or_else(|| SignalError::intraday_unavailable(symbol, "code not quoted"))?;

    let progress = cn_market::session_progress(now);
    let bar = DailyBar {
        date: cn_market::market_date(now),
        open: quote.last_price,
        close: quote.last_price,
        volume: cn_market::project_full_day_volume(quote.cumulative_volume, progress),
    };

    if !is_valid_bar(&bar) {
        return Err(SignalError::intraday_unavailable(symbol, "quote has invalid fields"));
    }
    Ok(bar)
}
