use crate::domain::instrument::SecurityRef;
use crate::ingest::provider::MarketDataProvider;
use crate::ingest::types::{Adjustment, DailyBar, IntradayQuote};
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// In-memory provider keyed by canonical code.
#[derive(Default)]
pub struct FakeProvider {
    bars: HashMap<String, Option<Vec<DailyBar>>>,
    quotes: HashMap<String, Option<IntradayQuote>>,
    quote_calls: AtomicUsize,
}

impl FakeProvider {
    pub fn with_bars(mut self, code: &str, bars: Vec<DailyBar>) -> Self {
        self.bars.insert(code.to_string(), Some(bars));
        self
    }

    pub fn with_failing_bars(mut self, code: &str) -> Self {
        self.bars.insert(code.to_string(), None);
        self
    }

    pub fn with_quote(mut self, code: &str, quote: IntradayQuote) -> Self {
        self.quotes.insert(code.to_string(), Some(quote));
        self
    }

    pub fn with_failing_quote(mut self, code: &str) -> Self {
        self.quotes.insert(code.to_string(), None);
        self
    }

    pub fn quote_calls(&self) -> usize {
        self.quote_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl MarketDataProvider for FakeProvider {
    fn provider_name(&self) -> &'static str {
        "fake"
    }

    async fn fetch_historical_bars(
        &self,
        security: &SecurityRef,
        _start_date: NaiveDate,
        _adjustment: Adjustment,
    ) -> anyhow::Result<Vec<DailyBar>> {
        match self.bars.get(&security.code.code) {
            Some(Some(bars)) => Ok(bars.clone()),
            Some(None) => anyhow::bail!("upstream error for {}", security.code.code),
            None => anyhow::bail!("unknown code {}", security.code.code),
        }
    }

    async fn fetch_intraday_quote(
        &self,
        security: &SecurityRef,
    ) -> anyhow::Result<Option<IntradayQuote>> {
        self.quote_calls.fetch_add(1, Ordering::SeqCst);
        match self.quotes.get(&security.code.code) {
            Some(Some(q)) => Ok(Some(*q)),
            Some(None) => anyhow::bail!("quote endpoint failed"),
            None => Ok(None),
        }
    }
}

/// Consecutive daily bars starting 2024-01-01 with a flat volume.
pub fn daily(closes: &[f64], volume: f64) -> Vec<DailyBar> {
    daily_with_volumes(closes, &vec![volume; closes.len()])
}

pub fn daily_with_volumes(closes: &[f64], volumes: &[f64]) -> Vec<DailyBar> {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    closes
        .iter()
        .zip(volumes)
        .enumerate()
        .map(|(i, (&close, &volume))| DailyBar {
            date: start + Duration::days(i as i64),
            open: close,
            close,
            volume,
        })
        .collect()
}

/// Wednesday 2026-01-07 at `hour:minute` Shanghai time.
pub fn open_market_now(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 7, hour, minute, 0).unwrap() - Duration::hours(8)
}

/// Saturday 2026-01-10, midday Shanghai time.
pub fn closed_market_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 10, 4, 0, 0).unwrap()
}
