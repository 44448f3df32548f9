use crate::domain::instrument::SecurityRef;
use crate::ingest::provider::MarketDataProvider;
use crate::ingest::types::{Adjustment, DailyBar, IntradayQuote};
use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;

type BarsKey = (SecurityRef, NaiveDate, Adjustment);

#[derive(Debug, Clone)]
struct Cached<T> {
    value: T,
    fetched_at: DateTime<Utc>,
}

impl<T> Cached<T> {
    fn is_fresh(&self, ttl: chrono::Duration, now: DateTime<Utc>) -> bool {
        now - self.fetched_at < ttl
    }
}

/// Memoizes successful fetches of the wrapped provider for `ttl`.
///
/// Failures are never cached, so a transient error is retried on the next pass.
pub struct CachedProvider<P> {
    inner: P,
    ttl: chrono::Duration,
    bars: tokio::sync::Mutex<HashMap<BarsKey, Cached<Vec<DailyBar>>>>,
    quotes: tokio::sync::Mutex<HashMap<SecurityRef, Cached<Option<IntradayQuote>>>>,
}

impl<P: MarketDataProvider> CachedProvider<P> {
    pub fn new(inner: P, ttl: chrono::Duration) -> Self {
        Self {
            inner,
            ttl,
            bars: tokio::sync::Mutex::new(HashMap::new()),
            quotes: tokio::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Drops expired entries; called opportunistically between passes.
    pub async fn evict_expired(&self) {
        let now = Utc::now();
        self.bars
            .lock()
            .await
            .retain(|_, c| c.is_fresh(self.ttl, now));
        self.quotes
            .lock()
            .await
            .retain(|_, c| c.is_fresh(self.ttl, now));
    }
}

#[async_trait::async_trait]
impl<P: MarketDataProvider> MarketDataProvider for CachedProvider<P> {
    fn provider_name(&self) -> &'static str {
        self.inner.provider_name()
    }

    async fn fetch_historical_bars(
        &self,
        security: &SecurityRef,
        start_date: NaiveDate,
        adjustment: Adjustment,
    ) -> Result<Vec<DailyBar>> {
        let key = (security.clone(), start_date, adjustment);
        {
            let guard = self.bars.lock().await;
            if let Some(hit) = guard.get(&key) {
                if hit.is_fresh(self.ttl, Utc::now()) {
                    return Ok(hit.value.clone());
                }
            }
        }

        let fetched_at = Utc::now();
        let value = self
            .inner
            .fetch_historical_bars(security, start_date, adjustment)
            .await?;
        self.bars.lock().await.insert(
            key,
            Cached {
                value: value.clone(),
                fetched_at,
            },
        );
        Ok(value)
    }

    async fn fetch_intraday_quote(&self, security: &SecurityRef) -> Result<Option<IntradayQuote>> {
        {
            let guard = self.quotes.lock().await;
            if let Some(hit) = guard.get(security) {
                if hit.is_fresh(self.ttl, Utc::now()) {
                    return Ok(hit.value);
                }
            }
        }

        let fetched_at = Utc::now();
        let value = self.inner.fetch_intraday_quote(security).await?;
        self.quotes
            .lock()
            .await
            .insert(security.clone(), Cached { value, fetched_at });
        Ok(value)
    }
}
