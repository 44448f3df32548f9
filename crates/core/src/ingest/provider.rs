use crate::config::Settings;
use crate::domain::instrument::{Exchange, InstrumentKind, SecurityRef};
use crate::ingest::types::{Adjustment, DailyBar, IntradayQuote};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;
use std::future::Future;
use std::time::Duration;

const DEFAULT_KLINE_BASE_URL: &str = "https://push2his.eastmoney.com";
const DEFAULT_QUOTE_BASE_URL: &str = "https://push2.eastmoney.com";
const KLINE_PATH: &str = "/api/qt/stock/kline/get";
const QUOTE_PATH: &str = "/api/qt/stock/get";

// klt=101 selects daily bars.
const DAILY_KLT: &str = "101";
const OPEN_END_DATE: &str = "20500101";

/// Market-data collaborator consumed by the series normalizer.
#[async_trait::async_trait]
pub trait MarketDataProvider: Send + Sync {
    fn provider_name(&self) -> &'static str;

    /// Daily bars from `start_date` onward, ascending by date.
    async fn fetch_historical_bars(
        &self,
        security: &SecurityRef,
        start_date: NaiveDate,
        adjustment: Adjustment,
    ) -> Result<Vec<DailyBar>>;

    /// Latest traded price and cumulative volume; `None` when the code is not quoted.
    async fn fetch_intraday_quote(&self, security: &SecurityRef) -> Result<Option<IntradayQuote>>;
}

#[derive(Debug, Clone)]
pub struct EastmoneyProvider {
    http: reqwest::Client,
    kline_base_url: String,
    quote_base_url: String,
    retries: u32,
}

impl EastmoneyProvider {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let kline_base_url = settings
            .market_data_base_url
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_KLINE_BASE_URL.to_string());
        let quote_base_url = settings
            .market_quote_base_url
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_QUOTE_BASE_URL.to_string());

        let timeout = settings.market_data_timeout()?;
        let retries = settings.market_data_retries()?;

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("Mozilla/5.0 (X11; Linux x86_64)")
            .build()
            .context("failed to build market data http client")?;

        Ok(Self {
            http,
            kline_base_url,
            quote_base_url,
            retries,
        })
    }

    fn url(base: &str, path: &str) -> String {
        format!("{}{}", base.trim_end_matches('/'), path)
    }

    async fn get_json(&self, url: &str, params: &[(&str, String)]) -> Result<Value> {
        let res = self
            .http
            .get(url)
            .query(params)
            .send()
            .await
            .context("market data request failed")?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read market data response")?;

        if !status.is_success() {
            anyhow::bail!("market data HTTP {status}: {text}");
        }

        serde_json::from_str::<Value>(&text)
            .with_context(|| format!("market data response is not valid JSON: {text}"))
    }

    async fn fetch_bars_once(
        &self,
        security: &SecurityRef,
        start_date: NaiveDate,
        adjustment: Adjustment,
    ) -> Result<Vec<DailyBar>> {
        let secid = secid(security);
        let params = [
            ("secid", secid.clone()),
            ("klt", DAILY_KLT.to_string()),
            ("fqt", fqt(adjustment).to_string()),
            ("beg", start_date.format("%Y%m%d").to_string()),
            ("end", OPEN_END_DATE.to_string()),
            ("fields1", "f1,f2,f3,f4,f5,f6".to_string()),
            ("fields2", "f51,f52,f53,f54,f55,f56,f57".to_string()),
        ];

        tracing::debug!(%secid, %start_date, ?adjustment, "fetching daily bars");
        let raw = self
            .get_json(&Self::url(&self.kline_base_url, KLINE_PATH), &params)
            .await?;
        parse_kline_response(raw).with_context(|| format!("daily bars for {secid}"))
    }

    async fn fetch_quote_once(&self, security: &SecurityRef) -> Result<Option<IntradayQuote>> {
        let secid = secid(security);
        let params = [
            ("secid", secid.clone()),
            ("fields", "f43,f47".to_string()),
            ("fltt", "2".to_string()),
            ("invt", "2".to_string()),
        ];

        tracing::debug!(%secid, "fetching intraday quote");
        let raw = self
            .get_json(&Self::url(&self.quote_base_url, QUOTE_PATH), &params)
            .await?;
        Ok(parse_quote_response(&raw))
    }

    async fn with_retries<T, F, Fut>(&self, op: &'static str, mut f: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match f().await {
                Ok(v) => return Ok(v),
                Err(err) => {
                    if attempt >= self.retries {
                        return Err(err);
                    }
                    let backoff = Duration::from_secs(1 << (attempt - 1));
                    tracing::warn!(attempt, ?backoff, op, error = %err, "market data fetch failed; retrying");
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl MarketDataProvider for EastmoneyProvider {
    fn provider_name(&self) -> &'static str {
        "eastmoney"
    }

    async fn fetch_historical_bars(
        &self,
        security: &SecurityRef,
        start_date: NaiveDate,
        adjustment: Adjustment,
    ) -> Result<Vec<DailyBar>> {
        self.with_retries("daily_bars", || {
            self.fetch_bars_once(security, start_date, adjustment)
        })
        .await
    }

    async fn fetch_intraday_quote(&self, security: &SecurityRef) -> Result<Option<IntradayQuote>> {
        self.with_retries("intraday_quote", || self.fetch_quote_once(security))
            .await
    }
}

/// `market.code` identifier used by both endpoints.
fn secid(security: &SecurityRef) -> String {
    let code = &security.code.code;
    let exchange = security
        .code
        .exchange
        .unwrap_or_else(|| infer_exchange(code, security.kind));

    let market = match exchange {
        // CSI-published indices (93xxxx) live under their own market id.
        Exchange::Shanghai if security.kind == InstrumentKind::Index && code.starts_with("93") => "2",
        Exchange::Shanghai => "1",
        Exchange::Shenzhen | Exchange::Beijing => "0",
    };
    format!("{market}.{code}")
}

fn infer_exchange(code: &str, kind: InstrumentKind) -> Exchange {
    match kind {
        InstrumentKind::Etf if code.starts_with('5') => Exchange::Shanghai,
        InstrumentKind::Etf => Exchange::Shenzhen,
        InstrumentKind::Index if code.starts_with("399") => Exchange::Shenzhen,
        InstrumentKind::Index => Exchange::Shanghai,
    }
}

fn fqt(adjustment: Adjustment) -> &'static str {
    match adjustment {
        Adjustment::None => "0",
        Adjustment::Forward => "1",
    }
}

#[derive(Debug, Deserialize)]
struct KlineResponse {
    rc: i32,
    data: Option<KlineData>,
}

#[derive(Debug, Deserialize)]
struct KlineData {
    klines: Option<Vec<String>>,
}

fn parse_kline_response(raw: Value) -> Result<Vec<DailyBar>> {
    let resp: KlineResponse =
        serde_json::from_value(raw).context("unexpected kline response shape")?;
    anyhow::ensure!(resp.rc == 0, "kline endpoint returned rc={}", resp.rc);

    let lines = resp
        .data
        .and_then(|d| d.klines)
        .context("kline response has no data")?;

    let mut bars = Vec::with_capacity(lines.len());
    for line in &lines {
        if line.split(',').count() < 6 {
            tracing::warn!(line = %line, "short kline row; skipping");
            continue;
        }
        bars.push(parse_kline_line(line)?);
    }
    Ok(bars)
}

// Row layout: date,open,close,high,low,volume,amount
fn parse_kline_line(line: &str) -> Result<DailyBar> {
    let parts: Vec<&str> = line.split(',').collect();
    let num = |idx: usize, field: &str| -> Result<f64> {
        parts[idx]
            .trim()
            .parse::<f64>()
            .with_context(|| format!("invalid {field} in kline row {line:?}"))
    };

    Ok(DailyBar {
        date: NaiveDate::parse_from_str(parts[0].trim(), "%Y-%m-%d")
            .with_context(|| format!("invalid date in kline row {line:?}"))?,
        open: num(1, "open")?,
        close: num(2, "close")?,
        volume: num(5, "volume")?,
    })
}

// Suspended or unknown codes come back with `data: null` or "-" placeholders.
fn parse_quote_response(raw: &Value) -> Option<IntradayQuote> {
    let data = raw.get("data")?;
    let last_price = data.get("f43")?.as_f64()?;
    let cumulative_volume = data.get("f47")?.as_f64()?;
    (last_price > 0.0).then_some(IntradayQuote {
        last_price,
        cumulative_volume,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sref(symbol: &str, kind: InstrumentKind) -> SecurityRef {
        SecurityRef::classify(symbol, kind)
    }

    #[test]
    fn maps_codes_to_secid() {
        assert_eq!(secid(&sref("sh588000", InstrumentKind::Etf)), "1.588000");
        assert_eq!(secid(&sref("sz159819", InstrumentKind::Etf)), "0.159819");
        assert_eq!(secid(&sref("512480", InstrumentKind::Etf)), "1.512480");
        assert_eq!(secid(&sref("159915", InstrumentKind::Etf)), "0.159915");
        assert_eq!(secid(&sref("sz399006", InstrumentKind::Index)), "0.399006");
        assert_eq!(secid(&sref("sh000990", InstrumentKind::Index)), "1.000990");
        assert_eq!(secid(&sref("sh931151", InstrumentKind::Index)), "2.931151");
    }

    #[test]
    fn parses_daily_klines() {
        let raw = json!({
            "rc": 0,
            "data": {
                "code": "588000",
                "klines": [
                    "2024-01-02,0.912,0.905,0.915,0.901,8123456,7400000.0",
                    "2024-01-03,0.905,0.899,0.907,0.895,7011000,6300000.0",
                    "bad-row"
                ]
            }
        });
        let bars = parse_kline_response(raw).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(bars[0].open, 0.912);
        assert_eq!(bars[0].close, 0.905);
        assert_eq!(bars[1].volume, 7_011_000.0);
    }

    #[test]
    fn rejects_error_code_and_missing_data() {
        assert!(parse_kline_response(json!({"rc": 102, "data": null})).is_err());
        assert!(parse_kline_response(json!({"rc": 0, "data": null})).is_err());
        assert!(parse_kline_response(json!({
            "rc": 0,
            "data": {"klines": ["2024-01-02,x,0.9,0.9,0.9,1,1"]}
        }))
        .is_err());
    }

    #[test]
    fn parses_quote_or_reports_missing() {
        let q = parse_quote_response(&json!({"rc": 0, "data": {"f43": 1.234, "f47": 52000}}));
        assert_eq!(
            q,
            Some(IntradayQuote {
                last_price: 1.234,
                cumulative_volume: 52000.0
            })
        );
        assert_eq!(parse_quote_response(&json!({"rc": 0, "data": null})), None);
        assert_eq!(
            parse_quote_response(&json!({"rc": 0, "data": {"f43": "-", "f47": "-"}})),
            None
        );
    }
}
