//! One evaluation pass: held positions and scan candidates are fetched,
//! classified, valued and ranked in a single sequential sweep.

pub mod error;
pub mod ranking;
pub mod series;
pub mod trend;
pub mod valuation;

#[cfg(test)]
pub(crate) mod testing;

use crate::analysis::error::SignalError;
use crate::analysis::series::{load_series, PriceSeries, SeriesOptions};
use crate::domain::catalog::ScanCatalog;
use crate::domain::instrument::{HeldPosition, InstrumentKind};
use crate::domain::recommendation::{
    DashboardReport, PortfolioTotals, PositionView, ScanCategoryView, ScanRow,
};
use crate::domain::signal::SignalResult;
use crate::ingest::provider::MarketDataProvider;
use crate::time::cn_market;
use chrono::{DateTime, Utc};

const POSITION_SPARKLINE_BARS: usize = 20;
const SCAN_SPARKLINE_BARS: usize = 10;

#[derive(Debug, Clone)]
pub struct Resolved {
    pub series: PriceSeries,
    pub signal: SignalResult,
}

/// Fetch, normalize and classify one instrument.
pub async fn resolve(
    provider: &dyn MarketDataProvider,
    symbol: &str,
    kind_hint: InstrumentKind,
    opts: &SeriesOptions,
    now: DateTime<Utc>,
) -> Result<Resolved, SignalError> {
    let series = load_series(provider, symbol, kind_hint, opts, now).await?;
    let signal = trend::analyze(&series)?;
    Ok(Resolved { series, signal })
}

/// Runs a full pass. Instruments whose data cannot be resolved are left out of
/// every output; the pass itself never fails.
pub async fn evaluate(
    provider: &dyn MarketDataProvider,
    holdings: &[HeldPosition],
    catalog: &ScanCatalog,
    opts: &SeriesOptions,
    now: DateTime<Utc>,
) -> DashboardReport {
    let session_open = cn_market::is_trading_session_open(now);
    let mut entries = Vec::new();
    let mut positions = Vec::with_capacity(holdings.len());
    let mut totals = PortfolioTotals::default();
    let mut omitted: usize = 0;

    for position in holdings {
        let Resolved { series, signal } =
            match resolve(provider, &position.symbol, position.kind, opts, now).await {
                Ok(r) => r,
                Err(err) => {
                    omitted += 1;
                    tracing::warn!(
                        symbol = %position.symbol,
                        kind = err.kind(),
                        error = %err,
                        "holding omitted from pass"
                    );
                    continue;
                }
            };

        let prev_close = series
            .latest_pair()
            .map(|(prev, _)| prev.close)
            .unwrap_or(signal.price);
        let valuation = valuation::value_position(position, signal.price, prev_close);
        if let Some(v) = &valuation {
            totals.add(position.principal, v);
        }

        entries.push(ranking::holding_entry(position, &signal));
        positions.push(PositionView {
            name: position.name.clone(),
            code: position.symbol.clone(),
            valuation,
            recent_closes: series.recent_closes(POSITION_SPARKLINE_BARS),
            signal,
        });
    }

    let held = ranking::held_codes(holdings);
    let mut scan = Vec::with_capacity(catalog.categories.len());
    for category in &catalog.categories {
        let mut rows = Vec::with_capacity(category.candidates.len());
        for candidate in &category.candidates {
            let Resolved { series, signal } = match resolve(
                provider,
                &candidate.symbol,
                candidate.kind_hint(),
                opts,
                now,
            )
            .await
            {
                Ok(r) => r,
                Err(err) => {
                    omitted += 1;
                    tracing::warn!(
                        symbol = %candidate.symbol,
                        category = %category.label,
                        kind = err.kind(),
                        error = %err,
                        "scan candidate omitted from pass"
                    );
                    continue;
                }
            };

            if ranking::is_held(candidate, &held) {
                tracing::debug!(code = %candidate.display_code, "already held; not recommended");
            } else if let Some(entry) = ranking::candidate_entry(candidate, &signal) {
                entries.push(entry);
            }

            rows.push(ScanRow {
                name: candidate.name.clone(),
                display_code: candidate.display_code.clone(),
                actionable: signal.score >= ranking::CANDIDATE_MIN_SCORE,
                recent_closes: series.recent_closes(SCAN_SPARKLINE_BARS),
                signal,
            });
        }
        scan.push(ScanCategoryView {
            label: category.label.clone(),
            rows,
        });
    }

    let (entries, digest) = ranking::rank(entries);

    tracing::info!(
        provider = provider.provider_name(),
        session_open,
        holdings = positions.len(),
        candidates = catalog.len(),
        recommendations = entries.len(),
        digest = digest.len(),
        omitted,
        "evaluation pass complete"
    );

    DashboardReport {
        as_of_date: cn_market::market_date(now),
        generated_at: now,
        session_open,
        entries,
        digest,
        positions,
        totals,
        scan,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::testing::{closed_market_now, daily_with_volumes, FakeProvider};
    use crate::domain::catalog::ScanCategory;
    use crate::domain::instrument::ScanCandidate;
    use crate::domain::signal::{Action, TrendLabel};
    use crate::ingest::types::DailyBar;

    fn ending_with(last_close: f64, last_volume: f64) -> Vec<DailyBar> {
        let mut closes = vec![10.0; 24];
        closes.push(last_close);
        let mut volumes = vec![100.0; 24];
        volumes.push(last_volume);
        daily_with_volumes(&closes, &volumes)
    }

    fn golden() -> Vec<DailyBar> {
        ending_with(11.0, 300.0)
    }

    fn sell() -> Vec<DailyBar> {
        ending_with(9.0, 300.0)
    }

    fn weak() -> Vec<DailyBar> {
        ending_with(10.0, 100.0)
    }

    fn held(symbol: &str, principal: f64) -> HeldPosition {
        HeldPosition {
            name: format!("held {symbol}"),
            symbol: symbol.to_string(),
            cost: 0.0,
            principal,
            kind: InstrumentKind::Etf,
        }
    }

    fn cand(name: &str, symbol: &str, display_code: &str) -> ScanCandidate {
        ScanCandidate {
            name: name.to_string(),
            symbol: symbol.to_string(),
            display_code: display_code.to_string(),
            kind: None,
        }
    }

    fn catalog() -> ScanCatalog {
        ScanCatalog {
            categories: vec![
                ScanCategory {
                    label: "growth".to_string(),
                    candidates: vec![
                        cand("STAR 50 ETF", "sh000688", "588000"),
                        cand("Chips", "sh000990", "512480"),
                        cand("Broken", "sz399976", "515030"),
                    ],
                },
                ScanCategory {
                    label: "defensive".to_string(),
                    candidates: vec![cand("Banks", "sz399986", "512800")],
                },
            ],
        }
    }

    fn provider() -> FakeProvider {
        FakeProvider::default()
            .with_bars("588000", sell())
            .with_bars("159732", weak())
            .with_bars("000688", golden())
            .with_bars("000990", golden())
            .with_failing_bars("399976")
            .with_bars("399986", weak())
    }

    #[tokio::test]
    async fn full_pass_ranks_dedups_and_values() {
        let holdings = vec![held("sh588000", 4000.0), held("sz159732", 0.0)];
        let report = evaluate(
            &provider(),
            &holdings,
            &catalog(),
            &SeriesOptions::default(),
            closed_market_now(),
        )
        .await;

        assert!(!report.session_open);

        // The held SELL alert (85 + 15) ties the golden candidate and wins on
        // encounter order; the STAR 50 candidate is suppressed as already held.
        let codes: Vec<&str> = report.entries.iter().map(|e| e.code.as_str()).collect();
        assert_eq!(codes, vec!["sh588000", "512480", "sz159732"]);
        assert_eq!(report.entries[0].action, Action::Sell);
        assert_eq!(report.entries[0].score, 85);
        assert_eq!(report.entries[0].rank_score, 100);
        assert_eq!(report.entries[1].signal, TrendLabel::GoldenBuyPoint);
        // Held entries are exempt from the candidate score floor.
        assert_eq!(report.entries[2].score, 40);
        assert_eq!(report.digest, report.entries);

        // Scan view still shows every resolvable candidate, held or not.
        assert_eq!(report.scan.len(), 2);
        let growth: Vec<&str> = report.scan[0].rows.iter().map(|r| r.display_code.as_str()).collect();
        assert_eq!(growth, vec!["588000", "512480"]);
        assert!(report.scan[0].rows[0].actionable);
        assert!(!report.scan[1].rows[0].actionable);
        assert_eq!(report.scan[0].rows[1].recent_closes.len(), 10);

        // 4000 at cost 9.0 (unset) is worth 4000; yesterday's close was 10.
        assert_eq!(report.positions.len(), 2);
        let v = report.positions[0].valuation.unwrap();
        assert_eq!(v.current_value, 4000.0);
        assert!((v.today_pnl + 400.0).abs() < 1e-9);
        assert!(report.positions[1].valuation.is_none());
        assert_eq!(report.positions[0].recent_closes.len(), 20);
        assert_eq!(report.totals.principal, 4000.0);
        assert_eq!(report.totals.market_value, 4000.0);
        assert_eq!(report.totals.total_return, 0.0);
    }

    #[tokio::test]
    async fn weak_candidates_never_ranked() {
        let report = evaluate(
            &provider(),
            &[],
            &catalog(),
            &SeriesOptions::default(),
            closed_market_now(),
        )
        .await;
        assert!(report.entries.iter().all(|e| e.score >= 80));
        let codes: Vec<&str> = report.entries.iter().map(|e| e.code.as_str()).collect();
        assert_eq!(codes, vec!["588000", "512480"]);
        assert_eq!(report.totals, PortfolioTotals::default());
    }

    #[tokio::test]
    async fn digest_is_capped_at_five() {
        let mut provider = FakeProvider::default();
        let mut candidates = Vec::new();
        for i in 0..7 {
            let code = format!("51200{i}");
            provider = provider.with_bars(&code, golden());
            candidates.push(cand(&format!("c{i}"), &code, &code));
        }
        let catalog = ScanCatalog {
            categories: vec![ScanCategory {
                label: "all".to_string(),
                candidates,
            }],
        };

        let report = evaluate(&provider, &[], &catalog, &SeriesOptions::default(), closed_market_now()).await;
        assert_eq!(report.entries.len(), 7);
        assert_eq!(report.digest.len(), 5);
        assert_eq!(report.digest[0].name, "c0");
        assert_eq!(report.digest[4].name, "c4");
    }

    #[tokio::test]
    async fn unavailable_holding_is_omitted_but_still_dedups() {
        let provider = FakeProvider::default()
            .with_failing_bars("588000")
            .with_bars("000688", golden());
        let catalog = ScanCatalog {
            categories: vec![ScanCategory {
                label: "growth".to_string(),
                candidates: vec![cand("STAR 50 ETF", "sh000688", "588000")],
            }],
        };

        let report = evaluate(
            &provider,
            &[held("sh588000", 1000.0)],
            &catalog,
            &SeriesOptions::default(),
            closed_market_now(),
        )
        .await;
        assert!(report.positions.is_empty());
        assert!(report.entries.is_empty());
        assert_eq!(report.scan[0].rows.len(), 1);
    }
}
