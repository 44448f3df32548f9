use crate::domain::signal::{Action, SignalResult, TrendLabel};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Everything one evaluation pass hands to the presentation layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardReport {
    pub as_of_date: NaiveDate,
    pub generated_at: DateTime<Utc>,
    pub session_open: bool,
    /// Held entries and actionable candidates, sorted by ranking score.
    pub entries: Vec<RecommendationEntry>,
    pub digest: Vec<RecommendationEntry>,
    pub positions: Vec<PositionView>,
    pub totals: PortfolioTotals,
    pub scan: Vec<ScanCategoryView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationEntry {
    pub name: String,
    pub code: String,
    pub signal: TrendLabel,
    pub action: Action,
    /// Score reported by the analyzer; shown to the user.
    pub score: u8,
    /// Sort key; differs from `score` only for held SELL alerts.
    pub rank_score: u16,
    pub is_holding: bool,
    pub pct_change: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionValuation {
    pub cost: f64,
    pub current_value: f64,
    pub holding_pnl: f64,
    pub holding_pnl_pct: f64,
    pub today_pnl: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionView {
    pub name: String,
    pub code: String,
    pub signal: SignalResult,
    /// `None` for positions tracked without principal.
    pub valuation: Option<PositionValuation>,
    pub recent_closes: Vec<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PortfolioTotals {
    pub principal: f64,
    pub market_value: f64,
    pub today_pnl: f64,
    pub total_return: f64,
    pub total_return_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanCategoryView {
    pub label: String,
    pub rows: Vec<ScanRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanRow {
    pub name: String,
    pub display_code: String,
    pub signal: SignalResult,
    pub actionable: bool,
    pub recent_closes: Vec<f64>,
}
