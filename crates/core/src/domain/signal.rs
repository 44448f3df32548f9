use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Buy,
    Sell,
    Hold,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
            Self::Hold => "HOLD",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendLabel {
    GoldenBuyPoint,
    AggressiveBreakout,
    HighVolumeDecline,
    MildUptrend,
    LowVolumePullback,
}

impl TrendLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::GoldenBuyPoint => "golden buy point",
            Self::AggressiveBreakout => "aggressive breakout (high volume)",
            Self::HighVolumeDecline => "high-volume decline (warning)",
            Self::MildUptrend => "mild uptrend",
            Self::LowVolumePullback => "low-volume pullback",
        }
    }
}

impl fmt::Display for TrendLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of the two most recent bars of one instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalResult {
    pub price: f64,
    pub pct_change: f64,
    pub label: TrendLabel,
    pub score: u8,
    pub action: Action,
    pub volume_ratio: f64,
}
