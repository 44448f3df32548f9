use std::fmt;

/// Why one instrument produced no signal. Never fatal for a pass.
#[derive(Debug, Clone, PartialEq)]
pub enum SignalError {
    /// Historical fetch failed, came back empty, or carried unusable rows.
    DataUnavailable { symbol: String, detail: String },
    /// The intraday quote could not be used; the historical series still stands.
    IntradayUnavailable { symbol: String, detail: String },
    /// Fewer than two bars, so there is no "previous" bar to compare with.
    InsufficientHistory { symbol: String, bars: usize },
}

impl SignalError {
    pub fn data_unavailable(symbol: &str, detail: impl fmt::Display) -> Self {
        Self::DataUnavailable {
            symbol: symbol.to_string(),
            detail: detail.to_string(),
        }
    }

    pub fn intraday_unavailable(symbol: &str, detail: impl fmt::Display) -> Self {
        Self::IntradayUnavailable {
            symbol: symbol.to_string(),
            detail: detail.to_string(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::DataUnavailable { .. } => "data_unavailable",
            Self::IntradayUnavailable { .. } => "intraday_unavailable",
            Self::InsufficientHistory { .. } => "insufficient_history",
        }
    }
}

impl fmt::Display for SignalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DataUnavailable { symbol, detail } => {
                write!(f, "no data for {symbol}: {detail}")
            }
            Self::IntradayUnavailable { symbol, detail } => {
                write!(f, "no intraday quote for {symbol}: {detail}")
            }
            Self::InsufficientHistory { symbol, bars } => {
                write!(f, "insufficient history for {symbol}: {bars} bar(s), need 2")
            }
        }
    }
}

impl std::error::Error for SignalError {}
