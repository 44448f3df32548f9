use crate::domain::instrument::HeldPosition;
use crate::domain::recommendation::{PortfolioTotals, PositionValuation};

/// Values a capitalized position at `price`; `None` when principal is 0.
pub fn value_position(
    position: &HeldPosition,
    price: f64,
    prev_close: f64,
) -> Option<PositionValuation> {
    if !position.is_capitalized() {
        return None;
    }

    let cost = position.resolved_cost(price);
    let return_rate = if cost > 0.0 { (price - cost) / cost } else { 0.0 };
    let current_value = position.principal * (1.0 + return_rate);
    let day_change = if prev_close > 0.0 {
        (price - prev_close) / prev_close
    } else {
        0.0
    };

    Some(PositionValuation {
        cost,
        current_value,
        holding_pnl: current_value - position.principal,
        holding_pnl_pct: return_rate * 100.0,
        today_pnl: current_value * day_change,
    })
}

impl PortfolioTotals {
    pub fn add(&mut self, principal: f64, v: &PositionValuation) {
        self.principal += principal;
        self.market_value += v.current_value;
        self.today_pnl += v.today_pnl;
        self.total_return = self.market_value - self.principal;
        self.total_return_pct = if self.principal > 0.0 {
            self.total_return / self.principal * 100.0
        } else {
            0.0
        };
    }
}
