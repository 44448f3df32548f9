use crate::domain::instrument::{HeldPosition, InstrumentKind, SecurityCode};
use anyhow::ensure;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Holdings as stored on disk or submitted by the editor: loosely typed, every
/// numeric field optional.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoldingsFile {
    pub holdings: Vec<HoldingRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoldingRecord {
    pub name: String,
    pub code: String,
    #[serde(default)]
    pub cost: Option<f64>,
    #[serde(default)]
    pub principal: Option<f64>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

impl HoldingsFile {
    pub fn validate_and_into_positions(self) -> anyhow::Result<Vec<HeldPosition>> {
        let mut seen_codes = BTreeSet::<String>::new();
        let mut out = Vec::with_capacity(self.holdings.len());
        for record in self.holdings {
            let position = record.validate_and_into_position()?;
            let code = position.canonical_code();
            ensure!(
                seen_codes.insert(code.clone()),
                "duplicate holding code: {code}"
            );
            out.push(position);
        }
        Ok(out)
    }

    pub fn from_positions(positions: &[HeldPosition]) -> Self {
        Self {
            holdings: positions.iter().map(HoldingRecord::from).collect(),
        }
    }
}

impl HoldingRecord {
    pub fn validate_and_into_position(self) -> anyhow::Result<HeldPosition> {
        let name = self.name.trim().to_string();
        ensure!(!name.is_empty(), "holding name must be non-empty");

        let symbol = self.code.trim().to_string();
        ensure!(
            SecurityCode::parse(&symbol).is_numeric(),
            "holding code must resolve to a numeric security code (got {symbol:?})"
        );

        let cost = self.cost.unwrap_or(0.0);
        ensure!(
            cost.is_finite() && cost >= 0.0,
            "cost must be a non-negative number (got {cost}) for {symbol}"
        );

        let principal = self.principal.unwrap_or(0.0);
        ensure!(
            principal.is_finite() && principal >= 0.0,
            "principal must be a non-negative number (got {principal}) for {symbol}"
        );

        let kind = match self.kind.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(s) => InstrumentKind::parse(s)
                .ok_or_else(|| anyhow::anyhow!("type must be ETF or INDEX (got {s:?}) for {symbol}"))?,
            None => InstrumentKind::Etf,
        };

        Ok(HeldPosition {
            name,
            symbol,
            cost,
            principal,
            kind,
        })
    }
}

impl From<&HeldPosition> for HoldingRecord {
    fn from(p: &HeldPosition) -> Self {
        Self {
            name: p.name.clone(),
            code: p.symbol.clone(),
            cost: Some(p.cost),
            principal: Some(p.principal),
            kind: Some(p.kind.as_str().to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_missing_fields() {
        let v = json!({
            "holdings": [
                {"name": "STAR 50", "code": "sh588000"},
                {"name": "Nasdaq", "code": "sz159941", "cost": 1.25, "principal": 4871.39, "type": "etf"}
            ]
        });
        let file: HoldingsFile = serde_json::from_value(v).unwrap();
        let positions = file.validate_and_into_positions().unwrap();
        assert_eq!(positions.len(), 2);
        assert_eq!(positions[0].cost, 0.0);
        assert_eq!(positions[0].principal, 0.0);
        assert_eq!(positions[0].kind, InstrumentKind::Etf);
        assert_eq!(positions[1].cost, 1.25);
    }

    #[test]
    fn rejects_negative_principal_and_bad_kind() {
        let record = HoldingRecord {
            name: "X".to_string(),
            code: "sh588000".to_string(),
            cost: None,
            principal: Some(-1.0),
            kind: None,
        };
        assert!(record.validate_and_into_position().is_err());

        let record = HoldingRecord {
            name: "X".to_string(),
            code: "sh588000".to_string(),
            cost: None,
            principal: None,
            kind: Some("BOND".to_string()),
        };
        assert!(record.validate_and_into_position().is_err());
    }

    #[test]
    fn rejects_non_numeric_code() {
        let record = HoldingRecord {
            name: "X".to_string(),
            code: "shABC".to_string(),
            cost: None,
            principal: None,
            kind: None,
        };
        assert!(record.validate_and_into_position().is_err());
    }

    #[test]
    fn rejects_same_security_in_two_formats() {
        let v = json!({
            "holdings": [
                {"name": "A", "code": "sh588000"},
                {"name": "B", "code": "588000"}
            ]
        });
        let file: HoldingsFile = serde_json::from_value(v).unwrap();
        let err = file.validate_and_into_positions().unwrap_err();
        assert!(err.to_string().contains("duplicate holding code"));
    }
}
