use crate::domain::instrument::ScanCandidate;
use anyhow::{ensure, Context};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

/// Read-only list of candidates scanned on every pass, grouped by category.
/// Category and candidate order decide ranking ties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanCatalog {
    pub categories: Vec<ScanCategory>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanCategory {
    pub label: String,
    pub candidates: Vec<ScanCandidate>,
}

impl ScanCatalog {
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read scan catalog {}", path.display()))?;
        let catalog: Self = serde_json::from_str(&text)
            .with_context(|| format!("scan catalog {} is not valid JSON", path.display()))?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let mut labels = BTreeSet::new();
        for category in &self.categories {
            let label = category.label.trim();
            ensure!(!label.is_empty(), "category label must be non-empty");
            ensure!(labels.insert(label), "duplicate category label: {label}");
            for c in &category.candidates {
                ensure!(!c.name.trim().is_empty(), "candidate name must be non-empty in {label}");
                ensure!(
                    !c.canonical_display_code().is_empty(),
                    "candidate {} has an empty display code",
                    c.name
                );
                ensure!(!c.symbol.trim().is_empty(), "candidate {} has an empty symbol", c.name);
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.categories.iter().map(|c| c.candidates.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ScanCatalog {
    fn default() -> Self {
        fn c(name: &str, symbol: &str, display_code: &str) -> ScanCandidate {
            ScanCandidate {
                name: name.to_string(),
                symbol: symbol.to_string(),
                display_code: display_code.to_string(),
                kind: None,
            }
        }

        Self {
            categories: vec![
                ScanCategory {
                    label: "core growth".to_string(),
                    candidates: vec![
                        c("Semiconductor ETF", "sh000990", "512480"),
                        c("Artificial Intelligence ETF", "sz159819", "159819"),
                        c("New Energy Vehicle ETF", "sz399976", "515030"),
                        c("Photovoltaic ETF", "sh931151", "515790"),
                        c("STAR Market 50 ETF", "sh000688", "588000"),
                        c("ChiNext ETF", "sz399006", "159915"),
                    ],
                },
                ScanCategory {
                    label: "defensive / cyclical".to_string(),
                    candidates: vec![
                        c("Dividend Low Volatility", "sh000814", "512890"),
                        c("Securities ETF", "sz399975", "512000"),
                        c("Bank ETF", "sz399986", "512800"),
                        c("Coal ETF", "sh000820", "515220"),
                        c("Healthcare ETF", "sz399989", "512170"),
                    ],
                },
                ScanCategory {
                    label: "global / alternative".to_string(),
                    candidates: vec![
                        c("Nasdaq Technology", "sz159509", "159509 (Invesco Great Wall)"),
                        c("S&P 500", "sh513500", "513500"),
                        c("Hang Seng Tech", "sz159740", "159740"),
                        c("Gold ETF", "sh518880", "518880"),
                        c("Nikkei ETF", "sh513520", "513520"),
                    ],
                },
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn default_catalog_is_valid() {
        let catalog = ScanCatalog::default();
        catalog.validate().unwrap();
        assert_eq!(catalog.categories.len(), 3);
        assert_eq!(catalog.len(), 16);
    }

    #[test]
    fn parses_optional_kind() {
        let v = json!({
            "categories": [{
                "label": "metals",
                "candidates": [
                    {"name": "Gold", "symbol": "sh518880", "display_code": "518880", "kind": "ETF"},
                    {"name": "Coal", "symbol": "sh000820", "display_code": "515220"}
                ]
            }]
        });
        let catalog: ScanCatalog = serde_json::from_value(v).unwrap();
        catalog.validate().unwrap();
        let cands = &catalog.categories[0].candidates;
        assert_eq!(cands[0].kind, Some(crate::domain::instrument::InstrumentKind::Etf));
        assert_eq!(cands[1].kind, None);
    }

    #[test]
    fn rejects_duplicate_labels() {
        let category = ScanCategory {
            label: "a".to_string(),
            candidates: vec![],
        };
        let catalog = ScanCatalog {
            categories: vec![category.clone(), category],
        };
        assert!(catalog.validate().is_err());
    }
}
