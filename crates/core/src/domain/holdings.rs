use crate::domain::contract::{HoldingRecord, HoldingsFile};
use crate::domain::instrument::{canonical_code, HeldPosition, InstrumentKind};
use anyhow::Context;
use std::path::{Path, PathBuf};

/// Editable, ordered set of held positions.
///
/// Loaded once per process. Long-lived books are edited through `apply`, which
/// only adopts an edit once it has been written back to the backing file.
#[derive(Debug, Clone)]
pub struct HoldingsBook {
    path: Option<PathBuf>,
    positions: Vec<HeldPosition>,
}

impl HoldingsBook {
    pub fn in_memory(positions: Vec<HeldPosition>) -> Self {
        Self {
            path: None,
            positions,
        }
    }

    /// Reads `path`, or starts from the default holdings when it does not exist yet.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "holdings file missing; using defaults");
            return Ok(Self {
                path: Some(path.to_path_buf()),
                positions: default_holdings(),
            });
        }

        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read holdings file {}", path.display()))?;
        let file: HoldingsFile = serde_json::from_str(&text)
            .with_context(|| format!("holdings file {} is not valid JSON", path.display()))?;
        let positions = file.validate_and_into_positions()?;

        tracing::debug!(path = %path.display(), positions = positions.len(), "loaded holdings");
        Ok(Self {
            path: Some(path.to_path_buf()),
            positions,
        })
    }

    pub fn positions(&self) -> &[HeldPosition] {
        &self.positions
    }

    /// Replaces the position with the same canonical code in place, or appends.
    pub fn upsert(&mut self, record: HoldingRecord) -> anyhow::Result<&HeldPosition> {
        let position = record.validate_and_into_position()?;
        let code = position.canonical_code();
        let idx = match self
            .positions
            .iter()
            .position(|p| p.canonical_code() == code)
        {
            Some(idx) => {
                self.positions[idx] = position;
                idx
            }
            None => {
                self.positions.push(position);
                self.positions.len() - 1
            }
        };
        Ok(&self.positions[idx])
    }

    /// Removes the position whose canonical code matches `code` in any format.
    pub fn remove(&mut self, code: &str) -> bool {
        let code = canonical_code(code);
        let before = self.positions.len();
        self.positions.retain(|p| p.canonical_code() != code);
        self.positions.len() != before
    }

    pub fn contains(&self, code: &str) -> bool {
        let code = canonical_code(code);
        self.positions.iter().any(|p| p.canonical_code() == code)
    }

    /// Runs `edit` against a copy, persists the copy, then adopts it. On any
    /// error the book keeps its previous positions.
    pub async fn apply<R>(
        &mut self,
        edit: impl FnOnce(&mut HoldingsBook) -> anyhow::Result<R>,
    ) -> anyhow::Result<R> {
        let mut draft = self.clone();
        let out = edit(&mut draft)?;
        draft.persist().await?;
        *self = draft;
        Ok(out)
    }

    pub async fn persist(&self) -> anyhow::Result<()> {
        let Some(path) = self.path.as_deref() else {
            return Ok(());
        };

        let body = serde_json::to_string_pretty(&HoldingsFile::from_positions(&self.positions))
            .context("failed to serialize holdings")?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body)
            .await
            .with_context(|| format!("failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, path)
            .await
            .with_context(|| format!("failed to replace holdings file {}", path.display()))?;

        tracing::info!(path = %path.display(), positions = self.positions.len(), "persisted holdings");
        Ok(())
    }
}

pub fn default_holdings() -> Vec<HeldPosition> {
    let etf = |name: &str, symbol: &str, principal: f64| HeldPosition {
        name: name.to_string(),
        symbol: symbol.to_string(),
        cost: 0.0,
        principal,
        kind: InstrumentKind::Etf,
    };
    vec![
        etf("STAR Market 50", "sh588000", 4181.81),
        etf("Consumer Electronics", "sz159732", 4341.96),
        etf("Artificial Intelligence", "sz159819", 3787.17),
        etf("Nasdaq 100", "sz159941", 4871.39),
    ]
}
