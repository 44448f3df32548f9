use crate::domain::recommendation::{DashboardReport, RecommendationEntry};
use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct StoredSnapshot {
    pub snapshot_id: Uuid,
    pub provider: String,
    pub as_of_date: NaiveDate,
    pub generated_at: DateTime<Utc>,
    pub report: DashboardReport,
}

/// Stores the ranked list of one pass; the full report is kept as JSON.
pub async fn persist_report(
    pool: &sqlx::PgPool,
    report: &DashboardReport,
    provider: &str,
) -> anyhow::Result<Uuid> {
    let id = Uuid::new_v4();
    let raw = serde_json::to_value(report).context("failed to serialize dashboard report")?;

    let mut tx = pool.begin().await.context("begin transaction failed")?;

    sqlx::query(
        "INSERT INTO dashboard_snapshots \
           (id, as_of_date, generated_at, provider, session_open, total_principal, total_market_value, today_pnl, total_return, report) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
    )
    .persistent(false)
    .bind(id)
    .bind(report.as_of_date)
    .bind(report.generated_at)
    .bind(provider)
    .bind(report.session_open)
    .bind(report.totals.principal)
    .bind(report.totals.market_value)
    .bind(report.totals.today_pnl)
    .bind(report.totals.total_return)
    .bind(raw)
    .execute(&mut *tx)
    .await
    .context("insert dashboard_snapshots failed")?;

    let digest_len = report.digest.len();
    for (idx, entry) in report.entries.iter().enumerate() {
        insert_entry(&mut tx, id, idx as i32 + 1, entry, idx < digest_len).await?;
    }

    tx.commit().await.context("commit transaction failed")?;

    tracing::debug!(
        %id,
        as_of_date = %report.as_of_date,
        entries = report.entries.len(),
        "persisted dashboard snapshot"
    );
    Ok(id)
}

async fn insert_entry(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    snapshot_id: Uuid,
    rank: i32,
    entry: &RecommendationEntry,
    in_digest: bool,
) -> anyhow::Result<()> {
    sqlx::query(
        "INSERT INTO dashboard_entries \
           (snapshot_id, rank, name, code, signal, action, score, rank_score, is_holding, pct_change, in_digest) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
    )
    .persistent(false)
    .bind(snapshot_id)
    .bind(rank)
    .bind(&entry.name)
    .bind(&entry.code)
    .bind(entry.signal.as_str())
    .bind(entry.action.as_str())
    .bind(i32::from(entry.score))
    .bind(i32::from(entry.rank_score))
    .bind(entry.is_holding)
    .bind(entry.pct_change)
    .bind(in_digest)
    .execute(&mut **tx)
    .await
    .context("insert dashboard_entries failed")?;

    Ok(())
}

/// Most recent snapshot, optionally restricted to one market date.
pub async fn fetch_latest(
    pool: &sqlx::PgPool,
    as_of_date: Option<NaiveDate>,
) -> anyhow::Result<Option<StoredSnapshot>> {
    let row = match as_of_date {
        Some(d) => {
            sqlx::query_as::<_, (Uuid, String, NaiveDate, DateTime<Utc>, serde_json::Value)>(
                "SELECT id, provider, as_of_date, generated_at, report \
                 FROM dashboard_snapshots \
                 WHERE as_of_date = $1 \
                 ORDER BY generated_at DESC \
                 LIMIT 1",
            )
            .persistent(false)
            .bind(d)
            .fetch_optional(pool)
            .await?
        }
        None => {
            sqlx::query_as::<_, (Uuid, String, NaiveDate, DateTime<Utc>, serde_json::Value)>(
                "SELECT id, provider, as_of_date, generated_at, report \
                 FROM dashboard_snapshots \
                 ORDER BY as_of_date DESC, generated_at DESC \
                 LIMIT 1",
            )
            .persistent(false)
            .fetch_optional(pool)
            .await?
        }
    };

    let Some((snapshot_id, provider, as_of_date, generated_at, raw)) = row else {
        return Ok(None);
    };

    let report: DashboardReport = serde_json::from_value(raw)
        .with_context(|| format!("stored report for snapshot_id={snapshot_id} is malformed"))?;

    Ok(Some(StoredSnapshot {
        snapshot_id,
        provider,
        as_of_date,
        generated_at,
        report,
    }))
}
