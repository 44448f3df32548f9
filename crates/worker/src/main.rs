use anyhow::Context;
use clap::Parser;
use signaldesk_core::analysis::series::SeriesOptions;
use signaldesk_core::domain::catalog::ScanCatalog;
use signaldesk_core::domain::holdings::{default_holdings, HoldingsBook};
use signaldesk_core::domain::recommendation::DashboardReport;
use signaldesk_core::ingest::cache::CachedProvider;
use signaldesk_core::ingest::provider::{EastmoneyProvider, MarketDataProvider};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "signaldesk_worker")]
struct Args {
    /// Holdings JSON file. Falls back to HOLDINGS_PATH, then the built-in defaults.
    #[arg(long)]
    holdings: Option<PathBuf>,

    /// Scan catalog JSON file. Falls back to SCAN_CATALOG_PATH, then the built-in catalog.
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Evaluate as of this RFC 3339 instant instead of the current time.
    #[arg(long)]
    now: Option<String>,

    /// Do everything except writing to the database.
    #[arg(long)]
    dry_run: bool,

    /// Print the full report as JSON on stdout.
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = signaldesk_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    if let Err(err) = run(args, &settings).await {
        sentry_anyhow::capture_anyhow(&err);
        tracing::error!(error = %err, "evaluation run failed");
        return Err(err);
    }
    Ok(())
}

async fn run(args: Args, settings: &signaldesk_core::config::Settings) -> anyhow::Result<()> {
    let now = resolve_now(args.now.as_deref())?;

    let holdings = match args.holdings.or_else(|| settings.holdings_path()) {
        Some(path) => HoldingsBook::load(&path)?.positions().to_vec(),
        None => default_holdings(),
    };
    let catalog = match args.catalog.or_else(|| settings.scan_catalog_path()) {
        Some(path) => ScanCatalog::from_json_file(&path)?,
        None => ScanCatalog::default(),
    };

    let opts = SeriesOptions::new(settings.history_start_date()?);
    let provider = CachedProvider::new(
        EastmoneyProvider::from_settings(settings)?,
        settings.fetch_cache_ttl()?,
    );

    let report = signaldesk_core::analysis::evaluate(&provider, &holdings, &catalog, &opts, now).await;
    log_digest(&report);

    if args.json {
        let out = serde_json::to_string_pretty(&report).context("failed to serialize report")?;
        println!("{out}");
    }

    if args.dry_run {
        tracing::info!(as_of_date = %report.as_of_date, dry_run = true, "skipping snapshot persistence");
        return Ok(());
    }

    let Ok(db_url) = settings.require_database_url() else {
        tracing::warn!("DATABASE_URL missing; snapshot not persisted");
        return Ok(());
    };

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(2)
        .connect(db_url)
        .await
        .context("connect DATABASE_URL failed")?;

    signaldesk_core::storage::migrate(&pool).await?;

    let snapshot_id =
        signaldesk_core::storage::snapshots::persist_report(&pool, &report, provider.provider_name())
            .await?;
    tracing::info!(as_of_date = %report.as_of_date, %snapshot_id, "persisted dashboard snapshot");
    Ok(())
}

fn log_digest(report: &DashboardReport) {
    if report.digest.is_empty() {
        tracing::info!(as_of_date = %report.as_of_date, "no actionable recommendations");
    }
    for (idx, e) in report.digest.iter().enumerate() {
        tracing::info!(
            rank = idx + 1,
            name = %e.name,
            code = %e.code,
            action = %e.action,
            signal = %e.signal,
            score = e.score,
            pct_change = format_args!("{:.2}", e.pct_change),
            holding = e.is_holding,
            "digest"
        );
    }
    tracing::info!(
        market_value = format_args!("{:.0}", report.totals.market_value),
        today_pnl = format_args!("{:+.0}", report.totals.today_pnl),
        total_return = format_args!("{:+.0}", report.totals.total_return),
        total_return_pct = format_args!("{:+.2}", report.totals.total_return_pct),
        session_open = report.session_open,
        "portfolio"
    );
}

fn resolve_now(arg: Option<&str>) -> anyhow::Result<chrono::DateTime<chrono::Utc>> {
    match arg {
        Some(s) => Ok(chrono::DateTime::parse_from_rfc3339(s)
            .with_context(|| format!("--now must be RFC 3339 (got {s})"))?
            .with_timezone(&chrono::Utc)),
        None => Ok(chrono::Utc::now()),
    }
}

fn init_sentry(settings: &signaldesk_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
