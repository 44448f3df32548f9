use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::Serialize;
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use signaldesk_core::analysis::series::SeriesOptions;
use signaldesk_core::domain::catalog::ScanCatalog;
use signaldesk_core::domain::contract::{HoldingRecord, HoldingsFile};
use signaldesk_core::domain::holdings::{default_holdings, HoldingsBook};
use signaldesk_core::domain::recommendation::DashboardReport;
use signaldesk_core::ingest::cache::CachedProvider;
use signaldesk_core::ingest::provider::EastmoneyProvider;
use signaldesk_core::storage::snapshots::{self, StoredSnapshot};

type Provider = CachedProvider<EastmoneyProvider>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = signaldesk_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let pool: Option<PgPool> = match settings.require_database_url() {
        Ok(db_url) => match sqlx::postgres::PgPoolOptions::new()
            .max_connections(5)
            .connect(db_url)
            .await
        {
            Ok(pool) => match signaldesk_core::storage::migrate(&pool).await {
                Ok(()) => Some(pool),
                Err(e) => {
                    sentry_anyhow::capture_anyhow(&e);
                    tracing::error!(error = %e, "db migrations failed; snapshots unavailable");
                    None
                }
            },
            Err(e) => {
                let err = anyhow::Error::new(e);
                sentry_anyhow::capture_anyhow(&err);
                tracing::error!(error = %err, "db connect failed; snapshots unavailable");
                None
            }
        },
        Err(e) => {
            tracing::warn!(error = %e, "DATABASE_URL missing; snapshots unavailable");
            None
        }
    };

    let holdings = match settings.holdings_path() {
        Some(path) => HoldingsBook::load(&path)?,
        None => HoldingsBook::in_memory(default_holdings()),
    };
    let catalog = match settings.scan_catalog_path() {
        Some(path) => ScanCatalog::from_json_file(&path)?,
        None => ScanCatalog::default(),
    };
    let provider = CachedProvider::new(
        EastmoneyProvider::from_settings(&settings)?,
        settings.fetch_cache_ttl()?,
    );

    let state = AppState {
        pool,
        provider: Arc::new(provider),
        session: Arc::new(tokio::sync::Mutex::new(Session {
            holdings,
            digest_dismissed: false,
        })),
        catalog: Arc::new(catalog),
        opts: SeriesOptions::new(settings.history_start_date()?),
    };

    let app = router(state).layer(TraceLayer::new_for_http());

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/dashboard", get(get_dashboard))
        .route("/holdings", get(list_holdings).put(upsert_holding))
        .route("/holdings/:code", delete(remove_holding))
        .route("/digest/dismiss", post(dismiss_digest))
        .route("/digest/restore", post(restore_digest))
        .route("/snapshots/latest", get(get_latest_snapshot))
        .route("/snapshots/:as_of_date", get(get_snapshot_by_date))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

/// Per-process view state: the editable holdings and the digest toggle.
#[derive(Debug)]
struct Session {
    holdings: HoldingsBook,
    digest_dismissed: bool,
}

#[derive(Clone)]
struct AppState {
    pool: Option<PgPool>,
    provider: Arc<Provider>,
    session: Arc<tokio::sync::Mutex<Session>>,
    catalog: Arc<ScanCatalog>,
    opts: SeriesOptions,
}

#[derive(Debug, Serialize)]
struct ApiDashboard {
    show_digest: bool,
    digest_dismissed: bool,
    report: DashboardReport,
}

#[derive(Debug, Serialize)]
struct DigestState {
    digest_dismissed: bool,
}

async fn get_dashboard(State(state): State<AppState>) -> Json<ApiDashboard> {
    let (positions, digest_dismissed) = {
        let session = state.session.lock().await;
        (session.holdings.positions().to_vec(), session.digest_dismissed)
    };

    state.provider.evict_expired().await;
    let report = signaldesk_core::analysis::evaluate(
        state.provider.as_ref(),
        &positions,
        &state.catalog,
        &state.opts,
        chrono::Utc::now(),
    )
    .await;

    Json(ApiDashboard {
        show_digest: show_digest(&report, digest_dismissed),
        digest_dismissed,
        report,
    })
}

fn show_digest(report: &DashboardReport, dismissed: bool) -> bool {
    !dismissed && !report.digest.is_empty()
}

async fn list_holdings(State(state): State<AppState>) -> Json<HoldingsFile> {
    let session = state.session.lock().await;
    Json(HoldingsFile::from_positions(session.holdings.positions()))
}

async fn upsert_holding(
    State(state): State<AppState>,
    Json(record): Json<HoldingRecord>,
) -> Result<Json<HoldingRecord>, (StatusCode, String)> {
    // Invalid records are a 422; a 500 only ever means the write failed.
    record
        .clone()
        .validate_and_into_position()
        .map_err(|e| (StatusCode::UNPROCESSABLE_ENTITY, format!("{e:#}")))?;

    let mut session = state.session.lock().await;
    let saved = session
        .holdings
        .apply(|book| book.upsert(record).map(HoldingRecord::from))
        .await
        .map_err(|e| {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %e, "failed to persist holdings");
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to persist holdings".to_string())
        })?;

    tracing::info!(code = %saved.code, "holding saved");
    Ok(Json(saved))
}

async fn remove_holding(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<StatusCode, StatusCode> {
    let mut session = state.session.lock().await;
    if !session.holdings.contains(&code) {
        return Err(StatusCode::NOT_FOUND);
    }

    session
        .holdings
        .apply(|book| Ok(book.remove(&code)))
        .await
        .map_err(|e| {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %e, "failed to persist holdings");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    tracing::info!(%code, "holding removed");
    Ok(StatusCode::NO_CONTENT)
}

async fn dismiss_digest(State(state): State<AppState>) -> Json<DigestState> {
    set_digest_dismissed(&state, true).await
}

async fn restore_digest(State(state): State<AppState>) -> Json<DigestState> {
    set_digest_dismissed(&state, false).await
}

async fn set_digest_dismissed(state: &AppState, dismissed: bool) -> Json<DigestState> {
    let mut session = state.session.lock().await;
    session.digest_dismissed = dismissed;
    Json(DigestState {
        digest_dismissed: dismissed,
    })
}

async fn get_latest_snapshot(
    State(state): State<AppState>,
) -> Result<Json<StoredSnapshot>, StatusCode> {
    load_snapshot(&state, None).await
}

async fn get_snapshot_by_date(
    State(state): State<AppState>,
    Path(as_of_date): Path<String>,
) -> Result<Json<StoredSnapshot>, StatusCode> {
    let as_of_date =
        NaiveDate::parse_from_str(&as_of_date, "%Y-%m-%d").map_err(|_| StatusCode::BAD_REQUEST)?;
    load_snapshot(&state, Some(as_of_date)).await
}

async fn load_snapshot(
    state: &AppState,
    as_of_date: Option<NaiveDate>,
) -> Result<Json<StoredSnapshot>, StatusCode> {
    let Some(pool) = &state.pool else {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    };

    let snapshot = snapshots::fetch_latest(pool, as_of_date)
        .await
        .map_err(|e| {
            sentry_anyhow::capture_anyhow(&e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(snapshot))
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
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
