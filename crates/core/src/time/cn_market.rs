use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};

// Shanghai/Shenzhen trade on China Standard Time, which has no DST.
const CST_OFFSET_SECS: i64 = 8 * 3600;

const SESSION_OPEN_HMS: (u32, u32, u32) = (9, 30, 0);
const SESSION_CLOSE_HMS: (u32, u32, u32) = (15, 0, 0);

// Elapsed time counts straight through the 11:30-13:00 break until the
// afternoon resumes, then the break is taken back out.
const AFTERNOON_RESUME_HOUR: u32 = 13;
const MIDDAY_BREAK_MINUTES: f64 = 90.0;

/// Continuous trading minutes in one session.
pub const SESSION_MINUTES: f64 = 240.0;

pub fn exchange_local(now: DateTime<Utc>) -> NaiveDateTime {
    now.naive_utc() + Duration::seconds(CST_OFFSET_SECS)
}

/// Calendar date on the exchange's clock.
pub fn market_date(now: DateTime<Utc>) -> NaiveDate {
    exchange_local(now).date()
}

/// Mon-Fri, 09:30 (inclusive) to 15:00 (exclusive) exchange time.
pub fn is_trading_session_open(now: DateTime<Utc>) -> bool {
    let local = exchange_local(now);
    if is_weekend(local.date()) {
        return false;
    }
    let t = local.time();
    t >= hms(SESSION_OPEN_HMS) && t < hms(SESSION_CLOSE_HMS)
}

/// Fraction of the trading day elapsed at `now`, clamped to `[1/240, 1]`.
pub fn session_progress(now: DateTime<Utc>) -> f64 {
    let local = exchange_local(now);
    let mut minutes = (local.time() - hms(SESSION_OPEN_HMS)).num_seconds() as f64 / 60.0;
    if local.time() >= hms((AFTERNOON_RESUME_HOUR, 0, 0)) {
        minutes -= MIDDAY_BREAK_MINUTES;
    }
    minutes.clamp(1.0, SESSION_MINUTES) / SESSION_MINUTES
}

/// Scales the volume traded so far up to a full-day estimate.
pub fn project_full_day_volume(cumulative_volume: f64, progress: f64) -> f64 {
    if progress > 0.0 {
        cumulative_volume / progress
    } else {
        cumulative_volume
    }
}

fn hms((h, m, s): (u32, u32, u32)) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, s).unwrap_or(NaiveTime::MIN)
}

fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), chrono::Weekday::Sat | chrono::Weekday::Sun)
}
