// =============================================================================
// US Market Session Clock
// =============================================================================
//
// Eastern-time arithmetic without a timezone database: EST is UTC-5, EDT is
// UTC-4, and the DST rule (second Sunday of March through first Sunday of
// November) is applied at day granularity. The switch hour itself is not
// modeled; the capture window sits mid-afternoon, far from 2 AM, so the
// approximation never moves it.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Timelike, Utc, Weekday};

const EST_OFFSET_SECS: i32 = -5 * 3600;
const EDT_OFFSET_SECS: i32 = -4 * 3600;

/// Regular session close, Eastern time.
const CLOSE_HOUR_ET: u32 = 16;
/// The snapshot capture window opens this many minutes before the close.
const CAPTURE_WINDOW_MINUTES: u32 = 5;

/// The UTC offset in effect in US Eastern time at `now`.
pub fn eastern_offset(now_utc: DateTime<Utc>) -> FixedOffset {
    // Evaluate the rule against the standard-time local date; at worst this
    // is off for a few hours around the 2 AM switch, which the consumers of
    // this clock never observe.
    let est = FixedOffset::east_opt(EST_OFFSET_SECS).expect("valid EST offset");
    let local_date = now_utc.with_timezone(&est).date_naive();
    let year = local_date.year();

    let dst_start = nth_weekday(year, 3, Weekday::Sun, 2);
    let dst_end = nth_weekday(year, 11, Weekday::Sun, 1);

    let offset_secs = match (dst_start, dst_end) {
        (Some(start), Some(end)) if local_date >= start && local_date < end => EDT_OFFSET_SECS,
        _ => EST_OFFSET_SECS,
    };
    FixedOffset::east_opt(offset_secs).expect("valid ET offset")
}

/// The Eastern-time calendar date at `now` — the trading session date while
/// the market is open.
pub fn session_date(now_utc: DateTime<Utc>) -> NaiveDate {
    now_utc.with_timezone(&eastern_offset(now_utc)).date_naive()
}

/// Whether `now` falls inside the end-of-session capture window:
/// 15:55 <= ET < 16:00 on a weekday. Exchange holidays are not modeled; a
/// holiday simply produces no fresh data to capture.
pub fn in_close_window(now_utc: DateTime<Utc>) -> bool {
    let et = now_utc.with_timezone(&eastern_offset(now_utc));
    if matches!(et.weekday(), Weekday::Sat | Weekday::Sun) {
        return false;
    }
    et.hour() == CLOSE_HOUR_ET - 1 && et.minute() >= 60 - CAPTURE_WINDOW_MINUTES
}

fn nth_weekday(year: i32, month: u32, weekday: Weekday, n: u8) -> Option<NaiveDate> {
    NaiveDate::from_weekday_of_month_opt(year, month, weekday, n)
}
