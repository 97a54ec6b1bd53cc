//! Unix timestamp helpers shared by the token codec, cookies and the database.

use std::time::{SystemTime, UNIX_EPOCH};

const WEEKDAYS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];
const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Current time as seconds since the Unix epoch.
/// A clock set before 1970 reads as the epoch itself.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Convert a Unix timestamp to an ISO 8601 datetime string for SQLite.
pub fn to_sqlite_datetime(timestamp: u64) -> String {
    let (year, month, day, hours, minutes, seconds) = split(timestamp);
    format!(
        "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
        year, month, day, hours, minutes, seconds
    )
}

/// Format a Unix timestamp as an IMF-fixdate, the form used by the
/// `Expires` cookie attribute (e.g. `Sun, 06 Nov 1994 08:49:37 GMT`).
pub fn to_http_date(timestamp: u64) -> String {
    let (year, month, day, hours, minutes, seconds) = split(timestamp);
    // 1970-01-01 was a Thursday.
    let weekday = WEEKDAYS[((timestamp / 86400 + 4) % 7) as usize];
    format!(
        "{}, {:02} {} {:04} {:02}:{:02}:{:02} GMT",
        weekday,
        day,
        MONTHS[(month - 1) as usize],
        year,
        hours,
        minutes,
        seconds
    )
}

fn split(timestamp: u64) -> (i32, u32, u32, u64, u64, u64) {
    let days_since_epoch = timestamp / 86400;
    let time_of_day = timestamp % 86400;
    let (year, month, day) = days_to_ymd(days_since_epoch as i64);
    (
        year,
        month,
        day,
        time_of_day / 3600,
        (time_of_day % 3600) / 60,
        time_of_day % 60,
    )
}

/// Convert days since Unix epoch to year, month, day.
fn days_to_ymd(days: i64) -> (i32, u32, u32) {
    // Algorithm from http://howardhinnant.github.io/date_algorithms.html
    let z = days + 719468;
    let era = if z >= 0 { z } else { z - 146096 } / 146097;
    let doe = (z - era * 146097) as u32;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    let y = if m <= 2 { y + 1 } else { y };
    (y as i32, m, d)
}
