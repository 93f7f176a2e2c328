//! UTC timestamp helpers shared by the backends.

use chrono::{DateTime, SecondsFormat, Utc};

/// Current time as an RFC 3339 UTC string with a `Z` suffix.
pub(crate) fn utc_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Midnight UTC of the current day, formatted like [`utc_now`]. Timestamps
/// in this format compare lexicographically, so backends can use string
/// comparison for "updated today" cutoffs.
pub(crate) fn utc_today_start() -> String {
    let now = Utc::now();
    now.date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|midnight| {
            DateTime::<Utc>::from_naive_utc_and_offset(midnight, Utc)
                .to_rfc3339_opts(SecondsFormat::Micros, true)
        })
        .unwrap_or_else(utc_now)
}
