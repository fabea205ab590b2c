//! Week-bucketed release versions.
//!
//! A release version looks like `v<ISO year><ISO week>.<minor>.<patch>`, for
//! example `v202602.1.0`. The first release of an ISO week is `.0.0`; every
//! further release within the same week bumps the minor component.

use chrono::{DateTime, Datelike, Utc};

/// Release prefix for the ISO week containing `now`, e.g. `v202602`.
pub fn week_prefix(now: DateTime<Utc>) -> String {
    let week = now.iso_week();
    format!("v{}{:02}", week.year(), week.week())
}

/// Compute the release version that follows `current` at time `now`.
///
/// Never fails: a `current` value from another week, or one that does not
/// follow the release pattern at all, starts the week over at `.0.0`. A minor
/// component that cannot be read as a number counts as `0`.
///
/// # Example
/// ```ignore
/// // now falls in ISO week 2026-W02
/// assert_eq!(next_release_version("v202602.1.0", now), "v202602.2.0");
/// assert_eq!(next_release_version("v202601.5.0", now), "v202602.0.0");
/// ```
pub fn next_release_version(current: &str, now: DateTime<Utc>) -> String {
    let prefix = week_prefix(now);

    let same_week = current
        .strip_prefix(prefix.as_str())
        .and_then(|rest| rest.strip_prefix('.'));

    match same_week {
        Some(remainder) => {
            let minor = remainder.split('.').next().map(leading_number).unwrap_or(0);
            format!("{}.{}.0", prefix, minor.saturating_add(1))
        }
        None => format!("{}.0.0", prefix),
    }
}

/// Read the decimal digits at the start of `s` (after an optional `+`),
/// `0` when there are none.
fn leading_number(s: &str) -> u64 {
    let s = s.strip_prefix('+').unwrap_or(s);
    let end = s
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| i)
        .unwrap_or(s.len());
    s[..end].parse().unwrap_or(0)
}
