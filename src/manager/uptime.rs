//! Single-unit uptime summaries.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Shown when the runtime reports no creation time.
pub const UPTIME_UNAVAILABLE: &str = "N/A";

/// Shown for containers younger than one minute.
pub const UPTIME_UNDER_A_MINUTE: &str = "less than a minute";

const SECS_PER_MINUTE: u64 = 60;
const SECS_PER_HOUR: u64 = 60 * SECS_PER_MINUTE;
const SECS_PER_DAY: u64 = 24 * SECS_PER_HOUR;

/// Summarises the time elapsed since `created` (Unix seconds) using the
/// coarsest whole unit: days, then hours, then minutes.
///
/// The summary is deliberately lossy: 25 hours reads `1 days`, never
/// `1 days 1 hours`. A zero or pre-epoch timestamp reads `N/A`, and
/// timestamps in the future count as no time elapsed.
#[must_use]
pub fn format_uptime(created: i64, now: SystemTime) -> String {
    let Some(created_at) = created_at(created) else {
        return String::from(UPTIME_UNAVAILABLE);
    };
    let elapsed = now.duration_since(created_at).unwrap_or(Duration::ZERO);
    let secs = elapsed.as_secs();

    let days = secs.div_euclid(SECS_PER_DAY);
    if days > 0 {
        return format!("{days} days");
    }
    let hours = secs.div_euclid(SECS_PER_HOUR);
    if hours > 0 {
        return format!("{hours} hours");
    }
    let minutes = secs.div_euclid(SECS_PER_MINUTE);
    if minutes > 0 {
        return format!("{minutes} minutes");
    }
    String::from(UPTIME_UNDER_A_MINUTE)
}

fn created_at(created: i64) -> Option<SystemTime> {
    let secs = u64::try_from(created).ok().filter(|secs| *secs > 0)?;
    UNIX_EPOCH.checked_add(Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const NOW_SECS: i64 = 1_700_000_000;

    fn now() -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(1_700_000_000)
    }

    #[rstest]
    #[case::zero(0, "N/A")]
    #[case::negative(-5, "N/A")]
    #[case::fresh(NOW_SECS, "less than a minute")]
    #[case::just_under_a_minute(NOW_SECS - 59, "less than a minute")]
    #[case::just_over_a_minute(NOW_SECS - 61, "1 minutes")]
    #[case::minutes(NOW_SECS - 59 * 60, "59 minutes")]
    #[case::hours(NOW_SECS - 3 * 3600 - 120, "3 hours")]
    #[case::day_and_an_hour(NOW_SECS - 25 * 3600, "1 days")]
    #[case::weeks(NOW_SECS - 15 * 86_400, "15 days")]
    #[case::future(NOW_SECS + 600, "less than a minute")]
    fn classifies_into_coarsest_unit(#[case] created: i64, #[case] expected: &str) {
        assert_eq!(format_uptime(created, now()), expected);
    }
}
