use chrono::{DateTime, Local, NaiveTime, TimeZone};
use std::time::Duration;

/// Parses `HH:MM`.
pub fn parse_daily_at(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M").ok()
}

/// Next occurrence of `at` strictly after `now`, in `now`'s timezone.
///
/// Nonexistent local times (DST gaps) move on to the following day.
pub fn next_daily_occurrence<Tz: TimeZone>(now: &DateTime<Tz>, at: NaiveTime) -> DateTime<Tz> {
    let tz = now.timezone();
    let mut date = now.date_naive();
    loop {
        if let Some(candidate) = tz.from_local_datetime(&date.and_time(at)).earliest() {
            if candidate > *now {
                return candidate;
            }
        }
        match date.succ_opt() {
            Some(next) => date = next,
            None => return now.clone(),
        }
    }
}

/// Time to sleep until the next local `at`.
pub fn until_next_daily(at: NaiveTime) -> Duration {
    let now = Local::now();
    let next = next_daily_occurrence(&now, at);
    (next - now).to_std().unwrap_or(Duration::ZERO)
}
