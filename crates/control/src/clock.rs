use chrono::{DateTime, TimeZone};
use shared::error::ControlError;

/// Decides whether an item's end-of-day boundary has passed.
///
/// `end_time` is a wall-clock `HH:MM` string; the boundary is today in the
/// caller's zone at that hour and minute, zero seconds. Windows that cross
/// midnight are not handled: an end time numerically before the start time is
/// still compared against today, a known limitation of the schedule format.
pub fn has_ended<Z: TimeZone>(end_time: &str, now: &DateTime<Z>) -> Result<bool, ControlError> {
    let (hours, minutes) = parse_end_time(end_time)?;
    let boundary = now
        .date_naive()
        .and_hms_opt(hours, minutes, 0)
        .ok_or_else(|| ControlError::InvalidTimeFormat(end_time.to_string()))?;
    Ok(now.naive_local() >= boundary)
}

fn parse_end_time(end_time: &str) -> Result<(u32, u32), ControlError> {
    let invalid = || ControlError::InvalidTimeFormat(end_time.to_string());

    let (hours, minutes) = end_time.split_once(':').ok_or_else(invalid)?;
    if minutes.contains(':') {
        return Err(invalid());
    }
    let hours: u32 = hours.trim().parse().map_err(|_| invalid())?;
    let minutes: u32 = minutes.trim().parse().map_err(|_| invalid())?;
    if hours > 23 || minutes > 59 {
        return Err(invalid());
    }
    Ok((hours, minutes))
}
