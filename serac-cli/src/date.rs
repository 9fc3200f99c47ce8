//! Parses the `--at=DATE` argument forms from §6: integer epoch seconds,
//! `YYYY-MM-DD` (local midnight), `YYYY-MM-DD HH:MM:SS`, and
//! `YYYY-MM-DDTHH:MM:SS`. Anything else is a user error (exit 1).

use serac_core::error::{Result, SeracError};
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime, UtcOffset};

pub fn parse_at(raw: &str) -> Result<i64> {
    if let Ok(epoch) = raw.parse::<i64>() {
        return Ok(epoch);
    }

    let date_only = format_description!("[year]-[month]-[day]");
    let date_space_time = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    let date_t_time = format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");

    let local = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);

    if let Ok(date) = time::Date::parse(raw, &date_only) {
        let dt = PrimitiveDateTime::new(date, time::Time::MIDNIGHT);
        return Ok(dt.assume_offset(local).unix_timestamp());
    }
    if let Ok(dt) = PrimitiveDateTime::parse(raw, &date_space_time) {
        return Ok(dt.assume_offset(local).unix_timestamp());
    }
    if let Ok(dt) = PrimitiveDateTime::parse(raw, &date_t_time) {
        return Ok(dt.assume_offset(local).unix_timestamp());
    }

    Err(SeracError::Config(format!(
        "unrecognized date '{raw}'; expected epoch seconds, YYYY-MM-DD, YYYY-MM-DD HH:MM:SS, or YYYY-MM-DDTHH:MM:SS"
    )))
}

pub fn now_ts() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}
