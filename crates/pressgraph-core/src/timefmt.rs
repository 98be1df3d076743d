use chrono::{DateTime, FixedOffset};

use crate::Result;

/// RFC-2822 style timestamp as it appears in feed `pubDate` fields, with the
/// weekday token already stripped. Feeds routinely carry weekday names that do
/// not match the date, so the weekday is ignored rather than cross-checked.
const PUB_DATE_FORMAT: &str = "%d %b %Y %H:%M:%S %z";
const LOCAL_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// All published times are presented in UTC+8 regardless of source timezone.
fn local_offset() -> FixedOffset {
    FixedOffset::east_opt(8 * 3600).expect("UTC+8 is a valid offset")
}

pub fn parse_pub_date(raw: &str) -> Result<DateTime<FixedOffset>> {
    let raw = raw.trim();
    let datepart = match raw.split_once(',') {
        Some((_, rest)) => rest.trim_start(),
        None => raw,
    };
    Ok(DateTime::parse_from_str(datepart, PUB_DATE_FORMAT)?)
}

pub fn to_local_string(dt: DateTime<FixedOffset>) -> String {
    dt.with_timezone(&local_offset()).format(LOCAL_FORMAT).to_string()
}

/// Parse a feed timestamp and format it as local (UTC+8) `YYYY-MM-DD HH:MM:SS`.
pub fn normalize_pub_date(raw: &str) -> Result<String> {
    Ok(to_local_string(parse_pub_date(raw)?))
}
