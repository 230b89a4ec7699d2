use serde::Serializer;
use time::{macros::format_description, Date};

/// Parses a strict `YYYY-MM-DD` calendar date.
pub fn parse_iso_date(raw: &str) -> Option<Date> {
    Date::parse(raw.trim(), format_description!("[year]-[month]-[day]")).ok()
}

pub fn format_iso_date(date: Date) -> String {
    date.format(format_description!("[year]-[month]-[day]"))
        .unwrap_or_else(|_| date.to_string())
}

/// `#[serde(serialize_with = "iso_date")]` for `time::Date` fields.
pub fn iso_date<S: Serializer>(date: &Date, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_iso_date(*date))
}
