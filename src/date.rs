//! Portal date normalization.
//!
//! The portal prints Brazil civil time (`DD/MM/YYYY` or `DD/MM/YYYY HH:mm`)
//! without any offset. Values are always read as fixed UTC-03:00, whatever
//! the host timezone is, and converted to UTC.

use chrono::{DateTime, FixedOffset, NaiveDate, SecondsFormat, TimeZone, Utc};
use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

const BRAZIL_OFFSET_SECS: i32 = 3 * 3600;

/// A date is followed by whitespace or the end of the text
static PORTAL_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,2})/(\d{1,2})/(\d{4})(?:\s+(\d{1,2}):(\d{2})\b|\s|$)")
        .expect("portal date pattern is valid")
});

/// Fixed UTC-03:00
pub fn brazil_offset() -> FixedOffset {
    FixedOffset::west_opt(BRAZIL_OFFSET_SECS).expect("UTC-03:00 is a valid offset")
}

/// `D/M/YYYY` at the start, followed by whitespace or nothing. Anything
/// shaped like this is something [`parse_portal`] reads, calendar range aside.
pub fn is_date_shaped(text: &str) -> bool {
    PORTAL_DATE.is_match(text.trim())
}

/// Parse a portal date (`D/M/YYYY` with optional ` H:MM`) into UTC.
///
/// Trailing text after the recognized prefix is ignored. Returns `None` when
/// the text does not match or the calendar fields are out of range.
pub fn parse_portal(text: &str) -> Option<DateTime<Utc>> {
    let caps = PORTAL_DATE.captures(text.trim())?;
    let field = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u32>().ok());

    let day = field(1)?;
    let month = field(2)?;
    let year: i32 = caps.get(3)?.as_str().parse().ok()?;
    let (hour, minute) = match (field(4), field(5)) {
        (Some(h), Some(m)) => (h, m),
        _ => (0, 0),
    };

    let local = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, 0)?;
    brazil_offset()
        .from_local_datetime(&local)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Render a UTC instant the way the portal displays it (`DD/MM/YYYY HH:mm`)
pub fn format_portal(instant: &DateTime<Utc>) -> String {
    instant
        .with_timezone(&brazil_offset())
        .format("%d/%m/%Y %H:%M")
        .to_string()
}

/// RFC 3339 with second precision and a `Z` suffix
pub fn to_iso(instant: &DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Normalize a stored date field: parseable portal dates become ISO UTC,
/// anything else (including values that are already ISO) is kept verbatim.
pub fn normalize_field(raw: &str) -> String {
    match parse_portal(raw) {
        Some(instant) => to_iso(&instant),
        None => raw.to_string(),
    }
}

/// A timestamp as shown on the page, plus its UTC reading when it parsed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortalTimestamp {
    pub raw: String,
    pub utc: Option<DateTime<Utc>>,
}

impl PortalTimestamp {
    pub fn parse(raw: &str) -> Self {
        Self {
            raw: raw.to_string(),
            utc: parse_portal(raw),
        }
    }

    pub fn iso(&self) -> Option<String> {
        self.utc.as_ref().map(to_iso)
    }

    /// ISO UTC when parsed, otherwise the raw text. `None` if both are empty.
    pub fn iso_or_raw(&self) -> Option<String> {
        match self.iso() {
            Some(iso) => Some(iso),
            None if self.raw.trim().is_empty() => None,
            None => Some(self.raw.clone()),
        }
    }
}
