//! Date normalization for statement cells.
//!
//! Spreadsheet serials count days from 1899-12-30, which bakes in the
//! phantom 1900-02-29 of the common spreadsheet formats: serial 60 is
//! 1900-02-28 here, and every serial from 61 on lines up with what the
//! spreadsheet displays.

use chrono::{Datelike, Days, NaiveDate};

use crate::model::{Anomaly, CellValue};

/// Dates more than this many years past the run date are flagged.
pub const SUSPICIOUS_YEAR_HORIZON: i32 = 10;

/// Largest serial a spreadsheet can hold (9999-12-31).
const MAX_SERIAL: f64 = 2_958_465.0;

const DAY_FIRST_FORMATS: &[&str] = &["%d.%m.%Y", "%d/%m/%Y", "%d-%m-%Y"];
const YEAR_FIRST_FORMATS: &[&str] = &["%Y-%m-%d", "%Y.%m.%d", "%Y/%m/%d"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedDate {
    pub sort_key: NaiveDate,
    pub display: String,
    pub anomaly: Option<Anomaly>,
}

pub fn serial_epoch() -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(1899, 12, 30)
}

/// Convert a spreadsheet day serial; the time-of-day fraction is dropped.
pub fn serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 0.0 || serial > MAX_SERIAL {
        return None;
    }
    serial_epoch()?.checked_add_days(Days::new(serial.floor() as u64))
}

pub fn date_to_serial(date: NaiveDate) -> Option<i64> {
    Some((date - serial_epoch()?).num_days())
}

/// `DD.MM.YYYY`
pub fn format_display(date: NaiveDate) -> String {
    date.format("%d.%m.%Y").to_string()
}

/// Strict parse: `None` for anything unreadable.
pub fn parse_date(cell: &CellValue) -> Option<NaiveDate> {
    match cell {
        CellValue::Number(n) => serial_to_date(*n),
        CellValue::Text(s) => parse_date_text(s),
        CellValue::Empty => None,
    }
}

/// Parse day-first (`31.03.2024`, `31/03/2024`), ISO (`2024-03-31`, with
/// or without a trailing time part) or a serial written as text.
pub fn parse_date_text(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(serial) = trimmed.parse::<f64>() {
        return serial_to_date(serial);
    }

    let date_part = trimmed
        .split(|c: char| c == 'T' || c.is_whitespace())
        .next()
        .unwrap_or(trimmed);

    let try_formats = |formats: &[&str], year_first: bool| {
        if !four_digit_year(date_part, year_first) {
            return None;
        }
        formats
            .iter()
            .find_map(|fmt| NaiveDate::parse_from_str(date_part, fmt).ok())
    };

    try_formats(DAY_FIRST_FORMATS, false).or_else(|| try_formats(YEAR_FIRST_FORMATS, true))
}

/// `%Y` takes any digit count; a two-digit year would land in the first
/// century, so only four-digit years are read.
fn four_digit_year(date_part: &str, year_first: bool) -> bool {
    let mut parts = date_part.split(|c: char| matches!(c, '.' | '/' | '-'));
    let year = if year_first { parts.next() } else { parts.nth(2) };
    year.is_some_and(|y| y.len() == 4 && y.bytes().all(|b| b.is_ascii_digit()))
}

/// Engine-facing normalization. Unreadable or empty cells fall back to
/// `today` and carry an anomaly; far-future years are kept but flagged.
pub fn normalize_date(cell: &CellValue, today: NaiveDate) -> NormalizedDate {
    if cell.is_blank() {
        return fallback(today, Anomaly::MissingDate);
    }

    let Some(date) = parse_date(cell) else {
        let raw = cell.to_string().trim().to_string();
        log::warn!("unparseable date '{raw}', using {today}");
        return fallback(today, Anomaly::UnparseableDate { raw });
    };

    let anomaly = if date.year() > today.year() + SUSPICIOUS_YEAR_HORIZON {
        log::warn!("suspicious date {date}: year is more than {SUSPICIOUS_YEAR_HORIZON} years ahead");
        Some(Anomaly::SuspiciousYear { year: date.year() })
    } else {
        None
    };

    NormalizedDate {
        sort_key: date,
        display: format_display(date),
        anomaly,
    }
}

fn fallback(today: NaiveDate, anomaly: Anomaly) -> NormalizedDate {
    NormalizedDate {
        sort_key: today,
        display: format_display(today),
        anomaly: Some(anomaly),
    }
}
