//! Locale-tolerant amount parsing.
//!
//! Statements arrive with either `1.234,56` or `1,234.56` formatting. Both
//! separators are folded to a dot first, then the groups are re-joined:
//! - one dot, ≤2 fractional digits → decimal separator (`1234.5`, `12,50`)
//! - one dot, exactly 3 fractional digits → thousands separator (`1.234`)
//! - several dots → thousands separators around the final decimal group
//!   (`1.234.567,89` → `1234567.89`)

use std::str::FromStr;

use rust_decimal::Decimal;

use crate::model::CellValue;

/// Engine-facing result: always a value, plus the raw text when parsing failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedAmount {
    pub value: Decimal,
    pub failed_raw: Option<String>,
}

impl NormalizedAmount {
    fn ok(value: Decimal) -> Self {
        Self { value, failed_raw: None }
    }

    fn failed(raw: impl Into<String>) -> Self {
        Self {
            value: Decimal::ZERO,
            failed_raw: Some(raw.into()),
        }
    }
}

/// Normalize a cell to a decimal. Blank cells are a genuine zero; anything
/// unreadable is zero with `failed_raw` set.
pub fn normalize_amount(cell: &CellValue) -> NormalizedAmount {
    match cell {
        CellValue::Empty => NormalizedAmount::ok(Decimal::ZERO),
        CellValue::Number(n) => match decimal_from_f64(*n) {
            Some(v) => NormalizedAmount::ok(v),
            None => NormalizedAmount::failed(n.to_string()),
        },
        CellValue::Text(s) if s.trim().is_empty() => NormalizedAmount::ok(Decimal::ZERO),
        CellValue::Text(s) => match parse_locale_decimal(s) {
            Some(v) => NormalizedAmount::ok(v),
            None => NormalizedAmount::failed(s.trim()),
        },
    }
}

/// Convert a spreadsheet float via its shortest round-trip text, so `0.1`
/// stays `0.1` instead of picking up binary noise.
pub fn decimal_from_f64(n: f64) -> Option<Decimal> {
    if !n.is_finite() {
        return None;
    }
    Decimal::from_str(&n.to_string()).ok()
}

/// Parse a locale-formatted amount:
/// - Strip whitespace (including NBSP), apostrophes and currency symbols
/// - `(123,45)`, `-123,45` and `123,45-` are negative
/// - Returns None if anything other than digits and separators remains
pub fn parse_locale_decimal(raw: &str) -> Option<Decimal> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let (mut negative, inner) =
        if trimmed.len() >= 2 && trimmed.starts_with('(') && trimmed.ends_with(')') {
            (true, &trimmed[1..trimmed.len() - 1])
        } else {
            (false, trimmed)
        };

    let cleaned: String = inner
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\'' && !is_currency_symbol(*c))
        .collect();

    let unsigned = if let Some(rest) = cleaned.strip_prefix('-').or_else(|| cleaned.strip_suffix('-')) {
        if negative {
            return None;
        }
        negative = true;
        rest
    } else if let Some(rest) = cleaned.strip_prefix('+') {
        rest
    } else {
        cleaned.as_str()
    };

    if unsigned.is_empty() || !unsigned.chars().all(|c| c.is_ascii_digit() || c == '.' || c == ',') {
        return None;
    }

    let canonical = join_groups(&unsigned.replace(',', "."))?;
    let value = Decimal::from_str(&canonical).ok()?;
    Some(if negative { -value } else { value })
}

fn join_groups(dotted: &str) -> Option<String> {
    let groups: Vec<&str> = dotted.split('.').collect();
    let (whole, frac) = match groups.as_slice() {
        [whole] => (whole.to_string(), ""),
        // A zero or empty whole part cannot lead a thousands group.
        [whole, frac] if frac.len() == 3 && whole.bytes().any(|b| b != b'0') => {
            (format!("{whole}{frac}"), "")
        }
        [whole, frac] => (whole.to_string(), *frac),
        [init @ .., last] => (init.concat(), *last),
        [] => return None,
    };

    if whole.is_empty() && frac.is_empty() {
        return None;
    }
    let whole = if whole.is_empty() { "0".to_string() } else { whole };
    if frac.is_empty() {
        Some(whole)
    } else {
        Some(format!("{whole}.{frac}"))
    }
}

fn is_currency_symbol(c: char) -> bool {
    matches!(c, '$' | '€' | '£' | '₺' | '¥')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn comma_decimal_dot_thousands() {
        assert_eq!(parse_locale_decimal("1.234,56"), Some(d("1234.56")));
        assert_eq!(parse_locale_decimal("12,5"), Some(d("12.5")));
        assert_eq!(parse_locale_decimal("1.234.567,89"), Some(d("1234567.89")));
    }

    #[test]
    fn dot_decimal_comma_thousands() {
        assert_eq!(parse_locale_decimal("1234.56"), Some(d("1234.56")));
        assert_eq!(parse_locale_decimal("1,234.56"), Some(d("1234.56")));
    }

    #[test]
    fn three_digit_group_is_thousands() {
        assert_eq!(parse_locale_decimal("1.234"), Some(d("1234")));
        assert_eq!(parse_locale_decimal("1,234"), Some(d("1234")));
    }

    #[test]
    fn zero_whole_part_keeps_three_decimals() {
        assert_eq!(parse_locale_decimal("0,125"), Some(d("0.125")));
        assert_eq!(parse_locale_decimal("0.125"), Some(d("0.125")));
        assert_eq!(parse_locale_decimal(",125"), Some(d("0.125")));
        assert_eq!(parse_locale_decimal("(0,125)"), Some(d("-0.125")));
    }

    #[test]
    fn negatives() {
        assert_eq!(parse_locale_decimal("-50"), Some(d("-50")));
        assert_eq!(parse_locale_decimal("(1.234,56)"), Some(d("-1234.56")));
        assert_eq!(parse_locale_decimal("75,00-"), Some(d("-75.00")));
        assert_eq!(parse_locale_decimal("(-5)"), None);
    }

    #[test]
    fn symbols_and_whitespace() {
        assert_eq!(parse_locale_decimal("  ₺ 1.250,00 "), Some(d("1250.00")));
        assert_eq!(parse_locale_decimal("$685.00"), Some(d("685.00")));
        assert_eq!(parse_locale_decimal("1\u{a0}250,75"), Some(d("1250.75")));
    }

    #[test]
    fn edge_separators() {
        assert_eq!(parse_locale_decimal(",5"), Some(d("0.5")));
        assert_eq!(parse_locale_decimal("12."), Some(d("12")));
        assert_eq!(parse_locale_decimal("."), None);
    }

    #[test]
    fn non_numeric_is_none() {
        assert_eq!(parse_locale_decimal(""), None);
        assert_eq!(parse_locale_decimal("abc"), None);
        assert_eq!(parse_locale_decimal("12abc34"), None);
        assert_eq!(parse_locale_decimal("N/A"), None);
    }

    #[test]
    fn normalize_defaults_to_zero() {
        assert_eq!(normalize_amount(&CellValue::Empty), NormalizedAmount::ok(Decimal::ZERO));
        assert_eq!(normalize_amount(&"".into()), NormalizedAmount::ok(Decimal::ZERO));

        let bad = normalize_amount(&"tutar yok".into());
        assert_eq!(bad.value, Decimal::ZERO);
        assert_eq!(bad.failed_raw.as_deref(), Some("tutar yok"));
    }

    #[test]
    fn normalize_numeric_cell() {
        assert_eq!(normalize_amount(&CellValue::Number(1234.56)).value, d("1234.56"));
        assert_eq!(normalize_amount(&CellValue::Number(0.1)).value, d("0.1"));
        assert!(normalize_amount(&CellValue::Number(f64::NAN)).failed_raw.is_some());
    }
}
