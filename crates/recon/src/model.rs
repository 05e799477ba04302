use std::fmt;
use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::Role;

// ---------------------------------------------------------------------------
// Raw input
// ---------------------------------------------------------------------------

/// An untyped spreadsheet / CSV cell as handed over by the reader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Number(f64),
    Text(String),
    Empty,
}

static EMPTY_CELL: CellValue = CellValue::Empty;

impl CellValue {
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(s) => s.trim().is_empty(),
            Self::Number(_) => false,
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        if s.is_empty() {
            Self::Empty
        } else {
            Self::Text(s.to_string())
        }
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s}"),
            Self::Empty => Ok(()),
        }
    }
}

/// One input row: cells in original column order plus the shared header labels.
#[derive(Debug, Clone)]
pub struct RawRow {
    pub headers: Arc<[String]>,
    pub cells: Vec<CellValue>,
}

impl RawRow {
    pub fn new(headers: Arc<[String]>, cells: Vec<CellValue>) -> Self {
        Self { headers, cells }
    }

    /// Cell under `label`. `None` when the header does not exist; a short
    /// row reads as empty for headers past its end.
    pub fn get(&self, label: &str) -> Option<&CellValue> {
        let idx = self.headers.iter().position(|h| h.trim() == label.trim())?;
        Some(self.cells.get(idx).unwrap_or(&EMPTY_CELL))
    }

    /// (header, display text) pairs in original column order.
    pub fn fields(&self) -> Vec<(String, String)> {
        self.headers
            .iter()
            .enumerate()
            .map(|(i, h)| {
                let text = self.cells.get(i).map(|c| c.to_string()).unwrap_or_default();
                (h.clone(), text)
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Canonical record
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmountField {
    Debit,
    Credit,
    Total,
    Tax,
}

impl fmt::Display for AmountField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Debit => write!(f, "debit"),
            Self::Credit => write!(f, "credit"),
            Self::Total => write!(f, "total"),
            Self::Tax => write!(f, "tax"),
        }
    }
}

/// Data-quality problem absorbed during extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Anomaly {
    /// Amount cell had text that could not be read as a number; value defaulted to zero.
    UnparseableAmount { field: AmountField, raw: String },
    /// Date cell could not be read; date defaulted to the run date.
    UnparseableDate { raw: String },
    /// Date cell was empty; date defaulted to the run date.
    MissingDate,
    /// Date parsed, but lies implausibly far in the future.
    SuspiciousYear { year: i32 },
    /// A mapped header is absent from the row.
    MissingColumn { role: Role, column: String },
}

impl fmt::Display for Anomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnparseableAmount { field, raw } => write!(f, "unparseable {field} '{raw}'"),
            Self::UnparseableDate { raw } => write!(f, "unparseable date '{raw}'"),
            Self::MissingDate => write!(f, "missing date"),
            Self::SuspiciousYear { year } => write!(f, "suspicious year {year}"),
            Self::MissingColumn { role, column } => {
                write!(f, "missing column '{column}' for {role}")
            }
        }
    }
}

/// A statement row or ledger entry after normalization. Never mutated after
/// extraction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalTransaction {
    /// Position of the source row in its input sequence.
    pub source_index: usize,
    pub date: NaiveDate,
    pub display_date: String,
    pub debit: Decimal,
    pub credit: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub total_amount: Decimal,
    pub tax_amount: Decimal,
    pub currency: String,
    /// Every source column, in original order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub passthrough: Vec<(String, String)>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Anomaly>,
}

impl CanonicalTransaction {
    /// Zeroed record dated `date`; extraction fills in the rest.
    pub fn new(source_index: usize, date: NaiveDate, currency: impl Into<String>) -> Self {
        Self {
            source_index,
            date,
            display_date: crate::date::format_display(date),
            debit: Decimal::ZERO,
            credit: Decimal::ZERO,
            key: None,
            total_amount: Decimal::ZERO,
            tax_amount: Decimal::ZERO,
            currency: currency.into(),
            passthrough: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    pub fn amount(&self, field: AmountField) -> Decimal {
        match field {
            AmountField::Debit => self.debit,
            AmountField::Credit => self.credit,
            AmountField::Total => self.total_amount,
            AmountField::Tax => self.tax_amount,
        }
    }

    /// True when every amount is zero. Such ledger rows are placeholders and
    /// never take part in matching.
    pub fn is_zero(&self) -> bool {
        self.debit.is_zero()
            && self.credit.is_zero()
            && self.total_amount.is_zero()
            && self.tax_amount.is_zero()
    }

    /// Whether `field` is zero because its source text could not be parsed,
    /// as opposed to being genuinely zero.
    pub fn amount_defaulted(&self, field: AmountField) -> bool {
        self.diagnostics
            .iter()
            .any(|a| matches!(a, Anomaly::UnparseableAmount { field: f, .. } if *f == field))
    }

    pub fn has_anomalies(&self) -> bool {
        !self.diagnostics.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Match output
// ---------------------------------------------------------------------------

/// Difference on one compared amount. `field` names the left-hand side;
/// `right` is whichever right field the strategy compares it with.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDelta {
    pub field: AmountField,
    pub left: Decimal,
    pub right: Decimal,
    pub difference: Decimal,
}

impl FieldDelta {
    /// The difference saturates at the `Decimal` range.
    pub fn new(field: AmountField, left: Decimal, right: Decimal) -> Self {
        Self {
            field,
            left,
            right,
            difference: left.saturating_sub(right),
        }
    }

    pub fn exceeds(&self, tolerance: Decimal) -> bool {
        self.difference.abs() > tolerance
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Verdict {
    Exact,
    AmountMismatch { fields: Vec<AmountField> },
}

impl Verdict {
    pub fn is_exact(&self) -> bool {
        matches!(self, Self::Exact)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchedPair {
    pub left: CanonicalTransaction,
    pub right: CanonicalTransaction,
    pub deltas: Vec<FieldDelta>,
    pub verdict: Verdict,
}

/// One report line, borrowed from a [`ReconReport`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MatchResult<'a> {
    Matched(&'a MatchedPair),
    LeftOnly(&'a CanonicalTransaction),
    RightOnly(&'a CanonicalTransaction),
}

impl MatchResult<'_> {
    pub fn status(&self) -> &'static str {
        match self {
            Self::Matched(pair) if pair.verdict.is_exact() => "matched",
            Self::Matched(_) => "amount_mismatch",
            Self::LeftOnly(_) => "left_only",
            Self::RightOnly(_) => "right_only",
        }
    }
}

// ---------------------------------------------------------------------------
// Summary + Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconSummary {
    /// Pairs within tolerance on every compared field.
    pub matched_count: usize,
    /// Pairs consumed on key but failing an amount check.
    pub mismatch_count: usize,
    pub left_only_count: usize,
    pub right_only_count: usize,
    /// Zero-amount right rows removed before scanning.
    pub dropped_right_count: usize,
    /// Records in the report carrying at least one diagnostic.
    pub anomaly_count: usize,
    /// Display-only total over the left side.
    pub total_amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconMeta {
    pub config_name: String,
    pub strategy: String,
    pub policy: String,
    pub tolerance: Decimal,
    pub engine_version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconReport {
    pub meta: ReconMeta,
    pub summary: ReconSummary,
    pub matched: Vec<MatchedPair>,
    pub left_only: Vec<CanonicalTransaction>,
    pub right_only: Vec<CanonicalTransaction>,
}

impl ReconReport {
    /// Report lines for display: left-side results in original statement
    /// order, then unmatched right records in ledger order.
    pub fn rows(&self) -> Vec<MatchResult<'_>> {
        let mut left_side: Vec<(usize, MatchResult<'_>)> = self
            .matched
            .iter()
            .map(|p| (p.left.source_index, MatchResult::Matched(p)))
            .chain(self.left_only.iter().map(|l| (l.source_index, MatchResult::LeftOnly(l))))
            .collect();
        left_side.sort_by_key(|(idx, _)| *idx);

        let mut rows: Vec<MatchResult<'_>> = left_side.into_iter().map(|(_, r)| r).collect();
        rows.extend(self.right_only.iter().map(MatchResult::RightOnly));
        rows
    }

    /// No mismatches and nothing missing on either side.
    pub fn is_clean(&self) -> bool {
        let s = &self.summary;
        s.mismatch_count == 0 && s.left_only_count == 0 && s.right_only_count == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(labels: &[&str]) -> Arc<[String]> {
        labels.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn raw_row_lookup_by_label() {
        let row = RawRow::new(
            headers(&["Tarih", "Borç", "Alacak"]),
            vec!["01.03.2024".into(), "100,00".into()],
        );
        assert_eq!(row.get("Borç"), Some(&CellValue::Text("100,00".into())));
        // Short row: header exists, cell missing.
        assert_eq!(row.get("Alacak"), Some(&CellValue::Empty));
        assert_eq!(row.get("Açıklama"), None);
    }

    #[test]
    fn raw_row_fields_keep_column_order() {
        let row = RawRow::new(headers(&["b", "a"]), vec![CellValue::Number(2.5), "x".into()]);
        assert_eq!(
            row.fields(),
            vec![("b".to_string(), "2.5".to_string()), ("a".to_string(), "x".to_string())]
        );
    }

    #[test]
    fn defaulted_amount_is_distinguishable() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let mut tx = CanonicalTransaction::new(0, date, "TRY");
        assert!(tx.is_zero());
        assert!(!tx.amount_defaulted(AmountField::Debit));

        tx.diagnostics.push(Anomaly::UnparseableAmount {
            field: AmountField::Debit,
            raw: "n/a".into(),
        });
        assert!(tx.amount_defaulted(AmountField::Debit));
        assert!(!tx.amount_defaulted(AmountField::Credit));
    }

    #[test]
    fn delta_tolerance_is_non_strict() {
        let d = FieldDelta::new(AmountField::Total, Decimal::new(10100, 2), Decimal::new(10000, 2));
        assert_eq!(d.difference, Decimal::ONE);
        assert!(!d.exceeds(Decimal::ONE));
        assert!(d.exceeds(Decimal::new(99, 2)));
    }
}
