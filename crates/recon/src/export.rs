//! Flat export of a report: one CSV row per matched, mismatched or missing
//! record. Statement columns are appended in their original order.

use std::io::Write;

use rust_decimal::Decimal;

use crate::error::ReconError;
use crate::model::{CanonicalTransaction, FieldDelta, MatchResult, ReconReport, Verdict};

const SIDE_COLUMNS: [&str; 8] = [
    "row", "date", "key", "currency", "debit", "credit", "total", "tax",
];

/// Header row for [`write_csv`].
pub fn export_headers(report: &ReconReport) -> Vec<String> {
    let mut headers = vec!["status".to_string(), "mismatched_fields".to_string()];
    for side in ["left", "right"] {
        headers.extend(SIDE_COLUMNS.iter().map(|c| format!("{side}_{c}")));
    }
    headers.push("deltas".into());
    headers.push("anomalies".into());
    headers.extend(passthrough_headers(report));
    headers
}

/// Statement column labels, taken from the first left record that has any.
fn passthrough_headers(report: &ReconReport) -> Vec<String> {
    report
        .matched
        .iter()
        .map(|p| &p.left)
        .chain(&report.left_only)
        .find(|r| !r.passthrough.is_empty())
        .map(|r| r.passthrough.iter().map(|(h, _)| h.clone()).collect())
        .unwrap_or_default()
}

pub fn write_csv<W: Write>(report: &ReconReport, writer: W) -> Result<(), ReconError> {
    let headers = export_headers(report);
    let passthrough = passthrough_headers(report);

    let mut out = csv::Writer::from_writer(writer);
    out.write_record(&headers)?;

    for row in report.rows() {
        let (left, right, deltas, mismatched) = match row {
            MatchResult::Matched(pair) => {
                let mismatched = match &pair.verdict {
                    Verdict::Exact => String::new(),
                    Verdict::AmountMismatch { fields } => fields
                        .iter()
                        .map(|f| f.to_string())
                        .collect::<Vec<_>>()
                        .join(";"),
                };
                (Some(&pair.left), Some(&pair.right), pair.deltas.as_slice(), mismatched)
            }
            MatchResult::LeftOnly(l) => (Some(l), None, &[][..], String::new()),
            MatchResult::RightOnly(r) => (None, Some(r), &[][..], String::new()),
        };

        let mut record = vec![row.status().to_string(), mismatched];
        record.extend(side_cells(left));
        record.extend(side_cells(right));
        record.push(format_deltas(deltas));
        record.push(format_anomalies(left, right));
        record.extend(passthrough.iter().map(|h| {
            left.and_then(|l| l.passthrough.iter().find(|(k, _)| k == h))
                .map(|(_, v)| v.clone())
                .unwrap_or_default()
        }));
        out.write_record(&record)?;
    }

    out.flush()?;
    Ok(())
}

fn side_cells(record: Option<&CanonicalTransaction>) -> Vec<String> {
    let Some(r) = record else {
        return vec![String::new(); SIDE_COLUMNS.len()];
    };
    vec![
        (r.source_index + 1).to_string(),
        r.display_date.clone(),
        r.key.clone().unwrap_or_default(),
        r.currency.clone(),
        fmt_amount(r.debit),
        fmt_amount(r.credit),
        fmt_amount(r.total_amount),
        fmt_amount(r.tax_amount),
    ]
}

fn fmt_amount(d: Decimal) -> String {
    d.normalize().to_string()
}

fn format_deltas(deltas: &[FieldDelta]) -> String {
    deltas
        .iter()
        .map(|d| format!("{}={}", d.field, fmt_amount(d.difference)))
        .collect::<Vec<_>>()
        .join(";")
}

fn format_anomalies(
    left: Option<&CanonicalTransaction>,
    right: Option<&CanonicalTransaction>,
) -> String {
    left.into_iter()
        .chain(right)
        .flat_map(|r| r.diagnostics.iter().map(|a| a.to_string()))
        .collect::<Vec<_>>()
        .join("; ")
}
