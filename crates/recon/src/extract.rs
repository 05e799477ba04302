//! Boundary between untyped rows and the matching core.
//!
//! Everything past this module works on [`CanonicalTransaction`]; raw cells
//! never reach the engine.

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::config::{ColumnMapping, Role};
use crate::date::normalize_date;
use crate::error::ReconError;
use crate::model::{AmountField, Anomaly, CanonicalTransaction, CellValue, RawRow};
use crate::numeric::normalize_amount;

/// Run-wide inputs to extraction. `today` is the fallback for unreadable
/// dates; pass it explicitly so repeated runs stay identical.
#[derive(Debug, Clone)]
pub struct ExtractContext {
    pub base_currency: String,
    pub today: NaiveDate,
}

impl ExtractContext {
    pub fn new(base_currency: impl AsRef<str>, today: NaiveDate) -> Self {
        Self {
            base_currency: base_currency.as_ref().trim().to_uppercase(),
            today,
        }
    }

    /// Context dated with the local calendar day.
    pub fn today(base_currency: impl AsRef<str>) -> Self {
        Self::new(base_currency, chrono::Local::now().date_naive())
    }
}

/// Map one row onto a canonical record. Missing columns and unreadable
/// cells degrade to defaults and are recorded as diagnostics.
pub fn extract_record(
    source_index: usize,
    row: &RawRow,
    mapping: &ColumnMapping,
    ctx: &ExtractContext,
) -> CanonicalTransaction {
    let mut diagnostics = Vec::new();

    let date = match lookup(row, mapping, Role::Date, &mut diagnostics) {
        Some(cell) => normalize_date(cell, ctx.today),
        None => normalize_date(&CellValue::Empty, ctx.today),
    };
    if let Some(anomaly) = date.anomaly {
        let column_missing = diagnostics
            .iter()
            .any(|a| matches!(a, Anomaly::MissingColumn { role: Role::Date, .. }));
        if !(column_missing && anomaly == Anomaly::MissingDate) {
            diagnostics.push(anomaly);
        }
    }

    let debit = amount(row, mapping, Role::Debit, AmountField::Debit, &mut diagnostics);
    let credit = amount(row, mapping, Role::Credit, AmountField::Credit, &mut diagnostics);
    let total_amount = amount(row, mapping, Role::TotalAmount, AmountField::Total, &mut diagnostics);
    let tax_amount = amount(row, mapping, Role::TaxAmount, AmountField::Tax, &mut diagnostics);

    let key = lookup(row, mapping, Role::Key, &mut diagnostics)
        .map(|cell| cell.to_string().trim().to_string())
        .filter(|k| !k.is_empty());

    let currency = lookup(row, mapping, Role::Currency, &mut diagnostics)
        .map(|cell| cell.to_string().trim().to_uppercase())
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| ctx.base_currency.clone());

    CanonicalTransaction {
        source_index,
        date: date.sort_key,
        display_date: date.display,
        debit,
        credit,
        key,
        total_amount,
        tax_amount,
        currency,
        passthrough: row.fields(),
        diagnostics,
    }
}

/// Extract every row, preserving input order.
pub fn extract_all(
    rows: &[RawRow],
    mapping: &ColumnMapping,
    ctx: &ExtractContext,
) -> Vec<CanonicalTransaction> {
    let records: Vec<CanonicalTransaction> = rows
        .iter()
        .enumerate()
        .map(|(i, row)| extract_record(i, row, mapping, ctx))
        .collect();

    let flagged = records.iter().filter(|r| r.has_anomalies()).count();
    if flagged > 0 {
        log::warn!("{flagged} of {} statement rows carry data-quality anomalies", records.len());
    }
    log::debug!("extracted {} statement rows", records.len());
    records
}

/// Mapped cell for `role`. Unmapped roles are silently absent; a mapped
/// header the row lacks is recorded.
fn lookup<'r>(
    row: &'r RawRow,
    mapping: &ColumnMapping,
    role: Role,
    diagnostics: &mut Vec<Anomaly>,
) -> Option<&'r CellValue> {
    let column = mapping.column(role)?;
    let cell = row.get(column);
    if cell.is_none() {
        diagnostics.push(Anomaly::MissingColumn {
            role,
            column: column.to_string(),
        });
    }
    cell
}

fn amount(
    row: &RawRow,
    mapping: &ColumnMapping,
    role: Role,
    field: AmountField,
    diagnostics: &mut Vec<Anomaly>,
) -> Decimal {
    let Some(cell) = lookup(row, mapping, role, diagnostics) else {
        return Decimal::ZERO;
    };
    let normalized = normalize_amount(cell);
    if let Some(raw) = normalized.failed_raw {
        diagnostics.push(Anomaly::UnparseableAmount { field, raw });
    }
    normalized.value
}

/// Read delimited text into raw rows. Every cell stays text; ragged rows are
/// accepted and read as empty past their end.
pub fn load_csv_rows(csv_data: &str, delimiter: u8) -> Result<Vec<RawRow>, ReconError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(csv_data.as_bytes());

    let headers: Arc<[String]> = reader
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.iter().all(|c| c.trim().is_empty()) {
            continue;
        }
        let cells = record.iter().map(CellValue::from).collect();
        rows.push(RawRow::new(Arc::clone(&headers), cells));
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn ctx() -> ExtractContext {
        ExtractContext::new("try", NaiveDate::from_ymd_opt(2024, 6, 15).unwrap())
    }

    fn cross_mapping() -> ColumnMapping {
        ColumnMapping {
            date: Some("Tarih".into()),
            debit: Some("Borç".into()),
            credit: Some("Alacak".into()),
            ..ColumnMapping::default()
        }
    }

    fn keyed_mapping() -> ColumnMapping {
        ColumnMapping {
            date: Some("Tarih".into()),
            key: Some("Fatura No".into()),
            total_amount: Some("Toplam".into()),
            tax_amount: Some("KDV".into()),
            currency: Some("Döviz".into()),
            ..ColumnMapping::default()
        }
    }

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn load_csv_basic() {
        let csv = "\
Tarih;Açıklama;Borç;Alacak
01.03.2024;Havale;1.250,00;
05.03.2024;Fatura;;980,40
;;;
";
        let rows = load_csv_rows(csv, b';').unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].headers.len(), 4);
        assert_eq!(rows[0].get("Borç"), Some(&CellValue::Text("1.250,00".into())));
        assert_eq!(rows[0].get("Alacak"), Some(&CellValue::Empty));
    }

    #[test]
    fn extract_cross_row() {
        let rows = load_csv_rows("Tarih,Açıklama,Borç,Alacak\n01.03.2024,Havale,\"1.250,00\",\n", b',').unwrap();
        let tx = extract_record(0, &rows[0], &cross_mapping(), &ctx());
        assert_eq!(tx.date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(tx.display_date, "01.03.2024");
        assert_eq!(tx.debit, d("1250.00"));
        assert_eq!(tx.credit, Decimal::ZERO);
        assert_eq!(tx.currency, "TRY");
        assert_eq!(tx.key, None);
        assert!(tx.diagnostics.is_empty());
        assert_eq!(tx.passthrough[1], ("Açıklama".to_string(), "Havale".to_string()));
    }

    #[test]
    fn extract_keyed_row() {
        let rows = load_csv_rows(
            "Tarih,Fatura No,Toplam,KDV,Döviz\n2024-03-05,  INV1 ,118,18,usd\n",
            b',',
        )
        .unwrap();
        let tx = extract_record(3, &rows[0], &keyed_mapping(), &ctx());
        assert_eq!(tx.source_index, 3);
        assert_eq!(tx.key.as_deref(), Some("INV1"));
        assert_eq!(tx.total_amount, d("118"));
        assert_eq!(tx.tax_amount, d("18"));
        assert_eq!(tx.currency, "USD");
    }

    #[test]
    fn missing_column_degrades() {
        let rows = load_csv_rows("Tarih,Borç\n01.03.2024,100\n", b',').unwrap();
        let tx = extract_record(0, &rows[0], &cross_mapping(), &ctx());
        assert_eq!(tx.credit, Decimal::ZERO);
        assert_eq!(
            tx.diagnostics,
            vec![Anomaly::MissingColumn { role: Role::Credit, column: "Alacak".into() }]
        );
    }

    #[test]
    fn missing_date_column_reported_once() {
        let rows = load_csv_rows("Borç,Alacak\n100,\n", b',').unwrap();
        let tx = extract_record(0, &rows[0], &cross_mapping(), &ctx());
        assert_eq!(tx.date, ctx().today);
        assert_eq!(
            tx.diagnostics,
            vec![Anomaly::MissingColumn { role: Role::Date, column: "Tarih".into() }]
        );
    }

    #[test]
    fn parse_failure_distinguished_from_zero() {
        let rows = load_csv_rows("Tarih,Borç,Alacak\n01.03.2024,yüz,0\n", b',').unwrap();
        let tx = extract_record(0, &rows[0], &cross_mapping(), &ctx());
        assert_eq!(tx.debit, Decimal::ZERO);
        assert_eq!(tx.credit, Decimal::ZERO);
        assert!(tx.amount_defaulted(AmountField::Debit));
        assert!(!tx.amount_defaulted(AmountField::Credit));
    }

    #[test]
    fn numeric_cells_from_spreadsheet() {
        let headers: Arc<[String]> = ["Tarih", "Borç", "Alacak"].iter().map(|s| s.to_string()).collect();
        let row = RawRow::new(
            headers,
            vec![CellValue::Number(45382.0), CellValue::Number(99.9), CellValue::Empty],
        );
        let tx = extract_record(0, &row, &cross_mapping(), &ctx());
        assert_eq!(tx.display_date, "31.03.2024");
        assert_eq!(tx.debit, d("99.9"));
    }

    #[test]
    fn extract_all_preserves_order() {
        let rows = load_csv_rows("Tarih,Borç,Alacak\n02.03.2024,1,\n01.03.2024,2,\n", b',').unwrap();
        let records = extract_all(&rows, &cross_mapping(), &ctx());
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].source_index, 0);
        assert_eq!(records[0].debit, d("1"));
        assert_eq!(records[1].source_index, 1);
    }
}
