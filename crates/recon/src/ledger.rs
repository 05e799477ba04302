//! Ledger side of a reconciliation.
//!
//! The authoritative rows come from a remote relational store through a
//! transport this crate does not own. [`LedgerSource`] is the seam: the
//! transport (or a file export of the same query) hands back [`LedgerRow`]s
//! already filtered to one account and period.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::{LedgerColumns, LedgerConfig};
use crate::date::{format_display, normalize_date};
use crate::error::ReconError;
use crate::model::{AmountField, Anomaly, CanonicalTransaction, CellValue};
use crate::numeric::normalize_amount;

/// One ledger entry as exposed by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerRow {
    pub date: NaiveDate,
    /// Signed debit in base currency.
    pub debit: Decimal,
    /// Signed credit in base currency.
    pub credit: Decimal,
    /// Net amount in the document's own currency, for foreign-currency entries.
    #[serde(default)]
    pub fx_net_amount: Option<Decimal>,
    #[serde(default)]
    pub document_key: Option<String>,
    #[serde(default)]
    pub tax_amount: Option<Decimal>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub account: Option<String>,
    /// Cells of the extract that were defaulted on read.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Anomaly>,
}

impl LedgerRow {
    /// Canonical form. Base-currency entries carry `|debit − credit|` as
    /// their total; foreign-currency entries carry the converted net amount
    /// and no tax breakdown is expected of them.
    pub fn to_canonical(&self, source_index: usize, base_currency: &str) -> CanonicalTransaction {
        let currency = self
            .currency
            .as_deref()
            .map(|c| c.trim().to_uppercase())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| base_currency.to_string());

        let booked = self.debit.saturating_sub(self.credit).abs();
        let total_amount = if currency == base_currency {
            booked
        } else {
            self.fx_net_amount.map(|a| a.abs()).unwrap_or(booked)
        };

        let mut passthrough = vec![("date".to_string(), format_display(self.date))];
        if let Some(ref account) = self.account {
            passthrough.push(("account".to_string(), account.clone()));
        }

        CanonicalTransaction {
            source_index,
            date: self.date,
            display_date: format_display(self.date),
            debit: self.debit,
            credit: self.credit,
            key: self
                .document_key
                .as_deref()
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(str::to_string),
            total_amount,
            tax_amount: self.tax_amount.unwrap_or(Decimal::ZERO),
            currency,
            passthrough,
            diagnostics: self.diagnostics.clone(),
        }
    }
}

/// Convert ledger rows in order.
pub fn ledger_to_canonical(rows: &[LedgerRow], base_currency: &str) -> Vec<CanonicalTransaction> {
    let base = base_currency.trim().to_uppercase();
    rows.iter()
        .enumerate()
        .map(|(i, row)| row.to_canonical(i, &base))
        .collect()
}

// ---------------------------------------------------------------------------
// Query + sources
// ---------------------------------------------------------------------------

/// Account and inclusive date range a ledger fetch is restricted to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerQuery {
    pub account: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl LedgerQuery {
    pub fn from_config(config: &LedgerConfig) -> Self {
        Self {
            account: config.account.clone(),
            from: config.from,
            to: config.to,
        }
    }

    pub fn accepts(&self, row: &LedgerRow) -> bool {
        if let Some(ref account) = self.account {
            match row.account {
                Some(ref a) if a.trim() == account.trim() => {}
                Some(_) => return false,
                // Rows without an account column are assumed pre-filtered.
                None => {}
            }
        }
        // A defaulted date says nothing about the period; keep the row so it
        // shows up for review.
        let date_defaulted = row
            .diagnostics
            .iter()
            .any(|a| matches!(a, Anomaly::MissingDate | Anomaly::UnparseableDate { .. }));
        if date_defaulted {
            return true;
        }
        if self.from.is_some_and(|from| row.date < from) {
            return false;
        }
        if self.to.is_some_and(|to| row.date > to) {
            return false;
        }
        true
    }
}

pub trait LedgerSource {
    fn fetch(&self, query: &LedgerQuery) -> Result<Vec<LedgerRow>, ReconError>;
}

/// Rows already fetched by the caller; the query is still applied.
impl LedgerSource for [LedgerRow] {
    fn fetch(&self, query: &LedgerQuery) -> Result<Vec<LedgerRow>, ReconError> {
        Ok(self.iter().filter(|r| query.accepts(r)).cloned().collect())
    }
}

/// A delimited-text export of the ledger query. Unreadable cells are
/// defaulted (amounts to zero, dates to `today`) and recorded on the row;
/// only a missing date, debit or credit header is an error.
pub struct CsvLedgerSource {
    data: String,
    delimiter: u8,
    columns: LedgerColumns,
    today: NaiveDate,
}

impl CsvLedgerSource {
    pub fn new(data: impl Into<String>, delimiter: u8, columns: LedgerColumns, today: NaiveDate) -> Self {
        Self {
            data: data.into(),
            delimiter,
            columns,
            today,
        }
    }
}

impl LedgerSource for CsvLedgerSource {
    fn fetch(&self, query: &LedgerQuery) -> Result<Vec<LedgerRow>, ReconError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .delimiter(self.delimiter)
            .flexible(true)
            .from_reader(self.data.as_bytes());

        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
            .collect();

        let col = &self.columns;
        let idx = |name: &str| headers.iter().position(|h| h == name);
        let required = |name: &str| {
            idx(name).ok_or_else(|| ReconError::MissingColumn {
                input: "ledger".into(),
                column: name.to_string(),
            })
        };

        let date_idx = required(col.date.as_str())?;
        let debit_idx = required(col.debit.as_str())?;
        let credit_idx = required(col.credit.as_str())?;
        let fx_idx = idx(col.fx_net_amount.as_str());
        let key_idx = idx(col.document_key.as_str());
        let tax_idx = idx(col.tax_amount.as_str());
        let currency_idx = idx(col.currency.as_str());
        let account_idx = idx(col.account.as_str());

        let mut rows = Vec::new();
        let mut flagged = 0usize;
        for record in reader.records() {
            let record = record?;
            let text = |i: Option<usize>| {
                i.and_then(|i| record.get(i))
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
            };

            let mut diagnostics = Vec::new();
            let mut amount = |i: Option<usize>, field: AmountField| -> Option<Decimal> {
                let raw = text(i)?;
                let normalized = normalize_amount(&CellValue::from(raw));
                if let Some(raw) = normalized.failed_raw {
                    diagnostics.push(Anomaly::UnparseableAmount { field, raw });
                }
                Some(normalized.value)
            };

            let debit = amount(Some(debit_idx), AmountField::Debit).unwrap_or(Decimal::ZERO);
            let credit = amount(Some(credit_idx), AmountField::Credit).unwrap_or(Decimal::ZERO);
            let fx_net_amount = amount(fx_idx, AmountField::Total);
            let tax_amount = amount(tax_idx, AmountField::Tax);

            let date = normalize_date(&CellValue::from(text(Some(date_idx)).unwrap_or("")), self.today);
            diagnostics.extend(date.anomaly);

            if !diagnostics.is_empty() {
                flagged += 1;
            }

            let row = LedgerRow {
                date: date.sort_key,
                debit,
                credit,
                fx_net_amount,
                document_key: text(key_idx).map(str::to_string),
                tax_amount,
                currency: text(currency_idx).map(str::to_string),
                account: text(account_idx).map(str::to_string),
                diagnostics,
            };

            if query.accepts(&row) {
                rows.push(row);
            }
        }

        if flagged > 0 {
            log::warn!("{flagged} ledger rows had unreadable cells and were defaulted");
        }
        log::debug!("ledger extract: {} rows within query", rows.len());
        Ok(rows)
    }
}
