use rust_decimal::Decimal;

use crate::model::{AmountField, CanonicalTransaction, FieldDelta};

/// `|a − b| ≤ tolerance`. Symmetric and non-strict. A difference too large
/// to represent is never within tolerance.
pub fn within(a: Decimal, b: Decimal, tolerance: Decimal) -> bool {
    a.checked_sub(b).is_some_and(|d| d.abs() <= tolerance)
}

/// Comparison contract between a statement record (left) and a ledger
/// record (right).
pub trait Matcher {
    fn name(&self) -> &'static str;

    /// Whether `right` may be consumed for `left` at all. Defaults to a full
    /// match; keyed matching consumes on key alone so amount errors are
    /// reported against the right counterpart.
    fn is_candidate(
        &self,
        left: &CanonicalTransaction,
        right: &CanonicalTransaction,
        tolerance: Decimal,
    ) -> bool {
        self.matches(left, right, tolerance)
    }

    fn matches(
        &self,
        left: &CanonicalTransaction,
        right: &CanonicalTransaction,
        tolerance: Decimal,
    ) -> bool;

    /// Per-field differences for every field this matcher compares.
    fn delta(&self, left: &CanonicalTransaction, right: &CanonicalTransaction) -> Vec<FieldDelta>;

    /// Display amount of a record, summed into the report total.
    fn amount(&self, record: &CanonicalTransaction) -> Decimal;
}

// ---------------------------------------------------------------------------
// Cross amount
// ---------------------------------------------------------------------------

/// Statement reconciliation. A counter-party statement mirrors every
/// transaction, so the left debit is compared with the right credit and the
/// left credit with the right debit.
#[derive(Debug, Clone, Copy, Default)]
pub struct CrossAmountMatcher;

impl Matcher for CrossAmountMatcher {
    fn name(&self) -> &'static str {
        "cross"
    }

    fn matches(
        &self,
        left: &CanonicalTransaction,
        right: &CanonicalTransaction,
        tolerance: Decimal,
    ) -> bool {
        within(right.credit, left.debit, tolerance) && within(left.credit, right.debit, tolerance)
    }

    fn delta(&self, left: &CanonicalTransaction, right: &CanonicalTransaction) -> Vec<FieldDelta> {
        vec![
            FieldDelta::new(AmountField::Debit, left.debit, right.credit),
            FieldDelta::new(AmountField::Credit, left.credit, right.debit),
        ]
    }

    fn amount(&self, record: &CanonicalTransaction) -> Decimal {
        record.debit.saturating_sub(record.credit)
    }
}

// ---------------------------------------------------------------------------
// Keyed amount
// ---------------------------------------------------------------------------

/// Invoice verification: exact trimmed key, then total and (for base-currency
/// invoices) tax within tolerance. Foreign-currency invoices are booked as a
/// single converted net amount, so only totals are compared for them.
#[derive(Debug, Clone)]
pub struct KeyedAmountMatcher {
    base_currency: String,
}

impl KeyedAmountMatcher {
    pub fn new(base_currency: impl AsRef<str>) -> Self {
        Self {
            base_currency: base_currency.as_ref().trim().to_uppercase(),
        }
    }

    pub fn base_currency(&self) -> &str {
        &self.base_currency
    }

    fn checks_tax(&self, left: &CanonicalTransaction) -> bool {
        left.currency.trim().eq_ignore_ascii_case(&self.base_currency)
    }
}

fn keys_equal(left: &CanonicalTransaction, right: &CanonicalTransaction) -> bool {
    match (left.key.as_deref(), right.key.as_deref()) {
        (Some(l), Some(r)) => {
            let l = l.trim();
            !l.is_empty() && l == r.trim()
        }
        _ => false,
    }
}

impl Matcher for KeyedAmountMatcher {
    fn name(&self) -> &'static str {
        "keyed"
    }

    fn is_candidate(
        &self,
        left: &CanonicalTransaction,
        right: &CanonicalTransaction,
        _tolerance: Decimal,
    ) -> bool {
        keys_equal(left, right)
    }

    fn matches(
        &self,
        left: &CanonicalTransaction,
        right: &CanonicalTransaction,
        tolerance: Decimal,
    ) -> bool {
        if !keys_equal(left, right) {
            return false;
        }
        if !within(left.total_amount, right.total_amount, tolerance) {
            return false;
        }
        !self.checks_tax(left) || within(left.tax_amount, right.tax_amount, tolerance)
    }

    fn delta(&self, left: &CanonicalTransaction, right: &CanonicalTransaction) -> Vec<FieldDelta> {
        let mut deltas = vec![FieldDelta::new(
            AmountField::Total,
            left.total_amount,
            right.total_amount,
        )];
        if self.checks_tax(left) {
            deltas.push(FieldDelta::new(AmountField::Tax, left.tax_amount, right.tax_amount));
        }
        deltas
    }

    fn amount(&self, record: &CanonicalTransaction) -> Decimal {
        record.total_amount
    }
}
