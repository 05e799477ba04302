//! Reconciliation driver.
//!
//! Scans the statement (left) in order and consumes at most one ledger
//! record (right) per statement record. Each run owns its pool; nothing is
//! shared between runs, so independent reconciliations can run on separate
//! threads over the same borrowed inputs.

use rust_decimal::Decimal;

use crate::aggregate::compute_summary;
use crate::config::{default_tolerance, MatchPolicy, ReconConfig, StrategyKind};
use crate::error::ReconError;
use crate::matcher::{CrossAmountMatcher, KeyedAmountMatcher, Matcher};
use crate::model::{CanonicalTransaction, MatchedPair, ReconMeta, ReconReport, Verdict};

#[derive(Debug, Clone)]
pub struct ReconOptions {
    pub name: String,
    pub tolerance: Decimal,
    pub policy: MatchPolicy,
}

impl Default for ReconOptions {
    fn default() -> Self {
        Self {
            name: "ad hoc".into(),
            tolerance: default_tolerance(),
            policy: MatchPolicy::FirstMatch,
        }
    }
}

impl From<&ReconConfig> for ReconOptions {
    fn from(config: &ReconConfig) -> Self {
        Self {
            name: config.name.clone(),
            tolerance: config.tolerance,
            policy: config.policy,
        }
    }
}

/// Run reconciliation per config. Configuration problems are reported
/// before any record is looked at.
pub fn run(
    config: &ReconConfig,
    left: &[CanonicalTransaction],
    right: &[CanonicalTransaction],
) -> Result<ReconReport, ReconError> {
    config.validate()?;
    let options = ReconOptions::from(config);

    let report = match config.strategy {
        StrategyKind::Cross => reconcile(left, right, &CrossAmountMatcher, &options),
        StrategyKind::Keyed => {
            let matcher = KeyedAmountMatcher::new(config.base_currency());
            reconcile(left, right, &matcher, &options)
        }
    };
    Ok(report)
}

/// Match `left` against `right` with `matcher`. Never fails: data problems
/// show up as mismatches or missing records in the report.
pub fn reconcile<M: Matcher + ?Sized>(
    left: &[CanonicalTransaction],
    right: &[CanonicalTransaction],
    matcher: &M,
    options: &ReconOptions,
) -> ReconReport {
    let tolerance = options.tolerance.abs();
    let mut pool = RightPool::new(right);
    let mut matched = Vec::new();
    let mut left_only = Vec::new();

    log::debug!(
        "recon '{}': {} statement vs {} ledger records ({} dropped as zero), strategy {}",
        options.name,
        left.len(),
        right.len(),
        pool.dropped(),
        matcher.name()
    );

    for record in left {
        match pool.take(record, matcher, tolerance, options.policy) {
            Some(counterpart) => matched.push(pair(record, counterpart, matcher, tolerance)),
            None => left_only.push(record.clone()),
        }
    }

    let right_only: Vec<CanonicalTransaction> = pool.remaining().cloned().collect();
    let summary = compute_summary(&matched, &left_only, &right_only, pool.dropped(), matcher);

    log::debug!(
        "recon '{}': {} matched, {} mismatched, {} left only, {} right only",
        options.name,
        summary.matched_count,
        summary.mismatch_count,
        summary.left_only_count,
        summary.right_only_count
    );

    ReconReport {
        meta: ReconMeta {
            config_name: options.name.clone(),
            strategy: matcher.name().to_string(),
            policy: options.policy.to_string(),
            tolerance,
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
        },
        summary,
        matched,
        left_only,
        right_only,
    }
}

fn pair<M: Matcher + ?Sized>(
    left: &CanonicalTransaction,
    right: &CanonicalTransaction,
    matcher: &M,
    tolerance: Decimal,
) -> MatchedPair {
    let deltas = matcher.delta(left, right);
    let verdict = if matcher.matches(left, right, tolerance) {
        Verdict::Exact
    } else {
        Verdict::AmountMismatch {
            fields: deltas
                .iter()
                .filter(|d| d.exceeds(tolerance))
                .map(|d| d.field)
                .collect(),
        }
    };
    MatchedPair {
        left: left.clone(),
        right: right.clone(),
        deltas,
        verdict,
    }
}

// ---------------------------------------------------------------------------
// Right pool
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Open,
    Consumed,
    Dropped,
}

/// Tombstoned view over the right records, scoped to one run.
struct RightPool<'a> {
    records: &'a [CanonicalTransaction],
    slots: Vec<Slot>,
}

impl<'a> RightPool<'a> {
    fn new(records: &'a [CanonicalTransaction]) -> Self {
        let slots = records
            .iter()
            .map(|r| if r.is_zero() { Slot::Dropped } else { Slot::Open })
            .collect();
        Self { records, slots }
    }

    fn open(&self) -> impl Iterator<Item = (usize, &'a CanonicalTransaction)> + '_ {
        self.records
            .iter()
            .enumerate()
            .filter(move |(i, _)| self.slots[*i] == Slot::Open)
    }

    /// Consume the counterpart for `left`, if any, according to `policy`.
    fn take<M: Matcher + ?Sized>(
        &mut self,
        left: &CanonicalTransaction,
        matcher: &M,
        tolerance: Decimal,
        policy: MatchPolicy,
    ) -> Option<&'a CanonicalTransaction> {
        // The scan borrows the slots; it must end before one is consumed.
        let chosen = {
            let mut candidates = self
                .open()
                .filter(|(_, right)| matcher.is_candidate(left, right, tolerance));
            match policy {
                MatchPolicy::FirstMatch => candidates.next().map(|(i, _)| i),
                MatchPolicy::Closest => candidates
                    .min_by_key(|(i, right)| (distance(matcher, left, right), *i))
                    .map(|(i, _)| i),
            }
        }?;

        self.slots[chosen] = Slot::Consumed;
        Some(&self.records[chosen])
    }

    fn remaining(&self) -> impl Iterator<Item = &'a CanonicalTransaction> + '_ {
        self.open().map(|(_, r)| r)
    }

    fn dropped(&self) -> usize {
        self.slots.iter().filter(|s| **s == Slot::Dropped).count()
    }
}

fn distance<M: Matcher + ?Sized>(
    matcher: &M,
    left: &CanonicalTransaction,
    right: &CanonicalTransaction,
) -> Decimal {
    matcher
        .delta(left, right)
        .iter()
        .fold(Decimal::ZERO, |acc, d| acc.saturating_add(d.difference.abs()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ColumnMapping;
    use crate::model::AmountField;
    use chrono::NaiveDate;
    use std::collections::HashSet;
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn tx(idx: usize, debit: &str, credit: &str) -> CanonicalTransaction {
        let mut t = CanonicalTransaction::new(idx, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(), "TRY");
        t.debit = d(debit);
        t.credit = d(credit);
        t
    }

    fn invoice(idx: usize, key: &str, total: &str, tax: &str, currency: &str) -> CanonicalTransaction {
        let mut t = CanonicalTransaction::new(idx, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(), currency);
        t.key = Some(key.into());
        t.total_amount = d(total);
        t.tax_amount = d(tax);
        t
    }

    fn keyed() -> KeyedAmountMatcher {
        KeyedAmountMatcher::new("TRY")
    }

    #[test]
    fn scenario_cross_match() {
        let left = vec![tx(0, "100", "0")];
        let right = vec![tx(0, "0", "100")];
        let report = reconcile(&left, &right, &CrossAmountMatcher, &ReconOptions::default());
        assert_eq!(report.summary.matched_count, 1);
        assert_eq!(report.summary.mismatch_count, 0);
        assert!(report.left_only.is_empty());
        assert!(report.right_only.is_empty());
        assert!(report.is_clean());
    }

    #[test]
    fn scenario_keyed_base_currency() {
        let right = vec![invoice(0, "INV1", "118", "18", "TRY")];

        let left = vec![invoice(0, "INV1", "118", "18", "TRY")];
        let report = reconcile(&left, &right, &keyed(), &ReconOptions::default());
        assert_eq!(report.summary.matched_count, 1);
        assert!(report.matched[0].verdict.is_exact());

        let left = vec![invoice(0, "INV1", "118", "20", "TRY")];
        let report = reconcile(&left, &right, &keyed(), &ReconOptions::default());
        assert_eq!(report.summary.matched_count, 0);
        assert_eq!(report.summary.mismatch_count, 1);
        assert_eq!(
            report.matched[0].verdict,
            Verdict::AmountMismatch { fields: vec![AmountField::Tax] }
        );
        assert!(report.right_only.is_empty());
    }

    #[test]
    fn scenario_keyed_foreign_currency() {
        let left = vec![invoice(0, "INV2", "50", "0", "USD")];

        let right = vec![invoice(0, "INV2", "1500", "0", "USD")];
        let report = reconcile(&left, &right, &keyed(), &ReconOptions::default());
        let pair = &report.matched[0];
        assert_eq!(pair.deltas.len(), 1);
        assert_eq!(pair.deltas[0].field, AmountField::Total);
        assert_eq!(pair.verdict, Verdict::AmountMismatch { fields: vec![AmountField::Total] });

        // Tax differs, but is never looked at for foreign invoices.
        let right = vec![invoice(0, "INV2", "50", "9", "USD")];
        let report = reconcile(&left, &right, &keyed(), &ReconOptions::default());
        assert_eq!(report.summary.matched_count, 1);
    }

    #[test]
    fn scenario_missing_key() {
        let left = vec![invoice(0, "INV9", "10", "0", "TRY")];
        let right = vec![invoice(0, "INV1", "118", "18", "TRY")];
        let report = reconcile(&left, &right, &keyed(), &ReconOptions::default());
        assert_eq!(report.summary.matched_count + report.summary.mismatch_count, 0);
        assert_eq!(report.left_only.len(), 1);
        assert_eq!(report.left_only[0].key.as_deref(), Some("INV9"));
        assert_eq!(report.right_only.len(), 1);
    }

    #[test]
    fn right_record_consumed_once() {
        let left = vec![tx(0, "100", "0"), tx(1, "100", "0")];
        let right = vec![tx(0, "0", "100")];
        let report = reconcile(&left, &right, &CrossAmountMatcher, &ReconOptions::default());
        assert_eq!(report.matched.len(), 1);
        assert_eq!(report.matched[0].left.source_index, 0);
        assert_eq!(report.left_only.len(), 1);
        assert_eq!(report.left_only[0].source_index, 1);
    }

    #[test]
    fn zero_right_rows_dropped() {
        let left = vec![tx(0, "0", "0")];
        let right = vec![tx(0, "0", "0"), tx(1, "0", "5")];
        let report = reconcile(&left, &right, &CrossAmountMatcher, &ReconOptions::default());
        assert_eq!(report.summary.dropped_right_count, 1);
        assert!(report.matched.is_empty());
        assert_eq!(report.left_only.len(), 1);
        assert_eq!(report.right_only.len(), 1);
        assert_eq!(report.right_only[0].source_index, 1);
    }

    #[test]
    fn first_match_wins_over_closer_candidate() {
        let left = vec![tx(0, "100", "0")];
        let right = vec![tx(0, "0", "99.20"), tx(1, "0", "100")];
        let report = reconcile(&left, &right, &CrossAmountMatcher, &ReconOptions::default());
        assert_eq!(report.matched[0].right.source_index, 0);
        assert_eq!(report.right_only[0].source_index, 1);
    }

    #[test]
    fn closest_policy_picks_smallest_delta() {
        let left = vec![tx(0, "100", "0")];
        let right = vec![tx(0, "0", "99.20"), tx(1, "0", "100"), tx(2, "0", "100")];
        let options = ReconOptions {
            policy: MatchPolicy::Closest,
            ..ReconOptions::default()
        };
        let report = reconcile(&left, &right, &CrossAmountMatcher, &options);
        assert_eq!(report.matched[0].right.source_index, 1);
        assert_eq!(report.meta.policy, "closest");
        let rest: Vec<usize> = report.right_only.iter().map(|r| r.source_index).collect();
        assert_eq!(rest, vec![0, 2]);
    }

    #[test]
    fn conservation_and_uniqueness() {
        let left: Vec<_> = (0..20).map(|i| tx(i, &format!("{}", i % 7 * 10), "0")).collect();
        let right: Vec<_> = (0..15).map(|i| tx(i, "0", &format!("{}", i % 5 * 10))).collect();
        let report = reconcile(&left, &right, &CrossAmountMatcher, &ReconOptions::default());
        let s = &report.summary;

        let matched = s.matched_count + s.mismatch_count;
        assert_eq!(matched + s.left_only_count, left.len());
        assert_eq!(matched + s.right_only_count, right.len() - s.dropped_right_count);

        let used: HashSet<usize> = report.matched.iter().map(|p| p.right.source_index).collect();
        assert_eq!(used.len(), report.matched.len());
    }

    #[test]
    fn extreme_amounts_do_not_overflow() {
        let max = crate::numeric::parse_locale_decimal("79228162514264337593543950335").unwrap();
        assert_eq!(max, Decimal::MAX);

        let mut left = tx(0, "0", "0");
        left.debit = Decimal::MAX;
        let mut right = tx(0, "0", "0");
        right.credit = Decimal::MIN;
        for policy in [MatchPolicy::FirstMatch, MatchPolicy::Closest] {
            let options = ReconOptions { policy, ..ReconOptions::default() };
            let report = reconcile(&[left.clone()], &[right.clone()], &CrossAmountMatcher, &options);
            assert_eq!(report.left_only.len(), 1);
            assert_eq!(report.right_only.len(), 1);
        }

        // Keyed pairs on the key, so the delta itself has to saturate.
        let mut big = invoice(0, "INV1", "0", "0", "TRY");
        big.total_amount = Decimal::MAX;
        let mut small = invoice(0, "INV1", "0", "0", "TRY");
        small.total_amount = Decimal::MIN;
        let report = reconcile(&[big], &[small], &keyed(), &ReconOptions::default());
        let pair = &report.matched[0];
        assert_eq!(pair.deltas[0].difference, Decimal::MAX);
        assert_eq!(pair.verdict, Verdict::AmountMismatch { fields: vec![AmountField::Total] });
        assert_eq!(report.summary.total_amount, Decimal::MAX);
    }

    #[test]
    fn run_rejects_missing_role_before_scanning() {
        let columns = ColumnMapping {
            date: Some("Tarih".into()),
            debit: Some("Borç".into()),
            ..ColumnMapping::default()
        };
        let config = ReconConfig::new("cross", StrategyKind::Cross, columns);
        let err = run(&config, &[], &[]).unwrap_err();
        assert!(matches!(err, ReconError::MissingRole { ref role, .. } if role == "credit"));
    }

    #[test]
    fn run_dispatches_on_strategy() {
        let columns = ColumnMapping {
            date: Some("Tarih".into()),
            key: Some("No".into()),
            total_amount: Some("Toplam".into()),
            tax_amount: Some("KDV".into()),
            ..ColumnMapping::default()
        };
        let config = ReconConfig::new("invoices", StrategyKind::Keyed, columns);
        let left = vec![invoice(0, "INV1", "118", "18", "TRY")];
        let right = vec![invoice(0, "INV1", "118.40", "18", "TRY")];
        let report = run(&config, &left, &right).unwrap();
        assert_eq!(report.meta.strategy, "keyed");
        assert_eq!(report.meta.config_name, "invoices");
        assert_eq!(report.summary.matched_count, 1);
    }
}
