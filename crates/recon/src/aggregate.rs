use rust_decimal::Decimal;

use crate::matcher::Matcher;
use crate::model::{CanonicalTransaction, MatchedPair, ReconSummary};

/// Compute summary statistics from the three result buckets.
pub fn compute_summary<M: Matcher + ?Sized>(
    matched: &[MatchedPair],
    left_only: &[CanonicalTransaction],
    right_only: &[CanonicalTransaction],
    dropped_right: usize,
    matcher: &M,
) -> ReconSummary {
    let mismatch_count = matched.iter().filter(|p| !p.verdict.is_exact()).count();

    let anomaly_count = matched
        .iter()
        .flat_map(|p| [&p.left, &p.right])
        .chain(left_only)
        .chain(right_only)
        .filter(|r| r.has_anomalies())
        .count();

    let total_amount: Decimal = matched
        .iter()
        .map(|p| &p.left)
        .chain(left_only)
        .map(|r| matcher.amount(r))
        .fold(Decimal::ZERO, Decimal::saturating_add);

    ReconSummary {
        matched_count: matched.len() - mismatch_count,
        mismatch_count,
        left_only_count: left_only.len(),
        right_only_count: right_only.len(),
        dropped_right_count: dropped_right,
        anomaly_count,
        total_amount,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::KeyedAmountMatcher;
    use crate::model::{AmountField, Anomaly, Verdict};
    use chrono::NaiveDate;

    fn invoice(total: i64) -> CanonicalTransaction {
        let mut t = CanonicalTransaction::new(0, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(), "TRY");
        t.total_amount = Decimal::from(total);
        t
    }

    fn pair(verdict: Verdict) -> MatchedPair {
        MatchedPair {
            left: invoice(100),
            right: invoice(100),
            deltas: Vec::new(),
            verdict,
        }
    }

    #[test]
    fn summary_counts() {
        let matched = vec![
            pair(Verdict::Exact),
            pair(Verdict::Exact),
            pair(Verdict::AmountMismatch { fields: vec![AmountField::Tax] }),
        ];
        let mut flagged = invoice(40);
        flagged.diagnostics.push(Anomaly::MissingDate);
        let left_only = vec![flagged];
        let right_only = vec![invoice(7), invoice(8)];

        let summary = compute_summary(
            &matched,
            &left_only,
            &right_only,
            1,
            &KeyedAmountMatcher::new("TRY"),
        );
        assert_eq!(summary.matched_count, 2);
        assert_eq!(summary.mismatch_count, 1);
        assert_eq!(summary.left_only_count, 1);
        assert_eq!(summary.right_only_count, 2);
        assert_eq!(summary.dropped_right_count, 1);
        assert_eq!(summary.anomaly_count, 1);
        // Left side only: 3 × 100 + 40.
        assert_eq!(summary.total_amount, Decimal::from(340));
    }
}
