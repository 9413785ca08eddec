use rust_decimal::Decimal;

use crate::model::{InvoiceRecord, RunDiagnostics, RunSummary};
use crate::money::checked_sum;

/// Compute summary statistics for a finished run.
pub fn compute_summary(invoices: &[InvoiceRecord], diagnostics: &RunDiagnostics) -> RunSummary {
    let total_billed = checked_sum(invoices.iter().map(|i| i.total)).unwrap_or_else(|| {
        log::warn!("billed total out of range across {} invoice(s); reporting 0", invoices.len());
        Decimal::ZERO
    });

    RunSummary {
        periods_loaded: diagnostics.loads.len(),
        records_loaded: diagnostics.loads.iter().map(|l| l.records).sum(),
        clients_seen: invoices.len() + diagnostics.excluded.len(),
        admitted: invoices.len(),
        excluded: diagnostics.excluded.len(),
        identity_conflicts: diagnostics.identity_conflicts.len(),
        load_failures: diagnostics.load_failures.len(),
        total_billed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ExcludedClient, LoadFailure, PeriodLoad, PeriodSlot};
    use rust_decimal_macros::dec;

    fn invoice(total: Decimal) -> InvoiceRecord {
        let slot = || PeriodSlot {
            period_label: "P".into(),
            average_daily_balance: None,
            days_in_period: None,
            fee: None,
        };
        InvoiceRecord {
            client: "c".into(),
            advisor: None,
            client_id: None,
            periods: [slot(), slot(), slot()],
            total,
            evaluation_period: "Q".into(),
        }
    }

    #[test]
    fn summary_counts() {
        let diagnostics = RunDiagnostics {
            loads: vec![
                PeriodLoad { period: "Jul".into(), source: "a.xlsx".into(), records: 4, skipped_rows: 1 },
                PeriodLoad { period: "Aug".into(), source: "b.xlsx".into(), records: 3, skipped_rows: 0 },
            ],
            load_failures: vec![LoadFailure { period: "Sep".into(), source: "c.xlsx".into(), message: "corrupt".into() }],
            excluded: vec![ExcludedClient {
                client: "Beta".into(),
                record_count: 1,
                missing_periods: vec!["Aug".into(), "Sep".into()],
                duplicated_periods: Vec::new(),
            }],
            ..Default::default()
        };
        let summary = compute_summary(&[invoice(dec!(450.50)), invoice(dec!(49.50))], &diagnostics);
        assert_eq!(summary.periods_loaded, 2);
        assert_eq!(summary.records_loaded, 7);
        assert_eq!(summary.clients_seen, 3);
        assert_eq!(summary.admitted, 2);
        assert_eq!(summary.excluded, 1);
        assert_eq!(summary.load_failures, 1);
        assert_eq!(summary.total_billed, dec!(500));
    }

    #[test]
    fn overflowing_billed_total_reports_zero() {
        let invoices = [invoice(Decimal::MAX), invoice(Decimal::MAX), invoice(dec!(1))];
        let summary = compute_summary(&invoices, &RunDiagnostics::default());
        assert_eq!(summary.total_billed, Decimal::ZERO);
        assert_eq!(summary.admitted, 3);
    }
}
