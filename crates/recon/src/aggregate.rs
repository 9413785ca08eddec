use rust_decimal::Decimal;

use crate::model::{InvoiceRecord, PeriodSlot, WideRow};
use crate::money::{checked_sum, is_plausible_amount, round_cents};

/// Second line of defence on fees: anything that is not a clean amount within the
/// ceiling counts as zero. Loader cleaning makes this a no-op on well-formed input.
fn clean_fee(fee: Option<Decimal>) -> Option<Decimal> {
    fee.map(|f| if is_plausible_amount(f) { f } else { Decimal::ZERO })
}

/// `round(fee1 + fee2 + ... , 2)`; an absent fee column counts as 0.
///
/// A sum that leaves the decimal range totals 0.
pub fn total_fees(periods: &[PeriodSlot]) -> Decimal {
    match checked_sum(periods.iter().map(|p| p.fee.unwrap_or(Decimal::ZERO))) {
        Some(sum) => round_cents(sum),
        None => {
            log::warn!("fee total out of range; counting it as 0");
            round_cents(Decimal::ZERO)
        }
    }
}

/// Attach the quarter total and evaluation label to a pivoted row.
///
/// Pure and idempotent: aggregating an invoice's own wide row again reproduces it.
pub fn aggregate_row(row: WideRow, evaluation_period: &str) -> InvoiceRecord {
    let WideRow {
        client,
        advisor,
        client_id,
        mut periods,
    } = row;

    for slot in periods.iter_mut() {
        slot.fee = clean_fee(slot.fee);
    }
    let total = total_fees(&periods);

    InvoiceRecord {
        client,
        advisor,
        client_id,
        periods,
        total,
        evaluation_period: evaluation_period.to_string(),
    }
}

pub fn aggregate_rows(rows: Vec<WideRow>, evaluation_period: &str) -> Vec<InvoiceRecord> {
    rows.into_iter()
        .map(|row| aggregate_row(row, evaluation_period))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn slot(label: &str, fee: Option<Decimal>) -> PeriodSlot {
        PeriodSlot {
            period_label: label.into(),
            average_daily_balance: Some(dec!(1000)),
            days_in_period: Some(31),
            fee,
        }
    }

    fn row(fees: [Option<Decimal>; 3]) -> WideRow {
        WideRow {
            client: "Acme Corp".into(),
            advisor: Some("Jane".into()),
            client_id: Some("ACME1".into()),
            periods: [slot("Jul", fees[0]), slot("Aug", fees[1]), slot("Sep", fees[2])],
        }
    }

    #[test]
    fn total_is_rounded_sum() {
        let inv = aggregate_row(row([Some(dec!(100.00)), Some(dec!(150.50)), Some(dec!(200))]), "Q3");
        assert_eq!(inv.total, dec!(450.50));
        assert_eq!(inv.evaluation_period, "Q3");
    }

    #[test]
    fn zero_fee_still_totals() {
        let inv = aggregate_row(row([Some(dec!(0)), Some(dec!(10.005)), Some(dec!(0.001))]), "Q3");
        assert_eq!(inv.total, dec!(10.01));
    }

    #[test]
    fn absent_fee_counts_as_zero() {
        let inv = aggregate_row(row([None, None, None]), "Q3");
        assert_eq!(inv.total, Decimal::ZERO);
        assert_eq!(inv.periods[0].fee, None);
    }

    #[test]
    fn negative_fee_is_coerced_to_zero() {
        let inv = aggregate_row(row([Some(dec!(-5)), Some(dec!(10)), Some(dec!(1))]), "Q3");
        assert_eq!(inv.periods[0].fee, Some(Decimal::ZERO));
        assert_eq!(inv.total, dec!(11));
    }

    #[test]
    fn fees_past_the_ceiling_count_as_zero() {
        let huge = Some(dec!(50000000000000000000000000000));
        let inv = aggregate_row(row([huge, huge, huge]), "Q3");
        assert_eq!(inv.periods[0].fee, Some(Decimal::ZERO));
        assert_eq!(inv.total, Decimal::ZERO);

        let inv = aggregate_row(row([huge, Some(dec!(10)), Some(dec!(2.5))]), "Q3");
        assert_eq!(inv.total, dec!(12.50));
    }

    #[test]
    fn overflowing_total_is_zero() {
        let slots = [slot("Jul", Some(Decimal::MAX)), slot("Aug", Some(Decimal::MAX)), slot("Sep", None)];
        assert_eq!(total_fees(&slots), Decimal::ZERO);
    }

    #[test]
    fn aggregation_is_idempotent() {
        let first = aggregate_row(row([Some(dec!(33.333)), Some(dec!(33.333)), Some(dec!(33.339))]), "Q3");
        let second = aggregate_row(WideRow::from(&first), &first.evaluation_period);
        assert_eq!(first, second);
        assert_eq!(second.total, dec!(100.00));
    }

    #[test]
    fn evaluation_label_is_attached_verbatim() {
        let invs = aggregate_rows(vec![row([None, None, None]), row([None, None, None])], "  07/01 - 09/30 ");
        assert!(invs.iter().all(|i| i.evaluation_period == "  07/01 - 09/30 "));
    }
}
