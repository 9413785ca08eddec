use std::collections::BTreeMap;

use rust_decimal::Decimal;

use crate::config::PERIOD_COUNT;
use crate::layout::CellValue;
use crate::loader::{COL_ADVISOR, COL_BALANCE, COL_CLIENT_ID, COL_DAYS, COL_FEE};
use crate::model::{
    ClientPeriodRecord, FieldPresence, IdentityConflict, InvoiceRecord, PeriodSlot, WideRow,
};

pub const COL_CLIENT: &str = "Client";
pub const COL_PERIOD: &str = "Period";

/// Wide-form column names present for `presence`, in fixed order:
/// identity fields, then balance, days, fee and period label, each suffixed 1..N.
pub fn flat_column_names(presence: &FieldPresence) -> Vec<String> {
    let mut columns = vec![COL_CLIENT.to_string()];
    if presence.advisor {
        columns.push(COL_ADVISOR.to_string());
    }
    if presence.client_id {
        columns.push(COL_CLIENT_ID.to_string());
    }

    let value_fields = [
        (COL_BALANCE, presence.average_daily_balance),
        (COL_DAYS, presence.days_in_period),
        (COL_FEE, presence.fee),
        (COL_PERIOD, true),
    ];
    for (name, present) in value_fields {
        if present {
            columns.extend((1..=PERIOD_COUNT).map(|i| format!("{name}{i}")));
        }
    }
    columns
}

/// Pivot admitted long-form records into one row per client.
///
/// Each client's records are already sorted by period index, which is the position of
/// the source in the configured sequence. Fields absent from every source stay `None`.
pub fn pivot_wide(
    admitted: &BTreeMap<String, Vec<ClientPeriodRecord>>,
    presence: &FieldPresence,
    conflicts: &mut Vec<IdentityConflict>,
) -> Vec<WideRow> {
    let mut rows = Vec::with_capacity(admitted.len());

    for (client, records) in admitted {
        let slots: Vec<PeriodSlot> = records
            .iter()
            .map(|r| PeriodSlot {
                period_label: r.period_label.clone(),
                average_daily_balance: presence
                    .average_daily_balance
                    .then_some(r.average_daily_balance),
                days_in_period: presence.days_in_period.then_some(r.days_in_period),
                fee: presence.fee.then_some(r.fee),
            })
            .collect();
        let Ok(periods) = <[PeriodSlot; PERIOD_COUNT]>::try_from(slots) else {
            // Admission guarantees exactly one record per period.
            log::error!("client '{client}' reached the pivot without {PERIOD_COUNT} periods");
            continue;
        };

        let advisor = presence
            .advisor
            .then(|| first_consistent(client, "advisor", records, |r| &r.advisor, conflicts));
        let client_id = presence
            .client_id
            .then(|| first_consistent(client, "client_id", records, |r| &r.client_id, conflicts));

        rows.push(WideRow {
            client: client.clone(),
            advisor,
            client_id,
            periods,
        });
    }

    rows
}

/// First period's value for an identity field; records a conflict if later periods differ.
fn first_consistent<'a>(
    client: &str,
    field: &str,
    records: &'a [ClientPeriodRecord],
    get: impl Fn(&'a ClientPeriodRecord) -> &'a String,
    conflicts: &mut Vec<IdentityConflict>,
) -> String {
    let mut values: Vec<String> = Vec::new();
    for record in records {
        let value = get(record);
        if !values.contains(value) {
            values.push(value.clone());
        }
    }

    if values.len() > 1 {
        log::warn!("client '{client}': {field} differs between periods: {values:?}");
        conflicts.push(IdentityConflict {
            client: client.to_string(),
            field: field.to_string(),
            values: values.clone(),
        });
    }

    values.into_iter().next().unwrap_or_default()
}

/// An invoice's values aligned with `columns` (as produced by [`flat_column_names`]).
/// Unknown column names yield empty text.
pub fn flat_values(record: &InvoiceRecord, columns: &[String]) -> Vec<CellValue> {
    columns.iter().map(|name| flat_value(record, name)).collect()
}

fn flat_value(record: &InvoiceRecord, name: &str) -> CellValue {
    let text = |s: Option<&str>| CellValue::Text(s.unwrap_or_default().to_string());
    match name {
        COL_CLIENT => return CellValue::Text(record.client.clone()),
        COL_ADVISOR => return text(record.advisor.as_deref()),
        COL_CLIENT_ID => return text(record.client_id.as_deref()),
        _ => {}
    }

    // Period columns are a field name followed by the 1-based slot number.
    let split = name.trim_end_matches(|c: char| c.is_ascii_digit()).len();
    let (field, suffix) = name.split_at(split);
    let Some(slot) = suffix
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|i| record.periods.get(i))
    else {
        return text(None);
    };

    match field {
        COL_PERIOD => CellValue::Text(slot.period_label.clone()),
        COL_BALANCE => CellValue::Number(slot.average_daily_balance.unwrap_or_default()),
        COL_DAYS => CellValue::Number(Decimal::from(slot.days_in_period.unwrap_or_default())),
        COL_FEE => CellValue::Number(slot.fee.unwrap_or_default()),
        _ => text(None),
    }
}
