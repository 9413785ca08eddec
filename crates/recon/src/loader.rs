use std::collections::HashMap;

use crate::config::LayoutConfig;
use crate::error::BillingError;
use crate::model::{ClientPeriodRecord, FieldPresence, LoadedPeriod, RawSheet};
use crate::money::{parse_currency_or_zero, parse_days_or_zero};

pub const COL_ADVISOR: &str = "Advisor";
pub const COL_CLIENT_ID: &str = "Unique Client ID";
pub const COL_BALANCE: &str = "Average Daily Balance";
pub const COL_DAYS: &str = "Days in Period";
pub const COL_FEE: &str = "Fee";

/// Header drift tolerance: `" Fee "` and `"Fee"` name the same column.
pub fn normalize_header(name: &str) -> String {
    name.trim().to_string()
}

/// Absolute sheet column of each known field, resolved once per table.
#[derive(Debug, Default)]
struct ColumnIndex {
    advisor: Option<usize>,
    client_id: Option<usize>,
    balance: Option<usize>,
    days: Option<usize>,
    fee: Option<usize>,
}

impl ColumnIndex {
    fn resolve(headers: &HashMap<String, usize>) -> Self {
        Self {
            advisor: headers.get(COL_ADVISOR).copied(),
            client_id: headers.get(COL_CLIENT_ID).copied(),
            balance: headers.get(COL_BALANCE).copied(),
            days: headers.get(COL_DAYS).copied(),
            fee: headers.get(COL_FEE).copied(),
        }
    }

    fn presence(&self) -> FieldPresence {
        FieldPresence {
            advisor: self.advisor.is_some(),
            client_id: self.client_id.is_some(),
            average_daily_balance: self.balance.is_some(),
            days_in_period: self.days.is_some(),
            fee: self.fee.is_some(),
        }
    }
}

/// Data columns of a sheet: everything but the identity column, minus the leading
/// `skip_columns` index band.
fn data_columns(width: usize, layout: &LayoutConfig) -> impl Iterator<Item = usize> + '_ {
    (0..width)
        .filter(move |&c| c != layout.identity_column)
        .skip(layout.skip_columns)
}

/// Normalize one period's raw sheet into client-period records.
///
/// Fails only when the sheet has the wrong shape to be read at all; bad cell values
/// never fail (they coerce to zero).
pub fn load_period(
    sheet: &RawSheet,
    label: &str,
    index: usize,
    layout: &LayoutConfig,
) -> Result<LoadedPeriod, BillingError> {
    let header_row = layout.skip_rows;
    if sheet.height() <= header_row {
        return Err(BillingError::SourceShape {
            period: label.to_string(),
            message: format!(
                "sheet has {} row(s), expected a header at row {}",
                sheet.height(),
                header_row + 1
            ),
        });
    }

    let width = sheet.width();
    if layout.identity_column >= width {
        return Err(BillingError::SourceShape {
            period: label.to_string(),
            message: format!(
                "identity column {} is outside the sheet ({width} column(s))",
                layout.identity_column + 1
            ),
        });
    }

    // First occurrence wins when trimming makes two headers collide.
    let mut headers: HashMap<String, usize> = HashMap::new();
    for col in data_columns(width, layout) {
        let name = normalize_header(&sheet.cell(header_row, col).to_text());
        if !name.is_empty() {
            headers.entry(name).or_insert(col);
        }
    }
    let columns = ColumnIndex::resolve(&headers);
    let presence = columns.presence();

    let text_at = |row: usize, col: Option<usize>| -> String {
        col.map(|c| sheet.cell(row, c).to_text()).unwrap_or_default()
    };

    let mut records = Vec::new();
    let mut skipped_rows = 0;
    let mut identity_cells = 0;

    for row in (header_row + 1)..sheet.height() {
        if sheet.rows[row].iter().all(|c| c.is_blank()) {
            continue;
        }
        if !sheet.cell(row, layout.identity_column).is_blank() {
            identity_cells += 1;
        }

        // Embedded sub-header rows repeat the literal "Advisor".
        if let Some(col) = columns.advisor {
            let advisor = sheet.cell(row, col);
            if advisor.is_blank() || advisor.to_text().trim() == COL_ADVISOR {
                skipped_rows += 1;
                continue;
            }
        }

        let identity = sheet.cell(row, layout.identity_column);
        if identity.is_blank() {
            skipped_rows += 1;
            continue;
        }

        records.push(ClientPeriodRecord {
            client: identity.to_text(),
            advisor: text_at(row, columns.advisor).trim().to_string(),
            client_id: text_at(row, columns.client_id).trim().to_string(),
            average_daily_balance: parse_currency_or_zero(&text_at(row, columns.balance)),
            days_in_period: parse_days_or_zero(&text_at(row, columns.days)),
            fee: parse_currency_or_zero(&text_at(row, columns.fee)),
            period_label: label.to_string(),
            period_index: index,
        });
    }

    log::debug!(
        "period '{label}': {} record(s), {skipped_rows} row(s) skipped",
        records.len()
    );

    Ok(LoadedPeriod {
        label: label.to_string(),
        index,
        records,
        presence,
        skipped_rows,
        identity_cells,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RawCell;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn layout() -> LayoutConfig {
        LayoutConfig {
            skip_rows: 2,
            identity_column: 1,
            skip_columns: 1,
        }
    }

    /// Two junk rows, then header, with an index band in column A.
    fn sheet(data: Vec<Vec<&str>>) -> RawSheet {
        let mut rows = vec![
            vec!["Advisory Fee Report", "", "", "", "", "", ""],
            vec!["", "", "", "", "", "", ""],
            vec!["#", "", " Advisor", "Unique Client ID ", " Average Daily Balance ", "Days in Period", " Fee "],
        ];
        rows.extend(data);
        RawSheet::from_text_rows(rows)
    }

    #[test]
    fn trims_headers_and_cleans_amounts() {
        let s = sheet(vec![vec!["1", "Acme Corp", "Jane", "ACME000123456", "$1,234,567.89", "31", "$1,234.56"]]);
        let loaded = load_period(&s, "Jul 2025", 0, &layout()).unwrap();
        assert_eq!(loaded.records.len(), 1);
        let r = &loaded.records[0];
        assert_eq!(r.client, "Acme Corp");
        assert_eq!(r.advisor, "Jane");
        assert_eq!(r.client_id, "ACME000123456");
        assert_eq!(r.average_daily_balance, dec!(1234567.89));
        assert_eq!(r.days_in_period, 31);
        assert_eq!(r.fee, dec!(1234.56));
        assert_eq!(r.period_label, "Jul 2025");
        assert_eq!(r.period_index, 0);
        assert!(loaded.presence.fee && loaded.presence.advisor && loaded.presence.client_id);
    }

    #[test]
    fn drops_missing_advisor_and_repeated_header_rows() {
        let s = sheet(vec![
            vec!["1", "Acme Corp", "Jane", "A1", "100", "31", "10"],
            vec!["", "", "Advisor", "Unique Client ID", "Average Daily Balance", "Days in Period", "Fee"],
            vec!["2", "Beta LLC", "", "B1", "100", "31", "10"],
            vec!["3", "Gamma Inc", "Raj", "G1", "100", "31", "10"],
        ]);
        let loaded = load_period(&s, "Jul 2025", 0, &layout()).unwrap();
        let clients: Vec<_> = loaded.records.iter().map(|r| r.client.as_str()).collect();
        assert_eq!(clients, vec!["Acme Corp", "Gamma Inc"]);
        assert_eq!(loaded.skipped_rows, 2);
    }

    #[test]
    fn counts_filled_identity_cells() {
        let s = sheet(vec![
            vec!["1", "Acme Corp", "Jane", "A1", "100", "31", "10"],
            vec!["2", "Beta LLC", "", "B1", "100", "31", "10"],
            vec!["3", "", "Raj", "G1", "100", "31", "10"],
        ]);
        let loaded = load_period(&s, "Jul 2025", 0, &layout()).unwrap();
        assert_eq!(loaded.identity_cells, 2);
        assert_eq!(loaded.records.len(), 1);

        let blank = sheet(vec![vec!["1", "", "Jane", "A1", "100", "31", "10"]]);
        assert_eq!(load_period(&blank, "Jul 2025", 0, &layout()).unwrap().identity_cells, 0);
    }

    #[test]
    fn blank_rows_are_ignored_silently() {
        let s = sheet(vec![
            vec!["", "", "", "", "", "", ""],
            vec!["1", "Acme Corp", "Jane", "A1", "100", "31", "10"],
        ]);
        let loaded = load_period(&s, "Jul 2025", 0, &layout()).unwrap();
        assert_eq!(loaded.records.len(), 1);
        assert_eq!(loaded.skipped_rows, 0);
    }

    #[test]
    fn unparsable_amounts_become_zero() {
        let s = sheet(vec![vec!["1", "Acme Corp", "Jane", "A1", "n/a", "thirty", "TBD"]]);
        let loaded = load_period(&s, "Jul 2025", 0, &layout()).unwrap();
        let r = &loaded.records[0];
        assert_eq!(r.fee, Decimal::ZERO);
        assert_eq!(r.average_daily_balance, Decimal::ZERO);
        assert_eq!(r.days_in_period, 0);
    }

    #[test]
    fn numeric_cells_are_read() {
        let mut s = sheet(vec![vec!["1", "Acme Corp", "Jane", "", "", "", ""]]);
        s.rows[3][3] = RawCell::Number(123456.0);
        s.rows[3][4] = RawCell::Number(25000.5);
        s.rows[3][5] = RawCell::Number(30.0);
        s.rows[3][6] = RawCell::Number(150.5);
        let loaded = load_period(&s, "Aug 2025", 1, &layout()).unwrap();
        let r = &loaded.records[0];
        assert_eq!(r.client_id, "123456");
        assert_eq!(r.average_daily_balance, dec!(25000.5));
        assert_eq!(r.days_in_period, 30);
        assert_eq!(r.fee, dec!(150.5));
        assert_eq!(r.period_index, 1);
    }

    #[test]
    fn index_band_column_is_not_data() {
        // Column A is named "Fee" here but sits in the skipped index band.
        let rows = vec![
            vec!["", "", "", ""],
            vec!["", "", "", ""],
            vec!["Fee", "", "Advisor", "Fee"],
            vec!["999", "Acme Corp", "Jane", "10"],
        ];
        let loaded = load_period(&RawSheet::from_text_rows(rows), "Jul 2025", 0, &layout()).unwrap();
        assert_eq!(loaded.records[0].fee, dec!(10));
    }

    #[test]
    fn missing_optional_columns_are_absent_not_errors() {
        let rows = vec![
            vec!["", "", ""],
            vec!["", "", ""],
            vec!["#", "", "Fee"],
            vec!["1", "Acme Corp", "10"],
        ];
        let loaded = load_period(&RawSheet::from_text_rows(rows), "Jul 2025", 0, &layout()).unwrap();
        assert_eq!(loaded.records.len(), 1);
        assert!(!loaded.presence.advisor);
        assert!(!loaded.presence.client_id);
        assert!(loaded.presence.fee);
        assert_eq!(loaded.records[0].advisor, "");
    }

    #[test]
    fn too_short_sheet_is_a_shape_error() {
        let rows = vec![vec!["only one row"]];
        let err = load_period(&RawSheet::from_text_rows(rows), "Sep 2025", 2, &layout()).unwrap_err();
        assert!(matches!(err, BillingError::SourceShape { ref period, .. } if period == "Sep 2025"));
    }

    #[test]
    fn identity_column_out_of_range_is_a_shape_error() {
        let rows = vec![vec!["a"], vec!["b"], vec!["Fee"], vec!["1"]];
        let err = load_period(&RawSheet::from_text_rows(rows), "Sep 2025", 2, &layout()).unwrap_err();
        assert!(err.to_string().contains("identity column 2"));
    }
}
