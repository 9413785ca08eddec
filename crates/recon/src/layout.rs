//! Invoice layout: the 21 values an invoice shows and where each one goes in the template.

use std::fmt;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::config::InvoiceConfig;
use crate::error::BillingError;
use crate::model::InvoiceRecord;
use crate::money::format_currency;

/// Characters of the client id shown on the invoice.
pub const CLIENT_ID_DISPLAY_CHARS: usize = 10;

// ---------------------------------------------------------------------------
// Cell references
// ---------------------------------------------------------------------------

/// Zero-based cell position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CellRef {
    pub row: u32,
    pub col: u16,
}

impl CellRef {
    /// Parse an A1 reference like `"B5"` into row 4, col 1.
    pub fn parse(r: &str) -> Option<Self> {
        let r = r.trim().replace('$', "");
        let split = r.find(|c: char| c.is_ascii_digit())?;
        let (col_part, row_part) = r.split_at(split);
        if col_part.is_empty() || !col_part.chars().all(|c| c.is_ascii_alphabetic()) {
            return None;
        }

        let mut col: u32 = 0;
        for ch in col_part.chars() {
            col = col * 26 + (ch.to_ascii_uppercase() as u32 - 'A' as u32 + 1);
            if col > 16_384 {
                return None;
            }
        }
        let row: u32 = row_part.parse().ok()?;
        if row == 0 {
            return None;
        }

        Some(Self {
            row: row - 1,
            col: (col - 1) as u16,
        })
    }

    pub fn col_letters(&self) -> String {
        col_to_letter(self.col as usize)
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.col_letters(), self.row + 1)
    }
}

/// Convert column index to Excel column letter (0 = A, 25 = Z, 26 = AA, etc.)
pub fn col_to_letter(col: usize) -> String {
    let mut result = String::new();
    let mut n = col;
    loop {
        result.insert(0, (b'A' + (n % 26) as u8) as char);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    result
}

/// Rectangular range, `first` top-left and `last` bottom-right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellRange {
    pub first: CellRef,
    pub last: CellRef,
}

impl CellRange {
    /// Parse `"D12:E12"` (or a single `"D12"`).
    pub fn parse(r: &str) -> Result<Self, BillingError> {
        let err = || BillingError::CellRange(r.to_string());
        let (a, b) = r.split_once(':').unwrap_or((r, r));
        let a = CellRef::parse(a).ok_or_else(err)?;
        let b = CellRef::parse(b).ok_or_else(err)?;
        Ok(Self {
            first: CellRef {
                row: a.row.min(b.row),
                col: a.col.min(b.col),
            },
            last: CellRef {
                row: a.row.max(b.row),
                col: a.col.max(b.col),
            },
        })
    }

    pub fn is_single_cell(&self) -> bool {
        self.first == self.last
    }

    pub fn contains(&self, cell: CellRef) -> bool {
        (self.first.row..=self.last.row).contains(&cell.row)
            && (self.first.col..=self.last.col).contains(&cell.col)
    }

    pub fn overlaps(&self, other: &CellRange) -> bool {
        self.first.row <= other.last.row
            && other.first.row <= self.last.row
            && self.first.col <= other.last.col
            && other.first.col <= self.last.col
    }
}

impl fmt::Display for CellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_single_cell() {
            write!(f, "{}", self.first)
        } else {
            write!(f, "{}:{}", self.first, self.last)
        }
    }
}

// ---------------------------------------------------------------------------
// Template mapping
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemplateTarget {
    /// 1-based position in the invoice value list.
    pub slot: u8,
    pub range: &'static str,
    pub merged: bool,
}

const fn target(slot: u8, range: &'static str, merged: bool) -> TemplateTarget {
    TemplateTarget { slot, range, merged }
}

/// Where each invoice value is written, in value-list order.
pub const TEMPLATE_MAPPING: [TemplateTarget; 21] = [
    target(1, "D12:E12", true),
    target(2, "D14:E14", true),
    target(3, "A7:F7", true),
    target(4, "D11:E11", true),
    target(5, "D13:E13", true),
    target(6, "A5:F5", true),
    target(7, "A8:F8", true),
    target(8, "A16:F16", true),
    target(9, "B18:B18", false),
    target(10, "C18:C18", false),
    target(11, "D18:D18", false),
    target(12, "E18:E18", false),
    target(13, "B19:B19", false),
    target(14, "C19:C19", false),
    target(15, "D19:D19", false),
    target(16, "E19:E19", false),
    target(17, "B20:B20", false),
    target(18, "C20:C20", false),
    target(19, "D20:D20", false),
    target(20, "E20:E20", false),
    target(21, "E21:E21", false),
];

// ---------------------------------------------------------------------------
// Values
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    Text(String),
    Number(Decimal),
}

impl CellValue {
    fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Number(n) => write!(f, "{n}"),
        }
    }
}

/// First `n` characters (not bytes).
pub fn truncate_chars(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// The 21 invoice values in template order.
pub fn invoice_values(record: &InvoiceRecord, invoice: &InvoiceConfig) -> Vec<CellValue> {
    let total = format_currency(record.total);
    let short_id = truncate_chars(record.client_id.as_deref().unwrap_or(""), CLIENT_ID_DISPLAY_CHARS);
    let eval = &record.evaluation_period;

    let mut values = vec![
        CellValue::text(eval.as_str()),
        CellValue::text(total.as_str()),
        CellValue::text(format!("Client Name(s): {}", record.client)),
        CellValue::text(short_id),
        CellValue::text(invoice.rate_label.as_str()),
        CellValue::text(format!("Billing Cycle: {eval}")),
        CellValue::text(invoice.address_label.as_str()),
        CellValue::text(format!("Fee Calculation {short_id}")),
    ];

    for slot in &record.periods {
        values.push(CellValue::text(slot.period_label.as_str()));
        values.push(CellValue::Number(slot.average_daily_balance.unwrap_or(Decimal::ZERO)));
        values.push(CellValue::Number(Decimal::from(slot.days_in_period.unwrap_or(0))));
        values.push(CellValue::text(format_currency(slot.fee.unwrap_or(Decimal::ZERO))));
    }

    values.push(CellValue::Text(total));
    values
}

/// One value destined for the top-left cell of `range`.
#[derive(Debug, Clone, PartialEq)]
pub struct CellWrite {
    pub range: CellRange,
    pub merge: bool,
    pub value: CellValue,
}

impl CellWrite {
    pub fn anchor(&self) -> CellRef {
        self.range.first
    }
}

/// Pair each invoice value with its template target.
pub fn cell_writes(record: &InvoiceRecord, invoice: &InvoiceConfig) -> Result<Vec<CellWrite>, BillingError> {
    let values = invoice_values(record, invoice);
    TEMPLATE_MAPPING
        .iter()
        .zip(values)
        .map(|(target, value)| {
            let range = CellRange::parse(target.range)?;
            Ok(CellWrite {
                range,
                // A one-cell "range" has nothing to merge.
                merge: target.merged && !range.is_single_cell(),
                value,
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Output naming
// ---------------------------------------------------------------------------

/// File name for a client's document: `<prefix><client>.xlsx` with path separators
/// replaced, so a client name can never leave the output directory.
pub fn document_file_name(client: &str, prefix: &str) -> String {
    let safe: String = client
        .chars()
        .map(|c| match c {
            '/' | '\\' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    format!("{prefix}{safe}.xlsx")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PeriodSlot;
    use rust_decimal_macros::dec;

    fn invoice() -> InvoiceRecord {
        let slot = |label: &str, fee| PeriodSlot {
            period_label: label.into(),
            average_daily_balance: Some(dec!(120000.5)),
            days_in_period: Some(31),
            fee: Some(fee),
        };
        InvoiceRecord {
            client: "Acme Corp".into(),
            advisor: Some("Jane".into()),
            client_id: Some("ACME-000123-XYZ".into()),
            periods: [slot("Jul 2025", dec!(100)), slot("Aug 2025", dec!(150.5)), slot("Sep 2025", dec!(200))],
            total: dec!(450.50),
            evaluation_period: "07/01/2025 - 09/30/2025".into(),
        }
    }

    #[test]
    fn parse_cell_ref() {
        assert_eq!(CellRef::parse("A1"), Some(CellRef { row: 0, col: 0 }));
        assert_eq!(CellRef::parse("B5"), Some(CellRef { row: 4, col: 1 }));
        assert_eq!(CellRef::parse("AA100"), Some(CellRef { row: 99, col: 26 }));
        assert_eq!(CellRef::parse("$E$21"), Some(CellRef { row: 20, col: 4 }));
        assert_eq!(CellRef::parse("A0"), None);
        assert_eq!(CellRef::parse("12"), None);
        assert_eq!(CellRef::parse("A1B"), None);
    }

    #[test]
    fn cell_ref_display_round_trips() {
        for r in ["A1", "E21", "Z9", "AA100", "XFD1"] {
            assert_eq!(CellRef::parse(r).unwrap().to_string(), r);
        }
    }

    #[test]
    fn parse_range() {
        let r = CellRange::parse("D12:E12").unwrap();
        assert_eq!(r.first, CellRef { row: 11, col: 3 });
        assert_eq!(r.last, CellRef { row: 11, col: 4 });
        assert!(!r.is_single_cell());
        assert!(CellRange::parse("B18:B18").unwrap().is_single_cell());
        assert!(CellRange::parse("nope").is_err());
    }

    #[test]
    fn range_overlap() {
        let a = CellRange::parse("A5:F5").unwrap();
        assert!(a.overlaps(&CellRange::parse("C5:D6").unwrap()));
        assert!(!a.overlaps(&CellRange::parse("A6:F6").unwrap()));
        assert!(a.contains(CellRef::parse("F5").unwrap()));
    }

    #[test]
    fn mapping_is_ordered_and_parses() {
        for (i, t) in TEMPLATE_MAPPING.iter().enumerate() {
            assert_eq!(t.slot as usize, i + 1);
            assert!(CellRange::parse(t.range).is_ok(), "{}", t.range);
        }
    }

    #[test]
    fn values_follow_template_order() {
        let values = invoice_values(&invoice(), &InvoiceConfig::default());
        assert_eq!(values.len(), TEMPLATE_MAPPING.len());
        assert_eq!(values[0], CellValue::Text("07/01/2025 - 09/30/2025".into()));
        assert_eq!(values[1], CellValue::Text("$450.50".into()));
        assert_eq!(values[2], CellValue::Text("Client Name(s): Acme Corp".into()));
        assert_eq!(values[3], CellValue::Text("ACME-00012".into()));
        assert_eq!(values[4], CellValue::Text("0.25%".into()));
        assert_eq!(values[5], CellValue::Text("Billing Cycle: 07/01/2025 - 09/30/2025".into()));
        assert_eq!(values[6], CellValue::Text("Address: ????".into()));
        assert_eq!(values[7], CellValue::Text("Fee Calculation ACME-00012".into()));
        assert_eq!(values[8], CellValue::Text("Jul 2025".into()));
        assert_eq!(values[9], CellValue::Number(dec!(120000.5)));
        assert_eq!(values[10], CellValue::Number(dec!(31)));
        assert_eq!(values[11], CellValue::Text("$100.00".into()));
        assert_eq!(values[15], CellValue::Text("$150.50".into()));
        assert_eq!(values[16], CellValue::Text("Sep 2025".into()));
        assert_eq!(values[20], CellValue::Text("$450.50".into()));
    }

    #[test]
    fn footer_uses_thousands_separator() {
        let mut inv = invoice();
        inv.total = dec!(12345.6);
        let values = invoice_values(&inv, &InvoiceConfig::default());
        assert_eq!(values[20], CellValue::Text("$12,345.60".into()));
    }

    #[test]
    fn missing_client_id_renders_blank() {
        let mut inv = invoice();
        inv.client_id = None;
        let values = invoice_values(&inv, &InvoiceConfig::default());
        assert_eq!(values[3], CellValue::Text(String::new()));
        assert_eq!(values[7], CellValue::Text("Fee Calculation ".into()));
    }

    #[test]
    fn writes_anchor_top_left_and_skip_single_cell_merges() {
        let writes = cell_writes(&invoice(), &InvoiceConfig::default()).unwrap();
        assert_eq!(writes.len(), 21);
        assert_eq!(writes[0].anchor().to_string(), "D12");
        assert!(writes[0].merge);
        assert_eq!(writes[20].anchor().to_string(), "E21");
        assert!(!writes[20].merge);
    }

    #[test]
    fn truncate_is_char_based() {
        assert_eq!(truncate_chars("ÅÄÖÅÄÖÅÄÖÅÄÖ", 10).chars().count(), 10);
        assert_eq!(truncate_chars("short", 10), "short");
    }

    #[test]
    fn file_name_replaces_separators() {
        assert_eq!(document_file_name("A/B Partners", "CF_invoice_"), "CF_invoice_A_B Partners.xlsx");
        assert_eq!(document_file_name("..\\..\\etc", "CF_invoice_"), "CF_invoice_.._.._etc.xlsx");
        let name = document_file_name("../../etc/passwd", "");
        assert!(!name.contains('/'));
        assert_eq!(std::path::Path::new(&name).components().count(), 1);
    }
}
