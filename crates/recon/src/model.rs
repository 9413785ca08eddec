use rust_decimal::Decimal;
use serde::Serialize;

use crate::config::PERIOD_COUNT;
use crate::error::BillingError;

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// One cell as read from a source sheet.
#[derive(Debug, Clone, PartialEq)]
pub enum RawCell {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
}

impl RawCell {
    /// Text form of the cell. Integral numbers are written without decimals.
    pub fn to_text(&self) -> String {
        match self {
            Self::Empty => String::new(),
            Self::Text(s) => s.clone(),
            Self::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    format!("{n}")
                }
            }
            Self::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
        }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(s) => s.trim().is_empty(),
            Self::Number(_) | Self::Bool(_) => false,
        }
    }
}

/// A raw monthly table: a grid of cells with absolute positions (row 0 = sheet row 1).
/// Rows may be ragged; missing trailing cells read as empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawSheet {
    pub rows: Vec<Vec<RawCell>>,
}

static EMPTY_CELL: RawCell = RawCell::Empty;

impl RawSheet {
    pub fn new(rows: Vec<Vec<RawCell>>) -> Self {
        Self { rows }
    }

    /// Build a sheet from text rows. Used by CSV sources and tests.
    pub fn from_text_rows<R, S>(rows: R) -> Self
    where
        R: IntoIterator,
        R::Item: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let rows = rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|s| {
                        let s: String = s.into();
                        if s.is_empty() {
                            RawCell::Empty
                        } else {
                            RawCell::Text(s)
                        }
                    })
                    .collect()
            })
            .collect();
        Self { rows }
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn width(&self) -> usize {
        self.rows.iter().map(|r| r.len()).max().unwrap_or(0)
    }

    pub fn cell(&self, row: usize, col: usize) -> &RawCell {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&EMPTY_CELL)
    }
}

/// One configured period's source, as handed to the pipeline.
///
/// `sheet` is an error when the file could not be read at all; the pipeline reports
/// it and carries on with the other periods.
#[derive(Debug, Clone)]
pub struct PeriodInput {
    /// File label used in diagnostics (usually the file name).
    pub source: String,
    pub sheet: Result<RawSheet, String>,
}

// ---------------------------------------------------------------------------
// Long form
// ---------------------------------------------------------------------------

/// Which optional columns a table carries. Computed once per table, unioned per run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FieldPresence {
    pub advisor: bool,
    pub client_id: bool,
    pub average_daily_balance: bool,
    pub days_in_period: bool,
    pub fee: bool,
}

impl FieldPresence {
    pub fn union(self, other: Self) -> Self {
        Self {
            advisor: self.advisor || other.advisor,
            client_id: self.client_id || other.client_id,
            average_daily_balance: self.average_daily_balance || other.average_daily_balance,
            days_in_period: self.days_in_period || other.days_in_period,
            fee: self.fee || other.fee,
        }
    }
}

/// One (client, period) observation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientPeriodRecord {
    pub client: String,
    pub advisor: String,
    pub client_id: String,
    pub average_daily_balance: Decimal,
    pub days_in_period: i64,
    pub fee: Decimal,
    pub period_label: String,
    /// Position of the record's source in the configured period sequence (0-based).
    pub period_index: usize,
}

/// Normalized records of one period plus load bookkeeping.
#[derive(Debug, Clone)]
pub struct LoadedPeriod {
    pub label: String,
    pub index: usize,
    pub records: Vec<ClientPeriodRecord>,
    pub presence: FieldPresence,
    /// Non-blank rows dropped (no client, missing advisor, repeated header).
    pub skipped_rows: usize,
    /// Data rows with a non-blank identity cell, kept or not.
    pub identity_cells: usize,
}

// ---------------------------------------------------------------------------
// Wide form
// ---------------------------------------------------------------------------

/// One period's values inside an invoice. `None` means the column was absent
/// from every source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodSlot {
    pub period_label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_daily_balance: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days_in_period: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fee: Option<Decimal>,
}

/// Pivoted client row before totals are attached.
#[derive(Debug, Clone, PartialEq)]
pub struct WideRow {
    pub client: String,
    pub advisor: Option<String>,
    pub client_id: Option<String>,
    pub periods: [PeriodSlot; PERIOD_COUNT],
}

/// One billable client for the quarter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvoiceRecord {
    pub client: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advisor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    pub periods: [PeriodSlot; PERIOD_COUNT],
    pub total: Decimal,
    pub evaluation_period: String,
}

impl From<&InvoiceRecord> for WideRow {
    fn from(record: &InvoiceRecord) -> Self {
        Self {
            client: record.client.clone(),
            advisor: record.advisor.clone(),
            client_id: record.client_id.clone(),
            periods: record.periods.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Diagnostics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodLoad {
    pub period: String,
    pub source: String,
    pub records: usize,
    pub skipped_rows: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadFailure {
    pub period: String,
    pub source: String,
    pub message: String,
}

/// A client dropped for not having exactly one record per period.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExcludedClient {
    pub client: String,
    pub record_count: usize,
    pub missing_periods: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub duplicated_periods: Vec<String>,
}

/// An admitted client whose advisor or client id differs between periods.
/// The first period's value is kept.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IdentityConflict {
    pub client: String,
    pub field: String,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderFailure {
    pub client: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunDiagnostics {
    pub loads: Vec<PeriodLoad>,
    pub load_failures: Vec<LoadFailure>,
    pub excluded: Vec<ExcludedClient>,
    pub identity_conflicts: Vec<IdentityConflict>,
    pub render_failures: Vec<RenderFailure>,
}

impl RunDiagnostics {
    /// True when anything short of a fatal error needs the operator's attention.
    pub fn has_issues(&self) -> bool {
        !self.load_failures.is_empty()
            || !self.excluded.is_empty()
            || !self.identity_conflicts.is_empty()
            || !self.render_failures.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Summary + Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub periods_loaded: usize,
    pub records_loaded: usize,
    pub clients_seen: usize,
    pub admitted: usize,
    pub excluded: usize,
    pub identity_conflicts: usize,
    pub load_failures: usize,
    pub total_billed: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunMeta {
    pub evaluation_period: String,
    pub periods: Vec<String>,
    pub engine_version: String,
    pub run_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunOutput {
    pub meta: RunMeta,
    pub summary: RunSummary,
    /// Wide-form column names present in this run, in fixed order.
    pub columns: Vec<String>,
    pub invoices: Vec<InvoiceRecord>,
    pub diagnostics: RunDiagnostics,
}

/// A fatal condition plus whatever was diagnosed before it.
#[derive(Debug, Clone)]
pub struct RunFailure {
    pub error: BillingError,
    pub diagnostics: RunDiagnostics,
}

impl std::fmt::Display for RunFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.error.fmt(f)
    }
}

impl std::error::Error for RunFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}
