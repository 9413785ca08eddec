// Excel file import and export
// Import: monthly sources (xlsx, xlsm, xls, xlsb, ods) via calamine
// Export: wide-table preview workbook via rust_xlsxwriter

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader, Sheets};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_xlsxwriter::{Format, Workbook, Worksheet};

use quarterbill_recon::layout::CellValue;
use quarterbill_recon::loader::COL_FEE;
use quarterbill_recon::model::{RawCell, RawSheet, RunOutput};
use quarterbill_recon::reshape::flat_values;

// =============================================================================
// Import
// =============================================================================

/// Import the first worksheet of a workbook as a raw grid.
///
/// Cells keep their absolute position: a used range starting at C3 yields two empty
/// leading rows and two empty leading columns, so the fixed layout offsets still apply.
pub fn import(path: &Path) -> Result<RawSheet, String> {
    let mut workbook: Sheets<_> =
        open_workbook_auto(path).map_err(|e| format!("Failed to open Excel file: {}", e))?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| "Excel file contains no sheets".to_string())?;

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| format!("Failed to read sheet '{}': {}", sheet_name, e))?;

    let (start_row, start_col) = range
        .start()
        .map(|(r, c)| (r as usize, c as usize))
        .unwrap_or((0, 0));

    let mut rows: Vec<Vec<RawCell>> = vec![Vec::new(); start_row];
    for row in range.rows() {
        let mut cells = vec![RawCell::Empty; start_col];
        cells.extend(row.iter().map(convert_cell));
        rows.push(cells);
    }

    log::debug!(
        "read {} row(s) from sheet '{}' of {}",
        rows.len(),
        sheet_name,
        path.display()
    );
    Ok(RawSheet::new(rows))
}

fn convert_cell(cell: &Data) -> RawCell {
    match cell {
        Data::Empty => RawCell::Empty,
        Data::String(s) if s.is_empty() => RawCell::Empty,
        Data::String(s) => RawCell::Text(s.clone()),
        Data::Float(n) => RawCell::Number(*n),
        Data::Int(n) => RawCell::Number(*n as f64),
        Data::Bool(b) => RawCell::Bool(*b),
        // Error cells carry no amount; their text cleans to zero downstream.
        Data::Error(e) => RawCell::Text(format!("#{:?}", e)),
        Data::DateTime(dt) => RawCell::Number(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => RawCell::Text(s.clone()),
    }
}

// =============================================================================
// Export
// =============================================================================

/// Write the wide table of a run (one row per admitted client, columns as reported
/// by the run) plus an `Excluded` sheet listing incomplete clients.
pub fn export_wide_table(output: &RunOutput, path: &Path) -> Result<(), String> {
    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();
    let money_format = Format::new().set_num_format("$#,##0.00");

    let worksheet = workbook.add_worksheet();
    worksheet
        .set_name("Invoices")
        .map_err(|e| format!("Failed to name sheet: {}", e))?;
    write_header(worksheet, &output.columns, "Total", &header_format)?;

    for (i, invoice) in output.invoices.iter().enumerate() {
        let row = (i + 1) as u32;
        let values = flat_values(invoice, &output.columns);
        for (col, (name, value)) in output.columns.iter().zip(values).enumerate() {
            let col = col as u16;
            let written = match value {
                CellValue::Text(text) => worksheet.write_string(row, col, text),
                CellValue::Number(n) if name.starts_with(COL_FEE) => {
                    worksheet.write_number_with_format(row, col, to_f64(n), &money_format)
                }
                CellValue::Number(n) => worksheet.write_number(row, col, to_f64(n)),
            };
            written.map_err(|e| format!("Failed to write column '{}': {}", name, e))?;
        }
        let total_col = output.columns.len() as u16;
        worksheet
            .write_number_with_format(row, total_col, to_f64(invoice.total), &money_format)
            .map_err(|e| format!("Failed to write total: {}", e))?;
    }
    worksheet
        .set_freeze_panes(1, 0)
        .map_err(|e| format!("Failed to freeze header: {}", e))?;

    let excluded = workbook.add_worksheet();
    excluded
        .set_name("Excluded")
        .map_err(|e| format!("Failed to name sheet: {}", e))?;
    let headers = ["Client".to_string(), "Records".to_string(), "Missing Periods".to_string()];
    write_header(excluded, &headers[..2], &headers[2], &header_format)?;
    for (i, client) in output.diagnostics.excluded.iter().enumerate() {
        let row = (i + 1) as u32;
        excluded
            .write_string(row, 0, &client.client)
            .and_then(|ws| ws.write_number(row, 1, client.record_count as f64))
            .and_then(|ws| ws.write_string(row, 2, client.missing_periods.join(", ")))
            .map_err(|e| format!("Failed to write excluded client: {}", e))?;
    }

    workbook
        .save(path)
        .map_err(|e| format!("Failed to save Excel file: {}", e))?;
    Ok(())
}

fn write_header(
    worksheet: &mut Worksheet,
    columns: &[String],
    last: &str,
    format: &Format,
) -> Result<(), String> {
    for (col, name) in columns.iter().map(String::as_str).chain([last]).enumerate() {
        worksheet
            .write_string_with_format(0, col as u16, name, format)
            .map_err(|e| format!("Failed to write header: {}", e))?;
    }
    Ok(())
}

fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

// =============================================================================
// Tests
// =============================================================================
