// File I/O operations

pub mod archive;
pub mod csv;
pub mod render;
pub mod xlsx;
pub mod xlsx_template;

use std::path::Path;

use quarterbill_recon::model::{PeriodInput, RawSheet};

/// Read a monthly source, picking the reader from the file extension.
/// Unknown extensions are tried as workbooks.
pub fn read_source(path: &Path) -> Result<RawSheet, String> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "csv" | "txt" => csv::import(path),
        "tsv" | "tab" => csv::import_tsv(path),
        _ => xlsx::import(path),
    }
}

/// Read a monthly source into a pipeline input. A read failure is carried in the
/// input rather than returned, so the run can report it and continue.
pub fn period_input(path: &Path) -> PeriodInput {
    let source = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let sheet = read_source(path).map_err(|e| {
        log::warn!("cannot read {}: {}", path.display(), e);
        e
    });
    PeriodInput { source, sheet }
}
