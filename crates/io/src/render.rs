// Per-client invoice rendering

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Serialize;

use quarterbill_recon::config::InvoiceConfig;
use quarterbill_recon::layout::{cell_writes, document_file_name};
use quarterbill_recon::model::{InvoiceRecord, RenderFailure};

use crate::xlsx_template::XlsxTemplate;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedDocument {
    pub client: String,
    pub path: PathBuf,
}

impl RenderedDocument {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RenderOutcome {
    pub documents: Vec<RenderedDocument>,
    pub failures: Vec<RenderFailure>,
}

/// Render one filled template per invoice into `out_dir`.
///
/// A client that cannot be rendered is recorded in `failures` and the rest carry on.
/// `progress` receives `(rendered, total)` after every written document. Only a
/// failure to create `out_dir` itself is returned as an error.
pub fn render_invoices<F>(
    template: &XlsxTemplate,
    invoices: &[InvoiceRecord],
    invoice: &InvoiceConfig,
    out_dir: &Path,
    mut progress: F,
) -> Result<RenderOutcome, String>
where
    F: FnMut(usize, usize),
{
    std::fs::create_dir_all(out_dir)
        .map_err(|e| format!("Failed to create {}: {}", out_dir.display(), e))?;

    let total = invoices.len();
    let mut outcome = RenderOutcome::default();
    let mut used_names: HashSet<String> = HashSet::new();

    for record in invoices {
        let file_name = unique_file_name(
            &document_file_name(&record.client, &invoice.file_prefix),
            &mut used_names,
        );
        let path = out_dir.join(&file_name);

        match render_one(template, record, invoice, &path) {
            Ok(()) => {
                outcome.documents.push(RenderedDocument {
                    client: record.client.clone(),
                    path,
                });
                let rendered = outcome.documents.len();
                log::info!("rendered {rendered}/{total}: {file_name}");
                progress(rendered, total);
            }
            Err(message) => {
                log::warn!("cannot render invoice for '{}': {}", record.client, message);
                outcome.failures.push(RenderFailure {
                    client: record.client.clone(),
                    message,
                });
            }
        }
    }

    Ok(outcome)
}

fn render_one(
    template: &XlsxTemplate,
    record: &InvoiceRecord,
    invoice: &InvoiceConfig,
    path: &Path,
) -> Result<(), String> {
    let writes = cell_writes(record, invoice).map_err(|e| e.to_string())?;
    let bytes = template.fill(&writes)?;
    std::fs::write(path, bytes).map_err(|e| format!("Failed to write {}: {}", path.display(), e))
}

/// Claim `name`, or `name (n)` with the smallest free `n >= 2`. Names compare
/// case-insensitively since the archive may be unpacked on such a file system.
fn unique_file_name(name: &str, used: &mut HashSet<String>) -> String {
    if used.insert(name.to_lowercase()) {
        return name.to_string();
    }
    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) => (stem, format!(".{ext}")),
        None => (name, String::new()),
    };
    let mut n = 2;
    loop {
        let candidate = format!("{stem} ({n}){ext}");
        if used.insert(candidate.to_lowercase()) {
            return candidate;
        }
        n += 1;
    }
}
