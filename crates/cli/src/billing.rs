//! `qbill run` / `qbill preview` / `qbill validate`: quarterly invoice runs.

use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use serde::Serialize;

use quarterbill_io::archive::write_archive;
use quarterbill_io::period_input;
use quarterbill_io::render::render_invoices;
use quarterbill_io::xlsx::export_wide_table;
use quarterbill_io::xlsx_template::XlsxTemplate;
use quarterbill_recon::config::PERIOD_COUNT;
use quarterbill_recon::layout::CellValue;
use quarterbill_recon::model::{RunDiagnostics, RunFailure, RunOutput};
use quarterbill_recon::money::format_currency;
use quarterbill_recon::reshape::flat_values;
use quarterbill_recon::{BillingError, RunConfig};

use crate::exit_codes::{EXIT_COMPLETED_WITH_ISSUES, EXIT_INVALID_CONFIG, EXIT_IO, EXIT_PIPELINE_FATAL};
use crate::{CliError, PipelineArgs};

fn billing_err(code: u8, msg: impl Into<String>) -> CliError {
    CliError::new(code, msg)
}

// ============================================================================
// Config
// ============================================================================

fn load_config(path: &Path) -> Result<RunConfig, CliError> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        billing_err(EXIT_INVALID_CONFIG, format!("cannot read config {}: {e}", path.display()))
    })?;
    RunConfig::from_toml(&text).map_err(|e| billing_err(EXIT_INVALID_CONFIG, e.to_string()))
}

/// Config file (or defaults) with command-line overrides applied.
fn resolve_config(args: &PipelineArgs) -> Result<RunConfig, CliError> {
    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => RunConfig::default(),
    };

    if let Some(evaluation) = &args.evaluation {
        config.evaluation_period = evaluation.clone();
    }
    if !args.periods.is_empty() {
        if args.periods.len() != PERIOD_COUNT {
            return Err(CliError::usage(format!(
                "--period given {} time(s), expected {PERIOD_COUNT}",
                args.periods.len()
            ))
            .with_hint("pass --period once per source, in source order"));
        }
        config.periods = args.periods.clone();
    }

    config
        .validate()
        .map_err(|e| billing_err(EXIT_INVALID_CONFIG, e.to_string()))?;
    tracing::debug!(?config, "resolved run config");
    Ok(config)
}

// ============================================================================
// Pipeline
// ============================================================================

fn run_pipeline(args: &PipelineArgs, config: &RunConfig) -> Result<RunOutput, CliError> {
    let inputs = args.sources.iter().map(|path| period_input(path)).collect();
    quarterbill_recon::run(config, inputs).map_err(fatal)
}

fn fatal(failure: RunFailure) -> CliError {
    print_diagnostics(&failure.diagnostics);

    let code = match failure.error {
        BillingError::ConfigParse(_) | BillingError::ConfigValidation(_) => EXIT_INVALID_CONFIG,
        _ => EXIT_PIPELINE_FATAL,
    };
    let hint = match failure.error {
        BillingError::MissingIdentityColumn => {
            Some("check the layout: the client name is read from the identity column below the header row")
        }
        BillingError::NoAdmittedClients { .. } => {
            Some("a client is billed only when it appears once in every period source")
        }
        _ => None,
    };

    let err = billing_err(code, failure.error.to_string());
    match hint {
        Some(hint) => err.with_hint(hint),
        None => err,
    }
}

fn exit_for(diagnostics: &RunDiagnostics) -> Result<(), CliError> {
    if diagnostics.has_issues() {
        return Err(CliError::silent(EXIT_COMPLETED_WITH_ISSUES));
    }
    Ok(())
}

// ============================================================================
// run
// ============================================================================

#[derive(Serialize)]
struct ArchiveReport {
    path: String,
    members: Vec<String>,
}

#[derive(Serialize)]
struct RunReport<'a> {
    #[serde(flatten)]
    run: &'a RunOutput,
    archive: ArchiveReport,
}

pub fn cmd_run(pipeline: PipelineArgs, template: PathBuf, output: PathBuf, json: bool) -> Result<(), CliError> {
    let config = resolve_config(&pipeline)?;
    let template = XlsxTemplate::open(&template).map_err(|e| billing_err(EXIT_IO, e))?;

    let mut run = run_pipeline(&pipeline, &config)?;

    // Documents are rendered into a scratch directory that is removed on every exit path.
    let workdir = tempfile::tempdir()
        .map_err(|e| billing_err(EXIT_IO, format!("cannot create working directory: {e}")))?;
    let subdir = &config.invoice.output_subdir;
    let out_dir = workdir.path().join(subdir);

    let show_progress = !json && std::io::stderr().is_terminal();
    let outcome = render_invoices(&template, &run.invoices, &config.invoice, &out_dir, |done, total| {
        if show_progress {
            eprint!("\rrendering {done}/{total}");
        }
    })
    .map_err(|e| billing_err(EXIT_IO, e))?;
    if show_progress {
        eprintln!();
    }

    run.diagnostics.render_failures = outcome.failures;
    if outcome.documents.is_empty() {
        print_diagnostics(&run.diagnostics);
        return Err(billing_err(EXIT_IO, "no invoice could be rendered; archive not written"));
    }

    write_archive(&output, subdir, &outcome.documents).map_err(|e| billing_err(EXIT_IO, e))?;

    if json {
        let report = RunReport {
            run: &run,
            archive: ArchiveReport {
                path: output.display().to_string(),
                members: outcome
                    .documents
                    .iter()
                    .map(|doc| format!("{subdir}/{}", doc.file_name()))
                    .collect(),
            },
        };
        print_json(&report)?;
    }

    print_summary(&run);
    eprintln!("wrote {} invoice(s) to {}", outcome.documents.len(), output.display());
    exit_for(&run.diagnostics)
}

// ============================================================================
// preview
// ============================================================================

pub fn cmd_preview(pipeline: PipelineArgs, json: bool, export: Option<PathBuf>) -> Result<(), CliError> {
    let config = resolve_config(&pipeline)?;
    let run = run_pipeline(&pipeline, &config)?;

    if let Some(path) = &export {
        export_wide_table(&run, path).map_err(|e| billing_err(EXIT_IO, e))?;
        eprintln!("wrote {}", path.display());
    }

    if json {
        print_json(&run)?;
    } else {
        print_table(&run);
    }

    print_summary(&run);
    exit_for(&run.diagnostics)
}

fn print_table(run: &RunOutput) {
    let header: Vec<&str> = run.columns.iter().map(String::as_str).chain(["Total"]).collect();
    println!("{}", header.join("\t"));

    for invoice in &run.invoices {
        let mut cells: Vec<String> = flat_values(invoice, &run.columns)
            .into_iter()
            .map(|value| match value {
                CellValue::Text(text) => text,
                CellValue::Number(n) => n.normalize().to_string(),
            })
            .collect();
        cells.push(format_currency(invoice.total));
        println!("{}", cells.join("\t"));
    }
}

// ============================================================================
// validate
// ============================================================================

pub fn cmd_validate(config_path: PathBuf) -> Result<(), CliError> {
    let config = load_config(&config_path)?;
    eprintln!(
        "config ok: {} ({})",
        config.evaluation_period,
        config.periods.join(", ")
    );
    Ok(())
}

// ============================================================================
// Output
// ============================================================================

fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    let json_str = serde_json::to_string_pretty(value)
        .map_err(|e| CliError::internal(format!("JSON serialization error: {e}")))?;
    println!("{json_str}");
    Ok(())
}

/// Human summary to stderr.
fn print_summary(run: &RunOutput) {
    let s = &run.summary;
    eprintln!(
        "{}: {} client(s) seen, {} invoiced, {} excluded, {} billed",
        run.meta.evaluation_period,
        s.clients_seen,
        s.admitted,
        s.excluded,
        format_currency(s.total_billed),
    );
    print_diagnostics(&run.diagnostics);
}

fn print_diagnostics(diagnostics: &RunDiagnostics) {
    for failure in &diagnostics.load_failures {
        eprintln!("  load failed: {} ({}): {}", failure.period, failure.source, failure.message);
    }
    for client in &diagnostics.excluded {
        let mut line = format!("  excluded: {}", client.client);
        if !client.missing_periods.is_empty() {
            line.push_str(&format!(" (missing {})", client.missing_periods.join(", ")));
        }
        if !client.duplicated_periods.is_empty() {
            line.push_str(&format!(" (duplicated {})", client.duplicated_periods.join(", ")));
        }
        eprintln!("{line}");
    }
    for conflict in &diagnostics.identity_conflicts {
        eprintln!(
            "  {} differs for {}: {}",
            conflict.field,
            conflict.client,
            conflict.values.join(" / ")
        );
    }
    for failure in &diagnostics.render_failures {
        eprintln!("  render failed: {}: {}", failure.client, failure.message);
    }
}
