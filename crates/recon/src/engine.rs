use crate::aggregate::aggregate_rows;
use crate::config::RunConfig;
use crate::error::BillingError;
use crate::evidence::compute_summary;
use crate::loader::load_period;
use crate::merge::{admit_complete, concat_periods};
use crate::model::{
    LoadFailure, PeriodInput, PeriodLoad, RunDiagnostics, RunFailure, RunMeta, RunOutput,
};
use crate::reshape::{flat_column_names, pivot_wide};

/// Run the billing pipeline: load → merge/validate → reshape → aggregate.
///
/// `inputs` are the period sources in configured order. Per-period load failures and
/// incomplete clients are reported in the diagnostics; only an identity column that
/// is blank in every loaded period, or an empty admitted set, fails the run.
pub fn run(config: &RunConfig, inputs: Vec<PeriodInput>) -> Result<RunOutput, RunFailure> {
    let mut diagnostics = RunDiagnostics::default();

    let fail = |error: BillingError, diagnostics: RunDiagnostics| RunFailure { error, diagnostics };

    if let Err(error) = config.validate() {
        return Err(fail(error, diagnostics));
    }
    if inputs.len() != config.periods.len() {
        let error = BillingError::ConfigValidation(format!(
            "{} period label(s) configured but {} source(s) supplied",
            config.periods.len(),
            inputs.len()
        ));
        return Err(fail(error, diagnostics));
    }

    // Load
    let mut loaded = Vec::with_capacity(inputs.len());
    for (index, (input, label)) in inputs.into_iter().zip(&config.periods).enumerate() {
        let result = input
            .sheet
            .and_then(|sheet| load_period(&sheet, label, index, &config.layout).map_err(|e| e.to_string()));
        match result {
            Ok(period) => {
                log::info!(
                    "loaded {} record(s) for {label} from {}",
                    period.records.len(),
                    input.source
                );
                diagnostics.loads.push(PeriodLoad {
                    period: label.clone(),
                    source: input.source,
                    records: period.records.len(),
                    skipped_rows: period.skipped_rows,
                });
                loaded.push(period);
            }
            Err(message) => {
                log::error!("cannot load {label} from {}: {message}", input.source);
                diagnostics.load_failures.push(LoadFailure {
                    period: label.clone(),
                    source: input.source,
                    message,
                });
            }
        }
    }

    // Merge + validate
    let merged = match concat_periods(loaded) {
        Ok(merged) => merged,
        Err(error) => return Err(fail(error, diagnostics)),
    };
    let admission = admit_complete(merged.records, &config.periods);
    diagnostics.excluded = admission.excluded;

    if admission.admitted.is_empty() {
        let error = BillingError::NoAdmittedClients {
            excluded: diagnostics.excluded.len(),
        };
        return Err(fail(error, diagnostics));
    }
    log::info!(
        "{} client(s) admitted, {} excluded",
        admission.admitted.len(),
        diagnostics.excluded.len()
    );

    // Reshape + aggregate
    let wide = pivot_wide(&admission.admitted, &merged.presence, &mut diagnostics.identity_conflicts);
    let invoices = aggregate_rows(wide, &config.evaluation_period);

    let summary = compute_summary(&invoices, &diagnostics);

    Ok(RunOutput {
        meta: RunMeta {
            evaluation_period: config.evaluation_period.clone(),
            periods: config.periods.clone(),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
        },
        summary,
        columns: flat_column_names(&merged.presence),
        invoices,
        diagnostics,
    })
}
