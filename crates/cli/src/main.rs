// qbill - quarterly advisory-fee invoices from three monthly fee reports

mod billing;
mod exit_codes;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use exit_codes::{EXIT_ERROR, EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "qbill")]
#[command(about = "Build per-client quarterly fee invoices from three monthly reports")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    /// Debug logging (RUST_LOG takes precedence)
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Inputs shared by every command that runs the pipeline.
#[derive(Args, Debug)]
pub struct PipelineArgs {
    /// The three monthly sources, in period order (xlsx, xls, xlsb, ods, csv, tsv)
    #[arg(num_args = 3, required = true, value_name = "SOURCE")]
    pub sources: Vec<PathBuf>,

    /// Run config (TOML); built-in defaults apply when omitted
    #[arg(long, short = 'c', env = "QBILL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Evaluation period printed on every invoice
    #[arg(long, value_name = "LABEL")]
    pub evaluation: Option<String>,

    /// Period label, once per source in source order
    #[arg(long = "period", value_name = "LABEL")]
    pub periods: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline and write the invoice archive
    #[command(after_help = "\
Examples:
  qbill run jul.xlsx aug.xlsx sep.xlsx --template invoice.xlsx
  qbill run jul.csv aug.csv sep.csv -t invoice.xlsx -o q3_invoices.zip
  qbill run oct.xlsx nov.xlsx dec.xlsx -t invoice.xlsx \\
      --evaluation '10/01/2025 - 12/31/2025' \\
      --period 'Oct 2025' --period 'Nov 2025' --period 'Dec 2025'
  qbill run jul.xlsx aug.xlsx sep.xlsx -t invoice.xlsx --config q3.toml --json")]
    Run {
        #[command(flatten)]
        pipeline: PipelineArgs,

        /// Invoice template workbook
        #[arg(long, short = 't')]
        template: PathBuf,

        /// Archive to write
        #[arg(long, short = 'o', default_value = "consultant_invoices_xlsx.zip")]
        output: PathBuf,

        /// Print the run report as JSON to stdout
        #[arg(long)]
        json: bool,
    },

    /// Run the pipeline without rendering and show the invoice table
    #[command(after_help = "\
Examples:
  qbill preview jul.xlsx aug.xlsx sep.xlsx
  qbill preview jul.csv aug.csv sep.csv --json | jq '.diagnostics.excluded'
  qbill preview jul.xlsx aug.xlsx sep.xlsx --export q3_preview.xlsx")]
    Preview {
        #[command(flatten)]
        pipeline: PipelineArgs,

        /// Print the run as JSON to stdout instead of a table
        #[arg(long)]
        json: bool,

        /// Also write the invoice table to a workbook
        #[arg(long, value_name = "XLSX")]
        export: Option<PathBuf>,
    },

    /// Validate a run config without running
    #[command(after_help = "\
Examples:
  qbill validate q3.toml")]
    Validate {
        /// Path to the run config
        config: PathBuf,
    },
}

fn long_version() -> &'static str {
    if cfg!(debug_assertions) {
        concat!(
            env!("CARGO_PKG_VERSION"),
            "\nengine:  quarterbill-recon ", env!("CARGO_PKG_VERSION"),
            "\nbuild:   debug",
        )
    } else {
        concat!(
            env!("CARGO_PKG_VERSION"),
            "\nengine:  quarterbill-recon ", env!("CARGO_PKG_VERSION"),
            "\nbuild:   release",
        )
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Run { pipeline, template, output, json } => {
            billing::cmd_run(pipeline, template, output, json)
        }
        Commands::Preview { pipeline, json, export } => billing::cmd_preview(pipeline, json, export),
        Commands::Validate { config } => billing::cmd_validate(config),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    pub fn usage(msg: impl Into<String>) -> Self {
        Self::new(EXIT_USAGE, msg)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(EXIT_ERROR, msg)
    }

    /// An exit code with nothing to print; the command already reported on stderr.
    pub fn silent(code: u8) -> Self {
        Self::new(code, String::new())
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}
