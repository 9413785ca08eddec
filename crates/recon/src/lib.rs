//! `quarterbill-recon`: quarterly advisory-fee reconciliation pipeline.
//!
//! Pure engine crate: receives pre-read monthly sheets, returns per-client invoice
//! records plus diagnostics. No file or archive IO.

pub mod aggregate;
pub mod config;
pub mod engine;
pub mod error;
pub mod evidence;
pub mod layout;
pub mod loader;
pub mod merge;
pub mod model;
pub mod money;
pub mod reshape;

pub use config::RunConfig;
pub use engine::run;
pub use error::BillingError;
pub use model::{InvoiceRecord, PeriodInput, RawCell, RawSheet, RunDiagnostics, RunFailure, RunOutput};
