use serde::{Deserialize, Serialize};

use crate::error::BillingError;

/// Number of monthly periods that make up one billing quarter.
pub const PERIOD_COUNT: usize = 3;

pub const DEFAULT_EVALUATION_PERIOD: &str = "07/01/2025 - 09/30/2025";
pub const DEFAULT_PERIODS: [&str; PERIOD_COUNT] = ["Jul 2025", "Aug 2025", "Sep 2025"];

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Immutable parameters for one billing run.
///
/// `periods` is ordered: the first label belongs to the first source, and so on.
/// That order, not the label text, decides which slot a record lands in.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RunConfig {
    #[serde(default = "default_evaluation_period")]
    pub evaluation_period: String,
    #[serde(default = "default_periods")]
    pub periods: Vec<String>,
    #[serde(default)]
    pub layout: LayoutConfig,
    #[serde(default)]
    pub invoice: InvoiceConfig,
}

fn default_evaluation_period() -> String {
    DEFAULT_EVALUATION_PERIOD.to_string()
}

fn default_periods() -> Vec<String> {
    DEFAULT_PERIODS.iter().map(|p| p.to_string()).collect()
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            evaluation_period: default_evaluation_period(),
            periods: default_periods(),
            layout: LayoutConfig::default(),
            invoice: InvoiceConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Source layout
// ---------------------------------------------------------------------------

/// Fixed shape of a monthly source sheet.
///
/// Row `skip_rows` (0-based) is the header row. Column `identity_column` holds the
/// client name. The first `skip_columns` of the remaining columns are an index band
/// and carry no data.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LayoutConfig {
    #[serde(default = "default_skip_rows")]
    pub skip_rows: usize,
    #[serde(default = "default_identity_column")]
    pub identity_column: usize,
    #[serde(default = "default_skip_columns")]
    pub skip_columns: usize,
}

fn default_skip_rows() -> usize {
    6
}

fn default_identity_column() -> usize {
    1
}

fn default_skip_columns() -> usize {
    1
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            skip_rows: default_skip_rows(),
            identity_column: default_identity_column(),
            skip_columns: default_skip_columns(),
        }
    }
}

// ---------------------------------------------------------------------------
// Invoice text + output naming
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct InvoiceConfig {
    #[serde(default = "default_rate_label")]
    pub rate_label: String,
    #[serde(default = "default_address_label")]
    pub address_label: String,
    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,
    /// Directory name documents are grouped under inside the archive.
    #[serde(default = "default_output_subdir")]
    pub output_subdir: String,
}

fn default_rate_label() -> String {
    "0.25%".into()
}

fn default_address_label() -> String {
    "Address: ????".into()
}

fn default_file_prefix() -> String {
    "CF_invoice_".into()
}

fn default_output_subdir() -> String {
    "XLSX".into()
}

impl Default for InvoiceConfig {
    fn default() -> Self {
        Self {
            rate_label: default_rate_label(),
            address_label: default_address_label(),
            file_prefix: default_file_prefix(),
            output_subdir: default_output_subdir(),
        }
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl RunConfig {
    pub fn from_toml(input: &str) -> Result<Self, BillingError> {
        let config: RunConfig =
            toml::from_str(input).map_err(|e| BillingError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), BillingError> {
        if self.periods.len() != PERIOD_COUNT {
            return Err(BillingError::ConfigValidation(format!(
                "exactly {PERIOD_COUNT} period labels are required, got {}",
                self.periods.len()
            )));
        }

        for (i, label) in self.periods.iter().enumerate() {
            if label.trim().is_empty() {
                return Err(BillingError::ConfigValidation(format!(
                    "period {} has an empty label",
                    i + 1
                )));
            }
            // Labels name the missing periods in exclusion reports, so they must be unique.
            if self.periods[..i].contains(label) {
                return Err(BillingError::ConfigValidation(format!(
                    "duplicate period label '{label}'"
                )));
            }
        }

        if self.invoice.output_subdir.contains(['/', '\\'])
            || self.invoice.output_subdir.trim().is_empty()
            || self.invoice.output_subdir == ".."
        {
            return Err(BillingError::ConfigValidation(format!(
                "output_subdir must be a single directory name, got '{}'",
                self.invoice.output_subdir
            )));
        }

        if self.invoice.file_prefix.contains(['/', '\\']) {
            return Err(BillingError::ConfigValidation(
                "file_prefix must not contain path separators".into(),
            ));
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
