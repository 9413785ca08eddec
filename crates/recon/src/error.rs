use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BillingError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (wrong period count, duplicate label, etc.).
    ConfigValidation(String),
    /// A period source has the wrong shape (too few rows, identity column out of range).
    SourceShape { period: String, message: String },
    /// Every loaded period has a blank identity column, so nothing can be grouped.
    MissingIdentityColumn,
    /// Completeness filtering left no client to bill.
    NoAdmittedClients { excluded: usize },
    /// Cell range reference in the template mapping could not be parsed.
    CellRange(String),
}

impl fmt::Display for BillingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::SourceShape { period, message } => {
                write!(f, "period '{period}': {message}")
            }
            Self::MissingIdentityColumn => {
                write!(f, "no loaded period source has a client name in its identity column")
            }
            Self::NoAdmittedClients { excluded } => write!(
                f,
                "no client has exactly one record per period ({excluded} client(s) excluded)"
            ),
            Self::CellRange(r) => write!(f, "invalid cell range '{r}'"),
        }
    }
}

impl std::error::Error for BillingError {}
