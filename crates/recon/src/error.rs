use std::fmt;

/// Hard failures. Data-quality problems are never errors; they surface as
/// [`crate::model::Anomaly`] entries on the extracted record instead.
#[derive(Debug)]
pub enum ReconError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (negative tolerance, inverted period, etc.).
    ConfigValidation(String),
    /// A role the chosen strategy needs is absent from the column mapping.
    MissingRole { role: String, strategy: String },
    /// A required column is absent from an input file.
    MissingColumn { input: String, column: String },
    /// CSV reader / writer error.
    Csv(String),
    /// IO error (file read, etc.).
    Io(String),
}

impl fmt::Display for ReconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::MissingRole { role, strategy } => {
                write!(f, "strategy '{strategy}' requires a column mapping for role '{role}'")
            }
            Self::MissingColumn { input, column } => {
                write!(f, "{input}: missing column '{column}'")
            }
            Self::Csv(msg) => write!(f, "CSV error: {msg}"),
            Self::Io(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for ReconError {}

impl From<csv::Error> for ReconError {
    fn from(e: csv::Error) -> Self {
        Self::Csv(e.to_string())
    }
}

impl From<std::io::Error> for ReconError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}
