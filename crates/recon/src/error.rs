use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconError {
    /// None of the accepted aliases resolved to a column (and no positional fallback applied).
    MissingColumn { dataset: String, aliases: Vec<String> },
    /// The right side of a many-to-one join holds more than one row for a key.
    ManyToOneViolation { key: String, rows: usize },
    /// Neither a creation date nor a decision date column could be located.
    NoDateColumns { available: Vec<String> },
    /// A date column exists but holds no usable dates.
    NoValidDates { column: String },
    /// Filtering left nothing to analyze.
    NoRecordsInRange { range: String },
}

impl fmt::Display for ReconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingColumn { dataset, aliases } => {
                write!(f, "{dataset}: required column missing, none of {aliases:?} found in columns")
            }
            Self::ManyToOneViolation { key, rows } => {
                write!(f, "merge keys are not unique in right dataset: key '{key}' has {rows} rows (expected many-to-one)")
            }
            Self::NoDateColumns { available } => {
                write!(f, "no date columns found; available columns: {}", available.join(", "))
            }
            Self::NoValidDates { column } => {
                write!(f, "column '{column}' has no valid dates (dates must be after 2000-01-01)")
            }
            Self::NoRecordsInRange { range } => write!(f, "no records found in selected date range ({range})"),
        }
    }
}

impl std::error::Error for ReconError {}
