use std::fmt;

/// Database messages are cut to this many characters before surfacing.
pub const MAX_DB_MESSAGE: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// SQLite rejected a statement; message verbatim, truncated.
    Database(String),
    /// The database file or its directory could not be created.
    Io(String),
    /// A required column is absent from the uploaded file.
    MissingColumn { column: String },
    /// The upload shares no columns with the existing table.
    NoCommonColumns { table: String },
    /// Console query contains a data-modifying keyword.
    UnsafeQuery { keyword: String },
    /// Console query passed the denylist but SQLite reports it would write.
    WriteStatement,
    /// Nothing left to load once blank and duplicate ids are dropped.
    NoRows,
    TableNotFound { table: String },
}

impl StoreError {
    pub fn database(message: impl Into<String>) -> Self {
        let message: String = message.into();
        Self::Database(message.chars().take(MAX_DB_MESSAGE).collect())
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Database(msg) => write!(f, "database error: {msg}"),
            Self::Io(msg) => write!(f, "{msg}"),
            Self::MissingColumn { column } => write!(f, "required column '{column}' not found in file"),
            Self::NoCommonColumns { table } => {
                write!(f, "no matching columns between the file and table '{table}'")
            }
            Self::UnsafeQuery { keyword } => write!(
                f,
                "dangerous keyword '{keyword}' detected. Only SELECT queries are allowed"
            ),
            Self::WriteStatement => {
                write!(f, "statement would modify the database. Only SELECT queries are allowed")
            }
            Self::NoRows => write!(f, "no rows to process"),
            Self::TableNotFound { table } => write!(f, "table '{table}' does not exist"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        Self::database(e.to_string())
    }
}
