use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Where a record came from: source file and 1-based physical row.
#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    pub path: PathBuf,
    pub row: usize,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.path.display(), self.row)
    }
}

#[derive(Debug, Error)]
pub enum EocError {
    #[error("{}: no such file", .path.display())]
    SourceNotFound { path: PathBuf },

    #[error("{}: row {row} has {found} fields, expected {expected}", .path.display())]
    MalformedRow {
        path: PathBuf,
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("{location}: column `{column}` holds `{value}`, expected a finite positive number")]
    InvalidMeasurement {
        column: String,
        value: String,
        location: Location,
    },

    #[error("{location}: refinement `{axis}` = {h} repeats the previous level")]
    DegenerateRefinement {
        axis: String,
        h: f64,
        location: Location,
    },

    #[error("column `{column}` is produced twice ({reason})")]
    DuplicateColumn { column: String, reason: String },

    #[error("{context}: record is missing column `{column}`")]
    IncompleteRecord { column: String, context: String },

    #[error("scheme `{title}` has no rows")]
    EmptyScheme { title: String },

    #[error("{0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("config file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("could not serialize plot document: {0}")]
    Serialize(#[from] toml::ser::Error),
}

impl EocError {
    /// Taxonomy name printed in front of the message on failure.
    pub fn kind(&self) -> &'static str {
        match self {
            EocError::SourceNotFound { .. } => "SourceNotFoundError",
            EocError::MalformedRow { .. } => "MalformedRowError",
            EocError::InvalidMeasurement { .. } => "InvalidMeasurementError",
            EocError::DegenerateRefinement { .. } => "DegenerateRefinementError",
            EocError::DuplicateColumn { .. } => "DuplicateColumnError",
            EocError::IncompleteRecord { .. } => "IncompleteRecordError",
            EocError::EmptyScheme { .. } => "EmptySchemeError",
            EocError::Config(_) => "ConfigError",
            EocError::Io(_) => "IoError",
            EocError::Csv(_) => "CsvError",
            EocError::Toml(_) => "ConfigError",
            EocError::Serialize(_) => "SerializationError",
        }
    }

    /// The single stderr line for a failed run. Multi-line messages from
    /// wrapped parsers are folded onto one line.
    pub fn report(&self) -> String {
        let message = self.to_string();
        let message: Vec<&str> = message
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();
        format!("error: {}: {}", self.kind(), message.join(" "))
    }
}

pub type Result<T> = std::result::Result<T, EocError>;
