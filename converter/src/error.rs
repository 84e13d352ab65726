//! Error types for the pricing conversion pipeline.
//!
//! - [`PriceError`] - decoding a single "Price in Json" cell, without row context
//! - [`ConvertError`] - everything the loader, transformer and writer can fail with
//!
//! A [`PriceError`] becomes a [`ConvertError::MalformedPrice`] once the row it
//! came from is known, via [`PriceError::at_row`].

use std::path::PathBuf;

use thiserror::Error;

// =============================================================================
// Price Decoding Errors
// =============================================================================

/// Errors while decoding one price blob.
#[derive(Debug, Error)]
pub enum PriceError {
    /// The cell is not valid JSON.
    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// Valid JSON, but neither a list of entries nor a region mapping.
    #[error("expected a list or a region mapping, found {0}")]
    UnexpectedShape(&'static str),

    /// An entry is structurally wrong (not an object, no region, ...).
    #[error("entry {entry}: {message}")]
    InvalidEntry { entry: String, message: String },

    /// An amount could not be read as a decimal number.
    #[error("{region}: amount '{value}' is not a number")]
    InvalidAmount { region: String, value: String },

    /// Prices are never negative.
    #[error("{region}: negative amount {value}")]
    NegativeAmount { region: String, value: String },

    /// The entry names a currency other than the region's own.
    #[error("{region} price quoted in {found}, expected {expected}")]
    CurrencyMismatch {
        region: String,
        expected: &'static str,
        found: String,
    },

    /// The same region is priced twice in one blob.
    #[error("region {0} appears more than once")]
    DuplicateRegion(String),
}

impl PriceError {
    /// Attach the 1-based row index the blob was read from.
    pub fn at_row(self, row: usize) -> ConvertError {
        ConvertError::MalformedPrice { row, source: self }
    }
}

// =============================================================================
// Conversion Errors (top-level)
// =============================================================================

/// Top-level errors returned by the loader, transformer, writer and pipeline.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// Required column header(s) not found in the source file.
    #[error("Missing required column(s): {}", missing.join(", "))]
    Schema { missing: Vec<String> },

    /// The "Price in Json" cell of a row could not be decoded.
    #[error("Row {row}: malformed price data: {source}")]
    MalformedPrice {
        row: usize,
        #[source]
        source: PriceError,
    },

    /// A region outside the catalog scope was found under the strict policy.
    #[error("Row {row}: unsupported region '{region}' (expected US or CA)")]
    UnsupportedRegion { row: usize, region: String },

    /// Reading the source or writing the destination failed.
    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A record could not be read or written as delimited text.
    #[error("Row {row}: {source}")]
    Csv {
        row: usize,
        #[source]
        source: csv::Error,
    },

    /// Delimited text failed outside any data row (preamble, header, flush).
    #[error("CSV error{}: {source}", at_line(*line))]
    CsvFormat {
        line: Option<u64>,
        #[source]
        source: csv::Error,
    },

    /// The workbook could not be opened, read or saved.
    #[error("Workbook error: {0}")]
    Workbook(String),

    /// The workbook has no sheet with the configured name.
    #[error("Sheet '{sheet}' not found (available: {})", available.join(", "))]
    MissingSheet { sheet: String, available: Vec<String> },

    /// The run summary could not be serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The source file holds no records at all.
    #[error("Input file is empty")]
    EmptyInput,

    /// Invalid configuration value (environment or command line).
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ConvertError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Wrap a csv error that has no data row, keeping the line it occurred on.
    pub(crate) fn csv_format(source: csv::Error) -> Self {
        let line = source.position().map(|p| p.line());
        Self::CsvFormat { line, source }
    }

    /// The 1-based row index the error refers to, if any.
    pub fn row(&self) -> Option<usize> {
        match self {
            Self::MalformedPrice { row, .. }
            | Self::UnsupportedRegion { row, .. }
            | Self::Csv { row, .. } => Some(*row),
            _ => None,
        }
    }
}

fn at_line(line: Option<u64>) -> String {
    line.map(|l| format!(" on line {}", l)).unwrap_or_default()
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for price decoding.
pub type PriceResult<T> = Result<T, PriceError>;

/// Result type for conversion operations.
pub type ConvertResult<T> = Result<T, ConvertError>;
