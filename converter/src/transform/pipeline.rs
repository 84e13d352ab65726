//! High-level pipeline: load the export, transform every row, write the sheet.
//!
//! # Example
//!
//! ```rust,ignore
//! use priceflat::{convert_file, ConvertOptions};
//! use std::path::Path;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let summary = convert_file(
//!         Path::new("CommerceProduct.csv"),
//!         Path::new("prices.csv"),
//!         &ConvertOptions::default(),
//!     )?;
//!     println!("Wrote {} rows", summary.output_rows);
//!     Ok(())
//! }
//! ```

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::config::ConvertOptions;
use crate::error::ConvertError;
use crate::logs::{log_info, log_info_indent, log_success, log_warning, log_warning_indent};
use crate::models::Region;
use crate::parser::{load_source_rows, LoadResult};
use crate::writer::write_output_rows;

use super::row::{transform_rows, SkippedEntry, TransformResult};

/// Outcome of a successful run, printed by `--json`
#[derive(Debug, Clone, Serialize)]
pub struct ConvertSummary {
    /// Data rows read from the export
    pub input_rows: usize,
    /// Rows in the flattened sheet
    pub output_rows: usize,
    /// Rows with an empty US Price
    pub missing_us: usize,
    /// Rows with an empty CA Price
    pub missing_ca: usize,
    /// Entries dropped under the lenient policy
    pub skipped: Vec<SkippedEntry>,
    pub encoding: String,
    /// Source delimiter; `None` for workbooks
    pub delimiter: Option<char>,
    /// Source worksheet; `None` for delimited text
    pub sheet: Option<String>,
    pub header_line: usize,
}

impl ConvertSummary {
    fn new(load: &LoadResult, result: TransformResult) -> Self {
        Self {
            input_rows: load.rows.len(),
            output_rows: result.rows.len(),
            missing_us: result.missing(Region::Us),
            missing_ca: result.missing(Region::Ca),
            skipped: result.skipped,
            encoding: load.encoding.clone(),
            delimiter: load.delimiter,
            sheet: load.sheet.clone(),
            header_line: load.header_line,
        }
    }
}

/// Convert the export at `input` into the flattened sheet at `output`.
///
/// Nothing is written unless every row transforms; the first failing row
/// aborts the run and is named in the error.
pub fn convert_file(input: &Path, output: &Path, options: &ConvertOptions) -> Result<ConvertSummary, ConvertError> {
    let (load, result) = load_and_transform(input, options)?;

    log_info(format!("💾 Writing {}...", output.display()));
    write_output_rows(output, &result.rows, options)?;
    log_success(format!("Wrote {} rows", result.rows.len()));

    Ok(ConvertSummary::new(&load, result))
}

/// Load and transform without writing anything.
pub fn check_file(input: &Path, options: &ConvertOptions) -> Result<ConvertSummary, ConvertError> {
    let (load, result) = load_and_transform(input, options)?;
    Ok(ConvertSummary::new(&load, result))
}

fn load_and_transform(input: &Path, options: &ConvertOptions) -> Result<(LoadResult, TransformResult), ConvertError> {
    log_info(format!("📖 Reading {}...", input.display()));
    let load = load_source_rows(input, options)?;
    match (&load.sheet, load.delimiter) {
        (Some(sheet), _) => log_success(format!("Worksheet: {}", sheet)),
        (None, Some(delimiter)) => {
            log_success(format!("Detected encoding: {}", load.encoding));
            log_success(format!("Detected separator: '{}'", format_delimiter(delimiter)));
        }
        (None, None) => {}
    }
    log_success(format!("Header on line {}, {} data rows", load.header_line, load.rows.len()));

    log_info(format!("⚙️  Transforming ({} policy)...", options.policy.as_str()));
    let result = transform_rows(&load.rows, options)?;
    print_transform_result(&result);

    Ok((load, result))
}

/// Format delimiter for display
fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "TAB".to_string(),
        c => c.to_string(),
    }
}

fn print_transform_result(result: &TransformResult) {
    log_success(result.summary());

    if result.skipped.is_empty() {
        return;
    }
    log_warning(format!(
        "{} price entries skipped (region outside catalog)",
        result.skipped.len()
    ));

    // Group by region
    let mut by_region: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for skip in &result.skipped {
        by_region.entry(skip.region.as_str()).or_default().push(skip.row);
    }
    for (region, rows) in &by_region {
        let sample: Vec<String> = rows.iter().take(5).map(|r| r.to_string()).collect();
        let more = if rows.len() > 5 {
            format!("... +{}", rows.len() - 5)
        } else {
            String::new()
        };
        log_warning_indent(format!("• {} (rows: {}{})", region, sample.join(", "), more), 1);
    }
    log_info_indent("Rerun with the strict policy to reject these rows", 1);
}
