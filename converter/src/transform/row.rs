//! Row transformation: one [`SourceRow`] in, one [`OutputRow`] out.

use serde::Serialize;

use crate::config::{ConvertOptions, RegionPolicy};
use crate::error::ConvertError;
use crate::models::{DecodedEntry, OutputRow, Region, SourceRow};

use super::price::decode_prices;

/// A price entry dropped under the lenient policy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedEntry {
    pub row: usize,
    pub product_id: String,
    pub region: String,
}

/// Result of transforming a single row
#[derive(Debug, Clone, PartialEq)]
pub struct RowOutcome {
    pub output: OutputRow,
    pub skipped: Vec<SkippedEntry>,
}

/// Result of transforming all rows of an export
#[derive(Debug, Clone, Default)]
pub struct TransformResult {
    /// Output rows, in source order
    pub rows: Vec<OutputRow>,
    /// Entries dropped under the lenient policy
    pub skipped: Vec<SkippedEntry>,
}

impl TransformResult {
    /// Rows without a regular price for `region`.
    pub fn missing(&self, region: Region) -> usize {
        self.rows.iter().filter(|r| r.price(region).is_none()).count()
    }

    pub fn summary(&self) -> String {
        format!(
            "Transformed: {} rows, {} without US price, {} without CA price, {} entries skipped",
            self.rows.len(),
            self.missing(Region::Us),
            self.missing(Region::Ca),
            self.skipped.len()
        )
    }
}

/// Transform one row.
///
/// Fails with [`ConvertError::MalformedPrice`] when the price blob cannot be
/// decoded, and with [`ConvertError::UnsupportedRegion`] when it names a
/// region outside the catalog and the policy is strict. Under the lenient
/// policy such entries are returned in [`RowOutcome::skipped`].
pub fn transform_row(source: &SourceRow, options: &ConvertOptions) -> Result<RowOutcome, ConvertError> {
    let entries = decode_prices(&source.price_json).map_err(|e| e.at_row(source.row))?;

    let mut output = OutputRow::from_source(source);
    let mut skipped = Vec::new();

    for entry in entries {
        let unsupported = match entry {
            DecodedEntry::Supported(price) if options.is_supported(price.region) => {
                output.apply(&price);
                continue;
            }
            DecodedEntry::Supported(price) => price.region.code().to_string(),
            DecodedEntry::Unsupported { region } => region,
        };

        match options.policy {
            RegionPolicy::Strict => {
                return Err(ConvertError::UnsupportedRegion {
                    row: source.row,
                    region: unsupported,
                })
            }
            RegionPolicy::Lenient => skipped.push(SkippedEntry {
                row: source.row,
                product_id: source.product_id.clone(),
                region: unsupported,
            }),
        }
    }

    Ok(RowOutcome { output, skipped })
}

/// Transform every row in order, stopping at the first error.
pub fn transform_rows(rows: &[SourceRow], options: &ConvertOptions) -> Result<TransformResult, ConvertError> {
    let mut result = TransformResult {
        rows: Vec::with_capacity(rows.len()),
        skipped: Vec::new(),
    };

    for row in rows {
        let outcome = transform_row(row, options)?;
        result.rows.push(outcome.output);
        result.skipped.extend(outcome.skipped);
    }

    Ok(result)
}
