//! Domain models for the pricing conversion pipeline.
//!
//! - [`SourceRow`] - one data row of the vendor export
//! - [`Region`] - a supported pricing region (US, CA)
//! - [`PriceEntry`] - one decoded regional price
//! - [`DecodedEntry`] - result of decoding one entry of a price blob
//! - [`OutputRow`] - one row of the flattened sheet

use rust_decimal::Decimal;
use std::fmt;

// =============================================================================
// Source Row
// =============================================================================

/// One data row of the pricing export, as read by the loader.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRow {
    /// 1-based data row index (the first row after the header is 1).
    pub row: usize,
    pub catalog_version: String,
    pub name: String,
    pub price_json: String,
    pub product_id: String,
}

// =============================================================================
// Region
// =============================================================================

/// A region of the AMER catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Region {
    /// United States
    Us,
    /// Canada
    Ca,
}

impl Region {
    /// Parse a region code, case-insensitive.
    ///
    /// Returns `None` for regions outside the AMER catalog.
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_uppercase().as_str() {
            "US" | "USA" => Some(Self::Us),
            "CA" | "CAN" => Some(Self::Ca),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Us => "US",
            Self::Ca => "CA",
        }
    }

    /// ISO 4217 code prices in this region are quoted in.
    pub fn currency(&self) -> &'static str {
        match self {
            Self::Us => "USD",
            Self::Ca => "CAD",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

// =============================================================================
// Price Entries
// =============================================================================

/// A decoded price for one supported region.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceEntry {
    pub region: Region,
    pub currency: String,
    /// Regular price. `None` when the export has no price for the region.
    pub amount: Option<Decimal>,
    pub sale_amount: Option<Decimal>,
}

/// One entry of a price blob after the typed decode step.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedEntry {
    /// A US or CA price.
    Supported(PriceEntry),
    /// A region the catalog does not cover, kept verbatim for reporting.
    Unsupported { region: String },
}

// =============================================================================
// Output Row
// =============================================================================

/// One row of the flattened price sheet.
///
/// `None` prices are written as empty cells; they never mean zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutputRow {
    /// Index of the source row this was built from.
    pub row: usize,
    pub catalog_version: String,
    pub name: String,
    pub product_id: String,
    pub us_price: Option<Decimal>,
    pub ca_price: Option<Decimal>,
    pub us_sale_price: Option<Decimal>,
    pub ca_sale_price: Option<Decimal>,
}

impl OutputRow {
    /// Start an output row with the identifying columns of `source` and no prices.
    pub fn from_source(source: &SourceRow) -> Self {
        Self {
            row: source.row,
            catalog_version: source.catalog_version.clone(),
            name: source.name.clone(),
            product_id: source.product_id.clone(),
            ..Self::default()
        }
    }

    /// Fill in the columns for one regional price.
    pub fn apply(&mut self, entry: &PriceEntry) {
        match entry.region {
            Region::Us => {
                self.us_price = entry.amount;
                self.us_sale_price = entry.sale_amount;
            }
            Region::Ca => {
                self.ca_price = entry.amount;
                self.ca_sale_price = entry.sale_amount;
            }
        }
    }

    pub fn price(&self, region: Region) -> Option<Decimal> {
        match region {
            Region::Us => self.us_price,
            Region::Ca => self.ca_price,
        }
    }
}
