//! Conversion options.
//!
//! Defaults can be overridden from the environment (a `.env` file is loaded by
//! the binary through `dotenvy`) and then from command-line flags.
//!
//! | Variable                     | Field                |
//! |------------------------------|----------------------|
//! | `PRICEFLAT_POLICY`           | `policy`             |
//! | `PRICEFLAT_LOCALE`           | `locale`             |
//! | `PRICEFLAT_DELIMITER`        | `delimiter`          |
//! | `PRICEFLAT_OUTPUT_DELIMITER` | `output_delimiter`   |
//! | `PRICEFLAT_SALE_PRICES`      | `include_sale_prices`|
//! | `PRICEFLAT_SKIP_ROWS`        | `skip_rows`          |
//! | `PRICEFLAT_SHEET`            | `sheet`              |

use clap::ValueEnum;
use std::path::Path;
use std::str::FromStr;

use crate::error::ConvertError;
use crate::models::Region;

/// Catalog scopes the converter knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Catalog {
    /// Americas: United States and Canada.
    #[default]
    Amer,
}

impl Catalog {
    pub fn regions(&self) -> &'static [Region] {
        match self {
            Catalog::Amer => &[Region::Us, Region::Ca],
        }
    }
}

/// What to do with a price entry for a region outside the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum RegionPolicy {
    /// Abort the run on the first unsupported region.
    #[default]
    Strict,
    /// Drop the entry, warn, and keep converting the row.
    Lenient,
}

impl FromStr for RegionPolicy {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "lenient" => Ok(Self::Lenient),
            other => Err(ConvertError::Config(format!(
                "unknown region policy '{}' (expected strict or lenient)",
                other
            ))),
        }
    }
}

impl RegionPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Lenient => "lenient",
        }
    }
}

/// Sheet file formats, chosen from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SheetFormat {
    /// CSV, TSV and other delimited text
    #[default]
    Delimited,
    /// Excel workbook
    Xlsx,
}

impl SheetFormat {
    /// `.xlsx` and `.xlsm` are workbooks; anything else is delimited text.
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("xlsx") | Some("xlsm") => Self::Xlsx,
            _ => Self::Delimited,
        }
    }
}

/// Sheet read from workbook exports unless configured otherwise.
pub const DEFAULT_SHEET: &str = "CommerceProduct";

/// Options for a conversion run
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// Catalog scope; decides which regions are supported
    pub catalog: Catalog,

    /// Handling of unsupported regions
    pub policy: RegionPolicy,

    /// Input delimiter (auto-detect if not set)
    pub delimiter: Option<char>,

    /// Delimiter for the output file
    pub output_delimiter: char,

    /// Append "US Sale Price" and "CA Sale Price" columns
    pub include_sale_prices: bool,

    /// Locale of the localized name column, e.g. `en` for `Name[en]`
    pub locale: String,

    /// Records between the header and the first data row (SAP attribute
    /// descriptors); they are dropped and not counted in row indices
    pub skip_rows: usize,

    /// Worksheet holding the export in `.xlsx` input
    pub sheet: String,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            catalog: Catalog::Amer,
            policy: RegionPolicy::Strict,
            delimiter: None,
            output_delimiter: ',',
            include_sale_prices: false,
            locale: "en".to_string(),
            skip_rows: 0,
            sheet: DEFAULT_SHEET.to_string(),
        }
    }
}

impl ConvertOptions {
    /// Defaults overlaid with `PRICEFLAT_*` environment variables.
    pub fn from_env() -> Result<Self, ConvertError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ConvertOptions::from_env`] with an explicit variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConvertError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut options = Self::default();

        if let Some(policy) = lookup("PRICEFLAT_POLICY") {
            options.policy = policy.parse()?;
        }
        if let Some(locale) = lookup("PRICEFLAT_LOCALE") {
            let locale = locale.trim();
            if !locale.is_empty() {
                options.locale = locale.to_string();
            }
        }
        if let Some(d) = lookup("PRICEFLAT_DELIMITER") {
            options.delimiter = Some(parse_delimiter(&d)?);
        }
        if let Some(d) = lookup("PRICEFLAT_OUTPUT_DELIMITER") {
            options.output_delimiter = parse_delimiter(&d)?;
        }
        if let Some(flag) = lookup("PRICEFLAT_SALE_PRICES") {
            options.include_sale_prices = parse_bool(&flag)?;
        }
        if let Some(n) = lookup("PRICEFLAT_SKIP_ROWS") {
            options.skip_rows = n.trim().parse().map_err(|_| {
                ConvertError::Config(format!("PRICEFLAT_SKIP_ROWS must be a row count, got '{}'", n))
            })?;
        }
        if let Some(sheet) = lookup("PRICEFLAT_SHEET") {
            let sheet = sheet.trim();
            if !sheet.is_empty() {
                options.sheet = sheet.to_string();
            }
        }

        Ok(options)
    }

    pub fn is_supported(&self, region: Region) -> bool {
        self.catalog.regions().contains(&region)
    }
}

/// Parse a delimiter given as a single ASCII character or as `tab` / `\t`.
pub fn parse_delimiter(value: &str) -> Result<char, ConvertError> {
    let delimiter = match value {
        "\\t" | "tab" | "TAB" | "\t" => '\t',
        other => {
            let mut chars = other.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => c,
                _ => {
                    return Err(ConvertError::Config(format!(
                        "delimiter must be a single character, got '{}'",
                        value
                    )))
                }
            }
        }
    };

    if !delimiter.is_ascii() || delimiter == '"' || delimiter == '\n' || delimiter == '\r' {
        return Err(ConvertError::Config(format!(
            "unusable delimiter '{}'",
            delimiter.escape_default()
        )));
    }
    Ok(delimiter)
}

fn parse_bool(value: &str) -> Result<bool, ConvertError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(ConvertError::Config(format!("expected a boolean, got '{}'", other))),
    }
}
