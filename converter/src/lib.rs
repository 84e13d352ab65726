//! # Priceflat - AMER pricing export flattener
//!
//! Priceflat turns a SAP Commerce "CommerceProduct" pricing export, where each
//! product carries its regional prices in a JSON cell, into a flat sheet with
//! one column per regional price (United States, Canada).
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   Export    │────▶│   Loader    │────▶│ Transformer │────▶│   Writer    │
//! │ (xlsx, CSV) │     │ (auto-enc)  │     │ (US / CA)   │     │ (atomic)    │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use priceflat::{convert_file, ConvertOptions};
//! use std::path::Path;
//!
//! let summary = convert_file(
//!     Path::new("export.csv"),
//!     Path::new("prices.csv"),
//!     &ConvertOptions::default(),
//! ).unwrap();
//! println!("Converted {} products", summary.output_rows);
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Error types
//! - [`models`] - Domain models (SourceRow, PriceEntry, OutputRow)
//! - [`config`] - Conversion options and environment overrides
//! - [`parser`] - Loader with encoding, delimiter and header detection
//! - [`transform`] - Price decoding, row transformation and pipeline
//! - [`writer`] - Flattened sheet writer
//! - [`logs`] - Progress and warning log

// Core modules
pub mod config;
pub mod error;
pub mod logs;
pub mod models;

// Loading
pub mod parser;

// Transformation
pub mod transform;

// Output
pub mod writer;

// =============================================================================
// Re-exports - Errors
// =============================================================================

pub use error::{ConvertError, ConvertResult, PriceError, PriceResult};

// =============================================================================
// Re-exports - Models & Config
// =============================================================================

pub use config::{Catalog, ConvertOptions, RegionPolicy, SheetFormat};
pub use models::{DecodedEntry, OutputRow, PriceEntry, Region, SourceRow};

// =============================================================================
// Re-exports - Loader
// =============================================================================

pub use parser::{
    load_bytes,
    load_source_rows,
    load_str,
    load_xlsx,
    detect_delimiter,
    detect_encoding,
    decode_content,
    ColumnMap,
    LoadResult,
};

// =============================================================================
// Re-exports - Transformer
// =============================================================================

pub use transform::{
    decode_prices,
    transform_row,
    transform_rows,
    RowOutcome,
    SkippedEntry,
    TransformResult,
};

// =============================================================================
// Re-exports - Pipeline & Writer
// =============================================================================

pub use transform::pipeline::{check_file, convert_file, ConvertSummary};
pub use writer::{output_headers, write_output_rows, write_rows, xlsx_bytes};
