//! Transformation module.
//!
//! - Price: decoding of the "Price in Json" cell
//! - Row: one source row to one output row, region policy
//! - Pipeline: load, transform, write

pub mod pipeline;
pub mod price;
pub mod row;

pub use pipeline::*;
pub use price::decode_prices;
pub use row::*;
