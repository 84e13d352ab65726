//! Decoding of the "Price in Json" cell.
//!
//! Two blob shapes are found in exports:
//!
//! ```text
//! [{"region": "US", "currency": "USD", "amount": 19.99}, ...]      list
//! {"us": {"price": 19.99, "salePrice": null}, "ca": {...}}         region mapping
//! ```
//!
//! Amounts keep the exact text of the JSON number (`10.00` stays `10.00`):
//! `serde_json` is built with `arbitrary_precision`, and the text is parsed
//! straight into a [`Decimal`].

use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::str::FromStr;

use crate::error::{PriceError, PriceResult};
use crate::models::{DecodedEntry, PriceEntry, Region};

/// Price fields shared by both shapes.
#[derive(Debug, Default, Deserialize)]
struct RawPrice {
    #[serde(default)]
    currency: Option<String>,
    #[serde(default, alias = "price")]
    amount: Option<Value>,
    #[serde(default, rename = "saleAmount", alias = "salePrice")]
    sale_amount: Option<Value>,
}

/// Decode a price blob into typed entries.
///
/// A blank cell or `null` decodes to no entries. Regions outside US/CA come
/// back as [`DecodedEntry::Unsupported`]; deciding what to do with them is up
/// to the caller.
pub fn decode_prices(json: &str) -> PriceResult<Vec<DecodedEntry>> {
    let json = json.trim();
    if json.is_empty() {
        return Ok(Vec::new());
    }

    let entries = match serde_json::from_str::<Value>(json)? {
        Value::Null => Vec::new(),
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(i, item)| decode_list_entry(i + 1, item))
            .collect::<PriceResult<Vec<_>>>()?,
        Value::Object(map) => map
            .into_iter()
            .map(|(code, value)| decode_mapped_entry(code, value))
            .collect::<PriceResult<Vec<_>>>()?,
        other => return Err(PriceError::UnexpectedShape(kind_of(&other))),
    };

    check_duplicates(&entries)?;
    Ok(entries)
}

/// `{"region": "US", "amount": 10.00, ...}`
fn decode_list_entry(position: usize, item: Value) -> PriceResult<DecodedEntry> {
    let entry_name = format!("#{}", position);
    let mut fields = match item {
        Value::Object(fields) => fields,
        other => {
            return Err(PriceError::InvalidEntry {
                entry: entry_name,
                message: format!("expected an object, found {}", kind_of(&other)),
            })
        }
    };

    let region = match fields.remove("region") {
        Some(Value::String(code)) if !code.trim().is_empty() => code.trim().to_string(),
        Some(Value::String(_)) | Some(Value::Null) | None => {
            return Err(PriceError::InvalidEntry {
                entry: entry_name,
                message: "missing region".to_string(),
            })
        }
        Some(other) => {
            return Err(PriceError::InvalidEntry {
                entry: entry_name,
                message: format!("region must be a string, found {}", kind_of(&other)),
            })
        }
    };

    let raw = raw_price(&entry_name, fields)?;
    build_entry(region, raw)
}

/// `"us": {"price": 19.99, "salePrice": 17.99}` or `"us": 19.99`
fn decode_mapped_entry(code: String, value: Value) -> PriceResult<DecodedEntry> {
    let raw = match value {
        Value::Object(fields) => raw_price(&code, fields)?,
        Value::Null => RawPrice::default(),
        amount @ (Value::Number(_) | Value::String(_)) => RawPrice {
            amount: Some(amount),
            ..RawPrice::default()
        },
        other => {
            return Err(PriceError::InvalidEntry {
                entry: code,
                message: format!("expected an object or an amount, found {}", kind_of(&other)),
            })
        }
    };
    build_entry(code.trim().to_string(), raw)
}

fn raw_price(entry_name: &str, fields: Map<String, Value>) -> PriceResult<RawPrice> {
    serde_json::from_value(Value::Object(fields)).map_err(|e| PriceError::InvalidEntry {
        entry: entry_name.to_string(),
        message: e.to_string(),
    })
}

fn build_entry(code: String, raw: RawPrice) -> PriceResult<DecodedEntry> {
    let region = match Region::from_code(&code) {
        Some(region) => region,
        None => return Ok(DecodedEntry::Unsupported { region: code }),
    };

    let currency = match raw.currency.as_deref().map(str::trim) {
        None | Some("") => region.currency().to_string(),
        Some(c) if c.eq_ignore_ascii_case(region.currency()) => region.currency().to_string(),
        Some(c) => {
            return Err(PriceError::CurrencyMismatch {
                region: region.code().to_string(),
                expected: region.currency(),
                found: c.to_string(),
            })
        }
    };

    Ok(DecodedEntry::Supported(PriceEntry {
        region,
        currency,
        amount: parse_amount(region, raw.amount)?,
        sale_amount: parse_amount(region, raw.sale_amount)?,
    }))
}

/// Parse a JSON amount (number or numeric string) without going through f64.
pub fn parse_amount(region: Region, value: Option<Value>) -> PriceResult<Option<Decimal>> {
    let text = match value {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => return Ok(None),
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(other) => {
            return Err(PriceError::InvalidAmount {
                region: region.code().to_string(),
                value: other.to_string(),
            })
        }
    };

    // `Decimal::from_str` also takes `_` digit separators; JSON numbers never do.
    let plain = text
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E'));
    let amount = plain
        .then(|| Decimal::from_str(&text).or_else(|_| Decimal::from_scientific(&text)).ok())
        .flatten()
        .ok_or_else(|| PriceError::InvalidAmount {
            region: region.code().to_string(),
            value: text.clone(),
        })?;

    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(PriceError::NegativeAmount {
            region: region.code().to_string(),
            value: text,
        });
    }
    Ok(Some(amount))
}

fn check_duplicates(entries: &[DecodedEntry]) -> PriceResult<()> {
    let mut seen = HashSet::new();
    for entry in entries {
        let key = match entry {
            DecodedEntry::Supported(price) => price.region.code().to_string(),
            DecodedEntry::Unsupported { region } => region.to_uppercase(),
        };
        if !seen.insert(key.clone()) {
            return Err(PriceError::DuplicateRegion(key));
        }
    }
    Ok(())
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
