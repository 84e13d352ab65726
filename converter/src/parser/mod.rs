//! Loader for the vendor pricing export.
//!
//! Reads delimited text (with encoding and delimiter auto-detection) or an
//! `.xlsx` worksheet, finds the header row, matches the required columns by
//! name and returns one [`SourceRow`] per data row.

use calamine::{Data, Reader, Xlsx};
use csv::{Position, ReaderBuilder, StringRecord};
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::Cursor;
use std::path::Path;

use crate::config::{ConvertOptions, SheetFormat};
use crate::error::ConvertError;
use crate::models::SourceRow;

/// How many records may precede the header row (report title, export date...).
pub const MAX_PREAMBLE_ROWS: usize = 10;

/// Local file header signature; `.xlsx` workbooks are zip archives.
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

pub const CATALOG_VERSION: &str = "Catalog Version";
pub const NAME: &str = "Name";
pub const PRICE_JSON: &str = "Price in Json";
pub const PRODUCT_ID: &str = "Product ID";

/// `name[en]` after normalization.
static LOCALIZED_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^name\[([a-z0-9]*)\]$").expect("valid regex"));

/// Result of loading with metadata
#[derive(Debug, Clone)]
pub struct LoadResult {
    /// Data rows in file order
    pub rows: Vec<SourceRow>,
    /// Header row as found in the file
    pub headers: Vec<String>,
    pub format: SheetFormat,
    /// Detected encoding
    pub encoding: String,
    /// Detected or configured delimiter (delimited text only)
    pub delimiter: Option<char>,
    /// Worksheet read (workbooks only)
    pub sheet: Option<String>,
    /// 1-based line (or worksheet row) of the header
    pub header_line: usize,
}

/// Positions of the required columns in the header row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnMap {
    pub catalog_version: usize,
    pub name: usize,
    pub price_json: usize,
    pub product_id: usize,
}

impl ColumnMap {
    /// Match the required columns against a header row.
    ///
    /// The name column is `Name[<locale>]`; a plain `Name` column is used when
    /// no localized one exists.
    pub fn from_headers<S: AsRef<str>>(headers: &[S], locale: &str) -> Result<Self, ConvertError> {
        let normalized: Vec<String> = headers.iter().map(|h| normalize_header(h.as_ref())).collect();
        let find = |wanted: &str| {
            let wanted = normalize_header(wanted);
            normalized.iter().position(|h| *h == wanted)
        };

        let locale = normalize_header(locale);
        let name = normalized
            .iter()
            .position(|h| {
                LOCALIZED_NAME
                    .captures(h)
                    .is_some_and(|c| c.get(1).map(|m| m.as_str()) == Some(locale.as_str()))
            })
            .or_else(|| find(NAME));

        let catalog_version = find(CATALOG_VERSION);
        let price_json = find(PRICE_JSON);
        let product_id = find(PRODUCT_ID);

        match (catalog_version, name, price_json, product_id) {
            (Some(catalog_version), Some(name), Some(price_json), Some(product_id)) => Ok(Self {
                catalog_version,
                name,
                price_json,
                product_id,
            }),
            _ => {
                let mut missing = Vec::new();
                if catalog_version.is_none() {
                    missing.push(CATALOG_VERSION.to_string());
                }
                if name.is_none() {
                    missing.push(format!("{}[{}]", NAME, locale));
                }
                if price_json.is_none() {
                    missing.push(PRICE_JSON.to_string());
                }
                if product_id.is_none() {
                    missing.push(PRODUCT_ID.to_string());
                }
                Err(ConvertError::Schema { missing })
            }
        }
    }

    fn row_from_record(&self, row: usize, record: &StringRecord) -> SourceRow {
        let cell = |i: usize| record.get(i).unwrap_or("").trim().to_string();
        SourceRow {
            row,
            catalog_version: cell(self.catalog_version),
            name: cell(self.name),
            price_json: cell(self.price_json),
            product_id: cell(self.product_id),
        }
    }
}

/// Lowercase and drop whitespace, `_` and `-`, so `Product ID`, `product_id`
/// and `ProductID` compare equal.
pub fn normalize_header(header: &str) -> String {
    header
        .trim()
        .trim_start_matches('\u{feff}')
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" | "" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes to string using the specified encoding.
///
/// A leading UTF-8 byte order mark, as spreadsheet tools write it, is dropped.
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match encoding.to_lowercase().as_str() {
        "iso-8859-1" | "latin-1" | "latin1" => encoding_rs::ISO_8859_15.decode(bytes).0.into_owned(),
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
        // UTF-8 and anything unrecognized
        _ => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// Detect the delimiter by counting occurrences outside quotes.
///
/// The first [`MAX_PREAMBLE_ROWS`] non-empty lines are scanned, since the
/// header may sit below a preamble; the separator seen most often on a single
/// line wins.
pub fn detect_delimiter(content: &str) -> char {
    let separators = [';', ',', '\t', '|'];
    let mut best_sep = ',';
    let mut best_count = 0;

    for line in content.lines().filter(|l| !l.trim().is_empty()).take(MAX_PREAMBLE_ROWS) {
        let mut counts = [0usize; 4];
        let mut in_quotes = false;
        for c in line.chars() {
            if c == '"' {
                in_quotes = !in_quotes;
            } else if !in_quotes {
                if let Some(i) = separators.iter().position(|&s| s == c) {
                    counts[i] += 1;
                }
            }
        }

        for (i, &sep) in separators.iter().enumerate() {
            if counts[i] > best_count {
                best_count = counts[i];
                best_sep = sep;
            }
        }
    }

    best_sep
}

/// Load the pricing export at `path`.
///
/// `.xlsx` files (or any file that starts like a zip archive) are read as
/// workbooks; everything else as delimited text.
///
/// # Example
/// ```ignore
/// let result = load_source_rows("export.csv", &ConvertOptions::default())?;
/// println!("{} rows from line {}", result.rows.len(), result.header_line);
/// ```
pub fn load_source_rows<P: AsRef<Path>>(path: P, options: &ConvertOptions) -> Result<LoadResult, ConvertError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|e| ConvertError::io(path, e))?;
    match SheetFormat::from_path(path) {
        SheetFormat::Xlsx => load_xlsx(&bytes, options),
        SheetFormat::Delimited => load_bytes(&bytes, options),
    }
}

/// Load an export already held in memory.
pub fn load_bytes(bytes: &[u8], options: &ConvertOptions) -> Result<LoadResult, ConvertError> {
    if bytes.starts_with(ZIP_MAGIC) {
        return load_xlsx(bytes, options);
    }

    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding);
    let delimiter = options.delimiter.unwrap_or_else(|| detect_delimiter(&content));
    load_str(&content, delimiter, encoding, options)
}

/// Load decoded text with an explicit delimiter.
pub fn load_str(
    content: &str,
    delimiter: char,
    encoding: String,
    options: &ConvertOptions,
) -> Result<LoadResult, ConvertError> {
    let delimiter_byte = u8::try_from(delimiter)
        .map_err(|_| ConvertError::Config(format!("delimiter '{}' is not ASCII", delimiter)))?;

    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter_byte)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let table = read_table(reader.records(), options)?;
    Ok(table.into_result(SheetFormat::Delimited, encoding, Some(delimiter), None))
}

/// Load the configured worksheet of an `.xlsx` workbook.
pub fn load_xlsx(bytes: &[u8], options: &ConvertOptions) -> Result<LoadResult, ConvertError> {
    let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes.to_vec()))
        .map_err(|e| ConvertError::Workbook(e.to_string()))?;

    let available = workbook.sheet_names();
    if !available.iter().any(|name| *name == options.sheet) {
        return Err(ConvertError::MissingSheet {
            sheet: options.sheet.clone(),
            available,
        });
    }

    let range = workbook
        .worksheet_range(&options.sheet)
        .map_err(|e| ConvertError::Workbook(e.to_string()))?;
    let first_line = range.start().map(|(row, _)| u64::from(row) + 1).unwrap_or(1);

    let records = range.rows().enumerate().map(|(i, cells)| {
        let mut record: StringRecord = cells.iter().map(cell_text).collect();
        let mut position = Position::new();
        position.set_line(first_line + i as u64);
        record.set_position(Some(position));
        Ok::<_, csv::Error>(record)
    });

    let table = read_table(records, options)?;
    Ok(table.into_result(SheetFormat::Xlsx, "utf-8".to_string(), None, Some(options.sheet.clone())))
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        other => other.to_string(),
    }
}

/// Header record and the data rows below it.
struct Table {
    header: StringRecord,
    rows: Vec<SourceRow>,
}

impl Table {
    fn into_result(
        self,
        format: SheetFormat,
        encoding: String,
        delimiter: Option<char>,
        sheet: Option<String>,
    ) -> LoadResult {
        let header_line = self
            .header
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(1);
        LoadResult {
            rows: self.rows,
            headers: self.header.iter().map(|h| h.trim().to_string()).collect(),
            format,
            encoding,
            delimiter,
            sheet,
            header_line,
        }
    }
}

/// Find the header among the first records, drop the configured descriptor
/// records after it, and map every remaining record to a [`SourceRow`].
fn read_table<I>(mut records: I, options: &ConvertOptions) -> Result<Table, ConvertError>
where
    I: Iterator<Item = Result<StringRecord, csv::Error>>,
{
    let locale = options.locale.as_str();
    let mut first_record: Option<StringRecord> = None;
    let mut found: Option<(StringRecord, ColumnMap)> = None;
    for _ in 0..MAX_PREAMBLE_ROWS {
        let record = match records.next() {
            Some(r) => r.map_err(ConvertError::csv_format)?,
            None => break,
        };
        if is_blank(&record) {
            continue;
        }
        let cells: Vec<&str> = record.iter().collect();
        if let Ok(columns) = ColumnMap::from_headers(&cells, locale) {
            found = Some((record, columns));
            break;
        }
        if first_record.is_none() {
            first_record = Some(record);
        }
    }

    let (header, columns) = match (found, first_record) {
        (Some(found), _) => found,
        // Report what the first non-blank record lacks.
        (None, Some(first)) => {
            let cells: Vec<&str> = first.iter().collect();
            return Err(ColumnMap::from_headers(&cells, locale)
                .err()
                .unwrap_or(ConvertError::EmptyInput));
        }
        (None, None) => return Err(ConvertError::EmptyInput),
    };

    for _ in 0..options.skip_rows {
        match records.next() {
            Some(r) => {
                r.map_err(ConvertError::csv_format)?;
            }
            None => break,
        }
    }

    let mut rows = Vec::new();
    for (idx, result) in records.enumerate() {
        let row = idx + 1;
        let record = result.map_err(|source| ConvertError::Csv { row, source })?;
        if is_blank(&record) {
            continue;
        }
        rows.push(columns.row_from_record(row, &record));
    }

    Ok(Table { header, rows })
}

fn is_blank(record: &StringRecord) -> bool {
    record.iter().all(|cell| cell.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_xlsxwriter::Workbook;

    const HEADER: &str = "Catalog Version,Name[en],Price in Json,Product ID";

    fn load(content: &str) -> Result<LoadResult, ConvertError> {
        load_str(content, ',', "utf-8".to_string(), &ConvertOptions::default())
    }

    fn with_locale(locale: &str) -> ConvertOptions {
        ConvertOptions {
            locale: locale.to_string(),
            ..ConvertOptions::default()
        }
    }

    /// In-memory workbook with string cells; empty strings leave the cell blank.
    fn workbook_bytes(sheet: &str, rows: &[&[&str]]) -> Vec<u8> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(sheet).unwrap();
        for (r, cells) in rows.iter().enumerate() {
            for (c, value) in cells.iter().enumerate() {
                if !value.is_empty() {
                    worksheet.write_string(r as u32, c as u16, *value).unwrap();
                }
            }
        }
        workbook.save_to_buffer().unwrap()
    }

    #[test]
    fn test_simple_export() {
        let csv = format!(
            "{}\nAMER-2024,Widget,\"[{{\"\"region\"\":\"\"US\"\",\"\"amount\"\":10.00}}]\",W-100\n",
            HEADER
        );
        let result = load(&csv).unwrap();

        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.header_line, 1);
        let row = &result.rows[0];
        assert_eq!(row.row, 1);
        assert_eq!(row.catalog_version, "AMER-2024");
        assert_eq!(row.name, "Widget");
        assert_eq!(row.price_json, r#"[{"region":"US","amount":10.00}]"#);
        assert_eq!(row.product_id, "W-100");
    }

    #[test]
    fn test_columns_in_any_order() {
        let csv = "Product ID;Price in Json;Name[en];Catalog Version\nW-1;[];Bolt;AMER-2024";
        let result = load_str(csv, ';', "utf-8".into(), &ConvertOptions::default()).unwrap();

        let row = &result.rows[0];
        assert_eq!(row.product_id, "W-1");
        assert_eq!(row.price_json, "[]");
        assert_eq!(row.name, "Bolt");
        assert_eq!(row.catalog_version, "AMER-2024");
    }

    #[test]
    fn test_missing_columns_reported() {
        let csv = "Catalog Version,Name[en]\nAMER-2024,Widget";
        match load(csv) {
            Err(ConvertError::Schema { missing }) => {
                assert_eq!(missing, vec!["Price in Json", "Product ID"]);
            }
            other => panic!("expected schema error, got {:?}", other),
        }
    }

    #[test]
    fn test_header_after_preamble() {
        let csv = format!(
            "CommerceProduct export\nGenerated,2024-05-01\n\n{}\nAMER-2024,Widget,[],W-100\n",
            HEADER
        );
        let result = load(&csv).unwrap();

        assert_eq!(result.header_line, 4);
        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.rows[0].row, 1);
    }

    #[test]
    fn test_descriptor_rows_skipped() {
        let csv = format!(
            "{}\n\
             catalogVersion(catalog(id),version),name[lang=en],priceJson,code\n\
             CatalogVersion,localized:String,String,String\n\
             AMER-2024,Widget,[],W-100\n",
            HEADER
        );

        // Without the option the descriptors are read as data.
        let plain = load(&csv).unwrap();
        assert_eq!(plain.rows.len(), 3);
        assert_eq!(plain.rows[0].catalog_version, "catalogVersion(catalog(id)");

        let options = ConvertOptions {
            skip_rows: 2,
            ..ConvertOptions::default()
        };
        let result = load_str(&csv, ',', "utf-8".into(), &options).unwrap();
        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.rows[0].row, 1);
        assert_eq!(result.rows[0].product_id, "W-100");
    }

    #[test]
    fn test_skip_rows_past_end() {
        let options = ConvertOptions {
            skip_rows: 5,
            ..ConvertOptions::default()
        };
        let result = load_str(&format!("{}\nA,B,[],C\n", HEADER), ',', "utf-8".into(), &options).unwrap();
        assert!(result.rows.is_empty());
    }

    #[test]
    fn test_blank_rows_keep_indices() {
        let csv = format!("{}\nA,One,[],P1\n,,,\nA,Three,[],P3\n", HEADER);
        let result = load(&csv).unwrap();

        assert_eq!(result.rows.len(), 2);
        assert_eq!(result.rows[0].row, 1);
        assert_eq!(result.rows[1].row, 3);
    }

    #[test]
    fn test_plain_name_fallback_and_locale() {
        let csv = "Catalog Version,Name,Price in Json,Product ID\nA,Plain,[],P1";
        assert_eq!(load(csv).unwrap().rows[0].name, "Plain");

        let csv = "Catalog Version,Name[en],Name[fr],Price in Json,Product ID\nA,Bolt,Boulon,[],P1";
        let fr = load_str(csv, ',', "utf-8".into(), &with_locale("fr")).unwrap();
        assert_eq!(fr.rows[0].name, "Boulon");
    }

    #[test]
    fn test_header_matching_is_loose() {
        let map = ColumnMap::from_headers(
            &["catalog_version", "NAME [EN]", "price-in-json", "ProductID"],
            "en",
        )
        .unwrap();
        assert_eq!(map.catalog_version, 0);
        assert_eq!(map.name, 1);
        assert_eq!(map.price_json, 2);
        assert_eq!(map.product_id, 3);
    }

    #[test]
    fn test_empty_input() {
        assert!(matches!(load(""), Err(ConvertError::EmptyInput)));
        assert!(matches!(load("\n\n"), Err(ConvertError::EmptyInput)));
    }

    #[test]
    fn test_detect_delimiter_ignores_quoted() {
        let content = "a;b;\"x,y,z,w\"\n1;2;3";
        assert_eq!(detect_delimiter(content), ';');
        assert_eq!(detect_delimiter("a,b,c"), ',');
        assert_eq!(detect_delimiter("a\tb\tc"), '\t');
        assert_eq!(detect_delimiter("a|b|c"), '|');
        assert_eq!(detect_delimiter("Report title\n\nx;y;z\n1;2;3"), ';');
    }

    #[test]
    fn test_bom_stripped() {
        let mut bytes = b"\xEF\xBB\xBF".to_vec();
        bytes.extend_from_slice(format!("{}\nA,W,[],P\n", HEADER).as_bytes());
        let result = load_bytes(&bytes, &ConvertOptions::default()).unwrap();

        assert_eq!(result.headers[0], "Catalog Version");
        assert_eq!(result.rows.len(), 1);
    }

    #[test]
    fn test_latin1_decoding() {
        // "Société" in ISO-8859-1
        let bytes: &[u8] = &[0x53, 0x6F, 0x63, 0x69, 0xE9, 0x74, 0xE9];
        assert_eq!(decode_content(bytes, "iso-8859-1"), "Société");
    }

    #[test]
    fn test_xlsx_export() {
        let bytes = workbook_bytes(
            "CommerceProduct",
            &[
                &["CommerceProduct export"],
                &[],
                &["Product ID", "Catalog Version", "Name[en]", "Price in Json"],
                &["W-100", "AMER-2024", "Widget", r#"[{"region":"US","amount":10.00}]"#],
                &["", "", "", ""],
                &["G-200", "AMER-2024", "Gadget", r#"{"ca":{"price":"5.25"}}"#],
            ],
        );

        let result = load_bytes(&bytes, &ConvertOptions::default()).unwrap();
        assert_eq!(result.format, SheetFormat::Xlsx);
        assert_eq!(result.delimiter, None);
        assert_eq!(result.sheet.as_deref(), Some("CommerceProduct"));
        assert_eq!(result.header_line, 3);
        assert_eq!(result.rows.len(), 2);

        assert_eq!(result.rows[0].row, 1);
        assert_eq!(result.rows[0].product_id, "W-100");
        assert_eq!(result.rows[0].price_json, r#"[{"region":"US","amount":10.00}]"#);
        assert_eq!(result.rows[1].row, 3);
        assert_eq!(result.rows[1].name, "Gadget");
    }

    #[test]
    fn test_xlsx_numeric_cells() {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.set_name("CommerceProduct").unwrap();
        for (c, header) in [CATALOG_VERSION, "Name[en]", PRICE_JSON, PRODUCT_ID].iter().enumerate() {
            worksheet.write_string(0, c as u16, *header).unwrap();
        }
        worksheet.write_string(1, 0, "AMER-2024").unwrap();
        worksheet.write_string(1, 1, "Bolt").unwrap();
        worksheet.write_string(1, 2, "[]").unwrap();
        worksheet.write_number(1, 3, 1234).unwrap();
        let bytes = workbook.save_to_buffer().unwrap();

        let result = load_bytes(&bytes, &ConvertOptions::default()).unwrap();
        assert_eq!(result.rows[0].product_id, "1234");
    }

    #[test]
    fn test_xlsx_descriptor_rows_and_sheet_option() {
        let bytes = workbook_bytes(
            "Prices",
            &[
                &["Catalog Version", "Name[en]", "Price in Json", "Product ID"],
                &["catalogVersion(catalog(id),version)", "name[lang=en]", "priceJson", "code"],
                &["CatalogVersion", "localized:String", "String", "String"],
                &["AMER-2024", "Widget", "[]", "W-100"],
            ],
        );

        let err = load_bytes(&bytes, &ConvertOptions::default()).unwrap_err();
        match err {
            ConvertError::MissingSheet { sheet, available } => {
                assert_eq!(sheet, "CommerceProduct");
                assert_eq!(available, vec!["Prices"]);
            }
            other => panic!("expected missing sheet, got {:?}", other),
        }

        let options = ConvertOptions {
            sheet: "Prices".to_string(),
            skip_rows: 2,
            ..ConvertOptions::default()
        };
        let result = load_bytes(&bytes, &options).unwrap();
        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.rows[0].row, 1);
        assert_eq!(result.rows[0].product_id, "W-100");
    }

    #[test]
    fn test_truncated_workbook_is_not_a_schema_error() {
        let bytes = b"PK\x03\x04\x14\x00\x00\x00[Content_Types].xml";
        let err = load_bytes(bytes, &ConvertOptions::default()).unwrap_err();
        assert!(matches!(err, ConvertError::Workbook(_)));
    }

    #[test]
    fn test_xlsx_extension_routes_to_workbook() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("export.xlsx");
        std::fs::write(&path, "Catalog Version,Name[en],Price in Json,Product ID\n").unwrap();

        // Text named .xlsx is not silently read as CSV.
        let err = load_source_rows(&path, &ConvertOptions::default()).unwrap_err();
        assert!(matches!(err, ConvertError::Workbook(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = load_source_rows("/nonexistent/export.csv", &ConvertOptions::default()).unwrap_err();
        assert!(matches!(err, ConvertError::Io { .. }));
    }
}
