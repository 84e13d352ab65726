//! Writer for the flattened price sheet.
//!
//! The destination extension picks the format: `.xlsx` gets a workbook,
//! anything else delimited text. Either way the sheet is written to a
//! temporary file next to the destination and renamed into place once
//! complete, so the destination either holds a full sheet or is left
//! untouched.

use csv::WriterBuilder;
use rust_decimal::Decimal;
use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};
use std::io::Write;
use std::path::Path;

use crate::config::{ConvertOptions, SheetFormat};
use crate::error::ConvertError;
use crate::models::OutputRow;

pub const OUTPUT_HEADERS: [&str; 5] = ["Catalog Version", "Name", "Product ID", "US Price", "CA Price"];
pub const SALE_HEADERS: [&str; 2] = ["US Sale Price", "CA Sale Price"];

/// Worksheet name of `.xlsx` output.
pub const OUTPUT_SHEET: &str = "Prices";

/// Header row for the given options.
pub fn output_headers(options: &ConvertOptions) -> Vec<&'static str> {
    let mut headers = OUTPUT_HEADERS.to_vec();
    if options.include_sale_prices {
        headers.extend_from_slice(&SALE_HEADERS);
    }
    headers
}

fn cell(price: Option<Decimal>) -> String {
    price.map(|p| p.to_string()).unwrap_or_default()
}

fn record(row: &OutputRow, options: &ConvertOptions) -> Vec<String> {
    let mut cells = vec![
        row.catalog_version.clone(),
        row.name.clone(),
        row.product_id.clone(),
        cell(row.us_price),
        cell(row.ca_price),
    ];
    if options.include_sale_prices {
        cells.push(cell(row.us_sale_price));
        cells.push(cell(row.ca_sale_price));
    }
    cells
}

/// Write the header and every row to `out`, in order.
pub fn write_rows<W: Write>(out: W, rows: &[OutputRow], options: &ConvertOptions) -> Result<(), ConvertError> {
    let delimiter = u8::try_from(options.output_delimiter).map_err(|_| {
        ConvertError::Config(format!(
            "output delimiter '{}' is not ASCII",
            options.output_delimiter
        ))
    })?;

    let mut writer = WriterBuilder::new().delimiter(delimiter).from_writer(out);

    writer
        .write_record(output_headers(options))
        .map_err(ConvertError::csv_format)?;

    for row in rows {
        writer
            .write_record(record(row, options))
            .map_err(|source| ConvertError::Csv { row: row.row, source })?;
    }

    writer
        .flush()
        .map_err(|e| ConvertError::csv_format(e.into()))
}

// =============================================================================
// Workbook output
// =============================================================================

/// Build the sheet as an `.xlsx` workbook in memory.
///
/// Prices are numeric cells whose number format shows as many decimals as
/// the exported amount had, so `10.00` still reads `10.00` in Excel.
pub fn xlsx_bytes(rows: &[OutputRow], options: &ConvertOptions) -> Result<Vec<u8>, ConvertError> {
    build_workbook(rows, options)
        .and_then(|mut workbook| workbook.save_to_buffer())
        .map_err(|e| ConvertError::Workbook(e.to_string()))
}

fn build_workbook(rows: &[OutputRow], options: &ConvertOptions) -> Result<Workbook, XlsxError> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(OUTPUT_SHEET)?;

    let bold = Format::new().set_bold();
    for (col, header) in output_headers(options).iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, *header, &bold)?;
    }

    for (i, row) in rows.iter().enumerate() {
        let r = i as u32 + 1;
        worksheet.write_string(r, 0, &row.catalog_version)?;
        worksheet.write_string(r, 1, &row.name)?;
        worksheet.write_string(r, 2, &row.product_id)?;
        write_price(worksheet, r, 3, row.us_price)?;
        write_price(worksheet, r, 4, row.ca_price)?;
        if options.include_sale_prices {
            write_price(worksheet, r, 5, row.us_sale_price)?;
            write_price(worksheet, r, 6, row.ca_sale_price)?;
        }
    }

    Ok(workbook)
}

fn write_price(worksheet: &mut Worksheet, row: u32, col: u16, price: Option<Decimal>) -> Result<(), XlsxError> {
    let price = match price {
        Some(price) => price,
        None => return Ok(()),
    };
    // Parsed from the decimal text so the cell holds the nearest double to it.
    match price.to_string().parse::<f64>().ok() {
        Some(value) => {
            let format = Format::new().set_num_format(number_format(price.scale()));
            worksheet.write_number_with_format(row, col, value, &format)?;
        }
        None => {
            worksheet.write_string(row, col, price.to_string())?;
        }
    }
    Ok(())
}

/// Excel number format with `scale` fixed decimals: `0`, `0.0`, `0.00`...
fn number_format(scale: u32) -> String {
    if scale == 0 {
        "0".to_string()
    } else {
        format!("0.{}", "0".repeat(scale as usize))
    }
}

/// Write the sheet to `path`, replacing any existing file only on success.
pub fn write_output_rows<P: AsRef<Path>>(
    path: P,
    rows: &[OutputRow],
    options: &ConvertOptions,
) -> Result<(), ConvertError> {
    let path = path.as_ref();
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = tempfile::Builder::new()
        .prefix(".priceflat-")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(|e| ConvertError::io(path, e))?;

    match SheetFormat::from_path(path) {
        SheetFormat::Xlsx => {
            let bytes = xlsx_bytes(rows, options)?;
            tmp.as_file_mut()
                .write_all(&bytes)
                .map_err(|e| ConvertError::io(path, e))?;
        }
        SheetFormat::Delimited => {
            write_rows(tmp.as_file_mut(), rows, options).map_err(|err| match err {
                ConvertError::Csv { source, .. } | ConvertError::CsvFormat { source, .. }
                    if source.is_io_error() =>
                {
                    ConvertError::io(path, source.into())
                }
                other => other,
            })?;
        }
    }

    tmp.as_file().sync_all().map_err(|e| ConvertError::io(path, e))?;
    tmp.persist(path).map_err(|e| ConvertError::io(path, e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use calamine::{open_workbook, Data, Reader, Xlsx};
    use std::str::FromStr;

    fn row(id: &str, us: Option<&str>, ca: Option<&str>) -> OutputRow {
        OutputRow {
            row: 1,
            catalog_version: "AMER-2024".to_string(),
            name: "Widget".to_string(),
            product_id: id.to_string(),
            us_price: us.map(|s| Decimal::from_str(s).unwrap()),
            ca_price: ca.map(|s| Decimal::from_str(s).unwrap()),
            ..OutputRow::default()
        }
    }

    fn render(rows: &[OutputRow], options: &ConvertOptions) -> String {
        let mut buf = Vec::new();
        write_rows(&mut buf, rows, options).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_header_and_rows() {
        let out = render(
            &[row("W-100", Some("10.00"), Some("13.50")), row("W-200", None, Some("0"))],
            &ConvertOptions::default(),
        );

        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "Catalog Version,Name,Product ID,US Price,CA Price");
        assert_eq!(lines[1], "AMER-2024,Widget,W-100,10.00,13.50");
        // No price stays empty; zero stays zero.
        assert_eq!(lines[2], "AMER-2024,Widget,W-200,,0");
    }

    #[test]
    fn test_sale_price_columns() {
        let options = ConvertOptions {
            include_sale_prices: true,
            ..ConvertOptions::default()
        };
        let mut r = row("W-1", Some("20"), None);
        r.us_sale_price = Some(Decimal::from_str("15.00").unwrap());

        let out = render(&[r], &options);
        let lines: Vec<&str> = out.lines().collect();
        assert!(lines[0].ends_with("US Sale Price,CA Sale Price"));
        assert_eq!(lines[1], "AMER-2024,Widget,W-1,20,,15.00,");
    }

    #[test]
    fn test_fields_are_quoted_when_needed() {
        let mut r = row("W-1", None, None);
        r.name = "Widget, large".to_string();
        let out = render(&[r], &ConvertOptions::default());
        assert!(out.contains("\"Widget, large\""));
    }

    #[test]
    fn test_output_delimiter() {
        let options = ConvertOptions {
            output_delimiter: ';',
            ..ConvertOptions::default()
        };
        let out = render(&[row("W-1", Some("1"), Some("2"))], &options);
        assert_eq!(out.lines().nth(1), Some("AMER-2024;Widget;W-1;1;2"));
    }

    /// Fails every write and flush.
    struct FailingWriter;

    impl Write for FailingWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full"))
        }
    }

    #[test]
    fn test_write_failure_has_no_row_zero() {
        let err = write_rows(FailingWriter, &[], &ConvertOptions::default()).unwrap_err();
        assert!(matches!(err, ConvertError::CsvFormat { .. }));
        assert_eq!(err.row(), None);
        let msg = err.to_string();
        assert!(!msg.contains("Row 0"));
        assert!(msg.contains("disk full"));
    }

    #[test]
    fn test_write_xlsx_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prices.xlsx");
        let options = ConvertOptions {
            include_sale_prices: true,
            ..ConvertOptions::default()
        };
        let mut first = row("W-100", Some("10.00"), Some("13.50"));
        first.us_sale_price = Some(Decimal::from_str("8.5").unwrap());
        let second = row("G-200", None, Some("0"));

        write_output_rows(&path, &[first, second], &options).unwrap();
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);

        let mut workbook: Xlsx<_> = open_workbook(&path).unwrap();
        let range = workbook.worksheet_range(OUTPUT_SHEET).unwrap();
        let text = |r: u32, c: u32| range.get_value((r, c)).cloned().unwrap_or(Data::Empty);

        assert_eq!(text(0, 0), Data::String("Catalog Version".into()));
        assert_eq!(text(0, 4), Data::String("CA Price".into()));
        assert_eq!(text(0, 6), Data::String("CA Sale Price".into()));
        assert_eq!(text(1, 2), Data::String("W-100".into()));
        assert_eq!(text(1, 3), Data::Float(10.0));
        assert_eq!(text(1, 4), Data::Float(13.5));
        assert_eq!(text(1, 5), Data::Float(8.5));
        assert_eq!(text(1, 6), Data::Empty);
        // Missing stays empty, zero stays a number.
        assert_eq!(text(2, 3), Data::Empty);
        assert_eq!(text(2, 4), Data::Float(0.0));
    }

    #[test]
    fn test_number_format_follows_scale() {
        assert_eq!(number_format(0), "0");
        assert_eq!(number_format(2), "0.00");
        assert_eq!(number_format(3), "0.000");
    }

    #[test]
    fn test_write_file_replaces_destination() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prices.csv");
        std::fs::write(&path, "old").unwrap();

        write_output_rows(&path, &[row("W-1", Some("1"), None)], &ConvertOptions::default()).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("Catalog Version"));
        // No temporary files left behind.
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_unwritable_destination() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("prices.csv");

        let err = write_output_rows(&path, &[], &ConvertOptions::default()).unwrap_err();
        assert!(matches!(err, ConvertError::Io { .. }));
        assert!(!path.exists());
    }
}
