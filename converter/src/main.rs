//! Priceflat CLI - flatten AMER pricing exports
//!
//! ```bash
//! priceflat convert CommerceProduct.xlsx prices.xlsx --skip-rows 2
//! priceflat convert export.csv prices.csv --policy lenient --sale-prices
//! priceflat check export.csv --json            # validate without writing
//! priceflat inspect export.csv                 # show detected layout
//! ```
//!
//! Settings can also come from `PRICEFLAT_*` variables or a `.env` file;
//! flags take precedence.

use clap::{Args, Parser, Subcommand};
use priceflat::logs::LOG_SINK;
use priceflat::{
    check_file, config::parse_delimiter, convert_file, load_source_rows, Catalog, ColumnMap,
    ConvertError, ConvertOptions, ConvertSummary, RegionPolicy,
};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "priceflat")]
#[command(about = "Flatten AMER pricing exports into one column per regional price", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert an export into the flat price sheet
    Convert {
        /// Pricing export (.xlsx, .csv, .tsv)
        input: PathBuf,

        /// Destination sheet (.xlsx writes a workbook, anything else CSV)
        output: PathBuf,

        #[command(flatten)]
        options: OptionArgs,

        /// Append US/CA sale price columns
        #[arg(long)]
        sale_prices: bool,

        /// Delimiter for CSV output (default: ',')
        #[arg(long)]
        output_delimiter: Option<String>,
    },

    /// Load and transform an export without writing anything
    Check {
        /// Pricing export (.xlsx, .csv, .tsv)
        input: PathBuf,

        #[command(flatten)]
        options: OptionArgs,
    },

    /// Show format, header row and matched columns
    Inspect {
        /// Pricing export (.xlsx, .csv, .tsv)
        input: PathBuf,

        #[command(flatten)]
        source: SourceArgs,
    },
}

/// How to read the export.
#[derive(Args)]
struct SourceArgs {
    /// CSV delimiter of the export (auto-detect if not specified)
    #[arg(short, long)]
    delimiter: Option<String>,

    /// Locale of the name column, e.g. `en` for `Name[en]`
    #[arg(long)]
    locale: Option<String>,

    /// Worksheet of an .xlsx export (default: CommerceProduct)
    #[arg(long)]
    sheet: Option<String>,

    /// Rows between the header and the data to ignore (attribute descriptors)
    #[arg(long)]
    skip_rows: Option<usize>,
}

impl SourceArgs {
    fn apply(&self, options: &mut ConvertOptions) -> Result<(), ConvertError> {
        if let Some(ref d) = self.delimiter {
            options.delimiter = Some(parse_delimiter(d)?);
        }
        if let Some(ref locale) = self.locale {
            options.locale = locale.clone();
        }
        if let Some(ref sheet) = self.sheet {
            options.sheet = sheet.clone();
        }
        if let Some(n) = self.skip_rows {
            options.skip_rows = n;
        }
        Ok(())
    }
}

#[derive(Args)]
struct OptionArgs {
    #[command(flatten)]
    source: SourceArgs,

    /// Catalog scope
    #[arg(long, value_enum)]
    catalog: Option<Catalog>,

    /// Unsupported regions: fail the run (strict) or skip the entry (lenient)
    #[arg(long, value_enum)]
    policy: Option<RegionPolicy>,

    /// Print the run summary as JSON on stdout
    #[arg(long)]
    json: bool,

    /// Only print warnings and errors
    #[arg(short, long)]
    quiet: bool,
}

impl OptionArgs {
    fn apply(&self, options: &mut ConvertOptions) -> Result<(), ConvertError> {
        self.source.apply(options)?;
        if let Some(catalog) = self.catalog {
            options.catalog = catalog;
        }
        if let Some(policy) = self.policy {
            options.policy = policy;
        }
        LOG_SINK.set_quiet(self.quiet);
        Ok(())
    }
}

fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let result = ConvertOptions::from_env().and_then(|options| match cli.command {
        Commands::Convert {
            input,
            output,
            options: args,
            sale_prices,
            output_delimiter,
        } => cmd_convert(&input, &output, options, &args, sale_prices, output_delimiter.as_deref()),

        Commands::Check { input, options: args } => cmd_check(&input, options, &args),

        Commands::Inspect { input, source } => cmd_inspect(&input, options, &source),
    });

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn cmd_convert(
    input: &Path,
    output: &Path,
    mut options: ConvertOptions,
    args: &OptionArgs,
    sale_prices: bool,
    output_delimiter: Option<&str>,
) -> Result<(), ConvertError> {
    args.apply(&mut options)?;
    if sale_prices {
        options.include_sale_prices = true;
    }
    if let Some(d) = output_delimiter {
        options.output_delimiter = parse_delimiter(d)?;
    }

    let summary = convert_file(input, output, &options)?;
    report(&summary, args.json)?;
    eprintln!("💾 Output written to: {}", output.display());
    Ok(())
}

fn cmd_check(input: &Path, mut options: ConvertOptions, args: &OptionArgs) -> Result<(), ConvertError> {
    args.apply(&mut options)?;

    let summary = check_file(input, &options)?;
    report(&summary, args.json)?;
    eprintln!("✅ {} rows convert cleanly", summary.output_rows);
    Ok(())
}

fn cmd_inspect(input: &Path, mut options: ConvertOptions, source: &SourceArgs) -> Result<(), ConvertError> {
    source.apply(&mut options)?;

    eprintln!("📄 Inspecting: {}", input.display());
    let load = load_source_rows(input, &options)?;
    let columns = ColumnMap::from_headers(&load.headers, &options.locale)?;

    match (&load.sheet, load.delimiter) {
        (Some(sheet), _) => println!("Sheet:     {}", sheet),
        (None, Some(d)) => {
            println!("Encoding:  {}", load.encoding);
            println!("Delimiter: '{}'", format_delimiter(d));
        }
        (None, None) => {}
    }
    println!("Header:    line {}", load.header_line);
    println!("Rows:      {}", load.rows.len());
    println!("Columns:");
    for (i, header) in load.headers.iter().enumerate() {
        let role = if i == columns.catalog_version {
            " ← catalog version"
        } else if i == columns.name {
            " ← name"
        } else if i == columns.price_json {
            " ← price json"
        } else if i == columns.product_id {
            " ← product id"
        } else {
            ""
        };
        println!("  [{:2}] {}{}", i + 1, header, role);
    }
    Ok(())
}

fn report(summary: &ConvertSummary, json: bool) -> Result<(), ConvertError> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
    } else {
        print_summary(summary);
    }
    Ok(())
}

fn print_summary(summary: &ConvertSummary) {
    eprintln!("\n📊 Results:");
    eprintln!("   Rows: {} in, {} out", summary.input_rows, summary.output_rows);
    eprintln!("   Without US price: {}", summary.missing_us);
    eprintln!("   Without CA price: {}", summary.missing_ca);
    if !summary.skipped.is_empty() {
        eprintln!("   Skipped entries: {}", summary.skipped.len());
    }
}

fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "\\t".to_string(),
        c => c.to_string(),
    }
}
