//! CSV Upsert CLI
//!
//! ```bash
//! csv-upsert serve                              # Start HTTP server (port 3000)
//! csv-upsert import contacts people.csv         # Upsert a file into the local database
//! csv-upsert list products                      # Print stored products as JSON
//! csv-upsert parse contacts people.csv          # Decode a file without importing it
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use csv_upsert::{
    decode, logging, Contact, Database, ImportResult, ImportService, Importable, Product, ServerConfig,
    StoreConfig, SystemClock,
};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "csv-upsert")]
#[command(about = "Upsert contacts and products from CSV files", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum EntityArg {
    Contacts,
    Products,
}

#[derive(Subcommand)]
enum Commands {
    /// Start HTTP server
    Serve {
        #[command(flatten)]
        config: ServerConfig,
    },

    /// Import a CSV file into the database and print the result
    Import {
        kind: EntityArg,

        /// Input CSV file
        input: PathBuf,

        #[command(flatten)]
        store: StoreConfig,
    },

    /// Print every stored record as JSON, newest first
    List {
        kind: EntityArg,

        #[command(flatten)]
        store: StoreConfig,
    },

    /// Decode a CSV file and print its rows as JSON
    Parse {
        kind: EntityArg,

        /// Input CSV file
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();
    logging::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Serve { config } => csv_upsert::start_server(config).await,
        Commands::Import { kind, input, store } => cmd_import(kind, &input, &store).await,
        Commands::List { kind, store } => cmd_list(kind, &store).await,
        Commands::Parse { kind, input, output } => match kind {
            EntityArg::Contacts => cmd_parse::<Contact>(&input, output.as_deref()),
            EntityArg::Products => cmd_parse::<Product>(&input, output.as_deref()),
        },
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn service<E: Importable>(store: Arc<dyn csv_upsert::EntityStore<E>>) -> ImportService<E> {
    ImportService::new(store, Arc::new(SystemClock))
}

async fn cmd_import(kind: EntityArg, input: &Path, store: &StoreConfig) -> Result<(), Box<dyn std::error::Error>> {
    let bytes = fs::read(input)?;
    let file_name = input.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
    let db = Database::open(&store.database)?;

    let result: ImportResult = match kind {
        EntityArg::Contacts => service::<Contact>(Arc::new(db.contacts())).import_bytes(&bytes, &file_name).await,
        EntityArg::Products => service::<Product>(Arc::new(db.products())).import_bytes(&bytes, &file_name).await,
    };

    println!("{}", serde_json::to_string_pretty(&result)?);

    if !result.success {
        std::process::exit(1);
    }
    Ok(())
}

async fn cmd_list(kind: EntityArg, store: &StoreConfig) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open(&store.database)?;

    let json = match kind {
        EntityArg::Contacts => to_json(&service::<Contact>(Arc::new(db.contacts())).list().await?)?,
        EntityArg::Products => to_json(&service::<Product>(Arc::new(db.products())).list().await?)?,
    };
    println!("{}", json);
    Ok(())
}

fn cmd_parse<E: Importable>(input: &Path, output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Parsing CSV: {}", input.display());

    let bytes = fs::read(input)?;
    let rows = decode(&bytes, E::COLUMNS)?;
    eprintln!("   Encoding: {}", rows.encoding);
    eprintln!("   Delimiter: '{}'", format_delimiter(rows.delimiter));
    eprintln!("   Columns: {}", rows.headers.join(", "));

    let mut records = Vec::new();
    let mut failed = 0;
    for row in rows {
        match row {
            Ok(row) => {
                let mut record: Map<String, Value> = row
                    .fields()
                    .map(|(column, value)| (column.to_string(), Value::String(value.to_string())))
                    .collect();
                record.insert("_row".to_string(), Value::from(row.number));
                records.push(Value::Object(record));
            }
            Err(e) => {
                failed += 1;
                eprintln!("   ⚠️  Row {}: {}", e.number, e.message);
            }
        }
    }
    eprintln!("✅ Parsed {} rows ({} unreadable)", records.len(), failed);

    let json = to_json(&records)?;
    write_output(&json, output)?;

    Ok(())
}

fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "\\t".to_string(),
        c => c.to_string(),
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<String> {
    serde_json::to_string_pretty(value)
}

fn write_output(content: &str, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("   💾 Saved to: {}", p.display());
        }
        None => println!("{}", content),
    }
    Ok(())
}
