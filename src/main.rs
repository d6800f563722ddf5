//! # escble CLI
//!
//! Command-line interface for BLE receipt printing.
//!
//! ## Usage
//!
//! ```bash
//! # Print an order
//! escble print order.json
//!
//! # Connect (or check the connection) without printing
//! escble connect
//!
//! # Show the printer status
//! escble status
//!
//! # Show the receipt without a printer
//! escble preview order.json
//! escble preview --hex order.json
//!
//! # Run against the in-memory printer
//! escble --simulate print order.json
//! ```

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use escble::{
    PrintError, ReceiptPrinter, Settings,
    notice::Notice,
    order::OrderRecord,
    protocol::encode,
    receipt::format::Formatter,
    store::{FileStore, KeyValueStore},
    transport::{
        BleAdapter,
        mock::{MockAdapter, MockPrinter},
    },
};

/// escble - BLE thermal receipt printer utility
#[derive(Parser, Debug)]
#[command(name = "escble")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Settings file (JSON)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// File holding the remembered printer
    #[arg(long, global = true, value_name = "FILE")]
    state: Option<PathBuf>,

    /// Use an in-memory printer instead of Bluetooth
    #[arg(long, global = true)]
    simulate: bool,

    /// Maximum bytes per BLE write
    #[arg(long, global = true)]
    chunk_size: Option<usize>,

    /// Delay between BLE writes in milliseconds
    #[arg(long, global = true)]
    chunk_delay_ms: Option<u64>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print an order receipt
    Print {
        /// Order record (JSON)
        order: PathBuf,
    },

    /// Connect to the printer without printing
    Connect,

    /// Show the printer connection status
    Status,

    /// Render a receipt to the terminal
    Preview {
        /// Order record (JSON)
        order: PathBuf,

        /// Show the encoded write chunks as hex
        #[arg(long)]
        hex: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "escble=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<ExitCode, PrintError> {
    let cli = Cli::parse();
    let settings = load_settings(&cli)?;

    if let Commands::Preview { order, hex } = &cli.command {
        preview(&settings, order, *hex)?;
        return Ok(ExitCode::SUCCESS);
    }

    let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(settings.state_path.clone()));

    if cli.simulate {
        let adapter = MockAdapter::new(MockPrinter::new("Simulated Printer"));
        return execute(ReceiptPrinter::new(adapter, store, &settings), &settings, &cli.command).await;
    }

    #[cfg(feature = "ble")]
    let adapter = escble::transport::btleplug::BtleAdapter::new().await?;
    #[cfg(not(feature = "ble"))]
    let adapter = escble::transport::Unavailable;

    execute(ReceiptPrinter::new(adapter, store, &settings), &settings, &cli.command).await
}

fn load_settings(cli: &Cli) -> Result<Settings, PrintError> {
    let mut settings = match &cli.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };

    if let Some(state) = &cli.state {
        settings.state_path = state.clone();
    }
    if let Some(size) = cli.chunk_size {
        settings.printer.chunk_size = size;
    }
    if let Some(delay) = cli.chunk_delay_ms {
        settings.printer.chunk_delay_ms = delay;
    }
    settings.printer.validate()?;

    Ok(settings)
}

fn load_order(path: &Path) -> Result<OrderRecord, PrintError> {
    let raw = std::fs::read_to_string(path)?;
    serde_json::from_str(&raw)
        .map_err(|e| PrintError::Config(format!("invalid order {}: {}", path.display(), e)))
}

fn preview(settings: &Settings, path: &Path, hex: bool) -> Result<(), PrintError> {
    let order = load_order(path)?;
    let receipt = Formatter::new(settings.store.clone()).format(&order)?;

    if hex {
        let chunks = encode::packetize(&encode::encode(receipt.lines()), settings.printer.chunk_size);
        for (i, chunk) in chunks.iter().enumerate() {
            let bytes: Vec<String> = chunk.iter().map(|b| format!("{:02X}", b)).collect();
            println!("[{:3}] {}", i + 1, bytes.join(" "));
        }
    } else {
        for line in receipt.preview() {
            println!("|{}|", line);
        }
    }
    Ok(())
}

async fn execute<A: BleAdapter>(
    printer: ReceiptPrinter<A>,
    settings: &Settings,
    command: &Commands,
) -> Result<ExitCode, PrintError> {
    let notice = match command {
        Commands::Status => {
            println!("{}", printer.status().await);
            return Ok(ExitCode::SUCCESS);
        }
        Commands::Connect => printer.run_job(None).await,
        Commands::Print { order } => {
            let order = load_order(order)?;
            printer.run_job(Some(&order)).await
        }
        Commands::Preview { order, hex } => {
            preview(settings, order, *hex)?;
            return Ok(ExitCode::SUCCESS);
        }
    };

    println!("{}", notice);
    printer.disconnect().await;

    Ok(match notice {
        Notice::Failed { .. } => ExitCode::FAILURE,
        _ => ExitCode::SUCCESS,
    })
}
