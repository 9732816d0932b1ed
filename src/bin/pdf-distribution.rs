//! PDF Distribution service
//!
//! Runs the HTTP service or inspects a stamped PDF for its watermarks.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;

use pdf_distribution::config::{LogFormat, ServerConfig};
use pdf_distribution::logging::init_subscriber;
use pdf_distribution::pdf::{extract_watermarks, read_attribution};
use pdf_distribution::server::start_server;

/// PDF Distribution - watermarked handouts with a download audit trail
#[derive(Parser)]
#[command(name = "pdf-distribution")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "EXAMPLES:
    # Serve PDFs from ./handouts, logging downloads to ./logs/pdf-downloads.log
    pdf-distribution serve --documents-dir handouts

    # Same, with JSON logs on port 8080
    PORT=8080 pdf-distribution --log-format json serve

    # Find out who a leaked copy was issued to
    pdf-distribution inspect leaked.pdf")]
struct Cli {
    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP service
    Serve(ServerConfig),

    /// Show the attribution embedded in a stamped PDF
    Inspect {
        /// PDF file to inspect
        input: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_subscriber(cli.log_format) {
        eprintln!("Warning: {}", e);
    }

    let result = match cli.command {
        Commands::Serve(config) => cmd_serve(config).await,
        Commands::Inspect { input } => cmd_inspect(input),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

/// Run the HTTP service until shutdown
async fn cmd_serve(config: ServerConfig) -> anyhow::Result<()> {
    start_server(&config).await.context("Server failed")
}

/// Show watermark and metadata attribution found in a PDF
fn cmd_inspect(input: PathBuf) -> anyhow::Result<()> {
    let bytes = std::fs::read(&input)
        .with_context(|| format!("Input file not found: {}", input.display()))?;

    let attribution = read_attribution(&bytes)?;
    let watermarks = extract_watermarks(&bytes)?;

    println!("File: {}", input.display());
    println!("Pages: {}", attribution.page_count);

    if let Some(title) = &attribution.title {
        println!("Title: {}", title);
    }
    if let Some(keywords) = &attribution.keywords {
        println!("Keywords: {}", keywords);
    }
    if let Some(producer) = &attribution.producer {
        println!("Producer: {}", producer);
    }

    match attribution.watermark() {
        Some(record) => println!("Metadata watermark: {}", record.to_payload()?),
        None => println!("Metadata watermark: none"),
    }

    println!("In-page watermarks: {}", watermarks.len());

    let mut distinct = watermarks;
    distinct.dedup();
    for record in distinct {
        println!(
            "  user={} email={} name={} file={} at={}",
            record.user_id,
            record.email.as_deref().unwrap_or("-"),
            record.name.as_deref().unwrap_or("-"),
            record.file_name,
            record.timestamp_iso(),
        );
    }

    Ok(())
}
