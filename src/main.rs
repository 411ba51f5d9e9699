mod batch;
mod browser;
mod convert;
mod events;
mod fetcher;
mod locator;
mod models;
mod navigator;
mod ocr;
mod orchestrator;
mod report;
mod roster;
mod session;
mod signed_url;
mod telemetry;
#[cfg(test)]
mod testing;

use anyhow::{Context, Result};
use batch::BatchDriver;
use browser::ChromeBrowser;
use clap::{Arg, ArgMatches, Command};
use convert::TextConverter;
use events::{ConsoleSink, SinkSet, TracingSink};
use fetcher::HttpFetcher;
use models::Config;
use ocr::{OcrEngine, TesseractCli};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

const DEFAULT_CONFIG: &str = "gradcas.toml";

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("gradcas-fetch")
        .version("1.0")
        .about("Downloads applicant documents from the GradCAS review portal")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value(DEFAULT_CONFIG),
        )
        .subcommand(
            Command::new("download")
                .about("Fetch every roster applicant's documents (default)"),
        )
        .subcommand(
            Command::new("convert")
                .about("Convert a folder of PDFs to text files")
                .arg(
                    Arg::new("input")
                        .value_name("INPUT_DIR")
                        .help("Folder containing PDFs")
                        .required(true),
                )
                .arg(
                    Arg::new("output")
                        .value_name("OUTPUT_DIR")
                        .help("Where to write .txt files (default: <INPUT_DIR>/text_output)"),
                ),
        )
        .get_matches();

    let config_file = matches
        .get_one::<String>("config")
        .map(String::as_str)
        .unwrap_or(DEFAULT_CONFIG);

    match matches.subcommand() {
        Some(("convert", args)) => convert(config_file, args),
        _ => download(config_file).await,
    }
}

async fn download(config_file: &str) -> Result<()> {
    let config = if Path::new(config_file).exists() {
        println!("📋 Loading configuration from: {}", config_file);
        Config::load_from_file(config_file)
            .with_context(|| format!("Failed to load {}", config_file))?
    } else {
        println!("📝 Creating default configuration file: {}", config_file);
        Config::default().save_to_file(config_file)?;
        println!(
            "⚠️  Please edit {} (roster path, column names, download folder), then run the program again.",
            config_file
        );
        return Ok(());
    };
    config.validate()?;
    telemetry::init(&config.log_level)?;

    let roster = roster::load_roster(
        Path::new(&config.roster_path),
        &config.first_name_column,
        &config.last_name_column,
    )?;
    if roster.is_empty() {
        println!("⚠️  No applicants found in: {}", config.roster_path);
        return Ok(());
    }
    println!("👥 Loaded {} applicants from {}", roster.len(), config.roster_path);

    let root = config.download_root();
    fs::create_dir_all(&root)
        .with_context(|| format!("Failed to create {}", root.display()))?;
    println!("📂 Saving into: {}", root.display());

    let browser = ChromeBrowser::launch(config.headless, config.timeout()).await?;
    let session = browser.open(&config.portal_url).await?;

    if !wait_for_login().await? {
        println!("\n👋 Cancelled before processing anyone.");
        return browser.close().await;
    }

    let fetcher = HttpFetcher::new(Duration::from_secs(config.timing.download_timeout_secs));
    let sink = SinkSet(vec![Box::new(ConsoleSink), Box::new(TracingSink)]);
    let report = BatchDriver::new(&session, &fetcher, &config, &sink)
        .run(&roster)
        .await;

    println!("{}", report.render_summary(&root));
    let report_path = root.join("download_report.csv");
    let written = report.write_csv(&report_path);
    browser.close().await?;
    written.with_context(|| format!("Failed to write {}", report_path.display()))?;
    println!("📄 Report written to: {}", report_path.display());
    Ok(())
}

/// Blocks until the operator presses Enter. `false` on EOF or Ctrl-C.
async fn wait_for_login() -> Result<bool> {
    println!("\n{}", "=".repeat(60));
    println!("Log in to the portal in the browser window that just opened");
    println!("and open the applicant list you want to process.");
    println!("Press Enter here when ready (Ctrl-C to cancel).");
    println!("{}", "=".repeat(60));

    let mut line = String::new();
    let mut stdin = BufReader::new(tokio::io::stdin());
    tokio::select! {
        read = stdin.read_line(&mut line) => Ok(read.context("Failed to read stdin")? > 0),
        _ = tokio::signal::ctrl_c() => Ok(false),
    }
}

fn convert(config_file: &str, args: &ArgMatches) -> Result<()> {
    let config = if Path::new(config_file).exists() {
        Config::load_from_file(config_file)
            .with_context(|| format!("Failed to load {}", config_file))?
    } else {
        Config::default()
    };
    telemetry::init(&config.log_level)?;

    let input = args
        .get_one::<String>("input")
        .map(Path::new)
        .context("INPUT_DIR is required")?;
    let output = args.get_one::<String>("output").map(Path::new);

    let conversion = &config.conversion;
    let ocr = TesseractCli::detect(conversion.ocr_dpi, &conversion.ocr_language)
        .map(|engine| Box::new(engine) as Box<dyn OcrEngine>);
    let converter = TextConverter::new(conversion, ocr);
    if !converter.has_ocr() {
        println!("⚠️  pdftoppm/tesseract not found, scanned pages will be skipped.");
    }

    let summary = converter.convert_folder(input, output)?;
    if summary.total > 0 {
        println!("{}", summary.render());
    }
    Ok(())
}
