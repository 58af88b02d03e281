use std::path::PathBuf;
use std::process;
use std::str::FromStr;
use std::time::Duration;

use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use futures::stream::{FuturesUnordered, StreamExt};
use log::LevelFilter;
use vaxbulletin::merge::monotonic_violations;
use vaxbulletin::source::{self, Source};
use vaxbulletin::store::{DatasetStore, JsonFileStore};
use vaxbulletin::types::ExportSummary;
use vaxbulletin::config::Engine;
use vaxbulletin::{ExportError, Extractor, ExtractorConfig};

#[derive(Parser)]
#[command(name = "vaxbulletin")]
#[command(about = "Vaccination bulletin scraper and dataset reconciler", long_about = None)]
struct Cli {
    #[arg(
        short = 'l',
        long = "log-level",
        value_enum,
        default_value = "info",
        global = true,
        help = "Set the logging level"
    )]
    log_level: LogLevel,

    #[arg(
        short = 'S',
        long = "server-mode",
        global = true,
        help = "Only log errors, overriding --log-level"
    )]
    server_mode: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

#[derive(Debug, Clone, ValueEnum)]
enum EngineArg {
    Http,
    Firefox,
    Chrome,
}

impl From<EngineArg> for Engine {
    fn from(engine: EngineArg) -> Self {
        match engine {
            EngineArg::Http => Engine::Http,
            EngineArg::Firefox => Engine::Firefox,
            EngineArg::Chrome => Engine::Chrome,
        }
    }
}

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape new bulletins and attach them to the stored datasets
    Export {
        #[arg(
            value_parser = parse_source,
            help = "Sources to export (all registered sources when omitted)"
        )]
        sources: Vec<Source>,

        #[arg(long, default_value = "output", help = "Directory holding the datasets")]
        data_dir: PathBuf,

        #[arg(long, help = "Run sources concurrently")]
        parallel: bool,

        #[arg(
            long,
            default_value_t = vaxbulletin::config::DEFAULT_TIMEOUT_SECS,
            help = "Page load timeout in seconds"
        )]
        timeout: u64,

        #[arg(long, help = "Number of comprehensive bulletins to read per source")]
        complete_links: Option<usize>,

        #[arg(
            short = 'e',
            long,
            value_enum,
            default_value = "http",
            help = "Rendering engine (firefox and chrome need a running WebDriver server)"
        )]
        engine: EngineArg,

        #[arg(
            long,
            default_value = vaxbulletin::config::DEFAULT_WEBDRIVER_URL,
            help = "WebDriver server URL"
        )]
        webdriver_url: String,

        #[arg(
            long,
            default_value_t = vaxbulletin::config::DEFAULT_RENDER_WAIT_SECS,
            help = "Seconds to let scripts render after each browser navigation"
        )]
        render_wait: u64,

        #[arg(
            short = 'o',
            long = "output",
            value_enum,
            default_value = "text",
            help = "Output format"
        )]
        format: OutputFormat,
    },
    /// Print the latest date on file for a source
    Watermark {
        #[arg(value_parser = parse_source, help = "Source name")]
        source: Source,

        #[arg(long, default_value = "output", help = "Directory holding the datasets")]
        data_dir: PathBuf,
    },
    /// Print a source's canonical dataset
    Show {
        #[arg(value_parser = parse_source, help = "Source name")]
        source: Source,

        #[arg(long, default_value = "output", help = "Directory holding the datasets")]
        data_dir: PathBuf,

        #[arg(
            long,
            value_name = "YYYY-MM-DD",
            help = "Only show entries on or after this date",
            value_parser = |s: &str| NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| e.to_string()),
        )]
        since: Option<NaiveDate>,

        #[arg(
            short = 'o',
            long = "output",
            value_enum,
            default_value = "text",
            help = "Output format"
        )]
        format: OutputFormat,
    },
    /// List registered sources
    Sources {
        #[arg(
            short = 'o',
            long = "output",
            value_enum,
            default_value = "text",
            help = "Output format"
        )]
        format: OutputFormat,
    },
}

fn parse_source(s: &str) -> Result<Source, String> {
    Source::from_str(s).map_err(|e| e.to_string())
}

fn serialize_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            log::error!("Error serializing to JSON: {}", e);
            process::exit(1);
        }
    }
}

async fn export_one(
    source: Source,
    config: ExtractorConfig,
    data_dir: PathBuf,
) -> (String, Result<ExportSummary, ExportError>) {
    let extractor = Extractor::new(source, config);
    let name = extractor.source().name.clone();
    let mut store = JsonFileStore::new(data_dir);
    (name, extractor.export(&mut store).await)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level = if cli.server_mode {
        LevelFilter::Error
    } else {
        cli.log_level.clone().into()
    };
    env_logger::Builder::new().filter_level(level).init();

    match cli.command {
        Commands::Export {
            sources,
            data_dir,
            parallel,
            timeout,
            complete_links,
            engine,
            webdriver_url,
            render_wait,
            format,
        } => {
            let config = ExtractorConfig {
                timeout: Duration::from_secs(timeout),
                complete_links,
                engine: engine.into(),
                webdriver_url,
                render_wait: Duration::from_secs(render_wait),
                ..ExtractorConfig::default()
            };
            let config = config.validate().unwrap_or_else(|e| {
                log::error!("Invalid args: {e}");
                process::exit(1);
            });

            let sources = if sources.is_empty() {
                source::all()
            } else {
                sources
            };

            let mut results = Vec::new();
            if parallel {
                log::info!("Exporting {} source(s) concurrently...", sources.len());
                let mut futs: FuturesUnordered<_> = sources
                    .into_iter()
                    .map(|s| export_one(s, config.clone(), data_dir.clone()))
                    .collect();
                while let Some(result) = futs.next().await {
                    results.push(result);
                }
            } else {
                for s in sources {
                    results.push(export_one(s, config.clone(), data_dir.clone()).await);
                }
            }

            let mut failed = 0;
            let mut summaries = Vec::new();
            for (name, result) in results {
                match result {
                    Ok(summary) => summaries.push((name, summary)),
                    Err(e) => {
                        log::error!("Export of {} failed: {}", name, e);
                        failed += 1;
                    }
                }
            }

            match format {
                OutputFormat::Json => serialize_json(&summaries),
                OutputFormat::Text => {
                    for (name, summary) in &summaries {
                        println!("{:<12} {}", name, summary);
                    }
                }
            }

            if failed > 0 {
                process::exit(1);
            }
        }

        Commands::Watermark { source, data_dir } => {
            let store = JsonFileStore::new(data_dir);
            match store.load_watermark(&source.location) {
                Ok(Some(date)) => println!("{}", date),
                Ok(None) => println!("No history for {}", source.location),
                Err(e) => {
                    log::error!("Error reading dataset: {}", e);
                    process::exit(1);
                }
            }
        }

        Commands::Show {
            source,
            data_dir,
            since,
            format,
        } => {
            let store = JsonFileStore::new(data_dir);
            let mut records = store.load(&source.location).unwrap_or_else(|e| {
                log::error!("Error reading dataset: {}", e);
                process::exit(1);
            });

            for violation in monotonic_violations(&records) {
                log::warn!("{}", violation);
            }

            if let Some(since) = since {
                records.retain(|r| r.date >= since);
            }

            match format {
                OutputFormat::Json => serialize_json(&records),
                OutputFormat::Text => {
                    if records.is_empty() {
                        println!("No entries to display.");
                    } else {
                        for (i, record) in records.iter().enumerate() {
                            println!("{:>4}. {}", i + 1, record);
                        }
                    }
                }
            }
        }

        Commands::Sources { format } => {
            let infos: Vec<_> = source::all().iter().map(Source::info).collect();
            match format {
                OutputFormat::Json => serialize_json(&infos),
                OutputFormat::Text => {
                    for info in &infos {
                        println!("{}", info);
                    }
                }
            }
        }
    }
}
