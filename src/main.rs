//! textcal CLI entry point.
//!
//! Provides `extract`, which turns event text into calendar records, and
//! `config`, which prints the effective configuration.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::debug;

use textcal::clock::{ReferenceClock, SystemClock};
use textcal::config::{self, Config};
use textcal::credentials::{self, api_key_var, Credentials};
use textcal::extraction::{
    BatchExtraction, EventExtractor, ExtractionError, RejectedCandidate, SingleExtraction,
};
use textcal::providers::router::parse_model_spec;
use textcal::types::EventRecord;
use textcal::{ics, logging};

/// textcal: turn free-form event descriptions into calendar events.
#[derive(Parser)]
#[command(name = "textcal", version, about)]
struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

/// Available CLI subcommands.
#[derive(Subcommand)]
enum Command {
    /// Extract events from text.
    Extract {
        /// Event text. Read from stdin when omitted.
        text: Option<String>,
        /// Extract every event in the text instead of just one.
        #[arg(long)]
        multiple: bool,
        /// Also write the valid events to this `.ics` file.
        #[arg(long, value_name = "PATH")]
        ics: Option<PathBuf>,
        /// Print records as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Print the effective configuration.
    Config,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    let _logging_guard = match &config.logging.file_dir {
        Some(dir) => match logging::init_file(dir, &config.logging.level) {
            Ok(guard) => Some(guard),
            Err(e) => {
                eprintln!("error: {e:#}");
                return ExitCode::FAILURE;
            }
        },
        None => {
            logging::init_cli(&config.logging.level);
            None
        }
    };

    let result = match cli.command {
        Command::Extract {
            text,
            multiple,
            ics,
            json,
        } => handle_extract(&config, text, multiple, ics, json).await,
        Command::Config => handle_config(&config),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Run one extraction and print the outcome.
async fn handle_extract(
    config: &Config,
    text: Option<String>,
    multiple: bool,
    ics_path: Option<PathBuf>,
    json: bool,
) -> anyhow::Result<ExitCode> {
    let text = match text {
        Some(text) => text,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read event text from stdin")?;
            buf
        }
    };

    let credentials = load_credentials()?;
    let clock: Arc<dyn ReferenceClock> = match &config.clock.timezone {
        Some(name) => Arc::new(SystemClock::from_name(name)?),
        None => Arc::new(SystemClock::local()),
    };

    let extractor = match config
        .settings(&credentials)
        .and_then(|settings| EventExtractor::from_settings(settings, clock))
    {
        Ok(extractor) => extractor,
        Err(e) => return Ok(report_failure(&e)),
    };
    debug!(?extractor, "extractor ready");

    let records = if multiple {
        match extractor.extract_multiple_events(&text).await {
            Ok(batch) => print_batch(&batch, json)?,
            Err(e) => return Ok(report_failure(&e)),
        }
    } else {
        match extractor.extract_single_event(&text).await {
            Ok(outcome) => print_single(outcome, json)?,
            Err(e) => return Ok(report_failure(&e)),
        }
    };

    if let Some(path) = ics_path {
        ics::write_calendar_file(&path, &records)?;
        eprintln!("wrote {} event(s) to {}", records.len(), path.display());
    }

    Ok(if records.is_empty() && !multiple {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn load_credentials() -> anyhow::Result<Credentials> {
    let path = config::env_file_path()?;
    credentials::load_credentials(&path)
        .with_context(|| format!("failed to load {}", path.display()))
}

fn report_failure(error: &ExtractionError) -> ExitCode {
    eprintln!("{}", error.user_message());
    eprintln!("  ({error})");
    ExitCode::FAILURE
}

fn print_single(outcome: SingleExtraction, json: bool) -> anyhow::Result<Vec<EventRecord>> {
    match outcome {
        SingleExtraction::Valid(record) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&record)?);
            } else {
                print_record(&record);
            }
            Ok(vec![record])
        }
        SingleExtraction::Invalid(rejected) => {
            print_rejected(&rejected, json)?;
            Ok(Vec::new())
        }
    }
}

fn print_batch(batch: &BatchExtraction, json: bool) -> anyhow::Result<Vec<EventRecord>> {
    if json {
        println!("{}", serde_json::to_string_pretty(&batch.records)?);
    } else if batch.records.is_empty() && batch.rejected.is_empty() {
        println!("No events found.");
    } else {
        for record in &batch.records {
            print_record(record);
            println!();
        }
    }
    for rejected in &batch.rejected {
        print_rejected(rejected, json)?;
    }
    if batch.withheld > 0 {
        eprintln!(
            "{} valid event(s) withheld because the batch was incomplete",
            batch.withheld
        );
    }
    Ok(batch.records.clone())
}

fn print_record(record: &EventRecord) {
    println!("{}", record.title());
    println!("  start: {}", record.start_time().to_rfc3339());
    println!("  end:   {}", record.end_time().to_rfc3339());
    if let Some(location) = record.location() {
        println!("  where: {location}");
    }
    if let Some(description) = record.description() {
        println!("  notes: {description}");
    }
}

/// Report a rejected candidate on stderr, as one JSON line in `--json` mode.
fn print_rejected(rejected: &RejectedCandidate, json: bool) -> anyhow::Result<()> {
    if json {
        eprintln!("{}", serde_json::to_string(rejected)?);
        return Ok(());
    }
    let title = rejected
        .candidate
        .summary
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or("(untitled)");
    eprintln!("skipped {title:?}: {}", rejected.violations.join("; "));
    Ok(())
}

/// Print the effective configuration and which API key is in use.
fn handle_config(config: &Config) -> anyhow::Result<ExitCode> {
    let rendered = toml::to_string_pretty(config).context("failed to render configuration")?;
    println!("{rendered}");

    let credentials = load_credentials()?;
    let provider = parse_model_spec(&config.llm.model)?.provider;
    let key_state = match credentials.api_key_for(&provider) {
        Some(_) => "set",
        None => "missing",
    };
    let var = api_key_var(&provider).unwrap_or("(none)");
    println!("# {var}: {key_state}");
    Ok(ExitCode::SUCCESS)
}
