//! pipeline-runner: command-line entry point for the attribution pipeline.
//!
//! Usage:
//!   pipeline-runner --api-token TOKEN
//!   pipeline-runner --api-token TOKEN --start-date 2023-09-01 --end-date 2023-09-30 --prod

use std::env;
use std::path::Path;
use std::process::ExitCode;

use attribution_core::{
    attribution::{HeuristicScorer, IhcClient},
    config::{ApiConfig, PipelineConfig},
    error::{PipelineError, PipelineResult},
    pipeline::{self, RunSummary},
    store::PipelineStore,
    types::DateRange,
};
use chrono::NaiveDate;

fn main() -> ExitCode {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(PipelineError::Usage(msg)) => {
            eprintln!("Usage error: {msg}");
            print_usage();
            ExitCode::FAILURE
        }
        Err(e) => {
            log::error!("pipeline failed: {e}");
            eprintln!("Pipeline failed: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &[String]) -> PipelineResult<()> {
    // All usage validation happens up front, before any I/O.
    let api_token = require_arg(args, "--api-token")?;
    let db = arg_value(args, "--db").unwrap_or("attribution.db");
    let output = arg_value(args, "--output").unwrap_or("output");
    let start = parse_date_arg(args, "--start-date")?;
    let end = parse_date_arg(args, "--end-date")?;
    let range = DateRange::new(start, end)?;
    let prod = args.iter().any(|a| a == "--prod");
    let include_empty = !args.iter().any(|a| a == "--drop-empty-journeys");

    let mut api = ApiConfig::new(api_token);
    if let Some(url) = arg_value(args, "--api-url") {
        api.url = url.to_string();
    }
    if let Ok(url) = env::var("IHC_API_URL") {
        api.url = url;
    }
    if let Some(raw) = arg_value(args, "--batch-size") {
        api.batch_size = raw
            .parse::<usize>()
            .ok()
            .filter(|n| *n >= 1)
            .ok_or_else(|| {
                PipelineError::Usage(format!(
                    "--batch-size must be a positive integer, got: {raw}"
                ))
            })?;
    }

    let started = chrono::Local::now();
    log::info!("starting attribution pipeline{}", range.label());

    let store = PipelineStore::open(db)?;
    store.migrate()?;

    let mut config = PipelineConfig::new(api, range);
    config.include_empty_journeys = include_empty;

    let summary = if prod {
        let client = IhcClient::new(config.api.clone())?;
        pipeline::run(&store, &client, &config, Path::new(output))?
    } else {
        log::info!("test mode: using the offline scorer (pass --prod for the live API)");
        pipeline::run(&store, &HeuristicScorer, &config, Path::new(output))?
    };

    let finished = chrono::Local::now();
    print_summary(&summary, started, finished);
    Ok(())
}

fn print_summary(
    summary: &RunSummary,
    started: chrono::DateTime<chrono::Local>,
    finished: chrono::DateTime<chrono::Local>,
) {
    println!();
    println!("Attribution Pipeline Summary:");
    println!("  started:     {}", started.format("%Y-%m-%d %H:%M:%S"));
    println!("  completed:   {}", finished.format("%Y-%m-%d %H:%M:%S"));
    println!("  duration:    {}s", (finished - started).num_seconds());
    println!("  sessions:    {}", summary.sessions);
    println!("  conversions: {}", summary.conversions);
    println!("  journeys:    {}", summary.journeys);
    println!("  weights:     {}", summary.weights);
    println!("  report rows: {}", summary.report_rows);
    println!("  report:      {}", summary.report_path.display());
}

fn arg_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2).find(|w| w[0] == flag).map(|w| w[1].as_str())
}

fn require_arg<'a>(args: &'a [String], flag: &str) -> PipelineResult<&'a str> {
    arg_value(args, flag).ok_or_else(|| PipelineError::Usage(format!("{flag} is required")))
}

fn parse_date_arg(args: &[String], flag: &str) -> PipelineResult<Option<NaiveDate>> {
    match arg_value(args, flag) {
        None => Ok(None),
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| PipelineError::Usage(format!("{flag} must be YYYY-MM-DD, got: {raw}"))),
    }
}

fn print_usage() {
    eprintln!();
    eprintln!("Usage: pipeline-runner --api-token TOKEN [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --api-token TOKEN       Scoring API token (required)");
    eprintln!("  --db PATH               SQLite database path (default: attribution.db)");
    eprintln!("  --output DIR            Report output directory (default: output)");
    eprintln!("  --start-date YYYY-MM-DD Only include rows on or after this date");
    eprintln!("  --end-date YYYY-MM-DD   Only include rows on or before this date");
    eprintln!("  --batch-size N          Journeys per scoring request (default: 100)");
    eprintln!("  --api-url URL           Scoring API endpoint (env IHC_API_URL overrides)");
    eprintln!("  --prod                  Call the live scoring API instead of the offline scorer");
    eprintln!("  --drop-empty-journeys   Drop conversions with no preceding sessions");
}
