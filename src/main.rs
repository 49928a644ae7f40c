use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use imgw_processor::DatasetProcessor;
use imgw_processor::cli::Args;
use imgw_processor::models::{FileStatus, ProcessingStats};
use std::process;
use tracing::Level;

fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    let runtime = tokio::runtime::Runtime::new().unwrap_or_else(|e| {
        eprintln!("Failed to create async runtime: {}", e);
        process::exit(1);
    });

    match runtime.block_on(run(args)) {
        Ok(stats) => {
            print_file_report(&stats);
            process::exit(if stats.files_failed > 0 { 2 } else { 0 });
        }
        Err(error) => {
            eprintln!("Error: {:#}", error);
            process::exit(1);
        }
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(args: Args) -> Result<ProcessingStats> {
    let config = args.to_config().context("Invalid configuration")?;

    let mut processor = DatasetProcessor::new(args.input_path.clone(), args.output.clone())
        .with_context(|| format!("Cannot read input {}", args.input_path.display()))?
        .with_config(config);

    processor
        .process()
        .await
        .with_context(|| format!("Processing {} failed", args.input_path.display()))
}

/// Per-file pass/fail list
fn print_file_report(stats: &ProcessingStats) {
    if stats.file_outcomes.is_empty() {
        return;
    }

    println!("\n{}", "Files".bright_green().bold());
    for outcome in &stats.file_outcomes {
        let format = outcome
            .format
            .map(|f| f.label().to_string())
            .unwrap_or_else(|| "unknown".to_string());
        match &outcome.status {
            FileStatus::Parsed { rows, encoding } => println!(
                "  {} {} [{}, {} rows{}]",
                "ok".bright_green(),
                outcome.path.display(),
                format,
                rows,
                encoding
                    .as_ref()
                    .map(|e| format!(", {}", e))
                    .unwrap_or_default()
            ),
            FileStatus::Failed { reason } => println!(
                "  {} {}: {}",
                "FAILED".bright_red().bold(),
                outcome.path.display(),
                reason
            ),
        }
    }
}
