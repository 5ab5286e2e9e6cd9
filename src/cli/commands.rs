//! Command implementations for the MagIC converter CLI
//!
//! Sets up logging, loads configuration, dispatches to the livdb, squid and
//! protocols commands and prints the final summary.

use crate::cli::args::{Args, Commands, LivdbArgs, SquidArgs};
use crate::error::{MagicError, Result};
use crate::models::ProcessingStats;
use crate::processor::LivdbProcessor;
use crate::protocol::ProtocolTable;
use crate::squid::convert_squid;
use colored::*;
use std::time::Instant;
use tracing::{debug, info};

/// Main command runner
pub async fn run(args: Args) -> Result<ProcessingStats> {
    setup_logging(&args)?;
    debug!("Command line arguments: {:?}", args);

    let command = args
        .command
        .clone()
        .ok_or_else(|| MagicError::configuration("no command given"))?;

    match &command {
        Commands::Livdb(livdb) => run_livdb(&args, livdb).await,
        Commands::Squid(squid) => run_squid(&args, squid).await,
        Commands::Protocols => {
            print_protocols();
            Ok(ProcessingStats::default())
        }
    }
}

async fn run_livdb(args: &Args, livdb: &LivdbArgs) -> Result<ProcessingStats> {
    let config = livdb.to_config(args.base_config()?)?;
    debug!("Loaded configuration: {:?}", config);
    info!(
        "Converting {} input path(s) into {} with data model {}",
        livdb.inputs.len(),
        config.output_dir.display(),
        config.data_model
    );

    let processor = LivdbProcessor::new(livdb.inputs.clone(), config)
        .with_progress(args.show_progress());
    let stats = processor.process().await?;

    if !args.quiet {
        print_summary("Livdb conversion", &stats);
    }
    Ok(stats)
}

async fn run_squid(args: &Args, squid: &SquidArgs) -> Result<ProcessingStats> {
    let config = squid.to_config()?;
    let output_dir = squid
        .output_dir()
        .ok_or_else(|| MagicError::missing_argument("--dir", "the directory of specimen folders"))?;
    info!(
        "Converting SQUID scans below {} into {}",
        config.dir.display(),
        output_dir.display()
    );

    let start_time = Instant::now();
    let stats = tokio::task::spawn_blocking(move || convert_squid(&config, &output_dir))
        .await
        .map_err(|e| MagicError::configuration(format!("SQUID conversion task failed: {}", e)))??;
    debug!("SQUID conversion took {:?}", start_time.elapsed());

    if !args.quiet {
        print_summary("SQUID conversion", &stats);
    }
    Ok(stats)
}

/// Set up structured logging based on CLI arguments
fn setup_logging(args: &Args) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let log_level = args.get_log_level();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("{}={}", crate::constants::LOG_TARGET, log_level))
    });

    if args.quiet {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_writer(std::io::stderr)
                    .compact(),
            )
            .try_init()
            .map_err(|e| MagicError::configuration(format!("Failed to set up logging: {}", e)))?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_timer(fmt::time::uptime())
                    .with_writer(std::io::stderr),
            )
            .try_init()
            .map_err(|e| MagicError::configuration(format!("Failed to set up logging: {}", e)))?;
    }

    debug!("Logging initialized at level: {}", log_level);
    Ok(())
}

fn print_protocols() {
    println!("{}", "Supported experiment types".bright_green().bold());
    for entry in ProtocolTable::entries() {
        println!(
            "  {:<14} {:<16} {}",
            entry.name.bright_cyan(),
            format!("{:?}/{:?}", entry.family, entry.energy),
            entry.method_codes.bright_black()
        );
    }
}

fn print_summary(title: &str, stats: &ProcessingStats) {
    println!("\n{}", format!("{} summary", title).bright_green().bold());
    println!(
        "  {} {}ms",
        "Time elapsed:".bright_cyan(),
        stats.processing_time_ms.to_string().bright_white()
    );
    println!(
        "  {} {}",
        "Files processed:".bright_cyan(),
        stats.files_processed.to_string().bright_white()
    );
    if stats.files_failed > 0 {
        println!(
            "  {} {}",
            "Files failed:".bright_red(),
            stats.files_failed.to_string().bright_red().bold()
        );
    }
    println!(
        "  {} {}",
        "Specimens converted:".bright_cyan(),
        stats.specimens_converted.to_string().bright_white()
    );
    if stats.specimens_skipped > 0 {
        println!(
            "  {} {}",
            "Specimens skipped:".bright_yellow(),
            stats.specimens_skipped.to_string().bright_yellow().bold()
        );
    }
    println!(
        "  {} {}",
        "Measurements written:".bright_cyan(),
        stats.measurements_written.to_string().bright_white().bold()
    );
    if stats.repeats_collapsed > 0 {
        println!(
            "  {} {}",
            "Repeats collapsed:".bright_cyan(),
            stats.repeats_collapsed.to_string().bright_white()
        );
    }
    if stats.warnings > 0 {
        println!(
            "  {} {}",
            "Warnings:".bright_yellow(),
            stats.warnings.to_string().bright_yellow()
        );
    }
    for path in &stats.output_paths {
        println!("  {} {}", "Wrote".bright_green(), path.display());
    }
}
