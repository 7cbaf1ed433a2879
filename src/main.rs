use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use std::thread;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use log::{info, warn, LevelFilter};
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};

use evidence_collector::cli::{Args, Commands};
use evidence_collector::collectors::build_collector;
use evidence_collector::config::{load_or_create_config, CollectionConfig};
use evidence_collector::diagnostics::LogSink;
use evidence_collector::queue::{ChannelQueue, QueueReceiver};

fn main() -> Result<()> {
    // Parse arguments
    let args = Args::parse();

    // Initialize logging
    initialize_logging(args.verbose)?;

    // Handle subcommands
    if let Some(cmd) = &args.command {
        return handle_subcommand(cmd);
    }

    // Load configuration, then apply command-line overrides
    let mut config = load_or_create_config(args.config.as_deref())?;
    args.apply_to(&mut config);

    info!("Starting collection from {}", config.source.display());

    let (queue, receiver) = ChannelQueue::bounded(config.queue_capacity.max(1));
    let mut collector = build_collector(&config, Arc::new(queue), Arc::new(LogSink), None)?;

    let output = args.output.clone();
    let consumer = thread::spawn(move || write_descriptors(receiver, output.as_deref()));

    collector.run();

    let written = consumer
        .join()
        .map_err(|_| anyhow!("Descriptor writer thread panicked"))??;

    let stats = collector.stats();
    info!(
        "Collection finished: {} files, {} duplicates suppressed, {} entries skipped, {} directories abandoned, {} snapshot stores skipped",
        stats.files_enqueued,
        stats.duplicates_skipped,
        stats.entries_skipped,
        stats.directories_abandoned,
        stats.snapshots_skipped
    );
    if stats.errors_reported > 0 {
        warn!("{} errors were reported during collection", stats.errors_reported);
    }
    info!("Wrote {} descriptors", written);
    Ok(())
}

/// Initialize logging with the specified verbosity level.
///
/// Logs go to stderr so stdout carries only descriptors.
fn initialize_logging(verbose: bool) -> Result<()> {
    let log_level = if verbose { LevelFilter::Debug } else { LevelFilter::Info };
    TermLogger::init(
        log_level,
        Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )
    .context("Failed to initialize logger")?;
    Ok(())
}

/// Handle subcommands (init-config)
fn handle_subcommand(cmd: &Commands) -> Result<()> {
    match cmd {
        Commands::InitConfig { path } => {
            info!("Creating default configuration file at {}", path.display());
            CollectionConfig::default().save_to_yaml_file(path)?;
            info!("Configuration created successfully");
            Ok(())
        }
    }
}

/// Drain the queue, writing one descriptor per line
fn write_descriptors(receiver: QueueReceiver, output: Option<&Path>) -> Result<u64> {
    let writer: Box<dyn Write> = match output {
        Some(path) => Box::new(
            File::create(path).context(format!("Failed to create output file: {}", path.display()))?,
        ),
        None => Box::new(io::stdout().lock()),
    };
    let mut writer = BufWriter::new(writer);

    let mut written = 0;
    for item in receiver.iter() {
        writeln!(writer, "{}", item).context("Failed to write descriptor")?;
        written += 1;
    }
    writer.flush().context("Failed to flush descriptors")?;
    Ok(written)
}
