use clap::Parser;
use env_logger::Env;
use log::{debug, info};
use std::path::PathBuf;

use skein::config::Config;
use skein::orchestrator::AggregateOrchestrator;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Challenge directory containing the entry script
    challenge: PathBuf,

    /// Entry file name inside the challenge directory (overrides config)
    #[arg(short, long)]
    entry: Option<String>,

    /// Output aggregated Python file
    #[arg(short, long, conflicts_with = "stdout")]
    output: Option<PathBuf>,

    /// Output aggregated code to stdout instead of a file
    #[arg(long, conflicts_with = "output")]
    stdout: bool,

    /// Increase verbosity (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity level
    let log_level = match cli.verbose {
        0 => "warn",  // Default: warnings and errors only
        1 => "info",  // -v: informational messages
        2 => "debug", // -vv: debug messages
        _ => "trace", // -vvv or more: trace messages
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    debug!(
        "Verbosity level: {} (log level: {})",
        cli.verbose, log_level
    );
    info!("Starting Skein Python aggregator");

    debug!("Challenge directory: {:?}", cli.challenge);
    if cli.stdout {
        debug!("Output mode: stdout");
    } else {
        debug!("Output: {:?}", cli.output);
    }

    // Load configuration
    let config = Config::load(cli.config.as_deref())?;
    debug!("Configuration: {:?}", config);

    let entry_name = cli
        .entry
        .clone()
        .unwrap_or_else(|| config.entry_file_name.clone());
    let entry_path = cli.challenge.join(&entry_name);
    debug!("Entry point: {:?}", entry_path);

    // Validate arguments
    if !cli.stdout && cli.output.is_none() {
        return Err(anyhow::anyhow!(
            "Either --output or --stdout must be specified"
        ));
    }

    // Create aggregator and run
    let aggregator = AggregateOrchestrator::new(config);

    if cli.stdout {
        // Output to stdout
        let aggregated_code = aggregator.aggregate_to_string(&entry_path)?;
        print!("{}", aggregated_code);
        info!("Aggregate output to stdout");
    } else {
        // Output to file
        let output_path = cli
            .output
            .as_ref()
            .expect("Output path should be present when not using stdout");
        aggregator.aggregate(&entry_path, output_path)?;
        info!("Aggregate created successfully at {:?}", output_path);
    }

    Ok(())
}
