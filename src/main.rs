//! memex - conversation thread storage CLI
//!
#![doc = "memex - conversation thread storage CLI"]
#![doc = "Main entry point for the memex command-line tool."]

use anyhow::Result;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use memex::cli::{Cli, DEFAULT_CONFIG_PATH};
use memex::commands;
use memex::config::Config;

fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    init_tracing(cli.verbose);

    // Load configuration
    let config_path = cli.config.as_deref().unwrap_or(DEFAULT_CONFIG_PATH);
    let config = Config::load(config_path, &cli)?;

    // Validate configuration
    config.validate()?;

    commands::run(config, cli.command)
}

/// Initialize tracing on stderr so command output on stdout stays clean
fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "memex=debug" } else { "memex=info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
