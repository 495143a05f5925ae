use crate::config::Config;
use crate::pipeline;
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "fleetstats")]
#[command(about = "Longitudinal git statistics over a fleet of repositories")]
#[command(version)]
pub struct Cli {
    #[arg(
        short,
        long,
        default_value = "fleetstats.toml",
        help = "Path to the fleet configuration file"
    )]
    pub config: PathBuf,

    #[arg(short, long, help = "Recompute every repository, ignoring recorded head state")]
    pub force: bool,

    #[arg(short, long, help = "Enable debug logging")]
    pub verbose: bool,
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    pub fn execute(self) -> Result<()> {
        init_logging(self.verbose);

        let config = Config::load(&self.config).context("Failed to load configuration")?;
        pipeline::run(&config, self.force)
    }
}

// RUST_LOG always wins; --verbose only lowers the default floor.
fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::from_default_env().add_directive(level.into());
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}
