//! SleepSpec CLI - classify voice recordings as sleep-deprived or not.

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

use commands::{ConfigCommand, ModelCommand, PredictCommand, SegmentCommand};

/// SleepSpec CLI - sleep-deprivation detection from voice.
///
/// Scores cached per-segment STRF feature records with a pretrained
/// PCA + linear SVM bundle and fuses them into one verdict.
///
/// Configuration is stored in ~/.sleepspec/config.yaml.
#[derive(Parser)]
#[command(name = "sleepspec")]
#[command(about = "Sleep-deprivation detection from voice")]
#[command(version)]
pub struct Cli {
    /// Config file (default is ~/.sleepspec/config.yaml)
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Model bundle (overrides the configured model)
    #[arg(short = 'm', long, global = true)]
    pub model: Option<String>,

    /// Output file (default: stdout)
    #[arg(short = 'o', long, global = true)]
    pub output: Option<String>,

    /// Output as JSON (for piping)
    #[arg(long, global = true)]
    pub json: bool,

    /// Verbose output
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Classify feature records and print the verdict
    Predict(PredictCommand),
    /// Inspect the model bundle
    Model(ModelCommand),
    /// Preview how a raw PCM recording is segmented
    Segment(SegmentCommand),
    /// Manage CLI configuration
    Config(ConfigCommand),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match &cli.command {
        Commands::Predict(cmd) => cmd.run(&cli),
        Commands::Model(cmd) => cmd.run(&cli),
        Commands::Segment(cmd) => cmd.run(&cli),
        Commands::Config(cmd) => cmd.run(&cli),
    }
}
