//! Configuration management commands.

use std::path::PathBuf;

use clap::{Args, Subcommand};

use super::{get_config, output_result, print_success};
use crate::Cli;

/// Manage CLI configuration.
///
/// Configuration is stored in ~/.sleepspec/config.yaml
#[derive(Args)]
pub struct ConfigCommand {
    #[command(subcommand)]
    command: ConfigSubcommand,
}

#[derive(Subcommand)]
enum ConfigSubcommand {
    /// Show the effective configuration
    Show,
    /// Write a configuration file
    Init {
        /// Model bundle path
        #[arg(long)]
        model: Option<PathBuf>,
        /// Sample rate of raw PCM input in Hz
        #[arg(long)]
        sample_rate: Option<u32>,
        /// Segment window length in seconds
        #[arg(long)]
        segment_seconds: Option<u32>,
        /// Default directory of feature records
        #[arg(long)]
        record_dir: Option<PathBuf>,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

impl ConfigCommand {
    pub fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        match &self.command {
            ConfigSubcommand::Show => {
                let cfg = get_config(cli)?;
                output_result(&cfg, cli.output.as_deref(), cli.json)
            }
            ConfigSubcommand::Init {
                model,
                sample_rate,
                segment_seconds,
                record_dir,
                force,
            } => {
                let mut cfg = get_config(cli)?;
                if cfg.exists() && !force {
                    anyhow::bail!(
                        "{} already exists, use --force to overwrite",
                        cfg.path().display()
                    );
                }

                if model.is_some() {
                    cfg.model = model.clone();
                }
                if let Some(rate) = sample_rate {
                    cfg.sample_rate = *rate;
                }
                if let Some(secs) = segment_seconds {
                    cfg.segment_seconds = *secs;
                }
                if record_dir.is_some() {
                    cfg.record_dir = record_dir.clone();
                }
                if cfg.sample_rate == 0 || cfg.segment_seconds == 0 {
                    anyhow::bail!("sample rate and segment length must be positive");
                }

                cfg.save()?;
                print_success(&format!("Wrote {}", cfg.path().display()));
                Ok(())
            }
        }
    }
}
