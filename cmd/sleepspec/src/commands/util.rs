//! Utility functions for CLI commands.

use std::path::PathBuf;

use sleepspec::ClassifierModel;

use crate::Cli;
use crate::config::{Config, load_config};

/// Gets the global configuration.
pub fn get_config(cli: &Cli) -> anyhow::Result<Config> {
    load_config(cli.config.as_deref())
}

/// Resolves the model path: `--model` first, then the configured model.
pub fn model_path(cli: &Cli, cfg: &Config) -> anyhow::Result<PathBuf> {
    match (&cli.model, &cfg.model) {
        (Some(p), _) => Ok(PathBuf::from(p)),
        (None, Some(p)) => Ok(p.clone()),
        (None, None) => anyhow::bail!(
            "no model specified. Use --model or set 'model' in {}",
            cfg.path().display()
        ),
    }
}

/// Loads the model bundle selected by the CLI flags and configuration.
pub fn load_model(cli: &Cli, cfg: &Config) -> anyhow::Result<ClassifierModel> {
    let path = model_path(cli, cfg)?;
    ClassifierModel::load(&path).map_err(|e| anyhow::anyhow!("load {}: {e}", path.display()))
}

/// Outputs result as JSON or YAML.
pub fn output_result<T: serde::Serialize>(
    result: &T,
    output_path: Option<&str>,
    as_json: bool,
) -> anyhow::Result<()> {
    let output = if as_json {
        serde_json::to_string_pretty(result)? + "\n"
    } else {
        serde_yaml::to_string(result)?
    };

    match output_path {
        Some(path) => std::fs::write(path, output)?,
        None => print!("{}", output),
    }

    Ok(())
}

/// Prints a verbose message to stderr.
pub fn print_verbose(cli: &Cli, msg: &str) {
    if cli.verbose {
        eprintln!("[verbose] {}", msg);
    }
}

/// Prints a success message.
pub fn print_success(msg: &str) {
    eprintln!("✓ {}", msg);
}
