//! Model bundle inspection.

use clap::Args;
use serde::Serialize;
use sleepspec::ModelSummary;

use super::{get_config, load_model, model_path, output_result};
use crate::Cli;

/// Print a summary of the model bundle.
///
/// Shows the expected feature length, the number of PCA components,
/// the class codes and whether probability calibration is available.
#[derive(Args)]
pub struct ModelCommand {}

#[derive(Serialize)]
struct ModelInfo {
    path: String,
    #[serde(flatten)]
    summary: ModelSummary,
}

impl ModelCommand {
    pub fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let cfg = get_config(cli)?;
        let path = model_path(cli, &cfg)?;
        let model = load_model(cli, &cfg)?;

        let info = ModelInfo {
            path: path.display().to_string(),
            summary: model.summary(),
        };
        output_result(&info, cli.output.as_deref(), cli.json)
    }
}
