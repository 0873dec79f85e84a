//! Verdict prediction from cached feature records.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Args;
use serde::Serialize;
use sleepspec::record::list_records;
use sleepspec::{FeatureRecord, FeatureTensor, SegmentClassifier, Verdict, classify_features};
use tracing::warn;

use super::{get_config, load_model, output_result, print_verbose};
use crate::Cli;

/// Classify feature records and print the fused verdict.
///
/// Directories are scanned for `*.rec` files, ordered by the segment number
/// in their names. With no inputs, the configured `record_dir` is used.
#[derive(Args)]
pub struct PredictCommand {
    /// Record files or directories of record files
    inputs: Vec<PathBuf>,
}

#[derive(Serialize)]
struct Report<'a> {
    #[serde(flatten)]
    verdict: &'a Verdict,
    severity: String,
}

impl PredictCommand {
    pub fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let cfg = get_config(cli)?;

        let inputs = if self.inputs.is_empty() {
            match &cfg.record_dir {
                Some(dir) => vec![dir.clone()],
                None => anyhow::bail!(
                    "no inputs given and no 'record_dir' set in {}",
                    cfg.path().display()
                ),
            }
        } else {
            self.inputs.clone()
        };

        let paths = collect_records(&inputs)?;
        print_verbose(cli, &format!("Found {} feature records", paths.len()));

        let features = read_features(&paths)?;
        let model = load_model(cli, &cfg)?;
        let classifier = SegmentClassifier::new(Arc::new(model));
        let verdict = classify_features(&classifier, &features)?;

        let report = Report {
            verdict: &verdict,
            severity: verdict.severity().to_string(),
        };
        output_result(&report, cli.output.as_deref(), cli.json)?;

        if !verdict.success {
            anyhow::bail!(
                "no features were accepted; make sure the recording is at least {} seconds long",
                cfg.segment_seconds
            );
        }
        Ok(())
    }
}

/// Expands directories into their record files, keeping input order.
fn collect_records(inputs: &[PathBuf]) -> anyhow::Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let found = list_records(input)
                .map_err(|e| anyhow::anyhow!("scan {}: {e}", input.display()))?;
            if found.is_empty() {
                warn!("no feature records in {}", input.display());
            }
            paths.extend(found);
        } else if input.is_file() {
            paths.push(input.clone());
        } else {
            anyhow::bail!("{}: no such file or directory", input.display());
        }
    }
    Ok(paths)
}

fn read_features(paths: &[PathBuf]) -> anyhow::Result<Vec<FeatureTensor>> {
    let mut sample_rate = None;
    let mut features = Vec::with_capacity(paths.len());
    for path in paths {
        let record = FeatureRecord::read(path)?;
        check_sample_rate(&mut sample_rate, record.fs, path);
        features.push(record.strf);
    }
    Ok(features)
}

fn check_sample_rate(expected: &mut Option<u32>, fs: u32, path: &Path) {
    match *expected {
        None => *expected = Some(fs),
        Some(rate) if rate != fs => {
            warn!(expected = rate, got = fs, "sample rate differs in {}", path.display());
        }
        Some(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;
    use sleepspec::record::record_file_name;

    fn write_record(dir: &Path, index: usize, fs: u32) -> PathBuf {
        let path = dir.join(record_file_name(index));
        let tensor = FeatureTensor::new(Array3::from_elem((2, 2, 2), index as f32));
        FeatureRecord::new(tensor, fs).write(&path).unwrap();
        path
    }

    #[test]
    fn directories_expand_in_segment_order() {
        let dir = tempfile::tempdir().unwrap();
        for i in [10, 1, 0] {
            write_record(dir.path(), i, 16000);
        }
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let paths = collect_records(&[dir.path().to_path_buf()]).unwrap();
        let names: Vec<_> = paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            vec![
                "segment_1_strf.rec",
                "segment_2_strf.rec",
                "segment_11_strf.rec"
            ]
        );
    }

    #[test]
    fn files_keep_argument_order() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_record(dir.path(), 4, 16000);
        let b = write_record(dir.path(), 2, 16000);

        let paths = collect_records(&[a.clone(), b.clone()]).unwrap();
        assert_eq!(paths, vec![a, b]);
    }

    #[test]
    fn missing_input_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = collect_records(&[dir.path().join("nope")]).unwrap_err();
        assert!(err.to_string().contains("no such file"));
    }

    #[test]
    fn read_features_loads_tensors() {
        let dir = tempfile::tempdir().unwrap();
        let paths = vec![
            write_record(dir.path(), 0, 16000),
            write_record(dir.path(), 1, 8000),
        ];

        let features = read_features(&paths).unwrap();
        assert_eq!(features.len(), 2);
        assert_eq!(features[1].as_array()[[0, 0, 0]], 1.0);
    }

    #[test]
    fn sample_rate_tracks_first_record() {
        let mut rate = None;
        check_sample_rate(&mut rate, 16000, Path::new("a"));
        check_sample_rate(&mut rate, 8000, Path::new("b"));
        assert_eq!(rate, Some(16000));
    }
}
