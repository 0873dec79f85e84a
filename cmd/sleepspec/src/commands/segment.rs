//! Segmentation preview for raw PCM recordings.

use std::path::PathBuf;

use clap::Args;
use serde::Serialize;
use sleepspec::PcmSegmenter;

use super::{get_config, output_result, print_verbose};
use crate::Cli;

/// Split a raw PCM16 recording into analysis windows.
///
/// Uses the configured sample rate and window length. Only full windows
/// are analysed; the remainder is reported as the dropped tail.
#[derive(Args)]
pub struct SegmentCommand {
    /// Raw 16-bit little-endian mono PCM file
    input: PathBuf,
}

#[derive(Debug, PartialEq, Serialize)]
struct SegmentReport {
    sample_rate: u32,
    segment_seconds: u32,
    segments: usize,
    samples_per_segment: usize,
    dropped_samples: usize,
}

impl SegmentCommand {
    pub fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let cfg = get_config(cli)?;
        let segmenter = PcmSegmenter::new(cfg.segmenter());

        let pcm = std::fs::read(&self.input)
            .map_err(|e| anyhow::anyhow!("read {}: {e}", self.input.display()))?;
        print_verbose(cli, &format!("Read {} bytes", pcm.len()));

        let report = segment_report(&segmenter, &pcm)?;
        output_result(&report, cli.output.as_deref(), cli.json)
    }
}

fn segment_report(segmenter: &PcmSegmenter, pcm: &[u8]) -> anyhow::Result<SegmentReport> {
    let audio = segmenter.segment_pcm(pcm)?;
    let cfg = segmenter.config();
    let window = cfg.sample_rate as usize * cfg.segment_seconds as usize;
    let total = pcm.len() / 2;

    Ok(SegmentReport {
        sample_rate: audio.sample_rate,
        segment_seconds: cfg.segment_seconds,
        segments: audio.segments.len(),
        samples_per_segment: window,
        dropped_samples: total - audio.segments.len() * window,
    })
}
