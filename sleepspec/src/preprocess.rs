use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use hound::SampleFormat;
use tracing::{debug, info};

use crate::error::{Result, SleepSpecError};

/// One fixed-length window of mono audio.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    /// 0-based position of the window in the recording.
    pub index: usize,
    /// Samples in [-1, 1).
    pub samples: Vec<f32>,
}

impl Segment {
    pub fn new(index: usize, samples: Vec<f32>) -> Self {
        Self { index, samples }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Segmented audio ready for feature extraction.
#[derive(Debug, Clone, Default)]
pub struct PreprocessedAudio {
    pub segments: Vec<Segment>,
    pub sample_rate: u32,
}

/// Turns an audio file into fixed-length segments at a known sample rate.
pub trait Preprocessor: Send + Sync {
    fn preprocess(&self, audio_path: &Path) -> Result<PreprocessedAudio>;
}

/// Configures [`PcmSegmenter`] and [`WavSegmenter`].
#[derive(Debug, Clone)]
pub struct SegmenterConfig {
    /// Sample rate of the input PCM in Hz (default: 16000).
    pub sample_rate: u32,
    /// Window length in seconds (default: 15).
    pub segment_seconds: u32,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            segment_seconds: 15,
        }
    }
}

/// [`Preprocessor`] for raw PCM16 signed little-endian mono files.
///
/// No resampling or noise reduction happens here; the input must already
/// be at [`SegmenterConfig::sample_rate`].
pub struct PcmSegmenter {
    cfg: SegmenterConfig,
}

impl PcmSegmenter {
    pub fn new(cfg: SegmenterConfig) -> Self {
        Self { cfg }
    }

    pub fn config(&self) -> &SegmenterConfig {
        &self.cfg
    }

    /// Segments in-memory PCM16 bytes.
    ///
    /// Input starting with a RIFF header is rejected; use [`WavSegmenter`]
    /// for WAV files.
    pub fn segment_pcm(&self, audio: &[u8]) -> Result<PreprocessedAudio> {
        if audio.starts_with(b"RIFF") {
            return Err(SleepSpecError::Preprocess(
                "input has a RIFF header; expected raw PCM16".into(),
            ));
        }
        segment_window(&self.cfg, &pcm16_to_f32(audio))
    }
}

impl Default for PcmSegmenter {
    fn default() -> Self {
        Self::new(SegmenterConfig::default())
    }
}

impl Preprocessor for PcmSegmenter {
    fn preprocess(&self, audio_path: &Path) -> Result<PreprocessedAudio> {
        info!("processing audio file: {}", audio_path.display());
        let audio = std::fs::read(audio_path).map_err(|e| {
            SleepSpecError::Preprocess(format!("read {}: {e}", audio_path.display()))
        })?;
        self.segment_pcm(&audio)
    }
}

/// [`Preprocessor`] for WAV files.
///
/// Integer and float sample formats are accepted and multi-channel input is
/// averaged down to mono. The file's sample rate must match
/// [`SegmenterConfig::sample_rate`]; no resampling happens here.
pub struct WavSegmenter {
    cfg: SegmenterConfig,
}

impl WavSegmenter {
    pub fn new(cfg: SegmenterConfig) -> Self {
        Self { cfg }
    }

    pub fn config(&self) -> &SegmenterConfig {
        &self.cfg
    }

    /// Decodes and segments a WAV stream.
    pub fn segment_wav<R: Read>(&self, reader: R) -> Result<PreprocessedAudio> {
        let mut wav = hound::WavReader::new(reader)
            .map_err(|e| SleepSpecError::Preprocess(format!("wav: {e}")))?;
        let spec = wav.spec();
        if spec.sample_rate != self.cfg.sample_rate {
            return Err(SleepSpecError::Preprocess(format!(
                "wav sample rate {} Hz, expected {} Hz",
                spec.sample_rate, self.cfg.sample_rate
            )));
        }

        let interleaved: Vec<f32> = match spec.sample_format {
            SampleFormat::Float => wav
                .samples::<f32>()
                .collect::<std::result::Result<Vec<f32>, hound::Error>>()
                .map_err(|e| SleepSpecError::Preprocess(format!("wav: {e}")))?,
            SampleFormat::Int => {
                let scale = (1u64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
                wav.samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / scale))
                    .collect::<std::result::Result<Vec<f32>, hound::Error>>()
                    .map_err(|e| SleepSpecError::Preprocess(format!("wav: {e}")))?
            }
        };

        let channels = spec.channels.max(1) as usize;
        let mono: Vec<f32> = if channels == 1 {
            interleaved
        } else {
            interleaved
                .chunks_exact(channels)
                .map(|frame| frame.iter().sum::<f32>() / channels as f32)
                .collect()
        };
        segment_window(&self.cfg, &mono)
    }
}

impl Default for WavSegmenter {
    fn default() -> Self {
        Self::new(SegmenterConfig::default())
    }
}

impl Preprocessor for WavSegmenter {
    fn preprocess(&self, audio_path: &Path) -> Result<PreprocessedAudio> {
        info!("processing audio file: {}", audio_path.display());
        let file = File::open(audio_path).map_err(|e| {
            SleepSpecError::Preprocess(format!("open {}: {e}", audio_path.display()))
        })?;
        self.segment_wav(BufReader::new(file))
    }
}

fn segment_window(cfg: &SegmenterConfig, samples: &[f32]) -> Result<PreprocessedAudio> {
    if cfg.sample_rate == 0 || cfg.segment_seconds == 0 {
        return Err(SleepSpecError::Preprocess(
            "sample rate and segment length must be positive".into(),
        ));
    }
    let window = cfg.segment_seconds as usize * cfg.sample_rate as usize;
    let segments = segment_samples(samples, window);
    debug!(
        samples = samples.len(),
        window,
        segments = segments.len(),
        "segmented audio"
    );
    Ok(PreprocessedAudio {
        segments,
        sample_rate: cfg.sample_rate,
    })
}

/// Converts PCM16 signed little-endian bytes to samples in [-1, 1).
/// A trailing odd byte is ignored.
pub fn pcm16_to_f32(audio: &[u8]) -> Vec<f32> {
    audio
        .chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]) as f32 / 32768.0)
        .collect()
}

/// Splits `samples` into consecutive windows of exactly `window` samples.
/// A shorter trailing window is dropped, never padded.
pub fn segment_samples(samples: &[f32], window: usize) -> Vec<Segment> {
    if window == 0 {
        return Vec::new();
    }
    samples
        .chunks_exact(window)
        .enumerate()
        .map(|(i, chunk)| Segment::new(i, chunk.to_vec()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pcm(samples: &[i16]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    #[test]
    fn pcm16_scaling() {
        let s = pcm16_to_f32(&pcm(&[0, 16384, -32768, 32767]));
        assert_eq!(s[0], 0.0);
        assert_eq!(s[1], 0.5);
        assert_eq!(s[2], -1.0);
        assert!(s[3] < 1.0);
    }

    #[test]
    fn pcm16_ignores_odd_byte() {
        assert_eq!(pcm16_to_f32(&[0, 0, 1]).len(), 1);
    }

    #[test]
    fn short_tail_dropped() {
        let samples = vec![0.1f32; 25];
        let segs = segment_samples(&samples, 10);
        assert_eq!(segs.len(), 2);
        assert_eq!(segs[0].index, 0);
        assert_eq!(segs[1].index, 1);
        assert!(segs.iter().all(|s| s.len() == 10));
    }

    #[test]
    fn shorter_than_one_window() {
        assert!(segment_samples(&[0.0; 9], 10).is_empty());
        assert!(segment_samples(&[0.0; 9], 0).is_empty());
    }

    #[test]
    fn segmenter_uses_configured_window() {
        let seg = PcmSegmenter::new(SegmenterConfig {
            sample_rate: 4,
            segment_seconds: 2,
        });
        // 8 samples per window, 19 samples total -> 2 windows.
        let audio = pcm(&[100; 19]);
        let out = seg.segment_pcm(&audio).unwrap();
        assert_eq!(out.sample_rate, 4);
        assert_eq!(out.segments.len(), 2);
        assert_eq!(out.segments[1].samples.len(), 8);
    }

    #[test]
    fn segmenter_rejects_zero_config() {
        let seg = PcmSegmenter::new(SegmenterConfig {
            sample_rate: 0,
            segment_seconds: 15,
        });
        assert!(seg.segment_pcm(&[]).is_err());
    }

    #[test]
    fn segmenter_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rec.pcm");
        std::fs::write(&path, pcm(&[0; 12])).unwrap();

        let seg = PcmSegmenter::new(SegmenterConfig {
            sample_rate: 2,
            segment_seconds: 3,
        });
        let out = seg.preprocess(&path).unwrap();
        assert_eq!(out.segments.len(), 2);
    }

    #[test]
    fn segmenter_rejects_riff_header() {
        let mut audio = b"RIFF".to_vec();
        audio.extend(pcm(&[0; 40]));
        let err = PcmSegmenter::default().segment_pcm(&audio).unwrap_err();
        assert!(matches!(err, SleepSpecError::Preprocess(_)));
    }

    fn write_wav(path: &Path, sample_rate: u32, channels: u16, frames: &[[i16; 2]]) {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for frame in frames {
            for &s in &frame[..channels as usize] {
                writer.write_sample(s).unwrap();
            }
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn wav_segmenter_reads_mono() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rec.wav");
        write_wav(&path, 4, 1, &[[16384, 0]; 10]);

        let seg = WavSegmenter::new(SegmenterConfig {
            sample_rate: 4,
            segment_seconds: 1,
        });
        let out = seg.preprocess(&path).unwrap();
        assert_eq!(out.sample_rate, 4);
        assert_eq!(out.segments.len(), 2);
        assert!(out.segments[0].samples.iter().all(|&s| s == 0.5));
    }

    #[test]
    fn wav_segmenter_downmixes_stereo() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        write_wav(&path, 2, 2, &[[16384, -16384], [16384, 0], [0, 0], [8192, 8192]]);

        let seg = WavSegmenter::new(SegmenterConfig {
            sample_rate: 2,
            segment_seconds: 1,
        });
        let out = seg.preprocess(&path).unwrap();
        assert_eq!(out.segments.len(), 2);
        assert_eq!(out.segments[0].samples, vec![0.0, 0.25]);
        assert_eq!(out.segments[1].samples, vec![0.0, 0.25]);
    }

    #[test]
    fn wav_segmenter_rejects_other_sample_rate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rec.wav");
        write_wav(&path, 8000, 1, &[[0, 0]; 4]);

        let err = WavSegmenter::default().preprocess(&path).unwrap_err();
        assert!(matches!(err, SleepSpecError::Preprocess(_)));
    }

    #[test]
    fn wav_segmenter_rejects_raw_pcm() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rec.pcm");
        std::fs::write(&path, pcm(&[0; 64])).unwrap();

        let err = WavSegmenter::default().preprocess(&path).unwrap_err();
        assert!(matches!(err, SleepSpecError::Preprocess(_)));
    }

    #[test]
    fn segmenter_missing_file() {
        let seg = PcmSegmenter::default();
        let err = seg.preprocess(Path::new("/nonexistent/rec.pcm")).unwrap_err();
        assert!(matches!(err, SleepSpecError::Preprocess(_)));
    }
}
