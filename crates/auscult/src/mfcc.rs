//! Mean-pooled MFCC features (librosa-compatible).
//!
//! Per frame:
//! - centered STFT (zero pad `n_fft/2` each side), periodic Hann window
//! - power spectrum through a Slaney-style mel filter bank
//! - `power_to_db` with `ref=1`, `amin=1e-10`, global `top_db` floor
//! - orthonormal DCT-II, first `n_mfcc` coefficients
//!
//! The per-frame coefficients are then averaged into one `FeatureVector`.

use std::fmt;
use std::sync::Arc;

use rustfft::num_complex::Complex32;
use rustfft::{Fft, FftPlanner};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::audio::AudioClip;
use crate::constants::{HOP_LENGTH, N_FFT, N_MELS, N_MFCC, POWER_DB_AMIN, SAMPLE_RATE_HZ, TOP_DB};
use crate::error::FeatureExtractionError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MfccConfig {
    pub sample_rate_hz: u32,
    pub n_mfcc: usize,
    pub n_mels: usize,
    pub n_fft: usize,
    pub hop_length: usize,
    pub top_db: f32,
}

impl Default for MfccConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: SAMPLE_RATE_HZ,
            n_mfcc: N_MFCC,
            n_mels: N_MELS,
            n_fft: N_FFT,
            hop_length: HOP_LENGTH,
            top_db: TOP_DB,
        }
    }
}

impl MfccConfig {
    #[must_use]
    pub fn n_freq(&self) -> usize {
        self.n_fft / 2 + 1
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.sample_rate_hz > 0, "sample_rate_hz must be > 0");
        anyhow::ensure!(self.n_fft >= 2, "n_fft must be >= 2");
        anyhow::ensure!(self.hop_length > 0, "hop_length must be > 0");
        anyhow::ensure!(self.n_mels > 0, "n_mels must be > 0");
        anyhow::ensure!(
            self.n_mfcc > 0 && self.n_mfcc <= self.n_mels,
            "n_mfcc must be in 1..=n_mels"
        );
        anyhow::ensure!(self.top_db >= 0.0, "top_db must be >= 0");
        Ok(())
    }
}

/// One clip's mean-pooled cepstral coefficients.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector(Vec<f32>);

impl FeatureVector {
    #[must_use]
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }
}

#[inline]
fn hertz_to_mel(freq: f32) -> f32 {
    // Slaney-style mel scale (librosa htk=False).
    const MIN_LOG_HZ: f32 = 1000.0;
    const MIN_LOG_MEL: f32 = 15.0;
    // Precomputed: ln(6.4)/27.
    const LOGSTEP: f32 = 0.068_751_78;

    if freq >= MIN_LOG_HZ {
        MIN_LOG_MEL + (freq / MIN_LOG_HZ).ln() / LOGSTEP
    } else {
        3.0 * freq / 200.0
    }
}

#[inline]
fn mel_to_hertz(mels: f32) -> f32 {
    const MIN_LOG_HZ: f32 = 1000.0;
    const MIN_LOG_MEL: f32 = 15.0;
    const LOGSTEP: f32 = 0.068_751_78;

    if mels >= MIN_LOG_MEL {
        MIN_LOG_HZ * (LOGSTEP * (mels - MIN_LOG_MEL)).exp()
    } else {
        200.0 * mels / 3.0
    }
}

/// Slaney-normalized triangular filters, row-major `[n_mels, n_freq]`.
fn build_mel_filters(cfg: &MfccConfig) -> Vec<f32> {
    let n_freq = cfg.n_freq();
    let n_mels = cfg.n_mels;
    let sr = cfg.sample_rate_hz as f32;

    let fft_freqs: Vec<f32> = (0..n_freq)
        .map(|f| (f as f32) * sr / (cfg.n_fft as f32))
        .collect();

    let mel_min = hertz_to_mel(0.0);
    let mel_max = hertz_to_mel(sr / 2.0);
    let filter_freqs: Vec<f32> = (0..n_mels + 2)
        .map(|i| mel_to_hertz(mel_min + (mel_max - mel_min) * (i as f32) / ((n_mels + 1) as f32)))
        .collect();

    let filter_diff: Vec<f32> = filter_freqs
        .windows(2)
        .map(|w| {
            let d = w[1] - w[0];
            if d == 0.0 { 1e-6 } else { d }
        })
        .collect();

    let mut filters = vec![0.0f32; n_mels * n_freq];
    for (m, row) in filters.chunks_exact_mut(n_freq).enumerate() {
        let enorm = 2.0 / (filter_freqs[m + 2] - filter_freqs[m]);
        for (f, out) in row.iter_mut().enumerate() {
            let down = (fft_freqs[f] - filter_freqs[m]) / filter_diff[m];
            let up = (filter_freqs[m + 2] - fft_freqs[f]) / filter_diff[m + 1];
            *out = down.min(up).max(0.0) * enorm;
        }
    }
    filters
}

/// Orthonormal DCT-II basis, row-major `[n_mfcc, n_mels]`.
fn build_dct_table(n_mfcc: usize, n_mels: usize) -> Vec<f32> {
    let n = n_mels as f64;
    let mut table = vec![0.0f32; n_mfcc * n_mels];
    for (k, row) in table.chunks_exact_mut(n_mels).enumerate() {
        let scale = if k == 0 { (1.0 / n).sqrt() } else { (2.0 / n).sqrt() };
        for (i, out) in row.iter_mut().enumerate() {
            let angle = std::f64::consts::PI / n * (i as f64 + 0.5) * (k as f64);
            *out = (angle.cos() * scale) as f32;
        }
    }
    table
}

fn build_hann_window(size: usize) -> Vec<f32> {
    // Periodic Hann: 0.5*(1-cos(2*pi*i/N))
    (0..size)
        .map(|i| {
            let angle = 2.0 * std::f32::consts::PI * (i as f32) / (size as f32);
            0.5 * (1.0 - angle.cos())
        })
        .collect()
}

/// Precomputed MFCC frontend; immutable and shareable across threads.
pub struct MfccExtractor {
    cfg: MfccConfig,
    mel_filters: Vec<f32>, // [n_mels * n_freq]
    dct: Vec<f32>,         // [n_mfcc * n_mels]
    window: Vec<f32>,      // [n_fft]
    fft: Arc<dyn Fft<f32>>,
}

impl fmt::Debug for MfccExtractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MfccExtractor")
            .field("cfg", &self.cfg)
            .finish_non_exhaustive()
    }
}

impl MfccExtractor {
    #[must_use]
    pub fn new(cfg: MfccConfig) -> Self {
        let fft = FftPlanner::<f32>::new().plan_fft_forward(cfg.n_fft);
        Self {
            mel_filters: build_mel_filters(&cfg),
            dct: build_dct_table(cfg.n_mfcc, cfg.n_mels),
            window: build_hann_window(cfg.n_fft),
            fft,
            cfg,
        }
    }

    #[must_use]
    pub fn config(&self) -> &MfccConfig {
        &self.cfg
    }

    /// Width of every vector this extractor produces.
    #[must_use]
    pub fn feature_width(&self) -> usize {
        self.cfg.n_mfcc
    }

    /// Fewest samples that still fill one full analysis frame.
    #[must_use]
    pub fn min_samples(&self) -> usize {
        self.cfg.n_fft
    }

    /// Number of centered STFT frames for `n_samples` input samples.
    #[must_use]
    pub fn frame_count(&self, n_samples: usize) -> usize {
        1 + n_samples / self.cfg.hop_length
    }

    pub fn extract(&self, clip: &AudioClip) -> Result<FeatureVector, FeatureExtractionError> {
        if clip.sample_rate_hz() != self.cfg.sample_rate_hz {
            return Err(FeatureExtractionError::SampleRate {
                expected: self.cfg.sample_rate_hz,
                got: clip.sample_rate_hz(),
            });
        }
        self.extract_samples(clip.samples())
    }

    pub fn extract_samples(&self, samples: &[f32]) -> Result<FeatureVector, FeatureExtractionError> {
        if samples.is_empty() {
            return Err(FeatureExtractionError::Empty);
        }
        if samples.len() < self.min_samples() {
            return Err(FeatureExtractionError::TooShort {
                samples: samples.len(),
                required: self.min_samples(),
            });
        }
        if samples.iter().all(|&s| s == 0.0) {
            return Err(FeatureExtractionError::Silent);
        }

        let (coeffs, frames) = self.mfcc_frames(samples);
        let n_mfcc = self.cfg.n_mfcc;

        let mut sums = vec![0.0f64; n_mfcc];
        for row in coeffs.chunks_exact(n_mfcc) {
            for (acc, &c) in sums.iter_mut().zip(row) {
                *acc += f64::from(c);
            }
        }
        let mean: Vec<f32> = sums
            .into_iter()
            .map(|s| (s / frames as f64) as f32)
            .collect();

        debug!(samples = samples.len(), frames, n_mfcc, "extracted mfcc features");
        Ok(FeatureVector(mean))
    }

    /// Per-frame MFCCs as a flat `[frames * n_mfcc]` buffer and the frame count.
    #[must_use]
    pub fn mfcc_frames(&self, samples: &[f32]) -> (Vec<f32>, usize) {
        let mut log_mel = self.log_mel_frames(samples);
        let n_mels = self.cfg.n_mels;
        let frames = log_mel.len() / n_mels;

        // Global top_db floor.
        let max_db = log_mel.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let floor = max_db - self.cfg.top_db;
        for v in &mut log_mel {
            if *v < floor {
                *v = floor;
            }
        }

        let n_mfcc = self.cfg.n_mfcc;
        let mut out = vec![0.0f32; frames * n_mfcc];
        for (mel_row, out_row) in log_mel
            .chunks_exact(n_mels)
            .zip(out.chunks_exact_mut(n_mfcc))
        {
            for (k, o) in out_row.iter_mut().enumerate() {
                let basis = &self.dct[k * n_mels..(k + 1) * n_mels];
                *o = basis.iter().zip(mel_row).map(|(b, m)| b * m).sum();
            }
        }
        (out, frames)
    }

    /// Mel power in dB (before the `top_db` floor), flat `[frames * n_mels]`.
    fn log_mel_frames(&self, samples: &[f32]) -> Vec<f32> {
        let n_fft = self.cfg.n_fft;
        let n_freq = self.cfg.n_freq();
        let n_mels = self.cfg.n_mels;
        let hop = self.cfg.hop_length;
        let pad = n_fft / 2;

        let mut padded = vec![0.0f32; samples.len() + 2 * pad];
        padded[pad..pad + samples.len()].copy_from_slice(samples);

        let frames = self.frame_count(samples.len());
        let mut out = vec![0.0f32; frames * n_mels];
        let mut spectrum = vec![Complex32::new(0.0, 0.0); n_fft];
        let mut power = vec![0.0f32; n_freq];

        for (t, mel_row) in out.chunks_exact_mut(n_mels).enumerate() {
            let start = t * hop;
            let frame = &padded[start..start + n_fft];
            for ((bin, &x), &w) in spectrum.iter_mut().zip(frame).zip(&self.window) {
                *bin = Complex32::new(x * w, 0.0);
            }
            self.fft.process(&mut spectrum);
            for (p, bin) in power.iter_mut().zip(&spectrum) {
                *p = bin.norm_sqr();
            }

            for (m, out_m) in mel_row.iter_mut().enumerate() {
                let filt = &self.mel_filters[m * n_freq..(m + 1) * n_freq];
                let energy: f32 = filt.iter().zip(&power).map(|(f, p)| f * p).sum();
                *out_m = 10.0 * energy.max(POWER_DB_AMIN).log10();
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, secs: f32, sr: u32) -> Vec<f32> {
        let n = (secs * sr as f32) as usize;
        (0..n)
            .map(|i| 0.3 * (2.0 * std::f32::consts::PI * freq * (i as f32) / (sr as f32)).sin())
            .collect()
    }

    #[test]
    fn mel_scale_is_slaney() {
        assert!((hertz_to_mel(1000.0) - 15.0).abs() < 1e-5);
        assert!((hertz_to_mel(200.0) - 3.0).abs() < 1e-5);
        for f in [0.0f32, 440.0, 1000.0, 4000.0, 11_025.0] {
            let back = mel_to_hertz(hertz_to_mel(f));
            assert!((back - f).abs() < 0.05 * f.max(1.0), "{f} -> {back}");
        }
    }

    #[test]
    fn mel_filters_are_nonnegative_and_cover_every_band() {
        let cfg = MfccConfig::default();
        let filters = build_mel_filters(&cfg);
        assert_eq!(filters.len(), cfg.n_mels * cfg.n_freq());
        assert!(filters.iter().all(|&v| v >= 0.0));
        for row in filters.chunks_exact(cfg.n_freq()) {
            assert!(row.iter().any(|&v| v > 0.0));
        }
    }

    #[test]
    fn dct_of_constant_only_has_dc() {
        let n_mels = 16;
        let table = build_dct_table(4, n_mels);
        for (k, row) in table.chunks_exact(n_mels).enumerate() {
            let c: f32 = row.iter().map(|b| b * 2.0).sum();
            if k == 0 {
                assert!((c - 2.0 * (n_mels as f32).sqrt()).abs() < 1e-4);
            } else {
                assert!(c.abs() < 1e-4, "k={k} c={c}");
            }
        }
    }

    #[test]
    fn frame_count_matches_centered_stft() {
        let ex = MfccExtractor::new(MfccConfig::default());
        assert_eq!(ex.frame_count(66_150), 1 + 66_150 / 512);
        let (coeffs, frames) = ex.mfcc_frames(&sine(440.0, 1.0, 22_050));
        assert_eq!(frames, 1 + 22_050 / 512);
        assert_eq!(coeffs.len(), frames * N_MFCC);
    }

    #[test]
    fn feature_width_is_constant_across_durations() {
        let ex = MfccExtractor::new(MfccConfig::default());
        for secs in [0.1f32, 1.0, 3.0] {
            let clip = AudioClip::new(sine(330.0, secs, 22_050), 22_050);
            let v = ex.extract(&clip).expect("features");
            assert_eq!(v.len(), 40);
            assert!(v.as_slice().iter().all(|x| x.is_finite()));
        }
    }

    #[test]
    fn extraction_is_deterministic() {
        let ex = MfccExtractor::new(MfccConfig::default());
        let clip = AudioClip::new(sine(250.0, 2.0, 22_050), 22_050);
        let a = ex.extract(&clip).expect("a");
        let b = ex.extract(&clip).expect("b");
        assert_eq!(a, b);
    }

    #[test]
    fn different_tones_give_different_features() {
        let ex = MfccExtractor::new(MfccConfig::default());
        let low = ex.extract_samples(&sine(150.0, 1.0, 22_050)).expect("low");
        let high = ex.extract_samples(&sine(3_000.0, 1.0, 22_050)).expect("high");
        assert_ne!(low, high);
    }

    #[test]
    fn rejects_empty_short_and_silent_input() {
        let ex = MfccExtractor::new(MfccConfig::default());
        assert_eq!(ex.extract_samples(&[]), Err(FeatureExtractionError::Empty));
        assert_eq!(
            ex.extract_samples(&[0.1; 100]),
            Err(FeatureExtractionError::TooShort {
                samples: 100,
                required: 2048
            })
        );
        assert_eq!(
            ex.extract_samples(&vec![0.0; 22_050]),
            Err(FeatureExtractionError::Silent)
        );
    }

    #[test]
    fn rejects_clip_at_wrong_rate() {
        let ex = MfccExtractor::new(MfccConfig::default());
        let clip = AudioClip::new(sine(440.0, 1.0, 16_000), 16_000);
        assert_eq!(
            ex.extract(&clip),
            Err(FeatureExtractionError::SampleRate {
                expected: 22_050,
                got: 16_000
            })
        );
    }

    #[test]
    fn config_validation() {
        assert!(MfccConfig::default().validate().is_ok());
        let bad = MfccConfig {
            n_mfcc: 200,
            ..MfccConfig::default()
        };
        assert!(bad.validate().is_err());
    }
}
