//! Signal-processing and analysis defaults.

// Audio loading (matches librosa.load defaults used by the trained models).
pub const SAMPLE_RATE_HZ: u32 = 22_050;
pub const WINDOW_OFFSET_SECS: f32 = 0.5;
pub const WINDOW_DURATION_SECS: f32 = 3.0;

// MFCC frontend (librosa.feature.mfcc defaults, n_mfcc=40).
pub const N_MFCC: usize = 40;
pub const N_MELS: usize = 128;
pub const N_FFT: usize = 2048;
pub const HOP_LENGTH: usize = 512; // ~23ms @ 22.05kHz
pub const TOP_DB: f32 = 80.0;
pub const POWER_DB_AMIN: f32 = 1e-10;

/// Allowed deviation of a probability vector's sum from 1.0.
pub const PROBABILITY_SUM_TOLERANCE: f32 = 1e-3;
