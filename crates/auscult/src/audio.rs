//! Audio loading.
//!
//! Scope:
//! - WAV / MP3 / M4A (AAC) uploads decoded with symphonia
//! - channels averaged to mono `f32`
//! - fixed analysis window (offset + max duration) cut at the native rate
//! - band-limited (sinc) resampling to the analysis rate

use std::fmt;
use std::io::Cursor;

use serde::{Deserialize, Serialize};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
use symphonia::core::errors::Error as SymError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::debug;

use crate::constants::{WINDOW_DURATION_SECS, WINDOW_OFFSET_SECS};
use crate::error::DecodeError;

/// Container formats accepted for upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Wav,
    Mp3,
    M4a,
}

impl AudioFormat {
    /// Parse a declared type: a bare extension (`"wav"`, `".mp3"`) or a MIME type.
    pub fn from_declared(declared: &str) -> Result<Self, DecodeError> {
        let d = declared.trim().trim_start_matches('.').to_ascii_lowercase();
        match d.as_str() {
            "wav" | "wave" | "audio/wav" | "audio/wave" | "audio/x-wav" | "audio/vnd.wave" => {
                Ok(Self::Wav)
            }
            "mp3" | "audio/mpeg" | "audio/mp3" | "audio/mpeg3" | "audio/x-mpeg-3" => Ok(Self::Mp3),
            "m4a" | "mp4" | "audio/mp4" | "audio/m4a" | "audio/x-m4a" | "audio/aac" => {
                Ok(Self::M4a)
            }
            _ => Err(DecodeError::UnsupportedFormat(declared.to_string())),
        }
    }

    /// Guess the format from magic bytes.
    #[must_use]
    pub fn sniff(data: &[u8]) -> Option<Self> {
        if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WAVE" {
            return Some(Self::Wav);
        }
        if data.len() >= 8 && &data[4..8] == b"ftyp" {
            return Some(Self::M4a);
        }
        if data.len() >= 3 && &data[0..3] == b"ID3" {
            return Some(Self::Mp3);
        }
        // Bare MPEG audio frame sync.
        if data.len() >= 2 && data[0] == 0xFF && (data[1] & 0xE0) == 0xE0 {
            return Some(Self::Mp3);
        }
        None
    }

    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Wav => "wav",
            Self::Mp3 => "mp3",
            Self::M4a => "m4a",
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// The slice of the recording that gets analysed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisWindow {
    pub offset_secs: f32,
    pub duration_secs: f32,
}

impl Default for AnalysisWindow {
    fn default() -> Self {
        Self {
            offset_secs: WINDOW_OFFSET_SECS,
            duration_secs: WINDOW_DURATION_SECS,
        }
    }
}

impl AnalysisWindow {
    /// Sample range `[start, end)` of this window at `sample_rate_hz`.
    #[must_use]
    pub fn sample_range(&self, sample_rate_hz: u32) -> (usize, usize) {
        let sr = sample_rate_hz as f32;
        let start = (self.offset_secs.max(0.0) * sr).round() as usize;
        let len = (self.duration_secs.max(0.0) * sr).round() as usize;
        (start, start.saturating_add(len))
    }
}

/// Decoded mono audio at a known sample rate.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    samples: Vec<f32>,
    sample_rate_hz: u32,
}

impl AudioClip {
    #[must_use]
    pub fn new(samples: Vec<f32>, sample_rate_hz: u32) -> Self {
        Self {
            samples,
            sample_rate_hz,
        }
    }

    #[must_use]
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    #[must_use]
    pub fn sample_rate_hz(&self) -> u32 {
        self.sample_rate_hz
    }

    #[must_use]
    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate_hz == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.sample_rate_hz as f32
    }
}

#[derive(Debug, Clone)]
pub struct DecodedAudio {
    pub sample_rate_hz: u32,
    pub channels: u16,
    pub samples_mono: Vec<f32>,
}

/// Decode `data` to mono samples at the stream's native rate.
///
/// With `until` set, decoding stops once the end of that window is reached.
pub fn decode_mono(
    data: &[u8],
    format: AudioFormat,
    until: Option<&AnalysisWindow>,
) -> Result<DecodedAudio, DecodeError> {
    if data.is_empty() {
        return Err(DecodeError::Empty);
    }

    let mss = MediaSourceStream::new(Box::new(Cursor::new(data.to_vec())), Default::default());
    let mut hint = Hint::new();
    hint.with_extension(format.extension());

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| DecodeError::UnrecognisedContainer(e.to_string()))?;
    let mut reader = probed.format;

    let (track_id, codec_params) = {
        let track = reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or(DecodeError::NoAudioTrack)?;
        (track.id, track.codec_params.clone())
    };

    let sample_rate_hz = codec_params
        .sample_rate
        .ok_or(DecodeError::UnknownSampleRate)?;
    let channels = codec_params
        .channels
        .map(|c| c.count() as u16)
        .unwrap_or(1);

    let mut decoder =
        symphonia::default::get_codecs().make(&codec_params, &DecoderOptions::default())?;

    let limit = until.map_or(usize::MAX, |w| w.sample_range(sample_rate_hz).1);
    let mut sample_buf: Option<SampleBuffer<f32>> = None;
    let mut mono = Vec::new();
    let mut skipped_packets = 0usize;

    while mono.len() < limit {
        let packet = match reader.next_packet() {
            Ok(packet) => packet,
            Err(SymError::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(SymError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(err) => return Err(err.into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymError::DecodeError(_)) => {
                skipped_packets += 1;
                continue;
            }
            Err(err) => return Err(err.into()),
        };

        let spec = *decoded.spec();
        let n_chan = spec.channels.count().max(1);

        if sample_buf
            .as_ref()
            .is_none_or(|b| b.capacity() < decoded.capacity())
        {
            sample_buf = Some(SampleBuffer::<f32>::new(decoded.capacity() as u64, spec));
        }
        let Some(buf) = sample_buf.as_mut() else {
            continue;
        };
        buf.copy_interleaved_ref(decoded);

        for frame in buf.samples().chunks_exact(n_chan) {
            let sum: f32 = frame.iter().sum();
            mono.push(sum / (n_chan as f32));
        }
    }

    if skipped_packets > 0 {
        debug!(skipped_packets, "skipped undecodable packets");
    }
    mono.truncate(limit);

    Ok(DecodedAudio {
        sample_rate_hz,
        channels,
        samples_mono: mono,
    })
}

/// Decode an upload and cut the analysis window, resampled to `target_hz`.
///
/// Clips shorter than the window are returned as-is (possibly empty); no
/// padding is applied.
pub fn load_clip(
    data: &[u8],
    format: AudioFormat,
    window: AnalysisWindow,
    target_hz: u32,
) -> Result<AudioClip, DecodeError> {
    let decoded = decode_mono(data, format, Some(&window))?;
    let (start, end) = window.sample_range(decoded.sample_rate_hz);
    let total = decoded.samples_mono.len();
    let start = start.min(total);
    let end = end.min(total);
    let windowed = &decoded.samples_mono[start..end];

    debug!(
        format = %format,
        native_hz = decoded.sample_rate_hz,
        channels = decoded.channels,
        decoded_samples = total,
        window_samples = windowed.len(),
        "decoded upload"
    );

    let samples = resample_mono_f32(windowed, decoded.sample_rate_hz, target_hz)?;
    Ok(AudioClip::new(samples, target_hz))
}

/// Sinc taps per output sample; with `RESAMPLE_CUTOFF` this sets the anti-alias filter.
const RESAMPLE_SINC_LEN: usize = 256;
/// Passband edge relative to the lower of the two Nyquist frequencies.
const RESAMPLE_CUTOFF: f32 = 0.95;
const RESAMPLE_CHUNK: usize = 1024;

/// Band-limited resampling of `input` from `src_hz` to `dst_hz`.
///
/// Content above the lower Nyquist frequency is filtered out instead of
/// folding back into the band. The output is aligned with the input (filter
/// delay removed) and holds `len * dst_hz / src_hz` samples.
pub fn resample_mono_f32(input: &[f32], src_hz: u32, dst_hz: u32) -> Result<Vec<f32>, DecodeError> {
    if src_hz == dst_hz || input.is_empty() {
        return Ok(input.to_vec());
    }
    if src_hz == 0 || dst_hz == 0 {
        return Err(DecodeError::Resample(format!(
            "cannot resample {src_hz} Hz to {dst_hz} Hz"
        )));
    }

    let params = SincInterpolationParameters {
        sinc_len: RESAMPLE_SINC_LEN,
        f_cutoff: RESAMPLE_CUTOFF,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };
    let ratio = f64::from(dst_hz) / f64::from(src_hz);
    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, RESAMPLE_CHUNK, 1)
        .map_err(|e| DecodeError::Resample(e.to_string()))?;

    let expected = ((input.len() as u64) * u64::from(dst_hz) / u64::from(src_hz)) as usize;
    let delay = resampler.output_delay();
    let mut out = Vec::with_capacity(expected + delay + RESAMPLE_CHUNK);
    let mut chunk = vec![0.0f32; RESAMPLE_CHUNK];
    let mut pos = 0usize;

    // Past the end of the input, feed silence until the delayed tail is flushed.
    while out.len() < delay + expected {
        let take = (input.len() - pos).min(RESAMPLE_CHUNK);
        chunk[..take].copy_from_slice(&input[pos..pos + take]);
        chunk[take..].fill(0.0);
        pos += take;

        let frames = resampler
            .process(std::slice::from_ref(&chunk), None)
            .map_err(|e| DecodeError::Resample(e.to_string()))?;
        let produced = frames.first().map_or(0, Vec::len);
        if let Some(channel) = frames.first() {
            out.extend_from_slice(channel);
        }
        if produced == 0 && pos >= input.len() {
            break;
        }
    }

    out.drain(..delay.min(out.len()));
    out.truncate(expected);
    debug!(src_hz, dst_hz, input = input.len(), output = out.len(), "resampled");
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pcm16_wav(samples: &[f32], sample_rate_hz: u32, channels: u16) -> Vec<u8> {
        let data_len = (samples.len() * 2) as u32;
        let mut wav = Vec::<u8>::new();
        wav.extend_from_slice(b"RIFF");
        wav.extend_from_slice(&(36u32 + data_len).to_le_bytes());
        wav.extend_from_slice(b"WAVE");

        wav.extend_from_slice(b"fmt ");
        wav.extend_from_slice(&(16u32).to_le_bytes());
        wav.extend_from_slice(&(1u16).to_le_bytes()); // PCM
        wav.extend_from_slice(&channels.to_le_bytes());
        wav.extend_from_slice(&sample_rate_hz.to_le_bytes());
        wav.extend_from_slice(&(sample_rate_hz * 2 * u32::from(channels)).to_le_bytes());
        wav.extend_from_slice(&(2 * channels).to_le_bytes());
        wav.extend_from_slice(&(16u16).to_le_bytes());

        wav.extend_from_slice(b"data");
        wav.extend_from_slice(&data_len.to_le_bytes());
        for &s in samples {
            let v = (s.clamp(-1.0, 1.0) * 32767.0) as i16;
            wav.extend_from_slice(&v.to_le_bytes());
        }
        wav
    }

    fn sine(freq_hz: f32, amp: f32, secs: f32, sr: u32) -> Vec<f32> {
        let n = (secs * sr as f32) as usize;
        (0..n)
            .map(|i| amp * (2.0 * std::f32::consts::PI * freq_hz * i as f32 / sr as f32).sin())
            .collect()
    }

    /// RMS away from the edges, where the filter sees the zero padding.
    fn inner_rms(x: &[f32]) -> f32 {
        let inner = &x[512..x.len() - 512];
        (inner.iter().map(|v| v * v).sum::<f32>() / inner.len() as f32).sqrt()
    }

    #[test]
    fn resample_identity() {
        let x = vec![0.0, 1.0, 2.0, 3.0];
        let y = resample_mono_f32(&x, 22_050, 22_050).expect("resample");
        assert_eq!(x, y);
        assert!(resample_mono_f32(&[], 44_100, 22_050).expect("empty").is_empty());
    }

    #[test]
    fn resample_length() {
        let x = vec![0.0f32; 44_100];
        assert_eq!(resample_mono_f32(&x, 44_100, 22_050).expect("down").len(), 22_050);

        let x = vec![0.0f32; 48_000];
        assert_eq!(resample_mono_f32(&x, 48_000, 22_050).expect("down").len(), 22_050);

        let x = vec![0.0f32; 8_000];
        assert_eq!(resample_mono_f32(&x, 8_000, 22_050).expect("up").len(), 22_050);
    }

    #[test]
    fn resample_rejects_zero_rate() {
        assert!(matches!(
            resample_mono_f32(&[0.1, 0.2], 0, 22_050),
            Err(DecodeError::Resample(_))
        ));
    }

    #[test]
    fn resample_keeps_passband_tone() {
        let x = sine(1_000.0, 0.5, 1.0, 44_100);
        let y = resample_mono_f32(&x, 44_100, 22_050).expect("resample");
        let ratio = inner_rms(&y) / inner_rms(&x);
        assert!((ratio - 1.0).abs() < 0.05, "passband gain {ratio}");
    }

    #[test]
    fn resample_removes_tone_above_target_nyquist() {
        // 15 kHz is above the 11.025 kHz Nyquist of the analysis rate; it must
        // not fold back to 7.05 kHz.
        let x = sine(15_000.0, 0.5, 1.0, 44_100);
        let y = resample_mono_f32(&x, 44_100, 22_050).expect("resample");
        let ratio = inner_rms(&y) / inner_rms(&x);
        assert!(ratio < 0.01, "stopband leakage {ratio}");

        let x = sine(16_000.0, 0.5, 1.0, 48_000);
        let y = resample_mono_f32(&x, 48_000, 22_050).expect("resample");
        assert!(inner_rms(&y) / inner_rms(&x) < 0.01);
    }

    #[test]
    fn declared_formats() {
        assert_eq!(AudioFormat::from_declared("wav").unwrap(), AudioFormat::Wav);
        assert_eq!(AudioFormat::from_declared(".MP3").unwrap(), AudioFormat::Mp3);
        assert_eq!(
            AudioFormat::from_declared("audio/x-m4a").unwrap(),
            AudioFormat::M4a
        );
        assert!(matches!(
            AudioFormat::from_declared("flac"),
            Err(DecodeError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn sniffs_magic_bytes() {
        let wav = pcm16_wav(&[0.0; 4], 8_000, 1);
        assert_eq!(AudioFormat::sniff(&wav), Some(AudioFormat::Wav));
        assert_eq!(AudioFormat::sniff(b"ID3\x04\0\0"), Some(AudioFormat::Mp3));
        assert_eq!(
            AudioFormat::sniff(b"\0\0\0\x20ftypM4A "),
            Some(AudioFormat::M4a)
        );
        assert_eq!(AudioFormat::sniff(b"hello"), None);
    }

    #[test]
    fn window_range_at_native_rate() {
        let w = AnalysisWindow::default();
        assert_eq!(w.sample_range(22_050), (11_025, 11_025 + 66_150));
        assert_eq!(w.sample_range(8_000), (4_000, 28_000));
    }

    #[test]
    fn decodes_stereo_wav_to_mono() {
        // Interleaved L/R: left 0.5, right -0.5 => mono 0.
        let mut interleaved = Vec::new();
        for _ in 0..100 {
            interleaved.push(0.5);
            interleaved.push(-0.5);
        }
        let wav = pcm16_wav(&interleaved, 8_000, 2);
        let decoded = decode_mono(&wav, AudioFormat::Wav, None).expect("decode");
        assert_eq!(decoded.sample_rate_hz, 8_000);
        assert_eq!(decoded.channels, 2);
        assert_eq!(decoded.samples_mono.len(), 100);
        assert!(decoded.samples_mono.iter().all(|s| s.abs() < 1e-3));
    }

    #[test]
    fn load_clip_cuts_window_and_resamples() {
        // 1s @ 8kHz: the window keeps [0.5s, 1.0s) => 4000 samples, then x2 to 16kHz.
        let samples: Vec<f32> = (0..8_000).map(|i| ((i % 100) as f32) / 200.0).collect();
        let wav = pcm16_wav(&samples, 8_000, 1);
        let clip =
            load_clip(&wav, AudioFormat::Wav, AnalysisWindow::default(), 16_000).expect("clip");
        assert_eq!(clip.sample_rate_hz(), 16_000);
        assert_eq!(clip.samples().len(), 8_000);
        assert!((clip.duration_secs() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn load_clip_shorter_than_offset_is_empty() {
        let wav = pcm16_wav(&[0.25; 1_000], 8_000, 1);
        let clip =
            load_clip(&wav, AudioFormat::Wav, AnalysisWindow::default(), 8_000).expect("clip");
        assert!(clip.samples().is_empty());
    }

    #[test]
    fn rejects_empty_and_garbage() {
        assert!(matches!(
            decode_mono(&[], AudioFormat::Wav, None),
            Err(DecodeError::Empty)
        ));
        let garbage = vec![0x42u8; 512];
        assert!(decode_mono(&garbage, AudioFormat::Mp3, None).is_err());
    }
}
