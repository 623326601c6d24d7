//! Audio capture from microphone

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, Stream, StreamConfig};

use crate::config::{CaptureConfig, SAMPLE_RATE};
use crate::{Error, Result};

/// Captures audio from the default input device
pub struct AudioCapture {
    #[allow(dead_code)]
    device: Device,
    config: StreamConfig,
    buffer: Arc<Mutex<Vec<f32>>>,
    stream: Option<Stream>,
    tuning: CaptureConfig,
}

impl AudioCapture {
    /// Create a new audio capture instance
    ///
    /// # Errors
    ///
    /// Returns error if audio device cannot be opened
    pub fn new(tuning: CaptureConfig) -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_input_device()
            .ok_or_else(|| Error::Audio("no input device available".to_string()))?;

        let supported_config = device
            .supported_input_configs()
            .map_err(|e| Error::Audio(e.to_string()))?
            .find(|c| {
                c.channels() == 1
                    && c.min_sample_rate() <= SampleRate(SAMPLE_RATE)
                    && c.max_sample_rate() >= SampleRate(SAMPLE_RATE)
            })
            .ok_or_else(|| Error::Audio("no suitable audio config found".to_string()))?;

        let config = supported_config
            .with_sample_rate(SampleRate(SAMPLE_RATE))
            .config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = SAMPLE_RATE,
            channels = config.channels,
            "audio capture initialized"
        );

        Ok(Self {
            device,
            config,
            buffer: Arc::new(Mutex::new(Vec::new())),
            stream: None,
            tuning,
        })
    }

    /// Start capturing audio
    ///
    /// # Errors
    ///
    /// Returns error if capture fails
    pub fn start(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        let buffer = Arc::clone(&self.buffer);
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| Error::Audio("no input device".to_string()))?;

        let config = self.config.clone();

        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if let Ok(mut buf) = buffer.lock() {
                        buf.extend_from_slice(data);
                    }
                },
                |err| {
                    tracing::error!(error = %err, "audio capture error");
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?;

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;
        self.stream = Some(stream);

        tracing::debug!("audio capture started");
        Ok(())
    }

    /// Stop capturing audio
    pub fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            drop(stream);
            tracing::debug!("audio capture stopped");
        }
    }

    /// Get captured audio buffer and clear it
    #[must_use]
    pub fn take_buffer(&self) -> Vec<f32> {
        self.buffer
            .lock()
            .map(|mut buf| std::mem::take(&mut *buf))
            .unwrap_or_default()
    }

    /// Get captured audio buffer without clearing
    #[must_use]
    pub fn peek_buffer(&self) -> Vec<f32> {
        self.buffer
            .lock()
            .map(|buf| buf.clone())
            .unwrap_or_default()
    }

    /// Clear the audio buffer
    pub fn clear_buffer(&self) {
        if let Ok(mut buf) = self.buffer.lock() {
            buf.clear();
        }
    }

    /// Check if currently capturing
    #[must_use]
    pub const fn is_capturing(&self) -> bool {
        self.stream.is_some()
    }

    /// Get the sample rate
    #[must_use]
    pub const fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    /// Record one push-to-talk utterance
    ///
    /// Blocks until `max_seconds` of audio has accumulated or the caller has
    /// stopped speaking: once at least the minimum duration is captured, a
    /// stretch of sub-threshold chunks lasting the configured silence timeout
    /// ends the recording. Trailing silence is trimmed from the result.
    ///
    /// # Errors
    ///
    /// Returns error if the capture stream cannot be started
    pub fn record_push_to_talk(&mut self, max_seconds: f64) -> Result<Vec<f32>> {
        self.clear_buffer();
        self.start()?;

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let max_samples = (f64::from(SAMPLE_RATE) * max_seconds) as usize;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let min_samples = (f64::from(SAMPLE_RATE) * self.tuning.min_duration) as usize;
        let chunk_interval = Duration::from_secs_f64(self.tuning.push_chunk_seconds);
        let silence_timeout = Duration::from_secs_f64(self.tuning.push_silence_timeout);

        let mut segment: Vec<f32> = Vec::new();
        let mut silence_since: Option<Instant> = None;

        loop {
            std::thread::sleep(chunk_interval);
            let chunk = self.take_buffer();
            if chunk.is_empty() {
                continue;
            }

            let energy = mean_energy_i16(&chunk);
            segment.extend_from_slice(&chunk);

            if energy >= self.tuning.push_energy_threshold {
                silence_since = None;
            } else {
                let since = *silence_since.get_or_insert_with(Instant::now);
                if since.elapsed() >= silence_timeout && segment.len() >= min_samples {
                    break;
                }
            }

            if segment.len() >= max_samples {
                break;
            }
        }

        self.stop();
        Ok(trim_trailing_silence(
            segment,
            self.tuning.silence_trim_threshold,
        ))
    }
}

/// Mean absolute energy of a chunk, scaled to the i16 range
///
/// The endpointing thresholds are documented on the i16 scale, so f32
/// samples are scaled up before averaging.
#[must_use]
pub fn mean_energy_i16(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let mean = samples.iter().map(|s| s.abs()).sum::<f32>() / samples.len() as f32;
    mean * 32768.0
}

/// RMS energy of a chunk in the f32 range
#[must_use]
pub fn calculate_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let mean_squares = samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32;
    mean_squares.sqrt()
}

/// Drop quiet samples from the tail of a segment
///
/// `threshold` is on the i16 scale. A fully quiet segment is returned as-is
/// so the caller can decide how to handle it.
#[must_use]
pub fn trim_trailing_silence(samples: Vec<f32>, threshold: f32) -> Vec<f32> {
    if samples.is_empty() {
        return samples;
    }
    let threshold_f32 = threshold / 32768.0;
    let last_loud = samples.iter().rposition(|s| s.abs() > threshold_f32);
    match last_loud {
        Some(idx) if idx > 0 => {
            let mut samples = samples;
            samples.truncate(idx + 1);
            samples
        }
        _ => samples,
    }
}

/// Convert f32 samples to WAV bytes for the transcription APIs
///
/// # Errors
///
/// Returns error if WAV encoding fails
pub fn samples_to_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).map_err(|e| Error::Audio(e.to_string()))?;

        for &sample in samples {
            // Convert f32 [-1.0, 1.0] to i16
            #[allow(clippy::cast_possible_truncation)]
            let sample_i16 = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
            writer
                .write_sample(sample_i16)
                .map_err(|e| Error::Audio(e.to_string()))?;
        }

        writer.finalize().map_err(|e| Error::Audio(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}
