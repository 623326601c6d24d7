//! Energy-based speech segmentation for realtime mode
//!
//! Chunks above the energy threshold accumulate into an utterance; once an
//! utterance exists, enough consecutive sub-threshold audio closes it and the
//! segment is handed to the pipeline. Leading silence never opens a segment.

use crate::config::SAMPLE_RATE;

use super::capture::mean_energy_i16;

/// Accumulates speech chunks and detects end-of-utterance silence
pub struct SpeechSegmenter {
    energy_threshold: f32,
    silence_samples: usize,
    buffer: Vec<f32>,
    silence_counter: usize,
}

impl SpeechSegmenter {
    /// Create a segmenter
    ///
    /// `energy_threshold` is on the i16 scale; `silence_timeout` is the
    /// pause, in seconds, that closes an utterance.
    #[must_use]
    pub fn new(energy_threshold: f32, silence_timeout: f64) -> Self {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let silence_samples = (f64::from(SAMPLE_RATE) * silence_timeout) as usize;
        Self {
            energy_threshold,
            silence_samples,
            buffer: Vec::new(),
            silence_counter: 0,
        }
    }

    /// Feed one chunk; returns a completed segment when silence closes it
    pub fn push(&mut self, chunk: &[f32]) -> Option<Vec<f32>> {
        if chunk.is_empty() {
            return None;
        }

        let energy = mean_energy_i16(chunk);
        if energy >= self.energy_threshold {
            self.buffer.extend_from_slice(chunk);
            self.silence_counter = 0;
            return None;
        }

        if self.buffer.is_empty() {
            return None;
        }

        self.silence_counter += chunk.len();
        if self.silence_counter >= self.silence_samples {
            self.silence_counter = 0;
            return Some(std::mem::take(&mut self.buffer));
        }
        None
    }

    /// Samples accumulated in the open utterance, if any
    #[must_use]
    pub fn pending_samples(&self) -> usize {
        self.buffer.len()
    }

    /// Discard any open utterance
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.silence_counter = 0;
    }
}
