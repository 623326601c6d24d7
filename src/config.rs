//! Configuration for the intake assistant
//!
//! Model names and the API key come from the environment (a `.env` file is
//! honored). Capture tuning lives here so the push-to-talk and realtime
//! loops share one set of defaults.

use std::path::PathBuf;

use crate::{Error, Result};

/// Sample rate for capture and upload (16kHz for speech)
pub const SAMPLE_RATE: u32 = 16000;

/// Assistant configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// OpenAI API key
    pub api_key: String,

    /// Chat model for dialogue turns
    pub response_model: String,

    /// Primary transcription model
    pub transcribe_model: String,

    /// Fallback transcription model, used once when the primary path fails
    pub transcribe_fallback: String,

    /// TTS model
    pub tts_model: String,

    /// TTS voice identifier
    pub tts_voice: String,

    /// Directory holding session files
    pub data_dir: PathBuf,

    /// Max push-to-talk recording length in seconds
    pub record_seconds: f64,

    /// Capture tuning
    pub capture: CaptureConfig,

    /// Rolling history entries kept for prompt context
    pub history_limit: usize,
}

/// Capture endpointing tuning
///
/// Energy values are on the i16 sample scale, matching the CLI flags.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Poll interval for push-to-talk endpointing, seconds
    pub push_chunk_seconds: f64,

    /// Silence duration that ends a push-to-talk recording, seconds
    pub push_silence_timeout: f64,

    /// Minimum mean energy to treat a push-to-talk chunk as speech
    pub push_energy_threshold: f32,

    /// Threshold for trimming trailing silence from a segment
    pub silence_trim_threshold: f32,

    /// Minimum recording length before silence can end it, seconds
    pub min_duration: f64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            push_chunk_seconds: 0.3,
            push_silence_timeout: 0.6,
            push_energy_threshold: 180.0,
            silence_trim_threshold: 65.0,
            min_duration: 0.5,
        }
    }
}

impl Config {
    /// Load configuration from the environment
    ///
    /// # Errors
    ///
    /// Returns error if `OPENAI_API_KEY` is missing
    pub fn load(data_dir: PathBuf, record_seconds: f64) -> Result<Self> {
        dotenv::dotenv().ok();

        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
            Error::Config("missing OPENAI_API_KEY in environment or .env file".to_string())
        })?;

        Ok(Self {
            api_key,
            response_model: env_or("OPENAI_RESPONSE_MODEL", "gpt-4o-mini"),
            transcribe_model: env_or("OPENAI_TRANSCRIBE_MODEL", "gpt-4o-mini-transcribe"),
            transcribe_fallback: env_or("OPENAI_TRANSCRIBE_FALLBACK", "gpt-4o-mini-transcribe"),
            tts_model: env_or("OPENAI_TTS_MODEL", "gpt-4o-mini-tts"),
            tts_voice: env_or("OPENAI_TTS_VOICE", "alloy"),
            data_dir,
            record_seconds,
            capture: CaptureConfig::default(),
            history_limit: 16,
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_defaults_match_documented_flags() {
        let capture = CaptureConfig::default();
        assert!(capture.push_silence_timeout > capture.push_chunk_seconds);
        assert!(capture.silence_trim_threshold < capture.push_energy_threshold);
    }

    #[test]
    fn env_or_ignores_blank_values() {
        std::env::set_var("CLINIC_INTAKE_TEST_BLANK", "   ");
        assert_eq!(env_or("CLINIC_INTAKE_TEST_BLANK", "fallback"), "fallback");
        std::env::remove_var("CLINIC_INTAKE_TEST_BLANK");
    }
}
