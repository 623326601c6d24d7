//! Voice processing module
//!
//! Handles audio capture, endpointing, transcription, synthesis, and playback.

mod capture;
mod playback;
mod segmenter;
mod stt;
mod tts;

pub use capture::{
    AudioCapture, calculate_rms, mean_energy_i16, samples_to_wav, trim_trailing_silence,
};
pub use playback::{AudioPlayback, PLAYBACK_SAMPLE_RATE, decode_audio};
pub use segmenter::SpeechSegmenter;
pub use stt::{SpeechToText, uses_audio_endpoint};
pub use tts::TextToSpeech;
