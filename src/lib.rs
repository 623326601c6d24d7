//! Clinic Intake - voice-driven appointment intake assistant
//!
//! The assistant runs a sequential per-turn pipeline:
//!
//! ```text
//! Capture → Transcribe → Dialogue → Synthesize → Persist
//! ```
//!
//! Audio is captured from the microphone, transcribed through the OpenAI
//! speech APIs, answered by a chat model that replies in a structured JSON
//! dialogue format, spoken aloud through TTS, and the captured caller
//! name/address fields are persisted to local files under the data directory.

pub mod assistant;
pub mod config;
pub mod dialogue;
pub mod error;
pub mod openai;
pub mod prompt;
pub mod state;
pub mod store;
pub mod voice;

pub use assistant::{Assistant, RealtimeOptions};
pub use config::{CaptureConfig, Config, SAMPLE_RATE};
pub use dialogue::{DialogueClient, TurnPayload, parse_payload};
pub use error::{Error, Result};
pub use prompt::{DEFAULT_SYSTEM_PROMPT, TurnContext, build_turn_prompt};
pub use state::{History, Profile, Role, Snapshot, Turn};
pub use store::{LogEntry, SessionStore, generate_session_name, parse_log_line};
