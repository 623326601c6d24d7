//! Assistant orchestrator
//!
//! Owns the full pipeline: capture, transcription, dialogue, synthesis, and
//! persistence. One instance corresponds to one session.

use std::collections::BTreeSet;
use std::io::Write as _;
use std::time::Duration;

use crate::config::Config;
use crate::dialogue::{DialogueClient, TurnPayload};
use crate::prompt::{DEFAULT_SYSTEM_PROMPT, TurnContext};
use crate::state::{History, Profile, Role, Snapshot};
use crate::store::SessionStore;
use crate::voice::{
    AudioCapture, AudioPlayback, SpeechSegmenter, SpeechToText, TextToSpeech, samples_to_wav,
    trim_trailing_silence,
};
use crate::Result;

/// Realtime tuning passed through from the CLI
#[derive(Debug, Clone, Copy)]
pub struct RealtimeOptions {
    /// Poll interval for speech detection, seconds
    pub chunk_seconds: f64,
    /// Silence duration that triggers a response, seconds
    pub silence_timeout: f64,
    /// Minimum mean chunk energy (i16 scale) to treat audio as speech
    pub energy_threshold: f32,
}

/// Conversational intake assistant
pub struct Assistant {
    config: Config,
    store: SessionStore,
    stt: SpeechToText,
    tts: TextToSpeech,
    dialogue: DialogueClient,
    profile: Profile,
    notes: Vec<String>,
    history: History,
    known_clients: BTreeSet<String>,
    name_list: BTreeSet<String>,
    previous_snapshot: Option<Snapshot>,
}

impl Assistant {
    /// Build the assistant: open the store, seed state from previous runs,
    /// and announce the new session in the log and meta files.
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be opened or a client is misconfigured
    pub fn new(config: Config) -> Result<Self> {
        let store = SessionStore::new(&config.data_dir)?;

        let system_prompt = store
            .load_custom_prompt()
            .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string());

        let stt = SpeechToText::new(
            config.api_key.clone(),
            config.transcribe_model.clone(),
            config.transcribe_fallback.clone(),
        )?;
        let tts = TextToSpeech::new(
            config.api_key.clone(),
            config.tts_model.clone(),
            config.tts_voice.clone(),
        )?;
        let dialogue = DialogueClient::new(
            config.api_key.clone(),
            config.response_model.clone(),
            system_prompt,
        )?;

        let previous_snapshot = store.load_last_snapshot();
        let mut history = History::new(config.history_limit);
        history.seed(store.load_history(config.history_limit));
        let known_clients = store.load_known_clients();
        let name_list = store.load_name_list();

        store.save_session_meta()?;
        store.log_session_start()?;

        tracing::info!(
            session = store.session_name(),
            known_clients = known_clients.len(),
            restored_turns = history.turns().len(),
            "session started"
        );

        Ok(Self {
            config,
            store,
            stt,
            tts,
            dialogue,
            profile: Profile::default(),
            notes: Vec::new(),
            history,
            known_clients,
            name_list,
            previous_snapshot,
        })
    }

    /// Push-to-talk loop: Enter records one utterance, `q` quits
    ///
    /// # Errors
    ///
    /// Returns error only on unrecoverable setup failures; per-turn failures
    /// are reported and the loop continues.
    pub async fn run(&mut self) -> Result<()> {
        println!(
            "Intake assistant ready. Session '{}'. Press Enter to speak, 'q' to quit.",
            self.store.session_name()
        );

        let mut capture = AudioCapture::new(self.config.capture.clone())?;

        loop {
            let input = read_stdin_line("Press Enter to speak (q to quit): ")?;
            if input.trim().eq_ignore_ascii_case("q") {
                println!(
                    "Session ended. See {} for captured details.",
                    self.store.snapshot_path().display()
                );
                break;
            }

            println!(
                "Recording (max {:.1}s)... stop speaking to send sooner.",
                self.config.record_seconds
            );

            let transcript = match self.record_and_transcribe(&mut capture).await {
                Ok(transcript) => transcript,
                Err(e) => {
                    println!("Recording or transcription failed: {e}");
                    continue;
                }
            };

            if transcript.is_empty() {
                println!("No speech detected. Try again.");
                continue;
            }

            self.handle_transcript(&transcript, true).await;
        }

        Ok(())
    }

    /// Realtime loop: continuous listening with energy-based endpointing
    ///
    /// Runs until interrupted with Ctrl+C.
    ///
    /// # Errors
    ///
    /// Returns error if the capture stream cannot be started
    pub async fn run_realtime(&mut self, options: RealtimeOptions) -> Result<()> {
        println!(
            "Realtime intake assistant listening.\nSession '{}'.\n\
             Speak naturally; pause for a moment to let the assistant reply.\n\
             Press Ctrl+C to end the session.",
            self.store.session_name()
        );

        let mut capture = AudioCapture::new(self.config.capture.clone())?;
        capture.start()?;

        let chunk_interval = Duration::from_secs_f64(options.chunk_seconds);
        let mut segmenter =
            SpeechSegmenter::new(options.energy_threshold, options.silence_timeout);

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    println!(
                        "\nSession ended. See {} for captured details.",
                        self.store.snapshot_path().display()
                    );
                    break;
                }
                () = tokio::time::sleep(chunk_interval) => {
                    let chunk = capture.take_buffer();
                    if let Some(segment) = segmenter.push(&chunk) {
                        self.process_segment(&segment).await;
                        // Drop anything captured while the reply played
                        capture.clear_buffer();
                    }
                }
            }
        }

        capture.stop();
        Ok(())
    }

    /// Text-only loop: typed turns, no audio
    ///
    /// # Errors
    ///
    /// Returns error if stdin cannot be read
    pub async fn run_text(&mut self) -> Result<()> {
        println!(
            "Intake assistant (text mode). Session '{}'. Type 'q' to quit.",
            self.store.session_name()
        );

        loop {
            let input = read_stdin_line("You: ")?;
            let text = input.trim();
            if text.eq_ignore_ascii_case("q") {
                println!(
                    "Session ended. See {} for captured details.",
                    self.store.snapshot_path().display()
                );
                break;
            }
            if text.is_empty() {
                continue;
            }
            self.handle_transcript(text, false).await;
        }

        Ok(())
    }

    /// Capture one utterance and store it as the new system prompt
    ///
    /// # Errors
    ///
    /// Returns error if the prompt cannot be saved
    pub async fn train_prompt(&mut self) -> Result<()> {
        println!(
            "Prompt training mode.\nSpeak for up to {:.1} seconds to describe how the \
             assistant should behave.",
            self.config.record_seconds
        );

        let mut capture = AudioCapture::new(self.config.capture.clone())?;
        let transcript = match self.record_and_transcribe(&mut capture).await {
            Ok(transcript) => transcript,
            Err(e) => {
                println!("Training failed: {e}");
                return Ok(());
            }
        };

        if transcript.is_empty() {
            println!("Did not capture any speech. Prompt unchanged.");
            return Ok(());
        }

        println!("Captured prompt:\n{transcript}");
        self.store.save_custom_prompt(&transcript)?;
        self.dialogue.set_system_prompt(transcript);
        println!(
            "Custom prompt saved to {}.",
            self.store.prompt_path().display()
        );
        Ok(())
    }

    /// Transcribe, reason, speak, and persist one audio segment
    async fn process_segment(&mut self, segment: &[f32]) {
        let segment = trim_trailing_silence(
            segment.to_vec(),
            self.config.capture.silence_trim_threshold,
        );
        let transcript = match self.transcribe_samples(&segment).await {
            Ok(transcript) => transcript,
            Err(e) => {
                tracing::warn!(error = %e, "segment transcription failed");
                return;
            }
        };
        if transcript.is_empty() {
            return;
        }
        self.handle_transcript(&transcript, true).await;
    }

    /// Drive one full dialogue turn from a transcript
    async fn handle_transcript(&mut self, transcript: &str, speak: bool) {
        println!("You said: {transcript}");
        self.log_turn(Role::User, transcript);

        let spotted = self.detect_given_names(transcript);
        if !spotted.is_empty() {
            tracing::debug!(names = ?spotted, "given names spotted in transcript");
        }

        let possible_return = self.find_similar_client(transcript);
        let known_clients: Vec<String> = self.known_clients.iter().cloned().collect();
        let ctx = TurnContext {
            session_name: self.store.session_name(),
            known_clients: &known_clients,
            possible_return: possible_return.as_deref(),
            previous_snapshot: self.previous_snapshot.as_ref(),
            history: &self.history,
            profile: &self.profile,
        };

        let payload = match self.dialogue.reason(&ctx, transcript).await {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(error = %e, "dialogue request failed");
                println!("The assistant could not create a response. Try again.");
                return;
            }
        };

        if payload.reply.is_empty() {
            println!("The assistant could not create a response. Try again.");
            return;
        }

        println!("Assistant: {}", payload.reply);
        if speak {
            self.speak(&payload.reply).await;
        }
        self.log_turn(Role::Assistant, &payload.reply);
        self.update_profile(&payload);
    }

    /// Record one push-to-talk utterance and transcribe it
    async fn record_and_transcribe(&self, capture: &mut AudioCapture) -> Result<String> {
        let samples = capture.record_push_to_talk(self.config.record_seconds)?;
        self.transcribe_samples(&samples).await
    }

    async fn transcribe_samples(&self, samples: &[f32]) -> Result<String> {
        if samples.is_empty() {
            return Ok(String::new());
        }
        let wav = samples_to_wav(samples, crate::config::SAMPLE_RATE)?;
        self.stt.transcribe(&wav).await
    }

    /// Synthesize and play a reply; failures are reported, not fatal
    async fn speak(&self, message: &str) {
        if message.is_empty() {
            return;
        }

        let result: Result<()> = async {
            let audio = self.tts.synthesize(message).await?;
            let mut playback = AudioPlayback::new()?;
            playback.play_encoded(&audio).await
        }
        .await;

        if let Err(e) = result {
            tracing::warn!(error = %e, "TTS failed");
            println!("TTS service failed ({e}); continuing without audio.");
        }
    }

    /// Apply extracted fields to the profile and persist on change
    fn update_profile(&mut self, payload: &TurnPayload) {
        let updated = payload.apply_to(&mut self.profile, &mut self.notes);
        if let Some(name) = &payload.name {
            self.add_known_client(name);
        }

        if updated {
            let snapshot = Snapshot {
                session: self.store.session_name().to_string(),
                profile: self.profile.clone(),
                notes: self.notes.clone(),
            };
            if let Err(e) = self.store.save_snapshot(&snapshot) {
                tracing::warn!(error = %e, "failed to save snapshot");
            } else if let Ok(json) = serde_json::to_string(&snapshot) {
                println!("Profile updated: {json}");
            }
            self.previous_snapshot = Some(snapshot);
        }
    }

    fn add_known_client(&mut self, name: &str) {
        let clean = name.trim();
        if clean.is_empty() {
            return;
        }
        if self.known_clients.insert(clean.to_string()) {
            if let Err(e) = self.store.persist_known_clients(&self.known_clients) {
                tracing::warn!(error = %e, "failed to persist known clients");
            }
        }
    }

    /// Find a known client whose name appears in the transcript
    fn find_similar_client(&self, transcript: &str) -> Option<String> {
        let lower = transcript.to_lowercase();
        self.known_clients
            .iter()
            .find(|name| {
                let normalized = name.to_lowercase();
                !normalized.is_empty() && lower.contains(&normalized)
            })
            .cloned()
    }

    /// Spot common given names mentioned in the transcript, capped at five
    fn detect_given_names(&self, transcript: &str) -> Vec<String> {
        let lower = transcript.to_lowercase();
        self.name_list
            .iter()
            .filter(|name| {
                let normalized = name.to_lowercase();
                !normalized.is_empty() && lower.contains(&normalized)
            })
            .take(5)
            .cloned()
            .collect()
    }

    fn log_turn(&mut self, role: Role, text: &str) {
        if let Err(e) = self.store.log_turn(role, text) {
            tracing::warn!(error = %e, "failed to append turn log");
        }
        self.history.push(role, text);
    }
}

/// Prompt on stdout and read one line from stdin
fn read_stdin_line(prompt: &str) -> Result<String> {
    print!("{prompt}");
    std::io::stdout().flush()?;
    let mut line = String::new();
    let read = std::io::stdin().read_line(&mut line)?;
    if read == 0 {
        // EOF behaves like quitting
        return Ok("q".to_string());
    }
    Ok(line)
}

impl std::fmt::Debug for Assistant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Assistant")
            .field("session", &self.store.session_name())
            .field("profile", &self.profile)
            .field("known_clients", &self.known_clients.len())
            .finish_non_exhaustive()
    }
}
