//! Speech-to-text (STT) processing

use std::sync::atomic::{AtomicBool, Ordering};

use base64::Engine as _;

use crate::openai::ResponsesClient;
use crate::{Error, Result};

/// Response from the audio transcription endpoint
#[derive(serde::Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    text: String,
}

/// Transcribes speech to text
///
/// Models whose name carries a `transcribe` or `whisper` marker go straight
/// to the audio transcription endpoint. Anything else is treated as a
/// multimodal model and driven through the Responses endpoint with the audio
/// embedded; if that path fails, a single retry runs against the fallback
/// model on the audio endpoint.
pub struct SpeechToText {
    client: reqwest::Client,
    responses: ResponsesClient,
    api_key: String,
    model: String,
    fallback_model: String,
    fallback_warned: AtomicBool,
}

impl SpeechToText {
    /// Create a new STT instance
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new(api_key: String, model: String, fallback_model: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config(
                "OpenAI API key required for transcription".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            responses: ResponsesClient::new(api_key.clone())?,
            api_key,
            model,
            fallback_model,
            fallback_warned: AtomicBool::new(false),
        })
    }

    /// Transcribe WAV audio to text
    ///
    /// # Errors
    ///
    /// Returns error if both the primary path and the fallback fail
    pub async fn transcribe(&self, audio: &[u8]) -> Result<String> {
        if uses_audio_endpoint(&self.model) {
            return self.transcribe_via_audio_endpoint(audio, &self.model).await;
        }

        match self.transcribe_via_responses(audio).await {
            Ok(text) => Ok(text),
            Err(e) => {
                if !self.fallback_warned.swap(true, Ordering::Relaxed) {
                    tracing::warn!(
                        model = %self.model,
                        fallback = %self.fallback_model,
                        error = %e,
                        "advanced transcription failed, falling back"
                    );
                    println!(
                        "Advanced transcription with '{}' failed ({e}). Falling back to '{}'.",
                        self.model, self.fallback_model
                    );
                }
                self.transcribe_via_audio_endpoint(audio, &self.fallback_model)
                    .await
            }
        }
    }

    /// Transcribe using the dedicated audio transcription endpoint
    async fn transcribe_via_audio_endpoint(&self, audio: &[u8], model: &str) -> Result<String> {
        tracing::debug!(audio_bytes = audio.len(), model, "starting transcription");

        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(audio.to_vec())
                    .file_name("speech.wav")
                    .mime_str("audio/wav")
                    .map_err(|e| Error::Stt(e.to_string()))?,
            )
            .text("model", model.to_string());

        let response = self
            .client
            .post("https://api.openai.com/v1/audio/transcriptions")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "transcription request failed");
                e
            })?;

        let status = response.status();
        tracing::debug!(status = %status, "received response");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "transcription API error");
            return Err(Error::Stt(format!(
                "transcription API error {status}: {body}"
            )));
        }

        let result: TranscriptionResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "failed to parse transcription response");
            e
        })?;

        let transcript = result.text.trim().to_string();
        tracing::info!(transcript = %transcript, "transcription complete");
        Ok(transcript)
    }

    /// Transcribe through the Responses endpoint with base64-embedded audio
    async fn transcribe_via_responses(&self, audio: &[u8]) -> Result<String> {
        tracing::debug!(
            audio_bytes = audio.len(),
            model = %self.model,
            "starting responses-path transcription"
        );

        let payload = base64::engine::general_purpose::STANDARD.encode(audio);
        let instruction = format!(
            "Transcribe the following Persian speech. The audio is a base64-encoded WAV \
             string. Decode it and reply with only the transcript.\n{payload}"
        );

        let transcript = self
            .responses
            .respond(&self.model, None, None, &instruction)
            .await?;

        tracing::info!(transcript = %transcript, "transcription complete");
        Ok(transcript)
    }
}

/// Whether a model name routes to the audio transcription endpoint
#[must_use]
pub fn uses_audio_endpoint(model: &str) -> bool {
    let lower = model.to_lowercase();
    lower.contains("transcribe") || lower.contains("whisper")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transcription_models_route_to_audio_endpoint() {
        assert!(uses_audio_endpoint("gpt-4o-mini-transcribe"));
        assert!(uses_audio_endpoint("whisper-1"));
        assert!(uses_audio_endpoint("WHISPER-LARGE"));
        assert!(!uses_audio_endpoint("gpt-4o-mini"));
    }
}
