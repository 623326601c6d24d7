//! Dialogue brain
//!
//! Sends the caller transcript plus session context to the chat model and
//! parses the structured JSON reply. A reply that is not a JSON object is
//! spoken as-is with no fields extracted.

use serde_json::Value;

use crate::openai::ResponsesClient;
use crate::prompt::{TurnContext, build_turn_prompt};
use crate::Result;

/// Sampling temperature for dialogue turns
const TEMPERATURE: f32 = 0.4;

/// Fields extracted from one assistant reply
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TurnPayload {
    /// The spoken reply
    pub reply: String,
    /// Caller name, when newly learned
    pub name: Option<String>,
    /// Caller address, when newly learned
    pub address: Option<String>,
    /// Appointment or free-form note attached to the turn
    pub note: Option<String>,
}

impl TurnPayload {
    /// Apply extracted fields to a profile and note list
    ///
    /// Non-empty name/address overwrite the previous values (latest wins);
    /// a note is appended. Returns whether anything changed.
    pub fn apply_to(&self, profile: &mut crate::state::Profile, notes: &mut Vec<String>) -> bool {
        let mut updated = false;

        if let Some(name) = &self.name {
            if profile.name.as_deref() != Some(name) {
                profile.name = Some(name.clone());
                updated = true;
            }
        }
        if let Some(address) = &self.address {
            if profile.address.as_deref() != Some(address) {
                profile.address = Some(address.clone());
                updated = true;
            }
        }
        if let Some(note) = &self.note {
            notes.push(note.clone());
            updated = true;
        }

        updated
    }
}

/// Drives dialogue turns against the chat model
pub struct DialogueClient {
    responses: ResponsesClient,
    model: String,
    system_prompt: String,
}

impl DialogueClient {
    /// Create a new dialogue client
    ///
    /// # Errors
    ///
    /// Returns error if the API key is empty
    pub fn new(api_key: String, model: String, system_prompt: String) -> Result<Self> {
        Ok(Self {
            responses: ResponsesClient::new(api_key)?,
            model,
            system_prompt,
        })
    }

    /// Replace the system prompt (after prompt training)
    pub fn set_system_prompt(&mut self, prompt: String) {
        self.system_prompt = prompt;
    }

    /// Run one dialogue turn
    ///
    /// # Errors
    ///
    /// Returns error if the chat request fails
    pub async fn reason(&self, ctx: &TurnContext<'_>, transcript: &str) -> Result<TurnPayload> {
        let prompt = build_turn_prompt(ctx, transcript);
        tracing::debug!(model = %self.model, prompt_len = prompt.len(), "dialogue turn");

        let raw = self
            .responses
            .respond(&self.model, Some(TEMPERATURE), Some(&self.system_prompt), &prompt)
            .await?;

        Ok(parse_payload(&raw))
    }
}

/// Parse the model output into a turn payload
///
/// A JSON object yields the structured fields; anything else becomes the
/// spoken reply verbatim.
#[must_use]
pub fn parse_payload(raw: &str) -> TurnPayload {
    let Ok(Value::Object(obj)) = serde_json::from_str::<Value>(raw) else {
        return TurnPayload {
            reply: raw.to_string(),
            ..TurnPayload::default()
        };
    };

    let reply = obj
        .get("reply")
        .and_then(Value::as_str)
        .map_or_else(|| raw.to_string(), ToString::to_string);

    // 'notes' wins over 'appointment' when both are present
    let note = obj
        .get("notes")
        .filter(|v| !v.is_null())
        .or_else(|| obj.get("appointment").filter(|v| !v.is_null()))
        .map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        });

    TurnPayload {
        reply,
        name: string_field(&obj, "name"),
        address: string_field(&obj, "address"),
        note,
    }
}

fn string_field(obj: &serde_json::Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structured_reply_is_parsed() {
        let payload = parse_payload(
            r#"{"reply": "خوش آمدید", "name": "مریم", "address": null, "appointment": "شنبه ساعت ده"}"#,
        );
        assert_eq!(payload.reply, "خوش آمدید");
        assert_eq!(payload.name.as_deref(), Some("مریم"));
        assert_eq!(payload.address, None);
        assert_eq!(payload.note.as_deref(), Some("شنبه ساعت ده"));
    }

    #[test]
    fn raw_text_falls_back_to_spoken_reply() {
        let payload = parse_payload("من یک پاسخ ساده هستم");
        assert_eq!(payload.reply, "من یک پاسخ ساده هستم");
        assert_eq!(payload.name, None);
        assert_eq!(payload.address, None);
        assert_eq!(payload.note, None);
    }

    #[test]
    fn notes_take_precedence_over_appointment() {
        let payload =
            parse_payload(r#"{"reply": "ok", "notes": "allergy to penicillin", "appointment": "x"}"#);
        assert_eq!(payload.note.as_deref(), Some("allergy to penicillin"));
    }

    #[test]
    fn non_string_note_is_stringified() {
        let payload = parse_payload(r#"{"reply": "ok", "appointment": {"day": "sat"}}"#);
        assert_eq!(payload.note.as_deref(), Some(r#"{"day":"sat"}"#));
    }

    #[test]
    fn blank_fields_are_dropped() {
        let payload = parse_payload(r#"{"reply": "ok", "name": "  ", "address": ""}"#);
        assert_eq!(payload.name, None);
        assert_eq!(payload.address, None);
    }

    #[test]
    fn object_without_reply_speaks_raw_text() {
        let raw = r#"{"name": "رضا"}"#;
        let payload = parse_payload(raw);
        assert_eq!(payload.reply, raw);
        assert_eq!(payload.name.as_deref(), Some("رضا"));
    }
}
