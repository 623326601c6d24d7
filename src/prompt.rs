//! System prompt and per-turn prompt assembly

use crate::state::{History, Profile, Snapshot};

/// Built-in system prompt, used unless `custom_prompt.txt` overrides it
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are an empathetic Persian-speaking medical office assistant who books doctor \
     appointments. Always respond with a compact JSON object that contains at least \
     the key 'reply'. Optional keys include 'name', 'address', 'appointment', and \
     'notes'. Use null for name/address if you did not learn them in the latest user \
     utterance. Gather the caller's name and address early in the conversation and \
     confirm them. Keep the 'reply' friendly, concise, and entirely in Persian so it \
     can be spoken aloud.";

/// How many known client names to surface in the prompt
const KNOWN_CLIENTS_IN_PROMPT: usize = 20;

/// Context fed into the per-turn user prompt
pub struct TurnContext<'a> {
    pub session_name: &'a str,
    pub known_clients: &'a [String],
    pub possible_return: Option<&'a str>,
    pub previous_snapshot: Option<&'a Snapshot>,
    pub history: &'a History,
    pub profile: &'a Profile,
}

/// Assemble the user prompt for one dialogue turn
#[must_use]
pub fn build_turn_prompt(ctx: &TurnContext<'_>, transcript: &str) -> String {
    let recent_clients =
        &ctx.known_clients[ctx.known_clients.len().saturating_sub(KNOWN_CLIENTS_IN_PROMPT)..];
    let client_json =
        serde_json::to_string(recent_clients).unwrap_or_else(|_| "[]".to_string());
    let snapshot_json = ctx
        .previous_snapshot
        .and_then(|s| serde_json::to_string(s).ok())
        .unwrap_or_else(|| "{}".to_string());
    let profile_json =
        serde_json::to_string(ctx.profile).unwrap_or_else(|_| "{}".to_string());
    let possible_return = ctx.possible_return.unwrap_or("none");

    format!(
        "Session name: {session}\n\
         Known returning clients: {clients}\n\
         Possible returning client mentioned: {possible_return}\n\
         Previous session snapshot (for reference only—confirm before reuse): {snapshot}\n\
         If a possible returning client is noted, do not assume; politely ask whether \
         they are the same person and only keep the name if confirmed in the latest \
         caller statement.\n\
         Conversation so far:\n{history}\n\
         Caller statement: {transcript}\n\
         Known data: {profile}\n\
         Return only JSON as described earlier.",
        session = ctx.session_name,
        clients = client_json,
        possible_return = possible_return,
        snapshot = snapshot_json,
        history = ctx.history.as_context(),
        transcript = transcript,
        profile = profile_json,
    )
}
