//! File-backed session persistence
//!
//! Everything lives under one data directory:
//! - `session_log.txt` — append-only turn log
//! - `last_session.json` — latest profile/notes snapshot
//! - `session_meta.json` — current session name and start time
//! - `clients.json` — sorted list of known caller names
//! - `custom_prompt.txt` — optional system prompt override
//! - `names.txt` — optional list of given names for name spotting
//!
//! Writes are plain sequential file operations, no transactional guarantees.

use std::collections::BTreeSet;
use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use rand::RngCore;
use serde::Serialize;

use crate::dialogue::parse_payload;
use crate::state::{Role, Snapshot, Turn};
use crate::{Error, Result};

const LOG_FILE: &str = "session_log.txt";
const SNAPSHOT_FILE: &str = "last_session.json";
const META_FILE: &str = "session_meta.json";
const CLIENTS_FILE: &str = "clients.json";
const PROMPT_FILE: &str = "custom_prompt.txt";
const NAMES_FILE: &str = "names.txt";

/// A reassembled entry from the turn log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub session: Option<String>,
    pub role: String,
    pub text: String,
}

/// File-backed store for one session
pub struct SessionStore {
    data_dir: PathBuf,
    session_name: String,
}

impl SessionStore {
    /// Open the store, creating the data directory and a fresh session name
    ///
    /// # Errors
    ///
    /// Returns error if the data directory cannot be created
    pub fn new(data_dir: &Path) -> Result<Self> {
        Self::with_session_name(data_dir, generate_session_name())
    }

    /// Open the store with a caller-provided session name
    ///
    /// # Errors
    ///
    /// Returns error if the data directory cannot be created
    pub fn with_session_name(data_dir: &Path, session_name: String) -> Result<Self> {
        fs::create_dir_all(data_dir)
            .map_err(|e| Error::Store(format!("cannot create {}: {e}", data_dir.display())))?;
        Ok(Self {
            data_dir: data_dir.to_path_buf(),
            session_name,
        })
    }

    /// The current session name
    #[must_use]
    pub fn session_name(&self) -> &str {
        &self.session_name
    }

    /// Path to the snapshot file, for user-facing messages
    #[must_use]
    pub fn snapshot_path(&self) -> PathBuf {
        self.data_dir.join(SNAPSHOT_FILE)
    }

    /// Path to the custom prompt file
    #[must_use]
    pub fn prompt_path(&self) -> PathBuf {
        self.data_dir.join(PROMPT_FILE)
    }

    /// Write the session meta file (overwritten each launch)
    ///
    /// # Errors
    ///
    /// Returns error if the write fails
    pub fn save_session_meta(&self) -> Result<()> {
        #[derive(Serialize)]
        struct Meta<'a> {
            session_name: &'a str,
            started_at: String,
        }
        let meta = Meta {
            session_name: &self.session_name,
            started_at: chrono::Local::now().format("%Y-%m-%dT%H:%M:%S").to_string(),
        };
        let json = serde_json::to_string_pretty(&meta)?;
        fs::write(self.data_dir.join(META_FILE), json)?;
        Ok(())
    }

    /// Append the session-start line to the turn log
    ///
    /// # Errors
    ///
    /// Returns error if the append fails
    pub fn log_session_start(&self) -> Result<()> {
        let started = chrono::Local::now().format("%a %b %e %H:%M:%S %Y");
        self.append_log_line(&format!(
            "[{}] session: started at {started}",
            self.session_name
        ))
    }

    /// Append one turn to the log
    ///
    /// # Errors
    ///
    /// Returns error if the append fails
    pub fn log_turn(&self, role: Role, text: &str) -> Result<()> {
        self.append_log_line(&format!("[{}] {}: {text}", self.session_name, role.as_str()))
    }

    fn append_log_line(&self, line: &str) -> Result<()> {
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.data_dir.join(LOG_FILE))?;
        writeln!(file, "{line}")?;
        Ok(())
    }

    /// Load the previous-session snapshot, if one parses
    #[must_use]
    pub fn load_last_snapshot(&self) -> Option<Snapshot> {
        let text = fs::read_to_string(self.snapshot_path()).ok()?;
        serde_json::from_str(&text).ok()
    }

    /// Overwrite the snapshot file
    ///
    /// # Errors
    ///
    /// Returns error if the write fails
    pub fn save_snapshot(&self, snapshot: &Snapshot) -> Result<()> {
        let json = serde_json::to_string_pretty(snapshot)?;
        fs::write(self.snapshot_path(), json)?;
        Ok(())
    }

    /// Load the custom system prompt if present and non-empty
    #[must_use]
    pub fn load_custom_prompt(&self) -> Option<String> {
        let text = fs::read_to_string(self.prompt_path()).ok()?;
        let trimmed = text.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }

    /// Save a new custom system prompt
    ///
    /// # Errors
    ///
    /// Returns error if the write fails
    pub fn save_custom_prompt(&self, prompt: &str) -> Result<()> {
        fs::write(self.prompt_path(), prompt.trim())?;
        Ok(())
    }

    /// Warm conversation history from the tail of the turn log
    ///
    /// Only `user`/`assistant` entries are restored; the newest `limit`
    /// entries win.
    #[must_use]
    pub fn load_history(&self, limit: usize) -> Vec<Turn> {
        let mut turns: Vec<Turn> = self
            .iter_log_entries()
            .into_iter()
            .filter_map(|entry| {
                Role::parse(&entry.role).map(|role| Turn {
                    role,
                    text: entry.text,
                })
            })
            .collect();
        if turns.len() > limit {
            turns.drain(..turns.len() - limit);
        }
        turns
    }

    /// Load known client names
    ///
    /// Prefers `clients.json`; when absent or unreadable, names are scraped
    /// from assistant log entries that carry a JSON `name` field.
    #[must_use]
    pub fn load_known_clients(&self) -> BTreeSet<String> {
        if let Ok(text) = fs::read_to_string(self.data_dir.join(CLIENTS_FILE)) {
            if let Ok(names) = serde_json::from_str::<Vec<String>>(&text) {
                return names
                    .into_iter()
                    .map(|n| n.trim().to_string())
                    .filter(|n| !n.is_empty())
                    .collect();
            }
        }

        self.iter_log_entries()
            .into_iter()
            .filter(|entry| entry.role == "assistant")
            .filter_map(|entry| parse_payload(&entry.text).name)
            .collect()
    }

    /// Overwrite `clients.json` with the given names
    ///
    /// # Errors
    ///
    /// Returns error if the write fails
    pub fn persist_known_clients(&self, names: &BTreeSet<String>) -> Result<()> {
        let sorted: Vec<&String> = names.iter().collect();
        let json = serde_json::to_string_pretty(&sorted)?;
        fs::write(self.data_dir.join(CLIENTS_FILE), json)?;
        Ok(())
    }

    /// Load the given-name list used for name spotting
    ///
    /// Falls back to a small built-in set when `names.txt` is absent.
    #[must_use]
    pub fn load_name_list(&self) -> BTreeSet<String> {
        if let Ok(text) = fs::read_to_string(self.data_dir.join(NAMES_FILE)) {
            let names: BTreeSet<String> = text
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(ToString::to_string)
                .collect();
            if !names.is_empty() {
                return names;
            }
        }

        ["علی", "مریم", "رضا", "سارا", "محمد", "حمید", "نازنین", "آرزو", "پریسا", "فرهاد"]
            .into_iter()
            .map(ToString::to_string)
            .collect()
    }

    /// Read and reassemble all log entries
    ///
    /// Lines that do not parse as `[session] role: text` continue the
    /// previous entry's text.
    #[must_use]
    pub fn iter_log_entries(&self) -> Vec<LogEntry> {
        let Ok(text) = fs::read_to_string(self.data_dir.join(LOG_FILE)) else {
            return Vec::new();
        };

        let mut entries = Vec::new();
        let mut current: Option<LogEntry> = None;

        for line in text.lines() {
            if let Some((session, role, text)) = parse_log_line(line) {
                if let Some(entry) = current.take() {
                    entries.push(entry);
                }
                current = Some(LogEntry {
                    session,
                    role,
                    text,
                });
            } else if let Some(entry) = current.as_mut() {
                if !entry.text.is_empty() {
                    entry.text.push('\n');
                }
                entry.text.push_str(line);
            }
        }
        if let Some(mut entry) = current.take() {
            entry.text = entry.text.trim().to_string();
            entries.push(entry);
        }

        for entry in &mut entries {
            entry.text = entry.text.trim().to_string();
        }
        entries
    }
}

/// Parse one `[session] role: text` log line
///
/// Returns `None` for blank lines and continuation lines.
#[must_use]
pub fn parse_log_line(line: &str) -> Option<(Option<String>, String, String)> {
    let stripped = line.trim_end_matches('\n');
    if stripped.is_empty() {
        return None;
    }

    let (session, remainder) = if let Some(rest) = stripped.strip_prefix('[') {
        rest.find(']').map_or((None, stripped), |closing| {
            (
                Some(rest[..closing].to_string()),
                rest[closing + 1..].trim_start(),
            )
        })
    } else {
        (None, stripped)
    };

    let (role, text) = remainder.split_once(": ")?;
    Some((session, role.trim().to_string(), text.to_string()))
}

/// Generate a session name: `drx-<timestamp>-<random hex>`
#[must_use]
pub fn generate_session_name() -> String {
    let timestamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
    let mut suffix = [0u8; 2];
    rand::thread_rng().fill_bytes(&mut suffix);
    format!("drx-{timestamp}-{}", hex::encode(suffix))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_names_are_prefixed_and_unique() {
        let a = generate_session_name();
        let b = generate_session_name();
        assert!(a.starts_with("drx-"));
        assert_eq!(a.len(), "drx-20250101-000000-abcd".len());
        // Same second is likely; the random suffix still separates them
        assert_ne!(a, b);
    }

    #[test]
    fn log_line_parsing() {
        let (session, role, text) =
            parse_log_line("[drx-1] user: hello there").expect("should parse");
        assert_eq!(session.as_deref(), Some("drx-1"));
        assert_eq!(role, "user");
        assert_eq!(text, "hello there");

        // No session prefix still parses
        let (session, role, text) = parse_log_line("assistant: hi").expect("should parse");
        assert_eq!(session, None);
        assert_eq!(role, "assistant");
        assert_eq!(text, "hi");

        // Continuation and blank lines do not
        assert!(parse_log_line("just some text without a separator").is_none());
        assert!(parse_log_line("").is_none());
    }

    #[test]
    fn text_with_colon_space_keeps_remainder_intact() {
        let (_, role, text) =
            parse_log_line("[s] assistant: note: arrive early").expect("should parse");
        assert_eq!(role, "assistant");
        assert_eq!(text, "note: arrive early");
    }
}
