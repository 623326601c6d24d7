//! Conversation state shared across a session

use serde::{Deserialize, Serialize};

/// Caller profile captured during the conversation
///
/// Updated wholesale whenever the dialogue reply carries new values;
/// latest wins, there is no merge logic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub name: Option<String>,
    pub address: Option<String>,
}

impl Profile {
    /// True if neither field has been captured yet
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.name.is_none() && self.address.is_none()
    }
}

/// Snapshot persisted to `last_session.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub session: String,
    pub profile: Profile,
    #[serde(default)]
    pub notes: Vec<String>,
}

/// A single logged conversation turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

/// Speaker role within a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }

    /// Parse a role from a log line prefix; unknown roles are dropped
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            _ => None,
        }
    }
}

/// Rolling conversation history with a fixed cap
#[derive(Debug, Clone)]
pub struct History {
    turns: Vec<Turn>,
    limit: usize,
}

impl History {
    #[must_use]
    pub const fn new(limit: usize) -> Self {
        Self {
            turns: Vec::new(),
            limit,
        }
    }

    /// Append a turn, discarding the oldest past the cap
    pub fn push(&mut self, role: Role, text: impl Into<String>) {
        self.turns.push(Turn {
            role,
            text: text.into(),
        });
        if self.turns.len() > self.limit {
            let excess = self.turns.len() - self.limit;
            self.turns.drain(..excess);
        }
    }

    /// Seed from restored turns, keeping only the newest entries
    pub fn seed(&mut self, turns: Vec<Turn>) {
        self.turns = turns;
        if self.turns.len() > self.limit {
            let excess = self.turns.len() - self.limit;
            self.turns.drain(..excess);
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    #[must_use]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Render the history as prompt context
    #[must_use]
    pub fn as_context(&self) -> String {
        if self.turns.is_empty() {
            return "No prior conversation.".to_string();
        }
        self.turns
            .iter()
            .map(|t| format!("{}: {}", t.role.as_str(), t.text))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_caps_at_limit() {
        let mut history = History::new(3);
        for i in 0..5 {
            history.push(Role::User, format!("turn {i}"));
        }
        assert_eq!(history.turns().len(), 3);
        assert_eq!(history.turns()[0].text, "turn 2");
    }

    #[test]
    fn history_context_rendering() {
        let mut history = History::new(8);
        assert_eq!(history.as_context(), "No prior conversation.");

        history.push(Role::User, "hello");
        history.push(Role::Assistant, "hi there");
        assert_eq!(history.as_context(), "user: hello\nassistant: hi there");
    }

    #[test]
    fn seed_keeps_newest_entries() {
        let mut history = History::new(2);
        history.seed(vec![
            Turn {
                role: Role::User,
                text: "a".into(),
            },
            Turn {
                role: Role::Assistant,
                text: "b".into(),
            },
            Turn {
                role: Role::User,
                text: "c".into(),
            },
        ]);
        assert_eq!(history.turns().len(), 2);
        assert_eq!(history.turns()[0].text, "b");
    }
}
